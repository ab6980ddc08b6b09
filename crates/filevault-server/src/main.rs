use std::{path::PathBuf, sync::Arc};

use clap::{Parser, ValueEnum};
use filevault_core::{
    CoreConfig, UserFileService,
    config::{
        DEFAULT_BUCKET, DEFAULT_COPY_CONCURRENCY, DEFAULT_MAX_REQUEST_SIZE, DEFAULT_MAX_UPLOAD_SIZE,
    },
};
use filevault_storage::{DiskObjectStore, MemoryObjectStore, ObjectStore};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Backend {
    Memory,
    Disk,
}

#[derive(Parser)]
#[command(name = "filevault", about = "Per-user file storage over a flat object store")]
struct Cli {
    #[arg(long, default_value = "0.0.0.0")]
    host: String,

    #[arg(long, default_value = "8080")]
    port: u16,

    #[arg(long, default_value = "./data")]
    data_dir: String,

    #[arg(long, value_enum, default_value_t = Backend::Disk)]
    backend: Backend,

    /// Falls back to `FILEVAULT_BUCKET`, then to the built-in default.
    #[arg(long)]
    bucket: Option<String>,

    #[arg(long, default_value_t = DEFAULT_MAX_UPLOAD_SIZE)]
    max_upload_size: u64,

    /// Cap on all files of one upload request together.
    #[arg(long, default_value_t = DEFAULT_MAX_REQUEST_SIZE)]
    max_request_size: u64,

    #[arg(long, default_value_t = DEFAULT_COPY_CONCURRENCY)]
    copy_concurrency: usize,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let env_filter = EnvFilter::from_default_env().add_directive("filevault=info".parse()?);
    tracing_subscriber::fmt().with_env_filter(env_filter).init();

    let cli = Cli::parse();
    let addr = format!("{}:{}", cli.host, cli.port);
    let bucket = cli
        .bucket
        .or_else(|| std::env::var("FILEVAULT_BUCKET").ok())
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
        .unwrap_or_else(|| DEFAULT_BUCKET.to_string());

    let store: Arc<dyn ObjectStore> = match cli.backend {
        Backend::Disk => {
            let data_dir = PathBuf::from(&cli.data_dir);
            tokio::fs::create_dir_all(&data_dir).await?;
            info!(data_dir = %data_dir.display(), "using disk object store");
            Arc::new(DiskObjectStore::new(data_dir).await?)
        }
        Backend::Memory => {
            warn!("using in-memory object store, data is lost on exit");
            Arc::new(MemoryObjectStore::new())
        }
    };
    store.make_bucket(&bucket).await?;

    if cli.copy_concurrency == 0 {
        warn!("--copy-concurrency 0 is treated as 1");
    }
    if cli.max_request_size < cli.max_upload_size {
        warn!(
            max_request_size = cli.max_request_size,
            max_upload_size = cli.max_upload_size,
            "request cap is below the per-file cap, large files will be refused"
        );
    }
    let config = CoreConfig {
        bucket,
        max_upload_size: cli.max_upload_size,
        max_request_size: cli.max_request_size,
        copy_concurrency: cli.copy_concurrency.max(1),
    };
    info!(
        bucket = %config.bucket,
        max_upload_size = config.max_upload_size,
        max_request_size = config.max_request_size,
        copy_concurrency = config.copy_concurrency,
        "file service configured"
    );

    let service = Arc::new(UserFileService::new(store, config));
    let app = filevault_api::api_router(service);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("filevault server listening on {addr}");
    axum::serve(listener, app).await?;

    Ok(())
}
