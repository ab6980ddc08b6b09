pub const DEFAULT_BUCKET: &str = "user-files";
pub const DEFAULT_MAX_UPLOAD_SIZE: u64 = 100 * 1024 * 1024;
pub const DEFAULT_MAX_REQUEST_SIZE: u64 = 3 * DEFAULT_MAX_UPLOAD_SIZE;
pub const DEFAULT_COPY_CONCURRENCY: usize = 8;

#[derive(Debug, Clone)]
pub struct CoreConfig {
    /// Shared bucket holding every user's root prefix.
    pub bucket: String,
    pub max_upload_size: u64,
    /// Cap on all files of one upload request taken together.
    pub max_request_size: u64,
    /// Upper bound on in-flight object copies while copying a directory.
    pub copy_concurrency: usize,
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            bucket: DEFAULT_BUCKET.to_string(),
            max_upload_size: DEFAULT_MAX_UPLOAD_SIZE,
            max_request_size: DEFAULT_MAX_REQUEST_SIZE,
            copy_concurrency: DEFAULT_COPY_CONCURRENCY,
        }
    }
}
