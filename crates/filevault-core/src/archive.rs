//! Streams a directory's objects into a zip archive as the client reads it.
//!
//! The archive is written by a blocking task through `zip::ZipWriter` in
//! streaming mode. Object bodies are pulled from the async store one at a
//! time and chunks are handed to the response through a bounded channel, so
//! neither the archive nor any single object is held in memory.

use std::io::{self, Write};
use std::sync::Arc;

use bytes::{Bytes, BytesMut};
use chrono::{DateTime, Datelike, Timelike, Utc};
use filevault_storage::{ByteStream, ObjectStore};
use futures::StreamExt;
use tokio::runtime::Handle;
use tokio::sync::mpsc;
use tokio_util::io::{StreamReader, SyncIoBridge};
use tracing::{debug, error};
use zip::{CompressionMethod, ZipWriter, write::SimpleFileOptions};

const CHUNK_SIZE: usize = 64 * 1024;
const CHANNEL_CAPACITY: usize = 8;

#[derive(Clone)]
pub struct ZipStreamer {
    store: Arc<dyn ObjectStore>,
}

impl ZipStreamer {
    pub fn new(store: Arc<dyn ObjectStore>) -> Self {
        Self { store }
    }

    /// Archives `keys`, naming each entry by its path below `prefix`.
    ///
    /// Keys ending in `/` become directory entries; the key equal to
    /// `prefix` is skipped. Must be called from within a tokio runtime.
    pub fn stream(&self, bucket: &str, prefix: &str, keys: Vec<String>) -> ByteStream {
        let (tx, rx) = mpsc::channel::<io::Result<Bytes>>(CHANNEL_CAPACITY);
        let job = ArchiveJob {
            store: Arc::clone(&self.store),
            handle: Handle::current(),
            bucket: bucket.to_string(),
            prefix: prefix.to_string(),
            keys,
        };

        tokio::task::spawn_blocking(move || {
            let mut writer = ChannelWriter::new(tx.clone());
            let written = job.write_archive(&mut writer).and_then(|()| writer.flush());
            match written {
                Ok(()) => debug!(bucket = %job.bucket, prefix = %job.prefix, "zip archive completed"),
                Err(err) if err.kind() == io::ErrorKind::BrokenPipe => {
                    debug!(bucket = %job.bucket, prefix = %job.prefix, "zip download abandoned by reader");
                }
                Err(err) => {
                    error!(bucket = %job.bucket, prefix = %job.prefix, error = %err, "zip archive failed");
                    let _ = tx.blocking_send(Err(err));
                }
            }
        });

        futures::stream::unfold(rx, |mut rx| async move {
            rx.recv().await.map(|item| (item, rx))
        })
        .boxed()
    }
}

struct ArchiveJob {
    store: Arc<dyn ObjectStore>,
    handle: Handle,
    bucket: String,
    prefix: String,
    keys: Vec<String>,
}

impl ArchiveJob {
    fn write_archive<W: Write>(&self, writer: W) -> io::Result<()> {
        let mut zip = ZipWriter::new_stream(writer);
        let modified = zip_timestamp(filevault_common::time::now());

        for key in &self.keys {
            let Some(entry_name) = key.strip_prefix(self.prefix.as_str()) else {
                continue;
            };
            if entry_name.is_empty() {
                continue;
            }
            if entry_name.ends_with('/') {
                zip.add_directory(entry_name, entry_options(modified)).map_err(io::Error::other)?;
                continue;
            }

            zip.start_file(entry_name, entry_options(modified)).map_err(io::Error::other)?;
            let body = self
                .handle
                .block_on(self.store.get(&self.bucket, key))
                .map_err(io::Error::other)?;
            // The reader, and with it the object handle, is dropped before
            // the next entry starts, on success or error.
            let mut reader = SyncIoBridge::new_with_handle(StreamReader::new(body), self.handle.clone());
            io::copy(&mut reader, &mut zip)?;
        }

        zip.finish().map_err(io::Error::other)?;
        Ok(())
    }
}

fn entry_options(modified: zip::DateTime) -> SimpleFileOptions {
    SimpleFileOptions::default()
        .compression_method(CompressionMethod::Deflated)
        .last_modified_time(modified)
}

/// The store keeps no creation time we can trust, so every entry gets the
/// time the archive was built.
fn zip_timestamp(now: DateTime<Utc>) -> zip::DateTime {
    let year = u16::try_from(now.year()).unwrap_or(1980);
    zip::DateTime::from_date_and_time(
        year,
        now.month() as u8,
        now.day() as u8,
        now.hour() as u8,
        now.minute() as u8,
        now.second() as u8,
    )
    .unwrap_or_default()
}

/// Buffers archive bytes into chunks for the response channel.
struct ChannelWriter {
    tx: mpsc::Sender<io::Result<Bytes>>,
    buf: BytesMut,
}

impl ChannelWriter {
    fn new(tx: mpsc::Sender<io::Result<Bytes>>) -> Self {
        Self {
            tx,
            buf: BytesMut::with_capacity(CHUNK_SIZE),
        }
    }

    fn send_buffered(&mut self) -> io::Result<()> {
        if self.buf.is_empty() {
            return Ok(());
        }
        let chunk = self.buf.split().freeze();
        self.tx
            .blocking_send(Ok(chunk))
            .map_err(|_| io::Error::new(io::ErrorKind::BrokenPipe, "zip download receiver dropped"))
    }
}

impl Write for ChannelWriter {
    fn write(&mut self, data: &[u8]) -> io::Result<usize> {
        self.buf.extend_from_slice(data);
        if self.buf.len() >= CHUNK_SIZE {
            self.send_buffered()?;
        }
        Ok(data.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        self.send_buffered()
    }
}
