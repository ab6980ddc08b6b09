//! Grammar checks for user supplied paths and queries.
//!
//! A path is a run of `/`-separated segments made of letters, digits, spaces
//! and `_.-`, optionally ending in `/` to mark a directory. The empty string
//! stands for the user's root. Checks run before any object store call.

use filevault_common::error::{Result, VaultError};
use tracing::info;

use crate::keys::is_directory_path;

fn is_segment_char(c: char) -> bool {
    c.is_alphanumeric() || matches!(c, ' ' | '_' | '.' | '-')
}

fn is_valid_segment(segment: &str) -> bool {
    !segment.is_empty()
        && segment != "."
        && segment != ".."
        && segment.chars().all(is_segment_char)
}

fn is_valid_path(path: &str) -> bool {
    if path.is_empty() {
        return true;
    }
    let body = path.strip_suffix('/').unwrap_or(path);
    !body.is_empty() && body.split('/').all(is_valid_segment)
}

fn is_valid_directory_path(path: &str) -> bool {
    if path.is_empty() {
        return true;
    }
    is_directory_path(path)
        && is_valid_path(path)
        && !path.split('/').any(|segment| segment.starts_with(".."))
}

pub fn validate_path_format(path: &str) -> Result<()> {
    if !is_valid_path(path) {
        info!(path, "rejected invalid path format");
        return Err(VaultError::InvalidPathFormat(format!(
            "the path '{path}' has an invalid format"
        )));
    }
    Ok(())
}

/// Accepts `""` as the root; callers that need a named directory use
/// [`validate_create_directory_path_format`].
pub fn validate_directory_path_format(path: &str) -> Result<()> {
    if !is_valid_directory_path(path) {
        info!(path, "rejected invalid directory path format");
        return Err(VaultError::InvalidPathFormat(format!(
            "the path '{path}' has an invalid format for a directory, expected 'parent/.../name/'"
        )));
    }
    Ok(())
}

pub fn validate_create_directory_path_format(path: &str) -> Result<()> {
    if path.trim().is_empty() {
        info!("rejected empty path for directory creation");
        return Err(VaultError::InvalidPathFormat(
            "the directory path must not be empty".to_string(),
        ));
    }
    validate_directory_path_format(path)
}

pub fn validate_search_query_format(query: &str) -> Result<()> {
    if !is_valid_path(query) {
        info!(query, "rejected invalid search query format");
        return Err(VaultError::InvalidPathFormat(format!(
            "the query '{query}' has an invalid format"
        )));
    }
    Ok(())
}

pub fn validate_move_paths_format(source: &str, destination: &str) -> Result<()> {
    validate_path_format(source)?;
    validate_path_format(destination)?;
    if is_directory_path(source) != is_directory_path(destination) {
        info!(source, destination, "rejected move between a file and a directory path");
        return Err(VaultError::InvalidPathFormat(
            "source and destination must both be files or both be directories".to_string(),
        ));
    }
    Ok(())
}

/// A file name for upload may carry sub-directories but must name a file.
pub fn validate_upload_file_name(name: &str) -> Result<()> {
    if name.is_empty() || is_directory_path(name) || !is_valid_path(name) {
        info!(name, "rejected invalid upload file name");
        return Err(VaultError::InvalidPathFormat(format!(
            "the file name '{name}' has an invalid format"
        )));
    }
    Ok(())
}

pub fn validate_upload_size(size: u64, max_size: u64) -> Result<()> {
    if size > max_size {
        info!(size, max_size, "rejected oversized upload");
        return Err(VaultError::UploadTooLarge { size, max_size });
    }
    Ok(())
}
