use std::fmt;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ResourceType {
    File,
    Directory,
}

impl ResourceType {
    /// Classifies a path by its trailing slash alone, without touching storage.
    pub fn from_path(path: &str) -> Self {
        if path.ends_with('/') {
            Self::Directory
        } else {
            Self::File
        }
    }
}

impl fmt::Display for ResourceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::File => f.write_str("FILE"),
            Self::Directory => f.write_str("DIRECTORY"),
        }
    }
}

/// Externally visible description of a file or directory, relative to the
/// owning user's root.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceInfo {
    #[serde(rename = "path")]
    pub parent_path: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<u64>,
    #[serde(rename = "type")]
    pub resource_type: ResourceType,
}

impl ResourceInfo {
    pub fn file(parent_path: impl Into<String>, name: impl Into<String>, size: u64) -> Self {
        Self {
            parent_path: parent_path.into(),
            name: name.into(),
            size: Some(size),
            resource_type: ResourceType::File,
        }
    }

    pub fn directory(parent_path: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            parent_path: parent_path.into(),
            name: name.into(),
            size: None,
            resource_type: ResourceType::Directory,
        }
    }
}
