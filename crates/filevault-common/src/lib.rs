pub mod error;
pub mod time;
pub mod types;

pub use error::{Result, VaultError};
pub use types::{ResourceInfo, ResourceType};
