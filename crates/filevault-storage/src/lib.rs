pub mod disk;
pub mod error;
pub mod listing;
pub mod memory;
pub mod traits;

pub use disk::DiskObjectStore;
pub use error::{Result, StoreError};
pub use memory::MemoryObjectStore;
pub use traits::{ByteStream, ObjectStat, ObjectStore};
