pub mod archive;
pub mod config;
pub mod dispatcher;
pub mod handler;
pub mod keys;
pub mod locator;
pub mod placeholder;
pub mod service;
pub mod validation;

#[cfg(test)]
mod testing;

pub use archive::ZipStreamer;
pub use config::CoreConfig;
pub use dispatcher::ResourceDispatcher;
pub use handler::{ResourceDownload, ResourceHandler};
pub use locator::{ResourceContext, ResourceLocator, UserRoot};
pub use placeholder::DirectoryPlaceholderManager;
pub use service::{Upload, UserFileService};
