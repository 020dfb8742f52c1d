#[cfg(test)]
use rstest_reuse;

mod errors;

pub mod auth;
pub mod capability;
pub mod config;
pub mod fixtures;
pub mod manager;
pub mod metastore;
pub mod nodes;
pub mod properties;
pub mod protocol;
pub mod storage;
pub mod transfer;
pub mod transform;
pub mod uri;
pub mod views;

pub use errors::Error;
pub use manager::NamespaceManager;
pub use uri::NodeUri;
