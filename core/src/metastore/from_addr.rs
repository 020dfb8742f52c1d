use std::sync::Arc;
use url::Url;

use super::{MemoryMetadataStore, MetadataStore, RedbMetadataStore};
use crate::Error;

/// Constructs a new instance of a [MetadataStore] from an URI.
///
/// The following URIs are supported:
/// - `memory:`
///   Uses a in-memory implementation.
/// - `redb:`
///   Uses a in-memory redb implementation.
/// - `redb:///absolute/path/to/somewhere`
///   Uses redb, using a path on the disk for persistency. Can be only opened
///   from one process at the same time.
pub async fn from_addr(uri: &str) -> Result<Arc<dyn MetadataStore>, Error> {
    let url = Url::parse(uri)
        .map_err(|e| Error::InternalFault(format!("unable to parse url: {}", e)))?;

    let store: Arc<dyn MetadataStore> = match url.scheme() {
        "memory" => {
            // memory doesn't support host or path in the URL.
            if url.has_host() || !url.path().is_empty() {
                return Err(Error::InternalFault("invalid url".to_string()));
            }
            Arc::<MemoryMetadataStore>::default()
        }
        "redb" => {
            // redb doesn't support host, and a path can be provided (otherwise
            // it'll live in memory only).
            if url.has_host() {
                return Err(Error::InternalFault("no host allowed".to_string()));
            }

            Arc::new(if url.path().is_empty() {
                RedbMetadataStore::new_temporary()?
            } else {
                RedbMetadataStore::new(url.path().into()).await?
            })
        }
        _ => {
            return Err(Error::InternalFault(format!(
                "unknown scheme: {}",
                url.scheme()
            )))
        }
    };

    Ok(store)
}
