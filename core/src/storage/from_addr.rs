use std::path::PathBuf;
use std::sync::Arc;
use url::Url;

use super::{LocalFsStorage, MemoryStorage, StorageBackend};
use crate::Error;

/// Constructs a new instance of a [StorageBackend] from an URI.
///
/// The following URIs are supported:
/// - `memory:`
///   Keeps all bytes in memory.
/// - `file:///absolute/path/to/somewhere`
///   Stores bytes as files below the given directory.
pub async fn from_addr(uri: &str) -> Result<Arc<dyn StorageBackend>, Error> {
    let url = Url::parse(uri)
        .map_err(|e| Error::InternalFault(format!("unable to parse url: {}", e)))?;

    let storage: Arc<dyn StorageBackend> = match url.scheme() {
        "memory" => {
            // memory doesn't support host or path in the URL.
            if url.has_host() || !url.path().is_empty() {
                return Err(Error::InternalFault("invalid url".to_string()));
            }
            Arc::<MemoryStorage>::default()
        }
        "file" => {
            if url.host_str().is_some_and(|h| !h.is_empty()) {
                return Err(Error::InternalFault("no host allowed".to_string()));
            }
            if url.path().is_empty() || url.path() == "/" {
                return Err(Error::InternalFault(
                    "cowardly refusing to use / as storage root".to_string(),
                ));
            }

            let root = PathBuf::from(url.path());
            tokio::fs::create_dir_all(&root).await?;
            Arc::new(LocalFsStorage::new(root))
        }
        _ => {
            return Err(Error::InternalFault(format!(
                "unknown scheme: {}",
                url.scheme()
            )))
        }
    };

    Ok(storage)
}
