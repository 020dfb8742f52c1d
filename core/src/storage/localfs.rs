use async_trait::async_trait;
use chrono::{DateTime, Utc};
use data_encoding::HEXLOWER;
use md5::{Digest, Md5};
use std::io;
use std::path::{Path, PathBuf};
use tokio::io::AsyncReadExt;
use tracing::{instrument, warn};
use walkdir::WalkDir;

use super::{ByteReader, StorageBackend};

/// Stores objects as files below a root directory.
///
/// Locations are `file://` URLs or plain absolute paths, and must live below
/// the root.
#[derive(Clone)]
pub struct LocalFsStorage {
    root: PathBuf,
}

impl LocalFsStorage {
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path(&self, location: &str) -> io::Result<PathBuf> {
        let path = PathBuf::from(location.strip_prefix("file://").unwrap_or(location));
        if !path.starts_with(&self.root) {
            return Err(io::Error::new(
                io::ErrorKind::PermissionDenied,
                format!("{} is outside of {}", location, self.root.display()),
            ));
        }
        Ok(path)
    }
}

async fn ensure_parent(path: &Path) -> io::Result<()> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    Ok(())
}

/// Copies a file or a whole directory tree.
fn copy_tree(from: &Path, to: &Path) -> io::Result<()> {
    for entry in WalkDir::new(from).follow_links(false) {
        let entry = entry.map_err(io::Error::other)?;
        let rel = entry
            .path()
            .strip_prefix(from)
            .map_err(io::Error::other)?;
        let dest = if rel.as_os_str().is_empty() {
            to.to_path_buf()
        } else {
            to.join(rel)
        };

        let file_type = entry.file_type();
        if file_type.is_dir() {
            std::fs::create_dir_all(&dest)?;
        } else if file_type.is_symlink() {
            #[cfg(unix)]
            std::os::unix::fs::symlink(std::fs::read_link(entry.path())?, &dest)?;
        } else {
            if let Some(parent) = dest.parent() {
                std::fs::create_dir_all(parent)?;
            }
            std::fs::copy(entry.path(), &dest)?;
        }
    }
    Ok(())
}

#[async_trait]
impl StorageBackend for LocalFsStorage {
    #[instrument(skip(self))]
    async fn create_container(&self, location: &str) -> io::Result<()> {
        tokio::fs::create_dir_all(self.path(location)?).await
    }

    #[instrument(skip(self))]
    async fn create_link(&self, location: &str, target: &str) -> io::Result<()> {
        let (path, target) = (self.path(location)?, self.path(target)?);
        ensure_parent(&path).await?;
        #[cfg(unix)]
        return tokio::fs::symlink(target, path).await;
        #[cfg(not(unix))]
        return Err(io::Error::new(
            io::ErrorKind::Unsupported,
            format!("cannot link {} to {}", path.display(), target.display()),
        ));
    }

    #[instrument(skip(self))]
    async fn touch(&self, location: &str) -> io::Result<()> {
        let path = self.path(location)?;
        ensure_parent(&path).await?;
        tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .await
            .map(|_| ())
    }

    #[instrument(skip(self))]
    async fn move_bytes(&self, old: &str, new: &str) -> io::Result<()> {
        let (old, new) = (self.path(old)?, self.path(new)?);
        ensure_parent(&new).await?;
        tokio::fs::rename(old, new).await
    }

    #[instrument(skip(self))]
    async fn copy_bytes(&self, old: &str, new: &str) -> io::Result<()> {
        let (old, new) = (self.path(old)?, self.path(new)?);
        if !tokio::fs::try_exists(&old).await? {
            return Err(super::not_found(&old.to_string_lossy()));
        }
        tokio::task::spawn_blocking(move || copy_tree(&old, &new)).await?
    }

    #[instrument(skip(self, reader))]
    async fn put_bytes(&self, location: &str, mut reader: ByteReader) -> io::Result<u64> {
        let path = self.path(location)?;
        ensure_parent(&path).await?;
        let mut file = tokio::fs::File::create(path).await?;
        let written = tokio::io::copy(&mut reader, &mut file).await?;
        file.sync_all().await?;
        Ok(written)
    }

    #[instrument(skip(self))]
    async fn get_bytes(&self, location: &str) -> io::Result<ByteReader> {
        let file = tokio::fs::File::open(self.path(location)?).await?;
        Ok(Box::new(file))
    }

    #[instrument(skip(self))]
    async fn remove_bytes(&self, location: &str, recursive: bool) -> io::Result<()> {
        let path = self.path(location)?;
        let metadata = match tokio::fs::symlink_metadata(&path).await {
            Ok(m) => m,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(()),
            Err(e) => return Err(e),
        };

        let result = if metadata.is_dir() {
            if recursive {
                tokio::fs::remove_dir_all(&path).await
            } else {
                tokio::fs::remove_dir(&path).await
            }
        } else {
            tokio::fs::remove_file(&path).await
        };
        if let Err(e) = &result {
            warn!(err=%e, path=%path.display(), "failed to remove bytes");
        }
        result
    }

    async fn size(&self, location: &str) -> io::Result<u64> {
        let metadata = tokio::fs::metadata(self.path(location)?).await?;
        Ok(if metadata.is_dir() { 0 } else { metadata.len() })
    }

    async fn last_modified(&self, location: &str) -> io::Result<DateTime<Utc>> {
        let metadata = tokio::fs::metadata(self.path(location)?).await?;
        Ok(metadata.modified()?.into())
    }

    async fn checksum(&self, location: &str) -> io::Result<String> {
        let mut file = tokio::fs::File::open(self.path(location)?).await?;
        let mut hasher = Md5::new();
        let mut buf = vec![0u8; 64 * 1024];
        loop {
            let n = file.read(&mut buf).await?;
            if n == 0 {
                break;
            }
            hasher.update(&buf[..n]);
        }
        Ok(HEXLOWER.encode(&hasher.finalize()))
    }
}
