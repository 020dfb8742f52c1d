use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::io;
use tokio::io::AsyncRead;

mod from_addr;
mod localfs;
mod memory;


pub use self::from_addr::from_addr;
pub use self::localfs::LocalFsStorage;
pub use self::memory::MemoryStorage;

/// A boxed byte stream read from, or written into, a storage backend.
pub type ByteReader = Box<dyn AsyncRead + Send + Unpin>;

/// Byte level operations on the physical objects behind nodes.
///
/// Objects are addressed by opaque location strings handed out by the
/// namespace manager. Missing objects are reported as
/// [io::ErrorKind::NotFound].
#[async_trait]
pub trait StorageBackend: Send + Sync {
    /// Creates a container (directory) at the location, including missing
    /// parents.
    async fn create_container(&self, location: &str) -> io::Result<()>;

    /// Creates a link at `location` pointing to the object at `target`.
    async fn create_link(&self, location: &str, target: &str) -> io::Result<()>;

    /// Creates an empty object at the location, leaving existing ones alone.
    async fn touch(&self, location: &str) -> io::Result<()>;

    /// Moves the object (or container, with everything below it).
    async fn move_bytes(&self, old: &str, new: &str) -> io::Result<()>;

    /// Copies the object (or container, with everything below it).
    async fn copy_bytes(&self, old: &str, new: &str) -> io::Result<()>;

    /// Replaces the contents of the object with everything read from
    /// `reader`. Returns the number of bytes written.
    async fn put_bytes(&self, location: &str, reader: ByteReader) -> io::Result<u64>;

    /// Opens the object for reading.
    async fn get_bytes(&self, location: &str) -> io::Result<ByteReader>;

    /// Removes the object. Removing a missing object is not an error.
    async fn remove_bytes(&self, location: &str, recursive: bool) -> io::Result<()>;

    /// Size of the object in bytes. Containers report 0.
    async fn size(&self, location: &str) -> io::Result<u64>;

    async fn last_modified(&self, location: &str) -> io::Result<DateTime<Utc>>;

    /// Lower-case hex MD5 digest of the object contents.
    async fn checksum(&self, location: &str) -> io::Result<String>;
}

#[async_trait]
impl<A> StorageBackend for A
where
    A: AsRef<dyn StorageBackend> + Send + Sync,
{
    async fn create_container(&self, location: &str) -> io::Result<()> {
        self.as_ref().create_container(location).await
    }

    async fn create_link(&self, location: &str, target: &str) -> io::Result<()> {
        self.as_ref().create_link(location, target).await
    }

    async fn touch(&self, location: &str) -> io::Result<()> {
        self.as_ref().touch(location).await
    }

    async fn move_bytes(&self, old: &str, new: &str) -> io::Result<()> {
        self.as_ref().move_bytes(old, new).await
    }

    async fn copy_bytes(&self, old: &str, new: &str) -> io::Result<()> {
        self.as_ref().copy_bytes(old, new).await
    }

    async fn put_bytes(&self, location: &str, reader: ByteReader) -> io::Result<u64> {
        self.as_ref().put_bytes(location, reader).await
    }

    async fn get_bytes(&self, location: &str) -> io::Result<ByteReader> {
        self.as_ref().get_bytes(location).await
    }

    async fn remove_bytes(&self, location: &str, recursive: bool) -> io::Result<()> {
        self.as_ref().remove_bytes(location, recursive).await
    }

    async fn size(&self, location: &str) -> io::Result<u64> {
        self.as_ref().size(location).await
    }

    async fn last_modified(&self, location: &str) -> io::Result<DateTime<Utc>> {
        self.as_ref().last_modified(location).await
    }

    async fn checksum(&self, location: &str) -> io::Result<String> {
        self.as_ref().checksum(location).await
    }
}

pub(crate) fn not_found(location: &str) -> io::Error {
    io::Error::new(
        io::ErrorKind::NotFound,
        format!("no object at {}", location),
    )
}
