use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use data_encoding::HEXLOWER;
use md5::{Digest, Md5};
use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::io::{self, Cursor};
use std::sync::Arc;
use tokio::io::AsyncReadExt;
use tracing::instrument;

use super::{not_found, ByteReader, StorageBackend};

/// Links are followed at most this many times.
const MAX_LINK_DEPTH: usize = 16;

#[derive(Clone, Debug)]
enum Kind {
    Container,
    Object(Bytes),
    Link(String),
}

#[derive(Clone, Debug)]
struct Entry {
    kind: Kind,
    modified: DateTime<Utc>,
}

impl Entry {
    fn new(kind: Kind) -> Self {
        Self {
            kind,
            modified: Utc::now(),
        }
    }
}

/// Keeps all objects in memory, keyed by their location.
#[derive(Clone, Default)]
pub struct MemoryStorage {
    entries: Arc<RwLock<BTreeMap<String, Entry>>>,
}

fn key(location: &str) -> String {
    location.trim_end_matches('/').to_string()
}

fn is_within(candidate: &str, location: &str) -> bool {
    candidate == location
        || (candidate.starts_with(location) && candidate[location.len()..].starts_with('/'))
}

impl MemoryStorage {
    /// Follows links until a non-link entry is found.
    fn resolve(entries: &BTreeMap<String, Entry>, location: &str) -> io::Result<(String, Entry)> {
        let mut current = key(location);
        for _ in 0..MAX_LINK_DEPTH {
            match entries.get(&current) {
                None => return Err(not_found(location)),
                Some(Entry {
                    kind: Kind::Link(target),
                    ..
                }) => current = key(target),
                Some(entry) => return Ok((current, entry.clone())),
            }
        }
        Err(io::Error::other(format!("too many links at {}", location)))
    }

    fn subtree(entries: &BTreeMap<String, Entry>, location: &str) -> Vec<(String, Entry)> {
        entries
            .range(location.to_string()..)
            .take_while(|(k, _)| k.starts_with(location))
            .filter(|(k, _)| is_within(k, location))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }

    fn transplant(&self, old: &str, new: &str, keep: bool) -> io::Result<()> {
        let (old, new) = (key(old), key(new));
        let mut entries = self.entries.write();
        let subtree = Self::subtree(&entries, &old);
        if subtree.is_empty() {
            return Err(not_found(&old));
        }
        for (k, entry) in subtree {
            if !keep {
                entries.remove(&k);
            }
            entries.insert(format!("{}{}", new, &k[old.len()..]), entry);
        }
        Ok(())
    }
}

#[async_trait]
impl StorageBackend for MemoryStorage {
    #[instrument(skip(self))]
    async fn create_container(&self, location: &str) -> io::Result<()> {
        self.entries
            .write()
            .entry(key(location))
            .or_insert_with(|| Entry::new(Kind::Container));
        Ok(())
    }

    #[instrument(skip(self))]
    async fn create_link(&self, location: &str, target: &str) -> io::Result<()> {
        self.entries
            .write()
            .insert(key(location), Entry::new(Kind::Link(key(target))));
        Ok(())
    }

    #[instrument(skip(self))]
    async fn touch(&self, location: &str) -> io::Result<()> {
        self.entries
            .write()
            .entry(key(location))
            .or_insert_with(|| Entry::new(Kind::Object(Bytes::new())));
        Ok(())
    }

    #[instrument(skip(self))]
    async fn move_bytes(&self, old: &str, new: &str) -> io::Result<()> {
        self.transplant(old, new, false)
    }

    #[instrument(skip(self))]
    async fn copy_bytes(&self, old: &str, new: &str) -> io::Result<()> {
        self.transplant(old, new, true)
    }

    #[instrument(skip(self, reader))]
    async fn put_bytes(&self, location: &str, mut reader: ByteReader) -> io::Result<u64> {
        let mut buf = Vec::new();
        reader.read_to_end(&mut buf).await?;
        let len = buf.len() as u64;

        let mut entries = self.entries.write();
        // write through links
        let target = match Self::resolve(&entries, location) {
            Ok((k, _)) => k,
            Err(e) if e.kind() == io::ErrorKind::NotFound => key(location),
            Err(e) => return Err(e),
        };
        entries.insert(target, Entry::new(Kind::Object(buf.into())));
        Ok(len)
    }

    #[instrument(skip(self))]
    async fn get_bytes(&self, location: &str) -> io::Result<ByteReader> {
        let (_, entry) = Self::resolve(&self.entries.read(), location)?;
        match entry.kind {
            Kind::Object(data) => Ok(Box::new(Cursor::new(data))),
            _ => Err(io::Error::other(format!("{} is a container", location))),
        }
    }

    #[instrument(skip(self))]
    async fn remove_bytes(&self, location: &str, recursive: bool) -> io::Result<()> {
        let location = key(location);
        let mut entries = self.entries.write();
        if recursive {
            for (k, _) in Self::subtree(&entries, &location) {
                entries.remove(&k);
            }
        } else {
            entries.remove(&location);
        }
        Ok(())
    }

    async fn size(&self, location: &str) -> io::Result<u64> {
        let (_, entry) = Self::resolve(&self.entries.read(), location)?;
        Ok(match entry.kind {
            Kind::Object(data) => data.len() as u64,
            _ => 0,
        })
    }

    async fn last_modified(&self, location: &str) -> io::Result<DateTime<Utc>> {
        let (_, entry) = Self::resolve(&self.entries.read(), location)?;
        Ok(entry.modified)
    }

    async fn checksum(&self, location: &str) -> io::Result<String> {
        let (_, entry) = Self::resolve(&self.entries.read(), location)?;
        match entry.kind {
            Kind::Object(data) => Ok(HEXLOWER.encode(&Md5::digest(&data))),
            _ => Err(io::Error::other(format!("{} is a container", location))),
        }
    }
}
