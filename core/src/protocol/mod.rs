//! Protocol handlers negotiate concrete transport endpoints and move bytes
//! between a storage backend and the outside world.
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::io;
use std::sync::Arc;

use crate::config::{HandlerKind, ProtocolEntry, ProtocolsConfig};
use crate::storage::StorageBackend;
use crate::uri::NodeUri;
use crate::Error;

mod http;

pub use self::http::{HttpGet, HttpPut};

/// Default base URL of minted endpoints.
const DEFAULT_BASE_URL: &str = "http://localhost:7007";

/// Which side of a transfer the space plays.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Role {
    /// The space connects to an endpoint supplied by the client.
    Client,
    /// The space hands out an endpoint the client connects to.
    Server,
}

/// A transport mechanism, as proposed by a client and completed by a handler.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Protocol {
    pub uri: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub params: BTreeMap<String, String>,
}

impl Protocol {
    pub fn new(uri: impl Into<String>) -> Self {
        Self {
            uri: uri.into(),
            endpoint: None,
            params: BTreeMap::new(),
        }
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = Some(endpoint.into());
        self
    }
}

#[async_trait]
pub trait ProtocolHandler: Send + Sync {
    /// The protocol URI this handler implements.
    fn uri(&self) -> &str;

    /// Fills in the concrete details of a protocol for the given role.
    async fn admin(&self, node: &NodeUri, protocol: Protocol, role: Role)
        -> Result<Protocol, Error>;

    /// Performs the transfer for the object at `location`. Returns whether
    /// the transfer succeeded.
    async fn invoke(
        &self,
        protocol: &Protocol,
        location: &str,
        storage: &dyn StorageBackend,
    ) -> io::Result<bool>;
}

/// The protocol handlers of a space, keyed by protocol URI, plus the lists
/// of protocols advertised in each role.
#[derive(Clone, Default)]
pub struct ProtocolRegistry {
    handlers: BTreeMap<String, Arc<dyn ProtocolHandler>>,
    server: Vec<String>,
    client: Vec<String>,
}

fn build(entry: &ProtocolEntry) -> Arc<dyn ProtocolHandler> {
    let base_url = entry.base_url.as_deref().unwrap_or(DEFAULT_BASE_URL);
    match entry.kind {
        HandlerKind::HttpGet => Arc::new(HttpGet::new(base_url)),
        HandlerKind::HttpPut => Arc::new(HttpPut::new(base_url)),
    }
}

impl ProtocolRegistry {
    pub fn from_config(config: &ProtocolsConfig) -> Self {
        let mut registry = Self::default();
        for entry in &config.server {
            registry.register(build(entry), true);
        }
        for entry in &config.client {
            registry.register(build(entry), false);
        }
        registry
    }

    /// Adds a handler, to the server list if `server` is set and to the
    /// client list otherwise. A later handler for the same URI replaces an
    /// earlier one.
    pub fn register(&mut self, handler: Arc<dyn ProtocolHandler>, server: bool) {
        let uri = handler.uri().to_string();
        let list = if server {
            &mut self.server
        } else {
            &mut self.client
        };
        if !list.contains(&uri) {
            list.push(uri.clone());
        }
        self.handlers.insert(uri, handler);
    }

    pub fn get(&self, uri: &str) -> Option<&Arc<dyn ProtocolHandler>> {
        self.handlers.get(uri)
    }

    pub fn server_protocols(&self) -> &[String] {
        &self.server
    }

    pub fn client_protocols(&self) -> &[String] {
        &self.client
    }
}
