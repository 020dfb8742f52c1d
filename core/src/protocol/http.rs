use async_trait::async_trait;
use futures::TryStreamExt;
use std::io;
use tokio_util::io::{ReaderStream, StreamReader};
use tracing::{instrument, warn};
use url::Url;
use uuid::Uuid;

use super::{Protocol, ProtocolHandler, Role};
use crate::config::{HTTP_GET, HTTP_PUT};
use crate::storage::StorageBackend;
use crate::uri::NodeUri;
use crate::Error;

/// Mints `<base_url>/<uuid>` endpoints in server role, and checks client
/// supplied endpoints are plain http(s) URLs in client role.
fn admin(base_url: &str, mut protocol: Protocol, role: Role) -> Result<Protocol, Error> {
    match role {
        Role::Server => {
            protocol.endpoint = Some(format!(
                "{}/{}",
                base_url.trim_end_matches('/'),
                Uuid::new_v4()
            ));
        }
        Role::Client => {
            let valid = protocol
                .endpoint
                .as_deref()
                .and_then(|e| Url::parse(e).ok())
                .is_some_and(|u| {
                    matches!(u.scheme(), "http" | "https") && u.host_str().is_some()
                });
            if !valid {
                return Err(Error::InternalFault(format!(
                    "destination URI {:?} is invalid",
                    protocol.endpoint
                )));
            }
        }
    }
    Ok(protocol)
}

fn endpoint(protocol: &Protocol) -> Option<&str> {
    let endpoint = protocol.endpoint.as_deref();
    if endpoint.is_none() {
        warn!(protocol.uri = %protocol.uri, "protocol has no endpoint");
    }
    endpoint
}

/// Moves bytes into the space by fetching them from an endpoint.
#[derive(Clone)]
pub struct HttpGet {
    base_url: String,
    client: reqwest::Client,
}

impl HttpGet {
    pub fn new(base_url: &str) -> Self {
        Self {
            base_url: base_url.to_string(),
            client: reqwest::Client::new(),
        }
    }
}

#[async_trait]
impl ProtocolHandler for HttpGet {
    fn uri(&self) -> &str {
        HTTP_GET
    }

    async fn admin(
        &self,
        _node: &NodeUri,
        protocol: Protocol,
        role: Role,
    ) -> Result<Protocol, Error> {
        admin(&self.base_url, protocol, role)
    }

    #[instrument(skip(self, protocol, storage), fields(protocol.endpoint = ?protocol.endpoint))]
    async fn invoke(
        &self,
        protocol: &Protocol,
        location: &str,
        storage: &dyn StorageBackend,
    ) -> io::Result<bool> {
        let Some(endpoint) = endpoint(protocol) else {
            return Ok(false);
        };

        let resp = self
            .client
            .get(endpoint)
            .send()
            .await
            .map_err(io::Error::other)?;
        if !resp.status().is_success() {
            return Err(io::Error::other(format!(
                "GET {} answered {}",
                endpoint,
                resp.status()
            )));
        }

        let body = resp.bytes_stream().map_err(io::Error::other);
        storage
            .put_bytes(location, Box::new(StreamReader::new(Box::pin(body))))
            .await?;
        Ok(true)
    }
}

/// Moves bytes out of the space by uploading them to an endpoint.
#[derive(Clone)]
pub struct HttpPut {
    base_url: String,
    client: reqwest::Client,
}

impl HttpPut {
    pub fn new(base_url: &str) -> Self {
        Self {
            base_url: base_url.to_string(),
            client: reqwest::Client::new(),
        }
    }
}

#[async_trait]
impl ProtocolHandler for HttpPut {
    fn uri(&self) -> &str {
        HTTP_PUT
    }

    async fn admin(
        &self,
        _node: &NodeUri,
        protocol: Protocol,
        role: Role,
    ) -> Result<Protocol, Error> {
        admin(&self.base_url, protocol, role)
    }

    #[instrument(skip(self, protocol, storage), fields(protocol.endpoint = ?protocol.endpoint))]
    async fn invoke(
        &self,
        protocol: &Protocol,
        location: &str,
        storage: &dyn StorageBackend,
    ) -> io::Result<bool> {
        let Some(endpoint) = endpoint(protocol) else {
            return Ok(false);
        };

        let size = storage.size(location).await?;
        let reader = storage.get_bytes(location).await?;
        let resp = self
            .client
            .put(endpoint)
            .header(reqwest::header::CONTENT_LENGTH, size)
            .body(reqwest::Body::wrap_stream(ReaderStream::new(reader)))
            .send()
            .await
            .map_err(io::Error::other)?;

        if !resp.status().is_success() {
            warn!(status = %resp.status(), "upload rejected");
        }
        Ok(resp.status().is_success())
    }
}
