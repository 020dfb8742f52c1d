use async_trait::async_trait;
use tracing::{debug, instrument};

use super::{Capability, CapabilityInvocation};
use crate::nodes::NodeType;
use crate::Error;

/// Notifies the locally running capability process about a written node.
pub struct RunnerCapability {
    uri: String,
    applies_to: Vec<NodeType>,
    client: reqwest::Client,
}

impl RunnerCapability {
    pub fn new(uri: String, applies_to: Vec<NodeType>) -> Self {
        Self {
            uri,
            applies_to,
            client: reqwest::Client::new(),
        }
    }
}

#[async_trait]
impl Capability for RunnerCapability {
    fn uri(&self) -> &str {
        &self.uri
    }

    fn applies_to(&self, node_type: NodeType) -> bool {
        self.applies_to.contains(&node_type)
    }

    #[instrument(skip_all, fields(node.uri = %invocation.node, port = invocation.port))]
    async fn invoke(&self, invocation: &CapabilityInvocation<'_>) -> Result<bool, Error> {
        let resp = self
            .client
            .post(format!("http://localhost:{}/notify", invocation.port))
            .form(&[
                ("node", invocation.node.as_str()),
                ("name", invocation.location),
                ("cap", invocation.capability),
            ])
            .send()
            .await?;

        let status = resp.status();
        let body = resp.text().await.unwrap_or_default();
        debug!(%status, %body, "runner notified");
        Ok(status.is_success())
    }
}
