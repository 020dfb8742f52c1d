use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::nodes::NodeType;
use crate::transfer::CompletionStrategy;
use crate::uri::NodeUri;
use crate::views::ViewLists;
use crate::Error;

/// URI of the HTTP GET protocol.
pub const HTTP_GET: &str = "ivo://ivoa.net/vospace/core#httpget";
/// URI of the HTTP PUT protocol.
pub const HTTP_PUT: &str = "ivo://ivoa.net/vospace/core#httpput";

fn default_addr() -> String {
    "memory://".to_string()
}

/// Everything needed to wire up one space.
#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct SpaceConfig {
    /// The root container, e.g. `vos://example.org!vospace`.
    pub root_node: NodeUri,

    #[serde(default = "default_addr")]
    pub metadata_store_addr: String,

    /// Also used as the base of every physical location.
    #[serde(default = "default_addr")]
    pub storage_addr: String,

    /// External authorization service. Tokens are checked locally if unset.
    #[serde(default)]
    pub auth_url: Option<String>,

    #[serde(default)]
    pub supports_structure: bool,

    #[serde(default)]
    pub views: ViewsConfig,

    #[serde(default)]
    pub protocols: ProtocolsConfig,

    #[serde(default)]
    pub capabilities: CapabilitiesConfig,

    #[serde(default)]
    pub transfers: TransferConfig,
}

#[derive(Clone, Debug, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ViewsConfig {
    #[serde(default)]
    pub accepts: ViewLists,
    #[serde(default)]
    pub provides: ViewLists,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum HandlerKind {
    HttpGet,
    HttpPut,
}

impl HandlerKind {
    pub fn protocol_uri(&self) -> &'static str {
        match self {
            HandlerKind::HttpGet => HTTP_GET,
            HandlerKind::HttpPut => HTTP_PUT,
        }
    }
}

/// One protocol handler the space offers.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ProtocolEntry {
    pub kind: HandlerKind,
    /// Endpoints minted in server role live below this URL.
    #[serde(default)]
    pub base_url: Option<String>,
}

#[derive(Clone, Debug, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ProtocolsConfig {
    /// Protocols the space serves endpoints for.
    #[serde(default)]
    pub server: Vec<ProtocolEntry>,
    /// Protocols the space can act as a client for.
    #[serde(default)]
    pub client: Vec<ProtocolEntry>,
}

#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct CapabilityEntry {
    /// Appended to the base IVORN as the URI fragment.
    pub name: String,
    pub applies_to: Vec<NodeType>,
}

#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct RunnerConfig {
    /// Program and leading arguments of the capability runner.
    pub command: Vec<String>,
    pub port: u16,
}

#[derive(Clone, Debug, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct CapabilitiesConfig {
    #[serde(default)]
    pub base_ivorn: String,
    #[serde(default)]
    pub entries: Vec<CapabilityEntry>,
    #[serde(default)]
    pub runner: Option<RunnerConfig>,
}

#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(deny_unknown_fields, default)]
pub struct TransferConfig {
    pub poll_interval_ms: u64,
    pub export_check_interval_ms: u64,
    pub export_ceiling_secs: u64,
    pub export_completion: CompletionStrategy,
}

impl Default for TransferConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: 1000,
            export_check_interval_ms: 5000,
            export_ceiling_secs: 3600,
            export_completion: CompletionStrategy::default(),
        }
    }
}

impl TransferConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn export_check_interval(&self) -> Duration {
        Duration::from_millis(self.export_check_interval_ms)
    }

    pub fn export_ceiling(&self) -> Duration {
        Duration::from_secs(self.export_ceiling_secs)
    }
}

impl SpaceConfig {
    /// A space with everything in memory and nothing configured.
    pub fn new(root_node: NodeUri) -> Self {
        Self {
            root_node,
            metadata_store_addr: default_addr(),
            storage_addr: default_addr(),
            auth_url: None,
            supports_structure: false,
            views: ViewsConfig::default(),
            protocols: ProtocolsConfig::default(),
            capabilities: CapabilitiesConfig::default(),
            transfers: TransferConfig::default(),
        }
    }

    pub fn from_toml(s: &str) -> Result<Self, Error> {
        let config: SpaceConfig =
            toml::from_str(s).map_err(|e| Error::InvalidData(format!("bad config: {}", e)))?;
        if !config.root_node.is_root() {
            return Err(Error::InvalidData(format!(
                "root node {} has a path",
                config.root_node
            )));
        }
        Ok(config)
    }

    pub async fn load(path: &Path) -> Result<Self, Error> {
        let contents = tokio::fs::read_to_string(path).await?;
        Self::from_toml(&contents)
    }

    /// URIs of all configured capabilities.
    pub fn capability_uris(&self) -> impl Iterator<Item = String> + '_ {
        self.capabilities
            .entries
            .iter()
            .map(|c| format!("{}#{}", self.capabilities.base_ivorn, c.name))
    }
}
