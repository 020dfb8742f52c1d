//! Capabilities are external processing hooks attached to nodes, triggered
//! after data was written below them.
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::process::{Child, Command};
use tracing::{info, warn};

use crate::config::{CapabilitiesConfig, RunnerConfig};
use crate::nodes::NodeType;
use crate::uri::NodeUri;
use crate::Error;

mod runner;

pub use self::runner::RunnerCapability;

/// Name suffix of the file that activates a capability on its container.
pub const CAP_CONF_SUFFIX: &str = ".cap.conf";

/// Arguments of one capability invocation.
#[derive(Clone, Debug)]
pub struct CapabilityInvocation<'a> {
    /// The node whose write triggered the capability.
    pub node: &'a NodeUri,
    /// Physical location of that node.
    pub location: &'a str,
    pub capability: &'a str,
    /// Port the capability process listens on.
    pub port: u16,
}

#[async_trait]
pub trait Capability: Send + Sync {
    fn uri(&self) -> &str;

    /// Whether nodes of this type carry the capability.
    fn applies_to(&self, node_type: NodeType) -> bool;

    async fn invoke(&self, invocation: &CapabilityInvocation<'_>) -> Result<bool, Error>;
}

/// All capabilities of a space, and the process backing them.
#[derive(Default)]
pub struct CapabilityRegistry {
    capabilities: BTreeMap<String, Arc<dyn Capability>>,
    runner: Option<RunnerConfig>,
    process: Mutex<Option<Child>>,
}

impl CapabilityRegistry {
    pub fn from_config(config: &CapabilitiesConfig) -> Self {
        let mut registry = Self {
            runner: config.runner.clone(),
            ..Default::default()
        };
        for entry in &config.entries {
            registry.register(Arc::new(RunnerCapability::new(
                format!("{}#{}", config.base_ivorn, entry.name),
                entry.applies_to.clone(),
            )));
        }
        registry
    }

    pub fn register(&mut self, capability: Arc<dyn Capability>) {
        self.capabilities
            .insert(capability.uri().to_string(), capability);
    }

    pub fn get(&self, uri: &str) -> Option<&Arc<dyn Capability>> {
        self.capabilities.get(uri)
    }

    pub fn uris(&self) -> impl Iterator<Item = &str> {
        self.capabilities.keys().map(String::as_str)
    }

    /// URIs of the capabilities nodes of this type carry.
    pub fn applicable(&self, node_type: NodeType) -> Vec<String> {
        self.capabilities
            .values()
            .filter(|c| c.applies_to(node_type))
            .map(|c| c.uri().to_string())
            .collect()
    }

    /// Makes sure the capability runner is up, spawning it with the given
    /// configuration file if no process is running yet. Returns the port it
    /// listens on, or None if no runner is configured.
    ///
    /// A runner with an empty command line is managed outside of this
    /// process, and never spawned.
    pub fn ensure_runner(&self, config_location: &str) -> Result<Option<u16>, Error> {
        let Some(runner) = &self.runner else {
            return Ok(None);
        };
        let Some((program, args)) = runner.command.split_first() else {
            return Ok(Some(runner.port));
        };

        let mut process = self.process.lock();
        if let Some(child) = process.as_mut() {
            match child.try_wait()? {
                None => return Ok(Some(runner.port)),
                Some(status) => warn!(%status, "capability runner exited, restarting"),
            }
        }

        let config = config_location
            .strip_prefix("file://")
            .unwrap_or(config_location);
        let child = Command::new(program)
            .args(args)
            .arg("--port")
            .arg(runner.port.to_string())
            .arg("--config")
            .arg(config)
            .kill_on_drop(true)
            .spawn()?;
        info!(pid = ?child.id(), port = runner.port, "spawned capability runner");
        *process = Some(child);

        Ok(Some(runner.port))
    }

    pub fn is_running(&self) -> bool {
        self.process
            .lock()
            .as_mut()
            .is_some_and(|c| matches!(c.try_wait(), Ok(None)))
    }
}

/// The short name a capability configuration file activates, if `name` is
/// one (e.g. `tableingester` for `tableingester.cap.conf`).
pub fn short_name(name: &str) -> Option<&str> {
    name.strip_suffix(CAP_CONF_SUFFIX).filter(|s| !s.is_empty())
}
