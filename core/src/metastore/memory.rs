use async_trait::async_trait;
use chrono::Utc;
use parking_lot::RwLock;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tracing::instrument;

use super::{targets_any, MetadataStore, NodeRecord, PropertyRecord, TransferRecord};
use crate::nodes::Node;
use crate::properties::PropertyAttributes;
use crate::uri::NodeUri;
use crate::Error;

#[derive(Default)]
struct State {
    nodes: BTreeMap<NodeUri, NodeRecord>,
    properties: BTreeMap<String, PropertyRecord>,
    transfers: HashMap<String, TransferRecord>,
    results: HashMap<String, String>,
    capabilities: BTreeMap<(NodeUri, String), Option<u16>>,
}

/// Keeps everything in process memory. Useful for tests and throwaway spaces.
#[derive(Clone, Default)]
pub struct MemoryMetadataStore {
    state: Arc<RwLock<State>>,
}

impl State {
    fn descendants(&self, uri: &NodeUri) -> Vec<NodeUri> {
        self.nodes
            .keys()
            .filter(|k| *k != uri && k.is_within(uri))
            .cloned()
            .collect()
    }
}

#[async_trait]
impl MetadataStore for MemoryMetadataStore {
    #[instrument(skip(self), fields(node.uri = %uri))]
    async fn get_record(&self, uri: &NodeUri) -> Result<Option<NodeRecord>, Error> {
        Ok(self.state.read().nodes.get(uri).cloned())
    }

    #[instrument(skip_all, fields(node.uri = %record.uri))]
    async fn store_data(&self, record: NodeRecord) -> Result<(), Error> {
        let mut state = self.state.write();
        if state.nodes.contains_key(&record.uri) {
            return Err(Error::DuplicateNode(record.uri.to_string()));
        }
        state.nodes.insert(record.uri.clone(), record);
        Ok(())
    }

    #[instrument(skip(self, node), fields(node.uri = %uri))]
    async fn update_data(&self, uri: &NodeUri, node: &Node) -> Result<(), Error> {
        let mut state = self.state.write();
        let record = state
            .nodes
            .get_mut(uri)
            .ok_or_else(|| Error::NodeNotFound(uri.to_string()))?;

        let mut node = node.clone();
        node.clear_children();
        record.node = node;
        record.last_modified = Utc::now();
        Ok(())
    }

    #[instrument(skip(self, node), fields(node.uri = %old, node.new_uri = %new))]
    async fn rename_data(
        &self,
        old: &NodeUri,
        new: &NodeUri,
        location: &str,
        node: &Node,
    ) -> Result<(), Error> {
        let mut state = self.state.write();
        if old != new && state.nodes.contains_key(new) {
            return Err(Error::DuplicateNode(new.to_string()));
        }
        let mut record = state
            .nodes
            .remove(old)
            .ok_or_else(|| Error::NodeNotFound(old.to_string()))?;

        let mut node = node.clone();
        node.clear_children();
        record.uri = new.clone();
        record.location = location.to_string();
        record.node = node;
        record.last_modified = Utc::now();
        state.nodes.insert(new.clone(), record);

        // capability registrations follow the node
        let moved: Vec<_> = state
            .capabilities
            .keys()
            .filter(|(n, _)| n == old)
            .cloned()
            .collect();
        for key in moved {
            if let Some(port) = state.capabilities.remove(&key) {
                state.capabilities.insert((new.clone(), key.1), port);
            }
        }
        Ok(())
    }

    #[instrument(skip(self), fields(node.uri = %uri))]
    async fn remove_data(
        &self,
        uri: &NodeUri,
        recursive: bool,
    ) -> Result<Vec<NodeRecord>, Error> {
        let mut state = self.state.write();
        if !state.nodes.contains_key(uri) {
            return Err(Error::NodeNotFound(uri.to_string()));
        }

        let mut removed = vec![uri.clone()];
        if recursive {
            removed.extend(state.descendants(uri));
        }
        for r in &removed {
            state.nodes.remove(r);
        }

        let links: Vec<NodeUri> = state
            .nodes
            .values()
            .filter(|record| targets_any(record, &removed))
            .map(|record| record.uri.clone())
            .collect();
        let links: Vec<NodeRecord> = links
            .iter()
            .filter_map(|link| state.nodes.remove(link))
            .collect();

        state.capabilities.retain(|(n, _), _| {
            !removed.contains(n) && !links.iter().any(|l| &l.uri == n)
        });

        Ok(links)
    }

    #[instrument(skip(self), fields(node.uri = %uri))]
    async fn get_children(
        &self,
        uri: &NodeUri,
        limit: Option<usize>,
    ) -> Result<Vec<NodeUri>, Error> {
        let state = self.state.read();
        Ok(state
            .nodes
            .keys()
            .filter(|k| k.parent().as_ref() == Some(uri))
            .take(limit.unwrap_or(usize::MAX))
            .cloned()
            .collect())
    }

    #[instrument(skip(self), fields(node.uri = %uri))]
    async fn get_all_children(&self, uri: &NodeUri) -> Result<Vec<NodeUri>, Error> {
        Ok(self.state.read().descendants(uri))
    }

    #[instrument(skip(self), fields(node.uri = %uri))]
    async fn set_busy(&self, uri: &NodeUri, expected: bool, busy: bool) -> Result<bool, Error> {
        let mut state = self.state.write();
        let record = state
            .nodes
            .get_mut(uri)
            .ok_or_else(|| Error::NodeNotFound(uri.to_string()))?;

        if !record.node_type.is_data() {
            return Ok(true);
        }
        if record.node.busy() != expected {
            return Ok(false);
        }
        record.node.set_busy(busy);
        record.last_modified = Utc::now();
        Ok(true)
    }

    async fn get_property(&self, property: &str) -> Result<Option<PropertyRecord>, Error> {
        Ok(self.state.read().properties.get(property).copied())
    }

    #[instrument(skip(self))]
    async fn register_property(
        &self,
        property: &str,
        attributes: PropertyAttributes,
        read_only: bool,
    ) -> Result<(), Error> {
        self.state.write().properties.insert(
            property.to_string(),
            PropertyRecord {
                attributes,
                read_only,
            },
        );
        Ok(())
    }

    async fn get_properties(&self, attributes: PropertyAttributes) -> Result<Vec<String>, Error> {
        Ok(self
            .state
            .read()
            .properties
            .iter()
            .filter(|(_, p)| p.attributes.intersects(attributes))
            .map(|(uri, _)| uri.clone())
            .collect())
    }

    #[instrument(skip(self))]
    async fn store_transfer(&self, job_id: &str, endpoint: &str) -> Result<(), Error> {
        self.state.write().transfers.insert(
            endpoint.to_string(),
            TransferRecord {
                job_id: job_id.to_string(),
                endpoint: endpoint.to_string(),
                created: Utc::now(),
                completed: false,
            },
        );
        Ok(())
    }

    async fn get_transfer(&self, endpoint: &str) -> Result<Option<TransferRecord>, Error> {
        Ok(self.state.read().transfers.get(endpoint).cloned())
    }

    async fn is_completed(&self, job_id: &str) -> Result<bool, Error> {
        Ok(self
            .state
            .read()
            .transfers
            .values()
            .any(|t| t.job_id == job_id && t.completed))
    }

    #[instrument(skip(self))]
    async fn complete_transfer(&self, endpoint: &str) -> Result<(), Error> {
        let mut state = self.state.write();
        let transfer = state
            .transfers
            .get_mut(endpoint)
            .ok_or_else(|| Error::NodeNotFound(endpoint.to_string()))?;
        transfer.completed = true;
        Ok(())
    }

    async fn add_result(&self, job_id: &str, result: &str) -> Result<(), Error> {
        self.state
            .write()
            .results
            .insert(job_id.to_string(), result.to_string());
        Ok(())
    }

    async fn get_result(&self, job_id: &str) -> Result<Option<String>, Error> {
        Ok(self.state.read().results.get(job_id).cloned())
    }

    async fn register_capability(&self, uri: &NodeUri, capability: &str) -> Result<(), Error> {
        self.state
            .write()
            .capabilities
            .entry((uri.clone(), capability.to_string()))
            .or_insert(None);
        Ok(())
    }

    async fn is_active(&self, uri: &NodeUri, capability: &str) -> Result<Option<u16>, Error> {
        Ok(self
            .state
            .read()
            .capabilities
            .get(&(uri.clone(), capability.to_string()))
            .copied()
            .flatten())
    }

    #[instrument(skip(self), fields(node.uri = %uri))]
    async fn set_active(
        &self,
        uri: &NodeUri,
        capability: &str,
        port: Option<u16>,
    ) -> Result<(), Error> {
        let mut state = self.state.write();
        match state
            .capabilities
            .get_mut(&(uri.clone(), capability.to_string()))
        {
            Some(active) => {
                *active = port;
                Ok(())
            }
            None => Err(Error::NodeNotFound(format!(
                "capability {} is not registered on {}",
                capability, uri
            ))),
        }
    }

    async fn get_cap_port(&self) -> Result<Option<u16>, Error> {
        Ok(self
            .state
            .read()
            .capabilities
            .values()
            .copied()
            .flatten()
            .max())
    }
}
