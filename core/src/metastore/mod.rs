use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::nodes::{Node, NodeType};
use crate::properties::PropertyAttributes;
use crate::uri::NodeUri;
use crate::Error;

mod from_addr;
mod memory;
mod redb;


pub use self::from_addr::from_addr;
pub use self::memory::MemoryMetadataStore;
pub use self::redb::RedbMetadataStore;

/// Everything the store keeps about one node.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeRecord {
    pub uri: NodeUri,
    pub node_type: NodeType,
    /// The view the stored bytes are in.
    pub view: String,
    pub owner: String,
    /// Physical location of the bytes, as understood by the storage backend.
    pub location: String,
    pub node: Node,
    /// Bumped on every write to the record.
    pub last_modified: DateTime<Utc>,
}

impl NodeRecord {
    pub fn new(node: Node, view: &str, owner: &str, location: &str) -> Self {
        let mut node = node;
        node.clear_children();
        Self {
            uri: node.uri.clone(),
            node_type: node.node_type(),
            view: view.to_string(),
            owner: owner.to_string(),
            location: location.to_string(),
            node,
            last_modified: Utc::now(),
        }
    }
}

/// Bookkeeping for one negotiated transfer endpoint.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferRecord {
    pub job_id: String,
    pub endpoint: String,
    pub created: DateTime<Utc>,
    pub completed: bool,
}

/// A registered property and its flags.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PropertyRecord {
    pub attributes: PropertyAttributes,
    pub read_only: bool,
}

/// The durable store of node documents, the property registry, transfer
/// records, job results and capability activation state.
///
/// Implementations need to be safe for concurrent use by request handlers and
/// transfer jobs, and must not cache documents: every read reflects the
/// latest write.
#[async_trait]
pub trait MetadataStore: Send + Sync {
    /// Whether a node is stored at the given URI.
    async fn is_stored(&self, uri: &NodeUri) -> Result<bool, Error> {
        Ok(self.get_type(uri).await?.is_some())
    }

    /// The type of the node stored at the given URI, if any.
    async fn get_type(&self, uri: &NodeUri) -> Result<Option<NodeType>, Error> {
        Ok(self.get_record(uri).await?.map(|r| r.node_type))
    }

    async fn get_record(&self, uri: &NodeUri) -> Result<Option<NodeRecord>, Error>;

    /// Inserts a new record. Fails with [Error::DuplicateNode] if one exists.
    async fn store_data(&self, record: NodeRecord) -> Result<(), Error>;

    /// Replaces the document of an existing record.
    /// Fails with [Error::NodeNotFound] if there is none.
    async fn update_data(&self, uri: &NodeUri, node: &Node) -> Result<(), Error>;

    /// Moves a record to a new URI and location, replacing its document.
    async fn rename_data(
        &self,
        old: &NodeUri,
        new: &NodeUri,
        location: &str,
        node: &Node,
    ) -> Result<(), Error>;

    /// Removes a record, and all of its descendants if `recursive` is set.
    /// Link records targeting any removed node are removed as well, and
    /// returned so their bytes can be cleaned up.
    async fn remove_data(&self, uri: &NodeUri, recursive: bool)
        -> Result<Vec<NodeRecord>, Error>;

    /// Direct children, in lexicographic order, up to `limit` of them.
    async fn get_children(
        &self,
        uri: &NodeUri,
        limit: Option<usize>,
    ) -> Result<Vec<NodeUri>, Error>;

    /// All descendants, parents before their children.
    async fn get_all_children(&self, uri: &NodeUri) -> Result<Vec<NodeUri>, Error>;

    /// The target of a link node.
    async fn get_target(&self, uri: &NodeUri) -> Result<Option<NodeUri>, Error> {
        Ok(self
            .get_record(uri)
            .await?
            .and_then(|r| r.node.target().cloned()))
    }

    /// Sets the busy flag of a data node to `busy` if it currently is
    /// `expected`. Returns whether the swap happened. Nodes without a busy
    /// flag always swap.
    async fn set_busy(&self, uri: &NodeUri, expected: bool, busy: bool) -> Result<bool, Error>;

    async fn get_property_value(
        &self,
        uri: &NodeUri,
        property: &str,
    ) -> Result<Option<String>, Error> {
        Ok(self
            .get_record(uri)
            .await?
            .and_then(|r| r.node.property(property).map(str::to_string)))
    }

    async fn is_known_property(&self, property: &str) -> Result<bool, Error> {
        Ok(self.get_property(property).await?.is_some())
    }

    async fn get_property(&self, property: &str) -> Result<Option<PropertyRecord>, Error>;

    /// Adds a property to the registry, or replaces its flags.
    async fn register_property(
        &self,
        property: &str,
        attributes: PropertyAttributes,
        read_only: bool,
    ) -> Result<(), Error>;

    async fn is_read_only(&self, property: &str) -> Result<bool, Error> {
        Ok(self.get_property(property).await?.is_some_and(|p| p.read_only))
    }

    /// All registered properties carrying any of the given attributes.
    async fn get_properties(&self, attributes: PropertyAttributes) -> Result<Vec<String>, Error>;

    /// Records a negotiated endpoint for a job.
    async fn store_transfer(&self, job_id: &str, endpoint: &str) -> Result<(), Error>;

    async fn get_transfer(&self, endpoint: &str) -> Result<Option<TransferRecord>, Error>;

    /// Whether any endpoint of the job was flagged complete.
    async fn is_completed(&self, job_id: &str) -> Result<bool, Error>;

    /// Flags an endpoint complete. Fails with [Error::NodeNotFound] for
    /// unknown endpoints.
    async fn complete_transfer(&self, endpoint: &str) -> Result<(), Error>;

    async fn add_result(&self, job_id: &str, result: &str) -> Result<(), Error>;

    async fn get_result(&self, job_id: &str) -> Result<Option<String>, Error>;

    async fn register_capability(&self, uri: &NodeUri, capability: &str) -> Result<(), Error>;

    /// The port a capability on a node listens on, if it is active.
    async fn is_active(&self, uri: &NodeUri, capability: &str) -> Result<Option<u16>, Error>;

    /// Activates a capability on a node with the port it listens on, or
    /// deactivates it with `None`.
    async fn set_active(
        &self,
        uri: &NodeUri,
        capability: &str,
        port: Option<u16>,
    ) -> Result<(), Error>;

    /// The highest port of any active capability.
    async fn get_cap_port(&self) -> Result<Option<u16>, Error>;
}

#[async_trait]
impl<A> MetadataStore for A
where
    A: AsRef<dyn MetadataStore> + Send + Sync,
{
    async fn is_stored(&self, uri: &NodeUri) -> Result<bool, Error> {
        self.as_ref().is_stored(uri).await
    }

    async fn get_type(&self, uri: &NodeUri) -> Result<Option<NodeType>, Error> {
        self.as_ref().get_type(uri).await
    }

    async fn get_record(&self, uri: &NodeUri) -> Result<Option<NodeRecord>, Error> {
        self.as_ref().get_record(uri).await
    }

    async fn store_data(&self, record: NodeRecord) -> Result<(), Error> {
        self.as_ref().store_data(record).await
    }

    async fn update_data(&self, uri: &NodeUri, node: &Node) -> Result<(), Error> {
        self.as_ref().update_data(uri, node).await
    }

    async fn rename_data(
        &self,
        old: &NodeUri,
        new: &NodeUri,
        location: &str,
        node: &Node,
    ) -> Result<(), Error> {
        self.as_ref().rename_data(old, new, location, node).await
    }

    async fn remove_data(
        &self,
        uri: &NodeUri,
        recursive: bool,
    ) -> Result<Vec<NodeRecord>, Error> {
        self.as_ref().remove_data(uri, recursive).await
    }

    async fn get_children(
        &self,
        uri: &NodeUri,
        limit: Option<usize>,
    ) -> Result<Vec<NodeUri>, Error> {
        self.as_ref().get_children(uri, limit).await
    }

    async fn get_all_children(&self, uri: &NodeUri) -> Result<Vec<NodeUri>, Error> {
        self.as_ref().get_all_children(uri).await
    }

    async fn get_target(&self, uri: &NodeUri) -> Result<Option<NodeUri>, Error> {
        self.as_ref().get_target(uri).await
    }

    async fn set_busy(&self, uri: &NodeUri, expected: bool, busy: bool) -> Result<bool, Error> {
        self.as_ref().set_busy(uri, expected, busy).await
    }

    async fn get_property_value(
        &self,
        uri: &NodeUri,
        property: &str,
    ) -> Result<Option<String>, Error> {
        self.as_ref().get_property_value(uri, property).await
    }

    async fn is_known_property(&self, property: &str) -> Result<bool, Error> {
        self.as_ref().is_known_property(property).await
    }

    async fn get_property(&self, property: &str) -> Result<Option<PropertyRecord>, Error> {
        self.as_ref().get_property(property).await
    }

    async fn register_property(
        &self,
        property: &str,
        attributes: PropertyAttributes,
        read_only: bool,
    ) -> Result<(), Error> {
        self.as_ref()
            .register_property(property, attributes, read_only)
            .await
    }

    async fn is_read_only(&self, property: &str) -> Result<bool, Error> {
        self.as_ref().is_read_only(property).await
    }

    async fn get_properties(&self, attributes: PropertyAttributes) -> Result<Vec<String>, Error> {
        self.as_ref().get_properties(attributes).await
    }

    async fn store_transfer(&self, job_id: &str, endpoint: &str) -> Result<(), Error> {
        self.as_ref().store_transfer(job_id, endpoint).await
    }

    async fn get_transfer(&self, endpoint: &str) -> Result<Option<TransferRecord>, Error> {
        self.as_ref().get_transfer(endpoint).await
    }

    async fn is_completed(&self, job_id: &str) -> Result<bool, Error> {
        self.as_ref().is_completed(job_id).await
    }

    async fn complete_transfer(&self, endpoint: &str) -> Result<(), Error> {
        self.as_ref().complete_transfer(endpoint).await
    }

    async fn add_result(&self, job_id: &str, result: &str) -> Result<(), Error> {
        self.as_ref().add_result(job_id, result).await
    }

    async fn get_result(&self, job_id: &str) -> Result<Option<String>, Error> {
        self.as_ref().get_result(job_id).await
    }

    async fn register_capability(&self, uri: &NodeUri, capability: &str) -> Result<(), Error> {
        self.as_ref().register_capability(uri, capability).await
    }

    async fn is_active(&self, uri: &NodeUri, capability: &str) -> Result<Option<u16>, Error> {
        self.as_ref().is_active(uri, capability).await
    }

    async fn set_active(
        &self,
        uri: &NodeUri,
        capability: &str,
        port: Option<u16>,
    ) -> Result<(), Error> {
        self.as_ref().set_active(uri, capability, port).await
    }

    async fn get_cap_port(&self) -> Result<Option<u16>, Error> {
        self.as_ref().get_cap_port().await
    }
}

/// Whether a stored link target points into any of the removed subtrees.
pub(crate) fn targets_any(record: &NodeRecord, removed: &[NodeUri]) -> bool {
    record
        .node
        .target()
        .is_some_and(|target| removed.iter().any(|r| target.is_within(r)))
}
