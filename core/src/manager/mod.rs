//! The namespace manager owns node lifecycle, identifier and parent
//! validation, link resolution, property handling and access checks.
use chrono::{Duration, Utc};
use std::collections::HashSet;
use std::io;
use std::str::FromStr;
use std::sync::Arc;
use tracing::{debug, instrument, warn};

use crate::auth::Authorizer;
use crate::capability::CapabilityRegistry;
use crate::config::{SpaceConfig, ViewsConfig};
use crate::metastore::{self, MetadataStore, NodeRecord};
use crate::nodes::{Node, NodeKind, NodeType};
use crate::properties::{
    is_true, timestamp, PropertyAttributes, BTIME, CORE_PROPERTIES, CTIME, DATE, EMPTY_MD5,
    GROUPREAD, GROUPWRITE, ISPUBLIC, LENGTH, MD5, MTIME, PUBLICREAD,
};
use crate::protocol::ProtocolRegistry;
use crate::storage::{self, StorageBackend};
use crate::transfer::Transfer;
use crate::transform::{IdentityTransform, ViewTransformEngine};
use crate::uri::{is_valid_identifier, NodeUri};
use crate::views::{infer_view, View};
use crate::Error;

#[cfg(test)]
pub(crate) mod tests;

/// Negotiated endpoints are valid for this long.
const ENDPOINT_LIFETIME_SECS: i64 = 3600;

/// Owner of nodes created by the service itself.
const SERVICE_OWNER: &str = "root";

/// How much of a node [NamespaceManager::get_node] returns.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Detail {
    /// Everything, including the direct children of containers.
    #[default]
    Max,
    /// Only the identifier and type.
    Min,
    /// Identifier, type and properties.
    Properties,
}

impl FromStr for Detail {
    type Err = Error;

    /// Anything but `max` and `min` asks for properties only.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "max" => Detail::Max,
            "min" => Detail::Min,
            _ => Detail::Properties,
        })
    }
}

fn is_not_found(e: &io::Error) -> bool {
    e.kind() == io::ErrorKind::NotFound
}

fn view_uris(views: impl Iterator<Item = View>) -> Vec<String> {
    views.map(|v| v.uri().to_string()).collect()
}

/// Trailing slashes are dropped, except the ones of an otherwise empty
/// address like `memory://`.
fn storage_base(addr: &str) -> String {
    match addr.trim_end_matches('/') {
        trimmed if trimmed.ends_with(':') => addr.to_string(),
        trimmed => trimmed.to_string(),
    }
}

/// Constructed once per space and shared between request handlers and
/// transfer jobs. Holds no node state of its own: every read goes to the
/// metadata store.
pub struct NamespaceManager {
    store: Arc<dyn MetadataStore>,
    storage: Arc<dyn StorageBackend>,
    root: NodeUri,
    /// Base of all physical locations.
    base: String,
    views: ViewsConfig,
    protocols: ProtocolRegistry,
    capabilities: CapabilityRegistry,
    transform: Arc<dyn ViewTransformEngine>,
    authorizer: Authorizer,
}

impl NamespaceManager {
    pub fn new(
        store: Arc<dyn MetadataStore>,
        storage: Arc<dyn StorageBackend>,
        config: &SpaceConfig,
    ) -> Self {
        Self {
            store,
            storage,
            root: config.root_node.clone(),
            base: storage_base(&config.storage_addr),
            views: config.views.clone(),
            protocols: ProtocolRegistry::from_config(&config.protocols),
            capabilities: CapabilityRegistry::from_config(&config.capabilities),
            transform: Arc::new(IdentityTransform),
            authorizer: Authorizer::new(config.auth_url.as_deref()),
        }
    }

    /// Builds the metadata store and storage backend from their addresses,
    /// and makes sure the root container and core properties exist.
    pub async fn from_config(config: &SpaceConfig) -> Result<Self, Error> {
        let store = metastore::from_addr(&config.metadata_store_addr).await?;
        let storage = storage::from_addr(&config.storage_addr).await?;
        let manager = Self::new(store, storage, config);
        manager.init().await?;
        Ok(manager)
    }

    pub fn with_transform(mut self, transform: Arc<dyn ViewTransformEngine>) -> Self {
        self.transform = transform;
        self
    }

    pub fn with_protocols(mut self, protocols: ProtocolRegistry) -> Self {
        self.protocols = protocols;
        self
    }

    pub fn with_capabilities(mut self, capabilities: CapabilityRegistry) -> Self {
        self.capabilities = capabilities;
        self
    }

    pub async fn init(&self) -> Result<(), Error> {
        self.seed_properties().await?;
        self.ensure_root().await
    }

    pub fn store(&self) -> &Arc<dyn MetadataStore> {
        &self.store
    }

    pub fn storage(&self) -> &Arc<dyn StorageBackend> {
        &self.storage
    }

    pub fn root(&self) -> &NodeUri {
        &self.root
    }

    pub fn protocols(&self) -> &ProtocolRegistry {
        &self.protocols
    }

    pub fn capabilities(&self) -> &CapabilityRegistry {
        &self.capabilities
    }

    pub fn views(&self) -> &ViewsConfig {
        &self.views
    }

    /// Registers the core properties, keeping flags of already known ones.
    async fn seed_properties(&self) -> Result<(), Error> {
        for (property, read_only) in CORE_PROPERTIES {
            if self.store.is_known_property(property).await? {
                continue;
            }
            let attributes = if *read_only {
                PropertyAttributes::PROVIDES | PropertyAttributes::CONTAINS
            } else {
                PropertyAttributes::all()
            };
            self.store
                .register_property(property, attributes, *read_only)
                .await?;
        }
        Ok(())
    }

    async fn ensure_root(&self) -> Result<(), Error> {
        if self.store.is_stored(&self.root).await? {
            return Ok(());
        }
        debug!(root = %self.root, "creating root container");
        let root = Node::new(self.root.clone(), NodeType::Container)?;
        self.create(root, SERVICE_OWNER, false).await?;
        Ok(())
    }

    pub fn validate_identifier(&self, id: &str) -> bool {
        is_valid_identifier(id)
    }

    /// The physical location of a node: the storage base joined with the
    /// path below the root.
    pub fn location(&self, uri: &NodeUri) -> String {
        match uri.path() {
            "" => self.base.clone(),
            path => format!("{}/{}", self.base, path),
        }
    }

    fn is_local(&self, uri: &NodeUri) -> bool {
        uri.root() == self.root
    }

    /// Whether the parent of `uri` is a stored container. Always true for
    /// the root.
    pub async fn valid_parent(&self, uri: &NodeUri) -> Result<bool, Error> {
        match uri.parent() {
            None => Ok(true),
            Some(parent) => Ok(self.store.get_type(&parent).await? == Some(NodeType::Container)),
        }
    }

    /// The fault for a missing node: [Error::LinkFound] with the canonical
    /// URI if the path runs through a link, `otherwise` if not.
    async fn missing(&self, uri: &NodeUri, otherwise: Error) -> Error {
        match self.resolve_links(uri).await {
            Ok(Some(canonical)) => Error::LinkFound(canonical),
            Ok(None) => otherwise,
            Err(e) => e,
        }
    }

    /// Substitutes link nodes found on the path of `uri` with their targets.
    ///
    /// Returns the canonical URI, or None if there is no link on the path.
    /// Targets outside of this space are returned as they are. Link cycles
    /// resolve to None.
    #[instrument(skip(self), fields(node.uri = %uri))]
    pub async fn resolve_links(&self, uri: &NodeUri) -> Result<Option<NodeUri>, Error> {
        let mut current = uri.clone();
        let mut visited = HashSet::new();
        let mut found = false;

        loop {
            if !visited.insert(current.clone()) {
                warn!(at = %current, "link cycle");
                return Ok(None);
            }

            // nearest stored ancestor, the node itself included
            let mut ancestor = current.clone();
            let record = loop {
                if let Some(record) = self.store.get_record(&ancestor).await? {
                    break Some(record);
                }
                match ancestor.parent() {
                    Some(parent) => ancestor = parent,
                    None => break None,
                }
            };

            let Some(target) = record.as_ref().and_then(|r| r.node.target()) else {
                return Ok(found.then_some(current));
            };

            let remainder = &current.as_str()[ancestor.as_str().len()..];
            let next = NodeUri::parse(&format!("{}{}", target, remainder))?;
            found = true;
            if !self.is_local(&next) {
                return Ok(Some(next));
            }
            current = next;
        }
    }

    /// Recomputes the server-owned lists of a node from its type and the
    /// space configuration.
    fn compute_lists(&self, node: &mut Node) {
        node.accepts.clear();
        node.provides.clear();
        node.clear_children();
        // only transfers hold a node busy
        node.set_busy(false);

        let node_type = node.node_type();
        match node_type {
            NodeType::UnstructuredData => node.accepts = vec![View::Any.uri().to_string()],
            NodeType::StructuredData => {
                node.accepts = view_uris(self.views.accepts.structured());
                node.provides = view_uris(self.views.provides.structured());
            }
            NodeType::Container => {
                node.accepts = view_uris(self.views.accepts.archive.iter().copied());
                node.provides = view_uris(self.views.provides.archive.iter().copied());
            }
            _ => {}
        }
        node.capabilities = self.capabilities.applicable(node_type);
    }

    /// Registers unknown properties as space-local ones, and refuses
    /// read-only ones.
    async fn check_properties(&self, node: &Node) -> Result<(), Error> {
        for property in node.properties.keys() {
            if !self.store.is_known_property(property).await? {
                self.store
                    .register_property(property, PropertyAttributes::CONTAINS, false)
                    .await?;
            }
            if self.store.is_read_only(property).await? {
                return Err(Error::PermissionDenied(format!(
                    "the property {} is read only",
                    property
                )));
            }
        }
        Ok(())
    }

    /// Sets unset permission properties to the values of the parent.
    async fn inherit_permissions(&self, node: &mut Node) -> Result<(), Error> {
        let Some(parent) = node.uri.parent() else {
            return Ok(());
        };
        let Some(parent) = self.store.get_record(&parent).await? else {
            return Ok(());
        };

        for property in [GROUPREAD, GROUPWRITE] {
            if node.property(property).is_none() {
                if let Some(value) = parent.node.property(property) {
                    node.set_property(property, value);
                }
            }
        }
        if node.property(PUBLICREAD).is_none() && node.property(ISPUBLIC).is_none() {
            let public = is_true(parent.node.property(PUBLICREAD))
                || is_true(parent.node.property(ISPUBLIC));
            node.set_property(PUBLICREAD, public.to_string());
        }
        Ok(())
    }

    /// Creates a node, or replaces the client-settable parts of an existing
    /// one if `overwrite` is set. Returns the stored node.
    #[instrument(skip(self, node), fields(node.uri = %node.uri))]
    pub async fn create(&self, node: Node, owner: &str, overwrite: bool) -> Result<Node, Error> {
        let mut node = node;
        let uri = node.uri.clone();
        if !self.is_local(&uri) {
            return Err(Error::InvalidUri(format!("{} is not in this space", uri)));
        }

        if !self.valid_parent(&uri).await? {
            return Err(self
                .missing(&uri, Error::ContainerNotFound(uri.to_string()))
                .await);
        }

        let existing = self.store.get_record(&uri).await?;
        if let Some(record) = &existing {
            if !overwrite {
                return Err(Error::DuplicateNode(uri.to_string()));
            }
            if record.node_type != node.node_type() {
                return Err(Error::PermissionDenied(
                    "the node type cannot be changed".to_string(),
                ));
            }
        }

        if uri.is_auto() {
            node.uri = uri.with_generated_name();
        }

        self.compute_lists(&mut node);

        if let Some(target) = node.target() {
            if self.is_local(target) && !self.store.is_stored(target).await? {
                return Err(self
                    .missing(target, Error::NodeNotFound(target.to_string()))
                    .await);
            }
        }

        self.check_properties(&node).await?;

        let now = timestamp(Utc::now());
        let node = match existing {
            Some(record) => {
                let mut stored = record.node;
                if let Some(target) = node.target() {
                    stored.kind = NodeKind::Link {
                        target: target.clone(),
                    };
                }
                for (property, value) in node.properties {
                    if let Some(value) = value.value {
                        stored.set_property(&property, value);
                    } else {
                        stored.remove_property(&property);
                    }
                }
                stored.set_property(CTIME, now);
                public_alias(&mut stored);
                stored.accepts = node.accepts;
                stored.provides = node.provides;
                stored.capabilities = node.capabilities;
                stored.prune_nil_properties();

                self.store.update_data(&uri, &stored).await?;
                stored
            }
            None => {
                node.prune_nil_properties();
                node.set_property(DATE, now.clone());
                node.set_property(BTIME, now.clone());
                node.set_property(MTIME, now.clone());
                node.set_property(CTIME, now);
                self.inherit_permissions(&mut node).await?;
                public_alias(&mut node);
                node.set_property(LENGTH, "0");
                node.set_property(MD5, "");

                self.insert(&node, owner).await?;
                node
            }
        };

        Ok(node)
    }

    /// Stores a new record and creates its physical object, rolling back the
    /// record if the latter fails.
    async fn insert(&self, node: &Node, owner: &str) -> Result<(), Error> {
        let location = self.location(&node.uri);
        self.store
            .store_data(NodeRecord::new(
                node.clone(),
                infer_view(node.uri.name()),
                owner,
                &location,
            ))
            .await?;
        for capability in &node.capabilities {
            self.store
                .register_capability(&node.uri, capability)
                .await?;
        }

        let physical = match node.target() {
            Some(target) if self.is_local(target) => {
                self.storage
                    .create_link(&location, &self.location(target))
                    .await
            }
            Some(_) => Ok(()),
            None if node.is_container() => self.storage.create_container(&location).await,
            None => self.storage.touch(&location).await,
        };

        if let Err(e) = physical {
            warn!(err=%e, location, "failed to create physical object, rolling back");
            if let Err(e) = self.store.remove_data(&node.uri, false).await {
                warn!(err=%e, "failed to roll back node record");
            }
            return Err(e.into());
        }
        Ok(())
    }

    /// Marks each property read-only if the registry says so.
    async fn mark_read_only(&self, node: &mut Node) -> Result<(), Error> {
        for (uri, property) in node.properties.iter_mut() {
            property.read_only = self.store.is_read_only(uri).await?;
        }
        Ok(())
    }

    /// Sets the length property from the size of the physical object.
    async fn set_length(&self, node: &mut Node, location: &str) -> Result<(), Error> {
        match self.storage.size(location).await {
            Ok(size) => node.set_property(LENGTH, size.to_string()),
            Err(e) if is_not_found(&e) => {
                debug!(location, "no physical object to take the length of")
            }
            Err(e) => return Err(e.into()),
        }
        Ok(())
    }

    /// Computes the checksum property, unless a real one is present already.
    async fn set_md5(&self, node: &mut Node, location: &str) -> Result<(), Error> {
        if !matches!(node.property(MD5), None | Some("") | Some(EMPTY_MD5)) {
            return Ok(());
        }
        match self.storage.checksum(location).await {
            Ok(md5) => node.set_property(MD5, md5),
            Err(e) if is_not_found(&e) => {
                debug!(location, "no physical object to checksum")
            }
            Err(e) => return Err(e.into()),
        }
        Ok(())
    }

    /// Retrieves a node at the given level of detail. Children of containers
    /// are included up to `limit` at [Detail::Max].
    #[instrument(skip(self), fields(node.uri = %uri))]
    pub async fn get_node(
        &self,
        uri: &NodeUri,
        detail: Detail,
        limit: Option<usize>,
    ) -> Result<Node, Error> {
        let Some(record) = self.store.get_record(uri).await? else {
            return Err(self.missing(uri, Error::NodeNotFound(uri.to_string())).await);
        };

        let mut node = record.node;
        match detail {
            Detail::Max => {
                if node.is_container() {
                    let mut children = vec![];
                    for child in self.store.get_children(uri, limit).await? {
                        if let Some(record) = self.store.get_record(&child).await? {
                            children.push(record.node);
                        }
                    }
                    node.set_children(children);
                }
            }
            Detail::Min | Detail::Properties => {
                node.accepts.clear();
                node.provides.clear();
                node.capabilities.clear();
                node.set_busy(false);
                if detail == Detail::Min {
                    node.properties.clear();
                }
            }
        }

        if detail != Detail::Min {
            self.set_length(&mut node, &record.location).await?;
            if !node.is_container() && !node.is_link() {
                self.set_md5(&mut node, &record.location).await?;
            }
            self.mark_read_only(&mut node).await?;
        }
        Ok(node)
    }

    /// Removes a node, everything below it, and every link pointing into
    /// what was removed, together with their physical objects.
    #[instrument(skip(self), fields(node.uri = %uri))]
    pub async fn delete(&self, uri: &NodeUri) -> Result<(), Error> {
        if uri.is_root() {
            return Err(Error::PermissionDenied(
                "the root node cannot be deleted".to_string(),
            ));
        }
        let Some(record) = self.store.get_record(uri).await? else {
            return Err(self.missing(uri, Error::NodeNotFound(uri.to_string())).await);
        };
        if record.node.busy() {
            return Err(Error::NodeBusy(uri.to_string()));
        }

        let recursive = record.node.is_container();
        let links = self.store.remove_data(uri, recursive).await?;
        self.storage.remove_bytes(&record.location, recursive).await?;
        for link in links {
            debug!(link.uri = %link.uri, "removing dangling link");
            self.storage.remove_bytes(&link.location, false).await?;
        }
        Ok(())
    }

    #[instrument(skip_all)]
    pub async fn validate_token(&self, token: &str) -> Result<(), Error> {
        self.authorizer.validate_token(token).await
    }

    /// Checks the token grants read or write access to the node, or to its
    /// nearest stored ancestor if the node does not exist yet.
    #[instrument(skip(self, token), fields(node.uri = %uri))]
    pub async fn validate_access(
        &self,
        token: &str,
        uri: &NodeUri,
        is_read: bool,
    ) -> Result<(), Error> {
        let mut current = uri.clone();
        let record = loop {
            if let Some(record) = self.store.get_record(&current).await? {
                break record;
            }
            match current.parent() {
                Some(parent) => current = parent,
                None => return Err(Error::NodeNotFound(uri.to_string())),
            }
        };

        let node = &record.node;
        if is_read && (is_true(node.property(PUBLICREAD)) || is_true(node.property(ISPUBLIC))) {
            return Ok(());
        }

        let groups = node
            .property(if is_read { GROUPREAD } else { GROUPWRITE })
            .unwrap_or_default();
        if !self
            .authorizer
            .has_access(token, &record.owner, groups)
            .await?
        {
            return Err(Error::PermissionDenied(format!(
                "no {} access to {}",
                if is_read { "read" } else { "write" },
                uri
            )));
        }
        Ok(())
    }

    /// Creates a node for bytes already present at `location`, and records
    /// their length.
    #[instrument(skip(self, node), fields(node.uri = %node.uri))]
    pub async fn register_node(
        &self,
        node: Node,
        owner: &str,
        location: &str,
    ) -> Result<Node, Error> {
        let mut node = self.create(node, owner, false).await?;
        let size = self.storage.size(location).await?;
        node.set_property(LENGTH, size.to_string());
        self.store.update_data(&node.uri, &node).await?;
        Ok(node)
    }

    /// The transfer document negotiated for the job owning an endpoint.
    async fn transfer_for(&self, endpoint: &str) -> Result<(bool, Transfer), Error> {
        let Some(record) = self.store.get_transfer(endpoint).await? else {
            return Err(Error::NodeNotFound(format!(
                "the endpoint {} cannot be found",
                endpoint
            )));
        };
        let Some(document) = self.store.get_result(&record.job_id).await? else {
            return Err(Error::InternalFault(format!(
                "no transfer document for job {}",
                record.job_id
            )));
        };
        let transfer = serde_json::from_str(&document)
            .map_err(|e| Error::InvalidData(format!("bad transfer document: {}", e)))?;
        Ok((record.completed, transfer))
    }

    /// Records a new length on the target of the transfer owning `endpoint`.
    #[instrument(skip(self))]
    pub async fn update_size(&self, endpoint: &str, size: u64) -> Result<(), Error> {
        let (_, transfer) = self.transfer_for(endpoint).await?;
        let Some(record) = self.store.get_record(&transfer.target).await? else {
            return Err(Error::NodeNotFound(transfer.target.to_string()));
        };
        let mut node = record.node;
        node.set_property(LENGTH, size.to_string());
        self.store.update_data(&transfer.target, &node).await
    }

    /// Finds the physical location behind a negotiated endpoint, transformed
    /// into the requested view if `view_check` is set.
    #[instrument(skip(self))]
    pub async fn resolve_location(&self, endpoint: &str, view_check: bool) -> Result<String, Error> {
        let (completed, transfer) = self.transfer_for(endpoint).await?;
        if completed {
            return Err(Error::InvalidUri(format!(
                "the endpoint {} is no longer valid",
                endpoint
            )));
        }
        let Some(record) = self.store.get_record(&transfer.target).await? else {
            return Err(Error::NodeNotFound(transfer.target.to_string()));
        };

        let mut location = record.location;
        if let Some(view) = transfer.view.as_deref().filter(|_| view_check) {
            if view != View::Default.uri() {
                location = self
                    .transform
                    .transform(&location, &record.view, view)
                    .await?;
            }
        }
        if !location.contains("://") {
            location = format!("file://{}", location);
        }
        Ok(location)
    }

    /// Flags the transfer owning `endpoint` complete.
    #[instrument(skip(self))]
    pub async fn complete_transfer(&self, endpoint: &str) -> Result<(), Error> {
        self.store.complete_transfer(endpoint).await
    }

    /// Whether the endpoint was handed out more than an hour ago.
    pub async fn has_expired(&self, endpoint: &str) -> Result<bool, Error> {
        let Some(record) = self.store.get_transfer(endpoint).await? else {
            return Err(Error::NodeNotFound(format!(
                "the endpoint {} cannot be found",
                endpoint
            )));
        };
        Ok(Utc::now() - record.created > Duration::seconds(ENDPOINT_LIFETIME_SECS))
    }

    /// Whether the physical object was modified since the node record was
    /// last written.
    pub async fn has_been_updated(&self, uri: &NodeUri) -> Result<bool, Error> {
        let Some(record) = self.store.get_record(uri).await? else {
            return Err(Error::NodeNotFound(uri.to_string()));
        };
        match self.storage.last_modified(&record.location).await {
            Ok(modified) => Ok(modified >= record.last_modified),
            Err(e) if is_not_found(&e) => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    /// Recomputes and persists the length property of a node.
    #[instrument(skip(self), fields(node.uri = %uri))]
    pub async fn update_length(&self, uri: &NodeUri) -> Result<(), Error> {
        let Some(record) = self.store.get_record(uri).await? else {
            return Err(Error::NodeNotFound(uri.to_string()));
        };
        let mut node = record.node;
        self.set_length(&mut node, &record.location).await?;
        self.store.update_data(uri, &node).await
    }

    /// Marks a data node busy. Fails with [Error::NodeBusy] if it already is.
    pub async fn mark_busy(&self, uri: &NodeUri) -> Result<(), Error> {
        if !self.store.set_busy(uri, false, true).await? {
            return Err(Error::NodeBusy(uri.to_string()));
        }
        Ok(())
    }

    /// Clears the busy flag, logging instead of failing.
    pub async fn clear_busy(&self, uri: &NodeUri) {
        if let Err(e) = self.store.set_busy(uri, true, false).await {
            warn!(err=%e, node.uri = %uri, "failed to clear busy flag");
        }
    }

    pub fn accepted_views(&self) -> Vec<&'static str> {
        self.views.accepts.all().map(|v| v.uri()).collect()
    }

    pub fn provided_views(&self) -> Vec<&'static str> {
        self.views.provides.all().map(|v| v.uri()).collect()
    }

    /// Registered properties carrying any of the given attributes.
    pub async fn properties(&self, attributes: PropertyAttributes) -> Result<Vec<String>, Error> {
        self.store.get_properties(attributes).await
    }
}

/// Keeps the legacy public flag in line with the public-read property:
/// a node is public if either says so.
fn public_alias(node: &mut Node) {
    if node.property(ISPUBLIC).is_none() {
        return;
    }
    let public = is_true(node.property(PUBLICREAD)) || is_true(node.property(ISPUBLIC));
    node.set_property(PUBLICREAD, public.to_string());
    node.set_property(ISPUBLIC, public.to_string());
}
