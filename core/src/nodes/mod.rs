//! This holds the node document model: the value objects clients submit and
//! the metadata store persists.
mod node_type;

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::uri::NodeUri;
use crate::Error;
pub use node_type::NodeType;

/// A property value on a node.
///
/// A value of `None` is a deletion request when submitted by a client, and is
/// never persisted.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Property {
    #[serde(default)]
    pub value: Option<String>,
    /// Resolved from the property registry when a node is read back.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub read_only: bool,
}

impl Property {
    pub fn new(value: impl Into<String>) -> Self {
        Self {
            value: Some(value.into()),
            read_only: false,
        }
    }

    /// A property marked for deletion.
    pub fn nil() -> Self {
        Self::default()
    }
}

/// Kind-specific fields of a [Node].
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum NodeKind {
    #[serde(rename = "vos:Node")]
    Node,
    #[serde(rename = "vos:DataNode")]
    Data {
        #[serde(default)]
        busy: bool,
    },
    #[serde(rename = "vos:UnstructuredDataNode")]
    UnstructuredData {
        #[serde(default)]
        busy: bool,
    },
    #[serde(rename = "vos:StructuredDataNode")]
    StructuredData {
        #[serde(default)]
        busy: bool,
    },
    /// Children are never persisted with the container, they are populated on
    /// retrieval from the store.
    #[serde(rename = "vos:ContainerNode")]
    Container {
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        nodes: Vec<Node>,
    },
    #[serde(rename = "vos:LinkNode")]
    Link { target: NodeUri },
}

impl NodeKind {
    pub fn node_type(&self) -> NodeType {
        match self {
            NodeKind::Node => NodeType::Node,
            NodeKind::Data { .. } => NodeType::Data,
            NodeKind::UnstructuredData { .. } => NodeType::UnstructuredData,
            NodeKind::StructuredData { .. } => NodeType::StructuredData,
            NodeKind::Container { .. } => NodeType::Container,
            NodeKind::Link { .. } => NodeType::Link,
        }
    }
}

/// A namespace entry: identifier, kind, properties and the view and
/// capability lists computed by the server.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Node {
    pub uri: NodeUri,
    #[serde(flatten)]
    pub kind: NodeKind,
    #[serde(default)]
    pub properties: BTreeMap<String, Property>,
    #[serde(default)]
    pub accepts: Vec<String>,
    #[serde(default)]
    pub provides: Vec<String>,
    #[serde(default)]
    pub capabilities: Vec<String>,
}

impl Node {
    /// Constructs an empty node of the given type.
    /// Link nodes need a target and are built with [Node::link] instead.
    pub fn new(uri: NodeUri, node_type: NodeType) -> Result<Self, Error> {
        let kind = match node_type {
            NodeType::Node => NodeKind::Node,
            NodeType::Data => NodeKind::Data { busy: false },
            NodeType::UnstructuredData => NodeKind::UnstructuredData { busy: false },
            NodeType::StructuredData => NodeKind::StructuredData { busy: false },
            NodeType::Container => NodeKind::Container { nodes: vec![] },
            NodeType::Link => {
                return Err(Error::TypeNotSupported(
                    "a link node needs a target".to_string(),
                ))
            }
        };
        Ok(Self::with_kind(uri, kind))
    }

    pub fn link(uri: NodeUri, target: NodeUri) -> Self {
        Self::with_kind(uri, NodeKind::Link { target })
    }

    pub fn with_kind(uri: NodeUri, kind: NodeKind) -> Self {
        Self {
            uri,
            kind,
            properties: BTreeMap::new(),
            accepts: vec![],
            provides: vec![],
            capabilities: vec![],
        }
    }

    /// Parses a JSON node document.
    pub fn from_document(doc: &[u8]) -> Result<Self, Error> {
        serde_json::from_slice(doc).map_err(|e| Error::InvalidData(e.to_string()))
    }

    /// Serializes the node into its persisted JSON form. Children of
    /// containers are dropped.
    pub fn to_document(&self) -> Result<Vec<u8>, Error> {
        let mut node = self.clone();
        node.clear_children();
        Ok(serde_json::to_vec(&node)?)
    }

    pub fn node_type(&self) -> NodeType {
        self.kind.node_type()
    }

    pub fn is_container(&self) -> bool {
        matches!(self.kind, NodeKind::Container { .. })
    }

    pub fn is_link(&self) -> bool {
        matches!(self.kind, NodeKind::Link { .. })
    }

    pub fn is_data(&self) -> bool {
        self.node_type().is_data()
    }

    pub fn target(&self) -> Option<&NodeUri> {
        match &self.kind {
            NodeKind::Link { target } => Some(target),
            _ => None,
        }
    }

    pub fn busy(&self) -> bool {
        match self.kind {
            NodeKind::Data { busy }
            | NodeKind::UnstructuredData { busy }
            | NodeKind::StructuredData { busy } => busy,
            _ => false,
        }
    }

    /// Sets the busy flag. A no-op on anything but data nodes.
    pub fn set_busy(&mut self, value: bool) {
        match &mut self.kind {
            NodeKind::Data { busy }
            | NodeKind::UnstructuredData { busy }
            | NodeKind::StructuredData { busy } => *busy = value,
            _ => {}
        }
    }

    pub fn children(&self) -> &[Node] {
        match &self.kind {
            NodeKind::Container { nodes } => nodes,
            _ => &[],
        }
    }

    pub fn set_children(&mut self, children: Vec<Node>) {
        if let NodeKind::Container { nodes } = &mut self.kind {
            *nodes = children;
        }
    }

    pub fn clear_children(&mut self) {
        self.set_children(vec![]);
    }

    pub fn property(&self, uri: &str) -> Option<&str> {
        self.properties.get(uri).and_then(|p| p.value.as_deref())
    }

    pub fn set_property(&mut self, uri: &str, value: impl Into<String>) {
        let read_only = self.properties.get(uri).is_some_and(|p| p.read_only);
        self.properties.insert(
            uri.to_string(),
            Property {
                value: Some(value.into()),
                read_only,
            },
        );
    }

    pub fn remove_property(&mut self, uri: &str) -> Option<Property> {
        self.properties.remove(uri)
    }

    /// Drops properties carrying no value.
    pub fn prune_nil_properties(&mut self) {
        self.properties.retain(|_, p| p.value.is_some());
    }
}
