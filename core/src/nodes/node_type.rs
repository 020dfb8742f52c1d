use serde::{Deserialize, Serialize};
use std::fmt::{self, Display};
use std::str::FromStr;

use crate::Error;

/// The kinds of node a space stores, with the numeric ids used by the
/// metadata store.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum NodeType {
    #[serde(rename = "vos:Node", alias = "Node")]
    Node,
    #[serde(rename = "vos:DataNode", alias = "DataNode")]
    Data,
    #[serde(rename = "vos:LinkNode", alias = "LinkNode")]
    Link,
    #[serde(rename = "vos:ContainerNode", alias = "ContainerNode")]
    Container,
    #[serde(rename = "vos:UnstructuredDataNode", alias = "UnstructuredDataNode")]
    UnstructuredData,
    #[serde(rename = "vos:StructuredDataNode", alias = "StructuredDataNode")]
    StructuredData,
}

impl NodeType {
    pub const ALL: [NodeType; 6] = [
        NodeType::Node,
        NodeType::Data,
        NodeType::Link,
        NodeType::Container,
        NodeType::UnstructuredData,
        NodeType::StructuredData,
    ];

    pub fn id(&self) -> u8 {
        match self {
            NodeType::Node => 0,
            NodeType::Data => 1,
            NodeType::Link => 2,
            NodeType::Container => 3,
            NodeType::UnstructuredData => 4,
            NodeType::StructuredData => 5,
        }
    }

    pub fn from_id(id: u8) -> Option<NodeType> {
        NodeType::ALL.into_iter().find(|t| t.id() == id)
    }

    pub fn name(&self) -> &'static str {
        match self {
            NodeType::Node => "vos:Node",
            NodeType::Data => "vos:DataNode",
            NodeType::Link => "vos:LinkNode",
            NodeType::Container => "vos:ContainerNode",
            NodeType::UnstructuredData => "vos:UnstructuredDataNode",
            NodeType::StructuredData => "vos:StructuredDataNode",
        }
    }

    /// Data nodes carry bytes and the busy flag.
    pub fn is_data(&self) -> bool {
        matches!(
            self,
            NodeType::Data | NodeType::UnstructuredData | NodeType::StructuredData
        )
    }
}

impl Display for NodeType {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for NodeType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        NodeType::ALL
            .into_iter()
            .find(|t| t.name() == s || t.name().trim_start_matches("vos:") == s)
            .ok_or_else(|| Error::TypeNotSupported(s.to_string()))
    }
}
