use lazy_static::lazy_static;

use crate::config::SpaceConfig;
use crate::metastore::NodeRecord;
use crate::nodes::{Node, NodeType};
use crate::uri::NodeUri;
use crate::views::BLOB_VIEW;

pub const ROOT: &str = "vos://x!space";
pub const OWNER: &str = "alice";
pub const HELLOWORLD_CONTENTS: &[u8] = b"Hello World!";
pub const HELLOWORLD_MD5: &str = "ed076287532e86365e841e92bfc50d8c";

/// Parses a node URI, panicking if it is invalid.
pub fn uri(s: &str) -> NodeUri {
    NodeUri::parse(s).expect("fixture uri must be valid")
}

lazy_static! {
    pub static ref ROOT_URI: NodeUri = uri(ROOT);
    pub static ref CONTAINER_A: Node =
        Node::new(uri("vos://x!space/a"), NodeType::Container).unwrap();
    pub static ref DATA_B: Node =
        Node::new(uri("vos://x!space/a/b.txt"), NodeType::UnstructuredData).unwrap();
}

/// A store record for the node, located below `memory://`.
pub fn record(node: &Node) -> NodeRecord {
    NodeRecord::new(
        node.clone(),
        BLOB_VIEW,
        OWNER,
        &format!("memory:///{}", node.uri.path()),
    )
}

/// A space living entirely in memory.
pub fn space_config() -> SpaceConfig {
    SpaceConfig::new(ROOT_URI.clone())
}
