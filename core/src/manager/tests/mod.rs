//! This contains test scenarios the [NamespaceManager] needs to pass on top
//! of every combination of metadata store and storage backend we ship.
//! We use [rstest] and [rstest_reuse] to provide the spaces, and then apply
//! this template to all test functions.

use rstest::*;
use rstest_reuse::{self, *};
use std::io;
use std::sync::Arc;
use tempfile::TempDir;

use super::{Detail, NamespaceManager};
use crate::config::{HandlerKind, ProtocolEntry, ProtocolsConfig, SpaceConfig};
use crate::fixtures::{space_config, uri, HELLOWORLD_CONTENTS, HELLOWORLD_MD5, OWNER, ROOT_URI};
use crate::metastore;
use crate::nodes::{Node, NodeKind, NodeType, Property};
use crate::properties::{
    PropertyAttributes, DATE, EMPTY_MD5, GROUPREAD, GROUPWRITE, ISPUBLIC, LENGTH, MD5, PUBLICREAD, TITLE,
};
use crate::protocol::Protocol;
use crate::storage;
use crate::transfer::{Direction, Transfer};
use crate::views::View;
use crate::Error;

const COLOR: &str = "ivo://example.org/properties#color";

/// A configuration with views and protocols set up, storing bytes at
/// `storage_addr`, and polling quickly.
pub(crate) fn test_config(storage_addr: &str) -> SpaceConfig {
    let mut config = space_config();
    config.storage_addr = storage_addr.to_string();

    config.views.accepts.image = vec![View::Fits];
    config.views.accepts.table = vec![View::Votable];
    config.views.accepts.archive = vec![View::Tar];
    config.views.provides = config.views.accepts.clone();

    let entries = || {
        vec![
            ProtocolEntry {
                kind: HandlerKind::HttpGet,
                base_url: Some("http://localhost:7007/get".to_string()),
            },
            ProtocolEntry {
                kind: HandlerKind::HttpPut,
                base_url: Some("http://localhost:7007/put".to_string()),
            },
        ]
    };
    config.protocols = ProtocolsConfig {
        server: entries(),
        client: entries(),
    };

    config.transfers.poll_interval_ms = 10;
    config.transfers.export_check_interval_ms = 20;
    config.transfers.export_ceiling_secs = 1;
    config
}

/// A space under test. Keeps the directory of on-disk spaces alive.
pub(crate) struct Space {
    pub manager: Arc<NamespaceManager>,
    pub config: SpaceConfig,
    _dir: Option<TempDir>,
}

impl Space {
    pub async fn memory() -> Self {
        Self::build(test_config("memory://"), "memory://", None).await
    }

    pub async fn on_disk() -> Self {
        let dir = TempDir::new().unwrap();
        let config = test_config(&format!("file://{}", dir.path().display()));
        Self::build(config, "redb://", Some(dir)).await
    }

    pub async fn build(config: SpaceConfig, store_addr: &str, dir: Option<TempDir>) -> Self {
        Self::build_with(config, store_addr, dir, |manager| manager).await
    }

    /// Lets `customize` swap out parts of the manager before it is
    /// initialized.
    pub async fn build_with(
        config: SpaceConfig,
        store_addr: &str,
        dir: Option<TempDir>,
        customize: impl FnOnce(NamespaceManager) -> NamespaceManager,
    ) -> Self {
        let store = metastore::from_addr(store_addr).await.unwrap();
        let storage = storage::from_addr(&config.storage_addr).await.unwrap();
        let manager = customize(NamespaceManager::new(store, storage, &config));
        manager.init().await.expect("init must succeed");

        Self {
            manager: Arc::new(manager),
            config,
            _dir: dir,
        }
    }

    pub async fn create(&self, s: &str, node_type: NodeType) -> Node {
        self.manager
            .create(Node::new(uri(s), node_type).unwrap(), OWNER, false)
            .await
            .expect("create must succeed")
    }

    pub async fn create_link(&self, s: &str, target: &str) -> Result<Node, Error> {
        self.manager
            .create(Node::link(uri(s), uri(target)), OWNER, false)
            .await
    }

    /// Writes bytes to the physical object of a node.
    pub async fn write(&self, s: &str, contents: &'static [u8]) {
        let location = self.manager.location(&uri(s));
        self.manager
            .storage()
            .put_bytes(&location, Box::new(contents))
            .await
            .expect("write must succeed");
    }
}

/// This produces a template, which will be applied to all individual test functions.
/// See https://github.com/la10736/rstest/issues/130#issuecomment-968864832
#[template]
#[rstest]
#[case::memory(Space::memory().await)]
#[case::on_disk(Space::on_disk().await)]
pub fn spaces(#[case] space: Space) {}

/// The root container exists from the start, and cannot be deleted.
#[apply(spaces)]
#[tokio::test]
async fn root(space: Space) {
    let root = space
        .manager
        .get_node(&ROOT_URI, Detail::Max, None)
        .await
        .expect("root must exist");
    assert!(root.is_container());

    assert!(matches!(
        space.manager.delete(&ROOT_URI).await,
        Err(Error::PermissionDenied(_))
    ));
}

#[apply(spaces)]
#[tokio::test]
async fn create_and_get(space: Space) {
    space.create("vos://x!space/a", NodeType::Container).await;

    let mut b = Node::new(uri("vos://x!space/a/b.txt"), NodeType::UnstructuredData).unwrap();
    b.properties.insert(TITLE.to_string(), Property::new("a title"));
    // never trusted
    b.accepts = vec!["ivo://example.org/views#made-up".to_string()];
    let created = space.manager.create(b, OWNER, false).await.unwrap();

    assert_eq!(vec![View::Any.uri().to_string()], created.accepts);
    assert_eq!(Some("a title"), created.property(TITLE));
    assert!(created.property(DATE).is_some());

    let a = space
        .manager
        .get_node(&uri("vos://x!space/a"), Detail::Max, None)
        .await
        .unwrap();
    assert_eq!(vec![View::Tar.uri().to_string()], a.accepts);
    assert_eq!(
        vec![uri("vos://x!space/a/b.txt")],
        a.children().iter().map(|c| c.uri.clone()).collect::<Vec<_>>()
    );

    let b = space
        .manager
        .get_node(&uri("vos://x!space/a/b.txt"), Detail::Max, None)
        .await
        .unwrap();
    assert_eq!(Some("0"), b.property(LENGTH));
    assert_eq!(Some(EMPTY_MD5), b.property(MD5));
    assert!(b.properties[LENGTH].read_only);
    assert!(!b.properties[TITLE].read_only);
}

#[apply(spaces)]
#[tokio::test]
async fn structured_views(space: Space) {
    let node = space
        .create("vos://x!space/t.vot", NodeType::StructuredData)
        .await;
    assert_eq!(
        vec![View::Fits.uri().to_string(), View::Votable.uri().to_string()],
        node.accepts
    );
    assert_eq!(node.accepts, node.provides);
}

/// Creating `a/b.auto` stores the node below `a` with a generated name.
#[apply(spaces)]
#[tokio::test]
async fn auto_name(space: Space) {
    space.create("vos://x!space/a", NodeType::Container).await;
    let created = space
        .create("vos://x!space/a/b.auto", NodeType::UnstructuredData)
        .await;

    assert_eq!(Some(uri("vos://x!space/a")), created.uri.parent());
    assert_ne!("b.auto", created.uri.name());
    assert!(uuid::Uuid::parse_str(created.uri.name()).is_ok());

    let a = space
        .manager
        .get_node(&uri("vos://x!space/a"), Detail::Max, None)
        .await
        .unwrap();
    assert!(a.children().iter().any(|c| c.uri == created.uri));
}

#[apply(spaces)]
#[tokio::test]
async fn duplicates_and_overwrite(space: Space) {
    space.create("vos://x!space/a", NodeType::Container).await;

    let node = Node::new(uri("vos://x!space/a"), NodeType::Container).unwrap();
    assert_eq!(
        Err(Error::DuplicateNode("vos://x!space/a".to_string())),
        space.manager.create(node.clone(), OWNER, false).await
    );

    let mut titled = node.clone();
    titled.set_property(TITLE, "first");
    let first = space.manager.create(titled.clone(), OWNER, true).await.unwrap();
    let second = space.manager.create(titled, OWNER, true).await.unwrap();
    assert_eq!(Some("first"), first.property(TITLE));
    assert_eq!(first.property(TITLE), second.property(TITLE));
    assert_eq!(first.property(DATE), second.property(DATE));

    // a nil value removes the property
    let mut untitled = node;
    untitled.properties.insert(TITLE.to_string(), Property::nil());
    let third = space.manager.create(untitled, OWNER, true).await.unwrap();
    assert_eq!(None, third.property(TITLE));

    let data = Node::new(uri("vos://x!space/a"), NodeType::UnstructuredData).unwrap();
    assert!(matches!(
        space.manager.create(data, OWNER, true).await,
        Err(Error::PermissionDenied(_))
    ));
}

#[apply(spaces)]
#[tokio::test]
async fn parent_must_be_container(space: Space) {
    let orphan = Node::new(uri("vos://x!space/a/b.txt"), NodeType::Data).unwrap();
    assert!(matches!(
        space.manager.create(orphan, OWNER, false).await,
        Err(Error::ContainerNotFound(_))
    ));

    space.create("vos://x!space/x.txt", NodeType::Data).await;
    let below_data = Node::new(uri("vos://x!space/x.txt/y"), NodeType::Data).unwrap();
    assert!(matches!(
        space.manager.create(below_data, OWNER, false).await,
        Err(Error::ContainerNotFound(_))
    ));
}

#[apply(spaces)]
#[tokio::test]
async fn other_spaces_rejected(space: Space) {
    let foreign = Node::new(uri("vos://y!other/a"), NodeType::Data).unwrap();
    assert!(matches!(
        space.manager.create(foreign, OWNER, false).await,
        Err(Error::InvalidUri(_))
    ));
}

/// Setting a read-only property fails the whole create.
#[apply(spaces)]
#[tokio::test]
async fn read_only_properties(space: Space) {
    let mut node = Node::new(uri("vos://x!space/b.txt"), NodeType::Data).unwrap();
    node.set_property(LENGTH, "123");

    match space.manager.create(node, OWNER, false).await {
        Err(Error::PermissionDenied(msg)) => assert!(msg.contains(LENGTH)),
        other => panic!("unexpected result: {:?}", other),
    }
    assert!(!space
        .manager
        .store()
        .is_stored(&uri("vos://x!space/b.txt"))
        .await
        .unwrap());
}

/// Unknown properties are registered as space-local ones.
#[apply(spaces)]
#[tokio::test]
async fn unknown_properties(space: Space) {
    let mut node = Node::new(uri("vos://x!space/b.txt"), NodeType::Data).unwrap();
    node.set_property(COLOR, "blue");
    let created = space.manager.create(node, OWNER, false).await.unwrap();
    assert_eq!(Some("blue"), created.property(COLOR));

    let contained = space
        .manager
        .properties(PropertyAttributes::CONTAINS)
        .await
        .unwrap();
    assert!(contained.iter().any(|p| p == COLOR));

    let accepted = space
        .manager
        .properties(PropertyAttributes::ACCEPTS)
        .await
        .unwrap();
    assert!(accepted.iter().any(|p| p == TITLE));
    assert!(!accepted.iter().any(|p| p == LENGTH));
}

/// Permission properties are inherited from the parent on creation, and
/// the legacy public flag counts as public-read.
#[apply(spaces)]
#[tokio::test]
async fn inherits_permissions(space: Space) {
    let mut a = Node::new(uri("vos://x!space/a"), NodeType::Container).unwrap();
    a.set_property(GROUPREAD, "bob,carol");
    a.set_property(ISPUBLIC, "true");
    let a = space.manager.create(a, OWNER, false).await.unwrap();
    assert_eq!(Some("true"), a.property(PUBLICREAD));

    let b = space.create("vos://x!space/a/b.txt", NodeType::Data).await;
    assert_eq!(Some("bob,carol"), b.property(GROUPREAD));
    assert_eq!(Some("true"), b.property(PUBLICREAD));

    let c = space.create("vos://x!space/c.txt", NodeType::Data).await;
    assert_eq!(None, c.property(GROUPREAD));
    assert_eq!(Some("false"), c.property(PUBLICREAD));
}

#[apply(spaces)]
#[tokio::test]
async fn links(space: Space) {
    space.create("vos://x!space/a", NodeType::Container).await;
    space.create("vos://x!space/a/b.txt", NodeType::Data).await;

    assert_eq!(
        Err(Error::NodeNotFound("vos://x!space/nope".to_string())),
        space.create_link("vos://x!space/l", "vos://x!space/nope").await
    );

    space
        .create_link("vos://x!space/l", "vos://x!space/a")
        .await
        .expect("link to an existing node must succeed");

    assert_eq!(
        Err(Error::LinkFound(uri("vos://x!space/a/b.txt"))),
        space
            .manager
            .get_node(&uri("vos://x!space/l/b.txt"), Detail::Max, None)
            .await
    );

    let through = Node::new(uri("vos://x!space/l/c.txt"), NodeType::Data).unwrap();
    assert_eq!(
        Err(Error::LinkFound(uri("vos://x!space/a/c.txt"))),
        space.manager.create(through, OWNER, false).await
    );

    // the link itself is a node of its own
    let link = space
        .manager
        .get_node(&uri("vos://x!space/l"), Detail::Max, None)
        .await
        .unwrap();
    assert_eq!(Some(&uri("vos://x!space/a")), link.target());
}

/// Targets in other spaces are neither checked nor followed.
#[apply(spaces)]
#[tokio::test]
async fn external_links(space: Space) {
    space
        .create_link("vos://x!space/l", "vos://y!other/a")
        .await
        .unwrap();
    assert_eq!(
        Some(uri("vos://y!other/a/b")),
        space
            .manager
            .resolve_links(&uri("vos://x!space/l/b"))
            .await
            .unwrap()
    );
}

#[apply(spaces)]
#[tokio::test]
async fn resolve_link_chain(space: Space) {
    space.create("vos://x!space/c", NodeType::Container).await;
    space.create_link("vos://x!space/b", "vos://x!space/c").await.unwrap();
    space.create_link("vos://x!space/a", "vos://x!space/b").await.unwrap();

    let manager = &space.manager;
    assert_eq!(
        Some(uri("vos://x!space/c")),
        manager.resolve_links(&uri("vos://x!space/a")).await.unwrap()
    );
    assert_eq!(
        Some(uri("vos://x!space/c/x/y")),
        manager.resolve_links(&uri("vos://x!space/a/x/y")).await.unwrap()
    );
    assert_eq!(
        None,
        manager.resolve_links(&uri("vos://x!space/c/x")).await.unwrap()
    );
}

#[apply(spaces)]
#[tokio::test]
async fn resolve_link_cycle(space: Space) {
    space.create("vos://x!space/c", NodeType::Container).await;
    space.create_link("vos://x!space/l1", "vos://x!space/c").await.unwrap();
    space.create_link("vos://x!space/l2", "vos://x!space/l1").await.unwrap();
    space
        .manager
        .create(
            Node::link(uri("vos://x!space/l1"), uri("vos://x!space/l2")),
            OWNER,
            true,
        )
        .await
        .unwrap();

    assert_eq!(
        None,
        space
            .manager
            .resolve_links(&uri("vos://x!space/l1/x"))
            .await
            .unwrap()
    );
}

#[apply(spaces)]
#[tokio::test]
async fn detail_levels(space: Space) {
    let mut node = Node::new(uri("vos://x!space/b.txt"), NodeType::UnstructuredData).unwrap();
    node.set_property(TITLE, "t");
    space.manager.create(node, OWNER, false).await.unwrap();
    let b = uri("vos://x!space/b.txt");

    let min = space.manager.get_node(&b, Detail::Min, None).await.unwrap();
    assert!(min.properties.is_empty());
    assert!(min.accepts.is_empty());

    let props = space
        .manager
        .get_node(&b, "properties".parse().unwrap(), None)
        .await
        .unwrap();
    assert_eq!(Some("t"), props.property(TITLE));
    assert!(props.accepts.is_empty());
    assert!(props.capabilities.is_empty());
}

/// The container listing honours the limit.
#[apply(spaces)]
#[tokio::test]
async fn child_limit(space: Space) {
    space.create("vos://x!space/a", NodeType::Container).await;
    for name in ["c", "a", "b"] {
        space
            .create(&format!("vos://x!space/a/{}", name), NodeType::Data)
            .await;
    }

    let a = space
        .manager
        .get_node(&uri("vos://x!space/a"), Detail::Max, Some(2))
        .await
        .unwrap();
    assert_eq!(
        vec!["a", "b"],
        a.children().iter().map(|c| c.uri.name()).collect::<Vec<_>>()
    );
}

/// Length and checksum reflect the bytes on retrieval.
#[apply(spaces)]
#[tokio::test]
async fn length_and_checksum(space: Space) {
    space.create("vos://x!space/b.txt", NodeType::Data).await;
    space.write("vos://x!space/b.txt", HELLOWORLD_CONTENTS).await;

    let b = space
        .manager
        .get_node(&uri("vos://x!space/b.txt"), Detail::Max, None)
        .await
        .unwrap();
    assert_eq!(Some("12"), b.property(LENGTH));
    assert_eq!(Some(HELLOWORLD_MD5), b.property(MD5));
}

/// Deleting a container removes everything below it, and all links into it.
#[apply(spaces)]
#[tokio::test]
async fn delete_cascades(space: Space) {
    space.create("vos://x!space/a", NodeType::Container).await;
    space.create("vos://x!space/a/b", NodeType::Container).await;
    space.create("vos://x!space/a/b/c.txt", NodeType::Data).await;
    space.create("vos://x!space/keep.txt", NodeType::Data).await;
    space
        .create_link("vos://x!space/l", "vos://x!space/a/b/c.txt")
        .await
        .unwrap();

    let manager = &space.manager;
    manager.delete(&uri("vos://x!space/a")).await.unwrap();

    for gone in [
        "vos://x!space/a",
        "vos://x!space/a/b",
        "vos://x!space/a/b/c.txt",
        "vos://x!space/l",
    ] {
        assert!(
            !manager.store().is_stored(&uri(gone)).await.unwrap(),
            "{} must be gone",
            gone
        );
    }
    let err = manager
        .storage()
        .size(&manager.location(&uri("vos://x!space/a/b/c.txt")))
        .await
        .expect_err("bytes must be gone");
    assert_eq!(io::ErrorKind::NotFound, err.kind());

    assert!(manager
        .store()
        .is_stored(&uri("vos://x!space/keep.txt"))
        .await
        .unwrap());
    assert_eq!(
        Err(Error::NodeNotFound("vos://x!space/a".to_string())),
        manager.delete(&uri("vos://x!space/a")).await
    );
}

#[apply(spaces)]
#[tokio::test]
async fn busy_nodes(space: Space) {
    let b = space.create("vos://x!space/b.txt", NodeType::Data).await.uri;

    space.manager.mark_busy(&b).await.unwrap();
    assert_eq!(
        Err(Error::NodeBusy(b.to_string())),
        space.manager.mark_busy(&b).await
    );
    assert_eq!(
        Err(Error::NodeBusy(b.to_string())),
        space.manager.delete(&b).await
    );

    space.manager.clear_busy(&b).await;
    space.manager.delete(&b).await.unwrap();
}

/// Clients cannot create nodes that are already busy.
#[apply(spaces)]
#[tokio::test]
async fn busy_not_trusted(space: Space) {
    let f = uri("vos://x!space/f.txt");
    let created = space
        .manager
        .create(
            Node::with_kind(f.clone(), NodeKind::UnstructuredData { busy: true }),
            OWNER,
            false,
        )
        .await
        .unwrap();
    assert!(!created.busy());

    let stored = space.manager.store().get_record(&f).await.unwrap().unwrap();
    assert!(!stored.node.busy());

    space.manager.mark_busy(&f).await.unwrap();
    space.manager.clear_busy(&f).await;
    space.manager.delete(&f).await.unwrap();
}

#[apply(spaces)]
#[tokio::test]
async fn access(space: Space) {
    let mut a = Node::new(uri("vos://x!space/a"), NodeType::Container).unwrap();
    a.set_property(GROUPWRITE, "carol");
    space.manager.create(a, OWNER, false).await.unwrap();
    let mut p = Node::new(uri("vos://x!space/p.txt"), NodeType::Data).unwrap();
    p.set_property(PUBLICREAD, "true");
    space.manager.create(p, OWNER, false).await.unwrap();

    let alice = "alice.1000.100.sig";
    let bob = "bob.1001.100.sig";
    let carol = "carol.1002.100.sig";
    let manager = &space.manager;

    manager.validate_token(alice).await.unwrap();
    assert!(matches!(
        manager.validate_token("garbage").await,
        Err(Error::InvalidToken(_))
    ));

    manager
        .validate_access(alice, &uri("vos://x!space/a"), false)
        .await
        .unwrap();
    assert!(matches!(
        manager.validate_access(bob, &uri("vos://x!space/a"), false).await,
        Err(Error::PermissionDenied(_))
    ));
    // a node to be created is checked against its parent
    manager
        .validate_access(carol, &uri("vos://x!space/a/new.txt"), false)
        .await
        .unwrap();

    manager
        .validate_access(bob, &uri("vos://x!space/p.txt"), true)
        .await
        .unwrap();
    assert!(matches!(
        manager.validate_access(bob, &uri("vos://x!space/p.txt"), false).await,
        Err(Error::PermissionDenied(_))
    ));
}

/// Publishes a transfer document for `target` under a job with one endpoint.
async fn publish(space: &Space, job_id: &str, endpoint: &str, transfer: Transfer) {
    let store = space.manager.store();
    store.store_transfer(job_id, endpoint).await.unwrap();
    store
        .add_result(job_id, &transfer.to_document().unwrap())
        .await
        .unwrap();
}

#[apply(spaces)]
#[tokio::test]
async fn endpoints(space: Space) {
    let b = space.create("vos://x!space/b.txt", NodeType::Data).await.uri;
    let endpoint = "http://localhost:7007/put/1";
    let transfer = Transfer::new(b.clone(), Direction::PushToSpace)
        .with_protocol(Protocol::new(crate::config::HTTP_PUT).with_endpoint(endpoint));
    publish(&space, "job", endpoint, transfer).await;

    let manager = &space.manager;
    assert_eq!(
        manager.location(&b),
        manager.resolve_location(endpoint, false).await.unwrap()
    );
    assert!(!manager.has_expired(endpoint).await.unwrap());

    manager.update_size(endpoint, 42).await.unwrap();
    assert_eq!(
        Some("42".to_string()),
        manager
            .store()
            .get_property_value(&b, LENGTH)
            .await
            .unwrap()
    );

    manager.complete_transfer(endpoint).await.unwrap();
    assert!(matches!(
        manager.resolve_location(endpoint, false).await,
        Err(Error::InvalidUri(_))
    ));
    assert!(matches!(
        manager.resolve_location("http://localhost/nope", false).await,
        Err(Error::NodeNotFound(_))
    ));
}

/// Requested views go through the transform engine.
#[apply(spaces)]
#[tokio::test]
async fn endpoint_views(space: Space) {
    let b = space.create("vos://x!space/b.txt", NodeType::Data).await.uri;
    let transfer =
        Transfer::new(b.clone(), Direction::PullFromSpace).with_view(View::Fits.uri());
    publish(&space, "fits", "http://h/fits", transfer).await;
    let transfer =
        Transfer::new(b.clone(), Direction::PullFromSpace).with_view(View::Default.uri());
    publish(&space, "default", "http://h/default", transfer).await;

    let manager = &space.manager;
    assert!(matches!(
        manager.resolve_location("http://h/fits", true).await,
        Err(Error::ViewNotSupported(_))
    ));
    assert_eq!(
        manager.location(&b),
        manager.resolve_location("http://h/fits", false).await.unwrap()
    );
    assert_eq!(
        manager.location(&b),
        manager.resolve_location("http://h/default", true).await.unwrap()
    );
}

#[apply(spaces)]
#[tokio::test]
async fn register_existing_bytes(space: Space) {
    let c = uri("vos://x!space/c.txt");
    let location = space.manager.location(&c);
    space
        .manager
        .storage()
        .put_bytes(&location, Box::new(HELLOWORLD_CONTENTS))
        .await
        .unwrap();

    let node = space
        .manager
        .register_node(Node::new(c.clone(), NodeType::Data).unwrap(), OWNER, &location)
        .await
        .unwrap();
    assert_eq!(Some("12"), node.property(LENGTH));
    assert_eq!(
        Some("12".to_string()),
        space
            .manager
            .store()
            .get_property_value(&c, LENGTH)
            .await
            .unwrap()
    );
}

#[apply(spaces)]
#[tokio::test]
async fn updates_detected(space: Space) {
    let b = space.create("vos://x!space/b.txt", NodeType::Data).await.uri;
    // file system timestamps are coarser than the store's
    tokio::time::sleep(std::time::Duration::from_millis(50)).await;
    space.write("vos://x!space/b.txt", HELLOWORLD_CONTENTS).await;
    assert!(space.manager.has_been_updated(&b).await.unwrap());

    space.manager.update_length(&b).await.unwrap();
    assert_eq!(
        Some("12".to_string()),
        space
            .manager
            .store()
            .get_property_value(&b, LENGTH)
            .await
            .unwrap()
    );
}

#[tokio::test]
async fn introspection() {
    let space = Space::memory().await;
    let manager = &space.manager;

    assert!(manager.validate_identifier("vos://x!space/a/b.auto"));
    assert!(!manager.validate_identifier("vos://x!space/a.auto/b"));

    assert_eq!(
        vec![View::Fits.uri(), View::Votable.uri(), View::Tar.uri()],
        manager.accepted_views()
    );
    assert_eq!(manager.accepted_views(), manager.provided_views());
    assert_eq!(2, manager.protocols().server_protocols().len());
    assert_eq!(
        "memory:///a/b",
        manager.location(&uri("vos://x!space/a/b"))
    );
}

#[rstest]
#[case::plain("file:///srv/space", "file:///srv/space/a")]
#[case::trailing_slash("file:///srv/space/", "file:///srv/space/a")]
#[case::memory("memory://", "memory:///a")]
fn locations(#[case] addr: &str, #[case] exp_location: &str) {
    assert_eq!(exp_location, format!("{}/a", super::storage_base(addr)));
}
