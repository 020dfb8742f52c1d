//! End to end scenarios for transfer jobs, run through the [JobScheduler]
//! against every space flavour.

use async_trait::async_trait;
use parking_lot::Mutex;
use rstest::*;
use rstest_reuse::{self, *};
use std::collections::HashMap;
use std::io::{self, Cursor};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use tokio::io::AsyncReadExt;
use uuid::Uuid;

use super::{CompletionStrategy, Direction, JobScheduler, Phase, Transfer, TransferEngine};
use crate::capability::{Capability, CapabilityInvocation, CapabilityRegistry};
use crate::config::{CapabilityEntry, RunnerConfig, SpaceConfig, HTTP_GET, HTTP_PUT};
use crate::fixtures::{uri, HELLOWORLD_CONTENTS, OWNER};
use crate::manager::tests::{test_config, Space};
use crate::manager::Detail;
use crate::nodes::{Node, NodeType};
use crate::properties::{LENGTH, TITLE};
use crate::protocol::{Protocol, ProtocolHandler, ProtocolRegistry, Role};
use crate::storage::StorageBackend;
use crate::uri::NodeUri;
use crate::views::View;
use crate::Error;

const LOOPBACK_GET: &str = "ivo://example.org/protocols#loopback-get";
const LOOPBACK_PUT: &str = "ivo://example.org/protocols#loopback-put";

/// Objects living "outside" of the space, keyed by endpoint.
type Remote = Arc<Mutex<HashMap<String, Vec<u8>>>>;

/// Moves bytes between the space and [Remote] instead of the network.
struct Loopback {
    uri: &'static str,
    remote: Remote,
}

#[async_trait]
impl ProtocolHandler for Loopback {
    fn uri(&self) -> &str {
        self.uri
    }

    async fn admin(
        &self,
        _node: &NodeUri,
        protocol: Protocol,
        role: Role,
    ) -> Result<Protocol, Error> {
        match role {
            Role::Server => {
                Ok(protocol.with_endpoint(format!("loopback://space/{}", Uuid::new_v4())))
            }
            Role::Client if protocol.endpoint.is_some() => Ok(protocol),
            Role::Client => Err(Error::InternalFault("no endpoint".to_string())),
        }
    }

    async fn invoke(
        &self,
        protocol: &Protocol,
        location: &str,
        storage: &dyn StorageBackend,
    ) -> io::Result<bool> {
        let Some(endpoint) = &protocol.endpoint else {
            return Ok(false);
        };
        if self.uri == LOOPBACK_GET {
            let Some(data) = self.remote.lock().get(endpoint).cloned() else {
                return Ok(false);
            };
            storage
                .put_bytes(location, Box::new(Cursor::new(data)))
                .await?;
        } else {
            let mut buf = vec![];
            storage
                .get_bytes(location)
                .await?
                .read_to_end(&mut buf)
                .await?;
            self.remote.lock().insert(endpoint.clone(), buf);
        }
        Ok(true)
    }
}

/// Remembers which nodes it was invoked for, and on which port.
struct Recorder {
    uri: String,
    calls: Arc<Mutex<Vec<(NodeUri, u16)>>>,
}

#[async_trait]
impl Capability for Recorder {
    fn uri(&self) -> &str {
        &self.uri
    }

    fn applies_to(&self, node_type: NodeType) -> bool {
        node_type == NodeType::Container
    }

    async fn invoke(&self, invocation: &CapabilityInvocation<'_>) -> Result<bool, Error> {
        self.calls
            .lock()
            .push((invocation.node.clone(), invocation.port));
        Ok(true)
    }
}

struct Harness {
    space: Space,
    scheduler: JobScheduler,
    remote: Remote,
    calls: Arc<Mutex<Vec<(NodeUri, u16)>>>,
}

impl Harness {
    async fn memory() -> Self {
        Self::with_config(false, |_| {}).await
    }

    async fn on_disk() -> Self {
        Self::with_config(true, |_| {}).await
    }

    async fn with_config(on_disk: bool, adjust: impl FnOnce(&mut SpaceConfig)) -> Self {
        let (dir, storage_addr, store_addr) = if on_disk {
            let dir = TempDir::new().unwrap();
            let addr = format!("file://{}", dir.path().display());
            (Some(dir), addr, "redb://")
        } else {
            (None, "memory://".to_string(), "memory://")
        };
        let mut config = test_config(&storage_addr);
        adjust(&mut config);

        let remote = Remote::default();
        let mut protocols = ProtocolRegistry::from_config(&config.protocols);
        for server in [true, false] {
            for uri in [LOOPBACK_GET, LOOPBACK_PUT] {
                protocols.register(
                    Arc::new(Loopback {
                        uri,
                        remote: remote.clone(),
                    }),
                    server,
                );
            }
        }

        let calls = Arc::new(Mutex::new(vec![]));
        let mut capabilities = CapabilityRegistry::from_config(&config.capabilities);
        for uri in config.capability_uris() {
            capabilities.register(Arc::new(Recorder {
                uri,
                calls: calls.clone(),
            }));
        }

        let space = Space::build_with(config, store_addr, dir, |manager| {
            manager
                .with_protocols(protocols)
                .with_capabilities(capabilities)
        })
        .await;
        let engine = TransferEngine::new(space.manager.clone(), space.config.transfers.clone());

        Self {
            scheduler: JobScheduler::new(Arc::new(engine)),
            space,
            remote,
            calls,
        }
    }

    /// Waits for the job to publish its negotiated transfer document.
    async fn published(&self, job_id: &str) -> Transfer {
        for _ in 0..1000 {
            if let Some(doc) = self.space.manager.store().get_result(job_id).await.unwrap() {
                return serde_json::from_str(&doc).unwrap();
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        panic!("job {} never published a transfer document", job_id);
    }

    async fn read(&self, s: &str) -> Vec<u8> {
        let manager = &self.space.manager;
        let mut buf = vec![];
        manager
            .storage()
            .get_bytes(&manager.location(&uri(s)))
            .await
            .unwrap()
            .read_to_end(&mut buf)
            .await
            .unwrap();
        buf
    }

    async fn is_busy(&self, s: &str) -> bool {
        let record = self.space.manager.store().get_record(&uri(s)).await.unwrap();
        record.expect("node must exist").node.busy()
    }
}

/// This produces a template, which will be applied to all individual test functions.
/// See https://github.com/la10736/rstest/issues/130#issuecomment-968864832
#[template]
#[rstest]
#[case::memory(Harness::memory().await)]
#[case::on_disk(Harness::on_disk().await)]
fn harnesses(#[case] harness: Harness) {}

fn push_to(target: &str) -> Transfer {
    Transfer::new(uri(target), Direction::PushToSpace).with_protocol(Protocol::new(HTTP_PUT))
}

/// An upload marks the node busy while the endpoint is handed out, and
/// records the length once the upload is flagged complete.
#[apply(harnesses)]
#[tokio::test]
async fn push_to_lifecycle(harness: Harness) {
    let job_id = harness
        .scheduler
        .submit(push_to("vos://x!space/up.txt"), OWNER);

    let negotiated = harness.published(&job_id).await;
    let endpoint = negotiated.protocols[0]
        .endpoint
        .clone()
        .expect("must have an endpoint");
    assert!(endpoint.starts_with("http://localhost:7007/put/"));
    assert!(harness.is_busy("vos://x!space/up.txt").await);

    // the client uploads
    let manager = &harness.space.manager;
    let location = manager.resolve_location(&endpoint, false).await.unwrap();
    tokio::time::sleep(Duration::from_millis(50)).await;
    manager
        .storage()
        .put_bytes(&location, Box::new(HELLOWORLD_CONTENTS))
        .await
        .unwrap();
    manager.complete_transfer(&endpoint).await.unwrap();

    let status = harness.scheduler.wait(&job_id).await.unwrap();
    assert_eq!(Phase::Completed, status.phase, "{:?}", status.error);
    assert!(!harness.is_busy("vos://x!space/up.txt").await);
    assert_eq!(
        Some("12".to_string()),
        manager
            .store()
            .get_property_value(&uri("vos://x!space/up.txt"), LENGTH)
            .await
            .unwrap()
    );
    assert_eq!(HELLOWORLD_CONTENTS, harness.read("vos://x!space/up.txt").await);
}

#[apply(harnesses)]
#[tokio::test]
async fn push_to_auto(harness: Harness) {
    let job_id = harness
        .scheduler
        .submit(push_to("vos://x!space/f.auto"), OWNER);

    let negotiated = harness.published(&job_id).await;
    assert_ne!("f.auto", negotiated.target.name());
    assert!(harness
        .space
        .manager
        .store()
        .is_stored(&negotiated.target)
        .await
        .unwrap());

    harness.scheduler.abort(&job_id).unwrap();
    let status = harness.scheduler.wait(&job_id).await.unwrap();
    assert_eq!(Phase::Aborted, status.phase);
    assert!(!harness.is_busy(negotiated.target.as_str()).await);
}

/// Terminal phases are final, and waited-on jobs are forgotten.
#[apply(harnesses)]
#[tokio::test]
async fn aborted_stays_aborted(harness: Harness) {
    let job_id = harness
        .scheduler
        .submit(push_to("vos://x!space/up.txt"), OWNER);
    harness.published(&job_id).await;
    let mut rx = harness.scheduler.subscribe(&job_id).unwrap();

    harness.scheduler.abort(&job_id).unwrap();
    rx.wait_for(|status| status.phase.is_terminal())
        .await
        .unwrap();
    harness.scheduler.abort(&job_id).unwrap();
    assert_eq!(
        Some(Phase::Aborted),
        harness.scheduler.status(&job_id).map(|s| s.phase)
    );

    let status = harness.scheduler.wait(&job_id).await.unwrap();
    assert_eq!(Phase::Aborted, status.phase);
    assert_eq!(None, harness.scheduler.status(&job_id));
    assert!(harness.scheduler.subscribe(&job_id).is_none());
    for id in [job_id.as_str(), "nope"] {
        assert!(matches!(
            harness.scheduler.abort(id),
            Err(Error::NodeNotFound(_))
        ));
        assert!(matches!(
            harness.scheduler.wait(id).await,
            Err(Error::NodeNotFound(_))
        ));
    }
}

#[apply(harnesses)]
#[tokio::test]
async fn pull_to(harness: Harness) {
    harness
        .remote
        .lock()
        .insert("loopback://remote/in".to_string(), HELLOWORLD_CONTENTS.to_vec());

    let transfer = Transfer::new(uri("vos://x!space/in.txt"), Direction::PullToSpace)
        .with_protocol(Protocol::new(LOOPBACK_GET).with_endpoint("loopback://remote/in"));
    let job_id = harness.scheduler.submit(transfer, OWNER);

    let status = harness.scheduler.wait(&job_id).await.unwrap();
    assert_eq!(Phase::Completed, status.phase, "{:?}", status.error);
    assert_eq!(HELLOWORLD_CONTENTS, harness.read("vos://x!space/in.txt").await);
    assert!(!harness.is_busy("vos://x!space/in.txt").await);

    let node = harness
        .space
        .manager
        .get_node(&uri("vos://x!space/in.txt"), Detail::Properties, None)
        .await
        .unwrap();
    assert_eq!(Some("12"), node.property(LENGTH));
}

/// A failing transfer ends in the error phase, and frees the node.
#[apply(harnesses)]
#[tokio::test]
async fn pull_to_failure(harness: Harness) {
    let transfer = Transfer::new(uri("vos://x!space/in.txt"), Direction::PullToSpace)
        .with_protocol(Protocol::new(LOOPBACK_GET).with_endpoint("loopback://remote/missing"));
    let job_id = harness.scheduler.submit(transfer, OWNER);

    let status = harness.scheduler.wait(&job_id).await.unwrap();
    assert_eq!(Phase::Error, status.phase);
    assert!(matches!(status.error, Some(Error::InternalFault(_))));
    assert!(!harness.is_busy("vos://x!space/in.txt").await);
}

#[apply(harnesses)]
#[tokio::test]
async fn push_from(harness: Harness) {
    harness
        .space
        .create("vos://x!space/out.txt", NodeType::UnstructuredData)
        .await;
    harness
        .space
        .write("vos://x!space/out.txt", HELLOWORLD_CONTENTS)
        .await;

    let transfer = Transfer::new(uri("vos://x!space/out.txt"), Direction::PushFromSpace)
        .with_protocol(Protocol::new(LOOPBACK_PUT).with_endpoint("loopback://remote/out"));
    let job_id = harness.scheduler.submit(transfer, OWNER);

    let status = harness.scheduler.wait(&job_id).await.unwrap();
    assert_eq!(Phase::Completed, status.phase, "{:?}", status.error);
    assert_eq!(
        Some(HELLOWORLD_CONTENTS.to_vec()),
        harness.remote.lock().get("loopback://remote/out").cloned()
    );
}

#[tokio::test]
async fn pull_from_flagged() {
    let harness = Harness::with_config(false, |config| {
        config.transfers.export_completion = CompletionStrategy::PollUntilFlagged;
    })
    .await;
    harness
        .space
        .create("vos://x!space/out.txt", NodeType::UnstructuredData)
        .await;

    let transfer = Transfer::new(uri("vos://x!space/out.txt"), Direction::PullFromSpace)
        .with_protocol(Protocol::new(HTTP_GET));
    let job_id = harness.scheduler.submit(transfer, OWNER);

    let negotiated = harness.published(&job_id).await;
    let endpoint = negotiated.protocols[0].endpoint.clone().unwrap();
    assert_eq!(
        harness
            .space
            .manager
            .location(&uri("vos://x!space/out.txt")),
        harness
            .space
            .manager
            .resolve_location(&endpoint, true)
            .await
            .unwrap()
    );

    // waits for the flag well past the ceiling
    tokio::time::sleep(Duration::from_millis(1200)).await;
    assert_eq!(
        Some(Phase::Executing),
        harness.scheduler.status(&job_id).map(|s| s.phase)
    );

    harness
        .space
        .manager
        .complete_transfer(&endpoint)
        .await
        .unwrap();
    let status = harness.scheduler.wait(&job_id).await.unwrap();
    assert_eq!(Phase::Completed, status.phase, "{:?}", status.error);
}

/// Without a completion flag, exports are assumed done after the ceiling.
#[tokio::test]
async fn pull_from_ceiling() {
    let harness = Harness::memory().await;
    harness
        .space
        .create("vos://x!space/out.txt", NodeType::UnstructuredData)
        .await;

    let transfer = Transfer::new(uri("vos://x!space/out.txt"), Direction::PullFromSpace)
        .with_protocol(Protocol::new(HTTP_GET));
    let job_id = harness.scheduler.submit(transfer, OWNER);

    let status = harness.scheduler.wait(&job_id).await.unwrap();
    assert_eq!(Phase::Completed, status.phase, "{:?}", status.error);
    assert!(status.results.is_some());
}

#[rstest]
#[case::upload_to_container(
    Transfer::new(uri("vos://x!space/a"), Direction::PushToSpace).with_protocol(Protocol::new(HTTP_PUT)),
    "TypeNotSupported"
)]
#[case::export_missing(
    Transfer::new(uri("vos://x!space/nope"), Direction::PullFromSpace).with_protocol(Protocol::new(HTTP_GET)),
    "NodeNotFound"
)]
#[case::view(
    push_to("vos://x!space/up.txt").with_view(View::Jpeg.uri()),
    "ViewNotSupported"
)]
#[case::no_protocol(
    Transfer::new(uri("vos://x!space/up.txt"), Direction::PushToSpace).with_protocol(Protocol::new("ivo://example.org/protocols#carrier-pigeon")),
    "InternalFault"
)]
#[case::move_missing(
    Transfer::new(uri("vos://x!space/nope"), Direction::Space(uri("vos://x!space/b"))),
    "NodeNotFound"
)]
#[case::move_without_parent(
    Transfer::new(uri("vos://x!space/a"), Direction::Space(uri("vos://x!space/nope/b"))),
    "ContainerNotFound"
)]
#[case::move_onto_data(
    Transfer::new(uri("vos://x!space/a"), Direction::Space(uri("vos://x!space/d.txt"))),
    "DuplicateNode"
)]
#[tokio::test]
async fn rejected(#[case] transfer: Transfer, #[case] exp_fault: &str) {
    let harness = Harness::memory().await;
    harness.space.create("vos://x!space/a", NodeType::Container).await;
    harness.space.create("vos://x!space/d.txt", NodeType::Data).await;

    let job_id = harness.scheduler.submit(transfer, OWNER);
    let status = harness.scheduler.wait(&job_id).await.unwrap();

    assert_eq!(Phase::Error, status.phase);
    assert_eq!(
        Some(exp_fault),
        status.error.as_ref().map(|e| e.fault_name())
    );
}

async fn populate(harness: &Harness) {
    let space = &harness.space;
    space.create("vos://x!space/a", NodeType::Container).await;
    space.create("vos://x!space/a/sub", NodeType::Container).await;
    let mut b = Node::new(uri("vos://x!space/a/sub/b.txt"), NodeType::UnstructuredData).unwrap();
    b.set_property(TITLE, "b");
    space.manager.create(b, OWNER, false).await.unwrap();
    space
        .write("vos://x!space/a/sub/b.txt", HELLOWORLD_CONTENTS)
        .await;
}

async fn run(harness: &Harness, transfer: Transfer) -> Transfer {
    let job_id = harness.scheduler.submit(transfer, OWNER);
    let status = harness.scheduler.wait(&job_id).await.unwrap();
    assert_eq!(Phase::Completed, status.phase, "{:?}", status.error);
    status.results.expect("completed jobs have results")
}

#[apply(harnesses)]
#[tokio::test]
async fn move_container(harness: Harness) {
    populate(&harness).await;
    run(
        &harness,
        Transfer::new(uri("vos://x!space/a"), Direction::Space(uri("vos://x!space/c"))),
    )
    .await;

    let store = harness.space.manager.store();
    for gone in ["vos://x!space/a", "vos://x!space/a/sub", "vos://x!space/a/sub/b.txt"] {
        assert!(!store.is_stored(&uri(gone)).await.unwrap(), "{} must be gone", gone);
    }

    let b = store
        .get_record(&uri("vos://x!space/c/sub/b.txt"))
        .await
        .unwrap()
        .expect("must have moved");
    assert_eq!(
        harness.space.manager.location(&uri("vos://x!space/c/sub/b.txt")),
        b.location
    );
    assert_eq!(Some("b"), b.node.property(TITLE));
    assert_eq!(HELLOWORLD_CONTENTS, harness.read("vos://x!space/c/sub/b.txt").await);

    let c = harness
        .space
        .manager
        .get_node(&uri("vos://x!space/c"), Detail::Max, None)
        .await
        .unwrap();
    assert_eq!(
        vec![uri("vos://x!space/c/sub")],
        c.children().iter().map(|c| c.uri.clone()).collect::<Vec<_>>()
    );
}

/// Moving onto a container moves below it.
#[apply(harnesses)]
#[tokio::test]
async fn move_into_container(harness: Harness) {
    populate(&harness).await;
    harness.space.create("vos://x!space/d", NodeType::Container).await;

    let results = run(
        &harness,
        Transfer::new(
            uri("vos://x!space/a/sub/b.txt"),
            Direction::Space(uri("vos://x!space/d")),
        ),
    )
    .await;
    assert_eq!(Direction::Space(uri("vos://x!space/d/b.txt")), results.direction);
    assert_eq!(HELLOWORLD_CONTENTS, harness.read("vos://x!space/d/b.txt").await);
}

#[apply(harnesses)]
#[tokio::test]
async fn copy_container(harness: Harness) {
    populate(&harness).await;
    run(
        &harness,
        Transfer::new(uri("vos://x!space/a"), Direction::Space(uri("vos://x!space/c")))
            .keep_bytes(true),
    )
    .await;

    let store = harness.space.manager.store();
    for kept in ["vos://x!space/a/sub/b.txt", "vos://x!space/c/sub/b.txt"] {
        assert!(store.is_stored(&uri(kept)).await.unwrap(), "{} must exist", kept);
        assert_eq!(HELLOWORLD_CONTENTS, harness.read(kept).await);
    }

    let copied = store
        .get_record(&uri("vos://x!space/c/sub/b.txt"))
        .await
        .unwrap()
        .expect("must have been copied");
    assert_eq!(Some("b"), copied.node.property(TITLE));
}

/// Moving to a `.null` node deletes the source.
#[apply(harnesses)]
#[tokio::test]
async fn move_to_null(harness: Harness) {
    populate(&harness).await;
    run(
        &harness,
        Transfer::new(
            uri("vos://x!space/a/sub/b.txt"),
            Direction::Space(uri("vos://x!space/a/.null")),
        ),
    )
    .await;

    let manager = &harness.space.manager;
    assert!(!manager
        .store()
        .is_stored(&uri("vos://x!space/a/sub/b.txt"))
        .await
        .unwrap());
    assert!(!manager
        .store()
        .is_stored(&uri("vos://x!space/a/.null"))
        .await
        .unwrap());
    assert!(manager
        .storage()
        .size(&manager.location(&uri("vos://x!space/a/sub/b.txt")))
        .await
        .is_err());
}

/// Writing `<name>.cap.conf` activates the capability on the container, and
/// later writes below it trigger the capability.
#[tokio::test]
async fn capabilities() {
    let harness = Harness::with_config(false, |config| {
        config.capabilities.base_ivorn = "ivo://x/capabilities".to_string();
        config.capabilities.entries = vec![CapabilityEntry {
            name: "tagger".to_string(),
            applies_to: vec![NodeType::Container],
        }];
        config.capabilities.runner = Some(RunnerConfig {
            command: vec![],
            port: 20001,
        });
    })
    .await;
    let a = harness.space.create("vos://x!space/a", NodeType::Container).await;
    assert_eq!(vec!["ivo://x/capabilities#tagger".to_string()], a.capabilities);

    let remote = "loopback://remote/conf".to_string();
    harness.remote.lock().insert(remote.clone(), b"[tagger]".to_vec());
    let pull = |target: &str| {
        Transfer::new(uri(target), Direction::PullToSpace)
            .with_protocol(Protocol::new(LOOPBACK_GET).with_endpoint(remote.clone()))
    };

    run(&harness, pull("vos://x!space/a/tagger.cap.conf")).await;
    assert!(harness.calls.lock().is_empty());
    assert_eq!(
        Some(20001),
        harness
            .space
            .manager
            .store()
            .is_active(&uri("vos://x!space/a"), "ivo://x/capabilities#tagger")
            .await
            .unwrap()
    );

    run(&harness, pull("vos://x!space/a/data.txt")).await;
    assert_eq!(
        vec![(uri("vos://x!space/a/data.txt"), 20001)],
        *harness.calls.lock()
    );
}

/// A copied container carries its capabilities, which can be activated on
/// the copy independently of the source.
#[tokio::test]
async fn copy_keeps_capabilities() {
    let harness = Harness::with_config(false, |config| {
        config.capabilities.base_ivorn = "ivo://x/capabilities".to_string();
        config.capabilities.entries = vec![CapabilityEntry {
            name: "tagger".to_string(),
            applies_to: vec![NodeType::Container],
        }];
        config.capabilities.runner = Some(RunnerConfig {
            command: vec![],
            port: 20001,
        });
    })
    .await;
    harness.space.create("vos://x!space/a", NodeType::Container).await;
    run(
        &harness,
        Transfer::new(uri("vos://x!space/a"), Direction::Space(uri("vos://x!space/c")))
            .keep_bytes(true),
    )
    .await;

    let remote = "loopback://remote/conf".to_string();
    harness.remote.lock().insert(remote.clone(), b"[tagger]".to_vec());
    run(
        &harness,
        Transfer::new(uri("vos://x!space/c/tagger.cap.conf"), Direction::PullToSpace)
            .with_protocol(Protocol::new(LOOPBACK_GET).with_endpoint(remote)),
    )
    .await;

    let store = harness.space.manager.store();
    let tagger = "ivo://x/capabilities#tagger";
    assert_eq!(
        Some(20001),
        store.is_active(&uri("vos://x!space/c"), tagger).await.unwrap()
    );
    assert_eq!(
        None,
        store.is_active(&uri("vos://x!space/a"), tagger).await.unwrap()
    );
}

#[test]
fn transfer_document() {
    use pretty_assertions::assert_eq;

    let transfer = Transfer::new(uri("vos://x!space/a"), Direction::Space(uri("vos://x!space/b")))
        .keep_bytes(true);
    let doc = transfer.to_document().unwrap();
    assert_eq!(
        r#"{"target":"vos://x!space/a","direction":"vos://x!space/b","keepBytes":true}"#,
        doc
    );
    assert_eq!(transfer, serde_json::from_str::<Transfer>(&doc).unwrap());

    let upload: Transfer =
        serde_json::from_str(r#"{"target":"vos://x!space/a","direction":"pushToVoSpace"}"#)
            .unwrap();
    assert_eq!(Direction::PushToSpace, upload.direction);
    assert!(
        serde_json::from_str::<Transfer>(r#"{"target":"vos://x!space/a","direction":"sideways"}"#)
            .is_err()
    );
}
