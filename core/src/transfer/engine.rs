use std::sync::Arc;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use super::{CompletionStrategy, Direction, Outcome, Transfer};
use crate::capability::{short_name, CapabilityInvocation};
use crate::config::TransferConfig;
use crate::manager::NamespaceManager;
use crate::metastore::NodeRecord;
use crate::nodes::{Node, NodeType};
use crate::properties::{timestamp, CTIME};
use crate::protocol::{Protocol, Role};
use crate::uri::NodeUri;
use crate::views::View;
use crate::Error;

/// Runs the body of transfer jobs against a namespace.
pub struct TransferEngine {
    manager: Arc<NamespaceManager>,
    timing: TransferConfig,
}

impl TransferEngine {
    pub fn new(manager: Arc<NamespaceManager>, timing: TransferConfig) -> Self {
        Self { manager, timing }
    }

    pub fn manager(&self) -> &Arc<NamespaceManager> {
        &self.manager
    }

    /// Checks a transfer can be attempted, and narrows the proposed
    /// protocols down to the ones the space supports.
    #[instrument(skip_all, fields(transfer.target = %transfer.target, transfer.direction = %transfer.direction))]
    pub async fn validate(&self, transfer: Transfer) -> Result<Transfer, Error> {
        let mut transfer = transfer;
        let store = self.manager.store();
        let target = &transfer.target;

        if let Direction::Space(dest) = &transfer.direction {
            if !self.manager.valid_parent(dest).await? {
                return Err(Error::ContainerNotFound(format!(
                    "the parent of {} is not a container",
                    dest
                )));
            }
            if !store.is_stored(target).await? {
                return Err(Error::NodeNotFound(target.to_string()));
            }
            if !dest.is_null() {
                if let Some(t) = store.get_type(dest).await? {
                    if t != NodeType::Container {
                        return Err(Error::DuplicateNode(dest.to_string()));
                    }
                }
            }
            return Ok(transfer);
        }

        match (store.get_type(target).await?, &transfer.direction) {
            (Some(NodeType::Container), Direction::PushToSpace | Direction::PullToSpace) => {
                return Err(Error::TypeNotSupported(
                    "data cannot be uploaded to a container".to_string(),
                ));
            }
            (None, Direction::PushFromSpace | Direction::PullFromSpace) => {
                return Err(Error::NodeNotFound(target.to_string()));
            }
            _ => {}
        }

        if let Some(view) = &transfer.view {
            let supported = view
                .parse::<View>()
                .is_ok_and(|v| v == View::Default || self.manager.views().accepts.contains(v));
            if !supported {
                return Err(Error::ViewNotSupported(view.clone()));
            }
        }

        let protocols = self.manager.protocols();
        let supported = match transfer.direction {
            Direction::PushFromSpace | Direction::PullToSpace => protocols.server_protocols(),
            _ => protocols.client_protocols(),
        };
        transfer.protocols.retain(|p| supported.contains(&p.uri));
        if transfer.protocols.is_empty() {
            return Err(Error::InternalFault(
                "the service supports none of the requested protocols".to_string(),
            ));
        }

        Ok(transfer)
    }

    /// Executes a validated transfer. Faults leave no node busy.
    #[instrument(skip(self, transfer, cancel), fields(transfer.target = %transfer.target, transfer.direction = %transfer.direction))]
    pub async fn execute(
        &self,
        job_id: &str,
        transfer: Transfer,
        owner: &str,
        cancel: &CancellationToken,
    ) -> Result<Outcome, Error> {
        let outcome = match transfer.direction.clone() {
            Direction::PushToSpace => self.push_to(job_id, transfer, owner, cancel).await?,
            Direction::PullToSpace => self.pull_to(job_id, transfer, owner).await?,
            Direction::PushFromSpace => self.push_from(job_id, transfer).await?,
            Direction::PullFromSpace => self.pull_from(job_id, transfer, cancel).await?,
            Direction::Space(dest) => self.move_or_copy(job_id, transfer, owner, dest).await?,
        };

        if let Outcome::Completed(transfer) = &outcome {
            let written = match &transfer.direction {
                Direction::PushToSpace | Direction::PullToSpace => Some(transfer.target.clone()),
                Direction::Space(dest) if !dest.is_null() => Some(dest.clone()),
                _ => None,
            };
            if let Some(written) = written {
                self.trigger_capabilities(&written).await?;
                self.activate_capabilities(&written).await?;
            }
        }
        Ok(outcome)
    }

    async fn record(&self, uri: &NodeUri) -> Result<NodeRecord, Error> {
        self.manager
            .store()
            .get_record(uri)
            .await?
            .ok_or_else(|| Error::NodeNotFound(uri.to_string()))
    }

    /// Creates a data node for the target unless one exists. Returns the
    /// target, with any generated name filled in.
    async fn ensure_target(&self, target: &NodeUri, owner: &str) -> Result<NodeUri, Error> {
        if !target.is_auto() && self.manager.store().is_stored(target).await? {
            return Ok(target.clone());
        }
        let node = Node::new(target.clone(), NodeType::Data)?;
        Ok(self.manager.create(node, owner, false).await?.uri)
    }

    /// Lets the handler of each protocol fill in its endpoint.
    async fn negotiate(
        &self,
        target: &NodeUri,
        protocols: Vec<Protocol>,
        role: Role,
    ) -> Result<Vec<Protocol>, Error> {
        let mut negotiated = Vec::with_capacity(protocols.len());
        for protocol in protocols {
            let Some(handler) = self.manager.protocols().get(&protocol.uri) else {
                warn!(protocol.uri = %protocol.uri, "no handler for protocol");
                continue;
            };
            negotiated.push(handler.admin(target, protocol, role).await?);
        }
        Ok(negotiated)
    }

    /// Records every negotiated endpoint against the job, and publishes the
    /// transfer document.
    async fn publish(&self, job_id: &str, transfer: &Transfer) -> Result<(), Error> {
        let store = self.manager.store();
        for endpoint in transfer.protocols.iter().filter_map(|p| p.endpoint.as_deref()) {
            store.store_transfer(job_id, endpoint).await?;
        }
        store.add_result(job_id, &transfer.to_document()?).await
    }

    /// Invokes the handler of each protocol in turn until one succeeds.
    async fn perform(&self, protocols: &[Protocol], location: &str) -> Result<(), Error> {
        let storage = self.manager.storage().as_ref();
        for protocol in protocols {
            let Some(handler) = self.manager.protocols().get(&protocol.uri) else {
                continue;
            };
            match handler.invoke(protocol, location, storage).await {
                Ok(true) => return Ok(()),
                Ok(false) => debug!(protocol.uri = %protocol.uri, "protocol unsuccessful"),
                Err(e) => warn!(err=%e, protocol.uri = %protocol.uri, "protocol failed"),
            }
        }
        Err(Error::InternalFault(
            "none of the requested protocols was successful".to_string(),
        ))
    }

    /// Sleeps in poll intervals until the job's completion flag is set, the
    /// strategy gives up waiting, or the job is cancelled.
    async fn wait_for_completion(
        &self,
        job_id: &str,
        strategy: CompletionStrategy,
        cancel: &CancellationToken,
    ) -> Result<bool, Error> {
        let started = Instant::now();
        let mut last_check = started;
        loop {
            tokio::select! {
                _ = cancel.cancelled() => return Ok(false),
                _ = tokio::time::sleep(self.timing.poll_interval()) => {}
            }

            match strategy {
                CompletionStrategy::PollUntilFlagged => {
                    if self.manager.store().is_completed(job_id).await? {
                        return Ok(true);
                    }
                }
                CompletionStrategy::ElapsedHeuristic => {
                    if started.elapsed() > self.timing.export_ceiling() {
                        info!(job_id, "export ceiling reached, assuming completion");
                        return Ok(true);
                    }
                    if last_check.elapsed() >= self.timing.export_check_interval() {
                        last_check = Instant::now();
                        if self.manager.store().is_completed(job_id).await? {
                            return Ok(true);
                        }
                    }
                }
            }
        }
    }

    async fn push_to(
        &self,
        job_id: &str,
        transfer: Transfer,
        owner: &str,
        cancel: &CancellationToken,
    ) -> Result<Outcome, Error> {
        let mut transfer = transfer;
        transfer.target = self.ensure_target(&transfer.target, owner).await?;
        let target = transfer.target.clone();

        transfer.protocols = self
            .negotiate(&target, std::mem::take(&mut transfer.protocols), Role::Server)
            .await?;

        self.manager.mark_busy(&target).await?;
        let result: Result<Outcome, Error> = async {
            self.publish(job_id, &transfer).await?;
            if !self
                .wait_for_completion(job_id, CompletionStrategy::PollUntilFlagged, cancel)
                .await?
            {
                return Ok(Outcome::Aborted);
            }
            if self.manager.has_been_updated(&target).await? {
                self.manager.update_length(&target).await?;
            }
            Ok::<_, Error>(Outcome::Completed(transfer))
        }
        .await;
        self.manager.clear_busy(&target).await;
        result
    }

    async fn pull_to(&self, job_id: &str, transfer: Transfer, owner: &str) -> Result<Outcome, Error> {
        let mut transfer = transfer;
        transfer.target = self.ensure_target(&transfer.target, owner).await?;
        let target = transfer.target.clone();

        transfer.protocols = self
            .negotiate(&target, std::mem::take(&mut transfer.protocols), Role::Client)
            .await?;
        let location = self.record(&target).await?.location;

        self.manager.mark_busy(&target).await?;
        let result = async {
            self.perform(&transfer.protocols, &location).await?;
            self.manager.update_length(&target).await?;
            self.manager
                .store()
                .add_result(job_id, &transfer.to_document()?)
                .await
        }
        .await;
        self.manager.clear_busy(&target).await;
        result?;

        Ok(Outcome::Completed(transfer))
    }

    async fn push_from(&self, job_id: &str, transfer: Transfer) -> Result<Outcome, Error> {
        let mut transfer = transfer;
        let target = transfer.target.clone();

        // endpoints proposed by the client are used as they are
        let mut negotiated = Vec::with_capacity(transfer.protocols.len());
        for protocol in std::mem::take(&mut transfer.protocols) {
            if protocol.endpoint.is_some() {
                negotiated.push(protocol);
            } else {
                negotiated.extend(self.negotiate(&target, vec![protocol], Role::Server).await?);
            }
        }
        transfer.protocols = negotiated;

        let location = self.record(&target).await?.location;
        self.perform(&transfer.protocols, &location).await?;
        self.manager
            .store()
            .add_result(job_id, &transfer.to_document()?)
            .await?;

        Ok(Outcome::Completed(transfer))
    }

    async fn pull_from(
        &self,
        job_id: &str,
        transfer: Transfer,
        cancel: &CancellationToken,
    ) -> Result<Outcome, Error> {
        let mut transfer = transfer;
        let target = transfer.target.clone();
        transfer.protocols = self
            .negotiate(&target, std::mem::take(&mut transfer.protocols), Role::Server)
            .await?;
        self.publish(job_id, &transfer).await?;

        if !self
            .wait_for_completion(job_id, self.timing.export_completion, cancel)
            .await?
        {
            return Ok(Outcome::Aborted);
        }
        Ok(Outcome::Completed(transfer))
    }

    /// Moves or copies the target, and everything below it, to `dest`.
    /// A `.null` destination deletes the target instead.
    async fn move_or_copy(
        &self,
        job_id: &str,
        transfer: Transfer,
        owner: &str,
        dest: NodeUri,
    ) -> Result<Outcome, Error> {
        let mut transfer = transfer;
        let source = transfer.target.clone();
        let store = self.manager.store();
        let storage = self.manager.storage();

        if dest.is_null() {
            self.manager.delete(&source).await?;
            store.add_result(job_id, &transfer.to_document()?).await?;
            return Ok(Outcome::Completed(transfer));
        }

        let mut dest = if dest.is_auto() {
            dest.with_generated_name()
        } else {
            dest
        };
        if store.get_type(&dest).await? == Some(NodeType::Container) {
            dest = dest.join(source.name())?;
        }
        if store.is_stored(&dest).await? {
            return Err(Error::DuplicateNode(dest.to_string()));
        }
        if dest.is_within(&source) {
            return Err(Error::InvalidData(format!(
                "{} cannot be moved below itself",
                source
            )));
        }

        let record = self.record(&source).await?;
        if record.node.busy() {
            return Err(Error::NodeBusy(source.to_string()));
        }
        let descendants = if record.node.is_container() {
            store.get_all_children(&source).await?
        } else {
            vec![]
        };

        let location = self.manager.location(&dest);
        let now = timestamp(chrono::Utc::now());
        let mut node = record.node;
        node.uri = dest.clone();
        node.set_property(CTIME, now.clone());

        if transfer.keep_bytes {
            debug!(from = %source, to = %dest, "copying");
            storage.copy_bytes(&record.location, &location).await?;
            self.store_copy(node, &record.view, owner, &location).await?;
            for child in descendants {
                let child = self.record(&child).await?;
                let Some(uri) = child.uri.rebase(&source, &dest) else {
                    continue;
                };
                let mut node = child.node;
                node.uri = uri.clone();
                node.set_property(CTIME, now.clone());
                self.store_copy(node, &child.view, owner, &self.manager.location(&uri))
                    .await?;
            }
        } else {
            debug!(from = %source, to = %dest, "moving");
            storage.move_bytes(&record.location, &location).await?;
            store.rename_data(&source, &dest, &location, &node).await?;
            for child in descendants {
                let child = self.record(&child).await?;
                let Some(uri) = child.uri.rebase(&source, &dest) else {
                    continue;
                };
                let mut node = child.node;
                node.uri = uri.clone();
                store
                    .rename_data(&child.uri, &uri, &self.manager.location(&uri), &node)
                    .await?;
            }
        }

        self.manager.update_length(&dest).await?;
        transfer.direction = Direction::Space(dest);
        store.add_result(job_id, &transfer.to_document()?).await?;
        Ok(Outcome::Completed(transfer))
    }

    /// Stores the record of a copied node, and registers its capabilities
    /// like a freshly created node.
    async fn store_copy(
        &self,
        node: Node,
        view: &str,
        owner: &str,
        location: &str,
    ) -> Result<(), Error> {
        let store = self.manager.store();
        for capability in &node.capabilities {
            store.register_capability(&node.uri, capability).await?;
        }
        store
            .store_data(NodeRecord::new(node, view, owner, location))
            .await
    }

    /// Invokes every active capability of the parent of a written node.
    #[instrument(skip(self), fields(node.uri = %target))]
    async fn trigger_capabilities(&self, target: &NodeUri) -> Result<(), Error> {
        let Some(parent) = target.parent() else {
            return Ok(());
        };
        let store = self.manager.store();
        let Some(parent) = store.get_record(&parent).await? else {
            return Ok(());
        };
        let Some(written) = store.get_record(target).await? else {
            return Ok(());
        };

        for capability in &parent.node.capabilities {
            let Some(port) = store.is_active(&parent.uri, capability).await? else {
                continue;
            };
            let Some(handler) = self.manager.capabilities().get(capability) else {
                warn!(capability, "active capability is not registered");
                continue;
            };

            let invocation = CapabilityInvocation {
                node: target,
                location: &written.location,
                capability,
                port,
            };
            let succeeded = handler.invoke(&invocation).await.unwrap_or_else(|e| {
                warn!(err=%e, capability, "capability invocation failed");
                false
            });
            if !succeeded {
                return Err(Error::InternalFault(format!(
                    "the capability {} was unable to complete on node {}",
                    capability, target
                )));
            }
        }
        Ok(())
    }

    /// Activates the capabilities of the parent a `<name>.cap.conf` file was
    /// written to, starting the capability runner if needed.
    #[instrument(skip(self), fields(node.uri = %target))]
    async fn activate_capabilities(&self, target: &NodeUri) -> Result<(), Error> {
        let Some(short) = short_name(target.name()) else {
            return Ok(());
        };
        let Some(parent) = target.parent() else {
            return Ok(());
        };
        let store = self.manager.store();
        let Some(parent) = store.get_record(&parent).await? else {
            return Ok(());
        };

        for capability in parent.node.capabilities.iter().filter(|c| c.ends_with(short)) {
            let port = match store.get_cap_port().await? {
                Some(port) => Some(port),
                None => {
                    let config = self.record(target).await?.location;
                    self.manager.capabilities().ensure_runner(&config)?
                }
            };
            let Some(port) = port else {
                warn!(capability, "no capability runner configured");
                continue;
            };
            info!(capability, port, "activating capability");
            store.set_active(&parent.uri, capability, Some(port)).await?;
        }
        Ok(())
    }
}
