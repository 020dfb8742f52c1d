use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{debug, instrument, warn, Instrument};
use uuid::Uuid;

use super::{Outcome, Phase, Transfer, TransferEngine};
use crate::Error;

/// What is known about a job at a point in time.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct JobStatus {
    pub phase: Phase,
    /// The fault that ended the job, in the [Phase::Error] phase.
    pub error: Option<Error>,
    /// The negotiated transfer document, once the job completed.
    pub results: Option<Transfer>,
}

impl JobStatus {
    fn new(phase: Phase) -> Self {
        Self {
            phase,
            error: None,
            results: None,
        }
    }
}

struct Job {
    status: Arc<watch::Sender<JobStatus>>,
    cancel: CancellationToken,
}

/// Hosts transfer jobs in-process, one tokio task per job.
///
/// The scheduler owns the phase transitions of its jobs. Once a job reached
/// a terminal phase, it stays there until [JobScheduler::wait] hands out its
/// final status, after which the job is forgotten.
#[derive(Clone)]
pub struct JobScheduler {
    engine: Arc<TransferEngine>,
    jobs: Arc<RwLock<HashMap<String, Job>>>,
}

/// Moves a job to a new phase, unless it already ended.
fn transition(status: &watch::Sender<JobStatus>, next: JobStatus) -> bool {
    status.send_if_modified(|current| {
        if current.phase.is_terminal() {
            return false;
        }
        *current = next;
        true
    })
}

impl JobScheduler {
    pub fn new(engine: Arc<TransferEngine>) -> Self {
        Self {
            engine,
            jobs: Default::default(),
        }
    }

    pub fn engine(&self) -> &Arc<TransferEngine> {
        &self.engine
    }

    /// Queues a transfer on behalf of `owner`, and returns the id of the job
    /// running it. Validation happens as part of the job: an invalid
    /// transfer ends up in the [Phase::Error] phase.
    #[instrument(skip(self, transfer), fields(transfer.target = %transfer.target))]
    pub fn submit(&self, transfer: Transfer, owner: &str) -> String {
        let job_id = Uuid::new_v4().simple().to_string();
        let (status, _) = watch::channel(JobStatus::new(Phase::Pending));
        let status = Arc::new(status);
        let cancel = CancellationToken::new();
        let tx = status.clone();

        self.jobs.write().insert(
            job_id.clone(),
            Job {
                status,
                cancel: cancel.clone(),
            },
        );
        transition(&tx, JobStatus::new(Phase::Queued));

        let engine = self.engine.clone();
        let owner = owner.to_string();
        let id = job_id.clone();
        let span = tracing::info_span!("transfer_job", job_id = %job_id);
        tokio::spawn(
            async move {
                if cancel.is_cancelled() || !transition(&tx, JobStatus::new(Phase::Executing)) {
                    return;
                }

                let result = match engine.validate(transfer).await {
                    Ok(transfer) => engine.execute(&id, transfer, &owner, &cancel).await,
                    Err(e) => Err(e),
                };

                let next = match result {
                    Ok(Outcome::Completed(transfer)) => JobStatus {
                        results: Some(transfer),
                        ..JobStatus::new(Phase::Completed)
                    },
                    Ok(Outcome::Aborted) => JobStatus::new(Phase::Aborted),
                    Err(e) => {
                        warn!(err=%e, "transfer failed");
                        JobStatus {
                            error: Some(e),
                            ..JobStatus::new(Phase::Error)
                        }
                    }
                };
                debug!(phase = ?next.phase, "job ended");
                transition(&tx, next);
            }
            .instrument(span),
        );

        job_id
    }

    pub fn status(&self, job_id: &str) -> Option<JobStatus> {
        self.jobs
            .read()
            .get(job_id)
            .map(|job| job.status.borrow().clone())
    }

    pub fn subscribe(&self, job_id: &str) -> Option<watch::Receiver<JobStatus>> {
        self.jobs.read().get(job_id).map(|job| job.status.subscribe())
    }

    /// Waits for a job to reach a terminal phase, and removes it from the
    /// scheduler. Later lookups of the job id fail.
    pub async fn wait(&self, job_id: &str) -> Result<JobStatus, Error> {
        let mut rx = self
            .subscribe(job_id)
            .ok_or_else(|| Error::NodeNotFound(format!("no job {}", job_id)))?;
        let status = rx
            .wait_for(|status| status.phase.is_terminal())
            .await
            .map_err(|e| Error::InternalFault(format!("job {} vanished: {}", job_id, e)))?
            .clone();

        self.jobs.write().remove(job_id);
        debug!(%job_id, phase = ?status.phase, "job forgotten");
        Ok(status)
    }

    /// Asks a job to stop. Jobs that did not start executing yet end in the
    /// [Phase::Aborted] phase right away, running ones at their next
    /// cancellation point.
    #[instrument(skip(self))]
    pub fn abort(&self, job_id: &str) -> Result<(), Error> {
        let jobs = self.jobs.read();
        let job = jobs
            .get(job_id)
            .ok_or_else(|| Error::NodeNotFound(format!("no job {}", job_id)))?;

        job.cancel.cancel();
        let phase = job.status.borrow().phase;
        if matches!(phase, Phase::Pending | Phase::Queued) {
            transition(&job.status, JobStatus::new(Phase::Aborted));
        }
        Ok(())
    }
}
