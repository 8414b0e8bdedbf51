//! Outbound publish queue
//!
//! The tick loop enqueues jobs without waiting; a single worker task drains
//! the queue and sends every outcome back to the loop, which applies it at
//! the start of the next tick.

use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, warn};

use crate::publish::contract::{PublishError, PublishReceipt, PublishRequest, Publisher};
use crate::simulation::social::Speech;

/// A speech waiting to be published
#[derive(Debug, Clone)]
pub struct PublishJob {
    /// World generation the speech belongs to
    pub generation: u64,
    pub speech: Speech,
}

/// Result of a job, routed back into the loop
#[derive(Debug, Clone)]
pub struct PublishOutcome {
    pub generation: u64,
    pub speech: Speech,
    pub result: Result<PublishReceipt, PublishError>,
}

impl PublishOutcome {
    /// Outcome for a job that never reached the worker
    pub fn dropped(job: PublishJob) -> Self {
        Self {
            generation: job.generation,
            speech: job.speech,
            result: Err(PublishError::RateLimited),
        }
    }
}

/// Sending half held by the loop
#[derive(Debug, Clone)]
pub struct PublishQueue {
    tx: mpsc::Sender<PublishJob>,
}

impl PublishQueue {
    /// Enqueue without waiting; a full or closed queue hands the job back
    pub fn submit(&self, job: PublishJob) -> Result<(), PublishJob> {
        self.tx.try_send(job).map_err(|e| match e {
            mpsc::error::TrySendError::Full(job) | mpsc::error::TrySendError::Closed(job) => job,
        })
    }
}

/// Start the worker task
pub fn spawn_worker<P: Publisher + 'static>(
    publisher: Arc<P>,
    capacity: usize,
) -> (PublishQueue, mpsc::UnboundedReceiver<PublishOutcome>, JoinHandle<()>) {
    let (job_tx, mut job_rx) = mpsc::channel::<PublishJob>(capacity.max(1));
    let (outcome_tx, outcome_rx) = mpsc::unbounded_channel();

    let handle = tokio::spawn(async move {
        while let Some(job) = job_rx.recv().await {
            let request = PublishRequest {
                agent_id: job.speech.agent_id,
                title: job.speech.title.clone(),
                content: job.speech.content.clone(),
            };
            let result = publisher.publish(request).await;
            match &result {
                Ok(receipt) => debug!(agent = %job.speech.agent_id, post = %receipt.post_id, "post published"),
                Err(e) if e.is_soft() => warn!(agent = %job.speech.agent_id, error = %e, "post skipped"),
                Err(e) => error!(agent = %job.speech.agent_id, error = %e, "post failed"),
            }
            let outcome = PublishOutcome {
                generation: job.generation,
                speech: job.speech,
                result,
            };
            if outcome_tx.send(outcome).is_err() {
                // Loop is gone
                break;
            }
        }
        debug!("publish worker stopped");
    });

    (PublishQueue { tx: job_tx }, outcome_rx, handle)
}
