//! Job queue feeding the worker pool.
//!
//! Jobs travel over a bounded mpsc channel. Workers share the receiver; a
//! failed job goes back on the queue until it has used its attempts, then it
//! is logged as dead.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::errors::SyncError;
use prisoner_indexer_shared::SyncIndex;

/// A unit of work for the worker pool.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IndexJob {
    /// Write one page of prisoners into the index being rebuilt.
    PopulatePage { page: u64, target: SyncIndex },
    /// Re-synchronise one page of prisoners against the active indices.
    RefreshPage { page: u64 },
    /// Re-synchronise a single prisoner.
    IndexPrisoner { prisoner_number: String },
}

#[derive(Debug, Clone)]
pub struct QueuedJob {
    pub job: IndexJob,
    /// Attempts already made.
    pub attempt: usize,
}

/// Handles jobs taken off the queue.
#[async_trait]
pub trait JobHandler: Send + Sync {
    async fn handle(&self, job: &IndexJob) -> Result<(), SyncError>;
}

pub type JobReceiver = Arc<Mutex<mpsc::Receiver<QueuedJob>>>;

/// Sending side of the job queue.
#[derive(Clone)]
pub struct JobQueue {
    sender: mpsc::Sender<QueuedJob>,
    outstanding: Arc<AtomicUsize>,
}

impl JobQueue {
    /// Create a queue holding at most `capacity` waiting jobs.
    pub fn new(capacity: usize) -> (Self, JobReceiver) {
        let (sender, receiver) = mpsc::channel(capacity.max(1));
        let queue = Self {
            sender,
            outstanding: Arc::new(AtomicUsize::new(0)),
        };
        (queue, Arc::new(Mutex::new(receiver)))
    }

    pub async fn enqueue(&self, job: IndexJob) -> Result<(), SyncError> {
        self.outstanding.fetch_add(1, Ordering::SeqCst);
        if let Err(e) = self.sender.send(QueuedJob { job, attempt: 0 }).await {
            self.outstanding.fetch_sub(1, Ordering::SeqCst);
            return Err(SyncError::queue(e.to_string()));
        }
        Ok(())
    }

    /// Jobs enqueued and not yet finished or dead.
    pub fn outstanding(&self) -> usize {
        self.outstanding.load(Ordering::SeqCst)
    }

    /// Wait until every enqueued job has finished.
    pub async fn wait_until_idle(&self) {
        while self.outstanding() > 0 {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    }

    fn finish(&self) {
        self.outstanding.fetch_sub(1, Ordering::SeqCst);
    }

    /// Put a failed job back without blocking the worker that failed it.
    fn requeue(&self, job: QueuedJob) {
        let queue = self.clone();
        tokio::spawn(async move {
            if let Err(e) = queue.sender.send(job).await {
                error!(job = ?e.0.job, "Job queue closed, dropping retried job");
                queue.finish();
            }
        });
    }
}

/// Start `count` workers taking jobs from `receiver`.
pub fn spawn_workers(
    count: usize,
    receiver: JobReceiver,
    queue: JobQueue,
    handler: Arc<dyn JobHandler>,
    max_attempts: usize,
) -> Vec<JoinHandle<()>> {
    info!(workers = count, "Starting job workers");
    (0..count.max(1))
        .map(|worker| {
            let receiver = receiver.clone();
            let queue = queue.clone();
            let handler = handler.clone();
            tokio::spawn(async move {
                loop {
                    let next = receiver.lock().await.recv().await;
                    let Some(mut queued) = next else {
                        debug!(worker = worker, "Job queue closed, worker stopping");
                        break;
                    };

                    queued.attempt += 1;
                    match handler.handle(&queued.job).await {
                        Ok(()) => queue.finish(),
                        Err(e) if queued.attempt < max_attempts => {
                            warn!(
                                worker = worker,
                                job = ?queued.job,
                                attempt = queued.attempt,
                                error = %e,
                                "Job failed, requeueing"
                            );
                            queue.requeue(queued);
                        }
                        Err(e) => {
                            error!(
                                worker = worker,
                                job = ?queued.job,
                                attempts = queued.attempt,
                                error = %e,
                                event = "job_dead",
                                "Job failed permanently"
                            );
                            queue.finish();
                        }
                    }
                }
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex as StdMutex;

    #[derive(Default)]
    struct ScriptedHandler {
        failures_left: AtomicUsize,
        handled: StdMutex<Vec<IndexJob>>,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl JobHandler for ScriptedHandler {
        async fn handle(&self, job: &IndexJob) -> Result<(), SyncError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let failing = self
                .failures_left
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
                .is_ok();
            if failing {
                return Err(SyncError::queue("scripted failure"));
            }
            self.handled.lock().unwrap().push(job.clone());
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_workers_drain_queue() {
        let (queue, receiver) = JobQueue::new(4);
        let handler = Arc::new(ScriptedHandler::default());
        spawn_workers(3, receiver, queue.clone(), handler.clone(), 3);

        for page in 0..10 {
            queue.enqueue(IndexJob::RefreshPage { page }).await.unwrap();
        }
        queue.wait_until_idle().await;

        let mut pages: Vec<u64> = handler
            .handled
            .lock()
            .unwrap()
            .iter()
            .map(|job| match job {
                IndexJob::RefreshPage { page } => *page,
                _ => unreachable!(),
            })
            .collect();
        pages.sort();
        assert_eq!(pages, (0..10).collect::<Vec<_>>());
    }

    #[tokio::test]
    async fn test_failed_job_is_retried() {
        let (queue, receiver) = JobQueue::new(4);
        let handler = Arc::new(ScriptedHandler::default());
        handler.failures_left.store(2, Ordering::SeqCst);
        spawn_workers(1, receiver, queue.clone(), handler.clone(), 3);

        queue
            .enqueue(IndexJob::IndexPrisoner {
                prisoner_number: "A1234AA".to_string(),
            })
            .await
            .unwrap();
        queue.wait_until_idle().await;

        assert_eq!(handler.calls.load(Ordering::SeqCst), 3);
        assert_eq!(handler.handled.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_job_dies_after_max_attempts() {
        let (queue, receiver) = JobQueue::new(4);
        let handler = Arc::new(ScriptedHandler::default());
        handler.failures_left.store(10, Ordering::SeqCst);
        spawn_workers(1, receiver, queue.clone(), handler.clone(), 2);

        queue
            .enqueue(IndexJob::PopulatePage {
                page: 0,
                target: SyncIndex::A,
            })
            .await
            .unwrap();
        queue.wait_until_idle().await;

        assert_eq!(handler.calls.load(Ordering::SeqCst), 2);
        assert!(handler.handled.lock().unwrap().is_empty());
    }
}
