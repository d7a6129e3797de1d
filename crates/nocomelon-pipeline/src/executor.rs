//! Worker pool draining the run queue.

use std::any::Any;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, watch, OwnedSemaphorePermit, Semaphore};
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use crate::context::PipelineContext;
use crate::jobs::{execute, record_failure, PipelineJob, StageTracker};
use crate::metrics::record_run;
use crate::registry::InFlightRuns;

/// Dequeues runs and executes them on a bounded number of workers.
pub struct PipelineExecutor {
    ctx: Arc<PipelineContext>,
    receiver: mpsc::Receiver<PipelineJob>,
    in_flight: InFlightRuns,
    semaphore: Arc<Semaphore>,
    workers: usize,
    shutdown_tx: watch::Sender<bool>,
    shutdown_rx: watch::Receiver<bool>,
}

impl PipelineExecutor {
    pub(crate) fn new(
        ctx: Arc<PipelineContext>,
        receiver: mpsc::Receiver<PipelineJob>,
        in_flight: InFlightRuns,
    ) -> Self {
        let workers = ctx.config.workers.max(1);
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        Self {
            ctx,
            receiver,
            in_flight,
            semaphore: Arc::new(Semaphore::new(workers)),
            workers,
            shutdown_tx,
            shutdown_rx,
        }
    }

    /// Start the dispatch loop on the runtime.
    pub fn spawn(self) -> ExecutorHandle {
        let shutdown_tx = self.shutdown_tx.clone();
        let semaphore = Arc::clone(&self.semaphore);
        let workers = self.workers;
        let task = tokio::spawn(self.run());
        ExecutorHandle {
            shutdown_tx,
            semaphore,
            workers,
            task,
        }
    }

    async fn run(mut self) {
        info!(workers = self.workers, "Pipeline executor started");

        loop {
            // A worker slot is claimed before dequeuing so waiting runs stay
            // in the bounded queue.
            let permit = tokio::select! {
                _ = self.shutdown_rx.changed() => break,
                permit = Arc::clone(&self.semaphore).acquire_owned() => match permit {
                    Ok(p) => p,
                    Err(_) => break,
                },
            };

            let job = tokio::select! {
                _ = self.shutdown_rx.changed() => break,
                job = self.receiver.recv() => match job {
                    Some(job) => job,
                    None => break,
                },
            };

            self.dispatch(job, permit);
        }

        info!("Pipeline executor stopped accepting runs");
    }

    /// Run one job under supervision.
    ///
    /// The job body runs in its own task; a panic becomes an error
    /// checkpoint at the stage it was in.
    fn dispatch(&self, job: PipelineJob, permit: OwnedSemaphorePermit) {
        let ctx = Arc::clone(&self.ctx);
        let in_flight = self.in_flight.clone();

        tokio::spawn(async move {
            let _permit = permit;
            let key = job.key().clone();
            let kind = job.kind();
            let tracker = StageTracker::new(job.first_stage());

            let worker = {
                let ctx = Arc::clone(&ctx);
                let tracker = tracker.clone();
                tokio::spawn(async move { execute(&ctx, job, tracker).await })
            };

            if let Err(e) = worker.await {
                let stage = tracker.get();
                let message = if e.is_panic() {
                    format!("internal error: {}", panic_message(e.into_panic()))
                } else {
                    "internal error: run was cancelled".to_string()
                };
                error!(
                    user_id = %key.user_id,
                    run_id = %key.run_id,
                    stage = %stage,
                    "Run aborted: {}", message
                );
                record_failure(&ctx, &key, stage, &message).await;
                record_run(kind, "panic");
            }

            in_flight.remove(&key);
        });
    }
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "run panicked".to_string()
    }
}

/// Control handle for a running executor.
pub struct ExecutorHandle {
    shutdown_tx: watch::Sender<bool>,
    semaphore: Arc<Semaphore>,
    workers: usize,
    task: JoinHandle<()>,
}

impl ExecutorHandle {
    /// Runs currently executing.
    pub fn active_runs(&self) -> usize {
        self.workers - self.semaphore.available_permits()
    }

    /// Stop dequeuing and wait up to `timeout` for running jobs.
    ///
    /// Runs still queued stay in their accepted checkpoint state.
    pub async fn shutdown(self, timeout: Duration) {
        info!("Pipeline executor shutting down");
        let _ = self.shutdown_tx.send(true);
        if let Err(e) = self.task.await {
            warn!("Executor dispatch task ended abnormally: {}", e);
        }

        let all = u32::try_from(self.workers).unwrap_or(u32::MAX);
        match tokio::time::timeout(timeout, self.semaphore.acquire_many(all)).await {
            Ok(_) => info!("All pipeline runs finished"),
            Err(_) => warn!(
                active = self.workers - self.semaphore.available_permits(),
                "Shutdown timeout reached with runs still active"
            ),
        }
    }
}
