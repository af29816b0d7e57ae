//! Bounded pool for blocking gather work.

use std::sync::Arc;
use tokio::runtime::Handle;
use tokio::sync::Semaphore;
use tokio::task::JoinHandle;
use tracing::debug;

/// Hands blocking jobs to the tokio blocking pool, at most `workers` at a time.
#[derive(Debug, Clone)]
pub struct Processing {
    runtime: Handle,
    permits: Arc<Semaphore>,
    workers: usize,
}

impl Processing {
    pub fn new(runtime: Handle, workers: usize) -> Self {
        let workers = workers.max(1);
        Self {
            runtime,
            permits: Arc::new(Semaphore::new(workers)),
            workers,
        }
    }

    /// Uses the runtime the caller is running on.
    pub fn from_current(workers: usize) -> Result<Self, tokio::runtime::TryCurrentError> {
        Ok(Self::new(Handle::try_current()?, workers))
    }

    pub fn workers(&self) -> usize {
        self.workers
    }

    /// Runs `job` once a worker slot is free.
    ///
    /// Jobs submitted after [`Processing::shutdown`] are dropped without running.
    pub fn submit_non_critical<F>(&self, job: F) -> JoinHandle<()>
    where
        F: FnOnce() + Send + 'static,
    {
        let permits = Arc::clone(&self.permits);
        let runtime = self.runtime.clone();
        self.runtime.spawn(async move {
            let Ok(permit) = permits.acquire_owned().await else {
                debug!("Processing is shut down, dropping job");
                return;
            };
            let result = runtime
                .spawn_blocking(move || {
                    job();
                    drop(permit);
                })
                .await;
            if let Err(e) = result {
                debug!("Background job did not complete: {}", e);
            }
        })
    }

    /// Stops accepting jobs. Running jobs finish normally.
    pub fn shutdown(&self) {
        self.permits.close();
    }

    pub fn is_shut_down(&self) -> bool {
        self.permits.is_closed()
    }
}
