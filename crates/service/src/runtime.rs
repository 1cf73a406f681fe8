//! Long-lived worker pools.
//!
//! CPU-bound work (parsing, chunking) runs on a dedicated rayon pool and is
//! awaited through a oneshot channel, so async tasks never block a runtime
//! thread. I/O-bound collaborator calls are bounded by a shared semaphore.

use quill_config::RuntimeConfig;
use quill_core::error::Error;
use std::sync::Arc;
use tokio::sync::{Semaphore, oneshot};
use tracing::{debug, info};

pub struct WorkerPools {
    cpu: rayon::ThreadPool,
    io: Arc<Semaphore>,
    cpu_workers: usize,
    io_workers: usize,
}

impl WorkerPools {
    pub fn new(config: &RuntimeConfig) -> Result<Self, Error> {
        let cpu_workers = config.resolved_cpu_workers();
        let io_workers = config.resolved_io_workers();

        let cpu = rayon::ThreadPoolBuilder::new()
            .num_threads(cpu_workers)
            .thread_name(|i| format!("quill-cpu-{i}"))
            .build()
            .map_err(|e| Error::Internal(format!("Failed to build CPU pool: {e}")))?;

        info!(cpu_workers, io_workers, "Worker pools started");
        Ok(Self {
            cpu,
            io: Arc::new(Semaphore::new(io_workers)),
            cpu_workers,
            io_workers,
        })
    }

    pub fn cpu_workers(&self) -> usize {
        self.cpu_workers
    }

    pub fn io_workers(&self) -> usize {
        self.io_workers
    }

    /// Permit pool shared by every collaborator handle.
    pub fn io_permits(&self) -> Arc<Semaphore> {
        self.io.clone()
    }

    /// Run `job` on the CPU pool and await its result.
    pub async fn run_cpu<T, F>(&self, job: F) -> Result<T, Error>
    where
        T: Send + 'static,
        F: FnOnce() -> T + Send + 'static,
    {
        let (tx, rx) = oneshot::channel();
        self.cpu.spawn(move || {
            let _ = tx.send(job());
        });
        rx.await
            .map_err(|_| Error::Internal("CPU worker dropped its result".into()))
    }

    /// Stop handing out I/O permits. In-flight calls finish normally.
    pub fn close(&self) {
        self.io.close();
        debug!("I/O permit pool closed");
    }
}
