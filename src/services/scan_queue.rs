use std::sync::Arc;
use std::time::Duration;

use log::{debug, error, info, warn};
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::sync::{oneshot, Semaphore};
use tokio::task::JoinHandle;

use super::scan_recorder::ScanRecorder;
use crate::config::ScanQueueConfig;
use crate::models::ScanJob;

/// Producer side of the scan queue, shared by every request handler.
///
/// Enqueueing never waits: a full or closed queue drops the scan with a
/// warning so the redirect path is never held up by recording.
#[derive(Clone)]
pub struct ScanQueue {
    sender: mpsc::Sender<ScanJob>,
}

impl ScanQueue {
    pub fn from_sender(sender: mpsc::Sender<ScanJob>) -> Self {
        Self { sender }
    }

    /// Returns `false` when the scan was dropped.
    pub fn enqueue(&self, job: ScanJob) -> bool {
        match self.sender.try_send(job) {
            Ok(()) => true,
            Err(TrySendError::Full(job)) => {
                warn!(
                    "Scan queue is full, dropping scan for '{}' from {}",
                    job.short_code, job.client.ip
                );
                false
            }
            Err(TrySendError::Closed(job)) => {
                warn!(
                    "Scan queue is closed, dropping scan for '{}' from {}",
                    job.short_code, job.client.ip
                );
                false
            }
        }
    }
}

/// Handle to the background recording workers.
pub struct ScanWorkerPool {
    shutdown: oneshot::Sender<()>,
    dispatcher: JoinHandle<()>,
}

impl ScanWorkerPool {
    /// Stops intake, records whatever is already queued and waits for
    /// in-flight scans, giving up after `timeout`.
    pub async fn shutdown(self, timeout: Duration) {
        info!("Draining scan queue (timeout {:?})", timeout);
        let _ = self.shutdown.send(());

        match tokio::time::timeout(timeout, self.dispatcher).await {
            Ok(Ok(())) => info!("Scan workers stopped"),
            Ok(Err(e)) => error!("Scan dispatcher terminated abnormally: {}", e),
            Err(_) => warn!(
                "Timed out after {:?} waiting for pending scans; remaining scans are lost",
                timeout
            ),
        }
    }
}

/// Starts the dispatcher on the current runtime and returns the queue
/// handlers push into.
pub fn spawn_scan_workers(
    recorder: ScanRecorder,
    config: &ScanQueueConfig,
) -> (ScanQueue, ScanWorkerPool) {
    let (sender, receiver) = mpsc::channel(config.capacity);
    let (shutdown_tx, shutdown_rx) = oneshot::channel();

    info!(
        "Starting {} scan workers (queue capacity {})",
        config.workers, config.capacity
    );
    let dispatcher = tokio::spawn(dispatch(recorder, receiver, shutdown_rx, config.workers));

    (
        ScanQueue::from_sender(sender),
        ScanWorkerPool {
            shutdown: shutdown_tx,
            dispatcher,
        },
    )
}

// At most `workers` recordings run at once
async fn dispatch(
    recorder: ScanRecorder,
    mut receiver: mpsc::Receiver<ScanJob>,
    mut shutdown: oneshot::Receiver<()>,
    workers: usize,
) {
    let permits = Arc::new(Semaphore::new(workers));
    let mut draining = false;

    loop {
        let job = if draining {
            receiver.recv().await
        } else {
            tokio::select! {
                job = receiver.recv() => job,
                _ = &mut shutdown => {
                    debug!("Scan queue closed for intake, draining {} queued scans", receiver.len());
                    receiver.close();
                    draining = true;
                    continue;
                }
            }
        };

        let Some(job) = job else { break };

        let permit = match Arc::clone(&permits).acquire_owned().await {
            Ok(permit) => permit,
            Err(_) => break,
        };
        let recorder = recorder.clone();
        tokio::spawn(async move {
            recorder.record(&job).await;
            drop(permit);
        });
    }

    // Wait for in-flight recordings to finish; `workers` is capped by config validation
    if let Ok(all) = permits.acquire_many(workers as u32).await {
        drop(all);
    }
    debug!("Scan dispatcher exited");
}
