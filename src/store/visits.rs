//! Visit recording
//!
//! Redirects hand visits to a bounded queue served by a fixed pool of
//! workers. Delivery is at most once: a full queue drops the visit and a
//! failed append is only logged.

use std::sync::{Arc, RwLock};

use tokio::sync::{Mutex, mpsc};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::errors::{Result, ShortenerError};
use crate::storage::{Storage, Visitor};

struct VisitJob {
    entry_id: String,
    visit_id: String,
    visitor: Visitor,
}

pub struct VisitRecorder {
    sender: RwLock<Option<mpsc::Sender<VisitJob>>>,
    workers: Mutex<Vec<JoinHandle<()>>>,
}

/// Fresh id for one visit, unrelated to the entry id
pub fn new_visit_id() -> String {
    Uuid::new_v4().to_string()
}

/// Append one visit to the entry's log
pub async fn record(
    storage: &dyn Storage,
    entry_id: &str,
    visit_id: &str,
    visitor: &Visitor,
) -> Result<()> {
    match storage.register_visitor(entry_id, visit_id, visitor).await {
        Ok(()) => {
            info!(
                visit_id = %visit_id,
                entry_id = %entry_id,
                ip = %visitor.ip,
                "Registered visit"
            );
            Ok(())
        }
        // 条目在入队后被删除
        Err(e @ ShortenerError::NoEntryFound(_)) => {
            warn!(
                "Dropped visit {} for entry {}: entry no longer exists",
                visit_id, entry_id
            );
            Err(e)
        }
        Err(e) => {
            error!(
                "Could not register visit {} for entry {}: {}",
                visit_id, entry_id, e
            );
            Err(e)
        }
    }
}

impl VisitRecorder {
    /// Spawn `workers` tasks on the current tokio runtime.
    pub fn new(storage: Arc<dyn Storage>, workers: usize, capacity: usize) -> Self {
        let (tx, rx) = mpsc::channel::<VisitJob>(capacity.max(1));
        let rx = Arc::new(Mutex::new(rx));

        let handles = (0..workers.max(1))
            .map(|n| {
                let rx = Arc::clone(&rx);
                let storage = Arc::clone(&storage);
                tokio::spawn(async move {
                    loop {
                        // 只在取任务时持锁，写入期间其他 worker 可以继续取
                        let job = rx.lock().await.recv().await;
                        let Some(job) = job else {
                            break;
                        };
                        let _ = record(
                            storage.as_ref(),
                            &job.entry_id,
                            &job.visit_id,
                            &job.visitor,
                        )
                        .await;
                    }
                    debug!("Visit worker {} stopped", n);
                })
            })
            .collect();

        debug!(
            "Visit recorder started: {} workers, queue capacity {}",
            workers.max(1),
            capacity.max(1)
        );

        Self {
            sender: RwLock::new(Some(tx)),
            workers: Mutex::new(handles),
        }
    }

    /// Queue a visit without waiting. Returns false when it was dropped.
    pub fn dispatch(&self, entry_id: &str, visitor: Visitor) -> bool {
        let guard = self.sender.read().unwrap_or_else(|e| e.into_inner());
        let Some(sender) = guard.as_ref() else {
            warn!("Visit recorder closed, dropping visit for entry {}", entry_id);
            return false;
        };

        let job = VisitJob {
            entry_id: entry_id.to_string(),
            visit_id: new_visit_id(),
            visitor,
        };
        match sender.try_send(job) {
            Ok(()) => true,
            Err(mpsc::error::TrySendError::Full(job)) => {
                warn!(
                    "Visit queue full, dropping visit {} for entry {}",
                    job.visit_id, job.entry_id
                );
                false
            }
            Err(mpsc::error::TrySendError::Closed(job)) => {
                warn!(
                    "Visit queue closed, dropping visit {} for entry {}",
                    job.visit_id, job.entry_id
                );
                false
            }
        }
    }

    /// Stop accepting visits, let the workers drain the queue, then join them.
    pub async fn close(&self) {
        let sender = self
            .sender
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .take();
        if sender.is_none() {
            return;
        }
        drop(sender);

        let handles = std::mem::take(&mut *self.workers.lock().await);
        for handle in handles {
            if let Err(e) = handle.await {
                error!("Visit worker panicked: {}", e);
            }
        }
        info!("Visit recorder drained");
    }
}
