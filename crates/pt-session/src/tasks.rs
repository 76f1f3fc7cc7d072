//! Periodic session tasks
//!
//! Each task ticks on a tokio interval and stops on a broadcast shutdown,
//! when its owner is dropped, or when its handle is aborted.

use std::future::Future;
use std::sync::{Arc, Weak};
use std::time::Duration;

use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::debug;

/// Running periodic tasks for one session
pub(crate) struct SessionTasks {
    shutdown_tx: broadcast::Sender<()>,
    handles: Vec<JoinHandle<()>>,
}

impl SessionTasks {
    pub(crate) fn new() -> Self {
        let (shutdown_tx, _) = broadcast::channel(1);
        Self {
            shutdown_tx,
            handles: Vec::new(),
        }
    }

    /// Run `tick` every `period` against `owner` while it is alive. The
    /// first tick fires immediately when `immediate` is set.
    pub(crate) fn spawn<T, F, Fut>(
        &mut self,
        name: &'static str,
        period: Duration,
        immediate: bool,
        owner: Weak<T>,
        tick: F,
    ) where
        T: Send + Sync + 'static,
        F: Fn(Arc<T>) -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let mut shutdown_rx = self.shutdown_tx.subscribe();
        let handle = tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            if !immediate {
                interval.tick().await;
            }

            loop {
                tokio::select! {
                    _ = interval.tick() => {
                        let Some(owner) = owner.upgrade() else {
                            debug!(task = name, "Session owner dropped");
                            break;
                        };
                        tick(owner).await;
                    }
                    _ = shutdown_rx.recv() => {
                        debug!(task = name, "Session task stopping");
                        break;
                    }
                }
            }
        });
        self.handles.push(handle);
    }

    /// Ask every task to stop after its current tick.
    pub(crate) fn shutdown(self) {
        let _ = self.shutdown_tx.send(());
    }

    /// Stop every task at its next suspension point.
    pub(crate) fn abort(self) {
        for handle in &self.handles {
            handle.abort();
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.handles.len()
    }
}
