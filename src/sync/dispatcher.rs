//! Action dispatcher
//!
//! A bounded FIFO queue with many producers (obs-websocket pump, config
//! watcher, Ctrl+C handler, retry timers) and exactly one consumer, the
//! engine. Producers on plain threads use [`DispatcherHandle::submit`], which
//! never blocks; async producers use [`DispatcherHandle::send`].

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc::{self, error::TrySendError};
use tracing::{debug, warn};

use super::Task;

/// Producer side, cheap to clone
#[derive(Debug, Clone)]
pub struct DispatcherHandle {
    tx: mpsc::Sender<Task>,
    dropped: Arc<AtomicU64>,
}

impl DispatcherHandle {
    /// Enqueue without waiting. Returns false if the task was dropped.
    pub fn submit(&self, task: Task) -> bool {
        match self.tx.try_send(task) {
            Ok(()) => true,
            Err(TrySendError::Full(task)) => {
                let dropped = self.dropped.fetch_add(1, Ordering::Relaxed) + 1;
                warn!(
                    "Dispatcher queue full, dropping {:?} ({} dropped so far)",
                    task, dropped
                );
                false
            }
            Err(TrySendError::Closed(task)) => {
                debug!("Dispatcher closed, discarding {:?}", task);
                false
            }
        }
    }

    /// Enqueue, waiting for room. Returns false once the consumer is gone.
    pub async fn send(&self, task: Task) -> bool {
        match self.tx.send(task).await {
            Ok(()) => true,
            Err(e) => {
                debug!("Dispatcher closed, discarding {:?}", e.0);
                false
            }
        }
    }

    /// Tasks dropped because the queue was full
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}

/// Consumer side, owned by the engine
#[derive(Debug)]
pub struct TaskQueue {
    rx: mpsc::Receiver<Task>,
}

impl TaskQueue {
    pub async fn next(&mut self) -> Option<Task> {
        self.rx.recv().await
    }

    /// Refuse further tasks and throw away whatever is still queued
    pub fn close_and_discard(&mut self) -> usize {
        self.rx.close();
        let mut discarded = 0;
        while self.rx.try_recv().is_ok() {
            discarded += 1;
        }
        discarded
    }
}

/// Create the dispatcher queue
pub fn dispatcher_channel(capacity: usize) -> (DispatcherHandle, TaskQueue) {
    let (tx, rx) = mpsc::channel(capacity.max(1));
    (
        DispatcherHandle {
            tx,
            dropped: Arc::new(AtomicU64::new(0)),
        },
        TaskQueue { rx },
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::monitor::RewireTrigger;

    #[tokio::test]
    async fn test_fifo_across_threads() {
        let (handle, mut queue) = dispatcher_channel(16);

        let worker = handle.clone();
        std::thread::spawn(move || {
            worker.submit(Task::Rewire(RewireTrigger::Startup));
            worker.submit(Task::Retry { episode: 1 });
        })
        .join()
        .unwrap();
        handle.send(Task::Shutdown).await;

        assert_eq!(
            queue.next().await,
            Some(Task::Rewire(RewireTrigger::Startup))
        );
        assert_eq!(queue.next().await, Some(Task::Retry { episode: 1 }));
        assert_eq!(queue.next().await, Some(Task::Shutdown));
    }

    #[tokio::test]
    async fn test_submit_drops_when_full() {
        let (handle, _queue) = dispatcher_channel(1);

        assert!(handle.submit(Task::Shutdown));
        assert!(!handle.submit(Task::Shutdown));
        assert_eq!(handle.dropped(), 1);
    }

    #[tokio::test]
    async fn test_close_discards_pending() {
        let (handle, mut queue) = dispatcher_channel(8);
        handle.submit(Task::Retry { episode: 1 });
        handle.submit(Task::Retry { episode: 2 });

        assert_eq!(queue.close_and_discard(), 2);
        assert!(!handle.submit(Task::Shutdown));
        assert!(!handle.send(Task::Shutdown).await);
        assert_eq!(handle.dropped(), 0);
    }
}
