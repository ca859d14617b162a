use std::sync::{
    atomic::{AtomicU64, Ordering},
    Arc,
};

use tokio::sync::mpsc;

use crate::{types::AttestedMessage, Error};

/// A message plus the id used to correlate its log lines.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueuedMessage {
    pub correlation_id: u64,
    pub message: AttestedMessage,
}

/// Producer half of the relay queue.
#[derive(Debug, Clone)]
pub struct RelayProducer {
    tx: mpsc::Sender<QueuedMessage>,
    next_id: Arc<AtomicU64>,
}

impl RelayProducer {
    /// Waits while the queue is full.
    pub async fn enqueue(&self, message: AttestedMessage) -> Result<u64, Error> {
        let correlation_id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.tx
            .send(QueuedMessage {
                correlation_id,
                message,
            })
            .await
            .map_err(|_| Error::QueueClosed)?;
        Ok(correlation_id)
    }
}

/// Bounded FIFO consumed by the coordinator.
#[derive(Debug)]
pub struct RelayQueue {
    rx: mpsc::Receiver<QueuedMessage>,
}

impl RelayQueue {
    pub fn bounded(capacity: usize) -> (RelayProducer, RelayQueue) {
        let (tx, rx) = mpsc::channel(capacity);
        (
            RelayProducer {
                tx,
                next_id: Arc::new(AtomicU64::new(1)),
            },
            RelayQueue { rx },
        )
    }

    /// `None` once every producer is gone and the queue is drained.
    pub async fn next(&mut self) -> Option<QueuedMessage> {
        self.rx.recv().await
    }
}
