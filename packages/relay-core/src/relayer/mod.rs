use std::sync::Arc;

use tokio::time::{sleep, Duration};
use tracing::{error, info, warn};

use crate::{
    config::RelayerConfig,
    submitter::MessageSubmitter,
    types::SubmissionReceipt,
    Error,
};

pub mod ingest;
pub mod queue;
pub mod shutdown;

pub use ingest::{EventSource, Ingestor, NdjsonEvents};
pub use queue::{QueuedMessage, RelayProducer, RelayQueue};
pub use shutdown::Shutdown;

/// Bounded retry for transient destination failures. `max_retries = 0`
/// means a single attempt per message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub retry_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 0,
            retry_delay: Duration::from_secs(1),
        }
    }
}

impl RetryPolicy {
    /// Linear backoff before retry number `attempt`, saturating instead of
    /// overflowing.
    pub fn backoff(&self, attempt: u32) -> Duration {
        self.retry_delay.saturating_mul(attempt)
    }
}

impl From<&RelayerConfig> for RetryPolicy {
    fn from(config: &RelayerConfig) -> Self {
        Self {
            max_retries: config.max_retries,
            retry_delay: Duration::from_millis(config.retry_delay_ms),
        }
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct RelayStats {
    pub submitted: u64,
    pub failed: u64,
}

/// Drains the relay queue into the submitter, one message at a time.
pub struct Coordinator {
    submitter: Arc<dyn MessageSubmitter>,
    retry: RetryPolicy,
}

impl Coordinator {
    pub fn new(submitter: Arc<dyn MessageSubmitter>, retry: RetryPolicy) -> Self {
        Self { submitter, retry }
    }

    /// Runs until shutdown is triggered or every producer is gone and the
    /// queue is empty. A failed message is logged and skipped.
    pub async fn start(&self, queue: &mut RelayQueue, shutdown: Shutdown) -> Result<RelayStats, Error> {
        info!("Starting relay coordinator...");
        let mut stats = RelayStats::default();

        loop {
            let next = tokio::select! {
                biased;
                _ = shutdown.wait() => {
                    info!("Shutdown requested, stopping coordinator");
                    break;
                }
                next = queue.next() => next,
            };
            let Some(queued) = next else {
                info!("Relay queue closed and drained");
                break;
            };

            let app_id = queued.message.app_id_hex();
            match self.relay(&queued, &shutdown).await {
                Ok(receipt) => {
                    stats.submitted += 1;
                    info!(
                        app_id = %app_id,
                        correlation_id = queued.correlation_id,
                        nonce = receipt.nonce,
                        "Relayed message"
                    );
                }
                Err(e) if e.is_pipeline_fatal() => {
                    error!(
                        app_id = %app_id,
                        correlation_id = queued.correlation_id,
                        kind = e.kind(),
                        error = %e,
                        "Unrecoverable relay failure"
                    );
                    return Err(e);
                }
                Err(e) => {
                    stats.failed += 1;
                    error!(
                        app_id = %app_id,
                        correlation_id = queued.correlation_id,
                        kind = e.kind(),
                        error = %e,
                        "Failure submitting message to destination chain"
                    );
                }
            }
        }

        info!(submitted = stats.submitted, failed = stats.failed, "Relay coordinator stopped");
        Ok(stats)
    }

    async fn relay(&self, queued: &QueuedMessage, shutdown: &Shutdown) -> Result<SubmissionReceipt, Error> {
        let mut retry_count = 0;

        loop {
            match self.submitter.submit(&queued.message).await {
                Ok(receipt) => return Ok(receipt),
                Err(e) if e.is_retryable() && retry_count < self.retry.max_retries => {
                    retry_count += 1;
                    let delay = self.retry.backoff(retry_count);
                    warn!(
                        correlation_id = queued.correlation_id,
                        retry = retry_count,
                        max_retries = self.retry.max_retries,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "Retrying message relay"
                    );
                    tokio::select! {
                        _ = shutdown.wait() => return Err(e),
                        _ = sleep(delay) => {}
                    }
                }
                Err(e) => return Err(e),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::AttestedMessage;
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::Mutex;

    fn message(tag: u8) -> AttestedMessage {
        AttestedMessage {
            app_id: [tag; 32],
            payload: vec![tag],
        }
    }

    /// Records every attempt and fails according to a per-tag script.
    #[derive(Default)]
    struct ScriptedSubmitter {
        attempts: Mutex<Vec<u8>>,
        failures: Mutex<HashMap<u8, Vec<Error>>>,
    }

    impl ScriptedSubmitter {
        fn fail(self, tag: u8, errors: Vec<Error>) -> Self {
            self.failures.lock().unwrap().insert(tag, errors);
            self
        }

        fn attempts(&self) -> Vec<u8> {
            self.attempts.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl MessageSubmitter for ScriptedSubmitter {
        async fn submit(&self, message: &AttestedMessage) -> Result<SubmissionReceipt, Error> {
            let tag = message.app_id[0];
            let attempt = {
                let mut attempts = self.attempts.lock().unwrap();
                attempts.push(tag);
                attempts.len() as u32
            };
            if let Some(errors) = self.failures.lock().unwrap().get_mut(&tag) {
                if !errors.is_empty() {
                    return Err(errors.remove(0));
                }
            }
            Ok(SubmissionReceipt {
                tx_hash: [tag; 32],
                nonce: attempt,
                app_id: message.app_id,
            })
        }
    }

    async fn run(submitter: Arc<ScriptedSubmitter>, retry: RetryPolicy, tags: &[u8]) -> RelayStats {
        let (producer, mut queue) = RelayQueue::bounded(16);
        for tag in tags {
            producer.enqueue(message(*tag)).await.unwrap();
        }
        drop(producer);
        Coordinator::new(submitter, retry)
            .start(&mut queue, Shutdown::new())
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_messages_submitted_in_queue_order() {
        let submitter = Arc::new(ScriptedSubmitter::default());
        let stats = run(submitter.clone(), RetryPolicy::default(), &[1, 2, 3]).await;
        assert_eq!(submitter.attempts(), vec![1, 2, 3]);
        assert_eq!(stats, RelayStats { submitted: 3, failed: 0 });
    }

    #[tokio::test]
    async fn test_failed_message_does_not_stop_pipeline() {
        let submitter = Arc::new(
            ScriptedSubmitter::default().fail(2, vec![Error::Submission("pool rejected".into())]),
        );
        let stats = run(submitter.clone(), RetryPolicy::default(), &[1, 2, 3]).await;
        assert_eq!(submitter.attempts(), vec![1, 2, 3]);
        assert_eq!(stats, RelayStats { submitted: 2, failed: 1 });
    }

    #[tokio::test]
    async fn test_transient_errors_are_retried() {
        let submitter = Arc::new(ScriptedSubmitter::default().fail(
            2,
            vec![
                Error::AccountState("timeout".into()),
                Error::MetadataFetch("timeout".into()),
            ],
        ));
        let retry = RetryPolicy {
            max_retries: 2,
            retry_delay: Duration::from_millis(1),
        };
        let stats = run(submitter.clone(), retry, &[1, 2, 3]).await;
        assert_eq!(submitter.attempts(), vec![1, 2, 2, 2, 3]);
        assert_eq!(stats, RelayStats { submitted: 3, failed: 0 });
    }

    #[tokio::test]
    async fn test_retries_are_bounded() {
        let submitter = Arc::new(ScriptedSubmitter::default().fail(
            1,
            vec![
                Error::Submission("a".into()),
                Error::Submission("b".into()),
                Error::Submission("c".into()),
            ],
        ));
        let retry = RetryPolicy {
            max_retries: 1,
            retry_delay: Duration::from_millis(1),
        };
        let stats = run(submitter.clone(), retry, &[1, 2]).await;
        assert_eq!(submitter.attempts(), vec![1, 1, 2]);
        assert_eq!(stats, RelayStats { submitted: 1, failed: 1 });
    }

    #[test]
    fn test_backoff_grows_linearly_and_saturates() {
        let retry = RetryPolicy {
            max_retries: u32::MAX,
            retry_delay: Duration::from_millis(250),
        };
        assert_eq!(retry.backoff(1), Duration::from_millis(250));
        assert_eq!(retry.backoff(4), Duration::from_secs(1));

        let config = RelayerConfig {
            queue_capacity: 1,
            max_retries: u32::MAX,
            retry_delay_ms: u64::MAX,
        };
        let retry = RetryPolicy::from(&config);
        assert_eq!(retry.backoff(u32::MAX), Duration::MAX);
    }

    #[tokio::test]
    async fn test_signing_errors_are_not_retried() {
        let submitter = Arc::new(
            ScriptedSubmitter::default().fail(1, vec![Error::Signing("bad key".into())]),
        );
        let retry = RetryPolicy {
            max_retries: 3,
            retry_delay: Duration::from_millis(1),
        };
        let stats = run(submitter.clone(), retry, &[1]).await;
        assert_eq!(submitter.attempts(), vec![1]);
        assert_eq!(stats.failed, 1);
    }

    #[tokio::test]
    async fn test_shutdown_stops_waiting_coordinator() {
        let submitter = Arc::new(ScriptedSubmitter::default());
        let (producer, mut queue) = RelayQueue::bounded(4);
        let shutdown = Shutdown::new();

        let handle = {
            let shutdown = shutdown.clone();
            tokio::spawn(async move {
                Coordinator::new(submitter, RetryPolicy::default())
                    .start(&mut queue, shutdown)
                    .await
            })
        };
        producer.enqueue(message(1)).await.unwrap();
        tokio::time::sleep(Duration::from_millis(20)).await;
        shutdown.trigger();

        let stats = tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .unwrap()
            .unwrap()
            .unwrap();
        assert_eq!(stats.submitted, 1);
    }

    #[tokio::test]
    async fn test_shutdown_before_start_leaves_queue_untouched() {
        let submitter = Arc::new(ScriptedSubmitter::default());
        let (producer, mut queue) = RelayQueue::bounded(4);
        producer.enqueue(message(1)).await.unwrap();

        let shutdown = Shutdown::new();
        shutdown.trigger();
        let stats = Coordinator::new(submitter.clone(), RetryPolicy::default())
            .start(&mut queue, shutdown)
            .await
            .unwrap();
        assert_eq!(stats, RelayStats::default());
        assert!(submitter.attempts().is_empty());
    }
}
