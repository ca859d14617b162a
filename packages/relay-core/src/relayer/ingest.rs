use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader, Lines};
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use super::{queue::RelayProducer, shutdown::Shutdown};
use crate::{transform::MessageTransformer, types::SourceEvent, Error};

/// Delivers source events in the order they were observed.
#[async_trait]
pub trait EventSource: Send {
    /// `Ok(None)` when the source is exhausted. `Err(Error::Encoding)` marks a
    /// record that could not be read and is skipped.
    async fn next_event(&mut self) -> Result<Option<SourceEvent>, Error>;
}

#[async_trait]
impl EventSource for mpsc::Receiver<SourceEvent> {
    async fn next_event(&mut self) -> Result<Option<SourceEvent>, Error> {
        Ok(self.recv().await)
    }
}

/// Newline-delimited JSON events, one `SourceEvent` per line.
pub struct NdjsonEvents<R> {
    lines: Lines<BufReader<R>>,
}

impl<R: AsyncRead + Unpin + Send> NdjsonEvents<R> {
    pub fn new(reader: R) -> Self {
        Self {
            lines: BufReader::new(reader).lines(),
        }
    }
}

#[async_trait]
impl<R: AsyncRead + Unpin + Send> EventSource for NdjsonEvents<R> {
    async fn next_event(&mut self) -> Result<Option<SourceEvent>, Error> {
        loop {
            let line = self
                .lines
                .next_line()
                .await
                .map_err(|e| Error::Network(format!("Failed to read events: {}", e)))?;
            let Some(line) = line else {
                return Ok(None);
            };
            if line.trim().is_empty() {
                continue;
            }
            return serde_json::from_str(&line)
                .map(Some)
                .map_err(|e| Error::Encoding(format!("Malformed event record: {}", e)));
        }
    }
}

/// Transforms source events and feeds them into the relay queue.
pub struct Ingestor {
    transformer: MessageTransformer,
    producer: RelayProducer,
}

impl Ingestor {
    pub fn new(transformer: MessageTransformer, producer: RelayProducer) -> Self {
        Self {
            transformer,
            producer,
        }
    }

    /// Runs until the source is exhausted or shutdown is triggered and
    /// returns the number of enqueued messages. Dropping the producer on
    /// return lets the coordinator drain and stop.
    pub async fn run<S: EventSource>(self, source: &mut S, shutdown: Shutdown) -> Result<u64, Error> {
        let mut enqueued = 0u64;

        loop {
            let next = tokio::select! {
                biased;
                _ = shutdown.wait() => {
                    info!("Shutdown requested, stopping ingestion");
                    break;
                }
                next = source.next_event() => next,
            };

            let event = match next {
                Ok(Some(event)) => event,
                Ok(None) => {
                    info!(enqueued, "Event source exhausted");
                    break;
                }
                Err(e @ Error::Encoding(_)) => {
                    warn!(error = %e, "Dropping unreadable event record");
                    continue;
                }
                Err(e) => {
                    error!(error = %e, "Event source failed");
                    return Err(e);
                }
            };

            let message = match self.transformer.transform(&event) {
                Ok(message) => message,
                Err(e @ Error::Encoding(_)) => {
                    warn!(
                        address = %hex::encode(&event.address),
                        block = ?event.block_number,
                        tx = ?event.transaction_hash.as_ref().map(hex::encode),
                        error = %e,
                        "Dropping malformed source event"
                    );
                    continue;
                }
                Err(e) => {
                    // attestation key is unusable, nothing later can succeed
                    error!(error = %e, kind = e.kind(), "Failed to attest source event");
                    return Err(e);
                }
            };

            let app_id = message.app_id_hex();
            let correlation_id = tokio::select! {
                biased;
                _ = shutdown.wait() => {
                    warn!(app_id = %app_id, "Shutdown while waiting for queue capacity");
                    break;
                }
                queued = self.producer.enqueue(message) => queued?,
            };
            enqueued += 1;
            debug!(
                app_id = %app_id,
                correlation_id,
                block = ?event.block_number,
                "Enqueued attested message"
            );
        }

        Ok(enqueued)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{attest::AttestationSigner, relayer::queue::RelayQueue};
    use std::sync::Arc;

    fn transformer() -> MessageTransformer {
        MessageTransformer::new(Arc::new(AttestationSigner::from_secret(&[4u8; 32]).unwrap()))
    }

    fn event_line(tag: u8) -> String {
        format!(
            r#"{{"address":"0x{}","topics":[],"data":"0x{:02x}"}}"#,
            hex::encode([tag; 20]),
            tag
        )
    }

    #[tokio::test]
    async fn test_ndjson_ingestion_skips_bad_records() {
        let input = [
            event_line(1),
            "not json".to_string(),
            String::new(),
            r#"{"address":"0xaaaa","topics":[],"data":"0x"}"#.to_string(),
            event_line(2),
        ]
        .join("\n");
        let mut source = NdjsonEvents::new(input.as_bytes());

        let (producer, mut queue) = RelayQueue::bounded(8);
        let ingestor = Ingestor::new(transformer(), producer);
        let enqueued = ingestor.run(&mut source, Shutdown::new()).await.unwrap();
        assert_eq!(enqueued, 2);

        assert_eq!(queue.next().await.unwrap().message.app_id[0], 1);
        assert_eq!(queue.next().await.unwrap().message.app_id[0], 2);
        assert!(queue.next().await.is_none());
    }

    #[tokio::test]
    async fn test_channel_source_preserves_order() {
        let (tx, mut rx) = mpsc::channel(8);
        for tag in 1..=3u8 {
            tx.send(SourceEvent::new(vec![tag; 20], vec![], vec![tag]))
                .await
                .unwrap();
        }
        drop(tx);

        let (producer, mut queue) = RelayQueue::bounded(8);
        let enqueued = Ingestor::new(transformer(), producer)
            .run(&mut rx, Shutdown::new())
            .await
            .unwrap();
        assert_eq!(enqueued, 3);
        for tag in 1..=3u8 {
            assert_eq!(queue.next().await.unwrap().message.app_id[0], tag);
        }
    }

    #[tokio::test]
    async fn test_shutdown_unblocks_full_queue() {
        let (tx, mut rx) = mpsc::channel(8);
        for tag in 1..=3u8 {
            tx.send(SourceEvent::new(vec![tag; 20], vec![], vec![]))
                .await
                .unwrap();
        }

        let (producer, _queue) = RelayQueue::bounded(1);
        let shutdown = Shutdown::new();
        let handle = {
            let shutdown = shutdown.clone();
            tokio::spawn(async move {
                Ingestor::new(transformer(), producer)
                    .run(&mut rx, shutdown)
                    .await
            })
        };

        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        shutdown.trigger();
        let enqueued = handle.await.unwrap().unwrap();
        assert_eq!(enqueued, 1);
    }
}
