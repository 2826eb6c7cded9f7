//! src/services/queue.rs
//!
//! Queue Gateway. Resolves the notification queue by name, long-polls it once
//! per drain and acknowledges each message after the caller has turned it
//! into something deliverable. A message the caller rejects is left on the
//! queue and comes back after its visibility timeout.

use crate::models::message::QueueMessage;
use async_trait::async_trait;
use aws_config::SdkConfig;
use aws_sdk_sqs::{Client, error::DisplayErrorContext};
use futures::future::join_all;
use std::{
    collections::{HashMap, VecDeque},
    sync::Arc,
};
use thiserror::Error;
use tokio::sync::{Mutex, OnceCell};
use tracing::{debug, warn};
use uuid::Uuid;

/// Upper bound the backend accepts for one receive call.
pub const DEFAULT_MAX_MESSAGES: i32 = 10;

/// Long-poll wait per drain.
pub const DEFAULT_WAIT_SECONDS: i32 = 5;

#[derive(Debug, Error)]
pub enum QueueError {
    #[error("queue `{0}` could not be resolved")]
    QueueNotFound(String),
    #[error("receipt handle `{0}` is not valid")]
    InvalidReceipt(String),
    #[error("{operation} failed: {message}")]
    Backend {
        operation: &'static str,
        message: String,
    },
}

pub type QueueResult<T> = Result<T, QueueError>;

/// Raw queue operations.
#[async_trait]
pub trait MessageQueue: Send + Sync {
    async fn resolve_queue_url(&self, name: &str) -> QueueResult<String>;

    async fn receive(
        &self,
        queue_url: &str,
        max_messages: i32,
        wait_seconds: i32,
    ) -> QueueResult<Vec<QueueMessage>>;

    /// Deletes the message behind `receipt_handle` so it is never redelivered.
    async fn acknowledge(&self, queue_url: &str, receipt_handle: &str) -> QueueResult<()>;
}

/// Drains one named queue. The resolved URL is memoized for the lifetime of
/// the gateway; a failed lookup is retried on the next call.
pub struct QueueGateway {
    queue: Arc<dyn MessageQueue>,
    queue_name: String,
    queue_url: OnceCell<String>,
    max_messages: i32,
    wait_seconds: i32,
}

impl QueueGateway {
    pub fn new(queue: Arc<dyn MessageQueue>, queue_name: impl Into<String>) -> Self {
        Self {
            queue,
            queue_name: queue_name.into(),
            queue_url: OnceCell::new(),
            max_messages: DEFAULT_MAX_MESSAGES,
            wait_seconds: DEFAULT_WAIT_SECONDS,
        }
    }

    pub fn with_wait_seconds(mut self, wait_seconds: i32) -> Self {
        self.wait_seconds = wait_seconds;
        self
    }

    pub fn queue_name(&self) -> &str {
        &self.queue_name
    }

    pub async fn queue_url(&self) -> QueueResult<&str> {
        self.queue_url
            .get_or_try_init(|| self.queue.resolve_queue_url(&self.queue_name))
            .await
            .map(String::as_str)
    }

    /// Receives one batch and runs `process` over each message in backend
    /// order.
    ///
    /// Messages for which `process` returns `Some` are acknowledged; the rest
    /// stay on the queue. A failed acknowledgement is logged and the processed
    /// item is still returned, so a redelivery is possible.
    pub async fn drain<T, F>(&self, mut process: F) -> QueueResult<Vec<T>>
    where
        F: FnMut(&QueueMessage) -> Option<T>,
    {
        let queue_url = self.queue_url().await?;
        let messages = self
            .queue
            .receive(queue_url, self.max_messages, self.wait_seconds)
            .await?;
        debug!("received {} message(s) from {}", messages.len(), self.queue_name);

        let mut processed = Vec::with_capacity(messages.len());
        let mut receipts = Vec::with_capacity(messages.len());
        for message in &messages {
            match process(message) {
                Some(item) => {
                    processed.push(item);
                    receipts.push((message.id.as_str(), message.receipt_handle.as_str()));
                }
                None => warn!("leaving message {} on the queue", message.id),
            }
        }

        let acks = join_all(
            receipts
                .iter()
                .map(|(_, receipt)| self.queue.acknowledge(queue_url, receipt)),
        )
        .await;
        for ((id, _), result) in receipts.iter().zip(acks) {
            if let Err(err) = result {
                warn!("failed to acknowledge message {}: {}", id, err);
            }
        }

        Ok(processed)
    }
}

/// Queue backed by Amazon SQS.
#[derive(Clone)]
pub struct SqsQueue {
    client: Client,
}

impl SqsQueue {
    pub fn new(sdk_config: &SdkConfig) -> Self {
        Self {
            client: Client::new(sdk_config),
        }
    }
}

fn backend_error<E>(operation: &'static str, err: E) -> QueueError
where
    E: std::error::Error + 'static,
{
    QueueError::Backend {
        operation,
        message: DisplayErrorContext(err).to_string(),
    }
}

#[async_trait]
impl MessageQueue for SqsQueue {
    async fn resolve_queue_url(&self, name: &str) -> QueueResult<String> {
        let output = self
            .client
            .get_queue_url()
            .queue_name(name)
            .send()
            .await
            .map_err(|err| {
                if err
                    .as_service_error()
                    .is_some_and(|service_err| service_err.is_queue_does_not_exist())
                {
                    QueueError::QueueNotFound(name.to_string())
                } else {
                    backend_error("GetQueueUrl", err)
                }
            })?;

        output
            .queue_url()
            .map(str::to_string)
            .ok_or_else(|| QueueError::QueueNotFound(name.to_string()))
    }

    async fn receive(
        &self,
        queue_url: &str,
        max_messages: i32,
        wait_seconds: i32,
    ) -> QueueResult<Vec<QueueMessage>> {
        let output = self
            .client
            .receive_message()
            .queue_url(queue_url)
            .max_number_of_messages(max_messages)
            .wait_time_seconds(wait_seconds)
            .send()
            .await
            .map_err(|err| backend_error("ReceiveMessage", err))?;

        Ok(output
            .messages()
            .iter()
            .filter_map(|message| {
                // Without a receipt handle the message cannot be acknowledged.
                let receipt_handle = message.receipt_handle()?.to_string();
                Some(QueueMessage {
                    id: message.message_id().unwrap_or_default().to_string(),
                    body: message.body().unwrap_or_default().to_string(),
                    receipt_handle,
                })
            })
            .collect())
    }

    async fn acknowledge(&self, queue_url: &str, receipt_handle: &str) -> QueueResult<()> {
        self.client
            .delete_message()
            .queue_url(queue_url)
            .receipt_handle(receipt_handle)
            .send()
            .await
            .map_err(|err| backend_error("DeleteMessage", err))?;
        Ok(())
    }
}

#[derive(Default)]
struct MemoryQueueState {
    pending: VecDeque<(String, String)>,
    /// Receipt handle to `(id, body, receive order)`.
    in_flight: HashMap<String, (String, String, u64)>,
    received: u64,
}

/// In-memory single queue.
///
/// Received messages stay in flight, invisible to other receivers, until
/// they are acknowledged or [`MemoryQueue::expire_in_flight`] ends their
/// visibility timeout.
pub struct MemoryQueue {
    name: String,
    state: Mutex<MemoryQueueState>,
}

impl MemoryQueue {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            state: Mutex::new(MemoryQueueState::default()),
        }
    }

    pub fn url(&self) -> String {
        format!("memory://queues/{}", self.name)
    }

    /// Enqueue a message body and return its id.
    pub async fn publish(&self, body: impl Into<String>) -> String {
        let id = Uuid::new_v4().to_string();
        self.state
            .lock()
            .await
            .pending
            .push_back((id.clone(), body.into()));
        id
    }

    /// Messages waiting or in flight.
    pub async fn len(&self) -> usize {
        let state = self.state.lock().await;
        state.pending.len() + state.in_flight.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// End the visibility timeout of every in-flight message: unacknowledged
    /// messages go back to the front of the queue, oldest first. Returns how
    /// many were requeued.
    pub async fn expire_in_flight(&self) -> usize {
        let mut state = self.state.lock().await;
        let mut expired: Vec<_> = state.in_flight.drain().map(|(_, message)| message).collect();
        expired.sort_by_key(|(_, _, seq)| *seq);
        let count = expired.len();
        for (id, body, _) in expired.into_iter().rev() {
            state.pending.push_front((id, body));
        }
        count
    }

    fn check_url(&self, queue_url: &str) -> QueueResult<()> {
        if queue_url == self.url() {
            Ok(())
        } else {
            Err(QueueError::QueueNotFound(queue_url.to_string()))
        }
    }
}

#[async_trait]
impl MessageQueue for MemoryQueue {
    async fn resolve_queue_url(&self, name: &str) -> QueueResult<String> {
        if name == self.name {
            Ok(self.url())
        } else {
            Err(QueueError::QueueNotFound(name.to_string()))
        }
    }

    async fn receive(
        &self,
        queue_url: &str,
        max_messages: i32,
        _wait_seconds: i32,
    ) -> QueueResult<Vec<QueueMessage>> {
        self.check_url(queue_url)?;
        let mut state = self.state.lock().await;

        let limit = usize::try_from(max_messages).unwrap_or(0);
        let mut received = Vec::new();
        while received.len() < limit {
            let Some((id, body)) = state.pending.pop_front() else {
                break;
            };
            let receipt_handle = Uuid::new_v4().to_string();
            let seq = state.received;
            state.received += 1;
            state
                .in_flight
                .insert(receipt_handle.clone(), (id.clone(), body.clone(), seq));
            received.push(QueueMessage {
                id,
                body,
                receipt_handle,
            });
        }
        Ok(received)
    }

    async fn acknowledge(&self, queue_url: &str, receipt_handle: &str) -> QueueResult<()> {
        self.check_url(queue_url)?;
        self.state
            .lock()
            .await
            .in_flight
            .remove(receipt_handle)
            .map(|_| ())
            .ok_or_else(|| QueueError::InvalidReceipt(receipt_handle.to_string()))
    }
}

#[cfg(test)]
#[allow(non_snake_case)]
mod tests {
    use super::*;

    fn gateway(queue: &Arc<MemoryQueue>) -> QueueGateway {
        QueueGateway::new(queue.clone(), "events").with_wait_seconds(0)
    }

    #[tokio::test]
    async fn drain__should_not_redeliver_acknowledged_messages() {
        // Given
        let queue = Arc::new(MemoryQueue::new("events"));
        queue.publish("one").await;
        queue.publish("two").await;
        let gateway = gateway(&queue);

        // When
        let first = gateway
            .drain(|message| Some(message.body.clone()))
            .await
            .expect("drain");
        let second = gateway
            .drain(|message| Some(message.body.clone()))
            .await
            .expect("drain");

        // Then
        assert_eq!(first, vec!["one".to_string(), "two".to_string()]);
        assert!(second.is_empty());
        assert!(queue.is_empty().await);
    }

    #[tokio::test]
    async fn drain__should_leave_rejected_messages_for_redelivery() {
        // Given
        let queue = Arc::new(MemoryQueue::new("events"));
        queue.publish("keep").await;
        queue.publish("poison").await;
        let gateway = gateway(&queue);

        // When
        let first = gateway
            .drain(|message| (message.body != "poison").then(|| message.body.clone()))
            .await
            .expect("drain");
        let requeued = queue.expire_in_flight().await;
        let second = gateway
            .drain(|message| Some(message.body.clone()))
            .await
            .expect("drain");

        // Then
        assert_eq!(first, vec!["keep".to_string()]);
        assert_eq!(requeued, 1);
        assert_eq!(second, vec!["poison".to_string()]);
    }

    #[tokio::test]
    async fn receive__should_hide_in_flight_messages_from_overlapping_receivers() {
        // Given
        let queue = MemoryQueue::new("events");
        queue.publish("one").await;
        queue.publish("two").await;
        let url = queue.url();

        // When
        let first = queue.receive(&url, 1, 0).await.expect("receive");
        let second = queue.receive(&url, 10, 0).await.expect("receive");
        let third = queue.receive(&url, 10, 0).await.expect("receive");

        // Then
        assert_eq!(first.len(), 1);
        assert_eq!(first[0].body, "one");
        assert_eq!(second.len(), 1);
        assert_eq!(second[0].body, "two");
        assert!(third.is_empty());
        assert_eq!(queue.len().await, 2);
    }

    #[tokio::test]
    async fn expire_in_flight__should_requeue_in_receive_order() {
        let queue = MemoryQueue::new("events");
        for body in ["a", "b", "c"] {
            queue.publish(body).await;
        }
        let url = queue.url();
        queue.receive(&url, 10, 0).await.expect("receive");

        assert_eq!(queue.expire_in_flight().await, 3);
        let again = queue.receive(&url, 10, 0).await.expect("receive");

        let bodies: Vec<&str> = again.iter().map(|m| m.body.as_str()).collect();
        assert_eq!(bodies, vec!["a", "b", "c"]);
    }

    #[tokio::test]
    async fn drain__should_cap_batch_at_ten_messages() {
        let queue = Arc::new(MemoryQueue::new("events"));
        for n in 0..12 {
            queue.publish(format!("m{n}")).await;
        }
        let gateway = gateway(&queue);

        let first = gateway.drain(|m| Some(m.id.clone())).await.expect("drain");
        let second = gateway.drain(|m| Some(m.id.clone())).await.expect("drain");

        assert_eq!(first.len(), 10);
        assert_eq!(second.len(), 2);
    }

    #[tokio::test]
    async fn queue_url__should_fail_for_unknown_queue() {
        let queue = Arc::new(MemoryQueue::new("events"));
        let gateway = QueueGateway::new(queue, "other");

        let err = gateway.queue_url().await.unwrap_err();

        assert!(matches!(err, QueueError::QueueNotFound(name) if name == "other"));
    }

    #[tokio::test]
    async fn acknowledge__should_reject_unknown_receipt() {
        let queue = MemoryQueue::new("events");

        let err = queue.acknowledge(&queue.url(), "nope").await.unwrap_err();

        assert!(matches!(err, QueueError::InvalidReceipt(_)));
    }
}
