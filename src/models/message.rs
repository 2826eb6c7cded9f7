//! A message received from the notification queue.

/// One unit received from the queue backend.
///
/// `body` is opaque here; the normalizer is responsible for making sense of
/// whatever envelope the publisher wrapped around the event.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct QueueMessage {
    /// Provider-assigned message id.
    pub id: String,

    /// Raw message body.
    pub body: String,

    /// Token needed to acknowledge (delete) the message.
    pub receipt_handle: String,
}
