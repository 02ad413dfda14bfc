use async_trait::async_trait;
use ontap_ipc::{RelayMessage, RelayResult};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, warn};

/// Failure reason when the receiving side is gone before the message is sent
pub const RELAY_UNREACHABLE: &str = "relay_unreachable";
/// Failure reason when the receiving side dropped the message without replying
pub const NO_RESPONSE: &str = "no_response";
/// Failure reason when no reply arrived within the client's timeout
pub const RELAY_TIMEOUT: &str = "relay_timeout";
/// Failure reason for messages a side does not serve
pub const UNSUPPORTED_MESSAGE: &str = "unsupported_message";

const CHANNEL_BUFFER_SIZE: usize = 32;

/// One-time reply handle travelling with a message.
///
/// Replying consumes the handle, so a handler can answer at most once. Dropping
/// it unanswered resolves the caller with [`NO_RESPONSE`].
#[derive(Debug)]
pub struct Responder(oneshot::Sender<RelayResult>);

impl Responder {
    /// Returns false when the caller has already stopped waiting.
    pub fn reply(self, result: RelayResult) -> bool {
        self.0.send(result).is_ok()
    }
}

/// A message together with its reply handle
#[derive(Debug)]
pub struct Envelope {
    pub message: RelayMessage,
    responder: Responder,
}

impl Envelope {
    pub fn into_parts(self) -> (RelayMessage, Responder) {
        (self.message, self.responder)
    }
}

/// Sending half of a relay channel.
#[derive(Debug, Clone)]
pub struct RelayClient {
    tx: mpsc::Sender<Envelope>,
    timeout: Duration,
}

/// Receiving half of a relay channel
#[derive(Debug)]
pub struct RelayReceiver {
    rx: mpsc::Receiver<Envelope>,
}

impl RelayReceiver {
    pub async fn recv(&mut self) -> Option<Envelope> {
        self.rx.recv().await
    }
}

/// Creates a relay channel whose calls fail after `timeout` without a reply.
pub fn channel(timeout: Duration) -> (RelayClient, RelayReceiver) {
    let (tx, rx) = mpsc::channel(CHANNEL_BUFFER_SIZE);
    (RelayClient { tx, timeout }, RelayReceiver { rx })
}

impl RelayClient {
    /// Sends a message and waits for its single reply.
    ///
    /// Never fails: an unreachable receiver, a dropped reply handle and an
    /// elapsed timeout all come back as [`RelayResult::Failure`].
    pub async fn send(&self, message: RelayMessage) -> RelayResult {
        let kind = message.kind();
        let (reply_tx, reply_rx) = oneshot::channel();
        let envelope = Envelope {
            message,
            responder: Responder(reply_tx),
        };

        let exchange = async {
            if self.tx.send(envelope).await.is_err() {
                warn!(kind, "Relay receiver is gone");
                return RelayResult::failure(RELAY_UNREACHABLE);
            }
            match reply_rx.await {
                Ok(result) => result,
                Err(_) => {
                    warn!(kind, "Relay message dropped without a reply");
                    RelayResult::failure(NO_RESPONSE)
                }
            }
        };

        match tokio::time::timeout(self.timeout, exchange).await {
            Ok(result) => result,
            Err(_) => {
                warn!(kind, timeout = ?self.timeout, "Relay call timed out");
                RelayResult::failure(RELAY_TIMEOUT)
            }
        }
    }

    /// True once the receiving half has been dropped.
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }
}

/// Something that answers relay messages.
#[async_trait]
pub trait RelayHandler: Send + Sync + 'static {
    async fn handle(&self, message: RelayMessage) -> RelayResult;
}

/// Serves a relay channel until every client is dropped.
///
/// Each message is handled on its own task, so a slow fetch does not hold up
/// the next message.
pub async fn serve<H: RelayHandler>(mut receiver: RelayReceiver, handler: Arc<H>) {
    while let Some(envelope) = receiver.recv().await {
        let handler = Arc::clone(&handler);
        tokio::spawn(async move {
            let (message, responder) = envelope.into_parts();
            let kind = message.kind();
            debug!(kind, "Handling relay message");
            let result = handler.handle(message).await;
            if !responder.reply(result) {
                debug!(kind, "Caller stopped waiting before the reply");
            }
        });
    }
    debug!("Relay channel closed");
}
