use crate::game::core::messages::ServerEvent;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tokio_util::sync::CancellationToken;
use tracing::trace;

pub const DEFAULT_MAILBOX_CAPACITY: usize = 256;

/// Why an event could not be enqueued
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryError {
    /// The consumer is not draining; the caller should treat it as stalled.
    Full,
    /// The mailbox was closed; the event is dropped.
    Closed,
}

/// Sending half of a session's bounded outbound queue.
///
/// Clones share one queue. Closing is explicit (not tied to dropping senders)
/// so the Hub can close a mailbox while the inbound duty still holds a handle
/// for direct replies.
#[derive(Clone, Debug)]
pub struct Mailbox {
    tx: mpsc::Sender<Arc<ServerEvent>>,
    closed: CancellationToken,
}

/// Receiving half, owned by the session's outbound duty.
pub struct MailboxReceiver {
    rx: mpsc::Receiver<Arc<ServerEvent>>,
    closed: CancellationToken,
}

impl Mailbox {
    /// A capacity of zero is raised to one.
    pub fn new(capacity: usize) -> (Mailbox, MailboxReceiver) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        let closed = CancellationToken::new();
        (
            Mailbox {
                tx,
                closed: closed.clone(),
            },
            MailboxReceiver { rx, closed },
        )
    }

    /// Enqueue without waiting.
    pub fn try_deliver(&self, event: Arc<ServerEvent>) -> Result<(), DeliveryError> {
        if self.closed.is_cancelled() {
            return Err(DeliveryError::Closed);
        }
        self.tx.try_send(event).map_err(|e| match e {
            TrySendError::Full(_) => DeliveryError::Full,
            TrySendError::Closed(_) => DeliveryError::Closed,
        })
    }

    /// Direct reply that bypasses the Hub. Dropped if the mailbox is full or closed.
    pub fn reply(&self, event: ServerEvent) {
        if let Err(err) = self.try_deliver(Arc::new(event)) {
            trace!(?err, "direct reply dropped");
        }
    }

    pub fn close(&self) {
        self.closed.cancel();
    }

    pub fn is_closed(&self) -> bool {
        self.closed.is_cancelled()
    }
}

impl MailboxReceiver {
    /// Next event in FIFO order, or `None` once the mailbox is closed.
    /// Events still queued at close time are dropped.
    pub async fn recv(&mut self) -> Option<Arc<ServerEvent>> {
        tokio::select! {
            biased;
            _ = self.closed.cancelled() => None,
            event = self.rx.recv() => event,
        }
    }

    /// An already-queued event, without waiting.
    pub fn try_recv(&mut self) -> Option<Arc<ServerEvent>> {
        if self.closed.is_cancelled() {
            return None;
        }
        self.rx.try_recv().ok()
    }

    pub fn is_closed(&self) -> bool {
        self.closed.is_cancelled()
    }
}
