//! Live sessions over upgraded connections.
//!
//! A [`Session`] is created by an upgrade handler once the connection is
//! live. It owns the connection's poll task and, for document sessions,
//! the edit channel that consumes inbound payloads. The server tears it
//! down exactly once, when the connection closes.

pub mod edit;
pub mod poller;

use async_trait::async_trait;
use tokio::sync::mpsc;
use tracing::debug;

pub use edit::EditChannel;
pub use poller::{Baseline, PollHandle, Poller};

/// Bound on queued outgoing messages per connection.
pub const OUTBOUND_CAPACITY: usize = 256;

/// Cloneable send handle for one connection.
///
/// Pushing after the connection closed is a no-op that reports `false`.
#[derive(Debug, Clone)]
pub struct Connection {
    id: String,
    sender: mpsc::Sender<String>,
}

impl Connection {
    pub fn new(sender: mpsc::Sender<String>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            sender,
        }
    }

    /// Create a connection together with the receiving end of its queue.
    pub fn channel() -> (Self, mpsc::Receiver<String>) {
        let (tx, rx) = mpsc::channel(OUTBOUND_CAPACITY);
        (Self::new(tx), rx)
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// Queue a text message. Waits while the queue is full, so messages
    /// from one producer stay in order.
    pub async fn push(&self, text: String) -> bool {
        self.sender.send(text).await.is_ok()
    }

    pub fn is_closed(&self) -> bool {
        self.sender.is_closed()
    }
}

/// Consumer of payloads a client sends on its session.
#[async_trait]
pub trait InboundHandler: Send + Sync {
    async fn on_payload(&self, payload: String);
}

type TeardownFn = Box<dyn FnOnce() + Send + Sync>;

/// Per-connection session state.
pub struct Session {
    label: String,
    poll: Option<PollHandle>,
    inbound: Option<Box<dyn InboundHandler>>,
    on_teardown: Option<TeardownFn>,
    torn_down: bool,
}

impl Session {
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            poll: None,
            inbound: None,
            on_teardown: None,
            torn_down: false,
        }
    }

    pub fn with_poller(mut self, poll: PollHandle) -> Self {
        self.poll = Some(poll);
        self
    }

    pub fn with_inbound(mut self, inbound: impl InboundHandler + 'static) -> Self {
        self.inbound = Some(Box::new(inbound));
        self
    }

    /// Run `f` once, after the poll task has been cancelled.
    pub fn on_teardown(mut self, f: impl FnOnce() + Send + Sync + 'static) -> Self {
        self.on_teardown = Some(Box::new(f));
        self
    }

    pub fn is_torn_down(&self) -> bool {
        self.torn_down
    }

    /// Hand an inbound payload to the session's listener, if it has one.
    /// Payloads arriving after teardown are dropped.
    pub async fn deliver(&self, payload: String) {
        if self.torn_down {
            return;
        }
        match &self.inbound {
            Some(inbound) => inbound.on_payload(payload).await,
            None => debug!(session = %self.label, "Ignoring inbound payload"),
        }
    }

    /// Stop the poll task and release the session's resources.
    ///
    /// Returns `true` only for the call that actually tore the session down.
    pub fn teardown(&mut self) -> bool {
        if self.torn_down {
            return false;
        }
        self.torn_down = true;
        if let Some(mut poll) = self.poll.take() {
            poll.cancel();
        }
        self.inbound = None;
        if let Some(f) = self.on_teardown.take() {
            f();
        }
        debug!(session = %self.label, "Session torn down");
        true
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.teardown();
    }
}
