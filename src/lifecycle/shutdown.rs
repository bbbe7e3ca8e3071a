//! Shutdown fan-out for the breaker's background tasks.
//!
//! Subscribers, in the order `lifecycle::start` and `main` create them:
//! - remediation executor: stops pulling execution ids; checkpoints left
//!   `Pending` or `Running` are resumed by the next process
//! - circuit sweeper: stops evicting idle circuits
//! - config reload task: stops applying threshold changes
//! - HTTP server: stops accepting and drains in-flight requests
//!
//! Every subscriber must exist before `trigger`; a receiver created
//! afterwards never sees the signal.

use tokio::sync::broadcast;

#[derive(Clone)]
pub struct Shutdown {
    tx: broadcast::Sender<()>,
}

impl Shutdown {
    pub fn new() -> Self {
        // One slot is enough: the signal carries no data and is sent at most
        // a couple of times (signal handler, then main after the server exits).
        let (tx, _) = broadcast::channel(1);
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<()> {
        self.tx.subscribe()
    }

    /// Tell every subscribed task to wind down.
    pub fn trigger(&self) {
        let listening = self.tx.receiver_count();
        if self.tx.send(()).is_ok() {
            tracing::info!(listening, "Shutdown triggered");
        }
    }

    /// Tasks that have not yet dropped their receiver.
    pub fn receiver_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for Shutdown {
    fn default() -> Self {
        Self::new()
    }
}
