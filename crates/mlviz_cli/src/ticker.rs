//! Tokio timer backend for [`mlviz::schedule::Runner`].
//!
//! Each scheduled tick is a spawned task sleeping on a child
//! [`CancellationToken`]. A tick that survives its sleep sends its ticket
//! over an mpsc channel to the session loop, which hands it to
//! `Runner::fire`. Dropping the scheduler cancels every outstanding task.

use std::time::Duration;

use mlviz::driver::TickTicket;
use mlviz::schedule::TickScheduler;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

pub struct TokioScheduler {
    tx: mpsc::UnboundedSender<TickTicket>,
    root: CancellationToken,
}

impl TokioScheduler {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<TickTicket>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (
            Self {
                tx,
                root: CancellationToken::new(),
            },
            rx,
        )
    }
}

impl TickScheduler for TokioScheduler {
    type Handle = CancellationToken;

    fn schedule(&mut self, delay: Duration, ticket: TickTicket) -> CancellationToken {
        let token = self.root.child_token();
        let cancelled = token.clone();
        let tx = self.tx.clone();
        tokio::spawn(async move {
            tokio::select! {
                _ = cancelled.cancelled() => {}
                _ = tokio::time::sleep(delay) => {
                    // Receiver gone means the session ended; nothing to do.
                    let _ = tx.send(ticket);
                }
            }
        });
        token
    }

    fn cancel(&mut self, handle: CancellationToken) {
        handle.cancel();
    }
}

impl Drop for TokioScheduler {
    fn drop(&mut self) {
        self.root.cancel();
    }
}
