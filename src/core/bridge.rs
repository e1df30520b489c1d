//! One-way, order-preserving relay from the batch worker to the presentation task.
//!
//! The worker never waits on rendering: `forward` only enqueues. The channel
//! is unbounded so nothing is dropped when the consumer falls behind.

use crate::core::error::BatchError;
use crate::core::events::{BatchEvent, ProgressEvent};
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::mpsc;

pub fn channel() -> (UiBridge, UiReceiver) {
    let (tx, rx) = mpsc::unbounded_channel();
    (UiBridge { tx }, UiReceiver { rx })
}

#[derive(Debug, Clone)]
pub struct UiBridge {
    tx: mpsc::UnboundedSender<BatchEvent>,
}

impl UiBridge {
    pub fn forward(&self, event: BatchEvent) -> Result<(), BatchError> {
        self.tx.send(event).map_err(|_| BatchError::BridgeClosed)
    }

    pub fn target_sink(&self, index: usize) -> TargetSink {
        TargetSink { index, bridge: self.clone(), closed: AtomicBool::new(false) }
    }
}

#[derive(Debug)]
pub struct UiReceiver {
    rx: mpsc::UnboundedReceiver<BatchEvent>,
}

impl UiReceiver {
    /// Next event in emission order; `None` once every bridge handle is gone.
    pub async fn recv(&mut self) -> Option<BatchEvent> {
        self.rx.recv().await
    }

    #[cfg(test)]
    pub fn try_recv(&mut self) -> Option<BatchEvent> {
        self.rx.try_recv().ok()
    }
}

/// Receives progress from a fetch engine while it works on one target.
pub trait ProgressSink: Send + Sync {
    fn emit(&self, event: ProgressEvent);
}

/// Tags progress with the target index and relays it through the bridge.
#[derive(Debug)]
pub struct TargetSink {
    index: usize,
    bridge: UiBridge,
    closed: AtomicBool,
}

impl TargetSink {
    /// True if any event could not be delivered.
    pub fn lost_events(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }
}

impl ProgressSink for TargetSink {
    fn emit(&self, event: ProgressEvent) {
        let forwarded = self.bridge.forward(BatchEvent::Progress { index: self.index, event });
        if forwarded.is_err() {
            self.closed.store(true, Ordering::Release);
        }
    }
}
