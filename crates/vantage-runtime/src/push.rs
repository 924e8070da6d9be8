//! Push update channel seam.
//!
//! One subscription per intake id, carrying a single boolean readiness
//! signal and no payload. The controller opens it only while the state
//! machine is in a waiting status and closes it the moment that status
//! is exited, whether by success or by shutdown.

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::mpsc;

/// Errors opening a subscription.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum PushError {
    /// The channel could not be opened.
    #[error("push subscription failed: {0}")]
    Subscribe(String),
}

/// A live subscription. Dropping it closes the channel.
pub struct PushSubscription {
    receiver: mpsc::Receiver<()>,
}

impl PushSubscription {
    /// Wraps a receiver producing readiness signals.
    #[must_use]
    pub fn new(receiver: mpsc::Receiver<()>) -> Self {
        Self { receiver }
    }

    /// Waits for the next readiness signal. `None` means the publisher
    /// side closed.
    pub async fn signaled(&mut self) -> Option<()> {
        self.receiver.recv().await
    }
}

/// Source of push subscriptions.
#[async_trait]
pub trait PushChannel: Send + Sync {
    /// Opens the subscription for an intake.
    async fn subscribe(&self, intake_id: &str) -> Result<PushSubscription, PushError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn subscription_yields_signals_until_closed() {
        let (tx, rx) = mpsc::channel(4);
        let mut sub = PushSubscription::new(rx);
        tx.send(()).await.unwrap();
        assert_eq!(sub.signaled().await, Some(()));
        drop(tx);
        assert_eq!(sub.signaled().await, None);
    }
}
