//! Mock Payout Collaborator
//!
//! Stands in for the external payment service. A withdrawal request is
//! acknowledged after a fixed delay with a fabricated transaction
//! signature; no balance is checked and nothing is persisted. A real
//! integration replaces this with a genuine success/failure result.

use std::time::Duration;

use sha2::{Digest, Sha256};
use tracing::info;

use crate::network::protocol::{ServerMessage, WithdrawReceipt};
use crate::session::store::OutboundSender;

/// Fire-and-forget withdrawal handler.
#[derive(Debug, Clone)]
pub struct PayoutService {
    ack_delay: Duration,
}

impl PayoutService {
    /// Service acknowledging after the given delay.
    pub fn new(ack_delay: Duration) -> Self {
        Self { ack_delay }
    }

    /// Queue a withdrawal acknowledgement for the requesting connection.
    /// Only the requester ever hears about it.
    pub fn request_withdraw(&self, sender: OutboundSender, wallet: String, amount: f64) {
        let delay = self.ack_delay;
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let signature = mock_signature(&wallet, amount);
            info!(%wallet, amount, signature = %&signature[..16], "withdrawal acknowledged");
            let _ = sender.send(ServerMessage::WithdrawSuccess(WithdrawReceipt {
                amount,
                signature,
            }));
        });
    }
}

/// Fabricate a transaction signature: sha256 over a domain separator,
/// the wallet, the amount, and the current time, hex-encoded.
fn mock_signature(wallet: &str, amount: f64) -> String {
    let mut hasher = Sha256::new();
    hasher.update(b"GAMMON_PAYOUT_V1");
    hasher.update(wallet.as_bytes());
    hasher.update(amount.to_le_bytes());
    hasher.update(chrono::Utc::now().timestamp_nanos_opt().unwrap_or(0).to_le_bytes());
    hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::mpsc::unbounded_channel;

    #[test]
    fn test_mock_signature_shape() {
        let sig = mock_signature("W1", 2.5);
        assert_eq!(sig.len(), 64, "sha256 hex digest");
        assert!(sig.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[tokio::test(start_paused = true)]
    async fn test_ack_arrives_after_delay_only() {
        let service = PayoutService::new(Duration::from_secs(2));
        let (tx, mut rx) = unbounded_channel();

        service.request_withdraw(tx, "W1".into(), 1.25);

        // Nothing before the delay elapses.
        tokio::time::sleep(Duration::from_millis(500)).await;
        assert!(rx.try_recv().is_err());

        tokio::time::sleep(Duration::from_secs(2)).await;
        match rx.try_recv() {
            Ok(ServerMessage::WithdrawSuccess(receipt)) => {
                assert_eq!(receipt.amount, 1.25);
                assert_eq!(receipt.signature.len(), 64);
            }
            other => panic!("expected withdraw_success, got {other:?}"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_dead_requester_is_silent() {
        let service = PayoutService::new(Duration::from_secs(1));
        let (tx, rx) = unbounded_channel();
        drop(rx);

        // Requester disconnected before the ack: dropped, not an error.
        service.request_withdraw(tx, "W1".into(), 3.0);
        tokio::time::sleep(Duration::from_secs(2)).await;
    }
}
