use crate::handshake::{Handshake, HandshakeEngine, HandshakeStore};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

#[derive(Debug, Clone, Copy)]
pub struct Janitor {
    challenge_timeout_ms: u64,
}

impl Janitor {
    pub fn new(challenge_timeout_ms: u64) -> Self {
        Self {
            challenge_timeout_ms,
        }
    }

    pub fn is_sweepable(&self, handshake: &Handshake, now_ms: u64) -> bool {
        handshake.status.is_terminal()
            || now_ms.saturating_sub(handshake.metadata.last_challenge_timestamp)
                > self.challenge_timeout_ms
    }

    pub fn sweep<S: HandshakeStore>(&self, store: &S, now_ms: u64) -> Vec<Handshake> {
        store.remove_where(|handshake| self.is_sweepable(handshake, now_ms))
    }
}

/// Runs `cleanup_expired` every `interval` until `shutdown` is cancelled.
pub fn spawn<S>(
    engine: Arc<HandshakeEngine<S>>,
    interval: Duration,
    shutdown: CancellationToken,
) -> JoinHandle<()>
where
    S: HandshakeStore + 'static,
{
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => {
                    tracing::info!("Janitor shutting down...");
                    break;
                }

                _ = ticker.tick() => {
                    let removed = engine.cleanup_expired();
                    tracing::debug!("Janitor sweep finished: removed={}", removed);
                }
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handshake::{parse_requirements, HandshakeRegistry, HandshakeStatus};

    fn handshake(status: HandshakeStatus, last_challenge: u64) -> Handshake {
        let mut hs = Handshake::new(
            format!("did:ex:{}", rand::random::<u32>()),
            "did:ex:b".to_string(),
            "zKey".to_string(),
            parse_requirements(&["security"]).unwrap(),
            0,
        );
        hs.status = status;
        hs.metadata.last_challenge_timestamp = last_challenge;
        hs
    }

    #[test]
    fn test_sweepable_rules() {
        let janitor = Janitor::new(1_000);

        assert!(janitor.is_sweepable(&handshake(HandshakeStatus::Completed, 5_000), 5_000));
        assert!(janitor.is_sweepable(&handshake(HandshakeStatus::Failed, 5_000), 5_000));
        assert!(!janitor.is_sweepable(&handshake(HandshakeStatus::Active, 5_000), 6_000));
        assert!(janitor.is_sweepable(&handshake(HandshakeStatus::Active, 5_000), 6_001));
    }

    #[test]
    fn test_sweep_removes_only_sweepable() {
        let registry = HandshakeRegistry::new();
        registry
            .insert_if_no_active_pair(handshake(HandshakeStatus::Completed, 0))
            .unwrap();
        registry
            .insert_if_no_active_pair(handshake(HandshakeStatus::Active, 0))
            .unwrap();
        registry
            .insert_if_no_active_pair(handshake(HandshakeStatus::Active, 9_500))
            .unwrap();

        let removed = Janitor::new(1_000).sweep(&registry, 10_000);
        assert_eq!(removed.len(), 2);
        assert_eq!(registry.len(), 1);
    }
}
