use crate::handshake::{ChallengeType, FailureReason, HandshakeStatus, Phase};
use crate::metrics;
use std::sync::Mutex;

/// Something that happened to a handshake during a state transition.
#[derive(Debug, Clone, PartialEq)]
pub enum HandshakeEvent {
    Initiated {
        handshake_id: String,
        initiator_did: String,
        responder_did: String,
    },
    ChallengeIssued {
        handshake_id: String,
        challenge_id: String,
        challenge_type: ChallengeType,
        phase: Phase,
        retry: bool,
    },
    ResponseRejected {
        handshake_id: String,
        challenge_id: String,
        attempts: u32,
        max_attempts: u32,
    },
    PhaseAdvanced {
        handshake_id: String,
        from: Phase,
        to: Phase,
    },
    Completed {
        handshake_id: String,
        trust_score: u8,
        duration_ms: u64,
    },
    Failed {
        handshake_id: String,
        reason: FailureReason,
    },
    Removed {
        handshake_id: String,
        status: HandshakeStatus,
    },
}

impl HandshakeEvent {
    pub fn handshake_id(&self) -> &str {
        match self {
            HandshakeEvent::Initiated { handshake_id, .. }
            | HandshakeEvent::ChallengeIssued { handshake_id, .. }
            | HandshakeEvent::ResponseRejected { handshake_id, .. }
            | HandshakeEvent::PhaseAdvanced { handshake_id, .. }
            | HandshakeEvent::Completed { handshake_id, .. }
            | HandshakeEvent::Failed { handshake_id, .. }
            | HandshakeEvent::Removed { handshake_id, .. } => handshake_id,
        }
    }
}

pub trait EventSink: Send + Sync {
    fn emit(&self, event: &HandshakeEvent);
}

/// Logs every event through `tracing` and keeps the prometheus counters current.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

impl EventSink for TracingSink {
    fn emit(&self, event: &HandshakeEvent) {
        match event {
            HandshakeEvent::Initiated {
                handshake_id,
                initiator_did,
                responder_did,
            } => {
                metrics::HANDSHAKES_INITIATED.inc();
                tracing::info!(
                    handshake_id = %handshake_id,
                    "Handshake initiated: {} -> {}",
                    initiator_did,
                    responder_did
                );
            }
            HandshakeEvent::ChallengeIssued {
                handshake_id,
                challenge_id,
                challenge_type,
                phase,
                retry,
            } => {
                metrics::CHALLENGES_ISSUED.inc();
                tracing::debug!(
                    handshake_id = %handshake_id,
                    challenge_id = %challenge_id,
                    retry = retry,
                    "Issued {:?} challenge for phase {}",
                    challenge_type,
                    phase
                );
            }
            HandshakeEvent::ResponseRejected {
                handshake_id,
                challenge_id,
                attempts,
                max_attempts,
            } => {
                metrics::RESPONSES_REJECTED.inc();
                tracing::warn!(
                    handshake_id = %handshake_id,
                    challenge_id = %challenge_id,
                    "Response rejected (attempt {}/{})",
                    attempts,
                    max_attempts
                );
            }
            HandshakeEvent::PhaseAdvanced {
                handshake_id,
                from,
                to,
            } => {
                tracing::info!(handshake_id = %handshake_id, "Phase advanced: {} -> {}", from, to);
            }
            HandshakeEvent::Completed {
                handshake_id,
                trust_score,
                duration_ms,
            } => {
                metrics::HANDSHAKES_COMPLETED.inc();
                tracing::info!(
                    handshake_id = %handshake_id,
                    "Handshake completed: trust_score={}, duration={}ms",
                    trust_score,
                    duration_ms
                );
            }
            HandshakeEvent::Failed {
                handshake_id,
                reason,
            } => {
                metrics::HANDSHAKES_FAILED.inc();
                if *reason == FailureReason::Expired {
                    metrics::CHALLENGES_EXPIRED.inc();
                }
                tracing::warn!(handshake_id = %handshake_id, "Handshake failed: {}", reason);
            }
            HandshakeEvent::Removed {
                handshake_id,
                status,
            } => {
                metrics::HANDSHAKES_SWEPT.inc();
                tracing::debug!(handshake_id = %handshake_id, "Removed {} handshake", status);
            }
        }
    }
}

/// Keeps emitted events in memory.
#[derive(Debug, Default)]
pub struct RecordingSink {
    events: Mutex<Vec<HandshakeEvent>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<HandshakeEvent> {
        self.events
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .clone()
    }

    pub fn take(&self) -> Vec<HandshakeEvent> {
        std::mem::take(
            &mut *self
                .events
                .lock()
                .unwrap_or_else(std::sync::PoisonError::into_inner),
        )
    }
}

impl EventSink for RecordingSink {
    fn emit(&self, event: &HandshakeEvent) {
        self.events
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .push(event.clone());
    }
}
