use super::challenge::ChallengeCodec;
use super::registry::{HandshakeRegistry, HandshakeStore};
use super::score::ScoreConfig;
use super::stats::{Statistics, StatisticsAccumulator};
use super::transition::{self, Policy, ResponseInput};
use super::verifier::{ChallengeVerifier, ResponseVerifier};
use super::{parse_requirements, Handshake};
use crate::clock::{Clock, SystemClock};
use crate::config::TrustConfig;
use crate::did;
use crate::error::{Error, TrustResult};
use crate::events::{EventSink, HandshakeEvent, TracingSink};
use crate::identity::decode_public_key;
use crate::janitor::Janitor;
use crate::metrics;
use serde_json::Value;
use std::sync::Arc;

/// Drives handshakes through their phases. All shared state lives in the store.
pub struct HandshakeEngine<S: HandshakeStore = HandshakeRegistry> {
    store: Arc<S>,
    verifier: Arc<dyn ResponseVerifier>,
    clock: Arc<dyn Clock>,
    sink: Arc<dyn EventSink>,
    codec: ChallengeCodec,
    scoring: ScoreConfig,
    max_attempts: u32,
    janitor: Janitor,
}

impl HandshakeEngine<HandshakeRegistry> {
    pub fn new(config: &TrustConfig) -> Self {
        Self::with_store(config, Arc::new(HandshakeRegistry::new()))
    }
}

impl Default for HandshakeEngine<HandshakeRegistry> {
    fn default() -> Self {
        Self::new(&TrustConfig::default())
    }
}

impl<S: HandshakeStore> HandshakeEngine<S> {
    pub fn with_store(config: &TrustConfig, store: Arc<S>) -> Self {
        let timeout_ms = config.handshake.challenge_timeout_secs.saturating_mul(1000);

        Self {
            store,
            verifier: Arc::new(ChallengeVerifier::new()),
            clock: Arc::new(SystemClock),
            sink: Arc::new(TracingSink),
            codec: ChallengeCodec::new(config.handshake.pow_difficulty, timeout_ms),
            scoring: config.scoring.clone(),
            max_attempts: config.handshake.max_attempts,
            janitor: Janitor::new(timeout_ms),
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_verifier(mut self, verifier: Arc<dyn ResponseVerifier>) -> Self {
        self.verifier = verifier;
        self
    }

    pub fn with_sink(mut self, sink: Arc<dyn EventSink>) -> Self {
        self.sink = sink;
        self
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    pub fn initiate<T: AsRef<str>>(
        &self,
        initiator_did: &str,
        responder_did: &str,
        initiator_public_key: &str,
        trust_requirements: &[T],
    ) -> TrustResult<Handshake> {
        did::validate(initiator_did)?;
        did::validate(responder_did)?;
        if initiator_did == responder_did {
            return Err(Error::ValidationFailed(
                "initiator and responder must be different agents".to_string(),
            ));
        }
        if decode_public_key(initiator_public_key).is_none() {
            return Err(Error::ValidationFailed(
                "initiatorPublicKey is not a multibase ed25519 key".to_string(),
            ));
        }
        let requirements = parse_requirements(trust_requirements)?;

        let now = self.clock.now_ms();
        let mut handshake = Handshake::new(
            initiator_did.to_string(),
            responder_did.to_string(),
            initiator_public_key.to_string(),
            requirements,
            now,
        );
        let events = transition::start(&mut handshake, &self.codec, now)?;

        self.store.insert_if_no_active_pair(handshake.clone())?;
        self.publish(&events);

        Ok(handshake)
    }

    pub fn respond(
        &self,
        handshake_id: &str,
        challenge_id: &str,
        response: &Value,
        responder_did: &str,
        responder_public_key: &str,
    ) -> TrustResult<Handshake> {
        did::validate(responder_did)?;

        let input = ResponseInput {
            challenge_id,
            response,
            responder_did,
            responder_public_key,
        };
        let policy = Policy {
            max_attempts: self.max_attempts,
            codec: &self.codec,
            scoring: &self.scoring,
            verifier: self.verifier.as_ref(),
        };

        let (result, snapshot) = self.store.update_if_active(handshake_id, |handshake| {
            let now = self.clock.now_ms();
            let result = transition::apply_response(handshake, &input, &policy, now);
            (result, handshake.clone())
        })?;

        self.publish(&result.events);
        result.outcome.map(|_| snapshot)
    }

    pub fn get_status(&self, handshake_id: &str) -> Option<Handshake> {
        self.store.get(handshake_id)
    }

    pub fn get_statistics(&self) -> Statistics {
        let mut accumulator = StatisticsAccumulator::default();
        self.store.for_each(|handshake| accumulator.record(handshake));
        let stats = accumulator.finish();

        metrics::HANDSHAKES_ACTIVE.set(stats.active as i64);
        tracing::debug!("Statistics collected over {} handshakes", stats.total());
        stats
    }

    /// Removes terminal handshakes and those whose last challenge is older
    /// than the challenge timeout. Returns how many entries were removed.
    pub fn cleanup_expired(&self) -> usize {
        let removed = self.janitor.sweep(self.store.as_ref(), self.clock.now_ms());

        let events: Vec<HandshakeEvent> = removed
            .iter()
            .map(|handshake| HandshakeEvent::Removed {
                handshake_id: handshake.id.clone(),
                status: handshake.status,
            })
            .collect();
        self.publish(&events);

        if !removed.is_empty() {
            tracing::info!("Janitor removed {} handshakes", removed.len());
        }
        removed.len()
    }

    fn publish(&self, events: &[HandshakeEvent]) {
        for event in events {
            self.sink.emit(event);
        }
    }
}
