//! Pure state transitions. Each function mutates only the handshake it is
//! given and reports what happened as a list of events.

use super::challenge::{Challenge, ChallengeCodec, ChallengePayload};
use super::score::{calculate_trust_score, ScoreConfig};
use super::verifier::ResponseVerifier;
use super::{FailureReason, Handshake, HandshakeStatus, Phase, PhaseArtifact};
use crate::error::{Error, TrustResult};
use crate::events::HandshakeEvent;
use serde_json::Value;

pub struct Policy<'a> {
    pub max_attempts: u32,
    pub codec: &'a ChallengeCodec,
    pub scoring: &'a ScoreConfig,
    pub verifier: &'a dyn ResponseVerifier,
}

#[derive(Debug, Clone, Copy)]
pub struct ResponseInput<'a> {
    pub challenge_id: &'a str,
    pub response: &'a Value,
    pub responder_did: &'a str,
    pub responder_public_key: &'a str,
}

#[derive(Debug)]
pub struct Transition {
    pub outcome: TrustResult<()>,
    pub events: Vec<HandshakeEvent>,
}

/// Issues the opening challenge of a freshly created handshake.
pub fn start(handshake: &mut Handshake, codec: &ChallengeCodec, now: u64) -> TrustResult<Vec<HandshakeEvent>> {
    let mut events = vec![HandshakeEvent::Initiated {
        handshake_id: handshake.id.clone(),
        initiator_did: handshake.initiator_did.clone(),
        responder_did: handshake.responder_did.clone(),
    }];
    issue_challenge(handshake, codec, now, false, &mut events)?;
    Ok(events)
}

pub fn apply_response(
    handshake: &mut Handshake,
    input: &ResponseInput<'_>,
    policy: &Policy<'_>,
    now: u64,
) -> Transition {
    let mut events = Vec::new();
    let outcome = step(handshake, input, policy, now, &mut events);
    Transition { outcome, events }
}

fn step(
    handshake: &mut Handshake,
    input: &ResponseInput<'_>,
    policy: &Policy<'_>,
    now: u64,
    events: &mut Vec<HandshakeEvent>,
) -> TrustResult<()> {
    if !handshake.is_active() {
        return Err(Error::InvalidState(format!(
            "handshake {} is {}",
            handshake.id, handshake.status
        )));
    }

    if input.responder_did != handshake.responder_did {
        return Err(Error::ValidationFailed(format!(
            "{} is not the responder of handshake {}",
            input.responder_did, handshake.id
        )));
    }

    let challenge = match handshake.current_challenge() {
        Some(current) if current.id == input.challenge_id => current.clone(),
        _ => {
            return Err(Error::NotFound(format!(
                "challenge {} is not current for handshake {}",
                input.challenge_id, handshake.id
            )))
        }
    };

    if challenge.is_expired_at(now) {
        fail(handshake, FailureReason::Expired, now, events);
        return Err(Error::Expired(format!(
            "challenge {} expired at {}",
            challenge.id, challenge.expires_at
        )));
    }

    let same_key = handshake
        .metadata
        .responder_public_key
        .as_deref()
        .map_or(true, |recorded| recorded == input.responder_public_key);
    let valid = same_key
        && policy
            .verifier
            .verify(&challenge, input.response, input.responder_public_key);

    touch(handshake, now);

    if !valid {
        handshake.metadata.attempts += 1;
        events.push(HandshakeEvent::ResponseRejected {
            handshake_id: handshake.id.clone(),
            challenge_id: challenge.id.clone(),
            attempts: handshake.metadata.attempts,
            max_attempts: policy.max_attempts,
        });

        if handshake.metadata.attempts >= policy.max_attempts {
            fail(handshake, FailureReason::AttemptsExhausted, now, events);
        } else {
            issue_challenge(handshake, policy.codec, now, true, events)?;
        }
        return Ok(());
    }

    record_artifact(handshake, &challenge, input, now);

    let from = handshake.phase;
    let to = from.next().ok_or_else(|| {
        Error::InvalidState(format!("handshake {} has no phase after {}", handshake.id, from))
    })?;
    handshake.phase = to;
    events.push(HandshakeEvent::PhaseAdvanced {
        handshake_id: handshake.id.clone(),
        from,
        to,
    });

    if to == Phase::Completed {
        let trust_score = calculate_trust_score(&handshake.metadata, policy.scoring);
        handshake.metadata.trust_score = Some(trust_score);
        handshake.status = HandshakeStatus::Completed;
        events.push(HandshakeEvent::Completed {
            handshake_id: handshake.id.clone(),
            trust_score,
            duration_ms: handshake.duration_ms(),
        });
    } else {
        issue_challenge(handshake, policy.codec, now, false, events)?;
    }

    Ok(())
}

fn issue_challenge(
    handshake: &mut Handshake,
    codec: &ChallengeCodec,
    now: u64,
    retry: bool,
    events: &mut Vec<HandshakeEvent>,
) -> TrustResult<()> {
    let challenge = codec.issue(handshake.phase, handshake, now)?;
    events.push(HandshakeEvent::ChallengeIssued {
        handshake_id: handshake.id.clone(),
        challenge_id: challenge.id.clone(),
        challenge_type: challenge.challenge_type(),
        phase: challenge.phase,
        retry,
    });
    handshake.challenges.push(challenge);
    handshake.metadata.last_challenge_timestamp = now;
    Ok(())
}

fn record_artifact(handshake: &mut Handshake, challenge: &Challenge, input: &ResponseInput<'_>, now: u64) {
    let artifact = Some(PhaseArtifact {
        challenge_id: challenge.id.clone(),
        verified_at: now,
        evidence: input.response.clone(),
    });

    let metadata = &mut handshake.metadata;
    match challenge.payload {
        ChallengePayload::ProofOfPossession(_) => {
            metadata.proof_of_possession = artifact;
            metadata.responder_public_key = Some(input.responder_public_key.to_string());
        }
        ChallengePayload::ZeroKnowledgeProof(_) => metadata.zero_knowledge_proof = artifact,
        ChallengePayload::MultiPartyComputation(_) => metadata.multi_party_computation = artifact,
    }
}

fn touch(handshake: &mut Handshake, now: u64) {
    handshake.updated_at = now;
    handshake.metadata.last_challenge_timestamp = now;
}

fn fail(handshake: &mut Handshake, reason: FailureReason, now: u64, events: &mut Vec<HandshakeEvent>) {
    touch(handshake, now);
    handshake.status = HandshakeStatus::Failed;
    handshake.metadata.failure_reason = Some(reason);
    events.push(HandshakeEvent::Failed {
        handshake_id: handshake.id.clone(),
        reason,
    });
}
