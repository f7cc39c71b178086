mod challenge;
mod engine;
pub mod prover;
mod registry;
mod score;
mod stats;
pub mod transition;
mod verifier;

pub use challenge::{
    puzzle_hash, puzzle_target, statement_for, trust_vector, Challenge, ChallengeCodec,
    ChallengePayload, ChallengeType, MpcChallenge, MpcInputs, PartyInput, PossessionPuzzle,
    ZkChallenge, ZkStatement,
};
pub use engine::HandshakeEngine;
pub use registry::{HandshakeRegistry, HandshakeStore};
pub use score::{calculate_trust_score, ScoreConfig};
pub use stats::Statistics;
pub use verifier::{
    verify_multi_party, verify_proof_of_possession, verify_zero_knowledge, ChallengeVerifier,
    ResponseVerifier,
};

use crate::error::{Error, TrustResult};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrustRequirement {
    Technical,
    Ethical,
    Operational,
    Transparency,
    Security,
    Compliance,
}

impl TrustRequirement {
    pub const ALL: [TrustRequirement; 6] = [
        TrustRequirement::Technical,
        TrustRequirement::Ethical,
        TrustRequirement::Operational,
        TrustRequirement::Transparency,
        TrustRequirement::Security,
        TrustRequirement::Compliance,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            TrustRequirement::Technical => "technical",
            TrustRequirement::Ethical => "ethical",
            TrustRequirement::Operational => "operational",
            TrustRequirement::Transparency => "transparency",
            TrustRequirement::Security => "security",
            TrustRequirement::Compliance => "compliance",
        }
    }
}

impl fmt::Display for TrustRequirement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TrustRequirement {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        TrustRequirement::ALL
            .into_iter()
            .find(|r| r.as_str() == s.trim())
            .ok_or_else(|| Error::ValidationFailed(format!("Unknown trust requirement: {}", s)))
    }
}

/// Parses declared capability tags into a non-empty set.
pub fn parse_requirements<S: AsRef<str>>(tags: &[S]) -> TrustResult<BTreeSet<TrustRequirement>> {
    let requirements = tags
        .iter()
        .map(|tag| tag.as_ref().parse())
        .collect::<TrustResult<BTreeSet<_>>>()?;

    if requirements.is_empty() {
        return Err(Error::ValidationFailed(
            "trustRequirements must not be empty".to_string(),
        ));
    }

    Ok(requirements)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Phase {
    ChallengeGeneration,
    ResponseVerification,
    TrustEstablishment,
    Completed,
}

impl Phase {
    pub fn next(self) -> Option<Phase> {
        match self {
            Phase::ChallengeGeneration => Some(Phase::ResponseVerification),
            Phase::ResponseVerification => Some(Phase::TrustEstablishment),
            Phase::TrustEstablishment => Some(Phase::Completed),
            Phase::Completed => None,
        }
    }

    pub fn challenge_type(self) -> Option<ChallengeType> {
        match self {
            Phase::ChallengeGeneration => Some(ChallengeType::ProofOfPossession),
            Phase::ResponseVerification => Some(ChallengeType::ZeroKnowledgeProof),
            Phase::TrustEstablishment => Some(ChallengeType::MultiPartyComputation),
            Phase::Completed => None,
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Phase::ChallengeGeneration => "CHALLENGE_GENERATION",
            Phase::ResponseVerification => "RESPONSE_VERIFICATION",
            Phase::TrustEstablishment => "TRUST_ESTABLISHMENT",
            Phase::Completed => "COMPLETED",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum HandshakeStatus {
    Active,
    Completed,
    Failed,
}

impl HandshakeStatus {
    pub fn is_terminal(self) -> bool {
        !matches!(self, HandshakeStatus::Active)
    }
}

impl fmt::Display for HandshakeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HandshakeStatus::Active => write!(f, "ACTIVE"),
            HandshakeStatus::Completed => write!(f, "COMPLETED"),
            HandshakeStatus::Failed => write!(f, "FAILED"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureReason {
    Expired,
    AttemptsExhausted,
}

impl fmt::Display for FailureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureReason::Expired => write!(f, "challenge expired"),
            FailureReason::AttemptsExhausted => write!(f, "attempts exhausted"),
        }
    }
}

/// Evidence kept for a sub-protocol once its challenge was answered correctly.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PhaseArtifact {
    pub challenge_id: String,
    pub verified_at: u64,
    pub evidence: Value,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HandshakeMetadata {
    pub attempts: u32,
    pub last_challenge_timestamp: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub responder_public_key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub proof_of_possession: Option<PhaseArtifact>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub zero_knowledge_proof: Option<PhaseArtifact>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub multi_party_computation: Option<PhaseArtifact>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trust_score: Option<u8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure_reason: Option<FailureReason>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Handshake {
    pub id: String,
    #[serde(rename = "initiatorDID")]
    pub initiator_did: String,
    #[serde(rename = "responderDID")]
    pub responder_did: String,
    pub phase: Phase,
    pub status: HandshakeStatus,
    pub initiator_public_key: String,
    pub trust_requirements: BTreeSet<TrustRequirement>,
    pub challenges: Vec<Challenge>,
    pub metadata: HandshakeMetadata,
    pub created_at: u64,
    pub updated_at: u64,
}

impl Handshake {
    pub fn new(
        initiator_did: String,
        responder_did: String,
        initiator_public_key: String,
        trust_requirements: BTreeSet<TrustRequirement>,
        created_at: u64,
    ) -> Self {
        let salt: [u8; 8] = rand::random();
        let id = handshake_id(&initiator_did, &responder_did, created_at, &salt);

        Self {
            id,
            initiator_did,
            responder_did,
            phase: Phase::ChallengeGeneration,
            status: HandshakeStatus::Active,
            initiator_public_key,
            trust_requirements,
            challenges: Vec::new(),
            metadata: HandshakeMetadata {
                last_challenge_timestamp: created_at,
                ..HandshakeMetadata::default()
            },
            created_at,
            updated_at: created_at,
        }
    }

    pub fn current_challenge(&self) -> Option<&Challenge> {
        self.challenges.last()
    }

    pub fn is_active(&self) -> bool {
        self.status == HandshakeStatus::Active
    }

    pub fn is_pair(&self, initiator_did: &str, responder_did: &str) -> bool {
        self.initiator_did == initiator_did && self.responder_did == responder_did
    }

    pub fn duration_ms(&self) -> u64 {
        self.updated_at.saturating_sub(self.created_at)
    }
}

pub fn handshake_id(initiator_did: &str, responder_did: &str, created_at: u64, salt: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(initiator_did.as_bytes());
    hasher.update(b"|");
    hasher.update(responder_did.as_bytes());
    hasher.update(b"|");
    hasher.update(created_at.to_be_bytes());
    hasher.update(salt);
    hex::encode(&hasher.finalize()[..16])
}
