use super::{Handshake, Phase, TrustRequirement};
use crate::config::{DEFAULT_CHALLENGE_TIMEOUT_SECS, DEFAULT_POW_DIFFICULTY};
use crate::error::{Error, TrustResult};
use rand::RngCore;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ChallengeType {
    ProofOfPossession,
    ZeroKnowledgeProof,
    MultiPartyComputation,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PossessionPuzzle {
    pub nonce: String,
    pub target: String,
    pub difficulty: u8,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ZkStatement {
    #[serde(rename = "initiatorDID")]
    pub initiator_did: String,
    #[serde(rename = "responderDID")]
    pub responder_did: String,
    pub trust_requirements: Vec<TrustRequirement>,
    pub handshake_created_at: u64,
    pub digest: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ZkChallenge {
    pub statement: ZkStatement,
    pub witness: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PartyInput {
    pub did: String,
    pub public_key: Option<String>,
    pub trust_vector: Vec<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MpcInputs {
    pub initiator: PartyInput,
    pub responder: PartyInput,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MpcChallenge {
    pub inputs: MpcInputs,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ChallengePayload {
    ProofOfPossession(PossessionPuzzle),
    ZeroKnowledgeProof(ZkChallenge),
    MultiPartyComputation(MpcChallenge),
}

impl ChallengePayload {
    pub fn challenge_type(&self) -> ChallengeType {
        match self {
            ChallengePayload::ProofOfPossession(_) => ChallengeType::ProofOfPossession,
            ChallengePayload::ZeroKnowledgeProof(_) => ChallengeType::ZeroKnowledgeProof,
            ChallengePayload::MultiPartyComputation(_) => ChallengeType::MultiPartyComputation,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Challenge {
    pub id: String,
    pub phase: Phase,
    pub payload: ChallengePayload,
    pub timestamp: u64,
    pub expires_at: u64,
}

impl Challenge {
    pub fn challenge_type(&self) -> ChallengeType {
        self.payload.challenge_type()
    }

    pub fn is_expired_at(&self, now_ms: u64) -> bool {
        now_ms > self.expires_at
    }
}

/// Builds phase-specific challenges. Holds no state besides its parameters.
#[derive(Debug, Clone)]
pub struct ChallengeCodec {
    difficulty: u8,
    timeout_ms: u64,
}

impl Default for ChallengeCodec {
    fn default() -> Self {
        Self::new(DEFAULT_POW_DIFFICULTY, DEFAULT_CHALLENGE_TIMEOUT_SECS * 1000)
    }
}

impl ChallengeCodec {
    pub fn new(difficulty: u8, timeout_ms: u64) -> Self {
        Self {
            difficulty,
            timeout_ms,
        }
    }

    pub fn issue(&self, phase: Phase, handshake: &Handshake, now_ms: u64) -> TrustResult<Challenge> {
        let payload = match phase.challenge_type() {
            Some(ChallengeType::ProofOfPossession) => {
                let nonce = random_hex(16);
                let target = puzzle_target(&nonce, &handshake.initiator_did, now_ms, self.difficulty);
                ChallengePayload::ProofOfPossession(PossessionPuzzle {
                    nonce,
                    target,
                    difficulty: self.difficulty,
                })
            }
            Some(ChallengeType::ZeroKnowledgeProof) => {
                ChallengePayload::ZeroKnowledgeProof(ZkChallenge {
                    statement: statement_for(handshake),
                    witness: random_hex(32),
                })
            }
            Some(ChallengeType::MultiPartyComputation) => {
                ChallengePayload::MultiPartyComputation(MpcChallenge {
                    inputs: MpcInputs {
                        initiator: PartyInput {
                            did: handshake.initiator_did.clone(),
                            public_key: Some(handshake.initiator_public_key.clone()),
                            trust_vector: trust_vector(&handshake.initiator_did),
                        },
                        responder: PartyInput {
                            did: handshake.responder_did.clone(),
                            public_key: handshake.metadata.responder_public_key.clone(),
                            trust_vector: trust_vector(&handshake.responder_did),
                        },
                    },
                })
            }
            None => {
                return Err(Error::InvalidState(format!(
                    "no challenge exists for phase {}",
                    phase
                )))
            }
        };

        Ok(Challenge {
            id: uuid::Uuid::new_v4().to_string(),
            phase,
            payload,
            timestamp: now_ms,
            expires_at: now_ms.saturating_add(self.timeout_ms),
        })
    }
}

pub fn puzzle_target(nonce: &str, initiator_did: &str, issued_at: u64, difficulty: u8) -> String {
    let mut hasher = Sha256::new();
    hasher.update(nonce.as_bytes());
    hasher.update(initiator_did.as_bytes());
    hasher.update(issued_at.to_string().as_bytes());
    let digest = hex::encode(hasher.finalize());
    digest[..(difficulty as usize).min(digest.len())].to_string()
}

pub fn puzzle_hash(computation: &str) -> String {
    hex::encode(Sha256::digest(computation.as_bytes()))
}

pub fn statement_for(handshake: &Handshake) -> ZkStatement {
    let trust_requirements: Vec<TrustRequirement> =
        handshake.trust_requirements.iter().copied().collect();

    let mut hasher = Sha256::new();
    hasher.update(handshake.initiator_did.as_bytes());
    hasher.update(b"|");
    hasher.update(handshake.responder_did.as_bytes());
    for requirement in &trust_requirements {
        hasher.update(b"|");
        hasher.update(requirement.as_str().as_bytes());
    }
    hasher.update(b"|");
    hasher.update(handshake.created_at.to_string().as_bytes());

    ZkStatement {
        initiator_did: handshake.initiator_did.clone(),
        responder_did: handshake.responder_did.clone(),
        trust_requirements,
        handshake_created_at: handshake.created_at,
        digest: hex::encode(hasher.finalize()),
    }
}

/// One value in `[0, 1]` per capability dimension, derived from the DID alone.
pub fn trust_vector(did: &str) -> Vec<f64> {
    let digest = Sha256::digest(did.as_bytes());
    TrustRequirement::ALL
        .iter()
        .enumerate()
        .map(|(i, _)| {
            let word = u16::from_be_bytes([digest[i * 2], digest[i * 2 + 1]]);
            word as f64 / u16::MAX as f64
        })
        .collect()
}

fn random_hex(len: usize) -> String {
    let mut bytes = vec![0u8; len];
    rand::thread_rng().fill_bytes(&mut bytes);
    hex::encode(bytes)
}
