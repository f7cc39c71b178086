use super::challenge::{puzzle_hash, Challenge, ChallengePayload, MpcChallenge, PossessionPuzzle, ZkChallenge};
use crate::identity::{decode_public_key, verify_signature_base64};
use serde::Deserialize;
use serde_json::{Map, Value};

/// Decides whether a response answers a challenge.
///
/// Implementations must treat malformed input as an invalid response rather
/// than an error.
pub trait ResponseVerifier: Send + Sync {
    fn verify(&self, challenge: &Challenge, response: &Value, responder_public_key: &str) -> bool;
}

/// Default verifier: signature plus puzzle for possession, structural checks
/// for the zero-knowledge and multi-party phases.
#[derive(Debug, Clone, Copy, Default)]
pub struct ChallengeVerifier;

impl ChallengeVerifier {
    pub fn new() -> Self {
        Self
    }
}

impl ResponseVerifier for ChallengeVerifier {
    fn verify(&self, challenge: &Challenge, response: &Value, responder_public_key: &str) -> bool {
        match &challenge.payload {
            ChallengePayload::ProofOfPossession(puzzle) => {
                verify_proof_of_possession(puzzle, response, responder_public_key)
            }
            ChallengePayload::ZeroKnowledgeProof(zk) => verify_zero_knowledge(zk, response),
            ChallengePayload::MultiPartyComputation(mpc) => verify_multi_party(mpc, response),
        }
    }
}

#[derive(Deserialize)]
struct PossessionResponse {
    computation: String,
    signature: String,
}

#[derive(Deserialize)]
struct ZkProof {
    commitment: String,
    challenge: String,
    response: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ZkResponse {
    proof: ZkProof,
    public_inputs: Vec<String>,
}

#[derive(Deserialize)]
struct MpcResult {
    score: f64,
}

#[derive(Deserialize)]
struct MpcResponse {
    result: MpcResult,
    proof: Map<String, Value>,
}

pub fn verify_proof_of_possession(
    puzzle: &PossessionPuzzle,
    response: &Value,
    responder_public_key: &str,
) -> bool {
    let Ok(response) = PossessionResponse::deserialize(response) else {
        return false;
    };

    if puzzle.target.is_empty() || !puzzle_hash(&response.computation).starts_with(&puzzle.target) {
        return false;
    }

    let Some(public_key) = decode_public_key(responder_public_key) else {
        return false;
    };

    verify_signature_base64(&public_key, puzzle.nonce.as_bytes(), &response.signature)
}

pub fn verify_zero_knowledge(zk: &ZkChallenge, response: &Value) -> bool {
    let Ok(response) = ZkResponse::deserialize(response) else {
        return false;
    };

    let proof = &response.proof;
    if proof.commitment.is_empty() || proof.challenge.is_empty() || proof.response.is_empty() {
        return false;
    }

    response
        .public_inputs
        .iter()
        .any(|input| *input == zk.statement.digest)
}

pub fn verify_multi_party(_mpc: &MpcChallenge, response: &Value) -> bool {
    match MpcResponse::deserialize(response) {
        Ok(response) => response.result.score.is_finite(),
        Err(_) => false,
    }
}
