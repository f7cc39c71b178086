//! Responder-side helpers: produce a response that the default verifier accepts.

use super::challenge::{puzzle_hash, Challenge, ChallengePayload, MpcInputs, ZkChallenge};
use crate::identity::AgentIdentity;
use serde_json::{json, Value};
use sha2::{Digest, Sha256};

/// Builds a valid response for `challenge`. Returns `None` only when the
/// puzzle target cannot be met (non-hex or longer than a digest).
pub fn build_response(challenge: &Challenge, identity: &AgentIdentity) -> Option<Value> {
    match &challenge.payload {
        ChallengePayload::ProofOfPossession(puzzle) => {
            let computation = solve_puzzle(&puzzle.target)?;
            Some(json!({
                "computation": computation,
                "signature": identity.sign_base64(puzzle.nonce.as_bytes()),
            }))
        }
        ChallengePayload::ZeroKnowledgeProof(zk) => Some(zero_knowledge_response(zk)),
        ChallengePayload::MultiPartyComputation(mpc) => Some(multi_party_response(&mpc.inputs)),
    }
}

const MAX_PUZZLE_CANDIDATES: u64 = 1 << 28;

pub fn solve_puzzle(target: &str) -> Option<String> {
    if target.len() > 64 || !target.chars().all(|c| c.is_ascii_hexdigit()) {
        return None;
    }
    let target = target.to_ascii_lowercase();

    (0..MAX_PUZZLE_CANDIDATES)
        .map(|n| n.to_string())
        .find(|candidate| puzzle_hash(candidate).starts_with(&target))
}

fn zero_knowledge_response(zk: &ZkChallenge) -> Value {
    let digest = &zk.statement.digest;
    let commitment = sha256_hex(&[zk.witness.as_bytes(), digest.as_bytes()]);
    let challenge = sha256_hex(&[commitment.as_bytes(), digest.as_bytes()]);
    let response = sha256_hex(&[zk.witness.as_bytes(), challenge.as_bytes()]);

    json!({
        "proof": {
            "commitment": commitment,
            "challenge": challenge,
            "response": response,
        },
        "publicInputs": [digest],
    })
}

fn multi_party_response(inputs: &MpcInputs) -> Value {
    let score = joint_score(&inputs.initiator.trust_vector, &inputs.responder.trust_vector);
    let transcript = serde_json::to_vec(inputs).unwrap_or_default();

    json!({
        "result": {
            "score": score,
            "dimensions": inputs.initiator.trust_vector.len(),
        },
        "proof": {
            "protocol": "weighted-overlap",
            "transcript": sha256_hex(&[transcript.as_slice()]),
        },
    })
}

/// Weighted overlap of two trust vectors, scaled to 0..=100.
pub fn joint_score(a: &[f64], b: &[f64]) -> f64 {
    let (shared, total) = a
        .iter()
        .zip(b)
        .fold((0.0, 0.0), |(shared, total), (x, y)| (shared + x.min(*y), total + x.max(*y)));

    if total == 0.0 {
        0.0
    } else {
        shared / total * 100.0
    }
}

fn sha256_hex(parts: &[&[u8]]) -> String {
    let mut hasher = Sha256::new();
    for part in parts {
        hasher.update(part);
    }
    hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_solve_puzzle() {
        let solution = solve_puzzle("00").unwrap();
        assert!(puzzle_hash(&solution).starts_with("00"));
    }

    #[test]
    fn test_solve_puzzle_rejects_impossible_targets() {
        assert!(solve_puzzle("xyz").is_none());
        assert!(solve_puzzle(&"0".repeat(65)).is_none());
    }

    #[test]
    fn test_joint_score_bounds() {
        assert!((joint_score(&[0.5, 0.5], &[0.5, 0.5]) - 100.0).abs() < 1e-9);
        assert!((joint_score(&[1.0, 0.0], &[0.0, 1.0])).abs() < 1e-9);
        assert_eq!(joint_score(&[0.0], &[0.0]), 0.0);

        let mixed = joint_score(&[0.2, 0.8], &[0.4, 0.4]);
        assert!(mixed > 0.0 && mixed < 100.0);
    }
}
