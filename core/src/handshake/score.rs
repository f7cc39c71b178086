use super::HandshakeMetadata;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScoreConfig {
    #[serde(default = "default_base")]
    pub base: u32,
    #[serde(default = "default_possession_bonus")]
    pub proof_of_possession_bonus: u32,
    #[serde(default = "default_zero_knowledge_bonus")]
    pub zero_knowledge_bonus: u32,
    #[serde(default = "default_multi_party_bonus")]
    pub multi_party_bonus: u32,
    #[serde(default = "default_penalty_per_attempt")]
    pub penalty_per_attempt: u32,
    #[serde(default = "default_max_penalty")]
    pub max_penalty: u32,
}

fn default_base() -> u32 {
    60
}
fn default_possession_bonus() -> u32 {
    15
}
fn default_zero_knowledge_bonus() -> u32 {
    15
}
fn default_multi_party_bonus() -> u32 {
    10
}
fn default_penalty_per_attempt() -> u32 {
    5
}
fn default_max_penalty() -> u32 {
    20
}

impl Default for ScoreConfig {
    fn default() -> Self {
        Self {
            base: default_base(),
            proof_of_possession_bonus: default_possession_bonus(),
            zero_knowledge_bonus: default_zero_knowledge_bonus(),
            multi_party_bonus: default_multi_party_bonus(),
            penalty_per_attempt: default_penalty_per_attempt(),
            max_penalty: default_max_penalty(),
        }
    }
}

impl ScoreConfig {
    pub fn penalty(&self, attempts: u32) -> u32 {
        attempts
            .saturating_mul(self.penalty_per_attempt)
            .min(self.max_penalty)
    }
}

pub fn calculate_trust_score(metadata: &HandshakeMetadata, config: &ScoreConfig) -> u8 {
    let mut raw = i64::from(config.base);

    if metadata.proof_of_possession.is_some() {
        raw += i64::from(config.proof_of_possession_bonus);
    }
    if metadata.zero_knowledge_proof.is_some() {
        raw += i64::from(config.zero_knowledge_bonus);
    }
    if metadata.multi_party_computation.is_some() {
        raw += i64::from(config.multi_party_bonus);
    }

    raw -= i64::from(config.penalty(metadata.attempts));

    raw.clamp(0, 100) as u8
}
