use super::{Handshake, HandshakeStatus};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Statistics {
    pub active: usize,
    pub completed: usize,
    pub failed: usize,
    pub average_duration_ms: f64,
}

impl Statistics {
    pub fn total(&self) -> usize {
        self.active + self.completed + self.failed
    }
}

#[derive(Debug, Default)]
pub(crate) struct StatisticsAccumulator {
    stats: Statistics,
    completed_duration_ms: u64,
}

impl StatisticsAccumulator {
    pub(crate) fn record(&mut self, handshake: &Handshake) {
        match handshake.status {
            HandshakeStatus::Active => self.stats.active += 1,
            HandshakeStatus::Completed => {
                self.stats.completed += 1;
                self.completed_duration_ms += handshake.duration_ms();
            }
            HandshakeStatus::Failed => self.stats.failed += 1,
        }
    }

    pub(crate) fn finish(mut self) -> Statistics {
        if self.stats.completed > 0 {
            self.stats.average_duration_ms =
                self.completed_duration_ms as f64 / self.stats.completed as f64;
        }
        self.stats
    }
}
