pub mod clock;
pub mod config;
pub mod did;
pub mod error;
pub mod events;
pub mod handshake;
pub mod identity;
pub mod janitor;
pub mod metrics;

pub use clock::{Clock, ManualClock, SystemClock};
pub use config::TrustConfig;
pub use error::{Error, TrustResult};
pub use events::{EventSink, HandshakeEvent, RecordingSink, TracingSink};
pub use handshake::{
    Challenge, ChallengePayload, ChallengeType, Handshake, HandshakeEngine, HandshakeRegistry,
    HandshakeStatus, HandshakeStore, Phase, Statistics, TrustRequirement,
};
pub use identity::AgentIdentity;
