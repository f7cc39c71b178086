use lazy_static::lazy_static;
use prometheus::{
    register_int_counter, register_int_gauge, Encoder, IntCounter, IntGauge, TextEncoder,
};

lazy_static! {
    pub static ref HANDSHAKES_INITIATED: IntCounter = register_int_counter!(
        "trustshake_handshakes_initiated_total",
        "Total handshakes initiated"
    )
    .unwrap();
    pub static ref HANDSHAKES_COMPLETED: IntCounter = register_int_counter!(
        "trustshake_handshakes_completed_total",
        "Total handshakes that reached COMPLETED"
    )
    .unwrap();
    pub static ref HANDSHAKES_FAILED: IntCounter = register_int_counter!(
        "trustshake_handshakes_failed_total",
        "Total handshakes that ended FAILED"
    )
    .unwrap();
    pub static ref CHALLENGES_EXPIRED: IntCounter = register_int_counter!(
        "trustshake_challenges_expired_total",
        "Responses that arrived after the challenge expired"
    )
    .unwrap();
    pub static ref CHALLENGES_ISSUED: IntCounter =
        register_int_counter!("trustshake_challenges_issued_total", "Total challenges issued")
            .unwrap();
    pub static ref RESPONSES_REJECTED: IntCounter = register_int_counter!(
        "trustshake_responses_rejected_total",
        "Responses that failed verification"
    )
    .unwrap();
    pub static ref HANDSHAKES_SWEPT: IntCounter = register_int_counter!(
        "trustshake_handshakes_swept_total",
        "Registry entries removed by the janitor"
    )
    .unwrap();
    pub static ref HANDSHAKES_ACTIVE: IntGauge = register_int_gauge!(
        "trustshake_handshakes_active",
        "Active handshakes at the last statistics pass"
    )
    .unwrap();
}

pub fn gather() -> Vec<u8> {
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();
    let encoder = TextEncoder::new();
    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        tracing::warn!("Failed to encode metrics: {}", e);
    }
    buffer
}
