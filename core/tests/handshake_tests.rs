use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use trustshake_core::handshake::prover;
use trustshake_core::{
    janitor, AgentIdentity, ChallengeType, Error, Handshake, HandshakeEngine, HandshakeEvent,
    HandshakeStatus, HandshakeStore, ManualClock, Phase, RecordingSink, TrustConfig,
};

const START_MS: u64 = 1_700_000_000_000;

struct Harness {
    engine: HandshakeEngine,
    clock: Arc<ManualClock>,
    sink: Arc<RecordingSink>,
    initiator: AgentIdentity,
    responder: AgentIdentity,
}

impl Harness {
    fn new() -> Self {
        let mut config = TrustConfig::default();
        config.handshake.pow_difficulty = 2;
        Self::with_config(config)
    }

    fn with_config(config: TrustConfig) -> Self {
        let clock = Arc::new(ManualClock::new(START_MS));
        let sink = Arc::new(RecordingSink::new());
        let engine = HandshakeEngine::new(&config)
            .with_clock(clock.clone())
            .with_sink(sink.clone());

        Self {
            engine,
            clock,
            sink,
            initiator: AgentIdentity::generate(),
            responder: AgentIdentity::generate(),
        }
    }

    fn initiate(&self) -> Handshake {
        self.engine
            .initiate(
                &self.initiator.did(),
                &self.responder.did(),
                &self.initiator.public_key_multibase(),
                &["security"],
            )
            .expect("initiate should succeed")
    }

    fn respond_valid(&self, handshake: &Handshake) -> Result<Handshake, Error> {
        let challenge = handshake.current_challenge().expect("current challenge");
        let response = prover::build_response(challenge, &self.responder).expect("solvable");
        self.engine.respond(
            &handshake.id,
            &challenge.id,
            &response,
            &self.responder.did(),
            &self.responder.public_key_multibase(),
        )
    }

    fn respond_invalid(&self, handshake: &Handshake) -> Result<Handshake, Error> {
        let challenge = handshake.current_challenge().expect("current challenge");
        self.engine.respond(
            &handshake.id,
            &challenge.id,
            &json!({"computation": "nope", "signature": "AAAA"}),
            &self.responder.did(),
            &self.responder.public_key_multibase(),
        )
    }
}

#[test]
fn test_initiate_creates_pop_challenge() {
    let harness = Harness::new();
    let handshake = harness.initiate();

    assert_eq!(handshake.phase, Phase::ChallengeGeneration);
    assert_eq!(handshake.status, HandshakeStatus::Active);
    assert_eq!(handshake.challenges.len(), 1);
    assert_eq!(
        handshake.challenges[0].challenge_type(),
        ChallengeType::ProofOfPossession
    );
    assert_eq!(handshake.challenges[0].expires_at, START_MS + 300_000);
    assert_eq!(handshake.created_at, START_MS);

    let stored = harness.engine.get_status(&handshake.id).unwrap();
    assert_eq!(stored.id, handshake.id);
}

#[test]
fn test_full_handshake_scores_100() {
    let harness = Harness::new();
    let handshake = harness.initiate();

    let after_pop = harness.respond_valid(&handshake).unwrap();
    assert_eq!(after_pop.phase, Phase::ResponseVerification);
    assert_eq!(after_pop.challenges.len(), 2);
    assert_eq!(
        after_pop.current_challenge().unwrap().challenge_type(),
        ChallengeType::ZeroKnowledgeProof
    );
    assert!(after_pop.metadata.proof_of_possession.is_some());

    harness.clock.advance_secs(1);
    let after_zk = harness.respond_valid(&after_pop).unwrap();
    assert_eq!(after_zk.phase, Phase::TrustEstablishment);
    assert_eq!(
        after_zk.current_challenge().unwrap().challenge_type(),
        ChallengeType::MultiPartyComputation
    );

    harness.clock.advance_secs(1);
    let done = harness.respond_valid(&after_zk).unwrap();
    assert_eq!(done.status, HandshakeStatus::Completed);
    assert_eq!(done.phase, Phase::Completed);
    assert_eq!(done.metadata.trust_score, Some(100));
    assert_eq!(done.challenges.len(), 3);
    assert!(done.metadata.multi_party_computation.is_some());

    let stats = harness.engine.get_statistics();
    assert_eq!(stats.completed, 1);
    assert_eq!(stats.active, 0);
    assert!((stats.average_duration_ms - 2_000.0).abs() < f64::EPSILON);
}

#[test]
fn test_default_difficulty_handshake_completes() {
    let harness = Harness::with_config(TrustConfig::default());
    let mut handshake = harness.initiate();

    while handshake.status == HandshakeStatus::Active {
        handshake = harness.respond_valid(&handshake).unwrap();
    }

    assert_eq!(handshake.metadata.trust_score, Some(100));
}

#[test]
fn test_three_invalid_responses_fail() {
    let harness = Harness::new();
    let mut handshake = harness.initiate();

    for expected_attempts in 1..=2 {
        handshake = harness.respond_invalid(&handshake).unwrap();
        assert_eq!(handshake.status, HandshakeStatus::Active);
        assert_eq!(handshake.metadata.attempts, expected_attempts);
        assert_eq!(handshake.challenges.len(), expected_attempts as usize + 1);
        assert_eq!(handshake.phase, Phase::ChallengeGeneration);
    }

    handshake = harness.respond_invalid(&handshake).unwrap();
    assert_eq!(handshake.status, HandshakeStatus::Failed);
    assert_eq!(handshake.metadata.attempts, 3);
    assert_eq!(handshake.challenges.len(), 3);
    assert!(handshake.metadata.trust_score.is_none());
}

#[test]
fn test_retries_reduce_score() {
    let harness = Harness::new();
    let handshake = harness.initiate();

    let retried = harness.respond_invalid(&handshake).unwrap();
    let after_pop = harness.respond_valid(&retried).unwrap();
    let retried = harness.respond_invalid(&after_pop).unwrap();
    let after_zk = harness.respond_valid(&retried).unwrap();
    let done = harness.respond_valid(&after_zk).unwrap();

    assert_eq!(done.status, HandshakeStatus::Completed);
    assert_eq!(done.metadata.attempts, 2);
    assert_eq!(done.metadata.trust_score, Some(90));
}

#[test]
fn test_expired_challenge_fails_even_if_valid() {
    let harness = Harness::new();
    let handshake = harness.initiate();

    harness.clock.advance_secs(301);
    let err = harness.respond_valid(&handshake).unwrap_err();
    assert!(matches!(err, Error::Expired(_)));

    let stored = harness.engine.get_status(&handshake.id).unwrap();
    assert_eq!(stored.status, HandshakeStatus::Failed);
    assert_eq!(stored.phase, Phase::ChallengeGeneration);
}

#[test]
fn test_response_at_exact_expiry_is_accepted() {
    let harness = Harness::new();
    let handshake = harness.initiate();

    harness.clock.advance_secs(300);
    let advanced = harness.respond_valid(&handshake).unwrap();
    assert_eq!(advanced.phase, Phase::ResponseVerification);
}

#[test]
fn test_retry_challenge_gets_fresh_expiry() {
    let harness = Harness::new();
    let handshake = harness.initiate();

    harness.clock.advance_secs(200);
    let retried = harness.respond_invalid(&handshake).unwrap();
    harness.clock.advance_secs(200);

    let advanced = harness.respond_valid(&retried).unwrap();
    assert_eq!(advanced.phase, Phase::ResponseVerification);
}

#[test]
fn test_duplicate_initiate_is_rejected() {
    let harness = Harness::new();
    harness.initiate();

    let err = harness
        .engine
        .initiate(
            &harness.initiator.did(),
            &harness.responder.did(),
            &harness.initiator.public_key_multibase(),
            &["ethical"],
        )
        .unwrap_err();
    assert!(matches!(err, Error::AlreadyInProgress(_)));

    harness
        .engine
        .initiate(
            &harness.responder.did(),
            &harness.initiator.did(),
            &harness.responder.public_key_multibase(),
            &["ethical"],
        )
        .expect("reverse direction is a different ordered pair");
}

#[test]
fn test_new_handshake_allowed_after_terminal() {
    let harness = Harness::new();
    let mut handshake = harness.initiate();
    for _ in 0..3 {
        handshake = harness.respond_invalid(&handshake).unwrap();
    }
    assert_eq!(handshake.status, HandshakeStatus::Failed);

    let second = harness.initiate();
    assert_ne!(second.id, handshake.id);
}

#[test]
fn test_terminal_handshake_is_immutable() {
    let harness = Harness::new();
    let mut handshake = harness.initiate();
    while handshake.status == HandshakeStatus::Active {
        handshake = harness.respond_valid(&handshake).unwrap();
    }

    let before = serde_json::to_value(harness.engine.get_status(&handshake.id).unwrap()).unwrap();
    let err = harness.respond_valid(&handshake).unwrap_err();
    assert!(matches!(err, Error::InvalidState(_)));
    let after = serde_json::to_value(harness.engine.get_status(&handshake.id).unwrap()).unwrap();
    assert_eq!(before, after);

    let mut failed = harness.initiate();
    for _ in 0..3 {
        failed = harness.respond_invalid(&failed).unwrap();
    }
    assert!(matches!(
        harness.respond_invalid(&failed),
        Err(Error::InvalidState(_))
    ));
    assert_eq!(
        harness.engine.get_status(&failed.id).unwrap().metadata.attempts,
        3
    );
}

#[test]
fn test_stale_challenge_is_rejected_without_side_effects() {
    let harness = Harness::new();
    let handshake = harness.initiate();
    let stale = handshake.clone();

    let advanced = harness.respond_valid(&handshake).unwrap();
    let err = harness.respond_valid(&stale).unwrap_err();
    assert!(matches!(err, Error::NotFound(_)));

    let stored = harness.engine.get_status(&handshake.id).unwrap();
    assert_eq!(stored.phase, advanced.phase);
    assert_eq!(stored.challenges.len(), advanced.challenges.len());
    assert_eq!(stored.metadata.attempts, 0);
}

#[test]
fn test_unknown_handshake_is_not_found() {
    let harness = Harness::new();
    let err = harness
        .engine
        .respond(
            "missing",
            "challenge",
            &json!({}),
            &harness.responder.did(),
            &harness.responder.public_key_multibase(),
        )
        .unwrap_err();
    assert!(matches!(err, Error::NotFound(_)));
    assert!(harness.engine.get_status("missing").is_none());
}

#[test]
fn test_initiate_validation() {
    let harness = Harness::new();
    let key = harness.initiator.public_key_multibase();
    let empty: [&str; 0] = [];

    let cases: Vec<Result<Handshake, Error>> = vec![
        harness.engine.initiate("did:example:a", "did:example:b", &key, &empty),
        harness.engine.initiate("did:example:a", "did:example:b", &key, &["charisma"]),
        harness.engine.initiate("not-a-did", "did:example:b", &key, &["security"]),
        harness.engine.initiate("did:example:a", "did:example:a", &key, &["security"]),
        harness.engine.initiate("did:example:a", "did:example:b", "pubkeyA", &["security"]),
    ];

    for result in cases {
        assert!(matches!(result, Err(Error::ValidationFailed(_))));
    }
    assert_eq!(harness.engine.get_statistics().active, 0);
}

#[test]
fn test_wrong_responder_did_is_rejected() {
    let harness = Harness::new();
    let handshake = harness.initiate();
    let challenge = handshake.current_challenge().unwrap();
    let response = prover::build_response(challenge, &harness.responder).unwrap();

    let err = harness
        .engine
        .respond(
            &handshake.id,
            &challenge.id,
            &response,
            "did:example:mallory",
            &harness.responder.public_key_multibase(),
        )
        .unwrap_err();
    assert!(matches!(err, Error::ValidationFailed(_)));
    assert_eq!(
        harness.engine.get_status(&handshake.id).unwrap().metadata.attempts,
        0
    );
}

#[test]
fn test_phases_never_regress() {
    let harness = Harness::new();
    let mut handshake = harness.initiate();
    let mut phases = vec![handshake.phase];

    let plan = [false, true, false, true, true];
    for valid in plan {
        handshake = if valid {
            harness.respond_valid(&handshake).unwrap()
        } else {
            harness.respond_invalid(&handshake).unwrap()
        };
        phases.push(handshake.phase);
    }

    assert!(phases.windows(2).all(|w| w[0] <= w[1]));
    assert_eq!(phases.last(), Some(&Phase::Completed));
    for challenge in handshake.challenges.windows(2) {
        assert!(challenge[0].phase <= challenge[1].phase);
    }
}

#[test]
fn test_events_describe_transitions() {
    let harness = Harness::new();
    let handshake = harness.initiate();
    harness.respond_invalid(&handshake).unwrap();

    let events = harness.sink.take();
    assert!(matches!(events[0], HandshakeEvent::Initiated { .. }));
    assert!(matches!(
        events[1],
        HandshakeEvent::ChallengeIssued { retry: false, .. }
    ));
    assert!(matches!(
        events[2],
        HandshakeEvent::ResponseRejected {
            attempts: 1,
            max_attempts: 3,
            ..
        }
    ));
    assert!(matches!(
        events[3],
        HandshakeEvent::ChallengeIssued { retry: true, .. }
    ));
    assert!(events.iter().all(|e| e.handshake_id() == handshake.id));
}

#[test]
fn test_concurrent_responses_advance_once() {
    let harness = Harness::new();
    let handshake = harness.initiate();
    let challenge = handshake.current_challenge().unwrap().clone();
    let response = prover::build_response(&challenge, &harness.responder).unwrap();
    let responder_did = harness.responder.did();
    let responder_key = harness.responder.public_key_multibase();

    let successes: usize = std::thread::scope(|scope| {
        let handles: Vec<_> = (0..8)
            .map(|_| {
                scope.spawn(|| {
                    harness
                        .engine
                        .respond(
                            &handshake.id,
                            &challenge.id,
                            &response,
                            &responder_did,
                            &responder_key,
                        )
                        .is_ok()
                })
            })
            .collect();
        handles
            .into_iter()
            .map(|h| h.join().unwrap() as usize)
            .sum()
    });

    assert_eq!(successes, 1);
    let stored = harness.engine.get_status(&handshake.id).unwrap();
    assert_eq!(stored.phase, Phase::ResponseVerification);
    assert_eq!(stored.challenges.len(), 2);
}

#[test]
fn test_concurrent_initiate_creates_one_handshake() {
    let harness = Harness::new();
    let initiator_did = harness.initiator.did();
    let responder_did = harness.responder.did();
    let initiator_key = harness.initiator.public_key_multibase();

    let results: Vec<Result<Handshake, Error>> = std::thread::scope(|scope| {
        let handles: Vec<_> = (0..8)
            .map(|_| {
                scope.spawn(|| {
                    harness.engine.initiate(
                        &initiator_did,
                        &responder_did,
                        &initiator_key,
                        &["security"],
                    )
                })
            })
            .collect();
        handles.into_iter().map(|h| h.join().unwrap()).collect()
    });

    assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
    assert!(results
        .iter()
        .filter_map(|r| r.as_ref().err())
        .all(|e| matches!(e, Error::AlreadyInProgress(_))));
    assert_eq!(harness.engine.store().len(), 1);
}

#[test]
fn test_concurrent_invalid_responses_never_exceed_max_attempts() {
    let harness = Harness::new();
    let handshake = harness.initiate();

    std::thread::scope(|scope| {
        for _ in 0..8 {
            scope.spawn(|| {
                for _ in 0..4 {
                    if let Some(current) = harness.engine.get_status(&handshake.id) {
                        let _ = harness.respond_invalid(&current);
                    }
                }
            });
        }
    });

    let stored = harness.engine.get_status(&handshake.id).unwrap();
    assert_eq!(stored.status, HandshakeStatus::Failed);
    assert_eq!(stored.metadata.attempts, 3);
    assert_eq!(stored.challenges.len(), 3);
}

#[test]
fn test_unvalidated_huge_timeout_saturates() {
    let mut config = TrustConfig::default();
    config.handshake.pow_difficulty = 2;
    config.handshake.challenge_timeout_secs = u64::MAX / 1000 + 1;
    let harness = Harness::with_config(config);

    let handshake = harness.initiate();
    assert_eq!(handshake.current_challenge().unwrap().expires_at, u64::MAX);

    let retried = harness.respond_invalid(&handshake).unwrap();
    assert_eq!(retried.metadata.attempts, 1);
    assert_eq!(retried.challenges.len(), 2);
    assert_eq!(retried.current_challenge().unwrap().expires_at, u64::MAX);
}

#[test]
fn test_cleanup_expired() {
    let harness = Harness::new();
    let completed = {
        let mut handshake = harness.initiate();
        while handshake.status == HandshakeStatus::Active {
            handshake = harness.respond_valid(&handshake).unwrap();
        }
        handshake
    };

    let other_initiator = AgentIdentity::generate();
    let abandoned = harness
        .engine
        .initiate(
            &other_initiator.did(),
            &harness.responder.did(),
            &other_initiator.public_key_multibase(),
            &["compliance", "transparency"],
        )
        .unwrap();

    assert_eq!(harness.engine.cleanup_expired(), 1);
    assert!(harness.engine.get_status(&completed.id).is_none());
    assert!(harness.engine.get_status(&abandoned.id).is_some());

    harness.clock.advance_secs(301);
    assert_eq!(harness.engine.cleanup_expired(), 1);
    assert!(harness.engine.store().is_empty());

    let stats = harness.engine.get_statistics();
    assert_eq!(stats.total(), 0);
    assert!(harness
        .sink
        .events()
        .iter()
        .any(|e| matches!(e, HandshakeEvent::Removed { status: HandshakeStatus::Completed, .. })));
}

#[test]
fn test_statistics_counts() {
    let harness = Harness::new();
    let _active = harness.initiate();

    let other = AgentIdentity::generate();
    let mut failed = harness
        .engine
        .initiate(
            &other.did(),
            &harness.responder.did(),
            &other.public_key_multibase(),
            &["operational"],
        )
        .unwrap();
    for _ in 0..3 {
        let challenge = failed.current_challenge().unwrap().clone();
        failed = harness
            .engine
            .respond(
                &failed.id,
                &challenge.id,
                &json!({}),
                &harness.responder.did(),
                &harness.responder.public_key_multibase(),
            )
            .unwrap();
    }

    let stats = harness.engine.get_statistics();
    assert_eq!(stats.active, 1);
    assert_eq!(stats.failed, 1);
    assert_eq!(stats.completed, 0);
    assert_eq!(stats.average_duration_ms, 0.0);
}

#[tokio::test]
async fn test_background_janitor_sweeps_and_stops() {
    let harness = Harness::new();
    let mut handshake = harness.initiate();
    for _ in 0..3 {
        handshake = harness.respond_invalid(&handshake).unwrap();
    }
    let handshake_id = handshake.id.clone();

    let engine = Arc::new(harness.engine);
    let shutdown = CancellationToken::new();
    let handle = janitor::spawn(engine.clone(), Duration::from_millis(10), shutdown.clone());

    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(engine.get_status(&handshake_id).is_none());

    shutdown.cancel();
    tokio::time::timeout(Duration::from_secs(1), handle)
        .await
        .expect("janitor should stop after cancellation")
        .expect("janitor task should not panic");
}
