// Integration tests for the TriDH initiator/responder drivers.

use num_bigint::BigUint;
use rand::SeedableRng;
use rand_chacha::ChaCha20Rng;

use tridh::handshake::{Checkpoint, HandshakeObserver, HandshakeState, Role, READY};
use tridh::{Initiator, Responder, SessionConfig, TriDhError};
use tridhstream::memory::{pair, DEFAULT_CAPACITY};
use tridhstream::tcp::{connect, LineListener};

/// Records checkpoint names in order.
#[derive(Default)]
struct Recorder(Vec<&'static str>);

impl HandshakeObserver for Recorder {
    fn on_checkpoint(&mut self, _role: Role, checkpoint: &Checkpoint<'_>) {
        self.0.push(checkpoint.name());
    }
}

fn seeded(seed: u64) -> ChaCha20Rng {
    ChaCha20Rng::seed_from_u64(seed)
}

// ── Full handshake ───────────────────────────────────────────────────────

#[tokio::test]
async fn hello_world_over_loopback() {
    let config = SessionConfig::default();
    let (mut a, mut b) = pair(DEFAULT_CAPACITY);

    let mut initiator = Initiator::new(config.clone(), seeded(7));
    let mut responder = Responder::new(config, seeded(11));

    let (sent, received) = tokio::join!(initiator.run(&mut a), responder.run(&mut b));
    let sent = sent.unwrap();
    let received = received.unwrap();

    // (a) equal keyrings, hence equal keys
    assert_eq!(sent.keyring, received.keyring);
    assert_eq!(sent.key, received.key);
    // (b) message recovered exactly
    assert_eq!(received.message, "Hello world");
    assert_eq!(sent.message, "Hello world");
    // (c) both transports released
    assert!(a.is_closed());
    assert!(b.is_closed());
    assert_eq!(initiator.state(), HandshakeState::Closed);
    assert_eq!(responder.state(), HandshakeState::Closed);
}

#[tokio::test]
async fn ephemeral_keys_destroyed_long_duration_kept() {
    let config = SessionConfig::default();
    let (mut a, mut b) = pair(DEFAULT_CAPACITY);

    let mut initiator = Initiator::new(config.clone(), seeded(21));
    let mut responder = Responder::new(config, seeded(22));
    let (sent, received) = tokio::join!(initiator.run(&mut a), responder.run(&mut b));

    for outcome in [sent.unwrap(), received.unwrap()] {
        assert!(outcome.local_edh.is_destroyed());
        assert_eq!(outcome.local_edh.private_key(), None);
        assert_eq!(outcome.local_edh.public_key(), None);
        assert!(outcome.local_ldh.private_key().is_some());
        assert!(outcome.local_ldh.public_key().is_some());
    }
}

#[tokio::test]
async fn converges_at_realistic_sizes() {
    let config = SessionConfig::default()
        .prime_bits(256)
        .key_bits(256)
        .message("a longer message that spans several AES blocks, sent once");
    let (mut a, mut b) = pair(DEFAULT_CAPACITY);

    let mut initiator = Initiator::new(config.clone(), seeded(31));
    let mut responder = Responder::new(config.clone(), seeded(32));
    let (sent, received) = tokio::join!(initiator.run(&mut a), responder.run(&mut b));
    let (sent, received) = (sent.unwrap(), received.unwrap());

    assert_eq!(sent.keyring, received.keyring);
    assert_eq!(sent.local_ldh.p().bits(), 256);
    assert_eq!(received.message, config.message);
}

#[tokio::test]
async fn seeded_runs_are_reproducible() {
    async fn run_once() -> tridh::Keyring {
        let config = SessionConfig::default().prime_bits(64).key_bits(64);
        let (mut a, mut b) = pair(DEFAULT_CAPACITY);
        let mut initiator = Initiator::new(config.clone(), seeded(41));
        let mut responder = Responder::new(config, seeded(42));
        let (sent, received) = tokio::join!(initiator.run(&mut a), responder.run(&mut b));
        let (sent, received) = (sent.unwrap(), received.unwrap());
        assert_eq!(sent.keyring, received.keyring);
        sent.keyring
    }

    assert_eq!(run_once().await, run_once().await);
}

#[tokio::test]
async fn checkpoints_reported_in_protocol_order() {
    let config = SessionConfig::default();
    let (mut a, mut b) = pair(DEFAULT_CAPACITY);

    let mut initiator = Initiator::new(config.clone(), seeded(51)).with_observer(Recorder::default());
    let mut responder = Responder::new(config, seeded(52)).with_observer(Recorder::default());
    let (sent, received) = tokio::join!(initiator.run(&mut a), responder.run(&mut b));
    sent.unwrap();
    received.unwrap();

    assert_eq!(
        initiator.observer().0,
        vec![
            "ready",
            "parameters",
            "key_pair_generated",
            "sending_public_key",
            "peer_public_key",
            "key_pair_generated",
            "sending_public_key",
            "peer_public_key",
            "keyring_assembled",
            "destroying_ephemeral_keys",
            "ephemeral_keys_destroyed",
            "key_derived",
            "sending_envelope",
            "message",
        ]
    );
    assert_eq!(
        responder.observer().0,
        vec![
            "ready",
            "parameters",
            "key_pair_generated",
            "peer_public_key",
            "sending_public_key",
            "key_pair_generated",
            "peer_public_key",
            "sending_public_key",
            "keyring_assembled",
            "destroying_ephemeral_keys",
            "ephemeral_keys_destroyed",
            "key_derived",
            "envelope_received",
            "message",
        ]
    );
}

#[tokio::test]
async fn handshake_over_tcp() {
    let listener = LineListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let config = SessionConfig::default().message("over tcp");

    let responder_side = async {
        let mut conn = listener.accept().await.unwrap();
        let mut responder = Responder::new(config.clone(), seeded(61));
        let outcome = responder.run(&mut conn).await.unwrap();
        assert!(conn.is_closed());
        outcome
    };
    let initiator_side = async {
        let mut conn = connect(addr).await.unwrap();
        let mut initiator = Initiator::new(config.clone(), seeded(62));
        initiator.run(&mut conn).await.unwrap()
    };

    let (received, sent) = tokio::join!(responder_side, initiator_side);
    assert_eq!(sent.keyring, received.keyring);
    assert_eq!(received.message, "over tcp");
}

// ── Aborts ───────────────────────────────────────────────────────────────

#[tokio::test]
async fn wrong_readiness_literal_aborts_before_parameters() {
    let (mut a, mut peer) = pair(DEFAULT_CAPACITY);
    let mut initiator = Initiator::new(SessionConfig::default(), seeded(71));

    let fake_responder = async {
        peer.send_line("NOT READY").await.unwrap();
        // Nothing else may arrive: the initiator closes without sending p.
        peer.read_line().await.unwrap()
    };
    let (result, next) = tokio::join!(initiator.run(&mut a), fake_responder);

    assert!(matches!(result, Err(TriDhError::ProtocolAbort(_))));
    assert_eq!(next, None);
    assert_eq!(initiator.state(), HandshakeState::Aborted { at: "Idle" });
    assert!(initiator.state().is_terminal());
    assert!(a.is_closed());
}

#[tokio::test]
async fn peer_closing_mid_exchange_aborts() {
    let (mut a, mut peer) = pair(DEFAULT_CAPACITY);
    let mut initiator = Initiator::new(SessionConfig::default(), seeded(81));

    let fake_responder = async {
        peer.send_line(READY).await.unwrap();
        let p = peer.read_line().await.unwrap();
        let g = peer.read_line().await.unwrap();
        let ldh_public = peer.read_line().await.unwrap();
        peer.close().await.unwrap();
        (p, g, ldh_public)
    };
    let (result, (p, g, ldh_public)) = tokio::join!(initiator.run(&mut a), fake_responder);

    assert!(p.is_some() && ldh_public.is_some());
    assert_eq!(g.as_deref(), Some("2"));
    match result {
        Err(TriDhError::ProtocolAbort(msg)) => assert!(msg.contains("LDH")),
        other => panic!("expected protocol abort, got {other:?}"),
    }
    assert_eq!(initiator.state(), HandshakeState::Aborted { at: "LdhExchange" });
    assert!(a.is_closed());
}

#[tokio::test]
async fn unparsable_public_key_aborts_responder() {
    let (mut peer, mut b) = pair(DEFAULT_CAPACITY);
    let mut responder = Responder::new(SessionConfig::default(), seeded(91));

    let fake_initiator = async {
        assert_eq!(peer.read_line().await.unwrap().as_deref(), Some(READY));
        peer.send_line(251u32).await.unwrap();
        peer.send_line(2u32).await.unwrap();
        peer.send_line("not-a-number").await.unwrap();
        peer.read_line().await.unwrap()
    };
    let (result, next) = tokio::join!(responder.run(&mut b), fake_initiator);

    assert!(matches!(result, Err(TriDhError::ProtocolAbort(_))));
    assert_eq!(next, None);
    assert_eq!(responder.state(), HandshakeState::Aborted { at: "LdhExchange" });
    assert!(b.is_closed());
}

/// Feeds `records` to a responder after its readiness signal and returns
/// the responder's result, its final state and the next record it sent.
async fn responder_fed(
    seed: u64,
    records: &[&str],
) -> (tridh::Result<tridh::HandshakeOutcome>, HandshakeState, Option<String>) {
    let (mut peer, mut b) = pair(DEFAULT_CAPACITY);
    let mut responder = Responder::new(SessionConfig::default(), seeded(seed));

    let fake_initiator = async {
        assert_eq!(peer.read_line().await.unwrap().as_deref(), Some(READY));
        for record in records {
            peer.send_line(record).await.unwrap();
        }
        peer.read_line().await.unwrap()
    };
    let (result, next) = tokio::join!(responder.run(&mut b), fake_initiator);
    assert!(b.is_closed());
    (result, responder.state(), next)
}

#[tokio::test]
async fn non_decimal_integer_records_abort_responder() {
    let cases: [(&[&str], &str); 4] = [
        (&["2_51", "2"], "ParamsReceived"),
        (&["+251", "2"], "ParamsReceived"),
        (&["251", "+2"], "ParamsReceived"),
        (&["251", "2", " 1_0 "], "LdhExchange"),
    ];
    for (seed, (records, at)) in (131u64..).zip(cases) {
        let (result, state, next) = responder_fed(seed, records).await;
        assert!(
            matches!(result, Err(TriDhError::ProtocolAbort(_))),
            "{records:?} gave {result:?}"
        );
        assert_eq!(state, HandshakeState::Aborted { at });
        assert!(state.is_terminal());
        assert_eq!(next, None, "{records:?} got a reply");
    }
}

#[tokio::test]
async fn degenerate_received_modulus_aborts_responder() {
    for (seed, p) in [(141u64, "0"), (142, "1")] {
        let (result, state, next) = responder_fed(seed, &[p, "2"]).await;
        match result {
            Err(TriDhError::ProtocolAbort(msg)) => assert!(msg.contains("modulus")),
            other => panic!("p = {p}: expected protocol abort, got {other:?}"),
        }
        assert_eq!(state, HandshakeState::Aborted { at: "ParamsReceived" });
        assert_eq!(next, None);
    }
}

#[tokio::test]
async fn bad_envelope_surfaces_decryption_error_and_closes() {
    let (mut peer, mut b) = pair(DEFAULT_CAPACITY);
    let mut responder = Responder::new(SessionConfig::default(), seeded(101));

    let p = BigUint::from(2_147_483_647u32);
    let g = BigUint::from(2u32);
    let fake_initiator = async {
        assert_eq!(peer.read_line().await.unwrap().as_deref(), Some(READY));
        peer.send_line(&p).await.unwrap();
        peer.send_line(&g).await.unwrap();
        for private in [5u32, 7] {
            let public = g.modpow(&BigUint::from(private), &p);
            peer.send_line(&public).await.unwrap();
            assert!(peer.read_line().await.unwrap().is_some());
        }
        // Valid base64, but far shorter than one IV.
        peer.send_line("AAAA").await.unwrap();
        peer.read_line().await.unwrap()
    };
    let (result, next) = tokio::join!(responder.run(&mut b), fake_initiator);

    assert!(matches!(result, Err(TriDhError::Decryption(_))));
    assert_eq!(next, None);
    assert_eq!(
        responder.state(),
        HandshakeState::Aborted { at: "ReceiveAndDecrypt" }
    );
    assert!(responder.state().is_terminal());
    assert!(b.is_closed());
}

#[tokio::test]
async fn invalid_configuration_aborts_and_releases() {
    let (mut a, mut b) = pair(DEFAULT_CAPACITY);
    let mut initiator = Initiator::new(SessionConfig::default().prime_bits(1), seeded(111));
    let mut responder = Responder::new(SessionConfig::default(), seeded(112));

    let (sent, received) = tokio::join!(initiator.run(&mut a), responder.run(&mut b));

    assert!(matches!(sent, Err(TriDhError::InvalidArgument(_))));
    assert!(matches!(received, Err(TriDhError::ProtocolAbort(_))));
    assert!(a.is_closed());
    assert!(b.is_closed());
}

#[tokio::test]
async fn driver_runs_only_once() {
    let config = SessionConfig::default();
    let (mut a, mut b) = pair(DEFAULT_CAPACITY);
    let mut initiator = Initiator::new(config.clone(), seeded(121));
    let mut responder = Responder::new(config, seeded(122));
    let (sent, received) = tokio::join!(initiator.run(&mut a), responder.run(&mut b));
    sent.unwrap();
    received.unwrap();

    let (mut c, _d) = pair(DEFAULT_CAPACITY);
    assert!(matches!(
        initiator.run(&mut c).await,
        Err(TriDhError::InvalidStateTransition { .. })
    ));
}
