// TriDH handshake: two sequential DH exchanges combined into one key.
//
//   Initiator                              Responder
//     |<------------- "READY" ---------------|
//     |--- p, g ----------------------------->|
//     |--- LDH public ---------------------->|
//     |<-------------------- LDH public -----|
//     |--- EDH public ---------------------->|
//     |<-------------------- EDH public -----|
//     |   keyring, destroy EDH keys, KDF      |
//     |--- base64(IV || AES-CBC(message)) -->|
//
// Every value is one `\r\n` record. There is no retry: any missing or
// malformed record aborts the session and the transport is released.

use num_bigint::BigUint;
use rand::{CryptoRng, RngCore};
use tokio::io::{AsyncRead, AsyncWrite};
use tridhstream::LineConnection;

use crate::config::SessionConfig;
use crate::crypto::cipher::MessageCipher;
use crate::crypto::dh;
use crate::crypto::kdf;
use crate::crypto::keys::{DhParameterSet, Keyring, SymmetricKey};
use crate::error::{Result, TriDhError};
use crate::handshake::observer::{Checkpoint, HandshakeObserver, TracingObserver};
use crate::handshake::state::{HandshakeState, Phase, Role};

/// Readiness literal the responder sends first.
pub const READY: &str = "READY";

/// Everything a completed handshake leaves behind on one side.
#[derive(Debug)]
pub struct HandshakeOutcome {
    /// The three shared values; equal on both sides.
    pub keyring: Keyring,
    /// Key derived from `keyring`.
    pub key: SymmetricKey,
    /// Our long-duration record (keys intact).
    pub local_ldh: DhParameterSet,
    /// Our ephemeral record, keys already destroyed.
    pub local_edh: DhParameterSet,
    /// Plaintext sent (initiator) or recovered (responder).
    pub message: String,
}

/// Compute the keyring from our two records and the peer's two records.
///
/// The two roles use complementary pairings so that DH commutativity makes
/// every component match:
///
/// ```text
///          initiator                      responder
/// K1  EDH_priv x peer LDH_pub      LDH_priv x peer EDH_pub
/// K2  EDH_priv x peer EDH_pub      EDH_priv x peer EDH_pub
/// K3  LDH_priv x peer EDH_pub      EDH_priv x peer LDH_pub
/// ```
///
/// All three use the modulus of our LDH record.
pub fn assemble_keyring(
    role: Role,
    local_ldh: &DhParameterSet,
    local_edh: &DhParameterSet,
    remote_ldh: &DhParameterSet,
    remote_edh: &DhParameterSet,
) -> Result<Keyring> {
    let p = local_ldh.p();
    let ldh_private = required(local_ldh.private_key(), "local LDH private key")?;
    let edh_private = required(local_edh.private_key(), "local EDH private key")?;
    let peer_ldh = required(remote_ldh.public_key(), "remote LDH public key")?;
    let peer_edh = required(remote_edh.public_key(), "remote EDH public key")?;

    let shared = |private: &BigUint, public: &BigUint| dh::compute_shared_value(private, public, p);
    let keyring = match role {
        Role::Initiator => Keyring::new(
            shared(edh_private, peer_ldh)?,
            shared(edh_private, peer_edh)?,
            shared(ldh_private, peer_edh)?,
        ),
        Role::Responder => Keyring::new(
            shared(ldh_private, peer_edh)?,
            shared(edh_private, peer_edh)?,
            shared(edh_private, peer_ldh)?,
        ),
    };
    Ok(keyring)
}

fn required<'a>(value: Option<&'a BigUint>, what: &str) -> Result<&'a BigUint> {
    value.ok_or_else(|| TriDhError::InvalidArgument(format!("{what} is absent")))
}

// ── Shared driver ────────────────────────────────────────────────────────

/// State and collaborators common to both roles.
struct Driver<R, O> {
    role: Role,
    config: SessionConfig,
    rng: R,
    observer: O,
    state: HandshakeState,
}

impl<R, O> Driver<R, O>
where
    R: RngCore + CryptoRng,
    O: HandshakeObserver,
{
    fn new(role: Role, config: SessionConfig, rng: R, observer: O) -> Self {
        Self {
            role,
            config,
            rng,
            observer,
            state: HandshakeState::Idle,
        }
    }

    fn with_observer<P: HandshakeObserver>(self, observer: P) -> Driver<R, P> {
        Driver {
            role: self.role,
            config: self.config,
            rng: self.rng,
            observer,
            state: self.state,
        }
    }

    fn checkpoint(&mut self, checkpoint: Checkpoint<'_>) {
        self.observer.on_checkpoint(self.role, &checkpoint);
    }

    fn ensure_idle(&self) -> Result<()> {
        if self.state != HandshakeState::Idle {
            return Err(TriDhError::InvalidStateTransition {
                from: self.state.to_string(),
                to: "Idle".into(),
            });
        }
        Ok(())
    }

    /// One DH phase under `(p, g)`. The initiator sends its public key
    /// first; the responder reads the peer's first.
    async fn exchange<S>(
        &mut self,
        conn: &mut LineConnection<S>,
        phase: Phase,
        p: &BigUint,
        g: &BigUint,
    ) -> Result<(DhParameterSet, DhParameterSet)>
    where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        let (private_key, public_key) =
            dh::generate_key_pair(p, g, self.config.key_bits, &mut self.rng)?;
        self.checkpoint(Checkpoint::KeyPairGenerated {
            phase,
            public_key: &public_key,
        });

        let peer_public = if self.role.sends_first() {
            self.send_public_key(conn, phase, &public_key).await?;
            self.receive_public_key(conn, phase).await?
        } else {
            let peer_public = self.receive_public_key(conn, phase).await?;
            self.send_public_key(conn, phase, &public_key).await?;
            peer_public
        };

        Ok((
            DhParameterSet::local(p.clone(), g.clone(), private_key, public_key),
            DhParameterSet::remote(p.clone(), g.clone(), peer_public),
        ))
    }

    async fn send_public_key<S>(
        &mut self,
        conn: &mut LineConnection<S>,
        phase: Phase,
        public_key: &BigUint,
    ) -> Result<()>
    where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        self.checkpoint(Checkpoint::SendingPublicKey { phase });
        conn.send_line(public_key).await?;
        Ok(())
    }

    async fn receive_public_key<S>(
        &mut self,
        conn: &mut LineConnection<S>,
        phase: Phase,
    ) -> Result<BigUint>
    where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        let what = match phase {
            Phase::Ldh => "peer LDH public key",
            Phase::Edh => "peer EDH public key",
        };
        let public_key = expect_integer(conn, what).await?;
        self.checkpoint(Checkpoint::PeerPublicKey {
            phase,
            public_key: &public_key,
        });
        Ok(public_key)
    }

    /// Keyring assembly, ephemeral destruction and key derivation.
    fn combine(
        &mut self,
        local_ldh: &DhParameterSet,
        local_edh: &mut DhParameterSet,
        remote_ldh: &DhParameterSet,
        remote_edh: &DhParameterSet,
    ) -> Result<(Keyring, SymmetricKey)> {
        self.state = HandshakeState::KeyringAssembly;
        let keyring = assemble_keyring(self.role, local_ldh, local_edh, remote_ldh, remote_edh)?;
        self.checkpoint(Checkpoint::KeyringAssembled { keyring: &keyring });

        self.state = HandshakeState::EphemeralDestruction;
        self.checkpoint(Checkpoint::DestroyingEphemeralKeys);
        local_edh.destroy_keys();
        self.checkpoint(Checkpoint::EphemeralKeysDestroyed);

        self.state = HandshakeState::Derive;
        let key = kdf::derive(&keyring);
        self.checkpoint(Checkpoint::KeyDerived);
        Ok((keyring, key))
    }

    /// Release the transport whatever `result` is, and settle the final state.
    async fn finish<S, T>(&mut self, conn: &mut LineConnection<S>, result: Result<T>) -> Result<T>
    where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        let released = conn.close().await;
        match (result, released) {
            (Ok(value), Ok(())) => {
                self.state = HandshakeState::Closed;
                tracing::info!(role = %self.role, "handshake complete");
                Ok(value)
            }
            (Ok(_), Err(close_err)) => {
                let error = TriDhError::from(close_err);
                self.abort(&error);
                Err(error)
            }
            (Err(error), released) => {
                if let Err(close_err) = released {
                    tracing::debug!(role = %self.role, error = %close_err, "close after abort failed");
                }
                self.abort(&error);
                Err(error)
            }
        }
    }

    fn abort(&mut self, error: &TriDhError) {
        let at = self.state.label();
        tracing::warn!(role = %self.role, state = at, %error, "handshake aborted");
        self.state = HandshakeState::Aborted { at };
    }
}

async fn expect_line<S>(conn: &mut LineConnection<S>, what: &str) -> Result<String>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    conn.read_line()
        .await?
        .ok_or_else(|| TriDhError::ProtocolAbort(format!("stream closed before {what}")))
}

async fn expect_integer<S>(conn: &mut LineConnection<S>, what: &str) -> Result<BigUint>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let line = expect_line(conn, what).await?;
    let digits = line.trim();
    // Plain decimal only; `FromStr` would also take `+` and `_`.
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return Err(TriDhError::ProtocolAbort(format!("unparsable {what}: {line:?}")));
    }
    digits
        .parse::<BigUint>()
        .map_err(|_| TriDhError::ProtocolAbort(format!("unparsable {what}: {line:?}")))
}

// ── Initiator ────────────────────────────────────────────────────────────

/// Client side: generates `(p, g)`, leads both exchanges, sends the message.
pub struct Initiator<R, O = TracingObserver> {
    driver: Driver<R, O>,
}

impl<R: RngCore + CryptoRng> Initiator<R> {
    /// Create an initiator that reports checkpoints through `tracing`.
    pub fn new(config: SessionConfig, rng: R) -> Self {
        Self {
            driver: Driver::new(Role::Initiator, config, rng, TracingObserver),
        }
    }
}

impl<R, O> Initiator<R, O>
where
    R: RngCore + CryptoRng,
    O: HandshakeObserver,
{
    /// Replace the checkpoint observer.
    pub fn with_observer<P: HandshakeObserver>(self, observer: P) -> Initiator<R, P> {
        Initiator {
            driver: self.driver.with_observer(observer),
        }
    }

    pub fn state(&self) -> HandshakeState {
        self.driver.state
    }

    pub fn observer(&self) -> &O {
        &self.driver.observer
    }

    /// Run the whole handshake and send the configured message.
    /// The connection is closed on return, whether the run succeeded or not.
    pub async fn run<S>(&mut self, conn: &mut LineConnection<S>) -> Result<HandshakeOutcome>
    where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        self.driver.ensure_idle()?;
        let result = self.drive(conn).await;
        self.driver.finish(conn, result).await
    }

    async fn drive<S>(&mut self, conn: &mut LineConnection<S>) -> Result<HandshakeOutcome>
    where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        let d = &mut self.driver;
        d.config.validate()?;

        let ready = expect_line(conn, "readiness signal").await?;
        if ready != READY {
            return Err(TriDhError::ProtocolAbort(format!(
                "expected readiness signal {READY:?}, got {ready:?}"
            )));
        }
        d.checkpoint(Checkpoint::Ready);

        d.state = HandshakeState::ParamsSent;
        let (p, g) = dh::generate_parameters(d.config.prime_bits, &mut d.rng)?;
        conn.send_line(&p).await?;
        conn.send_line(&g).await?;
        d.checkpoint(Checkpoint::Parameters { p: &p, g: &g });

        d.state = HandshakeState::LdhExchange;
        let (ldh, peer_ldh) = d.exchange(conn, Phase::Ldh, &p, &g).await?;

        // The ephemeral field is taken from our LDH record.
        d.state = HandshakeState::EdhExchange;
        let (mut edh, peer_edh) = d.exchange(conn, Phase::Edh, ldh.p(), ldh.g()).await?;

        let (keyring, key) = d.combine(&ldh, &mut edh, &peer_ldh, &peer_edh)?;

        d.state = HandshakeState::EncryptAndSend;
        let envelope = MessageCipher::new(key.clone()).encrypt(&d.config.message, &mut d.rng)?;
        d.checkpoint(Checkpoint::SendingEnvelope);
        conn.send_line(&envelope).await?;
        let message = d.config.message.clone();
        d.checkpoint(Checkpoint::Message { text: &message });

        Ok(HandshakeOutcome {
            keyring,
            key,
            local_ldh: ldh,
            local_edh: edh,
            message,
        })
    }
}

// ── Responder ────────────────────────────────────────────────────────────

/// Server side: announces readiness, follows both exchanges, decrypts the message.
pub struct Responder<R, O = TracingObserver> {
    driver: Driver<R, O>,
}

impl<R: RngCore + CryptoRng> Responder<R> {
    /// Create a responder that reports checkpoints through `tracing`.
    pub fn new(config: SessionConfig, rng: R) -> Self {
        Self {
            driver: Driver::new(Role::Responder, config, rng, TracingObserver),
        }
    }
}

impl<R, O> Responder<R, O>
where
    R: RngCore + CryptoRng,
    O: HandshakeObserver,
{
    /// Replace the checkpoint observer.
    pub fn with_observer<P: HandshakeObserver>(self, observer: P) -> Responder<R, P> {
        Responder {
            driver: self.driver.with_observer(observer),
        }
    }

    pub fn state(&self) -> HandshakeState {
        self.driver.state
    }

    pub fn observer(&self) -> &O {
        &self.driver.observer
    }

    /// Run the whole handshake on an accepted connection and return the
    /// decrypted message. The connection is closed on return, even when
    /// decryption fails.
    pub async fn run<S>(&mut self, conn: &mut LineConnection<S>) -> Result<HandshakeOutcome>
    where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        self.driver.ensure_idle()?;
        let result = self.drive(conn).await;
        self.driver.finish(conn, result).await
    }

    async fn drive<S>(&mut self, conn: &mut LineConnection<S>) -> Result<HandshakeOutcome>
    where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        let d = &mut self.driver;
        d.config.validate()?;

        conn.send_line(READY).await?;
        d.checkpoint(Checkpoint::Ready);

        d.state = HandshakeState::ParamsReceived;
        let p = expect_integer(conn, "prime modulus p").await?;
        if p < BigUint::from(2u32) {
            return Err(TriDhError::ProtocolAbort(format!("received modulus {p} is below 2")));
        }
        let g = expect_integer(conn, "generator g").await?;
        d.checkpoint(Checkpoint::Parameters { p: &p, g: &g });

        d.state = HandshakeState::LdhExchange;
        let (ldh, peer_ldh) = d.exchange(conn, Phase::Ldh, &p, &g).await?;

        // The ephemeral field reuses the values received above.
        d.state = HandshakeState::EdhExchange;
        let (mut edh, peer_edh) = d.exchange(conn, Phase::Edh, &p, &g).await?;

        let (keyring, key) = d.combine(&ldh, &mut edh, &peer_ldh, &peer_edh)?;

        d.state = HandshakeState::ReceiveAndDecrypt;
        let envelope = expect_line(conn, "ciphertext envelope").await?;
        d.checkpoint(Checkpoint::EnvelopeReceived);
        let message = MessageCipher::new(key.clone()).decrypt(&envelope)?;
        d.checkpoint(Checkpoint::Message { text: &message });

        Ok(HandshakeOutcome {
            keyring,
            key,
            local_ldh: ldh,
            local_edh: edh,
            message,
        })
    }
}
