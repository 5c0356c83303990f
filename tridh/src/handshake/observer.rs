//! Checkpoint hooks for handshake drivers.
//!
//! Drivers report progress through [`HandshakeObserver`]; observers can log,
//! collect, or pause, but never change what the driver does next.

use num_bigint::BigUint;

use crate::crypto::keys::Keyring;
use crate::handshake::state::{Phase, Role};

/// A named point in the handshake, with the public data available there.
#[derive(Debug, Clone, Copy)]
pub enum Checkpoint<'a> {
    /// Readiness literal sent (responder) or accepted (initiator).
    Ready,
    /// `(p, g)` generated and sent, or received.
    Parameters { p: &'a BigUint, g: &'a BigUint },
    /// A key pair was generated for `phase`. Only the public half is exposed.
    KeyPairGenerated { phase: Phase, public_key: &'a BigUint },
    /// About to send our public key for `phase`.
    SendingPublicKey { phase: Phase },
    /// The peer's public key for `phase` arrived.
    PeerPublicKey { phase: Phase, public_key: &'a BigUint },
    /// All three shared values computed.
    KeyringAssembled { keyring: &'a Keyring },
    /// About to clear the local ephemeral keys.
    DestroyingEphemeralKeys,
    /// Local ephemeral keys cleared.
    EphemeralKeysDestroyed,
    /// Symmetric key derived.
    KeyDerived,
    /// About to send the encrypted message.
    SendingEnvelope,
    /// Encrypted message received.
    EnvelopeReceived,
    /// Plaintext recovered (responder) or sent (initiator).
    Message { text: &'a str },
}

impl Checkpoint<'_> {
    /// Stable short name, suitable for logs and assertions.
    pub fn name(&self) -> &'static str {
        match self {
            Checkpoint::Ready => "ready",
            Checkpoint::Parameters { .. } => "parameters",
            Checkpoint::KeyPairGenerated { .. } => "key_pair_generated",
            Checkpoint::SendingPublicKey { .. } => "sending_public_key",
            Checkpoint::PeerPublicKey { .. } => "peer_public_key",
            Checkpoint::KeyringAssembled { .. } => "keyring_assembled",
            Checkpoint::DestroyingEphemeralKeys => "destroying_ephemeral_keys",
            Checkpoint::EphemeralKeysDestroyed => "ephemeral_keys_destroyed",
            Checkpoint::KeyDerived => "key_derived",
            Checkpoint::SendingEnvelope => "sending_envelope",
            Checkpoint::EnvelopeReceived => "envelope_received",
            Checkpoint::Message { .. } => "message",
        }
    }
}

/// Receives checkpoint notifications from a handshake driver.
pub trait HandshakeObserver {
    fn on_checkpoint(&mut self, role: Role, checkpoint: &Checkpoint<'_>);
}

/// Default observer: one `tracing` debug event per checkpoint.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingObserver;

impl HandshakeObserver for TracingObserver {
    fn on_checkpoint(&mut self, role: Role, checkpoint: &Checkpoint<'_>) {
        match checkpoint {
            Checkpoint::Parameters { p, g } => {
                tracing::debug!(%role, %p, %g, "DH parameters")
            }
            Checkpoint::KeyPairGenerated { phase, public_key } => {
                tracing::debug!(%role, %phase, public_key = %public_key, "key pair generated")
            }
            Checkpoint::SendingPublicKey { phase } => {
                tracing::debug!(%role, %phase, "sending public key")
            }
            Checkpoint::PeerPublicKey { phase, public_key } => {
                tracing::debug!(%role, %phase, public_key = %public_key, "peer public key received")
            }
            Checkpoint::KeyringAssembled { keyring } => tracing::debug!(
                %role,
                k1 = %keyring.k1(),
                k2 = %keyring.k2(),
                k3 = %keyring.k3(),
                "keyring assembled"
            ),
            Checkpoint::Message { text } => tracing::debug!(%role, text = %text, "message"),
            other => tracing::debug!(%role, checkpoint = other.name()),
        }
    }
}

/// Observer that ignores every checkpoint.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopObserver;

impl HandshakeObserver for NoopObserver {
    fn on_checkpoint(&mut self, _role: Role, _checkpoint: &Checkpoint<'_>) {}
}

impl<O: HandshakeObserver + ?Sized> HandshakeObserver for &mut O {
    fn on_checkpoint(&mut self, role: Role, checkpoint: &Checkpoint<'_>) {
        (**self).on_checkpoint(role, checkpoint)
    }
}

/// Observer that forwards to `inner`, then calls `pause` with a prompt before
/// the steps an operator may want to hold: sending a public key, destroying
/// the ephemeral keys, sending or decrypting the envelope.
pub struct StepGate<O, F> {
    inner: O,
    pause: F,
}

impl<O, F> StepGate<O, F>
where
    O: HandshakeObserver,
    F: FnMut(&str),
{
    pub fn new(inner: O, pause: F) -> Self {
        Self { inner, pause }
    }

    pub fn into_inner(self) -> O {
        self.inner
    }
}

impl<O, F> HandshakeObserver for StepGate<O, F>
where
    O: HandshakeObserver,
    F: FnMut(&str),
{
    fn on_checkpoint(&mut self, role: Role, checkpoint: &Checkpoint<'_>) {
        self.inner.on_checkpoint(role, checkpoint);
        if let Some(prompt) = gate_prompt(role, checkpoint) {
            (self.pause)(&prompt);
        }
    }
}

fn gate_prompt(role: Role, checkpoint: &Checkpoint<'_>) -> Option<String> {
    let prompt = match checkpoint {
        Checkpoint::SendingPublicKey { phase } => {
            format!("[{phase}] press ENTER to send the {role} public key")
        }
        Checkpoint::DestroyingEphemeralKeys => {
            "press ENTER to destroy the ephemeral keys".to_string()
        }
        Checkpoint::SendingEnvelope => "press ENTER to send the encrypted message".to_string(),
        Checkpoint::EnvelopeReceived => "press ENTER to decrypt the message".to_string(),
        _ => return None,
    };
    Some(prompt)
}
