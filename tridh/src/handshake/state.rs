// Handshake state machine.

use std::fmt;

/// Which side of the handshake a driver plays.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Initiator,
    Responder,
}

impl Role {
    /// Whether this role sends its public key before reading the peer's.
    pub fn sends_first(self) -> bool {
        matches!(self, Role::Initiator)
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::Initiator => write!(f, "initiator"),
            Role::Responder => write!(f, "responder"),
        }
    }
}

/// The two DH phases.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Long-duration exchange.
    Ldh,
    /// Ephemeral exchange.
    Edh,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Phase::Ldh => write!(f, "LDH"),
            Phase::Edh => write!(f, "EDH"),
        }
    }
}

/// The current step of a handshake driver.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandshakeState {
    /// Waiting for (initiator) or sending (responder) the readiness literal.
    Idle,
    /// Initiator has generated and sent `(p, g)`.
    ParamsSent,
    /// Responder has received `(p, g)`.
    ParamsReceived,
    /// Long-duration exchange in progress.
    LdhExchange,
    /// Ephemeral exchange in progress.
    EdhExchange,
    /// Computing the three shared values.
    KeyringAssembly,
    /// Clearing the local ephemeral keys.
    EphemeralDestruction,
    /// Running the KDF.
    Derive,
    /// Initiator encrypting and sending the envelope.
    EncryptAndSend,
    /// Responder receiving and decrypting the envelope.
    ReceiveAndDecrypt,
    /// Completed; transport released.
    Closed,
    /// Failed in the named state; transport released.
    Aborted { at: &'static str },
}

impl HandshakeState {
    /// Human-readable label for the current state (used in error messages).
    pub fn label(&self) -> &'static str {
        match self {
            HandshakeState::Idle => "Idle",
            HandshakeState::ParamsSent => "ParamsSent",
            HandshakeState::ParamsReceived => "ParamsReceived",
            HandshakeState::LdhExchange => "LdhExchange",
            HandshakeState::EdhExchange => "EdhExchange",
            HandshakeState::KeyringAssembly => "KeyringAssembly",
            HandshakeState::EphemeralDestruction => "EphemeralDestruction",
            HandshakeState::Derive => "Derive",
            HandshakeState::EncryptAndSend => "EncryptAndSend",
            HandshakeState::ReceiveAndDecrypt => "ReceiveAndDecrypt",
            HandshakeState::Closed => "Closed",
            HandshakeState::Aborted { .. } => "Aborted",
        }
    }

    /// True for `Closed` and `Aborted`.
    pub fn is_terminal(&self) -> bool {
        matches!(self, HandshakeState::Closed | HandshakeState::Aborted { .. })
    }
}

impl fmt::Display for HandshakeState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HandshakeState::Aborted { at } => write!(f, "Aborted(at {at})"),
            other => f.write_str(other.label()),
        }
    }
}
