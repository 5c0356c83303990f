// Handshake module declarations

pub mod observer;
pub mod protocol;
pub mod state;

pub use observer::{Checkpoint, HandshakeObserver, NoopObserver, StepGate, TracingObserver};
pub use protocol::{assemble_keyring, HandshakeOutcome, Initiator, Responder, READY};
pub use state::{HandshakeState, Phase, Role};
