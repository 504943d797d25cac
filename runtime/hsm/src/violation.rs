//! Contract violation reporting
//!
//! Violations go through a process-wide sink before being returned to the
//! caller. The default sink logs at `error` level; an embedder may install
//! its own (for example one that halts the system).

use spin::RwLock;
use thiserror::Error;

use crate::event::Signal;
use crate::HsmError;

/// Ways a caller can break the machine's contract
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum Violation {
    #[error("machine used before init")]
    NotInitialized,

    #[error("init called on an already-initialized machine")]
    AlreadyInitialized,

    #[error("machine used after terminate")]
    Terminated,

    #[error("event {signal:?} carries an invalid signature")]
    BadSignature { signal: Signal },

    #[error("state hierarchy deeper than {depth} levels")]
    NestingTooDeep { depth: usize },
}

/// Sink invoked for every reported violation
pub type ViolationSink = fn(&Violation);

static SINK: RwLock<Option<ViolationSink>> = RwLock::new(None);

fn log_sink(violation: &Violation) {
    log::error!("hsm: contract violation: {}", violation);
}

/// Install the violation sink
///
/// Replaces any previously installed sink.
pub fn set_violation_sink(sink: ViolationSink) {
    *SINK.write() = Some(sink);
}

fn sink() -> ViolationSink {
    (*SINK.read()).unwrap_or(log_sink)
}

/// Report `violation` to the installed sink and turn it into an error
pub fn report(violation: Violation) -> HsmError {
    (sink())(&violation);
    HsmError::ContractViolation(violation)
}
