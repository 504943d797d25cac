//! Hierarchical State Machine engine
//!
//! # Purpose
//! A small, allocation-free dispatcher for hierarchical state machines.
//! States are values of a user enum implementing [`State`]; each state
//! handler maps an [`Event`] to a [`Status`]. Hierarchy is expressed by a
//! handler answering [`Status::Super`] with its parent for events it does
//! not own, so unhandled events bubble up until some ancestor claims them
//! or they reach [`State::TOP`], which the engine always reports as
//! handled.
//!
//! # Integration Points
//! - Depends on: nothing but `core`
//! - Provides to: device state machines (`uart750-driver`)
//!
//! # Architecture
//! [`Machine`] owns the only copy of the current state. Handlers never
//! write it: they return [`Status::Transition`] or [`Status::Super`] and
//! the engine performs every state change centrally, sending the reserved
//! `EXIT`, `ENTRY` and `INIT` signals in order.
//!
//! Misuse of the machine (dispatch before init, double init, events with a
//! forged signature, ...) is a contract violation. It is reported to a
//! pluggable sink (see [`set_violation_sink`]) and returned as
//! [`HsmError::ContractViolation`]; the engine never continues silently.

#![no_std]

#[cfg(test)]
#[macro_use]
extern crate std;

mod event;
mod machine;
mod violation;

pub use event::{Event, Signal, EVENT_SIGNATURE};
pub use machine::{Machine, State, Status, MAX_NESTING};
pub use violation::{report, set_violation_sink, Violation, ViolationSink};

use thiserror::Error;

/// Errors raised by the state machine engine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum HsmError {
    #[error("state machine contract violation: {0}")]
    ContractViolation(Violation),
}

pub type Result<T> = core::result::Result<T, HsmError>;
