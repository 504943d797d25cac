//! Machine and dispatch loop
//!
//! ## Dispatch
//!
//! 1. The current (leaf) state handles the event.
//! 2. `Super(parent)` retries the same event against `parent`. The
//!    current state is left untouched; bubbling is not a transition.
//! 3. `Transition(target)` exits the leaf and every ancestor up to the
//!    state that requested the transition (further up to `target` itself
//!    when `target` encloses that state). Ancestors of `target` left by the
//!    exits are entered again, outermost first, then `target` is entered
//!    and sent `INIT`. An `INIT` answered with another `Transition` enters
//!    that state as well (nested initial transition), without exiting the
//!    parent it was declared in. Every exited state is entered again
//!    before it is considered active.
//! 4. Any other status ends the dispatch.
//!
//! `ENTRY`, `EXIT` and `INIT` answered with `Super` mean "nothing to do";
//! they are never forwarded to a superstate.

use core::fmt;

use crate::event::{Event, Signal};
use crate::violation::{report, Violation};
use crate::Result;

/// Upper bound on superstate chains and init chains
pub const MAX_NESTING: usize = 16;

/// Outcome of a state handler
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status<S> {
    /// Event consumed
    Handled,
    /// Event recognised but deliberately not acted upon
    Ignored,
    /// Event should be recalled later; the handler owns the deferral
    Deferred,
    /// Not mine: ask this superstate
    Super(S),
    /// Leave for this state
    Transition(S),
}

/// A state of a hierarchical machine operating on context `C`
pub trait State<C>: Copy + Eq + fmt::Debug {
    /// Payload carried by application events
    type Payload;

    /// Root superstate. The engine answers every event for it with
    /// [`Status::Handled`] and never calls its handler.
    const TOP: Self;

    /// Handle `event` in this state
    fn handle(self, ctx: &mut C, event: &Event<Self::Payload>) -> Status<Self>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase<S> {
    Uninitialized,
    Active(S),
    Terminated,
}

/// A hierarchical state machine instance
#[derive(Debug)]
pub struct Machine<S> {
    phase: Phase<S>,
}

impl<S: Copy + Eq + fmt::Debug> Default for Machine<S> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S: Copy + Eq + fmt::Debug> Machine<S> {
    /// Create a machine with no current state
    pub const fn new() -> Self {
        Self {
            phase: Phase::Uninitialized,
        }
    }

    /// Current stable state, if the machine is running
    pub fn current(&self) -> Option<S> {
        match self.phase {
            Phase::Active(state) => Some(state),
            _ => None,
        }
    }

    pub fn is_active(&self) -> bool {
        matches!(self.phase, Phase::Active(_))
    }

    pub fn is_terminated(&self) -> bool {
        matches!(self.phase, Phase::Terminated)
    }

    /// Start the machine in `initial` and follow its init chain
    ///
    /// `initial` receives `INIT`. A `Transition` answer is an initial
    /// transition: the target is entered (and its own init chain followed)
    /// without `initial` being exited.
    ///
    /// # Errors
    /// `AlreadyInitialized` if the machine is running. The current state
    /// is not modified in that case.
    pub fn init<C>(&mut self, ctx: &mut C, initial: S) -> Result<Status<S>>
    where
        S: State<C>,
    {
        if self.is_active() {
            return Err(report(Violation::AlreadyInitialized));
        }

        log::debug!("hsm: init in {:?}", initial);
        self.phase = Phase::Active(initial);

        match deliver(ctx, initial, Signal::INIT) {
            Status::Transition(target) => {
                let settled = self.enter_chain(ctx, target)?;
                Ok(Status::Transition(settled))
            }
            Status::Super(_) => Ok(Status::Handled),
            other => Ok(other),
        }
    }

    /// Stop the machine
    ///
    /// # Errors
    /// `NotInitialized` / `Terminated` if the machine is not running.
    pub fn terminate(&mut self) -> Result<()> {
        let state = self.active()?;
        log::debug!("hsm: terminate in {:?}", state);
        self.phase = Phase::Terminated;
        Ok(())
    }

    /// Dispatch `event` to the current state
    ///
    /// # Returns
    /// The status of the handler that claimed the event. For transitions
    /// this is `Transition(s)` where `s` is the state the init chain
    /// settled in.
    ///
    /// # Errors
    /// A contract violation if the machine is not running, the event
    /// signature is invalid, or the hierarchy exceeds [`MAX_NESTING`].
    pub fn dispatch<C>(&mut self, ctx: &mut C, event: &Event<S::Payload>) -> Result<Status<S>>
    where
        S: State<C>,
    {
        let leaf = self.active()?;
        if !event.is_valid() {
            return Err(report(Violation::BadSignature {
                signal: event.signal(),
            }));
        }

        log::trace!("hsm: dispatch {:?} in {:?}", event.signal(), leaf);

        let mut state = leaf;
        for _ in 0..MAX_NESTING {
            let status = if state == S::TOP {
                Status::Handled
            } else {
                state.handle(ctx, event)
            };

            match status {
                Status::Super(parent) => state = parent,
                Status::Transition(target) => {
                    log::debug!("hsm: {:?} -> {:?} on {:?}", leaf, target, event.signal());
                    exit_chain(ctx, leaf, state)?;

                    let (above, depth) = ancestry(ctx, state)?;
                    let above = &above[..depth];
                    if above.contains(&target) {
                        exit_chain(ctx, above[0], target)?;
                    } else {
                        enter_ancestors(ctx, above, target)?;
                    }
                    let settled = self.enter_chain(ctx, target)?;
                    return Ok(Status::Transition(settled));
                }
                other => return Ok(other),
            }
        }

        Err(report(Violation::NestingTooDeep { depth: MAX_NESTING }))
    }

    /// True if the current state is `state` or one of its substates
    pub fn is_in<C>(&self, ctx: &mut C, state: S) -> Result<bool>
    where
        S: State<C>,
    {
        let mut cursor = self.active()?;
        for _ in 0..MAX_NESTING {
            if cursor == state {
                return Ok(true);
            }
            match superstate(ctx, cursor) {
                Some(parent) => cursor = parent,
                None => return Ok(false),
            }
        }
        Err(report(Violation::NestingTooDeep { depth: MAX_NESTING }))
    }

    fn active(&self) -> Result<S> {
        match self.phase {
            Phase::Active(state) => Ok(state),
            Phase::Uninitialized => Err(report(Violation::NotInitialized)),
            Phase::Terminated => Err(report(Violation::Terminated)),
        }
    }

    fn enter_chain<C>(&mut self, ctx: &mut C, target: S) -> Result<S>
    where
        S: State<C>,
    {
        let mut target = target;
        for _ in 0..MAX_NESTING {
            self.phase = Phase::Active(target);
            log::trace!("hsm: enter {:?}", target);
            deliver(ctx, target, Signal::ENTRY);

            match deliver(ctx, target, Signal::INIT) {
                Status::Transition(next) => target = next,
                _ => return Ok(target),
            }
        }
        Err(report(Violation::NestingTooDeep { depth: MAX_NESTING }))
    }
}

/// Send `EXIT` to `leaf` and each ancestor up to and including `source`
fn exit_chain<C, S: State<C>>(ctx: &mut C, leaf: S, source: S) -> Result<()> {
    let mut state = leaf;
    for _ in 0..MAX_NESTING {
        if state == S::TOP {
            return Ok(());
        }
        log::trace!("hsm: exit {:?}", state);
        deliver(ctx, state, Signal::EXIT);
        if state == source {
            return Ok(());
        }
        match superstate(ctx, state) {
            Some(parent) => state = parent,
            None => return Ok(()),
        }
    }
    Err(report(Violation::NestingTooDeep { depth: MAX_NESTING }))
}

/// Strict ancestors of `state`, innermost first, ending with `TOP`
fn ancestry<C, S: State<C>>(ctx: &mut C, state: S) -> Result<([S; MAX_NESTING], usize)> {
    let mut chain = [S::TOP; MAX_NESTING];
    let mut depth = 0;
    let mut cursor = superstate(ctx, state);
    while let Some(parent) = cursor {
        if depth == MAX_NESTING {
            return Err(report(Violation::NestingTooDeep { depth: MAX_NESTING }));
        }
        chain[depth] = parent;
        depth += 1;
        cursor = superstate(ctx, parent);
    }
    Ok((chain, depth))
}

/// Send `ENTRY` to the ancestors of `target` not in `active`, outermost first
fn enter_ancestors<C, S: State<C>>(ctx: &mut C, active: &[S], target: S) -> Result<()> {
    let mut path = [S::TOP; MAX_NESTING];
    let mut depth = 0;
    let mut cursor = superstate(ctx, target);
    while let Some(parent) = cursor {
        if parent == S::TOP || active.contains(&parent) {
            break;
        }
        if depth == MAX_NESTING {
            return Err(report(Violation::NestingTooDeep { depth: MAX_NESTING }));
        }
        path[depth] = parent;
        depth += 1;
        cursor = superstate(ctx, parent);
    }

    for &state in path[..depth].iter().rev() {
        log::trace!("hsm: enter {:?}", state);
        deliver(ctx, state, Signal::ENTRY);
    }
    Ok(())
}

fn superstate<C, S: State<C>>(ctx: &mut C, state: S) -> Option<S> {
    if state == S::TOP {
        return None;
    }
    match state.handle(ctx, &Event::new(Signal::SUPER)) {
        Status::Super(parent) => Some(parent),
        _ => None,
    }
}

fn deliver<C, S: State<C>>(ctx: &mut C, state: S, signal: Signal) -> Status<S> {
    if state == S::TOP {
        return Status::Handled;
    }
    state.handle(ctx, &Event::new(signal))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{HsmError, EVENT_SIGNATURE};
    use std::vec::Vec;

    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    enum Demo {
        Top,
        Parent,
        Leaf,
        Other,
        Nested,
    }

    const GO: Signal = Signal::user(0);
    const PARENT_ONLY: Signal = Signal::user(1);
    const UNKNOWN: Signal = Signal::user(2);
    const BACK: Signal = Signal::user(3);
    const UP: Signal = Signal::user(4);

    #[derive(Default)]
    struct Trace(Vec<(Demo, Signal)>);

    impl State<Trace> for Demo {
        type Payload = ();
        const TOP: Self = Demo::Top;

        fn handle(self, trace: &mut Trace, event: &Event<()>) -> Status<Self> {
            if event.signal() != Signal::SUPER {
                trace.0.push((self, event.signal()));
            }
            match (self, event.signal()) {
                (Demo::Parent, PARENT_ONLY) => Status::Handled,
                (Demo::Parent, BACK) => Status::Transition(Demo::Leaf),
                (Demo::Parent, _) => Status::Super(Demo::Top),
                (Demo::Leaf, GO) => Status::Transition(Demo::Other),
                (Demo::Leaf, _) => Status::Super(Demo::Parent),
                (Demo::Other, Signal::INIT) => Status::Transition(Demo::Nested),
                (Demo::Other, _) => Status::Super(Demo::Top),
                (Demo::Nested, UP) => Status::Transition(Demo::Other),
                (Demo::Nested, _) => Status::Super(Demo::Other),
                (Demo::Top, _) => Status::Handled,
            }
        }
    }

    fn running() -> (Machine<Demo>, Trace) {
        let mut machine = Machine::new();
        let mut trace = Trace::default();
        machine.init(&mut trace, Demo::Leaf).unwrap();
        trace.0.clear();
        (machine, trace)
    }

    #[test]
    fn test_init_without_initial_transition() {
        let mut machine = Machine::new();
        let mut trace = Trace::default();

        let status = machine.init(&mut trace, Demo::Leaf).unwrap();
        assert_eq!(status, Status::Handled);
        assert_eq!(machine.current(), Some(Demo::Leaf));
        assert_eq!(trace.0, vec![(Demo::Leaf, Signal::INIT)]);
    }

    #[test]
    fn test_init_follows_init_chain() {
        let mut machine = Machine::new();
        let mut trace = Trace::default();

        let status = machine.init(&mut trace, Demo::Other).unwrap();
        assert_eq!(status, Status::Transition(Demo::Nested));
        assert_eq!(machine.current(), Some(Demo::Nested));
        assert_eq!(
            trace.0,
            vec![
                (Demo::Other, Signal::INIT),
                (Demo::Nested, Signal::ENTRY),
                (Demo::Nested, Signal::INIT),
            ]
        );
    }

    #[test]
    fn test_unhandled_event_bubbles_to_top() {
        let (mut machine, mut trace) = running();

        let status = machine.dispatch(&mut trace, &Event::new(UNKNOWN)).unwrap();
        assert_eq!(status, Status::Handled);
        assert_eq!(machine.current(), Some(Demo::Leaf));
        assert_eq!(trace.0, vec![(Demo::Leaf, UNKNOWN), (Demo::Parent, UNKNOWN)]);
    }

    #[test]
    fn test_superstate_handles_event() {
        let (mut machine, mut trace) = running();

        let status = machine.dispatch(&mut trace, &Event::new(PARENT_ONLY)).unwrap();
        assert_eq!(status, Status::Handled);
        assert_eq!(machine.current(), Some(Demo::Leaf));
    }

    #[test]
    fn test_transition_chaining_order() {
        let (mut machine, mut trace) = running();

        let status = machine.dispatch(&mut trace, &Event::new(GO)).unwrap();
        assert_eq!(status, Status::Transition(Demo::Nested));
        assert_eq!(machine.current(), Some(Demo::Nested));
        assert_eq!(
            trace.0,
            vec![
                (Demo::Leaf, GO),
                (Demo::Leaf, Signal::EXIT),
                (Demo::Other, Signal::ENTRY),
                (Demo::Other, Signal::INIT),
                (Demo::Nested, Signal::ENTRY),
                (Demo::Nested, Signal::INIT),
            ]
        );
    }

    #[test]
    fn test_transition_from_superstate_reenters_source() {
        let (mut machine, mut trace) = running();

        let status = machine.dispatch(&mut trace, &Event::new(BACK)).unwrap();
        assert_eq!(status, Status::Transition(Demo::Leaf));
        assert_eq!(
            trace.0,
            vec![
                (Demo::Leaf, BACK),
                (Demo::Parent, BACK),
                (Demo::Leaf, Signal::EXIT),
                (Demo::Parent, Signal::EXIT),
                (Demo::Parent, Signal::ENTRY),
                (Demo::Leaf, Signal::ENTRY),
                (Demo::Leaf, Signal::INIT),
            ]
        );
        assert!(machine.is_in(&mut trace, Demo::Parent).unwrap());
    }

    #[test]
    fn test_repeated_local_transitions_stay_balanced() {
        let (mut machine, mut trace) = running();

        for _ in 0..2 {
            machine.dispatch(&mut trace, &Event::new(BACK)).unwrap();
        }
        let count = |state: Demo, signal: Signal| {
            trace.0.iter().filter(|e| **e == (state, signal)).count()
        };
        assert_eq!(count(Demo::Parent, Signal::EXIT), 2);
        assert_eq!(count(Demo::Parent, Signal::ENTRY), 2);
        assert_eq!(count(Demo::Leaf, Signal::EXIT), 2);
        assert_eq!(count(Demo::Leaf, Signal::ENTRY), 2);
        assert_eq!(machine.current(), Some(Demo::Leaf));
    }

    #[test]
    fn test_transition_to_enclosing_state_exits_it() {
        let (mut machine, mut trace) = running();
        machine.dispatch(&mut trace, &Event::new(GO)).unwrap();
        trace.0.clear();

        let status = machine.dispatch(&mut trace, &Event::new(UP)).unwrap();
        assert_eq!(status, Status::Transition(Demo::Nested));
        assert_eq!(
            trace.0,
            vec![
                (Demo::Nested, UP),
                (Demo::Nested, Signal::EXIT),
                (Demo::Other, Signal::EXIT),
                (Demo::Other, Signal::ENTRY),
                (Demo::Other, Signal::INIT),
                (Demo::Nested, Signal::ENTRY),
                (Demo::Nested, Signal::INIT),
            ]
        );
    }

    #[test]
    fn test_is_in_walks_hierarchy() {
        let (machine, mut trace) = running();
        assert!(machine.is_in(&mut trace, Demo::Leaf).unwrap());
        assert!(machine.is_in(&mut trace, Demo::Parent).unwrap());
        assert!(!machine.is_in(&mut trace, Demo::Other).unwrap());
    }

    #[test]
    fn test_dispatch_before_init() {
        let mut machine: Machine<Demo> = Machine::new();
        let mut trace = Trace::default();

        let err = machine.dispatch(&mut trace, &Event::new(GO)).unwrap_err();
        assert_eq!(err, HsmError::ContractViolation(Violation::NotInitialized));
        assert!(trace.0.is_empty());
    }

    #[test]
    fn test_double_init_keeps_state() {
        let (mut machine, mut trace) = running();
        machine.dispatch(&mut trace, &Event::new(GO)).unwrap();

        let err = machine.init(&mut trace, Demo::Leaf).unwrap_err();
        assert_eq!(err, HsmError::ContractViolation(Violation::AlreadyInitialized));
        assert_eq!(machine.current(), Some(Demo::Nested));
    }

    #[test]
    fn test_terminate_pairing() {
        let mut machine: Machine<Demo> = Machine::new();
        let err = machine.terminate().unwrap_err();
        assert_eq!(err, HsmError::ContractViolation(Violation::NotInitialized));
        assert_eq!(machine.current(), None);

        let (mut machine, mut trace) = running();
        machine.terminate().unwrap();
        assert!(machine.is_terminated());
        assert_eq!(machine.current(), None);

        let err = machine.dispatch(&mut trace, &Event::new(GO)).unwrap_err();
        assert_eq!(err, HsmError::ContractViolation(Violation::Terminated));
        assert!(machine.terminate().is_err());
    }

    #[test]
    fn test_forged_event_rejected() {
        let (mut machine, mut trace) = running();
        let forged = Event::from_raw(GO, None, EVENT_SIGNATURE ^ 1);

        let err = machine.dispatch(&mut trace, &forged).unwrap_err();
        assert_eq!(
            err,
            HsmError::ContractViolation(Violation::BadSignature { signal: GO })
        );
        assert_eq!(machine.current(), Some(Demo::Leaf));
        assert!(trace.0.is_empty());
    }
}
