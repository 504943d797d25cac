//! Integration tests for the hierarchical state machine engine
//!
//! These exercise the public API only: a three-level hierarchy, the
//! violation sink hook and malformed state graphs.

use std::sync::atomic::{AtomicUsize, Ordering};

use uart750_hsm::*;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Lamp {
    Top,
    Powered,
    Off,
    On,
    Dim,
    Broken,
}

const TOGGLE: Signal = Signal::user(0);
const UNPLUG: Signal = Signal::user(1);
const DIM: Signal = Signal::user(2);
const LOOP: Signal = Signal::user(3);

#[derive(Default)]
struct Panel {
    entries: usize,
    exits: usize,
    level: Option<u8>,
}

impl State<Panel> for Lamp {
    type Payload = u8;
    const TOP: Self = Lamp::Top;

    fn handle(self, panel: &mut Panel, event: &Event<u8>) -> Status<Self> {
        match event.signal() {
            Signal::ENTRY => panel.entries += 1,
            Signal::EXIT => panel.exits += 1,
            _ => {}
        }

        match self {
            Lamp::Top => Status::Handled,
            Lamp::Powered => match event.signal() {
                Signal::INIT => Status::Transition(Lamp::Off),
                UNPLUG => Status::Transition(Lamp::Top),
                _ => Status::Super(Lamp::Top),
            },
            Lamp::Off => match event.signal() {
                TOGGLE => Status::Transition(Lamp::On),
                _ => Status::Super(Lamp::Powered),
            },
            Lamp::On => match event.signal() {
                TOGGLE => Status::Transition(Lamp::Off),
                DIM => {
                    panel.level = event.payload().copied();
                    Status::Transition(Lamp::Dim)
                }
                _ => Status::Super(Lamp::Powered),
            },
            Lamp::Dim => match event.signal() {
                DIM => Status::Ignored,
                _ => Status::Super(Lamp::On),
            },
            // Superstate of itself: a malformed graph
            Lamp::Broken => Status::Super(Lamp::Broken),
        }
    }
}

#[test]
fn test_three_level_hierarchy() {
    let mut machine = Machine::new();
    let mut panel = Panel::default();

    machine.init(&mut panel, Lamp::Powered).unwrap();
    assert_eq!(machine.current(), Some(Lamp::Off));

    machine.dispatch(&mut panel, &Event::new(TOGGLE)).unwrap();
    assert_eq!(machine.current(), Some(Lamp::On));

    let status = machine
        .dispatch(&mut panel, &Event::with_payload(DIM, 40))
        .unwrap();
    assert_eq!(status, Status::Transition(Lamp::Dim));
    assert_eq!(panel.level, Some(40));

    // Dim reports Ignored for a repeated dim request; the engine passes it through
    let status = machine.dispatch(&mut panel, &Event::with_payload(DIM, 10)).unwrap();
    assert_eq!(status, Status::Ignored);
    assert_eq!(machine.current(), Some(Lamp::Dim));

    // TOGGLE bubbles from Dim to On, which transitions to Off
    machine.dispatch(&mut panel, &Event::new(TOGGLE)).unwrap();
    assert_eq!(machine.current(), Some(Lamp::Off));
    assert!(machine.is_in(&mut panel, Lamp::Powered).unwrap());
}

#[test]
fn test_empty_signal_reaches_top() {
    let mut machine = Machine::new();
    let mut panel = Panel::default();
    machine.init(&mut panel, Lamp::Powered).unwrap();

    let before = machine.current();
    let status = machine.dispatch(&mut panel, &Event::new(Signal::EMPTY)).unwrap();
    assert_eq!(status, Status::Handled);
    assert_eq!(machine.current(), before);
}

#[test]
fn test_self_referencing_superstate_is_a_violation() {
    let mut machine = Machine::new();
    let mut panel = Panel::default();
    machine.init(&mut panel, Lamp::Broken).unwrap();

    let err = machine.dispatch(&mut panel, &Event::new(LOOP)).unwrap_err();
    assert_eq!(
        err,
        HsmError::ContractViolation(Violation::NestingTooDeep { depth: MAX_NESTING })
    );
    assert_eq!(machine.current(), Some(Lamp::Broken));
}

static REPORTED: AtomicUsize = AtomicUsize::new(0);

fn counting_sink(_violation: &Violation) {
    REPORTED.fetch_add(1, Ordering::SeqCst);
}

#[test]
fn test_violation_sink_receives_reports() {
    set_violation_sink(counting_sink);
    let before = REPORTED.load(Ordering::SeqCst);

    let mut machine: Machine<Lamp> = Machine::new();
    assert!(machine.terminate().is_err());

    assert!(REPORTED.load(Ordering::SeqCst) > before);
}
