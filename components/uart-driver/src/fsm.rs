//! Device state machine
//!
//! ```text
//!   Top
//!    ├── Init          INIT: register with the fleet, -> Idle
//!    ├── Idle          ENTRY: bring the hardware up
//!    │                 Terminate: -> Terminating
//!    │                 ChannelOpen / ChannelClose / SetParam / GetParam:
//!    │                   handled in place
//!    └── Terminating   ENTRY: mask interrupts, unregister from the fleet
//! ```
//!
//! Everything a state does not claim goes to `Top`, which swallows it.
//! Handlers cannot return errors through the engine; they park them in the
//! context and [`Device`](crate::device::Device) hands them to the caller
//! after the dispatch.

use std::sync::Arc;

use crossbeam::channel::{Sender, TrySendError};
use uart750_ddk::{DmaDirection, DmaRequest, RegisterIo};
use uart750_hsm::{Event, Signal, State, Status};

use crate::command::{Command, CommandId};
use crate::descriptor::ProtocolDescriptor;
use crate::device::{DeviceSettings, ParamReply};
use crate::error::{Result, UartError};
use crate::fleet::Fleet;
use crate::port::Port;
use crate::protocol;
use crate::regs::{Ier, FIFO_DEPTH};

const TERMINATE: Signal = CommandId::Terminate.signal();
const CHANNEL_OPEN: Signal = CommandId::ChannelOpen.signal();
const CHANNEL_CLOSE: Signal = CommandId::ChannelClose.signal();
const GET_PARAM: Signal = CommandId::GetParam.signal();
const SET_PARAM: Signal = CommandId::SetParam.signal();

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceState {
    Top,
    Init,
    Idle,
    Terminating,
}

/// Everything the device states act on
pub struct DeviceContext<R: RegisterIo> {
    pub(crate) uart_id: u32,
    pub(crate) port: Arc<Port<R>>,
    pub(crate) fleet: Fleet,
    pub(crate) settings: DeviceSettings,
    pub(crate) active: ProtocolDescriptor,
    pub(crate) replies: Option<Sender<ParamReply>>,
    dma: Option<DmaRequest>,
    error: Option<UartError>,
}

impl<R: RegisterIo> DeviceContext<R> {
    pub(crate) fn new(
        uart_id: u32,
        io: R,
        settings: DeviceSettings,
        fleet: Fleet,
        replies: Option<Sender<ParamReply>>,
    ) -> Self {
        Self {
            uart_id,
            port: Arc::new(Port::new(io)),
            fleet,
            active: settings.protocol,
            settings,
            replies,
            dma: None,
            error: None,
        }
    }

    pub(crate) fn take_error(&mut self) -> Option<UartError> {
        self.error.take()
    }

    pub(crate) fn take_dma(&mut self) -> Option<DmaRequest> {
        self.dma.take()
    }

    fn fail(&mut self, err: UartError) {
        if err.is_soft() {
            log::warn!("uart{}: {}", self.uart_id, err);
        } else {
            log::error!("uart{}: {}", self.uart_id, err);
        }
        self.error = Some(err);
    }

    /// Record the outcome of a `set_protocol` run for `requested`
    fn protocol_applied(&mut self, requested: ProtocolDescriptor, outcome: Result<()>) {
        match outcome {
            Ok(()) => self.active = requested.effective(),
            Err(err) if err.is_soft() => {
                self.active = requested.effective();
                self.fail(err);
            }
            Err(err) => self.fail(err),
        }
    }

    fn bring_up(&mut self) {
        let requested = self.settings.protocol;
        let settings = &self.settings;
        let port = &self.port;

        let outcome = port.with_bank(|io, ier| -> Result<()> {
            protocol::soft_reset(io)?;
            // The reset cleared IER behind the shadow's back.
            ier.clear(io);
            protocol::set_enhanced_mode(io, true)?;
            port.set_fcr(protocol::init_fifo_and_dma(io, &settings.fifo)?);
            protocol::set_protocol(io, ier, settings.baud_table.entries(), &requested)
        });
        self.protocol_applied(requested, outcome);
    }

    fn open_channel(&mut self) {
        let requested = self.active;
        let settings = &self.settings;
        let port = &self.port;

        let outcome = port.with_bank(|io, ier| -> Result<()> {
            port.set_fcr(protocol::init_fifo_and_dma(io, &settings.fifo)?);
            let applied = protocol::set_protocol(io, ier, settings.baud_table.entries(), &requested);
            ier.enable(io, Ier::RHR | Ier::LINE_STS);
            applied
        });
        port.clear_rings();
        self.protocol_applied(requested, outcome);

        if self.settings.fifo.dma_mode.is_some() {
            self.dma = Some(DmaRequest {
                direction: DmaDirection::FromDevice,
                len: usize::from(FIFO_DEPTH),
            });
        }
        self.port.set_open(true);
        log::info!("uart{}: channel open", self.uart_id);
    }

    fn close_channel(&mut self) {
        let port = &self.port;
        let outcome = port.with_bank(|io, ier| -> Result<()> {
            let fcr = port.fcr();
            protocol::flush_tx(io, fcr)?;
            protocol::flush_rx(io, fcr)?;
            ier.clear(io);
            Ok(())
        });
        port.clear_rings();
        if let Err(err) = outcome {
            self.fail(err);
        }
        self.port.set_open(false);
        log::info!("uart{}: channel closed", self.uart_id);
    }

    fn set_param(&mut self, requested: ProtocolDescriptor) {
        let table = self.settings.baud_table.entries();
        let port = &self.port;
        let outcome = port.with_bank(|io, ier| {
            let applied = protocol::set_protocol(io, ier, table, &requested);
            // set_protocol leaves only RX armed.
            let sources = channel_sources(port);
            if !sources.is_empty() {
                ier.enable(io, sources);
            }
            applied
        });
        self.protocol_applied(requested, outcome);
    }

    fn get_param(&mut self) {
        let reply = ParamReply {
            uart_id: self.uart_id,
            protocol: self.active,
        };
        match &self.replies {
            Some(replies) => match replies.try_send(reply) {
                Ok(()) => {}
                Err(TrySendError::Full(_)) => {
                    log::warn!("uart{}: GetParam reply dropped, reply queue full", self.uart_id)
                }
                Err(TrySendError::Disconnected(_)) => {
                    log::warn!("uart{}: GetParam reply dropped, no receiver", self.uart_id)
                }
            },
            None => log::warn!("uart{}: GetParam without a reply channel", self.uart_id),
        }
    }

    fn shut_down(&mut self) {
        self.port.with_bank(|io, ier| ier.clear(io));
        self.port.set_open(false);
        self.fleet.unregister(self.uart_id);
    }
}

/// Interrupt sources an open channel needs beyond RX
fn channel_sources<R: RegisterIo>(port: &Port<R>) -> Ier {
    let mut sources = Ier::empty();
    if port.is_open() {
        sources |= Ier::LINE_STS;
        if port.tx_pending() > 0 {
            sources |= Ier::THR;
        }
    }
    sources
}

impl<R: RegisterIo> State<DeviceContext<R>> for DeviceState {
    type Payload = Command;
    const TOP: Self = DeviceState::Top;

    fn handle(self, ctx: &mut DeviceContext<R>, event: &Event<Command>) -> Status<Self> {
        match self {
            DeviceState::Top => Status::Handled,
            DeviceState::Init => init(ctx, event),
            DeviceState::Idle => idle(ctx, event),
            DeviceState::Terminating => terminating(ctx, event),
        }
    }
}

fn init<R: RegisterIo>(ctx: &mut DeviceContext<R>, event: &Event<Command>) -> Status<DeviceState> {
    match event.signal() {
        Signal::INIT => {
            ctx.fleet.register(ctx.uart_id);
            Status::Transition(DeviceState::Idle)
        }
        _ => Status::Super(DeviceState::Top),
    }
}

fn idle<R: RegisterIo>(ctx: &mut DeviceContext<R>, event: &Event<Command>) -> Status<DeviceState> {
    match event.signal() {
        Signal::ENTRY => {
            ctx.bring_up();
            Status::Handled
        }
        TERMINATE => Status::Transition(DeviceState::Terminating),
        CHANNEL_OPEN => {
            ctx.open_channel();
            Status::Handled
        }
        CHANNEL_CLOSE => {
            ctx.close_channel();
            Status::Handled
        }
        SET_PARAM => match event.payload() {
            Some(Command::SetParam { protocol, .. }) => {
                ctx.set_param(*protocol);
                Status::Handled
            }
            _ => {
                log::warn!("uart{}: SetParam without parameters", ctx.uart_id);
                Status::Ignored
            }
        },
        GET_PARAM => {
            ctx.get_param();
            Status::Handled
        }
        _ => Status::Super(DeviceState::Top),
    }
}

fn terminating<R: RegisterIo>(
    ctx: &mut DeviceContext<R>,
    event: &Event<Command>,
) -> Status<DeviceState> {
    match event.signal() {
        Signal::ENTRY => {
            ctx.shut_down();
            Status::Handled
        }
        _ => Status::Super(DeviceState::Top),
    }
}
