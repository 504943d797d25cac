//! Device: one UART, its state machine and its data path

use std::sync::Arc;

use crossbeam::channel::Sender;
use uart750_ddk::{DmaRequest, RegisterIo};
use uart750_hsm::{Machine, Status};

use crate::baud::BaudTable;
use crate::command::Command;
use crate::descriptor::ProtocolDescriptor;
use crate::error::Result;
use crate::fleet::Fleet;
use crate::fsm::{DeviceContext, DeviceState};
use crate::port::Port;
use crate::protocol::FifoSettings;

/// Per-device configuration
#[derive(Debug, Clone, Default)]
pub struct DeviceSettings {
    pub baud_table: BaudTable,
    pub fifo: FifoSettings,
    /// Line settings applied at bring-up
    pub protocol: ProtocolDescriptor,
}

/// Answer to a `GetParam` command
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParamReply {
    pub uart_id: u32,
    pub protocol: ProtocolDescriptor,
}

/// A UART under driver control
///
/// Owned by the management task. The [`Port`] is shared with interrupt
/// context through [`Device::port`].
pub struct Device<R: RegisterIo> {
    machine: Machine<DeviceState>,
    ctx: DeviceContext<R>,
}

impl<R: RegisterIo> Device<R> {
    /// Build the device and start its state machine
    ///
    /// The machine settles in `Idle` with the hardware reset and programmed
    /// with `settings.protocol`.
    ///
    /// # Errors
    /// Any non-soft bring-up failure (soft reset timeout, unsupported
    /// mode). The device is unregistered from `fleet` again in that case.
    /// Soft configuration errors are logged and the device is kept.
    pub fn attach(
        uart_id: u32,
        io: R,
        settings: DeviceSettings,
        fleet: Fleet,
        replies: Option<Sender<ParamReply>>,
    ) -> Result<Self> {
        let mut ctx = DeviceContext::new(uart_id, io, settings, fleet, replies);
        let mut machine = Machine::new();
        machine.init(&mut ctx, DeviceState::Init)?;

        if let Some(err) = ctx.take_error() {
            if !err.is_soft() {
                ctx.fleet.unregister(uart_id);
                return Err(err);
            }
        }

        log::info!(
            "uart{}: attached, {:?}, {} baud",
            uart_id,
            machine.current(),
            ctx.active.baud_rate
        );
        Ok(Self { machine, ctx })
    }

    /// Dispatch `command` into the state machine
    ///
    /// # Returns
    /// The engine status for the command.
    ///
    /// # Errors
    /// Contract violations from the engine, or the failure an action ran
    /// into. Soft errors mean the command was applied with substitutions.
    pub fn dispatch(&mut self, command: Command) -> Result<Status<DeviceState>> {
        let event = command.into_event();
        let status = self.machine.dispatch(&mut self.ctx, &event)?;
        log::debug!(
            "uart{}: {:?} -> {:?}, now {:?}",
            self.ctx.uart_id,
            command.id(),
            status,
            self.machine.current()
        );

        match self.ctx.take_error() {
            Some(err) => Err(err),
            None => Ok(status),
        }
    }

    /// Stop the state machine once it has reached `Terminating`
    pub fn terminate(&mut self) -> Result<()> {
        self.machine.terminate()?;
        Ok(())
    }

    pub fn uart_id(&self) -> u32 {
        self.ctx.uart_id
    }

    pub fn state(&self) -> Option<DeviceState> {
        self.machine.current()
    }

    pub fn is_terminating(&self) -> bool {
        self.state() == Some(DeviceState::Terminating)
    }

    pub fn is_terminated(&self) -> bool {
        self.machine.is_terminated()
    }

    pub fn is_open(&self) -> bool {
        self.ctx.port.is_open()
    }

    /// Line settings currently programmed
    pub fn protocol(&self) -> ProtocolDescriptor {
        self.ctx.active
    }

    pub fn port(&self) -> &Arc<Port<R>> {
        &self.ctx.port
    }

    /// DMA transfer requested by the last command, if any
    pub fn take_dma_request(&mut self) -> Option<DmaRequest> {
        self.ctx.take_dma()
    }
}
