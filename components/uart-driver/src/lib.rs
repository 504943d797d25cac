//! 16C750 / OMAP UART driver
//!
//! # Purpose
//! Register-level driver for 16C750-compatible UARTs:
//! - a mode-switch protocol engine that programs line settings, FIFOs, DMA
//!   thresholds and resets through the CONFIG_A / CONFIG_B register banks
//! - a hierarchical device state machine sequencing bring-up, channel
//!   open/close, reconfiguration and teardown
//! - a management task dispatching validated control commands serially
//! - an interrupt-driven data path with RX/TX rings
//!
//! # Integration Points
//! - Depends on: `uart750-hsm` (state machine engine), `uart750-ddk`
//!   (register access, platform collaborator)
//! - Provides to: platform glue (attaches devices, forwards interrupts to
//!   [`Port::service_interrupt`]) and command producers
//!
//! # Architecture
//! ```text
//! producers ──records──> DriverManager ──Command──> Device (Machine<DeviceState>)
//!                                                      │ entry/actions
//!                                                      v
//!                        IRQ ──> Port ──────────> protocol engine ──> RegisterIo
//! ```
//!
//! # Testing Strategy
//! - Unit tests: register map, baud lookup, command codec, configuration
//! - Simulator tests (`sim` feature): protocol sequences against a
//!   behavioural 16C750 model, device lifecycle, management task

pub mod baud;
pub mod command;
pub mod config;
pub mod descriptor;
pub mod device;
pub mod error;
pub mod fleet;
pub mod fsm;
pub mod ier;
pub mod manager;
pub mod port;
pub mod protocol;
pub mod regs;
pub mod ring_buffer;

#[cfg(feature = "sim")]
pub mod sim;

pub use baud::{BaudEntry, BaudTable};
pub use command::{Command, CommandId, COMMAND_SIGNATURE};
pub use config::DriverConfig;
pub use descriptor::{DataBits, Parity, ProtocolDescriptor, StopBits};
pub use device::{Device, DeviceSettings, ParamReply};
pub use error::{Result, UartError};
pub use fleet::Fleet;
pub use fsm::DeviceState;
pub use ier::IerShadow;
pub use manager::{CommandSender, DriverManager, ManagerStats};
pub use port::{IsrReport, Port};
pub use protocol::FifoSettings;
pub use regs::{ConfigMode, UartMode};
