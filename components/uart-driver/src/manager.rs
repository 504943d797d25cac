//! Management task
//!
//! # Purpose
//! Owns every attached [`Device`] and is the only place commands are
//! dispatched from, one at a time. Producers push encoded command records
//! into a bounded queue; the task validates each record, discards the
//! malformed ones (there is no reply path for them) and dispatches the rest
//! into the addressed device's state machine.
//!
//! # Integration Points
//! - [`Platform`] provides register blocks on attach, DMA on channel open,
//!   and gets the UART back on detach
//! - [`Fleet`] is shared with the device state machines
//! - `GetParam` answers go out on the reply channel handed back by
//!   [`DriverManager::new`]
//!
//! A device whose machine reaches `Terminating` is stopped and detached
//! right after the dispatch.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use crossbeam::channel::{self, Receiver, Sender};
use uart750_ddk::Platform;
use uart750_hsm::Status;

use crate::command::Command;
use crate::config::DriverConfig;
use crate::device::{Device, ParamReply};
use crate::error::{Result, UartError};
use crate::fleet::Fleet;
use crate::fsm::DeviceState;
use crate::port::Port;

/// Record counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ManagerStats {
    /// Commands handed to a device
    pub dispatched: u64,
    /// Records dropped by validation or addressed to no device
    pub discarded: u64,
    /// Dispatches that reported an error
    pub failed: u64,
}

pub struct DriverManager<P: Platform> {
    platform: P,
    config: DriverConfig,
    fleet: Fleet,
    devices: BTreeMap<u32, Device<P::Io>>,
    replies: Sender<ParamReply>,
    stats: ManagerStats,
}

impl<P: Platform> DriverManager<P> {
    /// Create a manager with no device attached
    ///
    /// # Returns
    /// The manager and the receiving end of the `GetParam` reply channel.
    /// The reply channel holds `queue_depth` answers; further ones are
    /// dropped until the receiver catches up.
    pub fn new(platform: P, config: DriverConfig) -> Result<(Self, Receiver<ParamReply>)> {
        config.validate()?;
        let (replies, reply_rx) = channel::bounded(config.queue_depth);
        let manager = Self {
            platform,
            config,
            fleet: Fleet::new(),
            devices: BTreeMap::new(),
            replies,
            stats: ManagerStats::default(),
        };
        Ok((manager, reply_rx))
    }

    /// Attach `uart_id` and bring it to `Idle`
    ///
    /// # Errors
    /// `DeviceExists`, a platform error, or a bring-up failure.
    pub fn attach(&mut self, uart_id: u32) -> Result<()> {
        if self.devices.contains_key(&uart_id) {
            return Err(UartError::DeviceExists { uart_id });
        }

        let io = self.platform.open(uart_id)?;
        let settings = self.config.device_settings(uart_id);
        match Device::attach(
            uart_id,
            io,
            settings,
            self.fleet.clone(),
            Some(self.replies.clone()),
        ) {
            Ok(device) => {
                self.devices.insert(uart_id, device);
                Ok(())
            }
            Err(err) => {
                self.platform.close(uart_id);
                Err(err)
            }
        }
    }

    /// Attach every `[[device]]` from the configuration
    ///
    /// Stops at the first failure.
    pub fn attach_configured(&mut self) -> Result<()> {
        let ids: Vec<u32> = self.config.devices.iter().map(|d| d.uart_id).collect();
        for uart_id in ids {
            self.attach(uart_id)?;
        }
        Ok(())
    }

    /// Validate and dispatch one command record
    ///
    /// # Errors
    /// The validation error for a discarded record, or whatever
    /// [`handle`](Self::handle) returns.
    pub fn handle_record(&mut self, record: &[u8]) -> Result<Status<DeviceState>> {
        match Command::decode(record) {
            Ok(command) => self.handle(command),
            Err(err) => {
                log::warn!("manager: discarding {}-byte record: {}", record.len(), err);
                self.stats.discarded += 1;
                Err(err)
            }
        }
    }

    /// Dispatch a validated command
    pub fn handle(&mut self, command: Command) -> Result<Status<DeviceState>> {
        let uart_id = command.uart_id();
        let Some(device) = self.devices.get_mut(&uart_id) else {
            log::warn!("manager: {:?} for unknown UART {}", command.id(), uart_id);
            self.stats.discarded += 1;
            return Err(UartError::UnknownDevice { uart_id });
        };

        self.stats.dispatched += 1;
        let result = device.dispatch(command);
        if result.is_err() {
            self.stats.failed += 1;
        }

        if let Some(request) = device.take_dma_request() {
            if let Err(err) = self.platform.start_dma(uart_id, request) {
                log::warn!("manager: UART {}: {}", uart_id, err);
            }
        }

        if device.is_terminating() {
            self.detach(uart_id)?;
        }
        result
    }

    fn detach(&mut self, uart_id: u32) -> Result<()> {
        if let Some(mut device) = self.devices.remove(&uart_id) {
            device.terminate()?;
            drop(device);
            self.platform.close(uart_id);
            log::info!("manager: UART {} detached", uart_id);
        }
        Ok(())
    }

    /// Serve records from `queue` until every sender is gone
    ///
    /// Errors are logged and the loop moves on; nothing here is fatal to
    /// the task.
    pub fn run(&mut self, queue: &Receiver<Vec<u8>>) {
        for record in queue.iter() {
            match self.handle_record(&record) {
                Ok(status) => log::trace!("manager: {:?}", status),
                Err(err) if err.is_soft() => log::warn!("manager: {}", err),
                Err(err) => log::error!("manager: {}", err),
            }
        }
        log::debug!("manager: command queue closed");
    }

    pub fn device(&self, uart_id: u32) -> Option<&Device<P::Io>> {
        self.devices.get(&uart_id)
    }

    /// Data path of `uart_id`, for interrupt context and clients
    pub fn port(&self, uart_id: u32) -> Option<Arc<Port<P::Io>>> {
        self.devices.get(&uart_id).map(|device| Arc::clone(device.port()))
    }

    /// Ids of attached devices
    pub fn attached(&self) -> Vec<u32> {
        self.devices.keys().copied().collect()
    }

    pub fn fleet(&self) -> &Fleet {
        &self.fleet
    }

    pub fn stats(&self) -> ManagerStats {
        self.stats
    }

    pub fn platform(&self) -> &P {
        &self.platform
    }

    pub fn platform_mut(&mut self) -> &mut P {
        &mut self.platform
    }
}

impl<P> DriverManager<P>
where
    P: Platform + Send + 'static,
    P::Io: 'static,
{
    /// Run the task on its own thread
    ///
    /// # Returns
    /// A sender for producers and the handle of the thread, which hands the
    /// manager back once every [`CommandSender`] has been dropped.
    pub fn spawn(mut self) -> (CommandSender, JoinHandle<Self>) {
        let (tx, rx) = channel::bounded(self.config.queue_depth);
        let handle = thread::spawn(move || {
            self.run(&rx);
            self
        });
        (CommandSender { queue: tx }, handle)
    }
}

/// Producer side of the command queue
#[derive(Clone)]
pub struct CommandSender {
    queue: Sender<Vec<u8>>,
}

impl CommandSender {
    /// Encode and queue `command`, blocking while the queue is full
    pub fn send(&self, command: &Command) -> Result<()> {
        self.send_record(command.encode()?)
    }

    /// Queue a raw record
    pub fn send_record(&self, record: Vec<u8>) -> Result<()> {
        self.queue.send(record).map_err(|_| UartError::QueueClosed)
    }
}

#[cfg(all(test, feature = "sim"))]
mod tests {
    use super::*;
    use crate::sim::SimPlatform;

    fn manager_with(ids: &[u32]) -> (DriverManager<SimPlatform>, Receiver<ParamReply>) {
        let mut platform = SimPlatform::new();
        for &id in ids {
            platform.add_uart(id);
        }
        DriverManager::new(platform, DriverConfig::default()).unwrap()
    }

    #[test]
    fn test_attach_twice_rejected() {
        let (mut manager, _replies) = manager_with(&[0]);
        manager.attach(0).unwrap();
        assert!(matches!(
            manager.attach(0),
            Err(UartError::DeviceExists { uart_id: 0 })
        ));
        assert_eq!(manager.attached(), vec![0]);
    }

    #[test]
    fn test_attach_unknown_uart() {
        let (mut manager, _replies) = manager_with(&[]);
        assert!(matches!(manager.attach(5), Err(UartError::Driver(_))));
        assert!(manager.fleet().is_empty());
    }

    #[test]
    fn test_command_for_unknown_device_discarded() {
        let (mut manager, _replies) = manager_with(&[0]);
        manager.attach(0).unwrap();

        let err = manager.handle(Command::ChannelOpen { uart_id: 9 }).unwrap_err();
        assert!(matches!(err, UartError::UnknownDevice { uart_id: 9 }));
        assert_eq!(manager.stats().discarded, 1);
        assert_eq!(manager.stats().dispatched, 0);
    }

    #[test]
    fn test_terminate_detaches() {
        let (mut manager, _replies) = manager_with(&[0, 1]);
        manager.attach(0).unwrap();
        manager.attach(1).unwrap();

        manager.handle(Command::Terminate { uart_id: 1 }).unwrap();
        assert_eq!(manager.attached(), vec![0]);
        assert_eq!(manager.fleet().ids(), vec![0]);
        assert_eq!(manager.platform().closed(), &[1]);
    }
}
