//! Driver configuration
//!
//! Loaded from TOML or built with `Default`:
//!
//! ```toml
//! default_baud = 115200
//! queue_depth = 16
//!
//! [fifo]
//! rx_trigger = 8
//! tx_trigger = 8
//! dma_mode = 1            # omit for no DMA
//!
//! [[baud_table]]          # optional, replaces the platform table
//! baud = 9600
//! mode = "uart16x"
//! divisor = 313
//!
//! [[device]]
//! uart_id = 0
//! baud = 9600             # optional, defaults to default_baud
//! ```

use std::collections::BTreeSet;

use serde::Deserialize;

use crate::baud::{BaudEntry, BaudTable};
use crate::descriptor::{ProtocolDescriptor, DEFAULT_BAUD};
use crate::device::DeviceSettings;
use crate::error::{Result, UartError};
use crate::protocol::FifoSettings;

/// FIFO and DMA section
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FifoConfig {
    pub rx_trigger: u8,
    pub tx_trigger: u8,
    pub dma_mode: Option<u8>,
}

impl Default for FifoConfig {
    fn default() -> Self {
        let fifo = FifoSettings::default();
        Self {
            rx_trigger: fifo.rx_trigger,
            tx_trigger: fifo.tx_trigger,
            dma_mode: fifo.dma_mode,
        }
    }
}

impl From<FifoConfig> for FifoSettings {
    fn from(config: FifoConfig) -> Self {
        Self {
            rx_trigger: config.rx_trigger,
            tx_trigger: config.tx_trigger,
            dma_mode: config.dma_mode,
        }
    }
}

/// A UART attached at start-up
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DeviceConfig {
    pub uart_id: u32,
    pub baud: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DriverConfig {
    pub default_baud: u32,
    /// Capacity of the command queue and of the reply channel
    pub queue_depth: usize,
    pub fifo: FifoConfig,
    pub baud_table: Option<Vec<BaudEntry>>,
    #[serde(rename = "device")]
    pub devices: Vec<DeviceConfig>,
}

impl Default for DriverConfig {
    fn default() -> Self {
        Self {
            default_baud: DEFAULT_BAUD,
            queue_depth: 16,
            fifo: FifoConfig::default(),
            baud_table: None,
            devices: Vec::new(),
        }
    }
}

impl DriverConfig {
    /// Parse and validate a TOML document
    pub fn from_toml(text: &str) -> Result<Self> {
        let config: DriverConfig = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// # Errors
    /// `Config` describing the first inconsistency found.
    pub fn validate(&self) -> Result<()> {
        if self.queue_depth == 0 {
            return Err(UartError::Config("queue_depth must be at least 1".into()));
        }
        if self.fifo.rx_trigger > 0x0F || self.fifo.tx_trigger > 0x0F {
            return Err(UartError::Config("DMA trigger levels are 4-bit values".into()));
        }
        if let Some(mode) = self.fifo.dma_mode {
            if mode > 3 {
                return Err(UartError::Config(format!("dma_mode {} out of range 0..=3", mode)));
            }
        }

        let table = self.baud_table();
        let mut seen = BTreeSet::new();
        for device in &self.devices {
            if !seen.insert(device.uart_id) {
                return Err(UartError::Config(format!(
                    "UART {} listed twice",
                    device.uart_id
                )));
            }
            let baud = device.baud.unwrap_or(self.default_baud);
            if table.lookup(baud).is_err() {
                return Err(UartError::Config(format!(
                    "UART {}: baud rate {} not in the baud table",
                    device.uart_id, baud
                )));
            }
        }
        Ok(())
    }

    /// The configured table, or the platform default
    pub fn baud_table(&self) -> BaudTable {
        match &self.baud_table {
            Some(entries) => BaudTable::from_entries(entries.iter().copied()),
            None => BaudTable::platform_default(),
        }
    }

    /// Settings for `uart_id`, using its `[[device]]` entry if there is one
    pub fn device_settings(&self, uart_id: u32) -> DeviceSettings {
        let baud = self
            .devices
            .iter()
            .find(|device| device.uart_id == uart_id)
            .and_then(|device| device.baud)
            .unwrap_or(self.default_baud);

        DeviceSettings {
            baud_table: self.baud_table(),
            fifo: self.fifo.into(),
            protocol: ProtocolDescriptor::with_baud(baud),
        }
    }
}
