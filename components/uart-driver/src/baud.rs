//! Baud rate lookup
//!
//! The table is supplied by the platform: ordered `(baud, mode, divisor)`
//! triples ending in a sentinel whose baud is 0. Lookup is a linear scan
//! returning the first match and stopping at the sentinel, so a rate listed
//! after the sentinel is never found and neither is 0 itself.

use serde::{Deserialize, Serialize};

use crate::error::{Result, UartError};
use crate::regs::UartMode;

/// One row of the baud table
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BaudEntry {
    pub baud: u32,
    pub mode: UartMode,
    pub divisor: u16,
}

impl BaudEntry {
    pub const fn new(baud: u32, mode: UartMode, divisor: u16) -> Self {
        Self {
            baud,
            mode,
            divisor,
        }
    }

    pub const fn is_sentinel(&self) -> bool {
        self.baud == 0
    }
}

/// Table terminator
pub const SENTINEL: BaudEntry = BaudEntry::new(0, UartMode::Disable, 0);

/// Functional clock the default table is computed for
pub const DEFAULT_FCLK_HZ: u32 = 48_000_000;

/// Default platform table for a 48 MHz functional clock
#[rustfmt::skip]
pub static DEFAULT_TABLE: [BaudEntry; 19] = [
    BaudEntry::new(300,       UartMode::Uart16x, 10000),
    BaudEntry::new(600,       UartMode::Uart16x, 5000),
    BaudEntry::new(1200,      UartMode::Uart16x, 2500),
    BaudEntry::new(2400,      UartMode::Uart16x, 1250),
    BaudEntry::new(4800,      UartMode::Uart16x, 625),
    BaudEntry::new(9600,      UartMode::Uart16x, 313),
    BaudEntry::new(14400,     UartMode::Uart16x, 208),
    BaudEntry::new(19200,     UartMode::Uart16x, 156),
    BaudEntry::new(28800,     UartMode::Uart16x, 104),
    BaudEntry::new(38400,     UartMode::Uart16x, 78),
    BaudEntry::new(57600,     UartMode::Uart16x, 52),
    BaudEntry::new(115200,    UartMode::Uart16x, 26),
    BaudEntry::new(230400,    UartMode::Uart16x, 13),
    BaudEntry::new(460800,    UartMode::Uart13x, 8),
    BaudEntry::new(921600,    UartMode::Uart13x, 4),
    BaudEntry::new(1843200,   UartMode::Uart13x, 2),
    BaudEntry::new(3000000,   UartMode::Uart16x, 1),
    BaudEntry::new(3686400,   UartMode::Uart13x, 1),
    SENTINEL,
];

/// Find the `(mode, divisor)` pair for `baud`
///
/// # Errors
/// `InvalidBaudRate` if the rate is not listed before the sentinel.
pub fn lookup(table: &[BaudEntry], baud: u32) -> Result<(UartMode, u16)> {
    table
        .iter()
        .take_while(|entry| !entry.is_sentinel())
        .find(|entry| entry.baud == baud)
        .map(|entry| (entry.mode, entry.divisor))
        .ok_or(UartError::InvalidBaudRate { baud })
}

/// An owned, sentinel-terminated baud table
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BaudTable {
    entries: Vec<BaudEntry>,
}

impl Default for BaudTable {
    fn default() -> Self {
        Self::platform_default()
    }
}

impl BaudTable {
    /// The 48 MHz default table
    pub fn platform_default() -> Self {
        Self {
            entries: DEFAULT_TABLE.to_vec(),
        }
    }

    /// Build a table from `entries`, appending the sentinel
    ///
    /// Entries after an embedded sentinel are kept but unreachable, exactly
    /// as a platform-supplied table would behave.
    pub fn from_entries(entries: impl IntoIterator<Item = BaudEntry>) -> Self {
        let mut entries: Vec<BaudEntry> = entries.into_iter().collect();
        entries.push(SENTINEL);
        Self { entries }
    }

    /// Entries including the sentinel
    pub fn entries(&self) -> &[BaudEntry] {
        &self.entries
    }

    pub fn lookup(&self, baud: u32) -> Result<(UartMode, u16)> {
        lookup(&self.entries, baud)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup_returns_entry_at_index() {
        for entry in DEFAULT_TABLE.iter().filter(|e| !e.is_sentinel()) {
            assert_eq!(
                lookup(&DEFAULT_TABLE, entry.baud).unwrap(),
                (entry.mode, entry.divisor)
            );
        }
        assert_eq!(lookup(&DEFAULT_TABLE, 9600).unwrap(), (UartMode::Uart16x, 313));
    }

    #[test]
    fn test_lookup_absent_and_sentinel() {
        assert!(matches!(
            lookup(&DEFAULT_TABLE, 31250),
            Err(UartError::InvalidBaudRate { baud: 31250 })
        ));
        assert!(matches!(
            lookup(&DEFAULT_TABLE, 0),
            Err(UartError::InvalidBaudRate { baud: 0 })
        ));
    }

    #[test]
    fn test_lookup_first_match_stops_at_sentinel() {
        let table = [
            BaudEntry::new(9600, UartMode::Uart16x, 313),
            BaudEntry::new(9600, UartMode::Uart13x, 385),
            SENTINEL,
            BaudEntry::new(4800, UartMode::Uart16x, 625),
        ];
        assert_eq!(lookup(&table, 9600).unwrap(), (UartMode::Uart16x, 313));
        assert!(lookup(&table, 4800).is_err());
    }

    #[test]
    fn test_owned_table_appends_sentinel() {
        let table = BaudTable::from_entries([BaudEntry::new(31250, UartMode::Uart16x, 96)]);
        assert_eq!(table.entries().len(), 2);
        assert!(table.entries()[1].is_sentinel());
        assert_eq!(table.lookup(31250).unwrap(), (UartMode::Uart16x, 96));
        assert_eq!(BaudTable::default().entries(), &DEFAULT_TABLE[..]);
    }
}
