//! Fleet registry
//!
//! The set of UARTs whose state machine has come up and not yet torn down.
//! Device FSMs register on init and unregister when terminating; the
//! management task and clients only observe it.

use std::collections::BTreeSet;
use std::sync::Arc;

use spin::Mutex;

/// Shared handle to the set of live UART ids
#[derive(Debug, Clone, Default)]
pub struct Fleet {
    live: Arc<Mutex<BTreeSet<u32>>>,
}

impl Fleet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `false` if `uart_id` was already registered
    pub fn register(&self, uart_id: u32) -> bool {
        let added = self.live.lock().insert(uart_id);
        if added {
            log::info!("fleet: UART {} registered", uart_id);
        } else {
            log::warn!("fleet: UART {} registered twice", uart_id);
        }
        added
    }

    /// Returns `false` if `uart_id` was not registered
    pub fn unregister(&self, uart_id: u32) -> bool {
        let removed = self.live.lock().remove(&uart_id);
        if removed {
            log::info!("fleet: UART {} unregistered", uart_id);
        }
        removed
    }

    pub fn contains(&self, uart_id: u32) -> bool {
        self.live.lock().contains(&uart_id)
    }

    pub fn len(&self) -> usize {
        self.live.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.live.lock().is_empty()
    }

    /// Registered ids in ascending order
    pub fn ids(&self) -> Vec<u32> {
        self.live.lock().iter().copied().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_register_unregister() {
        let fleet = Fleet::new();
        let view = fleet.clone();

        assert!(fleet.register(2));
        assert!(fleet.register(0));
        assert!(!fleet.register(2));
        assert_eq!(view.ids(), vec![0, 2]);

        assert!(fleet.unregister(2));
        assert!(!fleet.unregister(2));
        assert!(!view.contains(2));
        assert_eq!(view.len(), 1);
    }
}
