//! Notification payloads and listener slots.
//!
//! The engine raises three event kinds toward its caller: unit-status
//! (decoded power-line activity), controller-status (the interface's own
//! state buffer), and closed (the channel is gone). Each kind has exactly
//! one optional callback slot; re-registration silently replaces the
//! previous callback.

use serde::{Deserialize, Serialize};

use crate::codes::{Function, House, Unit};

/// One decoded unit-function event from the interface's event buffer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnitStatus {
    /// House code the event applies to.
    pub house: House,
    /// Function the power line carried.
    pub function: Function,
    /// Raw dim amount for dim/bright events (0..=210 as reported).
    pub dims: Option<u8>,
    /// Units addressed when the function was issued.
    pub units: Vec<Unit>,
}

/// The interface's decoded 14-byte status buffer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ControllerStatus {
    /// Minutes since the battery was last changed (0xFFFF after reset).
    pub battery_timer: u16,
    /// Interface clock: seconds.
    pub seconds: u8,
    /// Interface clock: minutes.
    pub minutes: u8,
    /// Interface clock: hours.
    pub hours: u8,
    /// Interface clock: day of year.
    pub year_day: u16,
    /// Weekday mask, one bit per day starting Sunday.
    pub weekday_mask: u8,
    /// House code the interface monitors.
    pub monitored_house: House,
    /// Firmware revision, low nibble of the house/revision byte.
    pub firmware_revision: u8,
    /// Bitmap of currently addressed units, indexed by unit wire code.
    pub addressed: u16,
    /// Bitmap of units the interface believes are on.
    pub on_mask: u16,
    /// Bitmap of units with a non-default dim level.
    pub dim_mask: u16,
}

impl ControllerStatus {
    /// Units currently addressed on the monitored house.
    pub fn addressed_units(&self) -> Vec<Unit> {
        units_from_mask(self.addressed)
    }

    /// Units the interface believes are on.
    pub fn on_units(&self) -> Vec<Unit> {
        units_from_mask(self.on_mask)
    }

    /// Units with a non-default dim level.
    pub fn dimmed_units(&self) -> Vec<Unit> {
        units_from_mask(self.dim_mask)
    }
}

/// Expand a status bitmap into units. Bit positions follow the 4-bit wire
/// encoding, not the unit number.
fn units_from_mask(mask: u16) -> Vec<Unit> {
    (0..16u8)
        .filter(|code| mask >> code & 1 == 1)
        .filter_map(Unit::from_code)
        .collect()
}

/// A notification staged by a transaction, dispatched by the engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Notification {
    Unit(UnitStatus),
    Controller(ControllerStatus),
}

/// Callback slots, one per event kind. Last registration wins.
#[derive(Default)]
pub(crate) struct Listeners {
    pub(crate) unit: Option<Box<dyn Fn(UnitStatus) + Send>>,
    pub(crate) controller: Option<Box<dyn Fn(ControllerStatus) + Send>>,
    pub(crate) closed: Option<Box<dyn Fn() + Send>>,
}

impl Listeners {
    /// Deliver a staged notification to its callback slot, if bound.
    pub(crate) fn dispatch(&self, notification: Notification) {
        match notification {
            Notification::Unit(status) => {
                if let Some(cb) = &self.unit {
                    cb(status);
                }
            }
            Notification::Controller(status) => {
                if let Some(cb) = &self.controller {
                    cb(status);
                }
            }
        }
    }

    /// Fire the closed callback, if bound.
    pub(crate) fn closed(&self) {
        if let Some(cb) = &self.closed {
            cb();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[test]
    fn test_units_from_mask() {
        // Unit 1 has code 0x6, unit 2 has code 0xE.
        let mask = 1u16 << 0x6 | 1 << 0xE;
        let units = units_from_mask(mask);
        assert_eq!(units, vec![Unit::new(1).unwrap(), Unit::new(2).unwrap()]);
    }

    #[test]
    fn test_units_from_mask_empty() {
        assert!(units_from_mask(0).is_empty());
    }

    #[test]
    fn test_dispatch_to_bound_slot() {
        let count = Arc::new(AtomicUsize::new(0));
        let seen = count.clone();
        let mut listeners = Listeners::default();
        listeners.unit = Some(Box::new(move |_| {
            seen.fetch_add(1, Ordering::SeqCst);
        }));

        listeners.dispatch(Notification::Unit(UnitStatus {
            house: House::A,
            function: Function::On,
            dims: None,
            units: vec![],
        }));
        assert_eq!(count.load(Ordering::SeqCst), 1);

        // Unbound controller slot: silently dropped.
        listeners.dispatch(Notification::Controller(ControllerStatus {
            battery_timer: 0,
            seconds: 0,
            minutes: 0,
            hours: 0,
            year_day: 1,
            weekday_mask: 1,
            monitored_house: House::A,
            firmware_revision: 1,
            addressed: 0,
            on_mask: 0,
            dim_mask: 0,
        }));
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_closed_without_slot_is_noop() {
        let listeners = Listeners::default();
        listeners.closed();
    }
}
