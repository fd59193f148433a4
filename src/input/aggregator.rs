//! Combines the live state of every connected controller into one keyboard
//! report.
use std::collections::BTreeSet;

use tokio::sync::mpsc::UnboundedSender;

use crate::drivers::hid_keyboard::hid_report::{KeyboardReport, MAX_KEYS};

use super::{keycode::KeycodeTable, mapping::MappingCache};

/// Build a keyboard report from a set of pressed key codes. Modifiers go
/// into the modifier byte; the lowest six other codes fill the key slots.
pub fn build_report(pressed: &BTreeSet<u8>, keycodes: &KeycodeTable) -> KeyboardReport {
    let mut report = KeyboardReport::default();
    let mut slot = 0;
    for code in pressed.iter() {
        if let Some(bit) = keycodes.modifier_bit(*code) {
            report.modifiers |= bit;
            continue;
        }
        if slot < MAX_KEYS {
            report.keys[slot] = *code;
            slot += 1;
        }
    }
    report
}

/// Aggregates device state through the resolved mappings and hands the
/// resulting report to the output sink.
#[derive(Debug)]
pub struct Aggregator {
    mappings: MappingCache,
    tx: UnboundedSender<KeyboardReport>,
}

impl Aggregator {
    pub fn new(mappings: MappingCache, tx: UnboundedSender<KeyboardReport>) -> Self {
        Self { mappings, tx }
    }

    /// Reload mappings if the registry changed. Returns true if they did.
    pub fn refresh(&mut self) -> bool {
        self.mappings.refresh()
    }

    /// Rebuild mappings after the registry was changed in memory
    pub fn invalidate(&mut self) {
        self.mappings.invalidate();
    }

    /// Compute the report for the given `(device id, bitmask)` states
    pub fn build<'a, I>(&mut self, states: I) -> KeyboardReport
    where
        I: IntoIterator<Item = (&'a str, u32)>,
    {
        self.mappings.refresh();

        let mut pressed = BTreeSet::new();
        for (device_id, state) in states {
            if state == 0 {
                continue;
            }
            let mapping = self.mappings.get(device_id);
            for (bit, code) in mapping.iter() {
                if *bit < 32 && state & (1 << *bit) != 0 {
                    pressed.insert(*code);
                }
            }
        }

        build_report(&pressed, self.mappings.keycodes())
    }

    /// Compute the report for the given states and send it to the output sink
    pub fn aggregate<'a, I>(&mut self, states: I) -> KeyboardReport
    where
        I: IntoIterator<Item = (&'a str, u32)>,
    {
        let report = self.build(states);
        log::debug!(
            "Aggregated report: modifiers={:#04x} keys={:02x?}",
            report.modifiers,
            report.keys
        );
        if let Err(e) = self.tx.send(report) {
            log::error!("Unable to send report to output: {e:?}");
        }
        report
    }
}
