//! The sorted set of enabled interrupts.
//!
//! Enabled interrupts are kept sorted by `mode+level+priority`, with ties
//! broken by the higher interrupt number, so the delivery fast path can
//! linear-scan them in priority order. The compound key packs `intcfg`
//! above the interrupt number:
//!
//! ```text
//! 21:12  intcfg (mode | clicintctl)
//! 11:0   irq
//! ```

use std::collections::BTreeSet;

use crate::regs::{CLIC_INTCFG_MASK, CLIC_IRQ_BITS, CLIC_IRQ_MASK};

fn encode_key(intcfg: u16, irq: u32) -> u32 {
    u32::from(intcfg & CLIC_INTCFG_MASK) << CLIC_IRQ_BITS | (irq & CLIC_IRQ_MASK)
}

fn decode_key(key: u32) -> (u16, u32) {
    ((key >> CLIC_IRQ_BITS) as u16, key & CLIC_IRQ_MASK)
}

#[derive(Debug, Default)]
pub(crate) struct ActiveSet {
    keys: BTreeSet<u32>,
}

impl ActiveSet {
    /// Add a newly enabled interrupt. An interrupt must not be added twice.
    pub(crate) fn insert(&mut self, intcfg: u16, irq: u32) {
        let inserted = self.keys.insert(encode_key(intcfg, irq));
        assert!(inserted, "irq {irq} already in the active set");
    }

    /// Remove a disabled interrupt by number. The entry must exist.
    pub(crate) fn remove_irq(&mut self, irq: u32) {
        let key = self
            .keys
            .iter()
            .copied()
            .find(|&k| k & CLIC_IRQ_MASK == irq)
            .unwrap_or_else(|| panic!("irq {irq} missing from the active set"));
        self.keys.remove(&key);
    }

    pub(crate) fn clear(&mut self) {
        self.keys.clear();
    }

    /// Iterate `(intcfg, irq)` in descending priority order.
    pub(crate) fn iter_desc(&self) -> impl Iterator<Item = (u16, u32)> + '_ {
        self.keys.iter().rev().map(|&k| decode_key(k))
    }
}
