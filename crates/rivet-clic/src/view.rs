//! Privilege-scoped MMIO views onto the shared CLIC state.
//!
//! A view owns nothing but its access mode and base address; every access
//! funnels into the one [`Clic`] with the view's mode driving the privilege
//! gate, the per-field `cliccfg` filtering, and the per-interrupt
//! visibility check. Multi-byte accesses into the per-interrupt aperture
//! decompose into byte-sized register accesses here, so a wide access can
//! span adjacent quartets and each byte is filtered for its own interrupt.

use std::cell::RefCell;
use std::rc::Rc;

use crate::regs::{CLIC_INTCTL_BASE, CLIC_INTTRIG_END, CLIC_INTTRIG_START};
use crate::{Clic, Privilege};

pub struct ClicView {
    clic: Rc<RefCell<Clic>>,
    mode: Privilege,
    base: u64,
}

impl ClicView {
    pub(crate) fn new(clic: Rc<RefCell<Clic>>, mode: Privilege, base: u64) -> Self {
        Self { clic, mode, base }
    }

    pub fn mode(&self) -> Privilege {
        self.mode
    }

    pub fn base(&self) -> u64 {
        self.base
    }

    /// Size of the register aperture this view decodes.
    pub fn size(&self) -> u64 {
        self.clic.borrow().aperture_size()
    }

    pub fn mmio_read(&self, offset: u64, size: u32) -> u64 {
        let clic = self.clic.borrow();
        if offset >= clic.aperture_size() {
            tracing::warn!(target: "clic", "invalid read: {offset:#x}");
            return 0;
        }
        if self.mode > clic.current_priv() {
            tracing::warn!(
                target: "clic",
                "invalid read of {} CLIC registers in {} mode",
                self.mode,
                clic.current_priv()
            );
            return 0;
        }

        if offset < CLIC_INTCTL_BASE {
            if offset % 4 != 0 {
                tracing::warn!(target: "clic", "invalid read: {offset:#x}");
                return 0;
            }
            let index = offset / 4;
            return match index {
                0 => u64::from(clic.read_cliccfg(self.mode)),
                CLIC_INTTRIG_START..=CLIC_INTTRIG_END => {
                    u64::from(clic.read_inttrig((index - CLIC_INTTRIG_START) as usize))
                }
                2 if clic.version_is_v0_8() => u64::from(clic.read_mintthresh()),
                _ => {
                    tracing::warn!(target: "clic", "invalid read: {offset:#x}");
                    0
                }
            };
        }

        let rel = offset - CLIC_INTCTL_BASE;
        let mut value = 0u64;
        for b in 0..u64::from(size.min(8)) {
            let byte_off = rel + b;
            let irq = (byte_off / 4) as u32;
            if irq >= clic.num_sources() {
                tracing::warn!(target: "clic", "invalid irq {irq}: {offset:#x}");
                break;
            }
            if !clic.check_visible(self.mode.bits(), irq) {
                continue;
            }
            value |= u64::from(clic.read_int_byte(irq, byte_off % 4)) << (8 * b);
        }
        value
    }

    pub fn mmio_write(&self, offset: u64, size: u32, value: u64) {
        let mut clic = self.clic.borrow_mut();
        if offset >= clic.aperture_size() {
            tracing::warn!(target: "clic", "invalid write: {offset:#x}");
            return;
        }
        if self.mode > clic.current_priv() {
            tracing::warn!(
                target: "clic",
                "invalid write to {} CLIC registers in {} mode",
                self.mode,
                clic.current_priv()
            );
            return;
        }

        if offset < CLIC_INTCTL_BASE {
            if offset % 4 != 0 {
                tracing::warn!(target: "clic", "invalid write: {offset:#x}");
                return;
            }
            let index = offset / 4;
            match index {
                0 => clic.write_cliccfg(self.mode, value as u32),
                CLIC_INTTRIG_START..=CLIC_INTTRIG_END => {
                    clic.write_inttrig((index - CLIC_INTTRIG_START) as usize, value as u32);
                }
                2 if clic.version_is_v0_8() => clic.write_mintthresh(value as u32),
                _ => {
                    tracing::warn!(target: "clic", "invalid write: {offset:#x}");
                }
            }
            return;
        }

        let rel = offset - CLIC_INTCTL_BASE;
        for b in 0..u64::from(size.min(8)) {
            let byte_off = rel + b;
            let irq = (byte_off / 4) as u32;
            if irq >= clic.num_sources() {
                tracing::warn!(target: "clic", "invalid irq {irq}: {offset:#x}");
                break;
            }
            if !clic.check_visible(self.mode.bits(), irq) {
                continue;
            }
            let byte = (value >> (8 * b)) as u8;
            match byte_off % 4 {
                0 => clic.write_intip(irq, byte),
                1 => clic.write_intie(irq, byte),
                2 => clic.write_intattr(irq, byte),
                3 => clic.write_intctl(irq, byte),
                _ => unreachable!(),
            }
        }
    }
}
