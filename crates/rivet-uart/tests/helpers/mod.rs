#![allow(dead_code)]

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use rivet_platform::irq::IrqLine;
use rivet_uart::{CharBackend, Uart};

/// Records the line level and counts rising edges.
#[derive(Clone, Default)]
pub struct LevelRecorder {
    level: Rc<Cell<bool>>,
    raises: Rc<Cell<u32>>,
}

impl LevelRecorder {
    pub fn level(&self) -> bool {
        self.level.get()
    }

    pub fn raises(&self) -> u32 {
        self.raises.get()
    }
}

impl IrqLine for LevelRecorder {
    fn set_level(&mut self, level: bool) {
        if level && !self.level.get() {
            self.raises.set(self.raises.get() + 1);
        }
        self.level.set(level);
    }
}

/// Captures transmitted bytes and counts receive credits.
#[derive(Clone, Default)]
pub struct BackendRecorder {
    tx: Rc<RefCell<Vec<u8>>>,
    credits: Rc<Cell<u32>>,
}

impl BackendRecorder {
    pub fn tx(&self) -> Vec<u8> {
        self.tx.borrow().clone()
    }

    pub fn credits(&self) -> u32 {
        self.credits.get()
    }
}

impl CharBackend for BackendRecorder {
    fn write(&mut self, byte: u8) {
        self.tx.borrow_mut().push(byte);
    }

    fn accept_input(&mut self) {
        self.credits.set(self.credits.get() + 1);
    }
}

// Word-register MMIO offsets.
pub const RBR: u64 = 0x00;
pub const THR: u64 = 0x00;
pub const IER: u64 = 0x04;
pub const IIR: u64 = 0x08;
pub const FCR: u64 = 0x08;
pub const LCR: u64 = 0x0C;
pub const MCR: u64 = 0x10;
pub const LSR: u64 = 0x14;
pub const MSR: u64 = 0x18;
pub const USR: u64 = 0x7C;

pub fn uart() -> (Uart, LevelRecorder, BackendRecorder) {
    let irq = LevelRecorder::default();
    let backend = BackendRecorder::default();
    let uart = Uart::new(Box::new(irq.clone()), Box::new(backend.clone()));
    (uart, irq, backend)
}
