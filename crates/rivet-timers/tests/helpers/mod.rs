#![allow(dead_code)]

use std::cell::Cell;
use std::rc::Rc;

use rivet_platform::irq::IrqLine;

/// Records the line level, rising edges, and full pulses.
#[derive(Clone, Default)]
pub struct LineRecorder {
    level: Rc<Cell<bool>>,
    raises: Rc<Cell<u32>>,
}

impl LineRecorder {
    pub fn level(&self) -> bool {
        self.level.get()
    }

    pub fn raises(&self) -> u32 {
        self.raises.get()
    }
}

impl IrqLine for LineRecorder {
    fn set_level(&mut self, level: bool) {
        if level && !self.level.get() {
            self.raises.set(self.raises.get() + 1);
        }
        self.level.set(level);
    }
}
