//! Adapter from the platform's [`IrqLine`] onto a CLIC input.

use std::cell::RefCell;
use std::rc::Rc;

use rivet_platform::irq::IrqLine;

use crate::Clic;

/// An [`IrqLine`] that drives one CLIC interrupt input, so device output
/// lines wire straight into the controller.
#[derive(Clone)]
pub struct ClicInputLine {
    clic: Rc<RefCell<Clic>>,
    irq: u32,
}

impl ClicInputLine {
    pub fn new(clic: Rc<RefCell<Clic>>, irq: u32) -> Self {
        Self { clic, irq }
    }
}

impl IrqLine for ClicInputLine {
    fn set_level(&mut self, level: bool) {
        self.clic.borrow_mut().set_irq_line(self.irq, level);
    }
}
