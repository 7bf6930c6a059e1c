#![allow(dead_code)]

use std::cell::RefCell;
use std::rc::Rc;

use rivet_clic::{Cause, Clic, ClicBlock, ClicConfig, Hart, InterruptLevels, Privilege};

pub const INTCTL_BASE: u64 = 0x1000;

pub fn intip_off(irq: u32) -> u64 {
    INTCTL_BASE + 4 * u64::from(irq)
}

pub fn intie_off(irq: u32) -> u64 {
    intip_off(irq) + 1
}

pub fn intattr_off(irq: u32) -> u64 {
    intip_off(irq) + 2
}

pub fn intctl_off(irq: u32) -> u64 {
    intip_off(irq) + 3
}

#[derive(Debug)]
pub struct HartState {
    pub privilege: Privilege,
    pub levels: InterruptLevels,
    pub causes: Vec<Cause>,
}

/// A recording CPU model: the CLIC queries privilege and thresholds from
/// the shared state and every posted interrupt is captured for assertions.
#[derive(Clone)]
pub struct TestHart {
    state: Rc<RefCell<HartState>>,
}

impl TestHart {
    pub fn new() -> Self {
        Self {
            state: Rc::new(RefCell::new(HartState {
                privilege: Privilege::Machine,
                levels: InterruptLevels::default(),
                causes: Vec::new(),
            })),
        }
    }

    pub fn set_priv(&self, privilege: Privilege) {
        self.state.borrow_mut().privilege = privilege;
    }

    pub fn set_levels(&self, levels: InterruptLevels) {
        self.state.borrow_mut().levels = levels;
    }

    pub fn set_mil(&self, mil: u8) {
        self.state.borrow_mut().levels.mil = mil;
    }

    pub fn causes(&self) -> Vec<Cause> {
        self.state.borrow().causes.clone()
    }

    pub fn take_causes(&self) -> Vec<Cause> {
        std::mem::take(&mut self.state.borrow_mut().causes)
    }

    pub fn last_cause(&self) -> Option<Cause> {
        self.state.borrow().causes.last().copied()
    }
}

impl Hart for TestHart {
    fn current_priv(&self) -> Privilege {
        self.state.borrow().privilege
    }

    fn interrupt_levels(&self) -> InterruptLevels {
        self.state.borrow().levels
    }

    fn raise_interrupt(&mut self, cause: Cause) {
        self.state.borrow_mut().causes.push(cause);
    }
}

pub fn create(cfg: ClicConfig) -> (ClicBlock, TestHart) {
    let hart = TestHart::new();
    let block = Clic::create(cfg, Box::new(hart.clone()));
    (block, hart)
}
