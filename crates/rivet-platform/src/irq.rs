//! Interrupt line plumbing.
//!
//! Devices own their output lines as `Box<dyn IrqLine>` so they can be wired
//! to an interrupt controller, a recorder in tests, or nothing at all without
//! the device knowing the difference.

/// A level-valued interrupt line from a device into an interrupt controller.
pub trait IrqLine {
    /// Drive the line to the given level. Repeating the current level is
    /// allowed; receivers decide whether that is meaningful.
    fn set_level(&mut self, level: bool);

    fn raise(&mut self) {
        self.set_level(true);
    }

    fn lower(&mut self) {
        self.set_level(false);
    }

    /// Momentary high pulse, for edge-style doorbells.
    fn pulse(&mut self) {
        self.raise();
        self.lower();
    }
}

/// An `IrqLine` that goes nowhere. Useful for optional outputs.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullIrqLine;

impl IrqLine for NullIrqLine {
    fn set_level(&mut self, _level: bool) {}
}
