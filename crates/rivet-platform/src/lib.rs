//! Shared plumbing for the rivet device models: interrupt lines, clocks, and
//! the deadline-ordered timer queue the platform pumps between instruction
//! slices.

pub mod clock;
pub mod irq;
pub mod time;
