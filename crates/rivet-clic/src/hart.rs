//! The coupling between the CLIC and its hart's CPU model.

use std::fmt;

use crate::cause::Cause;
use crate::regs::{PRV_M, PRV_S, PRV_U};

/// RISC-V privilege modes, ordered U < S < M.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum Privilege {
    User = 0,
    Supervisor = 1,
    Machine = 3,
}

impl Privilege {
    pub const fn bits(self) -> u8 {
        self as u8
    }

    /// Decode a 2-bit mode field; `0b10` is reserved.
    pub fn from_bits(bits: u8) -> Option<Self> {
        match bits {
            PRV_U => Some(Privilege::User),
            PRV_S => Some(Privilege::Supervisor),
            PRV_M => Some(Privilege::Machine),
            _ => None,
        }
    }
}

impl fmt::Display for Privilege {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Privilege::User => "PRV_U",
            Privilege::Supervisor => "PRV_S",
            Privilege::Machine => "PRV_M",
        })
    }
}

/// Per-mode interrupt-level thresholds sampled from the hart's
/// `mintstatus` CSR.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct InterruptLevels {
    pub uil: u8,
    pub sil: u8,
    pub mil: u8,
}

/// The CLIC's view of its hart.
///
/// Arbitration reads the running privilege and the CSR-side interrupt-level
/// thresholds, and posts the winning interrupt with its encoded cause. The
/// CPU model samples the cause when it takes the interrupt; the CLIC never
/// lowers the line itself.
pub trait Hart {
    fn current_priv(&self) -> Privilege;
    fn interrupt_levels(&self) -> InterruptLevels;
    fn raise_interrupt(&mut self, cause: Cause);
}
