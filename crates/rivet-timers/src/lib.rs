//! Core-local timer devices: a CLINT-style RTC/compare block and a
//! four-channel down-counting timer.
//!
//! Both devices keep time against the platform [`Clock`](rivet_platform::clock::Clock)
//! and schedule their expirations as [`DeviceTimer`] payloads in the shared
//! [`TimerQueue`](rivet_platform::time::TimerQueue); the platform pops due
//! events and routes them back to `handle_timer_event`.

pub mod clint;
pub mod quad;

pub use clint::Clint;
pub use quad::{QuadTimer, QuadTimerConfig};

/// Timer-queue payloads for this crate's devices.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DeviceTimer {
    ClintCompare,
    QuadChannel(usize),
}
