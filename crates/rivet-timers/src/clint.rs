//! CLINT-style core-local interruptor: a 64-bit RTC with one compare
//! register and a software-interrupt doorbell.
//!
//! Register map (4-byte aligned word accesses only):
//!
//! ```text
//! 0x0000  msip       write pulses the SWI line and latches 1
//! 0x4000  mtimecmp   low half
//! 0x4004  mtimecmp   high half
//! 0xBFF8  mtime      low half (read-only)
//! 0xBFFC  mtime      high half (read-only)
//! ```

use rivet_io_snapshot::state::codec::{Decoder, Encoder};
use rivet_io_snapshot::state::{
    IoSnapshot, SnapshotError, SnapshotReader, SnapshotVersion, SnapshotWriter,
};
use rivet_platform::clock::Clock;
use rivet_platform::irq::IrqLine;
use rivet_platform::time::TimerQueue;

use crate::DeviceTimer;

/// The RTC ticks at 10 MHz regardless of the core clock.
pub const RTC_FREQ_HZ: u64 = 10_000_000;

const NANOS_PER_SEC: u64 = 1_000_000_000;

pub struct Clint {
    clock: Box<dyn Clock>,
    msip: u32,
    mtimecmp: u64,
    msip_line: Box<dyn IrqLine>,
    mtip_line: Box<dyn IrqLine>,
}

impl Clint {
    pub fn new(
        clock: impl Clock + 'static,
        msip_line: Box<dyn IrqLine>,
        mtip_line: Box<dyn IrqLine>,
    ) -> Self {
        Self {
            clock: Box::new(clock),
            msip: 0,
            mtimecmp: 0,
            msip_line,
            mtip_line,
        }
    }

    /// Current RTC value in 10 MHz ticks.
    pub fn rtc(&self) -> u64 {
        (u128::from(self.clock.now_ns()) * u128::from(RTC_FREQ_HZ) / u128::from(NANOS_PER_SEC))
            as u64
    }

    /// A compare value in the past fires immediately; otherwise the one-shot
    /// deadline is (re)armed.
    fn write_timecmp(&mut self, value: u64, queue: &mut TimerQueue<DeviceTimer>) {
        self.mtimecmp = value;
        let rtc = self.rtc();
        if value <= rtc {
            queue.cancel(&DeviceTimer::ClintCompare);
            self.mtip_line.pulse();
        } else {
            let diff = value - rtc;
            let next_ns = self.clock.now_ns()
                + (u128::from(diff) * u128::from(NANOS_PER_SEC) / u128::from(RTC_FREQ_HZ)) as u64;
            queue.schedule(next_ns, DeviceTimer::ClintCompare);
        }
    }

    /// The compare deadline expired.
    pub fn handle_timer_event(&mut self, _deadline_ns: u64) {
        self.mtip_line.pulse();
    }

    /// Re-arm the compare deadline, e.g. after a snapshot restore.
    pub fn reschedule(&mut self, queue: &mut TimerQueue<DeviceTimer>) {
        let cmp = self.mtimecmp;
        if cmp > self.rtc() {
            self.write_timecmp(cmp, queue);
        }
    }

    pub fn mmio_read(&mut self, offset: u64, size: u32) -> u64 {
        if offset & 0x3 != 0 || size != 4 {
            tracing::warn!(target: "clint", "invalid read size {size}: {offset:#x}");
            return 0;
        }

        match offset {
            0x0 => u64::from(self.msip),
            0x4000 => self.mtimecmp & 0xFFFF_FFFF,
            0x4004 => (self.mtimecmp >> 32) & 0xFFFF_FFFF,
            0xbff8 => self.rtc() & 0xFFFF_FFFF,
            0xbffc => (self.rtc() >> 32) & 0xFFFF_FFFF,
            _ => {
                tracing::warn!(target: "clint", "invalid read: {offset:#x}");
                0
            }
        }
    }

    pub fn mmio_write(
        &mut self,
        offset: u64,
        size: u32,
        value: u64,
        queue: &mut TimerQueue<DeviceTimer>,
    ) {
        if offset & 0x3 != 0 || size != 4 {
            tracing::warn!(target: "clint", "invalid write size {size}: {offset:#x}");
            return;
        }

        match offset {
            0x0 => {
                self.msip_line.pulse();
                self.msip = 0x1;
            }
            0x4000 => {
                let hi = self.mtimecmp >> 32;
                self.write_timecmp(hi << 32 | (value & 0xFFFF_FFFF), queue);
            }
            0x4004 => {
                let lo = self.mtimecmp & 0xFFFF_FFFF;
                self.write_timecmp(value << 32 | lo, queue);
            }
            0xbff8 | 0xbffc => {
                tracing::warn!(target: "clint", "mtime write not implemented");
            }
            _ => {
                tracing::warn!(target: "clint", "invalid write: {offset:#x}");
            }
        }
    }
}

const TAG_STATE: u16 = 1;

impl IoSnapshot for Clint {
    const DEVICE_ID: [u8; 4] = *b"CLNT";
    const DEVICE_VERSION: SnapshotVersion = SnapshotVersion::new(1, 0);

    fn save_state(&self) -> Vec<u8> {
        let mut w = SnapshotWriter::new(Self::DEVICE_ID, Self::DEVICE_VERSION);
        w.field_bytes(
            TAG_STATE,
            Encoder::new().u32(self.msip).u64(self.mtimecmp).finish(),
        );
        w.finish()
    }

    fn load_state(&mut self, bytes: &[u8]) -> Result<(), SnapshotError> {
        let r = SnapshotReader::parse(bytes, Self::DEVICE_ID)?;
        let version = r.header().device_version;
        if version.major != Self::DEVICE_VERSION.major {
            return Err(SnapshotError::UnsupportedVersion(version));
        }
        let state = r
            .bytes(TAG_STATE)
            .ok_or(SnapshotError::InvalidFieldEncoding("missing clint state"))?;
        let mut d = Decoder::new(state);
        self.msip = d.u32()?;
        self.mtimecmp = d.u64()?;
        Ok(())
    }
}
