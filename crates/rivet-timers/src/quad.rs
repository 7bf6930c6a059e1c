//! Four-channel down-counting timer block.
//!
//! Each channel occupies a 0x14-byte stride:
//!
//! ```text
//! +0x00  LoadCount
//! +0x04  CurrentValue (read-only)
//! +0x08  ControlReg   {enable, mode, ie-mask, clock-src}
//! +0x0C  EOI          (read clears the latched interrupt)
//! +0x10  IntStatus    (masked)
//! ```
//!
//! An aggregate block sits at channel slot 8: masked status, global EOI,
//! and raw status words. The interrupt-enable control bit is a mask: a
//! channel's line is high only while its latched level is set and the mask
//! bit is clear.

use bitflags::bitflags;
use rivet_io_snapshot::state::codec::{Decoder, Encoder};
use rivet_io_snapshot::state::{
    IoSnapshot, SnapshotError, SnapshotReader, SnapshotVersion, SnapshotWriter,
};
use rivet_platform::clock::Clock;
use rivet_platform::irq::IrqLine;
use rivet_platform::time::TimerQueue;

use crate::DeviceTimer;

pub const NUM_CHANNELS: usize = 4;
pub const CHANNEL_STRIDE: u64 = 0x14;
/// Channel slot holding the aggregate registers.
const AGGREGATE_SLOT: u64 = 8;

const NANOS_PER_SEC: u64 = 1_000_000_000;

bitflags! {
    #[derive(Clone, Copy, Debug, PartialEq, Eq)]
    pub struct TimerControl: u32 {
        const ENABLE = 1 << 0;
        const MODE = 1 << 1;
        /// Interrupt mask: set suppresses the output line.
        const IE = 1 << 2;
        const CLOCK = 1 << 3;
    }
}

/// Construction-time parameters. The tick frequency applies to all four
/// channels.
#[derive(Clone, Copy, Debug)]
pub struct QuadTimerConfig {
    pub freq_hz: u32,
}

impl Default for QuadTimerConfig {
    fn default() -> Self {
        Self {
            freq_hz: 1_000_000_000,
        }
    }
}

#[derive(Clone, Copy, Debug, Default)]
struct Channel {
    control: u32,
    limit: u32,
    int_level: bool,
    running: bool,
    start_ns: u64,
    count_at_stop: u32,
}

pub struct QuadTimer {
    cfg: QuadTimerConfig,
    clock: Box<dyn Clock>,
    channels: [Channel; NUM_CHANNELS],
    lines: [Box<dyn IrqLine>; NUM_CHANNELS],
}

impl QuadTimer {
    pub fn new(
        cfg: QuadTimerConfig,
        clock: impl Clock + 'static,
        lines: [Box<dyn IrqLine>; NUM_CHANNELS],
    ) -> Self {
        assert!(cfg.freq_hz > 0, "timer: zero tick frequency");
        Self {
            cfg,
            clock: Box::new(clock),
            channels: [Channel::default(); NUM_CHANNELS],
            lines,
        }
    }

    fn period_ns(&self, ticks: u32) -> u64 {
        (u128::from(ticks) * u128::from(NANOS_PER_SEC) / u128::from(self.cfg.freq_hz)) as u64
    }

    fn control(&self, ch: usize) -> TimerControl {
        TimerControl::from_bits_retain(self.channels[ch].control)
    }

    /// The count a reload loads. Free-running and one-shot modes both
    /// reload the programmed limit.
    fn reload_limit(&self, ch: usize) -> u32 {
        self.channels[ch].limit
    }

    fn masked_level(&self, ch: usize) -> bool {
        self.channels[ch].int_level && !self.control(ch).contains(TimerControl::IE)
    }

    fn update_irq(&mut self, ch: usize) {
        let level = self.masked_level(ch);
        self.lines[ch].set_level(level);
    }

    /// Current down-counter value.
    pub fn current(&self, ch: usize) -> u32 {
        let c = &self.channels[ch];
        if !c.running {
            return c.count_at_stop;
        }
        let limit = self.reload_limit(ch);
        if limit == 0 {
            return 0;
        }
        let elapsed_ns = self.clock.now_ns() - c.start_ns;
        let elapsed_ticks =
            u128::from(elapsed_ns) * u128::from(self.cfg.freq_hz) / u128::from(NANOS_PER_SEC);
        limit - (elapsed_ticks % u128::from(limit)) as u32
    }

    fn start(&mut self, ch: usize, queue: &mut TimerQueue<DeviceTimer>) {
        let limit = self.reload_limit(ch);
        self.channels[ch].running = true;
        self.channels[ch].start_ns = self.clock.now_ns();
        if limit > 0 {
            queue.schedule(
                self.clock.now_ns() + self.period_ns(limit),
                DeviceTimer::QuadChannel(ch),
            );
        }
    }

    fn stop(&mut self, ch: usize, queue: &mut TimerQueue<DeviceTimer>) {
        self.channels[ch].count_at_stop = self.current(ch);
        self.channels[ch].running = false;
        queue.cancel(&DeviceTimer::QuadChannel(ch));
    }

    /// A channel's deadline expired: reload, latch the level, keep counting.
    pub fn handle_timer_event(
        &mut self,
        ch: usize,
        deadline_ns: u64,
        queue: &mut TimerQueue<DeviceTimer>,
    ) {
        let limit = self.reload_limit(ch);
        self.channels[ch].start_ns = deadline_ns;
        if limit > 0 {
            queue.schedule(deadline_ns + self.period_ns(limit), DeviceTimer::QuadChannel(ch));
        }
        self.channels[ch].int_level = true;
        self.update_irq(ch);
    }

    /// Re-arm running channels, e.g. after a snapshot restore.
    pub fn reschedule(&mut self, queue: &mut TimerQueue<DeviceTimer>) {
        for ch in 0..NUM_CHANNELS {
            if !self.control(ch).contains(TimerControl::ENABLE) {
                continue;
            }
            let remaining = self.channels[ch].count_at_stop;
            let limit = self.reload_limit(ch);
            self.channels[ch].running = true;
            self.channels[ch].start_ns = self
                .clock
                .now_ns()
                .saturating_sub(self.period_ns(limit.saturating_sub(remaining)));
            if remaining > 0 {
                queue.schedule(
                    self.clock.now_ns() + self.period_ns(remaining),
                    DeviceTimer::QuadChannel(ch),
                );
            }
        }
    }

    fn channel_read(&mut self, ch: usize, offset: u64) -> u64 {
        match offset >> 2 {
            0 => u64::from(self.channels[ch].limit),
            1 => u64::from(self.current(ch)),
            2 => u64::from(self.channels[ch].control),
            3 => {
                // EOI: reading acknowledges the interrupt.
                self.channels[ch].int_level = false;
                self.update_irq(ch);
                0
            }
            4 => u64::from(self.masked_level(ch)),
            _ => {
                tracing::warn!(target: "timer", "bad read offset {offset:#x}");
                0
            }
        }
    }

    fn channel_write(
        &mut self,
        ch: usize,
        offset: u64,
        value: u64,
        queue: &mut TimerQueue<DeviceTimer>,
    ) {
        match offset >> 2 {
            0 => {
                self.channels[ch].limit = value as u32;
                if self.control(ch).contains(TimerControl::ENABLE) {
                    self.start(ch, queue);
                }
            }
            2 => {
                if self.control(ch).contains(TimerControl::ENABLE) {
                    self.stop(ch, queue);
                }
                self.channels[ch].control = value as u32;
                self.channels[ch].count_at_stop = self.reload_limit(ch);
                if self.control(ch).contains(TimerControl::ENABLE) {
                    self.start(ch, queue);
                }
            }
            1 | 3 | 4 => return, // CurrentValue, EOI, IntStatus are read-only
            _ => {
                tracing::warn!(target: "timer", "bad write offset {offset:#x}");
            }
        }
        self.update_irq(ch);
    }

    pub fn mmio_read(&mut self, offset: u64, size: u32) -> u64 {
        if size != 4 {
            tracing::warn!(target: "timer", "bad read size {size}");
        }

        let slot = offset / CHANNEL_STRIDE;
        match slot {
            0..=3 => self.channel_read(slot as usize, offset % CHANNEL_STRIDE),
            AGGREGATE_SLOT => match (offset % CHANNEL_STRIDE) >> 2 {
                0 => {
                    let mut status = 0u64;
                    for ch in 0..NUM_CHANNELS {
                        status |= u64::from(self.masked_level(ch)) << ch;
                    }
                    status
                }
                1 => {
                    for ch in 0..NUM_CHANNELS {
                        self.channels[ch].int_level = false;
                        self.update_irq(ch);
                    }
                    0
                }
                2 => {
                    let mut status = 0u64;
                    for ch in 0..NUM_CHANNELS {
                        status |= u64::from(self.channels[ch].int_level) << ch;
                    }
                    status
                }
                _ => {
                    tracing::warn!(target: "timer", "bad read offset {offset:#x}");
                    0
                }
            },
            _ => {
                tracing::warn!(target: "timer", "bad timer {slot}");
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
        if size != 4 {
            tracing::warn!(target: "timer", "bad write size {size}");
        }

        let slot = offset / CHANNEL_STRIDE;
        if slot >= NUM_CHANNELS as u64 {
            tracing::warn!(target: "timer", "bad timer {slot}");
            return;
        }
        self.channel_write(slot as usize, offset % CHANNEL_STRIDE, value, queue);
    }
}

const TAG_CHANNELS: u16 = 1;

impl IoSnapshot for QuadTimer {
    const DEVICE_ID: [u8; 4] = *b"QTMR";
    const DEVICE_VERSION: SnapshotVersion = SnapshotVersion::new(1, 0);

    fn save_state(&self) -> Vec<u8> {
        let mut w = SnapshotWriter::new(Self::DEVICE_ID, Self::DEVICE_VERSION);
        let mut e = Encoder::new().u32(NUM_CHANNELS as u32);
        for ch in 0..NUM_CHANNELS {
            let c = &self.channels[ch];
            e = e
                .u32(c.control)
                .u32(c.limit)
                .bool(c.int_level)
                .u32(self.current(ch));
        }
        w.field_bytes(TAG_CHANNELS, e.finish());
        w.finish()
    }

    fn load_state(&mut self, bytes: &[u8]) -> Result<(), SnapshotError> {
        let r = SnapshotReader::parse(bytes, Self::DEVICE_ID)?;
        let version = r.header().device_version;
        if version.major != Self::DEVICE_VERSION.major {
            return Err(SnapshotError::UnsupportedVersion(version));
        }
        let body = r
            .bytes(TAG_CHANNELS)
            .ok_or(SnapshotError::InvalidFieldEncoding("missing timer channels"))?;
        let mut d = Decoder::new(body);
        if d.u32()? != NUM_CHANNELS as u32 {
            return Err(SnapshotError::InvalidFieldEncoding("timer channel count"));
        }
        for ch in 0..NUM_CHANNELS {
            let control = d.u32()?;
            let limit = d.u32()?;
            let int_level = d.bool()?;
            let count = d.u32()?;
            self.channels[ch] = Channel {
                control,
                limit,
                int_level,
                running: false,
                start_ns: 0,
                count_at_stop: count,
            };
            self.update_irq(ch);
        }
        Ok(())
    }
}
