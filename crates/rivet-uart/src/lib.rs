//! 16550-family UART device model.
//!
//! A subset of the 16550 register file: RBR/THR with divisor latch, IER,
//! IIR/FCR, LCR, MCR, read-only LSR/MSR and the extra USR status register at
//! word offset 0x1F, plus a 16-byte receive FIFO with a programmable
//! interrupt trigger threshold. Transmit is synchronous: a THR write hands
//! the byte to the character backend and immediately reports the holding
//! register empty. Registers sit at word-aligned offsets; other access
//! sizes are logged and decoded anyway.

use bitflags::bitflags;
use rivet_io_snapshot::state::codec::{Decoder, Encoder};
use rivet_io_snapshot::state::{
    IoSnapshot, SnapshotError, SnapshotReader, SnapshotVersion, SnapshotWriter,
};
use rivet_platform::irq::IrqLine;

pub const RX_FIFO_DEPTH: usize = 16;

bitflags! {
    /// Line status register.
    #[derive(Clone, Copy, Debug, PartialEq, Eq)]
    pub struct Lsr: u32 {
        /// At least one character in the RBR or the receive FIFO.
        const DR = 0x01;
        /// Overrun error.
        const OE = 0x02;
        /// Transmit holding register empty.
        const THRE = 0x20;
        /// Transmitter empty.
        const TEMT = 0x40;
    }
}

bitflags! {
    /// UART status register.
    #[derive(Clone, Copy, Debug, PartialEq, Eq)]
    pub struct Usr: u32 {
        /// Transmit FIFO not full.
        const TFNF = 0x02;
        /// Transmit FIFO empty.
        const TFE = 0x04;
        /// Receive FIFO not empty.
        const RFNE = 0x08;
        /// Receive FIFO full.
        const REF = 0x10;
    }
}

/// Interrupt source values held in IIR[3:0], in priority order RX > TX.
pub const INT_NONE: u32 = 0x1;
pub const INT_TX: u32 = 0x2;
pub const INT_RX: u32 = 0x4;

/// The character stream behind the UART.
///
/// Transmit is best-effort: the guest has no flow control, so a backend
/// that cannot take the byte simply drops it.
pub trait CharBackend {
    fn write(&mut self, byte: u8);

    /// The UART freed receive space; the backend may push more input.
    fn accept_input(&mut self) {}
}

/// A backend that discards output. Useful when the port is unconnected.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullBackend;

impl CharBackend for NullBackend {
    fn write(&mut self, _byte: u8) {}
}

pub struct Uart {
    dll: u32,
    dlh: u32,
    ier: u32,
    iir: u32,
    fcr: u32,
    lcr: u32,
    mcr: u32,
    lsr: Lsr,
    msr: u32,
    usr: Usr,
    rx_fifo: [u8; RX_FIFO_DEPTH],
    rx_pos: usize,
    rx_count: usize,
    rx_trigger: usize,
    irq: Box<dyn IrqLine>,
    backend: Box<dyn CharBackend>,
}

impl Uart {
    pub fn new(irq: Box<dyn IrqLine>, backend: Box<dyn CharBackend>) -> Self {
        Self {
            dll: 0,
            dlh: 0x4,
            ier: 0,
            iir: INT_NONE,
            fcr: 0,
            lcr: 0,
            mcr: 0,
            lsr: Lsr::THRE | Lsr::TEMT,
            msr: 0,
            usr: Usr::TFNF | Usr::TFE,
            rx_fifo: [0; RX_FIFO_DEPTH],
            rx_pos: 0,
            rx_count: 0,
            rx_trigger: 1,
            irq,
            backend,
        }
    }

    fn dlab(&self) -> bool {
        self.lcr & 0x80 != 0
    }

    fn fifo_enabled(&self) -> bool {
        self.fcr & 0x1 != 0
    }

    fn set_int_source(&mut self, source: u32) {
        self.iir = (self.iir & !0xf) | source;
    }

    /// Recompute the IRQ output from the current source and IER gates.
    fn update(&mut self) {
        let source = self.iir & 0xf;
        let level =
            (source == INT_TX && self.ier & 0x2 != 0) || (source == INT_RX && self.ier & 0x1 != 0);
        self.irq.set_level(level);
    }

    /// Receive space left: a full FIFO in FIFO mode, one byte otherwise.
    pub fn can_receive(&self) -> usize {
        if self.fifo_enabled() {
            RX_FIFO_DEPTH - self.rx_count
        } else if self.lsr.contains(Lsr::DR) {
            0
        } else {
            1
        }
    }

    /// Bytes arriving from the character backend.
    pub fn receive(&mut self, buf: &[u8]) {
        for &byte in buf {
            self.receive_byte(byte);
        }
    }

    fn receive_byte(&mut self, byte: u8) {
        if self.usr.contains(Usr::REF) {
            self.lsr |= Lsr::OE;
        }

        if !self.fifo_enabled() {
            self.rx_fifo[0] = byte;
            self.usr |= Usr::REF | Usr::RFNE;
            self.lsr |= Lsr::DR;
            self.set_int_source(INT_RX);
            self.update();
            return;
        }

        let mut slot = self.rx_pos + self.rx_count;
        if slot >= RX_FIFO_DEPTH {
            slot -= RX_FIFO_DEPTH;
        }
        self.rx_fifo[slot] = byte;
        if self.rx_count < RX_FIFO_DEPTH {
            self.rx_count += 1;
        }
        self.lsr |= Lsr::DR;
        self.usr |= Usr::RFNE;
        if self.rx_count == RX_FIFO_DEPTH {
            self.usr |= Usr::REF;
        }
        if self.rx_count >= self.rx_trigger {
            self.set_int_source(INT_RX);
        }
        self.update();
    }

    fn read_rbr(&mut self) -> u32 {
        if self.fifo_enabled() {
            self.usr.remove(Usr::REF);
            let byte = self.rx_fifo[self.rx_pos];
            if self.rx_count > 0 {
                self.rx_count -= 1;
                self.rx_pos += 1;
                if self.rx_pos == RX_FIFO_DEPTH {
                    self.rx_pos = 0;
                }
            }
            if self.rx_count == 0 {
                self.lsr.remove(Lsr::DR);
                self.usr.remove(Usr::RFNE);
            }
            if self.rx_count >= self.rx_trigger {
                self.set_int_source(INT_RX);
            } else {
                self.set_int_source(INT_NONE);
            }
            self.update();
            self.backend.accept_input();
            u32::from(byte)
        } else {
            self.usr.remove(Usr::REF | Usr::RFNE);
            self.lsr.remove(Lsr::DR);
            self.set_int_source(INT_NONE);
            self.update();
            self.backend.accept_input();
            u32::from(self.rx_fifo[0])
        }
    }

    fn write_thr(&mut self, byte: u8) {
        self.backend.write(byte);
        self.lsr |= Lsr::THRE | Lsr::TEMT;
        if self.iir & 0xf != INT_RX {
            self.set_int_source(INT_TX);
        }
        self.update();
    }

    fn fcr_update(&mut self) {
        self.rx_trigger = if self.fifo_enabled() {
            match (self.fcr >> 6) & 0x3 {
                0 => 1,
                1 => 4,
                2 => 8,
                3 => 14,
                _ => unreachable!(),
            }
        } else {
            1
        };

        // RCVR FIFO reset bit.
        if self.fcr & 0x2 != 0 {
            self.rx_pos = 0;
            self.rx_count = 0;
        }
    }

    pub fn mmio_read(&mut self, offset: u64, size: u32) -> u64 {
        if size != 4 {
            tracing::warn!(target: "uart", "read of {offset:#x} must be word-sized");
        }

        u64::from(match (offset & 0xfff) >> 2 {
            0x0 => {
                if self.dlab() {
                    self.dll
                } else {
                    self.read_rbr()
                }
            }
            0x1 => {
                if self.dlab() {
                    self.dlh
                } else {
                    self.ier
                }
            }
            0x2 => {
                // Reading IIR retires a pending TX indication.
                if self.iir & 0xf == INT_TX {
                    let value = self.iir;
                    self.set_int_source(INT_NONE);
                    self.update();
                    value
                } else {
                    self.iir
                }
            }
            0x3 => self.lcr,
            0x4 => self.mcr,
            0x5 => self.lsr.bits(),
            0x6 => self.msr,
            0x1f => self.usr.bits(),
            _ => {
                tracing::warn!(target: "uart", "bad read offset {offset:#x}");
                0
            }
        })
    }

    pub fn mmio_write(&mut self, offset: u64, size: u32, value: u64) {
        if size != 4 {
            tracing::warn!(target: "uart", "write of {offset:#x} must be word-sized");
        }
        let value = value as u32;

        match (offset & 0xfff) >> 2 {
            0x0 => {
                if self.dlab() {
                    self.dll = value;
                } else {
                    self.write_thr(value as u8);
                }
            }
            0x1 => {
                if self.dlab() {
                    self.dlh = value;
                } else {
                    self.ier = value;
                    self.set_int_source(INT_TX);
                    self.update();
                }
            }
            0x2 => {
                if (self.fcr ^ value) & 0x1 != 0 {
                    // Toggling FIFO enable resets the receive FIFO.
                    self.rx_pos = 0;
                    self.rx_count = 0;
                }
                self.fcr = value;
                self.fcr_update();
            }
            0x3 => self.lcr = value,
            0x4 => self.mcr = value,
            0x5 | 0x6 | 0x1f => {} // LSR, MSR, USR are read-only
            _ => {
                tracing::warn!(target: "uart", "bad write offset {offset:#x}");
            }
        }
    }
}

const TAG_REGS: u16 = 1;
const TAG_RX_FIFO: u16 = 2;

impl IoSnapshot for Uart {
    const DEVICE_ID: [u8; 4] = *b"UART";
    const DEVICE_VERSION: SnapshotVersion = SnapshotVersion::new(1, 0);

    fn save_state(&self) -> Vec<u8> {
        let mut w = SnapshotWriter::new(Self::DEVICE_ID, Self::DEVICE_VERSION);
        w.field_bytes(
            TAG_REGS,
            Encoder::new()
                .u32(self.dll)
                .u32(self.dlh)
                .u32(self.ier)
                .u32(self.iir)
                .u32(self.fcr)
                .u32(self.lcr)
                .u32(self.mcr)
                .u32(self.lsr.bits())
                .u32(self.msr)
                .u32(self.usr.bits())
                .finish(),
        );
        let mut fifo = Encoder::new();
        for byte in self.rx_fifo {
            fifo = fifo.u8(byte);
        }
        w.field_bytes(
            TAG_RX_FIFO,
            fifo.u32(self.rx_pos as u32)
                .u32(self.rx_count as u32)
                .u32(self.rx_trigger as u32)
                .finish(),
        );
        w.finish()
    }

    fn load_state(&mut self, bytes: &[u8]) -> Result<(), SnapshotError> {
        let r = SnapshotReader::parse(bytes, Self::DEVICE_ID)?;
        let version = r.header().device_version;
        if version.major != Self::DEVICE_VERSION.major {
            return Err(SnapshotError::UnsupportedVersion(version));
        }

        let regs = r
            .bytes(TAG_REGS)
            .ok_or(SnapshotError::InvalidFieldEncoding("missing uart registers"))?;
        let mut d = Decoder::new(regs);
        let dll = d.u32()?;
        let dlh = d.u32()?;
        let ier = d.u32()?;
        let iir = d.u32()?;
        let fcr = d.u32()?;
        let lcr = d.u32()?;
        let mcr = d.u32()?;
        let lsr = d.u32()?;
        let msr = d.u32()?;
        let usr = d.u32()?;

        let fifo = r
            .bytes(TAG_RX_FIFO)
            .ok_or(SnapshotError::InvalidFieldEncoding("missing uart rx fifo"))?;
        let mut d = Decoder::new(fifo);
        let mut rx_fifo = [0u8; RX_FIFO_DEPTH];
        for slot in rx_fifo.iter_mut() {
            *slot = d.u8()?;
        }
        let rx_pos = d.u32()? as usize;
        let rx_count = d.u32()? as usize;
        let rx_trigger = d.u32()? as usize;
        if rx_pos >= RX_FIFO_DEPTH || rx_count > RX_FIFO_DEPTH || rx_trigger > RX_FIFO_DEPTH {
            return Err(SnapshotError::InvalidFieldEncoding("uart rx fifo out of range"));
        }

        self.dll = dll;
        self.dlh = dlh;
        self.ier = ier;
        self.iir = iir;
        self.fcr = fcr;
        self.lcr = lcr;
        self.mcr = mcr;
        self.lsr = Lsr::from_bits_retain(lsr);
        self.msr = msr;
        self.usr = Usr::from_bits_retain(usr);
        self.rx_fifo = rx_fifo;
        self.rx_pos = rx_pos;
        self.rx_count = rx_count;
        self.rx_trigger = rx_trigger;
        self.update();
        Ok(())
    }
}
