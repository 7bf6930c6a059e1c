//! RISC-V CLIC (Core Local Interrupt Controller) device model.
//!
//! This follows the CLIC 0.9-stable draft of 14 March 2024, with the control
//! registers memory-mapped as per the earlier 0.9 drafts (the indirect CSR
//! interface is not modelled) and a compatibility mode for the 0.8-era
//! register dialect. Each hart gets one [`Clic`] holding the authoritative
//! configuration, with a [`ClicView`] per supported privilege mode layered
//! on top: M-mode always, S- and U-mode when a base address is supplied.
//! MMIO goes through a view, which enforces the access-mode filtering before
//! touching the shared state.
//!
//! Enabled interrupts are mirrored into a list sorted by
//! mode+level+priority, so that arbitration — rerun after every pending,
//! enable, attribute, control, or threshold change — is a linear scan that
//! can stop at the first entry the hart's current privilege and interrupt
//! level make ineligible. The winner is posted to the CPU model through
//! [`Hart::raise_interrupt`] with its encoded cause; hardware-vectored
//! edge-triggered interrupts have their pending bit cleared in the same
//! step.

mod active;
pub mod cause;
mod hart;
mod irq;
pub mod regs;
mod snapshot;
mod view;

use std::cell::RefCell;
use std::rc::Rc;

use active::ActiveSet;
pub use cause::Cause;
pub use hart::{Hart, InterruptLevels, Privilege};
pub use irq::ClicInputLine;
use regs::{
    intcfg_encode, interrupt_level, TrigType, CLIC_INTATTR_MASK, CLIC_INTATTR_MODE,
    CLIC_INTATTR_MODE_SHIFT, CLIC_INTATTR_SHV, CLIC_INTCTL_BASE, CLIC_INTTRIG_IRQN,
    CLIC_INTTRIG_MASK, CLIC_INTTRIG_REGS, CLIC_MAX_IRQ_COUNT, MAX_CLIC_INTCTLBITS, PRV_M,
    PRV_RESERVED, PRV_S, PRV_U,
};
pub use view::ClicView;

/// Which register dialect the CLIC speaks.
///
/// `V0_9Jmp` is `V0_9` with the vector table holding instructions (a jump
/// table) instead of handler addresses; only [`Clic::use_jump_table`]
/// changes. `V0_8` additionally exposes `mintthresh` at config offset 0x8
/// and switches `cliccfg` to the legacy field layout.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ClicVersion {
    V0_8,
    V0_9,
    V0_9Jmp,
}

impl ClicVersion {
    pub fn use_jump_table(self) -> bool {
        matches!(self, ClicVersion::V0_9Jmp)
    }

    fn is_v0_8(self) -> bool {
        matches!(self, ClicVersion::V0_8)
    }
}

/// Construction-time parameters.
///
/// A zero `sclicbase`/`uclicbase` means the corresponding privilege mode is
/// not supported and no view is created for it.
#[derive(Clone, Copy, Debug)]
pub struct ClicConfig {
    pub hartid: u32,
    pub num_sources: u32,
    pub clicintctlbits: u8,
    pub version: ClicVersion,
    pub mclicbase: u64,
    pub sclicbase: u64,
    pub uclicbase: u64,
    pub shv_enabled: bool,
    pub mnlbits: u8,
    pub snlbits: u8,
    pub unlbits: u8,
}

impl Default for ClicConfig {
    fn default() -> Self {
        Self {
            hartid: 0,
            num_sources: 256,
            clicintctlbits: 8,
            version: ClicVersion::V0_9,
            mclicbase: 0xE080_0000,
            sclicbase: 0,
            uclicbase: 0,
            shv_enabled: true,
            mnlbits: 8,
            snlbits: 8,
            unlbits: 8,
        }
    }
}

/// A CLIC instance plus its privilege views, ready to be mapped.
pub struct ClicBlock {
    pub clic: Rc<RefCell<Clic>>,
    pub m_view: ClicView,
    pub s_view: Option<ClicView>,
    pub u_view: Option<ClicView>,
}

impl ClicBlock {
    /// An [`IrqLine`](rivet_platform::irq::IrqLine) driving input `irq`.
    pub fn input_line(&self, irq: u32) -> ClicInputLine {
        ClicInputLine::new(self.clic.clone(), irq)
    }
}

/// The per-hart CLIC state.
pub struct Clic {
    // Implementation parameters.
    hartid: u32,
    num_sources: u32,
    clic_size: u64,
    clicintctlbits: u8,
    version: ClicVersion,
    shv_enabled: bool,
    s_present: bool,
    u_present: bool,

    // Global configuration.
    nmbits: u8,
    mnlbits: u8,
    snlbits: u8,
    unlbits: u8,
    nvbits: u8,
    clicinttrig: [u32; CLIC_INTTRIG_REGS],

    // Per-interrupt records.
    intip: Vec<bool>,
    intie: Vec<bool>,
    intattr: Vec<u8>,
    intctl: Vec<u8>,

    // 0.8-compat level thresholds; 0.9 keeps these in CPU CSRs.
    mintthresh: u32,
    sintthresh: u32,
    uintthresh: u32,

    // Delivery state.
    exccode: u32,
    active: ActiveSet,
    hart: Box<dyn Hart>,
}

impl Clic {
    /// Build the CLIC and its views. Invalid construction parameters are
    /// emulator bugs and abort.
    pub fn create(cfg: ClicConfig, hart: Box<dyn Hart>) -> ClicBlock {
        assert!(
            cfg.num_sources > 0 && cfg.num_sources <= CLIC_MAX_IRQ_COUNT,
            "clic: num_sources {} out of range",
            cfg.num_sources
        );
        assert!(
            cfg.clicintctlbits <= MAX_CLIC_INTCTLBITS,
            "clic: clicintctlbits {} out of range",
            cfg.clicintctlbits
        );
        assert!(cfg.mclicbase != 0, "clic: an M-mode base is required");
        for base in [cfg.mclicbase, cfg.sclicbase, cfg.uclicbase] {
            assert!(base & 0xfff == 0, "clic: base {base:#x} not 4KiB-aligned");
        }

        let s_present = cfg.sclicbase != 0;
        let u_present = cfg.uclicbase != 0;
        let nmbits = match (s_present, u_present) {
            (true, true) => 2,
            (true, false) | (false, true) => 1,
            (false, false) => 0,
        };
        let n = cfg.num_sources as usize;

        let clic = Rc::new(RefCell::new(Clic {
            hartid: cfg.hartid,
            num_sources: cfg.num_sources,
            clic_size: CLIC_INTCTL_BASE + 4 * u64::from(cfg.num_sources),
            clicintctlbits: cfg.clicintctlbits,
            version: cfg.version,
            shv_enabled: cfg.shv_enabled,
            s_present,
            u_present,
            nmbits,
            mnlbits: cfg.mnlbits,
            snlbits: if s_present { cfg.snlbits } else { 0 },
            unlbits: if u_present { cfg.unlbits } else { 0 },
            nvbits: 0,
            clicinttrig: [0; CLIC_INTTRIG_REGS],
            intip: vec![false; n],
            intie: vec![false; n],
            intattr: vec![0; n],
            intctl: vec![0; n],
            mintthresh: 0,
            sintthresh: 0,
            uintthresh: 0,
            exccode: 0,
            active: ActiveSet::default(),
            hart,
        }));

        let m_view = ClicView::new(clic.clone(), Privilege::Machine, cfg.mclicbase);
        let s_view = s_present.then(|| ClicView::new(clic.clone(), Privilege::Supervisor, cfg.sclicbase));
        let u_view = u_present.then(|| ClicView::new(clic.clone(), Privilege::User, cfg.uclicbase));

        ClicBlock {
            clic,
            m_view,
            s_view,
            u_view,
        }
    }

    pub fn hartid(&self) -> u32 {
        self.hartid
    }

    pub fn num_sources(&self) -> u32 {
        self.num_sources
    }

    pub fn version(&self) -> ClicVersion {
        self.version
    }

    /// Size of each view's register aperture.
    pub fn aperture_size(&self) -> u64 {
        self.clic_size
    }

    pub fn is_edge_triggered(&self, irq: u32) -> bool {
        assert!(irq < self.num_sources, "clic: irq {irq} out of range");
        TrigType::from_attr(self.intattr[irq as usize]).is_edge()
    }

    pub fn is_shv_interrupt(&self, irq: u32) -> bool {
        assert!(irq < self.num_sources, "clic: irq {irq} out of range");
        self.intattr[irq as usize] & CLIC_INTATTR_SHV != 0 && self.shv_enabled
    }

    pub fn use_jump_table(&self) -> bool {
        self.version.use_jump_table()
    }

    /// Drop the pending bit without rerunning arbitration; the CPU model
    /// calls this while retiring an unvectored interrupt.
    pub fn clean_pending(&mut self, irq: u32) {
        assert!(irq < self.num_sources, "clic: irq {irq} out of range");
        self.intip[irq as usize] = false;
    }

    /// The cause word most recently posted to the hart.
    pub fn pending_cause(&self) -> u32 {
        self.exccode
    }

    /// An interrupt input line changed level.
    ///
    /// Edge-triggered state latches into the pending bit; level-triggered
    /// pending follows the wire (inverted for negative polarity), so it is
    /// effectively read-only to software.
    pub fn set_irq_line(&mut self, irq: u32, level: bool) {
        if irq >= self.num_sources {
            tracing::warn!(target: "clic", "invalid input line {irq}");
            return;
        }
        let trig = TrigType::from_attr(self.intattr[irq as usize]);
        match (level, trig) {
            (true, TrigType::PositiveLevel | TrigType::PositiveEdge) => {
                self.update_intip(irq, true);
            }
            (true, TrigType::NegativeLevel) => self.update_intip(irq, false),
            (true, TrigType::NegativeEdge) => {}
            (false, TrigType::PositiveLevel) => self.update_intip(irq, false),
            (false, TrigType::PositiveEdge) => {}
            (false, TrigType::NegativeLevel | TrigType::NegativeEdge) => {
                self.update_intip(irq, true);
            }
        }
    }

    /// Scan the active list for the highest-priority pending interrupt,
    /// compare it against the hart's interrupt-level thresholds, and post it
    /// if it wins. Rerun after every state change that can affect the
    /// outcome; threshold changes on the CPU side call this directly.
    pub fn next_interrupt(&mut self) {
        let csr = self.hart.interrupt_levels();
        let il = [
            csr.uil.max((self.uintthresh & 0xff) as u8),
            csr.sil.max((self.sintthresh & 0xff) as u8),
            0,
            csr.mil.max((self.mintthresh & 0xff) as u8),
        ];
        let current = self.hart.current_priv().bits();

        let mut winner = None;
        for (intcfg, irq) in self.active.iter_desc() {
            let mode = (intcfg >> 8) as u8;
            let level = interrupt_level(self.mnlbits, self.clicintctlbits, (intcfg & 0xff) as u8);
            if mode < current || (mode == current && level < il[mode as usize]) {
                // The list is sorted, so nothing later can be eligible.
                break;
            }
            if !self.intip[irq as usize] {
                continue;
            }
            winner = Some((irq, mode, level));
            break;
        }

        if let Some((irq, mode, level)) = winner {
            if self.is_edge_triggered(irq) && self.is_shv_interrupt(irq) {
                // Vectored edge-triggered pending clears on delivery.
                self.intip[irq as usize] = false;
            }
            let cause = Cause { irq, mode, level };
            self.exccode = cause.encode();
            self.hart.raise_interrupt(cause);
        }
    }

    fn update_intip(&mut self, irq: u32, pending: bool) {
        self.intip[irq as usize] = pending;
        self.next_interrupt();
    }

    fn update_intie(&mut self, irq: u32, enable: bool) {
        let old = self.intie[irq as usize];
        self.intie[irq as usize] = enable;
        if enable && !old {
            self.active.insert(self.record_intcfg(irq), irq);
        } else if !enable && old {
            self.active.remove_irq(irq);
        }
        self.next_interrupt();
    }

    /// The sort key contribution of one record: effective target mode over
    /// the raw `clicintctl` byte.
    fn record_intcfg(&self, irq: u32) -> u16 {
        let mode = self.effective_mode(self.intattr[irq as usize]);
        intcfg_encode(mode, self.intctl[irq as usize])
    }

    /// WARL interpretation of an `intattr` mode field under the current
    /// `nmbits` partition:
    ///
    /// ```text
    /// priv-modes nmbits mode  interpretation
    /// M            0     xx   M-mode interrupt
    /// M/U          1     0x   U-mode interrupt
    /// M/U          1     1x   M-mode interrupt
    /// M/S          1     0x   S-mode interrupt
    /// M/S          1     1x   M-mode interrupt
    /// M/S/U        1     0x   S-mode interrupt
    /// M/S/U        1     1x   M-mode interrupt
    /// M/S/U        2     00   U, 01 S, 10 reserved, 11 M
    /// ```
    fn effective_mode(&self, intattr: u8) -> u8 {
        let mode = (intattr & CLIC_INTATTR_MODE) >> CLIC_INTATTR_MODE_SHIFT;
        match self.nmbits {
            0 => PRV_M,
            1 => {
                if mode <= PRV_S {
                    if self.s_present {
                        PRV_S
                    } else {
                        PRV_U
                    }
                } else {
                    PRV_M
                }
            }
            2 => mode,
            _ => unreachable!("nmbits is validated on write"),
        }
    }

    /// Registers of an interrupt not accessible to the access mode appear
    /// hard-wired to zero (CLIC draft §3.9, §3.10).
    pub(crate) fn check_visible(&self, access_mode: u8, irq: u32) -> bool {
        let intattr_mode = (self.intattr[irq as usize] & CLIC_INTATTR_MODE) >> CLIC_INTATTR_MODE_SHIFT;
        match self.nmbits {
            0 => access_mode == PRV_M,
            1 => access_mode == PRV_M || intattr_mode <= PRV_S,
            2 => {
                debug_assert!(self.s_present && self.u_present);
                access_mode >= intattr_mode
            }
            _ => unreachable!("nmbits is validated on write"),
        }
    }

    // ---- per-interrupt register bytes, dispatched from the views ----

    pub(crate) fn read_int_byte(&self, irq: u32, reg: u64) -> u8 {
        match reg {
            0 => self.intip[irq as usize] as u8,
            1 => self.intie[irq as usize] as u8,
            2 => {
                let attr = self.intattr[irq as usize] & CLIC_INTATTR_MASK;
                let mode = self.effective_mode(attr);
                (attr & !CLIC_INTATTR_MODE) | mode << CLIC_INTATTR_MODE_SHIFT
            }
            3 => regs::intctl_read(self.intctl[irq as usize], self.clicintctlbits),
            _ => unreachable!("register index is two bits"),
        }
    }

    pub(crate) fn write_intip(&mut self, irq: u32, value: u8) {
        // Software writes to level-triggered pending bits are ignored
        // completely (CLIC draft §3.4).
        if !self.is_edge_triggered(irq) {
            tracing::warn!(target: "clic", "ignoring software write to level-triggered clicintip[{irq}]");
            return;
        }
        let pending = value != 0;
        if pending != self.intip[irq as usize] {
            self.update_intip(irq, pending);
        }
    }

    pub(crate) fn write_intie(&mut self, irq: u32, value: u8) {
        let enable = value != 0;
        if enable != self.intie[irq as usize] {
            self.update_intie(irq, enable);
        }
    }

    pub(crate) fn write_intattr(&mut self, irq: u32, value: u8) {
        let mut mode = self.effective_mode(value);
        if mode == PRV_RESERVED {
            // The reserved encoding leaves the field unchanged.
            mode = (self.intattr[irq as usize] & CLIC_INTATTR_MODE) >> CLIC_INTATTR_MODE_SHIFT;
        }
        let value = (value & !CLIC_INTATTR_MODE) | mode << CLIC_INTATTR_MODE_SHIFT;

        // The mode can only be set from a privilege level at least as high
        // as the one requested (CLIC draft §3.6).
        if self.hart.current_priv().bits() < mode {
            tracing::warn!(
                target: "clic",
                "dropping clicintattr[{irq}] write requesting mode {mode} above the running privilege"
            );
            return;
        }
        if self.intattr[irq as usize] == value {
            return;
        }
        let rekey = self.intie[irq as usize];
        if rekey {
            self.active.remove_irq(irq);
        }
        self.intattr[irq as usize] = value;
        if rekey {
            self.active.insert(self.record_intcfg(irq), irq);
        }
        self.next_interrupt();
    }

    pub(crate) fn write_intctl(&mut self, irq: u32, value: u8) {
        if self.intctl[irq as usize] == value {
            return;
        }
        let rekey = self.intie[irq as usize];
        if rekey {
            self.active.remove_irq(irq);
        }
        self.intctl[irq as usize] = value;
        if rekey {
            self.active.insert(self.record_intcfg(irq), irq);
        }
        self.next_interrupt();
    }

    // ---- global configuration registers ----

    pub(crate) fn read_cliccfg(&self, view_mode: Privilege) -> u32 {
        if self.version.is_v0_8() {
            if view_mode != Privilege::Machine {
                return 0;
            }
            return regs::LegacyCliccfg {
                nvbits: self.nvbits,
                nlbits: self.mnlbits,
                nmbits: self.nmbits,
            }
            .encode();
        }

        // Each view sees only the fields its mode may program.
        let mut cfg = regs::Cliccfg {
            mnlbits: 0,
            nmbits: 0,
            snlbits: 0,
            unlbits: 0,
        };
        if view_mode == Privilege::Machine {
            cfg.mnlbits = self.mnlbits;
            cfg.nmbits = self.nmbits;
        }
        if self.s_present && view_mode >= Privilege::Supervisor {
            cfg.snlbits = self.snlbits;
        }
        if self.u_present {
            cfg.unlbits = self.unlbits;
        }
        cfg.encode()
    }

    pub(crate) fn write_cliccfg(&mut self, view_mode: Privilege, value: u32) {
        if self.version.is_v0_8() {
            if view_mode != Privilege::Machine {
                return;
            }
            let cfg = regs::LegacyCliccfg::decode(value);
            if cfg.nlbits <= 8 {
                self.mnlbits = cfg.nlbits;
            }
            self.nvbits = cfg.nvbits;
            self.write_nmbits(cfg.nmbits);
            return;
        }

        let cfg = regs::Cliccfg::decode(value);
        // Each nlbits field is a 4-bit WARL accepting 0..=8; out-of-range
        // writes leave the previous value.
        if view_mode == Privilege::Machine && cfg.mnlbits <= 8 {
            self.mnlbits = cfg.mnlbits;
        }
        if self.s_present && cfg.snlbits <= 8 && view_mode >= Privilege::Supervisor {
            self.snlbits = cfg.snlbits;
        }
        if self.u_present && cfg.unlbits <= 8 {
            self.unlbits = cfg.unlbits;
        }
        if view_mode == Privilege::Machine {
            self.write_nmbits(cfg.nmbits);
        }
    }

    /// `nmbits` is WARL with the valid range given by the implemented
    /// privilege modes. A change re-keys every active entry, since the
    /// effective mode of each record may shift.
    fn write_nmbits(&mut self, nmbits: u8) {
        let max = match (self.s_present, self.u_present) {
            (true, true) => 2,
            (true, false) | (false, true) => 1,
            (false, false) => 0,
        };
        if nmbits <= max && nmbits != self.nmbits {
            self.nmbits = nmbits;
            self.rebuild_active();
        }
    }

    pub(crate) fn read_inttrig(&self, index: usize) -> u32 {
        self.clicinttrig[index] & CLIC_INTTRIG_MASK
    }

    pub(crate) fn write_inttrig(&mut self, index: usize, value: u32) {
        // Stored, not interpreted: the trigger side effect is left to the
        // CPU model.
        if value & CLIC_INTTRIG_IRQN <= self.num_sources {
            self.clicinttrig[index] = value & CLIC_INTTRIG_MASK;
        }
    }

    pub(crate) fn read_mintthresh(&self) -> u32 {
        self.mintthresh
    }

    pub(crate) fn write_mintthresh(&mut self, value: u32) {
        self.mintthresh = value;
        self.next_interrupt();
    }

    pub(crate) fn current_priv(&self) -> Privilege {
        self.hart.current_priv()
    }

    pub(crate) fn version_is_v0_8(&self) -> bool {
        self.version.is_v0_8()
    }

    fn rebuild_active(&mut self) {
        self.active.clear();
        for irq in 0..self.num_sources {
            if self.intie[irq as usize] {
                self.active.insert(self.record_intcfg(irq), irq);
            }
        }
    }
}
