//! Snapshot/restore of the CLIC state.
//!
//! The active list is derived state and is rebuilt from the enable bits on
//! load; the platform reruns arbitration once every device is restored.

use rivet_io_snapshot::state::codec::{Decoder, Encoder};
use rivet_io_snapshot::state::{
    IoSnapshot, SnapshotError, SnapshotReader, SnapshotVersion, SnapshotWriter,
};

use crate::regs::CLIC_INTTRIG_REGS;
use crate::Clic;

const TAG_GLOBAL: u16 = 1;
const TAG_THRESHOLDS: u16 = 2;
const TAG_INTTRIG: u16 = 3;
const TAG_RECORDS: u16 = 4;
const TAG_EXCCODE: u16 = 5;

impl IoSnapshot for Clic {
    const DEVICE_ID: [u8; 4] = *b"CLIC";
    const DEVICE_VERSION: SnapshotVersion = SnapshotVersion::new(1, 0);

    fn save_state(&self) -> Vec<u8> {
        let mut w = SnapshotWriter::new(Self::DEVICE_ID, Self::DEVICE_VERSION);
        w.field_bytes(
            TAG_GLOBAL,
            Encoder::new()
                .u8(self.nmbits)
                .u8(self.mnlbits)
                .u8(self.snlbits)
                .u8(self.unlbits)
                .u8(self.nvbits)
                .finish(),
        );
        w.field_bytes(
            TAG_THRESHOLDS,
            Encoder::new()
                .u32(self.mintthresh)
                .u32(self.sintthresh)
                .u32(self.uintthresh)
                .finish(),
        );
        let mut trig = Encoder::new();
        for value in self.clicinttrig {
            trig = trig.u32(value);
        }
        w.field_bytes(TAG_INTTRIG, trig.finish());

        let mut records = Encoder::new().u32(self.num_sources);
        for i in 0..self.num_sources as usize {
            records = records
                .bool(self.intip[i])
                .bool(self.intie[i])
                .u8(self.intattr[i])
                .u8(self.intctl[i]);
        }
        w.field_bytes(TAG_RECORDS, records.finish());
        w.field_bytes(TAG_EXCCODE, Encoder::new().u32(self.exccode).finish());
        w.finish()
    }

    fn load_state(&mut self, bytes: &[u8]) -> Result<(), SnapshotError> {
        let r = SnapshotReader::parse(bytes, Self::DEVICE_ID)?;
        let version = r.header().device_version;
        if version.major != Self::DEVICE_VERSION.major {
            return Err(SnapshotError::UnsupportedVersion(version));
        }

        let global = r
            .bytes(TAG_GLOBAL)
            .ok_or(SnapshotError::InvalidFieldEncoding("missing clic config"))?;
        let mut d = Decoder::new(global);
        let nmbits = d.u8()?;
        let mnlbits = d.u8()?;
        let snlbits = d.u8()?;
        let unlbits = d.u8()?;
        let nvbits = d.u8()?;
        let nmbits_max = match (self.s_present, self.u_present) {
            (true, true) => 2,
            (true, false) | (false, true) => 1,
            (false, false) => 0,
        };
        if nmbits > nmbits_max || mnlbits > 8 || snlbits > 8 || unlbits > 8 || nvbits > 1 {
            return Err(SnapshotError::InvalidFieldEncoding("clic config out of range"));
        }

        let thresholds = r
            .bytes(TAG_THRESHOLDS)
            .ok_or(SnapshotError::InvalidFieldEncoding("missing clic thresholds"))?;
        let mut d = Decoder::new(thresholds);
        let mintthresh = d.u32()?;
        let sintthresh = d.u32()?;
        let uintthresh = d.u32()?;

        let inttrig = r
            .bytes(TAG_INTTRIG)
            .ok_or(SnapshotError::InvalidFieldEncoding("missing clicinttrig"))?;
        let mut d = Decoder::new(inttrig);
        let mut trig = [0u32; CLIC_INTTRIG_REGS];
        for slot in trig.iter_mut() {
            *slot = d.u32()?;
        }

        let records = r
            .bytes(TAG_RECORDS)
            .ok_or(SnapshotError::InvalidFieldEncoding("missing clic records"))?;
        let mut d = Decoder::new(records);
        if d.u32()? != self.num_sources {
            return Err(SnapshotError::InvalidFieldEncoding(
                "interrupt record count mismatch",
            ));
        }
        let n = self.num_sources as usize;
        let mut intip = Vec::with_capacity(n);
        let mut intie = Vec::with_capacity(n);
        let mut intattr = Vec::with_capacity(n);
        let mut intctl = Vec::with_capacity(n);
        for _ in 0..n {
            intip.push(d.bool()?);
            intie.push(d.bool()?);
            intattr.push(d.u8()?);
            intctl.push(d.u8()?);
        }

        let exccode = r
            .bytes(TAG_EXCCODE)
            .ok_or(SnapshotError::InvalidFieldEncoding("missing clic exccode"))?;
        let mut d = Decoder::new(exccode);
        let exccode = d.u32()?;

        self.nmbits = nmbits;
        self.mnlbits = mnlbits;
        self.snlbits = snlbits;
        self.unlbits = unlbits;
        self.nvbits = nvbits;
        self.mintthresh = mintthresh;
        self.sintthresh = sintthresh;
        self.uintthresh = uintthresh;
        self.clicinttrig = trig;
        self.intip = intip;
        self.intie = intie;
        self.intattr = intattr;
        self.intctl = intctl;
        self.exccode = exccode;
        self.rebuild_active();
        Ok(())
    }
}
