//! The 0.8-era register dialect: legacy `cliccfg` layout and the
//! memory-mapped `mintthresh` window.

mod helpers;

use helpers::{create, intattr_off, intctl_off, intie_off, intip_off};
use rivet_clic::{ClicConfig, ClicVersion};

const CLICCFG: u64 = 0x0;
const MINTTHRESH: u64 = 0x8;

fn v0_8_config() -> ClicConfig {
    // The shipped 0.8 platform: M-only, 256 sources, three control bits.
    ClicConfig {
        num_sources: 256,
        clicintctlbits: 3,
        version: ClicVersion::V0_8,
        mnlbits: 0,
        ..Default::default()
    }
}

#[test]
fn legacy_cliccfg_write_readback_vectors() {
    let (block, _hart) = create(v0_8_config());
    let view = &block.m_view;

    // nvbits[0] | nlbits[4:1] | nmbits[6:5], checked against the values a
    // 0.8-era firmware drives.
    for (written, expected) in [
        (0x01u64, 0x01u64), // nlbits=0
        (0x11, 0x11),       // nlbits=8
        (0x15, 0x11),       // nlbits=10 is invalid, field retained
        (0x51, 0x11),       // nmbits=2 is invalid on an M-only hart
    ] {
        view.mmio_write(CLICCFG, 4, written);
        assert_eq!(view.mmio_read(CLICCFG, 4), expected);
    }
}

#[test]
fn mintthresh_gates_same_mode_delivery() {
    let (block, hart) = create(v0_8_config());
    let view = &block.m_view;

    view.mmio_write(CLICCFG, 4, 0x3); // nvbits=1, nlbits=1
    view.mmio_write(intattr_off(25), 1, 0xC3);
    view.mmio_write(intctl_off(25), 1, 0xBF); // level 255
    view.mmio_write(intie_off(25), 1, 1);

    // Raise the software threshold above every reachable level.
    view.mmio_write(MINTTHRESH, 4, 0xFF);
    assert_eq!(view.mmio_read(MINTTHRESH, 4), 0xFF);

    view.mmio_write(intip_off(25), 1, 1);
    // Level 255 is not *below* a threshold of 255, so it still delivers;
    // drop it to a blocked level first.
    assert_eq!(hart.take_causes().len(), 1);

    view.mmio_write(intctl_off(25), 1, 0x3F); // level 127
    view.mmio_write(intip_off(25), 1, 1);
    assert!(hart.causes().is_empty(), "level 127 is below mintthresh 255");

    // Lowering the threshold through the window re-arbitrates.
    view.mmio_write(MINTTHRESH, 4, 0x40);
    let causes = hart.causes();
    assert_eq!(causes.len(), 1);
    assert_eq!(causes[0].irq, 25);
    assert_eq!(causes[0].level, 127);
}

#[test]
fn legacy_cliccfg_is_machine_scoped() {
    let (block, _hart) = create(ClicConfig {
        sclicbase: 0x2000_1000,
        ..v0_8_config()
    });
    let s_view = block.s_view.as_ref().unwrap();

    block.m_view.mmio_write(CLICCFG, 4, 0x11);
    assert_eq!(s_view.mmio_read(CLICCFG, 4), 0);
    s_view.mmio_write(CLICCFG, 4, 0x01);
    assert_eq!(block.m_view.mmio_read(CLICCFG, 4), 0x11);
}
