//! WARL remapping of the `clicintattr` mode field under each `nmbits`
//! partition, and the privilege filter on mode writes.

mod helpers;

use helpers::{create, intattr_off};
use rivet_clic::{ClicConfig, Privilege};

const CLICCFG: u64 = 0x0;

fn msu_config() -> ClicConfig {
    ClicConfig {
        sclicbase: 0x2000_1000,
        uclicbase: 0x2000_2000,
        ..Default::default()
    }
}

#[test]
fn nmbits0_forces_machine_mode() {
    let (block, _hart) = create(msu_config());
    block.m_view.mmio_write(CLICCFG, 4, 0x0); // nmbits = 0

    // Mode U requested; trig/shv preserved, mode reads back as M.
    block.m_view.mmio_write(intattr_off(12), 1, 0x03);
    assert_eq!(block.m_view.mmio_read(intattr_off(12), 1), 0xC3);
}

#[test]
fn nmbits1_splits_supervisor_and_machine() {
    let (block, _hart) = create(msu_config());
    block.m_view.mmio_write(CLICCFG, 4, 0x10); // nmbits = 1

    // 0x and 1x map to S and M respectively when S-mode exists.
    block.m_view.mmio_write(intattr_off(12), 1, 0x03);
    assert_eq!(block.m_view.mmio_read(intattr_off(12), 1), 0x43);
    block.m_view.mmio_write(intattr_off(12), 1, 0x83);
    assert_eq!(block.m_view.mmio_read(intattr_off(12), 1), 0xC3);
}

#[test]
fn nmbits1_maps_low_modes_to_user_on_mu_harts() {
    let (block, _hart) = create(ClicConfig {
        uclicbase: 0x2000_2000,
        ..Default::default()
    });
    block.m_view.mmio_write(CLICCFG, 4, 0x10); // nmbits = 1

    block.m_view.mmio_write(intattr_off(12), 1, 0x43);
    assert_eq!(block.m_view.mmio_read(intattr_off(12), 1), 0x03);
}

#[test]
fn nmbits2_rejects_the_reserved_encoding() {
    let (block, _hart) = create(msu_config());
    block.m_view.mmio_write(CLICCFG, 4, 0x20); // nmbits = 2

    block.m_view.mmio_write(intattr_off(12), 1, 0x43); // S
    assert_eq!(block.m_view.mmio_read(intattr_off(12), 1), 0x43);

    // The reserved value 10b keeps the previous mode, here S.
    block.m_view.mmio_write(intattr_off(12), 1, 0x87);
    assert_eq!(block.m_view.mmio_read(intattr_off(12), 1), 0x47);
}

#[test]
fn mode_writes_above_the_running_privilege_are_dropped() {
    let (block, hart) = create(msu_config());
    block.m_view.mmio_write(CLICCFG, 4, 0x20); // nmbits = 2
    block.m_view.mmio_write(intattr_off(12), 1, 0x01); // U-mode record

    // Running in S-mode, requesting an M-mode interrupt is refused and the
    // whole write is dropped, shv bit included.
    hart.set_priv(Privilege::Supervisor);
    block.s_view
        .as_ref()
        .unwrap()
        .mmio_write(intattr_off(12), 1, 0xC3);
    hart.set_priv(Privilege::Machine);
    assert_eq!(block.m_view.mmio_read(intattr_off(12), 1), 0x01);

    // An S-mode request from S-mode is fine.
    hart.set_priv(Privilege::Supervisor);
    block.s_view
        .as_ref()
        .unwrap()
        .mmio_write(intattr_off(12), 1, 0x43);
    hart.set_priv(Privilege::Machine);
    assert_eq!(block.m_view.mmio_read(intattr_off(12), 1), 0x43);
}

#[test]
fn effective_mode_tracks_nmbits_on_readback() {
    let (block, _hart) = create(msu_config());

    // Store an S-mode record under nmbits=2, then shrink the partition:
    // the stored field is unchanged but reads remap through the current
    // interpretation.
    block.m_view.mmio_write(CLICCFG, 4, 0x20);
    block.m_view.mmio_write(intattr_off(12), 1, 0x43);
    block.m_view.mmio_write(CLICCFG, 4, 0x00); // nmbits = 0
    assert_eq!(block.m_view.mmio_read(intattr_off(12), 1), 0xC3);
}
