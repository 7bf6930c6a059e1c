mod helpers;

use helpers::{uart, FCR, IER, IIR, LSR, RBR};
use rivet_uart::{INT_NONE, INT_RX};

#[test]
fn rx_interrupt_waits_for_the_fifo_trigger_threshold() {
    let (mut uart, irq, _backend) = uart();

    uart.mmio_write(IER, 4, 0x1); // RX interrupt enable
    uart.mmio_write(FCR, 4, 0x41); // FIFO enable, trigger at 4

    // Three bytes: below the threshold, no interrupt.
    uart.receive(b"abc");
    assert!(!irq.level());
    assert_ne!(uart.mmio_read(LSR, 4) & 0x1, 0, "DR reflects buffered data");

    // The fourth byte crosses the threshold.
    uart.receive(b"d");
    assert!(irq.level());
    assert_eq!(uart.mmio_read(IIR, 4) & 0xf, u64::from(INT_RX));

    // Draining below the threshold clears the source; draining empty
    // clears DR.
    assert_eq!(uart.mmio_read(RBR, 4), u64::from(b'a'));
    assert!(!irq.level());
    assert_eq!(uart.mmio_read(IIR, 4) & 0xf, u64::from(INT_NONE));

    for expected in b"bcd" {
        assert_eq!(uart.mmio_read(RBR, 4), u64::from(*expected));
    }
    assert_eq!(uart.mmio_read(LSR, 4) & 0x1, 0);
    assert_eq!(uart.mmio_read(IIR, 4) & 0xf, u64::from(INT_NONE));
}

#[test]
fn trigger_threshold_eight() {
    let (mut uart, irq, _backend) = uart();
    uart.mmio_write(IER, 4, 0x1);
    uart.mmio_write(FCR, 4, 0x81);

    uart.receive(b"1234567");
    assert!(!irq.level());
    uart.receive(b"8");
    assert!(irq.level());
}

#[test]
fn trigger_threshold_fourteen() {
    let (mut uart, irq, _backend) = uart();
    uart.mmio_write(IER, 4, 0x1);
    uart.mmio_write(FCR, 4, 0xC1);

    uart.receive(&[0x55; 13]);
    assert!(!irq.level());
    uart.receive(&[0x55]);
    assert!(irq.level());
}

#[test]
fn fifo_reset_bit_clears_buffered_data() {
    let (mut uart, _irq, _backend) = uart();
    uart.mmio_write(FCR, 4, 0x1);
    uart.receive(b"xyz");
    assert_ne!(uart.mmio_read(LSR, 4) & 0x1, 0);

    uart.mmio_write(FCR, 4, 0x3); // RCVR FIFO reset
    assert_eq!(uart.can_receive(), rivet_uart::RX_FIFO_DEPTH);
}
