//! Packet protocol tests against the simulated cartridge.
//!
//! Everything here goes through the public API only: construct, detect,
//! exchange packets, and check that the lock discipline holds on every
//! exit path the protocol has.

use n64_everdrive::sim::SimCart;
use n64_everdrive::{Everdrive, PACKET_LEN, USB_TIMEOUT_POLLS, Variant};

fn usable_cart(variant: Variant) -> Everdrive<SimCart> {
    let mut ed = Everdrive::new(SimCart::present(variant));
    assert!(ed.detect(), "simulated cartridge should be detected");
    ed
}

fn assert_lock_released(ed: &Everdrive<SimCart>) {
    assert_eq!(ed.bus().access_depth(), 0, "bus token released");
    assert!(ed.bus().interrupts_enabled(), "interrupts restored");
}

#[test]
fn read_packet_end_to_end() {
    let mut ed = usable_cart(Variant::SeriesV);
    let payload: [u8; PACKET_LEN] = *b"0123456789abcdef";
    ed.bus_mut().push_host_packet(payload);

    let mut buf = [0u8; PACKET_LEN];
    assert!(ed.try_read_packet(&mut buf));
    assert_eq!(buf, payload);
    assert_lock_released(&ed);
}

#[test]
fn write_packet_end_to_end() {
    let mut ed = usable_cart(Variant::SeriesX);
    let payload: [u8; PACKET_LEN] = *b"fedcba9876543210";
    assert!(ed.try_write_packet(&payload));
    assert_eq!(ed.bus_mut().take_sent_packet(), Some(payload));
    assert_lock_released(&ed);
}

#[test]
fn loopback_through_host() {
    let mut ed = usable_cart(Variant::SeriesV);
    let payload = [0x5A; PACKET_LEN];
    assert!(ed.try_write_packet(&payload));

    // Host echoes the packet back
    let echoed = ed.bus_mut().take_sent_packet().expect("packet was sent");
    ed.bus_mut().push_host_packet(echoed);

    let mut buf = [0u8; PACKET_LEN];
    assert!(ed.try_read_packet(&mut buf));
    assert_eq!(buf, payload);
}

#[test]
fn read_with_no_host_data_fails_without_command() {
    let mut ed = usable_cart(Variant::SeriesV);
    let writes = ed.bus().usb_cfg_writes();

    let mut buf = [0u8; PACKET_LEN];
    assert!(!ed.try_read_packet(&mut buf));
    assert_eq!(buf, [0u8; PACKET_LEN], "buffer untouched on failure");
    assert_eq!(ed.bus().usb_cfg_writes(), writes, "no command issued");
    assert_lock_released(&ed);
}

#[test]
fn write_with_full_transmit_fifo_fails() {
    let mut ed = usable_cart(Variant::SeriesV);
    assert!(ed.try_write_packet(&[1; PACKET_LEN]));

    // Host has not drained the first packet yet
    assert!(!ed.try_write_packet(&[2; PACKET_LEN]));
    assert_eq!(ed.bus_mut().take_sent_packet(), Some([1; PACKET_LEN]));
    assert_lock_released(&ed);
}

#[test]
fn power_absent_fails_without_command_write() {
    let mut ed = usable_cart(Variant::SeriesV);
    ed.bus_mut().push_host_packet([3; PACKET_LEN]);
    ed.bus_mut().set_link_powered(false);
    let writes = ed.bus().usb_cfg_writes();

    let mut buf = [0u8; PACKET_LEN];
    assert!(!ed.try_read_packet(&mut buf));
    assert!(!ed.try_write_packet(&[4; PACKET_LEN]));
    assert_eq!(
        ed.bus().usb_cfg_writes(),
        writes,
        "only status reads while unpowered"
    );
    assert_lock_released(&ed);
}

#[test]
fn stalled_read_times_out_after_fixed_poll_count() {
    let mut ed = usable_cart(Variant::SeriesV);
    ed.bus_mut().push_host_packet([9; PACKET_LEN]);
    ed.bus_mut().stall_usb(true);
    let polls_before = ed.bus().usb_status_reads();

    let mut buf = [0u8; PACKET_LEN];
    assert!(!ed.try_read_packet(&mut buf));

    // One precondition status read, then exactly the poll ceiling
    let polls = ed.bus().usb_status_reads() - polls_before;
    assert_eq!(polls, 1 + u64::from(USB_TIMEOUT_POLLS));
    assert_eq!(buf, [0u8; PACKET_LEN], "packet slot untouched");
    assert_lock_released(&ed);
}

#[test]
fn stalled_write_times_out_after_fixed_poll_count() {
    let mut ed = usable_cart(Variant::SeriesV);
    ed.bus_mut().stall_usb(true);
    let polls_before = ed.bus().usb_status_reads();

    assert!(!ed.try_write_packet(&[9; PACKET_LEN]));

    let polls = ed.bus().usb_status_reads() - polls_before;
    assert_eq!(polls, 1 + u64::from(USB_TIMEOUT_POLLS));
    assert_lock_released(&ed);
}

#[test]
fn stalled_transfer_leaves_device_busy_for_next_attempt() {
    let mut ed = usable_cart(Variant::SeriesV);
    ed.bus_mut().stall_usb(true);
    assert!(!ed.try_write_packet(&[9; PACKET_LEN]));

    // The transfer never finished; the next attempt sees the active bit
    ed.bus_mut().push_host_packet([1; PACKET_LEN]);
    let writes = ed.bus().usb_cfg_writes();
    let mut buf = [0u8; PACKET_LEN];
    assert!(!ed.try_read_packet(&mut buf));
    assert_eq!(ed.bus().usb_cfg_writes(), writes, "busy check fails fast");
    assert_lock_released(&ed);
}

#[test]
fn absent_cartridge_fails_every_operation_cheaply() {
    let mut ed = Everdrive::new(SimCart::absent());
    assert!(!ed.detect());

    let mut buf = [0u8; PACKET_LEN];
    assert!(!ed.try_read_packet(&mut buf));
    assert!(!ed.try_write_packet(&[0; PACKET_LEN]));
    assert_lock_released(&ed);
}

#[test]
fn slow_transfer_still_succeeds_within_ceiling() {
    let mut ed = usable_cart(Variant::SeriesV);
    ed.bus_mut().set_completion_delay(100);
    ed.bus_mut().push_host_packet([0xAB; PACKET_LEN]);

    let mut buf = [0u8; PACKET_LEN];
    assert!(ed.try_read_packet(&mut buf));
    assert_eq!(buf, [0xAB; PACKET_LEN]);
}
