//! EverDrive-64 cartridge communication driver.
//!
//! Detects an EverDrive flash cartridge on the N64 peripheral interface
//! (PI) and exchanges fixed 16-byte packets with a host over the
//! cartridge's USB bridge. All hardware access is injected through
//! [`cart_core::PiBus`], so the same code runs against the real PI or the
//! simulated cartridge in [`sim`].
//!
//! # Registers (word index from `0xBF80_0000`)
//!
//! | Index  | Name    | Description                               |
//! |--------|---------|-------------------------------------------|
//! | 0x0004 | USB_CFG | USB command (write) / status (read)       |
//! | 0x0005 | EDID    | Identification signature (upper halfword) |
//! | 0x0100 | USB_DAT | Start of the 512-byte USB data window     |
//! | 0x2000 | SYS_CFG | System configuration                      |
//! | 0x2001 | KEY     | Register-file unlock key                  |
//!
//! # Locking
//!
//! The PI is shared with every other peripheral in the system. All
//! cartridge programming happens between [`Everdrive::lock`] and
//! [`Everdrive::unlock`], which pair bus arbitration with interrupt
//! masking and save/restore of the domain 1 timing registers. Every
//! operation in this crate releases the lock on every exit path,
//! including timeouts.
//!
//! # Failure model
//!
//! The protocol entry points return `bool` and never block past a fixed
//! poll ceiling: an absent, unpowered, busy, or stalled device must never
//! halt the real-time loop that calls in here once per frame.

mod cart;
pub mod regs;
pub mod sim;
mod usb;

pub use cart::{Detection, Everdrive, Variant};
pub use regs::{PACKET_LEN, USB_TIMEOUT_POLLS};
