//! EverDrive register map and protocol constants.
//!
//! Register indices are word offsets from the cartridge register window at
//! `0xBF80_0000`. The USB command/status register shares one word: writes
//! program a command, reads return status bits.

/// Base bus address of the cartridge register window.
pub const REG_BASE: u32 = 0xBF80_0000;

/// USB command (write) / status (read) register.
pub const REG_USB_CFG: u32 = 0x0004;
/// Identification register; the upper halfword carries the signature.
pub const REG_EDID: u32 = 0x0005;
/// First word of the 512-byte USB data window.
pub const REG_USB_DAT: u32 = 0x0100;
/// System configuration register.
pub const REG_SYS_CFG: u32 = 0x2000;
/// Register-file unlock key register.
pub const REG_KEY: u32 = 0x2001;

/// Key value that unlocks the register file for programming.
pub const KEY_UNLOCK: u32 = 0xAA55;
/// Key value that re-locks the register file (power-on default).
pub const KEY_LOCK: u32 = 0;

/// Status: a USB transfer is in flight.
pub const USB_STA_ACT: u32 = 0x0200;
/// Status: the receive FIFO is empty (no host data waiting).
pub const USB_STA_RXF: u32 = 0x0400;
/// Status: the transmit FIFO is full (no room to send).
pub const USB_STA_TXE: u32 = 0x0800;
/// Status: the USB link is powered.
pub const USB_STA_PWR: u32 = 0x1000;

/// Command: latch write state, do not start a transfer.
pub const USB_CMD_WR_NOP: u32 = 0xC000;
/// Command: start a write transfer.
pub const USB_CMD_WR: u32 = 0xC200;
/// Command: latch read state, do not start a transfer.
pub const USB_CMD_RD_NOP: u32 = 0xC400;
/// Command: start a read transfer.
pub const USB_CMD_RD: u32 = 0xC600;

/// Size of the USB data window in bytes.
pub const USB_WINDOW_LEN: usize = 512;
/// Fixed packet size: the device's minimum transfer granularity.
pub const PACKET_LEN: usize = 16;
/// Window offset of a packet transfer, carried in a command's low bits.
pub const PACKET_OFFSET: u32 = (USB_WINDOW_LEN - PACKET_LEN) as u32;
/// Bus address of the first byte of the USB data window.
pub const USB_DATA_BASE: u32 = REG_BASE + REG_USB_DAT * 4;

/// Poll ceiling for the busy/active bit. Empirically chosen upstream;
/// preserved exactly because observable timing depends on it.
pub const USB_TIMEOUT_POLLS: u32 = 8192;

/// Identification signature of V2/V3 series cartridges.
pub const EDID_SIG_SERIES_V: u32 = 0xED64;
/// Identification signature of X-series cartridges.
pub const EDID_SIG_SERIES_X: u32 = 0xED65;

/// Bus address of a logical register index.
#[must_use]
pub const fn reg_addr(index: u32) -> u32 {
    REG_BASE + index * 4
}
