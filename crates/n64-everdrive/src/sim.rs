//! Behavioral simulation of the cartridge register file.
//!
//! [`SimCart`] implements [`PiBus`] for a single simulated EverDrive on an
//! otherwise idle PI, close enough to the hardware for the driver to run
//! unmodified: the register file is key-locked, the USB engine raises the
//! busy/active bit for a configurable number of status polls, and every
//! bus transaction is counted. Higher layers can use it to develop against
//! the packet protocol without a console on the desk.

use cart_core::PiBus;

use crate::cart::Variant;
use crate::regs::{
    EDID_SIG_SERIES_V, EDID_SIG_SERIES_X, KEY_UNLOCK, PACKET_LEN, REG_BASE, REG_EDID, REG_KEY,
    REG_SYS_CFG, REG_USB_CFG, REG_USB_DAT, USB_STA_ACT, USB_STA_PWR, USB_STA_RXF, USB_STA_TXE,
    USB_WINDOW_LEN,
};

/// Read commands carry this bit; write commands do not.
const CMD_READ: u32 = 0x0400;
/// A command's low bits carry the window offset of the transfer.
const CMD_OFFSET_MASK: u32 = 0x01FF;

/// Simulated EverDrive cartridge and PI bus.
pub struct SimCart {
    present: bool,
    unlocked: bool,
    edid: u32,
    sys_cfg: u32,
    window: [u8; USB_WINDOW_LEN],

    link_powered: bool,
    host_packet: Option<[u8; PACKET_LEN]>,
    sent_packet: Option<[u8; PACKET_LEN]>,
    active_cmd: Option<u32>,
    /// Status polls remaining before an active transfer completes.
    completion_polls: u32,
    /// Polls a fresh transfer takes to complete.
    completion_delay: u32,
    /// When set, the active bit never clears (unplugged mid-transfer).
    stalled: bool,

    latency: u32,
    pulse_width: u32,
    interrupts_enabled: bool,
    access_depth: u32,

    loads: u64,
    stores: u64,
    key_writes: u64,
    usb_cfg_writes: u64,
    usb_status_reads: u64,
}

impl SimCart {
    fn new(present: bool, edid: u32) -> Self {
        Self {
            present,
            unlocked: false,
            edid,
            sys_cfg: 0,
            window: [0; USB_WINDOW_LEN],
            link_powered: true,
            host_packet: None,
            sent_packet: None,
            active_cmd: None,
            completion_polls: 0,
            completion_delay: 2,
            stalled: false,
            latency: 0x40,
            pulse_width: 0x12,
            interrupts_enabled: true,
            access_depth: 0,
            loads: 0,
            stores: 0,
            key_writes: 0,
            usb_cfg_writes: 0,
            usb_status_reads: 0,
        }
    }

    /// A cartridge of the given generation, USB link powered.
    #[must_use]
    pub fn present(variant: Variant) -> Self {
        let signature = match variant {
            Variant::SeriesV => EDID_SIG_SERIES_V,
            Variant::SeriesX => EDID_SIG_SERIES_X,
        };
        Self::new(true, (signature << 16) | 0x0116)
    }

    /// An empty cartridge slot: every load reads 0, every store is lost.
    #[must_use]
    pub fn absent() -> Self {
        Self::new(false, 0)
    }

    /// Power-on value of the system configuration register.
    #[must_use]
    pub fn with_sys_cfg(mut self, value: u32) -> Self {
        self.sys_cfg = value;
        self
    }

    // -----------------------------------------------------------------------
    // Host-side controls
    // -----------------------------------------------------------------------

    /// Plug or unplug the USB cable.
    pub fn set_link_powered(&mut self, powered: bool) {
        self.link_powered = powered;
    }

    /// Queue one packet from the host. Clears the receive-FIFO-empty bit.
    pub fn push_host_packet(&mut self, packet: [u8; PACKET_LEN]) {
        self.host_packet = Some(packet);
    }

    /// Drain the packet the console last sent, if any.
    pub fn take_sent_packet(&mut self) -> Option<[u8; PACKET_LEN]> {
        self.sent_packet.take()
    }

    /// Make active transfers hang forever, as an unplugged device would.
    pub fn stall_usb(&mut self, stalled: bool) {
        self.stalled = stalled;
    }

    /// Number of status polls a transfer takes to complete.
    pub fn set_completion_delay(&mut self, polls: u32) {
        self.completion_delay = polls;
    }

    // -----------------------------------------------------------------------
    // Inspection
    // -----------------------------------------------------------------------

    /// Whether the register file is currently unlocked.
    #[must_use]
    pub fn is_unlocked(&self) -> bool {
        self.unlocked
    }

    /// System configuration register value.
    #[must_use]
    pub fn sys_cfg(&self) -> u32 {
        self.sys_cfg
    }

    /// Arbitration nesting depth (0 = not owned).
    #[must_use]
    pub fn access_depth(&self) -> u32 {
        self.access_depth
    }

    /// Current interrupt-enable flag.
    #[must_use]
    pub fn interrupts_enabled(&self) -> bool {
        self.interrupts_enabled
    }

    /// Total word transfers (loads + stores) seen so far.
    #[must_use]
    pub fn transactions(&self) -> u64 {
        self.loads + self.stores
    }

    /// Stores to the key register seen so far.
    #[must_use]
    pub fn key_writes(&self) -> u64 {
        self.key_writes
    }

    /// Commands written to the USB register seen so far.
    #[must_use]
    pub fn usb_cfg_writes(&self) -> u64 {
        self.usb_cfg_writes
    }

    /// Status reads of the USB register seen so far.
    #[must_use]
    pub fn usb_status_reads(&self) -> u64 {
        self.usb_status_reads
    }

    // -----------------------------------------------------------------------
    // Device model
    // -----------------------------------------------------------------------

    fn usb_status(&mut self) -> u32 {
        let mut status = 0;
        if self.link_powered {
            status |= USB_STA_PWR;
        }
        if self.host_packet.is_none() {
            status |= USB_STA_RXF;
        }
        if self.sent_packet.is_some() {
            status |= USB_STA_TXE;
        }
        if let Some(cmd) = self.active_cmd {
            if self.stalled {
                status |= USB_STA_ACT;
            } else if self.completion_polls > 0 {
                self.completion_polls -= 1;
                status |= USB_STA_ACT;
            } else {
                self.complete_command(cmd);
            }
        }
        status
    }

    fn complete_command(&mut self, cmd: u32) {
        self.active_cmd = None;
        let offset = (cmd & CMD_OFFSET_MASK) as usize;
        if offset + PACKET_LEN > USB_WINDOW_LEN {
            return;
        }
        if cmd & CMD_READ != 0 {
            if let Some(packet) = self.host_packet.take() {
                self.window[offset..offset + PACKET_LEN].copy_from_slice(&packet);
            }
        } else {
            let mut packet = [0u8; PACKET_LEN];
            packet.copy_from_slice(&self.window[offset..offset + PACKET_LEN]);
            self.sent_packet = Some(packet);
        }
    }

    fn window_offset(index: u32) -> Option<usize> {
        let words = (USB_WINDOW_LEN / 4) as u32;
        if (REG_USB_DAT..REG_USB_DAT + words).contains(&index) {
            Some(((index - REG_USB_DAT) * 4) as usize)
        } else {
            None
        }
    }

    fn reg_load(&mut self, index: u32) -> u32 {
        if index == REG_USB_CFG {
            self.usb_status_reads += 1;
        }
        if !self.unlocked {
            return 0;
        }
        if let Some(offset) = Self::window_offset(index) {
            let bytes = [
                self.window[offset],
                self.window[offset + 1],
                self.window[offset + 2],
                self.window[offset + 3],
            ];
            return u32::from_be_bytes(bytes);
        }
        match index {
            REG_USB_CFG => self.usb_status(),
            REG_EDID => self.edid,
            REG_SYS_CFG => self.sys_cfg,
            _ => 0,
        }
    }

    fn reg_store(&mut self, index: u32, value: u32) {
        if index == REG_KEY {
            self.key_writes += 1;
            self.unlocked = value == KEY_UNLOCK;
            return;
        }
        if !self.unlocked {
            return;
        }
        if let Some(offset) = Self::window_offset(index) {
            self.window[offset..offset + 4].copy_from_slice(&value.to_be_bytes());
            return;
        }
        match index {
            REG_USB_CFG => {
                self.usb_cfg_writes += 1;
                if value & USB_STA_ACT == 0 {
                    self.active_cmd = None;
                } else {
                    self.active_cmd = Some(value);
                    self.completion_polls = self.completion_delay;
                }
            }
            REG_SYS_CFG => self.sys_cfg = value,
            _ => {}
        }
    }

    fn reg_index(addr: u32) -> Option<u32> {
        let span = (REG_KEY + 1) * 4;
        if (REG_BASE..REG_BASE + span).contains(&addr) {
            Some((addr - REG_BASE) / 4)
        } else {
            None
        }
    }
}

impl PiBus for SimCart {
    fn dma_busy(&mut self) -> bool {
        false
    }

    fn io_busy(&mut self) -> bool {
        false
    }

    fn load(&mut self, addr: u32) -> u32 {
        self.loads += 1;
        if !self.present {
            return 0;
        }
        match Self::reg_index(addr) {
            Some(index) => self.reg_load(index),
            None => 0,
        }
    }

    fn store(&mut self, addr: u32, value: u32) {
        self.stores += 1;
        if !self.present {
            return;
        }
        if let Some(index) = Self::reg_index(addr) {
            self.reg_store(index, value);
        }
    }

    fn latency(&mut self) -> u32 {
        self.latency
    }

    fn set_latency(&mut self, value: u32) {
        self.latency = value;
    }

    fn pulse_width(&mut self) -> u32 {
        self.pulse_width
    }

    fn set_pulse_width(&mut self, value: u32) {
        self.pulse_width = value;
    }

    fn set_interrupts(&mut self, enabled: bool) -> bool {
        let previous = self.interrupts_enabled;
        self.interrupts_enabled = enabled;
        previous
    }

    fn acquire(&mut self) {
        self.access_depth += 1;
    }

    fn release(&mut self) {
        self.access_depth -= 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registers_read_zero_while_locked() {
        let mut cart = SimCart::present(Variant::SeriesV);
        assert_eq!(cart.load(REG_BASE + REG_EDID * 4), 0);
        cart.store(REG_BASE + REG_KEY * 4, KEY_UNLOCK);
        assert_eq!(cart.load(REG_BASE + REG_EDID * 4) >> 16, EDID_SIG_SERIES_V);
    }

    #[test]
    fn key_zero_relocks() {
        let mut cart = SimCart::present(Variant::SeriesV);
        cart.store(REG_BASE + REG_KEY * 4, KEY_UNLOCK);
        assert!(cart.is_unlocked());
        cart.store(REG_BASE + REG_KEY * 4, 0);
        assert!(!cart.is_unlocked());
        assert_eq!(cart.key_writes(), 2);
    }

    #[test]
    fn absent_slot_reads_open_bus() {
        let mut cart = SimCart::absent();
        cart.store(REG_BASE + REG_KEY * 4, KEY_UNLOCK);
        assert_eq!(cart.load(REG_BASE + REG_EDID * 4), 0);
        assert!(!cart.is_unlocked());
    }

    #[test]
    fn data_window_round_trips_words() {
        let mut cart = SimCart::present(Variant::SeriesV);
        cart.store(REG_BASE + REG_KEY * 4, KEY_UNLOCK);
        let addr = REG_BASE + REG_USB_DAT * 4;
        cart.store(addr, 0x0102_0304);
        assert_eq!(cart.load(addr), 0x0102_0304);
    }

    #[test]
    fn transfer_completes_after_configured_polls() {
        let mut cart = SimCart::present(Variant::SeriesV);
        cart.store(REG_BASE + REG_KEY * 4, KEY_UNLOCK);
        cart.push_host_packet([7; PACKET_LEN]);
        cart.set_completion_delay(3);

        let cfg = REG_BASE + REG_USB_CFG * 4;
        cart.store(cfg, 0xC600 | 0x01F0);
        assert_ne!(cart.load(cfg) & USB_STA_ACT, 0);
        assert_ne!(cart.load(cfg) & USB_STA_ACT, 0);
        assert_ne!(cart.load(cfg) & USB_STA_ACT, 0);
        assert_eq!(cart.load(cfg) & USB_STA_ACT, 0, "fourth poll completes");
        assert_eq!(cart.load(REG_BASE + (REG_USB_DAT + 0x7C) * 4), 0x0707_0707);
    }
}
