//! Cartridge handle: lock discipline, bus primitives, PIO, detection.

use cart_core::PiBus;

use crate::regs::{
    EDID_SIG_SERIES_V, EDID_SIG_SERIES_X, KEY_LOCK, KEY_UNLOCK, REG_EDID, REG_KEY, REG_SYS_CFG,
    reg_addr,
};

/// Cartridge hardware generation, distinguished by identification
/// signature.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Variant {
    /// V2/V3 series. USB bridge is live as soon as the key unlocks it.
    SeriesV,
    /// X series. The USB bridge is enabled by zeroing SYS_CFG after
    /// unlock.
    SeriesX,
}

impl Variant {
    fn from_signature(signature: u32) -> Option<Self> {
        match signature {
            EDID_SIG_SERIES_V => Some(Variant::SeriesV),
            EDID_SIG_SERIES_X => Some(Variant::SeriesX),
            _ => None,
        }
    }
}

/// Cached result of the one-shot hardware probe.
///
/// Terminal once it leaves `Unknown`: the cartridge is not hot-swapped,
/// so the probe runs at most once per process lifetime.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Detection {
    /// Not probed yet.
    Unknown,
    /// A known signature answered the unlock key.
    Present(Variant),
    /// No known signature answered; the register file was re-locked.
    NotPresent,
}

/// Handle to an EverDrive cartridge on the PI bus.
///
/// Owns the injected bus capability and all process-wide mutable state of
/// the subsystem: the detection cache and the timing/interrupt snapshots
/// taken by [`lock`](Everdrive::lock). Construction performs no bus
/// activity; call [`detect`](Everdrive::detect) before anything else.
pub struct Everdrive<B: PiBus> {
    bus: B,
    detection: Detection,
    saved_interrupts: bool,
    saved_latency: u32,
    saved_pulse_width: u32,
}

impl<B: PiBus> Everdrive<B> {
    /// Wrap a bus capability. Touches no hardware.
    #[must_use]
    pub fn new(bus: B) -> Self {
        Self {
            bus,
            detection: Detection::Unknown,
            saved_interrupts: false,
            saved_latency: 0,
            saved_pulse_width: 0,
        }
    }

    /// Shared access to the underlying bus.
    #[must_use]
    pub fn bus(&self) -> &B {
        &self.bus
    }

    /// Exclusive access to the underlying bus.
    pub fn bus_mut(&mut self) -> &mut B {
        &mut self.bus
    }

    /// Consume the handle, returning the bus.
    #[must_use]
    pub fn into_bus(self) -> B {
        self.bus
    }

    // -----------------------------------------------------------------------
    // Interrupt-masking lock
    // -----------------------------------------------------------------------

    /// Take exclusive ownership of the PI for cartridge programming.
    ///
    /// Acquires the bus token, masks interrupts, and snapshots the domain 1
    /// timing registers. Must be balanced by exactly one
    /// [`unlock`](Everdrive::unlock) on every exit path: an unbalanced pair
    /// leaves the bus timing misconfigured for every other PI user.
    pub fn lock(&mut self) {
        self.bus.acquire();
        self.saved_interrupts = self.bus.set_interrupts(false);
        self.saved_latency = self.bus.latency();
        self.saved_pulse_width = self.bus.pulse_width();
    }

    /// Release the PI, restoring timing registers and interrupt state.
    pub fn unlock(&mut self) {
        self.bus.set_latency(self.saved_latency);
        self.bus.set_pulse_width(self.saved_pulse_width);
        self.bus.release();
        self.bus.set_interrupts(self.saved_interrupts);
    }

    // -----------------------------------------------------------------------
    // Bus primitives
    // -----------------------------------------------------------------------

    /// Wait until the PI reports neither DMA nor I/O in flight.
    ///
    /// Unbounded: the hardware guarantees these transfer classes complete.
    fn wait_bus_idle(&mut self) {
        while self.bus.dma_busy() || self.bus.io_busy() {
            // busy loop
        }
    }

    /// Read one word from a bus address. Caller must hold the lock.
    pub fn read_word(&mut self, addr: u32) -> u32 {
        self.wait_bus_idle();
        self.bus.load(addr)
    }

    /// Write one word to a bus address. Caller must hold the lock.
    pub fn write_word(&mut self, addr: u32, value: u32) {
        self.wait_bus_idle();
        self.bus.store(addr, value);
    }

    /// Read a cartridge register by logical index. Caller must hold the
    /// lock. Indices are not range-checked.
    pub fn reg_read(&mut self, index: u32) -> u32 {
        self.read_word(reg_addr(index))
    }

    /// Write a cartridge register by logical index. Caller must hold the
    /// lock. Indices are not range-checked.
    pub fn reg_write(&mut self, index: u32, value: u32) {
        self.write_word(reg_addr(index), value);
    }

    // -----------------------------------------------------------------------
    // Byte-granular PIO
    // -----------------------------------------------------------------------

    /// Read `dst.len()` bytes starting at an arbitrary device address.
    ///
    /// The bus only moves aligned words, so this walks the word span
    /// covering the byte range and keeps only the lanes inside it. Byte
    /// lanes are most-significant-first. Caller must hold the lock.
    pub fn pio_read(&mut self, dev_addr: u32, dst: &mut [u8]) {
        if dst.is_empty() {
            return;
        }
        let end = dev_addr + dst.len() as u32;
        let mut word_addr = dev_addr & !3;
        while word_addr < end {
            let word = self.read_word(word_addr);
            for lane in 0..4 {
                let pos = word_addr + lane;
                if (dev_addr..end).contains(&pos) {
                    dst[(pos - dev_addr) as usize] = (word >> (8 * (3 - lane))) as u8;
                }
            }
            word_addr += 4;
        }
    }

    /// Write `src.len()` bytes starting at an arbitrary device address.
    ///
    /// Each word in the covering span is read back first and the caller's
    /// bytes overlaid lane by lane, so device bytes that share a word with
    /// the range but fall outside it survive. A plain partial-word store
    /// would corrupt them. Caller must hold the lock.
    pub fn pio_write(&mut self, dev_addr: u32, src: &[u8]) {
        if src.is_empty() {
            return;
        }
        let end = dev_addr + src.len() as u32;
        let mut word_addr = dev_addr & !3;
        while word_addr < end {
            let mut word = self.read_word(word_addr);
            for lane in 0..4 {
                let pos = word_addr + lane;
                if (dev_addr..end).contains(&pos) {
                    let shift = 8 * (3 - lane);
                    word &= !(0xFF << shift);
                    word |= u32::from(src[(pos - dev_addr) as usize]) << shift;
                }
            }
            self.write_word(word_addr, word);
            word_addr += 4;
        }
    }

    // -----------------------------------------------------------------------
    // Detection
    // -----------------------------------------------------------------------

    /// One-shot hardware probe. Idempotent, safe to call every frame.
    ///
    /// The first call writes the unlock key and matches the identification
    /// signature; a mismatch re-locks the register file so an unknown
    /// device is left in its power-on state. Later calls return the cached
    /// answer with no bus activity.
    pub fn detect(&mut self) -> bool {
        if self.detection == Detection::Unknown {
            self.lock();
            self.reg_write(REG_KEY, KEY_UNLOCK);
            let signature = self.reg_read(REG_EDID) >> 16;
            match Variant::from_signature(signature) {
                Some(variant) => {
                    if variant == Variant::SeriesX {
                        // X-series powers up with the USB bridge disabled
                        self.reg_write(REG_SYS_CFG, 0);
                    }
                    self.unlock();
                    self.detection = Detection::Present(variant);
                }
                None => {
                    self.reg_write(REG_KEY, KEY_LOCK);
                    self.unlock();
                    self.detection = Detection::NotPresent;
                }
            }
        }
        matches!(self.detection, Detection::Present(_))
    }

    /// Cartridge generation, if one was detected.
    #[must_use]
    pub fn variant(&self) -> Option<Variant> {
        match self.detection {
            Detection::Present(variant) => Some(variant),
            _ => None,
        }
    }

    /// Raw detection state.
    #[must_use]
    pub fn detection(&self) -> Detection {
        self.detection
    }
}
