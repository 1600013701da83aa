//! Flat-memory PI bus for tests.

use std::collections::HashMap;

use crate::bus::PiBus;

/// A [`PiBus`] over a flat, sparse word store.
///
/// The bus is never busy unless told to be, arbitration always succeeds,
/// and every operation is counted so tests can assert on transaction
/// totals and acquire/release balance.
pub struct SimplePi {
    /// Word-aligned address → stored word. Unwritten words read as 0.
    mem: HashMap<u32, u32>,
    latency: u32,
    pulse_width: u32,
    interrupts_enabled: bool,
    access_depth: u32,
    /// Remaining `dma_busy` queries that report busy.
    busy_polls: u32,
    loads: u64,
    stores: u64,
    acquires: u64,
    releases: u64,
}

impl SimplePi {
    /// Create an idle bus with interrupts enabled.
    #[must_use]
    pub fn new() -> Self {
        Self {
            mem: HashMap::new(),
            latency: 0x40,
            pulse_width: 0x12,
            interrupts_enabled: true,
            access_depth: 0,
            busy_polls: 0,
            loads: 0,
            stores: 0,
            acquires: 0,
            releases: 0,
        }
    }

    /// Report busy for the next `polls` status queries.
    pub fn set_busy_polls(&mut self, polls: u32) {
        self.busy_polls = polls;
    }

    /// Total word transfers (loads + stores) seen so far.
    #[must_use]
    pub fn transactions(&self) -> u64 {
        self.loads + self.stores
    }

    /// Number of `acquire` calls seen so far.
    #[must_use]
    pub fn acquires(&self) -> u64 {
        self.acquires
    }

    /// Number of `release` calls seen so far.
    #[must_use]
    pub fn releases(&self) -> u64 {
        self.releases
    }

    /// Current arbitration nesting depth (0 = not owned).
    #[must_use]
    pub fn access_depth(&self) -> u32 {
        self.access_depth
    }

    /// Current interrupt-enable flag.
    #[must_use]
    pub fn interrupts_enabled(&self) -> bool {
        self.interrupts_enabled
    }

    /// Word at a (word-aligned) address without counting a transaction.
    #[must_use]
    pub fn peek(&self, addr: u32) -> u32 {
        self.mem.get(&(addr & !3)).copied().unwrap_or(0)
    }

    /// Set a word without counting a transaction.
    pub fn poke(&mut self, addr: u32, value: u32) {
        self.mem.insert(addr & !3, value);
    }
}

impl Default for SimplePi {
    fn default() -> Self {
        Self::new()
    }
}

impl PiBus for SimplePi {
    fn dma_busy(&mut self) -> bool {
        if self.busy_polls > 0 {
            self.busy_polls -= 1;
            true
        } else {
            false
        }
    }

    fn io_busy(&mut self) -> bool {
        false
    }

    fn load(&mut self, addr: u32) -> u32 {
        self.loads += 1;
        self.mem.get(&(addr & !3)).copied().unwrap_or(0)
    }

    fn store(&mut self, addr: u32, value: u32) {
        self.stores += 1;
        self.mem.insert(addr & !3, value);
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
        self.acquires += 1;
        self.access_depth += 1;
    }

    fn release(&mut self) {
        self.releases += 1;
        self.access_depth -= 1;
    }
}
