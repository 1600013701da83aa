//! Peripheral interface (PI) bus capability.

/// Host-side access to the N64 peripheral interface.
///
/// Cartridge drivers program the bus through this trait. On hardware the
/// methods map to MMIO loads and stores of the PI register block plus the
/// CPU status register; in tests they map to a simulated register file.
///
/// The raw [`load`](PiBus::load) / [`store`](PiBus::store) transfers do not
/// wait for the bus to go idle — callers are expected to check
/// [`dma_busy`](PiBus::dma_busy) and [`io_busy`](PiBus::io_busy) first.
pub trait PiBus {
    /// Whether a PI DMA transfer is currently in progress.
    fn dma_busy(&mut self) -> bool;

    /// Whether an explicit PI I/O transfer is currently in progress.
    fn io_busy(&mut self) -> bool;

    /// Raw 32-bit load from a bus address. No idle wait.
    fn load(&mut self, addr: u32) -> u32;

    /// Raw 32-bit store to a bus address. No idle wait.
    fn store(&mut self, addr: u32, value: u32);

    /// Domain 1 latency timing register.
    fn latency(&mut self) -> u32;

    /// Program the domain 1 latency timing register.
    fn set_latency(&mut self, value: u32);

    /// Domain 1 pulse-width timing register.
    fn pulse_width(&mut self) -> u32;

    /// Program the domain 1 pulse-width timing register.
    fn set_pulse_width(&mut self, value: u32);

    /// Write the CPU external-interrupt-enable flag, returning the
    /// previous value.
    fn set_interrupts(&mut self, enabled: bool) -> bool;

    /// Obtain exclusive ownership of the PI. Blocks on the surrounding
    /// system's arbitration.
    fn acquire(&mut self);

    /// Give up exclusive ownership of the PI.
    fn release(&mut self);
}
