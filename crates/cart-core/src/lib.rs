//! Core traits and types for cartridge host-bus access.
//!
//! Everything that touches the peripheral interface goes through [`PiBus`].
//! Drivers stay hardware-agnostic; tests run against [`SimplePi`] or a
//! richer device model.

mod bus;
mod simple;

pub use bus::PiBus;
pub use simple::SimplePi;
