//! armor-flash-core: packet framing, unlock handshake, sector flashing and
//! profile model for the Holtek HT68FB571-based Armor gaming mouse.
//!
//! The device accepts configuration only after a fixed unlock handshake.
//! Sectors are then written in a fixed order, committed to flash, and the
//! volatile runtime registers are re-asserted once the device has copied
//! flash back into RAM.
//!
//! Only one [`session::DeviceSession`] may talk to the mouse at a time, and
//! the vendor control application must be closed before a run starts.

pub mod buttons;
pub mod comm;
pub mod config;
pub mod device;
pub mod error;
pub mod flash;
#[cfg(test)]
mod integration_tests;
pub mod macros;
pub mod packet;
pub mod profile;
pub mod runtime;
pub mod safety;
pub mod sectors;
pub mod session;
pub mod transport;

/// Holtek Semiconductor USB Vendor ID.
pub const HOLTEK_VID: u16 = 0x04D9;

/// Known product IDs.
pub mod pids {
    /// Armor M1 (HT68FB571 MCU).
    pub const ARMOR_M1: u16 = 0xA09F;
}
