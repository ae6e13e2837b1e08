// Author: Lukas Bower
// Purpose: Abstract the device register window used by the PIO engine.

//! Hardware access layer.
//!
//! The engine reaches the device only through [`Bus`]: fixed-width register
//! reads and writes at byte offsets inside the core's MMIO window, plus a
//! short busy delay. [`MmioBus`] drives a real mapping with volatile
//! accesses; [`sim::SimBus`] models the PIO FIFOs for host-side runs.
#![allow(unsafe_code)]

use core::ptr::{self, NonNull};
use std::time::{Duration, Instant};

pub mod regs;
pub mod sim;

/// Register access to the wireless core.
///
/// Offsets are byte offsets from the core's register base. Implementations
/// must not reorder accesses to the same offset.
pub trait Bus {
    /// Read a 16-bit register.
    fn read16(&self, offset: u16) -> u16;
    /// Read a 32-bit register.
    fn read32(&self, offset: u16) -> u32;
    /// Write a 16-bit register.
    fn write16(&self, offset: u16, value: u16);
    /// Write a 32-bit register.
    fn write32(&self, offset: u16, value: u32);
    /// Busy-wait for roughly `micros` microseconds.
    fn delay_us(&self, micros: u32);
}

/// Volatile accessor for a mapped register window.
#[derive(Debug)]
pub struct MmioBus {
    base: NonNull<u8>,
    len: usize,
}

// The mapping is device memory; every access is a single volatile load or store.
unsafe impl Send for MmioBus {}
unsafe impl Sync for MmioBus {}

impl MmioBus {
    /// Wrap an existing mapping.
    ///
    /// # Safety
    /// `base` must point to a device mapping of at least `len` bytes that
    /// stays valid for the lifetime of the returned value.
    pub unsafe fn new(base: NonNull<u8>, len: usize) -> Self {
        Self { base, len }
    }

    /// Length of the mapped window in bytes.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.len
    }

    /// Returns true if the window is empty.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.len == 0
    }

    #[inline(always)]
    fn reg<T>(&self, offset: u16) -> *mut T {
        let offset = usize::from(offset);
        assert!(
            offset + core::mem::size_of::<T>() <= self.len,
            "register offset {offset:#x} outside mmio window"
        );
        unsafe { self.base.as_ptr().add(offset).cast::<T>() }
    }
}

impl Bus for MmioBus {
    #[inline(always)]
    fn read16(&self, offset: u16) -> u16 {
        unsafe { ptr::read_volatile(self.reg::<u16>(offset)) }
    }

    #[inline(always)]
    fn read32(&self, offset: u16) -> u32 {
        unsafe { ptr::read_volatile(self.reg::<u32>(offset)) }
    }

    #[inline(always)]
    fn write16(&self, offset: u16, value: u16) {
        unsafe { ptr::write_volatile(self.reg::<u16>(offset), value) }
    }

    #[inline(always)]
    fn write32(&self, offset: u16, value: u32) {
        unsafe { ptr::write_volatile(self.reg::<u32>(offset), value) }
    }

    fn delay_us(&self, micros: u32) {
        let deadline = Instant::now() + Duration::from_micros(u64::from(micros));
        while Instant::now() < deadline {
            core::hint::spin_loop();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mmio_bus_round_trips_through_backing_memory() {
        let mut backing = [0u32; 4];
        let base = NonNull::new(backing.as_mut_ptr().cast::<u8>()).unwrap();
        let bus = unsafe { MmioBus::new(base, 16) };

        bus.write32(0x04, 0xdead_beef);
        bus.write16(0x08, 0x1234);
        assert_eq!(bus.read32(0x04), 0xdead_beef);
        assert_eq!(bus.read16(0x08), 0x1234);
        assert_eq!(bus.len(), 16);
    }

    #[test]
    #[should_panic(expected = "outside mmio window")]
    fn mmio_bus_rejects_offsets_past_the_window() {
        let mut backing = [0u32; 1];
        let base = NonNull::new(backing.as_mut_ptr().cast::<u8>()).unwrap();
        let bus = unsafe { MmioBus::new(base, 4) };
        let _ = bus.read32(0x04);
    }
}
