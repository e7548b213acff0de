//! Guest-facing MMIO shims for the two device apertures.
//!
//! [`MmioHandler`] is the bus-side contract a machine integration maps these
//! handlers under: offset-addressed accesses of 1, 2, 4 or 8 bytes with
//! little-endian value packing, independent of host endianness. Addresses
//! inside the register window decode through the register file; the VRAM
//! aperture bypasses the register protocol entirely and is raw byte storage.

use crate::shared::SlateGpu;

/// Byte-offset MMIO access contract.
pub trait MmioHandler {
    fn read(&mut self, offset: u64, size: usize) -> u64;
    fn write(&mut self, offset: u64, size: usize, value: u64);
}

/// Register window handler (BAR0-style).
pub struct SlateGpuRegMmio {
    dev: SlateGpu,
}

impl SlateGpuRegMmio {
    pub(crate) fn new(dev: SlateGpu) -> Self {
        Self { dev }
    }
}

impl MmioHandler for SlateGpuRegMmio {
    fn read(&mut self, offset: u64, size: usize) -> u64 {
        self.dev.device().reg_read(offset, size)
    }

    fn write(&mut self, offset: u64, size: usize, value: u64) {
        self.dev.device().reg_write(offset, size, value);
    }
}

/// VRAM aperture handler (BAR1-style). Any in-range write marks the device
/// dirty, modeling direct pixel stores through a driver mapping.
pub struct SlateGpuVramMmio {
    dev: SlateGpu,
}

impl SlateGpuVramMmio {
    pub(crate) fn new(dev: SlateGpu) -> Self {
        Self { dev }
    }
}

impl MmioHandler for SlateGpuVramMmio {
    fn read(&mut self, offset: u64, size: usize) -> u64 {
        self.dev.device().vram_read(offset, size)
    }

    fn write(&mut self, offset: u64, size: usize, value: u64) {
        self.dev.device().vram_write(offset, size, value);
    }
}
