//! Slate GPU device model.
//!
//! This crate is intentionally self-contained so it can be wired into a
//! machine emulator later. It models a simple register-programmable display
//! adapter:
//! - a 4KiB MMIO register window (BAR0-style) decoding the control/status
//!   register file,
//! - a flat VRAM aperture (BAR1-style) that guests write pixel data into
//!   directly,
//! - a 1..4 buffer page-flip protocol with a vblank counter,
//! - a 64x64 ARGB hardware cursor with a streaming upload register, and
//! - a compositor that produces the output surface (active framebuffer plus
//!   cursor overlay) on demand, gated by a coarse dirty flag.
//!
//! The output surface format is packed 32-bit ARGB words (`0xAARRGGBB`); the
//! device only scans out 32bpp framebuffers. There is no command processor,
//! no interrupt generation and no real vblank timing: page flips complete
//! synchronously and the `STATUS` vblank bit is driven by an externally
//! ticked deterministic clock (see [`SlateGpuDevice::tick`]).
#![forbid(unsafe_code)]

mod bars;
mod compositor;
mod cursor;
mod device;
mod error;
mod framebuffer;
mod regs;
mod shared;

pub use bars::{MmioHandler, SlateGpuRegMmio, SlateGpuVramMmio};
pub use cursor::{CursorOverlay, CURSOR_DIM, CURSOR_PIXELS};
pub use device::{SlateGpuConfig, SlateGpuDevice};
pub use error::SlateGpuError;
pub use framebuffer::{FramebufferInfo, FramebufferManager, MAX_FRAMEBUFFERS};
pub use regs::{control_bits, mmio, status_bits};
pub use shared::SlateGpu;

/// Value of the read-only `DEVICE_ID` register.
pub const SLATE_GPU_DEVICE_ID: u32 = 0x1122;

/// Size of the MMIO register window in bytes.
pub const SLATE_GPU_REG_WINDOW: u64 = 4 * 1024;

/// Default VRAM aperture size in bytes.
pub const SLATE_GPU_VRAM_SIZE: usize = 16 * 1024 * 1024;

/// Host-facing presentation contract.
///
/// The front buffer only changes on [`DisplayOutput::present`], which
/// recomposes the frame when the device is dirty and output is enabled.
pub trait DisplayOutput {
    /// Returns the current visible framebuffer (front buffer) as packed ARGB.
    fn get_framebuffer(&self) -> &[u32];

    /// Returns the current output resolution.
    fn get_resolution(&self) -> (u32, u32);

    /// Re-renders into the front buffer if necessary.
    fn present(&mut self);
}
