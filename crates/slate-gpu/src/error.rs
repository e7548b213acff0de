use thiserror::Error;

/// Typed errors surfaced by the driver-facing operations.
///
/// Register-level protocol violations (unknown offsets, read-only writes,
/// out-of-range MMIO) are never errors: the emulated hardware absorbs them
/// and logs a diagnostic instead of faulting the guest. Every failure here
/// leaves the previously valid device state unchanged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum SlateGpuError {
    #[error("invalid argument: {0}")]
    InvalidArgument(&'static str),

    #[error("framebuffer layout needs {required} bytes but VRAM holds {capacity}")]
    OutOfMemory { required: u64, capacity: u64 },

    #[error("a page flip is already pending")]
    Busy,

    #[error("timed out waiting for page flip completion")]
    Timeout,

    #[error("unsupported pixel depth: {bpp} bpp")]
    Unsupported { bpp: u32 },
}
