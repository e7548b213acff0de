//! Guest-visible register layout for the MMIO register window.
//!
//! Offsets are byte addresses into the 4KiB control region. The register file
//! is sparse: offsets not listed here do not decode. Reads return 0 and
//! writes are dropped with a diagnostic; the device never faults the guest.

/// Register offsets (byte addresses into the register window).
pub mod mmio {
    /// Fixed device identifier (read-only).
    pub const DEVICE_ID: u64 = 0x00;
    /// Device status (read-only); see [`super::status_bits`].
    pub const STATUS: u64 = 0x04;
    /// Control register; see [`super::control_bits`].
    pub const CONTROL: u64 = 0x08;
    /// Active framebuffer byte offset in VRAM.
    pub const FB_ADDR: u64 = 0x0C;
    /// Framebuffer width in pixels.
    pub const FB_WIDTH: u64 = 0x10;
    /// Framebuffer height in pixels.
    pub const FB_HEIGHT: u64 = 0x14;
    /// Bits per pixel (32 is the only depth the compositor scans out).
    pub const FB_BPP: u64 = 0x18;
    /// Scanout enable (0/1).
    pub const FB_ENABLE: u64 = 0x1C;
    /// Bytes per scanline.
    pub const FB_PITCH: u64 = 0x20;
    /// Cursor position X.
    pub const CURSOR_X: u64 = 0x24;
    /// Cursor position Y.
    pub const CURSOR_Y: u64 = 0x28;
    /// Cursor enable (0/1).
    pub const CURSOR_ENABLE: u64 = 0x2C;
    /// Cursor hotspot X offset.
    pub const CURSOR_HOTSPOT_X: u64 = 0x30;
    /// Cursor hotspot Y offset.
    pub const CURSOR_HOTSPOT_Y: u64 = 0x34;
    /// Streaming cursor pixel upload (write-only); each write pushes one ARGB
    /// pixel at the internal upload cursor.
    pub const CURSOR_UPLOAD: u64 = 0x38;
    /// Framebuffer count (1..4).
    pub const FB_COUNT: u64 = 0x3C;
    /// Index of the buffer currently scanned out (read-only).
    pub const FB_CURRENT: u64 = 0x40;
    /// Requested flip target index.
    pub const FB_NEXT: u64 = 0x44;
    /// Page-flip trigger (write-only); any nonzero write requests a flip to
    /// the index in [`FB_NEXT`].
    pub const PAGE_FLIP: u64 = 0x48;
    /// Flip-pending flag (read-only, 0/1).
    pub const FLIP_PENDING: u64 = 0x4C;
    /// Monotonically increasing flip/vblank counter (read-only).
    pub const VBLANK_COUNT: u64 = 0x50;
}

/// `CONTROL` register bits.
pub mod control_bits {
    /// Self-clearing device reset.
    pub const RESET: u32 = 1 << 0;
    /// Device enable.
    pub const ENABLE: u32 = 1 << 1;
}

/// `STATUS` register bits.
pub mod status_bits {
    /// Always set once the device is realized.
    pub const READY: u32 = 1 << 0;
    /// Vertical retrace pulse, driven by the deterministic device clock.
    pub const VBLANK: u32 = 1 << 1;
    /// Set once a full 4096-pixel cursor image has been uploaded.
    pub const CURSOR_LOADED: u32 = 1 << 2;
}
