//! Framebuffer layout and the page-flip state machine.
//!
//! The manager owns the register-visible scanout geometry (width, height,
//! bpp, pitch, base address) and the multi-buffer layout: up to
//! [`MAX_FRAMEBUFFERS`] equally sized buffers packed contiguously from VRAM
//! offset 0. Flips complete synchronously: this emulated hardware switches
//! buffers at request time rather than at the next real vertical blank, so
//! `pending` is never externally observable as set. The `Busy` arm is kept so
//! the published contract survives a future asynchronous vblank variant.

use crate::error::SlateGpuError;

/// Maximum number of framebuffers in a multi-buffer layout.
pub const MAX_FRAMEBUFFERS: usize = 4;

/// Reset-time scanout geometry (also the realize-time default).
pub(crate) const DEFAULT_WIDTH: u32 = 800;
pub(crate) const DEFAULT_HEIGHT: u32 = 600;
pub(crate) const DEFAULT_BPP: u32 = 32;

/// Read-only layout snapshot for the driver-facing query operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FramebufferInfo {
    pub count: u32,
    pub current: u32,
    /// Per-buffer size in bytes.
    pub size: u64,
    /// VRAM byte offsets of each buffer; only the first `count` are live.
    pub offsets: [u32; MAX_FRAMEBUFFERS],
}

/// Scanout geometry plus the multi-buffer flip state machine.
#[derive(Debug, Clone)]
pub struct FramebufferManager {
    vram_capacity: u64,

    // Register-visible scanout descriptor.
    width: u32,
    height: u32,
    bpp: u32,
    pitch: u32,
    fb_addr: u32,

    // Multi-buffer layout, recomputed by the setup operations.
    count: u32,
    size: u64,
    offsets: [u32; MAX_FRAMEBUFFERS],

    // Flip state. `Idle --request_flip--> FlipPending --(synchronous
    // completion)--> Idle` is the only cycle.
    current: u32,
    next: u32,
    pending: bool,
    vblank_count: u32,
}

impl FramebufferManager {
    pub fn new(vram_capacity: u64) -> Self {
        let pitch = DEFAULT_WIDTH * (DEFAULT_BPP / 8);
        Self {
            vram_capacity,
            width: DEFAULT_WIDTH,
            height: DEFAULT_HEIGHT,
            bpp: DEFAULT_BPP,
            pitch,
            fb_addr: 0,
            count: 1,
            size: u64::from(pitch) * u64::from(DEFAULT_HEIGHT),
            offsets: [0; MAX_FRAMEBUFFERS],
            current: 0,
            next: 0,
            pending: false,
            vblank_count: 0,
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn bpp(&self) -> u32 {
        self.bpp
    }

    pub fn pitch(&self) -> u32 {
        self.pitch
    }

    pub fn fb_addr(&self) -> u32 {
        self.fb_addr
    }

    pub fn count(&self) -> u32 {
        self.count
    }

    pub fn current(&self) -> u32 {
        self.current
    }

    pub fn next(&self) -> u32 {
        self.next
    }

    pub fn pending(&self) -> bool {
        self.pending
    }

    pub fn vblank_count(&self) -> u32 {
        self.vblank_count
    }

    // Raw register stores. Guest-programmed values are taken as-is; pitch is
    // rederived whenever width or bpp changes.
    pub(crate) fn set_fb_addr(&mut self, value: u32) {
        self.fb_addr = value;
    }

    pub(crate) fn set_width(&mut self, value: u32) {
        self.width = value;
        self.pitch = self.width.wrapping_mul(self.bpp / 8);
    }

    pub(crate) fn set_height(&mut self, value: u32) {
        self.height = value;
    }

    pub(crate) fn set_bpp(&mut self, value: u32) {
        self.bpp = value;
        self.pitch = self.width.wrapping_mul(self.bpp / 8);
    }

    pub(crate) fn set_pitch(&mut self, value: u32) {
        self.pitch = value;
    }

    /// `CTRL_RESET` semantics: reinitialize the active descriptor only. The
    /// buffer count and flip state survive a reset.
    pub(crate) fn reset_descriptor(&mut self) {
        self.width = DEFAULT_WIDTH;
        self.height = DEFAULT_HEIGHT;
        self.bpp = DEFAULT_BPP;
        self.pitch = DEFAULT_WIDTH * (DEFAULT_BPP / 8);
        self.fb_addr = 0;
    }

    // Saturating math: the guest controls every operand, and a saturated size
    // always fails the capacity check rather than wrapping past it.
    fn layout(width: u32, height: u32, bpp: u32) -> (u64, u64) {
        let pitch = u64::from(width) * u64::from(bpp / 8);
        (pitch, pitch.saturating_mul(u64::from(height)))
    }

    /// Programs a single framebuffer at VRAM offset 0.
    pub fn setup_single(&mut self, width: u32, height: u32, bpp: u32) -> Result<(), SlateGpuError> {
        let (pitch, size) = Self::layout(width, height, bpp);
        if size > self.vram_capacity || pitch > u64::from(u32::MAX) {
            return Err(SlateGpuError::OutOfMemory {
                required: size.max(pitch),
                capacity: self.vram_capacity,
            });
        }

        self.width = width;
        self.height = height;
        self.bpp = bpp;
        self.pitch = pitch as u32;
        self.fb_addr = 0;
        self.count = 1;
        self.size = size;
        self.offsets = [0; MAX_FRAMEBUFFERS];
        self.current = 0;
        self.next = 0;
        self.pending = false;
        Ok(())
    }

    /// Programs `count` contiguous equally sized buffers starting at VRAM
    /// offset 0 and resets the flip state to buffer 0.
    pub fn setup_multi(
        &mut self,
        count: u32,
        width: u32,
        height: u32,
        bpp: u32,
    ) -> Result<(), SlateGpuError> {
        if count == 0 || count as usize > MAX_FRAMEBUFFERS {
            return Err(SlateGpuError::InvalidArgument(
                "framebuffer count must be 1..=4",
            ));
        }
        let (pitch, size) = Self::layout(width, height, bpp);
        let total = size.saturating_mul(u64::from(count));
        if total > self.vram_capacity || pitch > u64::from(u32::MAX) {
            return Err(SlateGpuError::OutOfMemory {
                required: total.max(pitch),
                capacity: self.vram_capacity,
            });
        }

        self.width = width;
        self.height = height;
        self.bpp = bpp;
        self.pitch = pitch as u32;
        self.count = count;
        self.size = size;
        for (i, offset) in self.offsets.iter_mut().enumerate() {
            // total <= capacity <= u32::MAX, so each offset fits.
            *offset = if (i as u32) < count {
                (size * i as u64) as u32
            } else {
                0
            };
        }
        self.current = 0;
        self.next = 0;
        self.pending = false;
        self.fb_addr = 0;
        Ok(())
    }

    /// Reprograms the buffer count using the current geometry (`FB_COUNT`
    /// register path).
    pub(crate) fn program_count(&mut self, count: u32) -> Result<(), SlateGpuError> {
        let (width, height, bpp) = (self.width, self.height, self.bpp);
        self.setup_multi(count, width, height, bpp)
    }

    /// Requests a flip to `target` and completes it synchronously: `current`
    /// takes the target, the vblank counter advances by one and the scanout
    /// base address is reprogrammed to the new buffer.
    pub fn request_flip(&mut self, target: u32) -> Result<(), SlateGpuError> {
        if target >= self.count {
            return Err(SlateGpuError::InvalidArgument(
                "flip target exceeds framebuffer count",
            ));
        }
        if self.pending {
            return Err(SlateGpuError::Busy);
        }

        self.next = target;
        self.pending = true;

        // Synchronous completion.
        self.current = self.next;
        self.pending = false;
        self.vblank_count = self.vblank_count.wrapping_add(1);
        self.fb_addr = self.offsets[self.current as usize];
        Ok(())
    }

    pub fn describe(&self) -> FramebufferInfo {
        FramebufferInfo {
            count: self.count,
            current: self.current,
            size: self.size,
            offsets: self.offsets,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    const CAPACITY: u64 = 16 * 1024 * 1024;

    #[test]
    fn realize_defaults_are_800x600x32() {
        let fb = FramebufferManager::new(CAPACITY);
        assert_eq!(fb.width(), 800);
        assert_eq!(fb.height(), 600);
        assert_eq!(fb.bpp(), 32);
        assert_eq!(fb.pitch(), 3200);
        assert_eq!(fb.count(), 1);
        assert_eq!(fb.fb_addr(), 0);
        assert!(!fb.pending());
    }

    #[test]
    fn setup_single_computes_pitch_and_size() {
        let mut fb = FramebufferManager::new(CAPACITY);
        fb.setup_single(1024, 768, 32).unwrap();
        assert_eq!(fb.pitch(), 4096);
        assert_eq!(fb.describe().size, 3_145_728);
        assert_eq!(fb.fb_addr(), 0);
    }

    #[test]
    fn setup_single_rejects_oversized_layout() {
        let mut fb = FramebufferManager::new(1024 * 768 * 4 - 1);
        let err = fb.setup_single(1024, 768, 32).unwrap_err();
        assert_eq!(
            err,
            SlateGpuError::OutOfMemory {
                required: 1024 * 768 * 4,
                capacity: 1024 * 768 * 4 - 1,
            }
        );
        // Prior descriptor is untouched.
        assert_eq!(fb.width(), 800);
        assert_eq!(fb.pitch(), 3200);
    }

    #[test]
    fn setup_multi_lays_out_contiguous_buffers() {
        let mut fb = FramebufferManager::new(CAPACITY);
        fb.setup_multi(2, 800, 600, 32).unwrap();
        let info = fb.describe();
        assert_eq!(info.count, 2);
        assert_eq!(info.current, 0);
        assert_eq!(info.size, 800 * 600 * 4);
        assert_eq!(info.offsets, [0, 800 * 600 * 4, 0, 0]);
    }

    #[test]
    fn setup_multi_rejects_bad_count_and_oversized_layout() {
        let mut fb = FramebufferManager::new(CAPACITY);
        assert_eq!(
            fb.setup_multi(5, 640, 480, 32).unwrap_err(),
            SlateGpuError::InvalidArgument("framebuffer count must be 1..=4"),
        );
        assert_eq!(
            fb.setup_multi(0, 640, 480, 32).unwrap_err(),
            SlateGpuError::InvalidArgument("framebuffer count must be 1..=4"),
        );

        fb.setup_multi(2, 800, 600, 32).unwrap();
        let before = fb.describe();
        // 4 buffers of 1600x1200x32 need ~30MiB.
        assert!(matches!(
            fb.setup_multi(4, 1600, 1200, 32),
            Err(SlateGpuError::OutOfMemory { .. })
        ));
        assert_eq!(fb.describe(), before);
        assert_eq!(fb.width(), 800);
    }

    #[test]
    fn flip_completes_synchronously() {
        let mut fb = FramebufferManager::new(CAPACITY);
        fb.setup_multi(2, 800, 600, 32).unwrap();

        fb.request_flip(1).unwrap();
        let info = fb.describe();
        assert_eq!(info.current, 1);
        assert!(!fb.pending());
        assert_eq!(fb.vblank_count(), 1);
        assert_eq!(fb.fb_addr(), 800 * 600 * 4);

        fb.request_flip(0).unwrap();
        assert_eq!(fb.describe().current, 0);
        assert_eq!(fb.vblank_count(), 2);
        assert_eq!(fb.fb_addr(), 0);
    }

    #[test]
    fn flip_rejects_out_of_range_target() {
        let mut fb = FramebufferManager::new(CAPACITY);
        fb.setup_multi(2, 800, 600, 32).unwrap();
        fb.request_flip(1).unwrap();

        let err = fb.request_flip(2).unwrap_err();
        assert_eq!(
            err,
            SlateGpuError::InvalidArgument("flip target exceeds framebuffer count"),
        );
        // current/next unchanged by the failed request.
        assert_eq!(fb.current(), 1);
        assert_eq!(fb.next(), 1);
        assert_eq!(fb.vblank_count(), 1);
    }

    proptest! {
        #[test]
        fn setup_single_accepts_any_layout_that_fits(
            width in 1u32..4096,
            height in 1u32..4096,
        ) {
            let mut fb = FramebufferManager::new(CAPACITY);
            let size = u64::from(width) * u64::from(height) * 4;
            let result = fb.setup_single(width, height, 32);
            if size <= CAPACITY {
                prop_assert!(result.is_ok());
                prop_assert_eq!(fb.pitch(), width * 4);
                prop_assert_eq!(fb.describe().size, size);
            } else {
                prop_assert_eq!(
                    result,
                    Err(SlateGpuError::OutOfMemory { required: size, capacity: CAPACITY })
                );
            }
        }
    }
}
