//! Cloneable device handle implementing the driver-facing contract.
//!
//! One logical device has one register bank: register access is a critical
//! section, so every operation here serializes through a single mutex. None
//! of the device operations block while holding the lock; the only bounded
//! wait, [`SlateGpu::wait_for_flip`], polls with the lock released between
//! iterations.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use crate::bars::{SlateGpuRegMmio, SlateGpuVramMmio};
use crate::device::{SlateGpuConfig, SlateGpuDevice};
use crate::error::SlateGpuError;
use crate::framebuffer::FramebufferInfo;

/// Shared handle to one device instance.
///
/// Clones refer to the same device, letting a guest-facing MMIO path, a
/// driver-facing control path and a presenter coexist. There is no global
/// device singleton; each handle owns its instance.
#[derive(Clone)]
pub struct SlateGpu {
    inner: Arc<Mutex<SlateGpuDevice>>,
}

impl Default for SlateGpu {
    fn default() -> Self {
        Self::new(SlateGpuConfig::default())
    }
}

impl SlateGpu {
    /// Reference flip-wait budget: 100 polls of 1ms.
    const FLIP_POLL_INTERVAL: Duration = Duration::from_millis(1);
    pub const FLIP_WAIT_BUDGET: Duration = Duration::from_millis(100);

    pub fn new(config: SlateGpuConfig) -> Self {
        Self {
            inner: Arc::new(Mutex::new(SlateGpuDevice::new_with_config(config))),
        }
    }

    /// Locks the device. A poisoned mutex is not fatal: device state is plain
    /// data and every mutation is complete before the lock drops, so the
    /// inner value is still consistent.
    pub fn device(&self) -> MutexGuard<'_, SlateGpuDevice> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Register window MMIO handler for bus integration.
    pub fn reg_mmio_handler(&self) -> SlateGpuRegMmio {
        SlateGpuRegMmio::new(self.clone())
    }

    /// VRAM aperture MMIO handler for bus integration.
    pub fn vram_mmio_handler(&self) -> SlateGpuVramMmio {
        SlateGpuVramMmio::new(self.clone())
    }

    pub fn setup_framebuffer(
        &self,
        width: u32,
        height: u32,
        bpp: u32,
    ) -> Result<(), SlateGpuError> {
        self.device().setup_framebuffer(width, height, bpp)
    }

    pub fn setup_multi_framebuffer(
        &self,
        count: u32,
        width: u32,
        height: u32,
        bpp: u32,
    ) -> Result<(), SlateGpuError> {
        self.device()
            .setup_multi_framebuffer(count, width, height, bpp)
    }

    pub fn enable_display(&self, enable: bool) {
        self.device().enable_display(enable);
    }

    pub fn request_flip(&self, target_index: u32, wait: bool) -> Result<(), SlateGpuError> {
        self.device().request_flip(target_index, wait)?;
        if wait {
            self.wait_for_flip(Self::FLIP_WAIT_BUDGET)?;
        }
        Ok(())
    }

    /// Polls the flip-pending flag until it clears or `timeout` elapses.
    ///
    /// Flips currently complete synchronously, so this returns immediately;
    /// the bounded-spin contract is kept for an asynchronous vblank variant.
    pub fn wait_for_flip(&self, timeout: Duration) -> Result<(), SlateGpuError> {
        let deadline = Instant::now() + timeout;
        loop {
            if !self.device().flip_pending() {
                return Ok(());
            }
            if Instant::now() >= deadline {
                return Err(SlateGpuError::Timeout);
            }
            std::thread::sleep(Self::FLIP_POLL_INTERVAL);
        }
    }

    pub fn framebuffer_info(&self) -> FramebufferInfo {
        self.device().framebuffer_info()
    }

    pub fn set_cursor_position(&self, x: i32, y: i32) {
        self.device().set_cursor_position(x, y);
    }

    pub fn set_cursor_hotspot(&self, x: u32, y: u32) {
        self.device().set_cursor_hotspot(x, y);
    }

    pub fn enable_cursor(&self, enable: bool) {
        self.device().enable_cursor(enable);
    }

    pub fn upload_cursor(&self, pixels: &[u32]) -> Result<(), SlateGpuError> {
        self.device().upload_cursor(pixels)
    }

    pub fn vram_size(&self) -> usize {
        self.device().vram_size()
    }
}
