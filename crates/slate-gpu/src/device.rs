//! The Slate GPU device: register decode, VRAM, reset and presentation.

use tracing::{debug, warn};

use crate::compositor;
use crate::cursor::CursorOverlay;
use crate::error::SlateGpuError;
use crate::framebuffer::{FramebufferInfo, FramebufferManager};
use crate::regs::{control_bits, mmio, status_bits};
use crate::{DisplayOutput, SLATE_GPU_DEVICE_ID, SLATE_GPU_REG_WINDOW, SLATE_GPU_VRAM_SIZE};

/// Device configuration fixed at realize time.
#[derive(Debug, Clone, Copy)]
pub struct SlateGpuConfig {
    /// VRAM aperture size in bytes.
    pub vram_size: usize,
    /// Vblank pulse rate for the `STATUS` retrace bit, or `None` to keep the
    /// bit clear. This clock never drives flips; it only serves guests that
    /// poll `STATUS` for pacing.
    pub vblank_hz: Option<u32>,
}

impl Default for SlateGpuConfig {
    fn default() -> Self {
        Self {
            vram_size: SLATE_GPU_VRAM_SIZE,
            vblank_hz: Some(60),
        }
    }
}

/// Register-programmable display adapter with VRAM, page flipping and a
/// hardware cursor.
///
/// All mutation happens through `&mut self`; callers that share one device
/// between a guest-facing MMIO path and a presenter wrap it in the
/// [`crate::SlateGpu`] handle, which serializes access behind a mutex.
pub struct SlateGpuDevice {
    config: SlateGpuConfig,
    vblank_period_ns: Option<u64>,

    control: u32,
    fb_enable: u32,
    /// Raw `FB_NEXT` register value; validated when a flip is triggered.
    fb_next: u32,

    fb: FramebufferManager,
    cursor: CursorOverlay,
    vram: Vec<u8>,

    // Output buffers.
    front: Vec<u32>,
    back: Vec<u32>,
    width: u32,
    height: u32,
    dirty: bool,

    /// Deterministic device clock advanced via [`SlateGpuDevice::tick`].
    time_ns: u64,
}

impl Default for SlateGpuDevice {
    fn default() -> Self {
        Self::new()
    }
}

impl SlateGpuDevice {
    /// Width of the vblank pulse within the period. A short pulse is enough
    /// for retrace polling loops; use ~5% of the frame period.
    const VBLANK_PULSE_DIV: u64 = 20;

    /// Cap on host memory for the output surface. The guest controls
    /// width/height, so presentation must not allocate unbounded memory;
    /// 64MiB covers ~4K at 32bpp.
    const MAX_SURFACE_BYTES: u64 = 64 * 1024 * 1024;

    pub fn new() -> Self {
        Self::new_with_config(SlateGpuConfig::default())
    }

    pub fn new_with_config(config: SlateGpuConfig) -> Self {
        assert!(
            config.vram_size > 0 && config.vram_size <= u32::MAX as usize,
            "vram_size {} out of range; slate-gpu uses 32-bit VRAM offsets",
            config.vram_size
        );

        let vblank_period_ns = config.vblank_hz.and_then(|hz| {
            if hz == 0 {
                return None;
            }
            // Ceil division keeps 60Hz at 16_666_667ns.
            Some(1_000_000_000u64.div_ceil(u64::from(hz)))
        });

        Self {
            config,
            vblank_period_ns,
            control: 0,
            fb_enable: 0,
            fb_next: 0,
            fb: FramebufferManager::new(config.vram_size as u64),
            cursor: CursorOverlay::new(),
            vram: vec![0; config.vram_size],
            front: Vec::new(),
            back: Vec::new(),
            width: 0,
            height: 0,
            dirty: false,
            time_ns: 0,
        }
    }

    pub fn config(&self) -> SlateGpuConfig {
        self.config
    }

    /// Advances the deterministic device clock. Only the `STATUS` vblank bit
    /// observes this; rendering and flips are unaffected.
    pub fn tick(&mut self, delta_ns: u64) {
        self.time_ns = self.time_ns.wrapping_add(delta_ns);
    }

    fn in_vblank(&self) -> bool {
        match self.vblank_period_ns {
            Some(period) => self.time_ns % period < period / Self::VBLANK_PULSE_DIV,
            None => false,
        }
    }

    fn status(&self) -> u32 {
        let mut status = status_bits::READY;
        if self.in_vblank() {
            status |= status_bits::VBLANK;
        }
        if self.cursor.loaded() {
            status |= status_bits::CURSOR_LOADED;
        }
        status
    }

    pub fn dirty(&self) -> bool {
        self.dirty
    }

    pub fn flip_pending(&self) -> bool {
        self.fb.pending()
    }

    pub fn framebuffers(&self) -> &FramebufferManager {
        &self.fb
    }

    pub fn cursor(&self) -> &CursorOverlay {
        &self.cursor
    }

    // -------------------------------------------------------------------------
    // Register window (BAR0)
    // -------------------------------------------------------------------------

    fn reg_read_u32(&mut self, offset: u64) -> u32 {
        match offset {
            mmio::DEVICE_ID => SLATE_GPU_DEVICE_ID,
            mmio::STATUS => self.status(),
            mmio::CONTROL => self.control,
            mmio::FB_ADDR => self.fb.fb_addr(),
            mmio::FB_WIDTH => self.fb.width(),
            mmio::FB_HEIGHT => self.fb.height(),
            mmio::FB_BPP => self.fb.bpp(),
            mmio::FB_ENABLE => self.fb_enable,
            mmio::FB_PITCH => self.fb.pitch(),
            mmio::CURSOR_X => self.cursor.position().0 as u32,
            mmio::CURSOR_Y => self.cursor.position().1 as u32,
            mmio::CURSOR_ENABLE => u32::from(self.cursor.enabled()),
            mmio::CURSOR_HOTSPOT_X => self.cursor.hotspot().0,
            mmio::CURSOR_HOTSPOT_Y => self.cursor.hotspot().1,
            mmio::CURSOR_UPLOAD | mmio::PAGE_FLIP => {
                debug!(offset, "read of write-only slate-gpu register");
                0
            }
            mmio::FB_COUNT => self.fb.count(),
            mmio::FB_CURRENT => self.fb.current(),
            mmio::FB_NEXT => self.fb_next,
            mmio::FLIP_PENDING => u32::from(self.fb.pending()),
            mmio::VBLANK_COUNT => self.fb.vblank_count(),
            _ => {
                debug!(offset, "read of unmapped slate-gpu register");
                0
            }
        }
    }

    fn reg_write_u32(&mut self, offset: u64, value: u32) {
        match offset {
            mmio::DEVICE_ID
            | mmio::STATUS
            | mmio::FB_CURRENT
            | mmio::FLIP_PENDING
            | mmio::VBLANK_COUNT => {
                debug!(offset, value, "write to read-only slate-gpu register");
            }
            mmio::CONTROL => {
                self.control = value;
                if value & control_bits::RESET != 0 {
                    self.reset();
                }
            }
            mmio::FB_ADDR => {
                self.fb.set_fb_addr(value);
                self.dirty = true;
            }
            mmio::FB_WIDTH => {
                self.fb.set_width(value);
                self.dirty = true;
            }
            mmio::FB_HEIGHT => {
                self.fb.set_height(value);
                self.dirty = true;
            }
            mmio::FB_BPP => {
                self.fb.set_bpp(value);
                self.dirty = true;
            }
            mmio::FB_ENABLE => {
                self.set_scanout_enabled(value);
            }
            mmio::FB_PITCH => {
                self.fb.set_pitch(value);
                self.dirty = true;
            }
            mmio::CURSOR_X => {
                let y = self.cursor.position().1;
                self.cursor.set_position(value as i32, y);
                self.dirty = true;
            }
            mmio::CURSOR_Y => {
                let x = self.cursor.position().0;
                self.cursor.set_position(x, value as i32);
                self.dirty = true;
            }
            mmio::CURSOR_ENABLE => {
                self.cursor.set_enabled(value != 0);
                self.dirty = true;
            }
            // Hotspot stores do not force a redraw by themselves.
            mmio::CURSOR_HOTSPOT_X => {
                let y = self.cursor.hotspot().1;
                self.cursor.set_hotspot(value, y);
            }
            mmio::CURSOR_HOTSPOT_Y => {
                let x = self.cursor.hotspot().0;
                self.cursor.set_hotspot(x, value);
            }
            mmio::CURSOR_UPLOAD => {
                if self.cursor.upload_pixel(value) {
                    self.dirty = true;
                }
            }
            mmio::FB_COUNT => {
                if let Err(err) = self.fb.program_count(value) {
                    warn!(value, %err, "rejected FB_COUNT programming");
                } else {
                    self.dirty = true;
                }
            }
            mmio::FB_NEXT => {
                self.fb_next = value;
            }
            mmio::PAGE_FLIP => {
                if value == 0 {
                    return;
                }
                match self.fb.request_flip(self.fb_next) {
                    Ok(()) => self.dirty = true,
                    Err(err) => warn!(target_index = self.fb_next, %err, "rejected page flip"),
                }
            }
            _ => {
                debug!(offset, value, "write to unmapped slate-gpu register");
            }
        }
    }

    /// `CTRL_RESET`: reinitialize the active descriptor and disable output.
    /// The buffer count, cursor state and VRAM contents survive; the reset
    /// bit self-clears in the stored `CONTROL` value.
    fn reset(&mut self) {
        self.fb.reset_descriptor();
        self.fb_enable = 0;
        self.control &= !control_bits::RESET;
        self.dirty = true;
    }

    fn set_scanout_enabled(&mut self, value: u32) {
        self.fb_enable = value;
        if value != 0 {
            if !Self::surface_fits(self.fb.width(), self.fb.height()) {
                warn!(
                    width = self.fb.width(),
                    height = self.fb.height(),
                    "scanout mode exceeds the host surface cap"
                );
                self.dirty = true;
                return;
            }
            // Size the output surface for the programmed mode up front so the
            // resolution is observable before the first present.
            self.width = self.fb.width();
            self.height = self.fb.height();
            let pixels = self.width as usize * self.height as usize;
            self.front.clear();
            self.front.resize(pixels, 0);
            self.dirty = true;
        }
    }

    fn surface_fits(width: u32, height: u32) -> bool {
        u64::from(width) * u64::from(height) * 4 <= Self::MAX_SURFACE_BYTES
    }

    /// Register window read with 1/2/4/8-byte access support.
    ///
    /// Sub-word reads extract little-endian bytes of the containing 32-bit
    /// register; an access past the end of the window reads as 0.
    pub fn reg_read(&mut self, offset: u64, size: usize) -> u64 {
        if !access_ok(offset, size, SLATE_GPU_REG_WINDOW) {
            debug!(offset, size, "out-of-range slate-gpu register read");
            return 0;
        }
        let mut value = 0u64;
        let mut done = 0usize;
        while done < size {
            let byte_off = offset + done as u64;
            let word = self.reg_read_u32(byte_off & !3);
            let in_word = (byte_off & 3) as usize;
            let take = (4 - in_word).min(size - done);
            for i in 0..take {
                let byte = (word >> ((in_word + i) * 8)) & 0xFF;
                value |= u64::from(byte) << ((done + i) * 8);
            }
            done += take;
        }
        value
    }

    /// Register window write with 1/2/4/8-byte access support.
    ///
    /// Partial stores read-modify-write the containing 32-bit register so its
    /// write side effects fire exactly once; accesses past the end of the
    /// window are dropped.
    pub fn reg_write(&mut self, offset: u64, size: usize, value: u64) {
        if !access_ok(offset, size, SLATE_GPU_REG_WINDOW) {
            debug!(offset, size, value, "out-of-range slate-gpu register write");
            return;
        }
        let mut done = 0usize;
        while done < size {
            let byte_off = offset + done as u64;
            let word_off = byte_off & !3;
            let in_word = (byte_off & 3) as usize;
            let take = (4 - in_word).min(size - done);

            let mut word = if take == 4 {
                0
            } else {
                self.reg_read_u32(word_off)
            };
            for i in 0..take {
                let byte = ((value >> ((done + i) * 8)) & 0xFF) as u32;
                word &= !(0xFF << ((in_word + i) * 8));
                word |= byte << ((in_word + i) * 8);
            }
            self.reg_write_u32(word_off, word);
            done += take;
        }
    }

    // -------------------------------------------------------------------------
    // VRAM aperture (BAR1)
    // -------------------------------------------------------------------------

    /// Little-endian VRAM load. An access that would run past the end of the
    /// aperture clamps to a no-op and reads 0.
    pub fn vram_read(&mut self, offset: u64, size: usize) -> u64 {
        if !access_ok(offset, size, self.vram.len() as u64) {
            debug!(offset, size, "out-of-range slate-gpu VRAM read");
            return 0;
        }
        let start = offset as usize;
        let mut value = 0u64;
        for (i, &byte) in self.vram[start..start + size].iter().enumerate() {
            value |= u64::from(byte) << (i * 8);
        }
        value
    }

    /// Little-endian VRAM store; models direct pixel writes by a mapped
    /// framebuffer, so any in-range store marks the device dirty.
    pub fn vram_write(&mut self, offset: u64, size: usize, value: u64) {
        if !access_ok(offset, size, self.vram.len() as u64) {
            debug!(offset, size, value, "out-of-range slate-gpu VRAM write");
            return;
        }
        let start = offset as usize;
        for i in 0..size {
            self.vram[start + i] = (value >> (i * 8)) as u8;
        }
        self.dirty = true;
    }

    pub fn vram(&self) -> &[u8] {
        &self.vram
    }

    /// Bulk pixel store used by tests and zero-copy integrations; clamps to
    /// the aperture like the MMIO path.
    pub fn write_vram(&mut self, offset: usize, bytes: &[u8]) {
        let Some(end) = offset.checked_add(bytes.len()) else {
            return;
        };
        if end > self.vram.len() {
            return;
        }
        self.vram[offset..end].copy_from_slice(bytes);
        self.dirty = true;
    }

    // -------------------------------------------------------------------------
    // Driver-facing capability contract
    // -------------------------------------------------------------------------

    pub fn setup_framebuffer(
        &mut self,
        width: u32,
        height: u32,
        bpp: u32,
    ) -> Result<(), SlateGpuError> {
        self.fb.setup_single(width, height, bpp)?;
        self.dirty = true;
        Ok(())
    }

    pub fn setup_multi_framebuffer(
        &mut self,
        count: u32,
        width: u32,
        height: u32,
        bpp: u32,
    ) -> Result<(), SlateGpuError> {
        self.fb.setup_multi(count, width, height, bpp)?;
        self.dirty = true;
        Ok(())
    }

    pub fn enable_display(&mut self, enable: bool) {
        self.set_scanout_enabled(u32::from(enable));
    }

    /// Requests a page flip. Flips complete synchronously, so `wait` has
    /// nothing left to wait on; callers that want the bounded-poll contract
    /// use [`crate::SlateGpu::wait_for_flip`].
    pub fn request_flip(&mut self, target_index: u32, _wait: bool) -> Result<(), SlateGpuError> {
        self.fb.request_flip(target_index)?;
        self.dirty = true;
        Ok(())
    }

    pub fn framebuffer_info(&self) -> FramebufferInfo {
        self.fb.describe()
    }

    pub fn set_cursor_position(&mut self, x: i32, y: i32) {
        self.cursor.set_position(x, y);
        self.dirty = true;
    }

    pub fn set_cursor_hotspot(&mut self, x: u32, y: u32) {
        self.cursor.set_hotspot(x, y);
    }

    pub fn enable_cursor(&mut self, enable: bool) {
        self.cursor.set_enabled(enable);
        self.dirty = true;
    }

    pub fn upload_cursor(&mut self, pixels: &[u32]) -> Result<(), SlateGpuError> {
        if self.cursor.upload_bulk(pixels)? {
            self.dirty = true;
        }
        Ok(())
    }

    pub fn vram_size(&self) -> usize {
        self.vram.len()
    }
}

impl DisplayOutput for SlateGpuDevice {
    fn get_framebuffer(&self) -> &[u32] {
        &self.front
    }

    fn get_resolution(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    fn present(&mut self) {
        if !self.dirty {
            return;
        }
        // Only enabled 32bpp modes are composable; the dirty flag stays set so
        // a later enable recomposes.
        if self.fb_enable == 0 || self.fb.bpp() != 32 {
            return;
        }
        let (width, height) = (self.fb.width(), self.fb.height());
        if width == 0 || height == 0 || !Self::surface_fits(width, height) {
            return;
        }

        compositor::compose(
            &self.vram,
            self.fb.fb_addr(),
            width,
            height,
            self.fb.pitch(),
            &self.cursor,
            &mut self.back,
        );
        self.width = width;
        self.height = height;
        std::mem::swap(&mut self.front, &mut self.back);
        self.dirty = false;
    }
}

fn access_ok(offset: u64, size: usize, limit: u64) -> bool {
    matches!(size, 1 | 2 | 4 | 8)
        && offset
            .checked_add(size as u64)
            .is_some_and(|end| end <= limit)
}
