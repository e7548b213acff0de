//! Hardware cursor overlay state.
//!
//! The cursor is a fixed 64x64 ARGB bitmap uploaded through a streaming
//! register: the guest pushes exactly [`CURSOR_PIXELS`] sequential pixel
//! writes per image. Partial uploads leave stale pixels from the previous
//! image in the untouched slots; only a complete upload latches the
//! "cursor loaded" status bit.

use crate::error::SlateGpuError;

/// Cursor bitmap edge length in pixels.
pub const CURSOR_DIM: usize = 64;

/// Total pixel count of one cursor image.
pub const CURSOR_PIXELS: usize = CURSOR_DIM * CURSOR_DIM;

const OUTLINE: u32 = 0xFF00_0000; // opaque black
const FILL: u32 = 0xFFFF_FFFF; // opaque white

/// Realize-time 16x16 cursor glyph, placed in the top-left corner of the
/// 64x64 bitmap. `#` is the black outline (top edge, left edge, diagonal and
/// the vertical tail stem), `.` the white body, anything else transparent.
const ARROW_GLYPH: [&[u8; 16]; 16] = [
    b"##              ",
    b"#.#             ",
    b"#..#            ",
    b"#...#           ",
    b"#....#          ",
    b"#.....#         ",
    b"#......#        ",
    b"#.......#       ",
    b"#........#      ",
    b"#.....#####     ",
    b"#..#..#         ",
    b"#.# #..#        ",
    b"##  #..#        ",
    b"    #..#        ",
    b"    #..#        ",
    b"     ##         ",
];

/// Cursor overlay: bitmap, placement and the streaming upload cursor.
#[derive(Debug, Clone)]
pub struct CursorOverlay {
    bitmap: Vec<u32>,
    x: i32,
    y: i32,
    hot_x: u32,
    hot_y: u32,
    enabled: bool,
    upload_cursor: usize,
    loaded: bool,
}

impl Default for CursorOverlay {
    fn default() -> Self {
        Self::new()
    }
}

impl CursorOverlay {
    /// Creates the realize-time cursor: arrow glyph, hotspot (0,0), disabled.
    pub fn new() -> Self {
        let mut bitmap = vec![0u32; CURSOR_PIXELS];
        for (cy, row) in ARROW_GLYPH.iter().enumerate() {
            for (cx, ch) in row.iter().enumerate() {
                bitmap[cy * CURSOR_DIM + cx] = match ch {
                    b'#' => OUTLINE,
                    b'.' => FILL,
                    _ => 0,
                };
            }
        }
        Self {
            bitmap,
            x: 0,
            y: 0,
            hot_x: 0,
            hot_y: 0,
            enabled: false,
            upload_cursor: 0,
            loaded: false,
        }
    }

    pub fn position(&self) -> (i32, i32) {
        (self.x, self.y)
    }

    pub fn set_position(&mut self, x: i32, y: i32) {
        self.x = x;
        self.y = y;
    }

    pub fn hotspot(&self) -> (u32, u32) {
        (self.hot_x, self.hot_y)
    }

    pub fn set_hotspot(&mut self, x: u32, y: u32) {
        self.hot_x = x;
        self.hot_y = y;
    }

    pub fn enabled(&self) -> bool {
        self.enabled
    }

    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }

    /// True once at least one complete cursor image has been uploaded.
    pub fn loaded(&self) -> bool {
        self.loaded
    }

    /// Current streaming upload position (0..[`CURSOR_PIXELS`]).
    pub fn upload_cursor(&self) -> usize {
        self.upload_cursor
    }

    /// ARGB pixel at bitmap coordinates `(cx, cy)`.
    pub fn pixel(&self, cx: usize, cy: usize) -> u32 {
        self.bitmap[cy * CURSOR_DIM + cx]
    }

    /// Pushes one ARGB pixel at the upload cursor.
    ///
    /// Returns `true` exactly when this write completed a full image: the
    /// upload cursor wraps back to 0 and the loaded latch is set.
    pub fn upload_pixel(&mut self, argb: u32) -> bool {
        self.bitmap[self.upload_cursor] = argb;
        self.upload_cursor += 1;
        if self.upload_cursor == CURSOR_PIXELS {
            self.upload_cursor = 0;
            self.loaded = true;
            return true;
        }
        false
    }

    /// Bulk upload used by the driver-facing layer.
    ///
    /// Rejects more than one image's worth of pixels before writing anything;
    /// otherwise feeds every pixel through the streaming path in order.
    /// Returns `true` if the upload cursor wrapped (an image completed).
    pub fn upload_bulk(&mut self, pixels: &[u32]) -> Result<bool, SlateGpuError> {
        if pixels.len() > CURSOR_PIXELS {
            return Err(SlateGpuError::InvalidArgument(
                "cursor upload exceeds one 64x64 image",
            ));
        }
        let mut completed = false;
        for &argb in pixels {
            completed |= self.upload_pixel(argb);
        }
        Ok(completed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_glyph_is_deterministic_arrow() {
        let cursor = CursorOverlay::new();
        // Top-left outline pixel.
        assert_eq!(cursor.pixel(0, 0), OUTLINE);
        // A body pixel inside the triangle.
        assert_eq!(cursor.pixel(2, 4), FILL);
        // Everything outside the 16x16 glyph is transparent.
        assert_eq!(cursor.pixel(16, 0), 0);
        assert_eq!(cursor.pixel(63, 63), 0);
        assert_eq!(cursor.hotspot(), (0, 0));
        assert!(!cursor.enabled());
        assert!(!cursor.loaded());
    }

    #[test]
    fn full_upload_wraps_and_latches_loaded() {
        let mut cursor = CursorOverlay::new();
        for i in 0..CURSOR_PIXELS - 1 {
            assert!(!cursor.upload_pixel(i as u32));
        }
        assert!(!cursor.loaded());
        assert_eq!(cursor.upload_cursor(), CURSOR_PIXELS - 1);

        assert!(cursor.upload_pixel(0xDEAD_BEEF));
        assert!(cursor.loaded());
        assert_eq!(cursor.upload_cursor(), 0);
        assert_eq!(cursor.pixel(63, 63), 0xDEAD_BEEF);
    }

    #[test]
    fn partial_upload_keeps_stale_tail() {
        let mut cursor = CursorOverlay::new();
        let image: Vec<u32> = vec![0xFF11_2233; CURSOR_PIXELS];
        assert!(cursor.upload_bulk(&image).unwrap());

        // Second image stops short; the tail still shows the first image.
        assert!(!cursor.upload_bulk(&vec![0xFF44_5566; 10]).unwrap());
        assert_eq!(cursor.pixel(9, 0), 0xFF44_5566);
        assert_eq!(cursor.pixel(10, 0), 0xFF11_2233);
        assert_eq!(cursor.upload_cursor(), 10);
    }

    #[test]
    fn oversized_bulk_upload_is_rejected_without_side_effects() {
        let mut cursor = CursorOverlay::new();
        let before = cursor.pixel(0, 0);
        let err = cursor
            .upload_bulk(&vec![0u32; CURSOR_PIXELS + 1])
            .unwrap_err();
        assert_eq!(
            err,
            SlateGpuError::InvalidArgument("cursor upload exceeds one 64x64 image")
        );
        assert_eq!(cursor.pixel(0, 0), before);
        assert_eq!(cursor.upload_cursor(), 0);
    }
}
