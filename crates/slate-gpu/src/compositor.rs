//! Frame composition: active framebuffer scanout plus cursor overlay.
//!
//! Pixels are packed 32-bit ARGB words read little-endian from VRAM. The
//! compositor never fails: malformed geometry (zero dimensions, scanout range
//! past the end of VRAM) degrades to black rows rather than faulting.

use crate::cursor::{CursorOverlay, CURSOR_DIM};

/// Composites one frame into `out`.
///
/// `out` is resized to `width * height` and zero-filled first, so rows whose
/// scanout range falls outside VRAM stay black.
pub(crate) fn compose(
    vram: &[u8],
    fb_addr: u32,
    width: u32,
    height: u32,
    pitch: u32,
    cursor: &CursorOverlay,
    out: &mut Vec<u32>,
) {
    let width = width as usize;
    let height = height as usize;
    out.clear();
    out.resize(width * height, 0);

    let base = fb_addr as usize;
    let pitch = pitch as usize;
    let row_bytes = width * 4;
    for y in 0..height {
        let Some(row_start) = y.checked_mul(pitch).and_then(|o| o.checked_add(base)) else {
            break;
        };
        let Some(row_end) = row_start.checked_add(row_bytes) else {
            break;
        };
        if row_end > vram.len() {
            break;
        }
        let row = &vram[row_start..row_end];
        for (dst, px) in out[y * width..(y + 1) * width]
            .iter_mut()
            .zip(row.chunks_exact(4))
        {
            *dst = u32::from_le_bytes([px[0], px[1], px[2], px[3]]);
        }
    }

    if cursor.enabled() {
        overlay_cursor(cursor, width, height, out);
    }
}

fn overlay_cursor(cursor: &CursorOverlay, width: usize, height: usize, out: &mut [u32]) {
    let (cur_x, cur_y) = cursor.position();
    let (hot_x, hot_y) = cursor.hotspot();
    for cy in 0..CURSOR_DIM {
        let sy = i64::from(cur_y) - i64::from(hot_y) + cy as i64;
        if sy < 0 || sy >= height as i64 {
            continue;
        }
        for cx in 0..CURSOR_DIM {
            let sx = i64::from(cur_x) - i64::from(hot_x) + cx as i64;
            if sx < 0 || sx >= width as i64 {
                continue;
            }

            let fg = cursor.pixel(cx, cy);
            let alpha = fg >> 24;
            if alpha == 0 {
                continue;
            }
            let idx = sy as usize * width + sx as usize;
            out[idx] = if alpha == 255 {
                fg
            } else {
                blend(fg, out[idx], alpha)
            };
        }
    }
}

/// Per-channel source-over blend; the composite output is opaque.
fn blend(fg: u32, bg: u32, alpha: u32) -> u32 {
    let inv = 255 - alpha;
    let channel = |shift: u32| {
        let f = (fg >> shift) & 0xFF;
        let b = (bg >> shift) & 0xFF;
        ((f * alpha + b * inv) / 255) << shift
    };
    0xFF00_0000 | channel(16) | channel(8) | channel(0)
}
