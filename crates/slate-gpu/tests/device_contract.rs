//! Driver-facing capability contract, exercised through the shared handle the
//! way an ioctl/character-device layer would call it.

use std::time::Duration;

use pretty_assertions::assert_eq;
use slate_gpu::{
    DisplayOutput, SlateGpu, SlateGpuConfig, SlateGpuError, CURSOR_PIXELS, SLATE_GPU_VRAM_SIZE,
};

fn new_test_gpu() -> SlateGpu {
    SlateGpu::new(SlateGpuConfig {
        vblank_hz: None,
        ..SlateGpuConfig::default()
    })
}

#[test]
fn vram_size_reports_the_aperture() {
    let gpu = new_test_gpu();
    assert_eq!(gpu.vram_size(), SLATE_GPU_VRAM_SIZE);
}

#[test]
fn setup_framebuffer_1024x768_succeeds_on_16mib_vram() {
    let gpu = new_test_gpu();
    gpu.setup_framebuffer(1024, 768, 32).unwrap();

    let info = gpu.framebuffer_info();
    assert_eq!(info.size, 3_145_728);
    assert_eq!(gpu.device().framebuffers().pitch(), 4096);
}

#[test]
fn setup_framebuffer_reports_out_of_memory_on_small_vram() {
    let gpu = SlateGpu::new(SlateGpuConfig {
        vram_size: 1024 * 1024,
        vblank_hz: None,
    });
    let err = gpu.setup_framebuffer(1024, 768, 32).unwrap_err();
    assert_eq!(
        err,
        SlateGpuError::OutOfMemory {
            required: 3_145_728,
            capacity: 1024 * 1024,
        }
    );
    // Prior layout is untouched by the failed setup.
    assert_eq!(gpu.device().framebuffers().width(), 800);
}

#[test]
fn double_buffer_flip_changes_the_presented_frame() {
    let gpu = new_test_gpu();
    gpu.setup_multi_framebuffer(2, 64, 32, 32).unwrap();

    let info = gpu.framebuffer_info();
    assert_eq!(info.count, 2);
    let buffer_size = info.size as usize;

    {
        let mut dev = gpu.device();
        // Buffer 0 solid red, buffer 1 solid green.
        let red: Vec<u8> = 0xFFFF_0000u32.to_le_bytes().repeat(buffer_size / 4);
        let green: Vec<u8> = 0xFF00_FF00u32.to_le_bytes().repeat(buffer_size / 4);
        dev.write_vram(0, &red);
        dev.write_vram(buffer_size, &green);
        dev.enable_display(true);
        dev.present();
        assert_eq!(dev.get_framebuffer()[0], 0xFFFF_0000);
    }

    gpu.request_flip(1, true).unwrap();

    let info = gpu.framebuffer_info();
    assert_eq!(info.current, 1);
    assert_eq!(gpu.device().framebuffers().vblank_count(), 1);

    let mut dev = gpu.device();
    dev.present();
    assert_eq!(dev.get_framebuffer()[0], 0xFF00_FF00);
}

#[test]
fn flip_to_invalid_index_is_a_typed_error() {
    let gpu = new_test_gpu();
    gpu.setup_multi_framebuffer(2, 64, 32, 32).unwrap();
    assert!(matches!(
        gpu.request_flip(2, false),
        Err(SlateGpuError::InvalidArgument(_))
    ));
    assert_eq!(gpu.framebuffer_info().current, 0);
}

#[test]
fn wait_for_flip_returns_immediately_when_idle() {
    let gpu = new_test_gpu();
    // Flips complete synchronously, so even a zero budget succeeds.
    gpu.wait_for_flip(Duration::ZERO).unwrap();
}

#[test]
fn cursor_contract_composites_over_the_framebuffer() {
    let gpu = new_test_gpu();
    gpu.setup_framebuffer(64, 64, 32).unwrap();
    gpu.upload_cursor(&vec![0xFF12_3456; CURSOR_PIXELS]).unwrap();
    gpu.set_cursor_hotspot(2, 2);
    gpu.set_cursor_position(10, 10);
    gpu.enable_cursor(true);
    gpu.enable_display(true);

    let mut dev = gpu.device();
    dev.present();
    let frame = dev.get_framebuffer();
    // Hotspot shifts the bitmap origin to (8,8).
    assert_eq!(frame[8 * 64 + 8], 0xFF12_3456);
    assert_eq!(frame[7 * 64 + 7], 0);
}

#[test]
fn oversized_cursor_upload_is_rejected() {
    let gpu = new_test_gpu();
    assert!(matches!(
        gpu.upload_cursor(&vec![0u32; CURSOR_PIXELS + 1]),
        Err(SlateGpuError::InvalidArgument(_))
    ));
}

#[test]
fn clones_share_one_device_across_threads() {
    let gpu = new_test_gpu();
    gpu.setup_framebuffer(64, 64, 32).unwrap();
    gpu.enable_display(true);

    let writer = {
        let gpu = gpu.clone();
        std::thread::spawn(move || {
            let mut vram = gpu.vram_mmio_handler();
            for i in 0..64u64 {
                slate_gpu::MmioHandler::write(&mut vram, i * 4, 4, 0xFFAA_5500);
            }
        })
    };

    // Presenting concurrently must not deadlock; tearing is acceptable.
    gpu.device().present();
    writer.join().unwrap();

    let mut dev = gpu.device();
    dev.present();
    assert_eq!(dev.get_framebuffer()[0], 0xFFAA_5500);
}
