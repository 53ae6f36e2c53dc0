//! Decoded sources are released before encoding, on success and failure.
//!
//! Kept in its own test binary: the live-source counter is process-global.

#![cfg(feature = "test-hooks")]

use std::io::Cursor;

use image::{ImageFormat, Rgba, RgbaImage};
use parking_lot::Mutex;

use webico_core::decode::live_source_count;
use webico_core::{BatchConfig, ConversionItem, ConversionOrchestrator, FileCandidate, Mode};

fn png_bytes(width: u32, height: u32) -> Vec<u8> {
    let img = RgbaImage::from_pixel(width, height, Rgba([200, 10, 10, 255]));
    let mut buf = Vec::new();
    img.write_to(&mut Cursor::new(&mut buf), ImageFormat::Png).unwrap();
    buf
}

#[tokio::test]
async fn sources_released_on_every_path() {
    let orchestrator = ConversionOrchestrator::default();
    orchestrator
        .submit(vec![
            FileCandidate::new("ok.png", None, png_bytes(8, 8)),
            FileCandidate::new("corrupt.png", None, b"broken".to_vec()),
            // Decodes, then fails to rasterize at an oversized target.
            FileCandidate::new(
                "huge.svg",
                None,
                br#"<svg xmlns="http://www.w3.org/2000/svg" width="20000" height="20"/>"#.to_vec(),
            ),
        ])
        .unwrap();

    let live = Mutex::new(Vec::new());
    let observer = |_: usize, _: &ConversionItem| live.lock().push(live_source_count());

    let outcome = orchestrator
        .run_observed(BatchConfig::new(Mode::Webp), &observer)
        .await
        .unwrap();

    assert_eq!(outcome.failed_count(), 2);
    assert!(live.lock().iter().all(|count| *count == 0));
    assert_eq!(live_source_count(), 0);
}
