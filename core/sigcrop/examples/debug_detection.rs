//! Run the detection chain on an image and print what every stage decided.
//!
//! Usage:
//!   RUST_LOG=sigcrop=debug cargo run --example debug_detection -- page.png
//!
//! Without an argument a synthetic 2480x3508 (A4 at 300 dpi) page with a
//! faint signature is used.

use image::{GrayImage, Luma};
use sigcrop::{CropSource, SignatureCropper};

fn synthetic_page() -> GrayImage {
    let mut page = GrayImage::from_pixel(2480, 3508, Luma([251]));
    // Faint strokes just above the single-threshold cutoff.
    for y in 2900..3020 {
        for x in 1300..1800 {
            if (x / 7 + y / 11) % 3 == 0 {
                page.put_pixel(x, y, Luma([242]));
            }
        }
    }
    page
}

fn main() {
    env_logger::init();

    let gray = match std::env::args().nth(1) {
        Some(path) => {
            let input = std::fs::read(&path).unwrap_or_else(|e| panic!("failed to read {path}: {e}"));
            sigcrop::decode_grayscale(&input).unwrap_or_else(|e| panic!("{path}: {e}"))
        }
        None => synthetic_page(),
    };
    let (width, height) = gray.dimensions();
    println!("=== {width}x{height} ===");

    let result = SignatureCropper::new().detect_image(&gray);

    for stage in &result.trace.stages {
        println!("  {} -> {:?}", stage.stage, stage.verdict);
        for attempt in &stage.attempts {
            let threshold = attempt
                .threshold
                .map_or_else(|| "-".to_string(), |t| t.to_string());
            let mark = if attempt.accepted { "ok" } else { "--" };
            println!("    [{mark}] threshold {threshold}: {}", attempt.reason);
        }
    }

    match result.trace.source {
        CropSource::WholeImage => println!("  NO REGION ISOLATED - whole image"),
        CropSource::Failed => println!("  FAILED: {}", result.message),
        _ => {}
    }

    let b = result.crop_box;
    println!(
        "  crop=({}, {}, {}x{}) confidence={:.3} manual={} \"{}\"",
        b.left, b.top, b.width, b.height, result.confidence, result.needs_manual_adjustment, result.message
    );
}
