//! Generate synthetic signature pages and write their crops and previews.
//!
//! Usage:
//!   cargo run --example generate_samples
//!
//! Output goes to `tests/fixtures/output/`.

use std::path::Path;

use image::{GrayImage, Luma};
use sigcrop::{DetectionPool, OutputFormat, SignatureCropper, TargetSize};

const FIXTURE_DIR: &str = concat!(env!("CARGO_MANIFEST_DIR"), "/../../tests/fixtures");

/// Pseudo-handwriting: a sine stroke a few pixels thick.
fn draw_stroke(page: &mut GrayImage, left: u32, top: u32, width: u32, height: u32, ink: u8) {
    for dx in 0..width {
        let phase = dx as f64 / 23.0;
        let cy = top as f64 + height as f64 / 2.0 + phase.sin() * height as f64 * 0.4;
        for t in 0..4 {
            let y = (cy as u32 + t).min(page.height() - 1);
            page.put_pixel(left + dx, y, Luma([ink]));
        }
    }
}

fn samples() -> Vec<(&'static str, GrayImage)> {
    let mut clean = GrayImage::from_pixel(1200, 800, Luma([255]));
    draw_stroke(&mut clean, 300, 450, 500, 120, 20);

    let mut faint = GrayImage::from_pixel(2480, 3508, Luma([252]));
    draw_stroke(&mut faint, 1200, 2900, 600, 150, 242);

    let mut noisy = GrayImage::from_fn(1000, 1000, |x, y| {
        if (x * 31 + y * 17) % 19 == 0 {
            Luma([120])
        } else {
            Luma([255])
        }
    });
    for y in 300..600 {
        for x in 400..700 {
            if (x + y) % 2 == 0 {
                noisy.put_pixel(x, y, Luma([60]));
            }
        }
    }

    vec![("clean", clean), ("faint_a4", faint), ("noisy", noisy)]
}

fn main() {
    let output_dir = Path::new(FIXTURE_DIR).join("output");
    std::fs::create_dir_all(&output_dir).expect("failed to create output directory");

    let samples = samples();
    let pages: Vec<GrayImage> = samples.iter().map(|(_, page)| page.clone()).collect();
    let pool = DetectionPool::new(SignatureCropper::new()).expect("failed to build pool");
    let results = pool.detect_batch(&pages);

    let cropper = SignatureCropper::new()
        .format(OutputFormat::Png)
        .target_size(TargetSize::new(600, 200).expect("non-zero target"));

    for ((name, page), result) in samples.iter().zip(&results) {
        println!("=== {name} ({}x{}) ===", page.width(), page.height());
        println!(
            "  {:?} confidence={:.3} by={:?}",
            result.crop_box, result.confidence, result.trace.accepted_by
        );

        let preview = cropper
            .preview(page.as_raw(), page.width(), page.height(), None)
            .unwrap();
        let preview_path = output_dir.join(format!("{name}_preview.jpg"));
        std::fs::write(&preview_path, &preview.data).unwrap();
        println!(
            "  preview: {} ({}x{}, {} bytes)",
            preview_path.display(),
            preview.width,
            preview.height,
            preview.data.len()
        );

        let mut png = Vec::new();
        page.write_to(&mut std::io::Cursor::new(&mut png), image::ImageFormat::Png)
            .unwrap();
        let cropped = cropper.crop_image(&png).unwrap();
        let crop_path = output_dir.join(format!("{name}_crop.png"));
        std::fs::write(&crop_path, &cropped.data).unwrap();
        println!(
            "  crop: {} ({}x{}, {} bytes)",
            crop_path.display(),
            cropped.width,
            cropped.height,
            cropped.data.len()
        );
        println!();
    }

    println!("Output written to {}", output_dir.display());
}
