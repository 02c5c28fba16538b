//! End-to-end scenarios through the public API with the real backend.
//!
//! Budgets are fractional megabytes so the images stay small enough for a
//! debug build while still being far over budget.

use image::codecs::jpeg::JpegEncoder;
use image::{DynamicImage, ImageFormat, RgbImage};
use std::io::Cursor;
use upload_shrink::imaging::{
    CompressOptions, ImageFile, Quality, RustBackend, SizeBudget, blob_to_base64, compress,
    parse_data_url,
};

/// Smooth gradient with a little deterministic grain, closer to a photo than pure noise.
fn photo_like_jpeg(width: u32, height: u32) -> Vec<u8> {
    let mut grain: u32 = 0x9E37_79B9;
    let img = RgbImage::from_fn(width, height, |x, y| {
        grain ^= grain << 13;
        grain ^= grain >> 17;
        grain ^= grain << 5;
        let jitter = (grain & 0x1F) as u8;
        image::Rgb([
            ((x * 255 / width) as u8).saturating_add(jitter),
            ((y * 255 / height) as u8).saturating_add(jitter),
            128u8.saturating_add(jitter),
        ])
    });
    let mut out = Cursor::new(Vec::new());
    DynamicImage::ImageRgb8(img)
        .write_with_encoder(JpegEncoder::new_with_quality(&mut out, 98))
        .unwrap();
    out.into_inner()
}

#[test]
fn small_file_under_default_budget_is_returned_as_is() {
    // 2 MB that is not even a valid JPEG: the fast path must not decode it.
    let file = ImageFile::new(vec![0x5A; 2 * 1024 * 1024], ImageFormat::Jpeg);

    let first = compress(&RustBackend::new(), &file, &CompressOptions::default()).unwrap();
    let second = compress(&RustBackend::new(), &file, &CompressOptions::default()).unwrap();

    assert!(first.blob.is_borrowed());
    assert_eq!(first.blob.bytes(), file.bytes());
    assert_eq!(first.blob.bytes(), second.blob.bytes());
    assert_eq!(first.blob.mime_type(), "image/jpeg");
}

#[test]
fn oversized_photo_is_capped_at_1920_and_fits_or_hits_floor() {
    let file = ImageFile::new(photo_like_jpeg(2000, 1000), ImageFormat::Jpeg);
    let budget = SizeBudget::from_megabytes(file.len() as f64 / (1024.0 * 1024.0) / 4.0);
    let options = CompressOptions {
        size_budget: budget,
        ..CompressOptions::default()
    };

    let out = compress(&RustBackend::new(), &file, &options).unwrap();

    let decoded = image::load_from_memory(out.blob.bytes()).unwrap();
    assert_eq!((decoded.width(), decoded.height()), (1920, 960));
    assert_eq!(
        image::guess_format(out.blob.bytes()).unwrap(),
        ImageFormat::Jpeg
    );
    assert!(
        out.blob.len() as u64 <= budget.bytes() || out.report.final_quality() == Some(Quality::FLOOR),
        "{} bytes over a {} byte budget at {:?}",
        out.blob.len(),
        budget.bytes(),
        out.report.final_quality()
    );
    let qualities: Vec<u32> = out.report.attempts.iter().map(|a| a.quality.value()).collect();
    assert!(qualities.len() <= 6);
    assert_eq!(qualities[0], 80);
    assert!(qualities.windows(2).all(|w| w[0] - w[1] == 10));
}

#[test]
fn compressed_blob_survives_data_url_round_trip() {
    let file = ImageFile::new(photo_like_jpeg(400, 300), ImageFormat::Jpeg);
    let options = CompressOptions {
        size_budget: SizeBudget::from_megabytes(0.001),
        max_dimension: 200,
        ..CompressOptions::default()
    };
    let out = compress(&RustBackend::new(), &file, &options).unwrap();

    let url = blob_to_base64(&out.blob);
    assert!(url.starts_with("data:image/jpeg;base64,"));

    let parsed = parse_data_url(&url).unwrap();
    assert_eq!(parsed.bytes(), out.blob.bytes());
    assert_eq!(parsed.format(), ImageFormat::Jpeg);
}
