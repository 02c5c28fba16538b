//! Shared test utilities: synthetic images and on-disk fixtures.
//!
//! Images are generated in memory from a seeded xorshift so every test run
//! sees the same pixels. Noise is used on purpose: it barely compresses, which
//! makes byte budgets easy to miss.

use image::codecs::jpeg::JpegEncoder;
use image::{DynamicImage, ImageFormat, RgbImage};
use std::io::Cursor;
use std::path::{Path, PathBuf};

/// An RGB8 image filled with deterministic noise.
pub fn noise_image(width: u32, height: u32, seed: u32) -> DynamicImage {
    let mut state = seed.wrapping_mul(2_654_435_761).max(1);
    let img = RgbImage::from_fn(width, height, |_, _| {
        state ^= state << 13;
        state ^= state >> 17;
        state ^= state << 5;
        let [r, g, b, _] = state.to_le_bytes();
        image::Rgb([r, g, b])
    });
    DynamicImage::ImageRgb8(img)
}

/// Encode `img` in `format`. `quality` only matters for JPEG.
pub fn encode_as(img: &DynamicImage, format: ImageFormat, quality: u8) -> Vec<u8> {
    let mut out = Cursor::new(Vec::new());
    match format {
        ImageFormat::Jpeg => img
            .write_with_encoder(JpegEncoder::new_with_quality(&mut out, quality))
            .unwrap(),
        other => img.write_to(&mut out, other).unwrap(),
    }
    out.into_inner()
}

/// Write a noise image to `dir/name`, format taken from the extension.
pub fn write_noise_file(dir: &Path, name: &str, width: u32, height: u32) -> PathBuf {
    let path = dir.join(name);
    let format = ImageFormat::from_path(&path).unwrap();
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).unwrap();
    }
    std::fs::write(
        &path,
        encode_as(&noise_image(width, height, name.len() as u32), format, 100),
    )
    .unwrap();
    path
}
