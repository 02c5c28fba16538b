//! Pure Rust image processing backend — no system libraries.
//!
//! Everything is statically linked into the binary.
//!
//! ## Crate mapping
//!
//! | Stage | Crate / function |
//! |---|---|
//! | Decode (JPEG, PNG, TIFF, WebP) | `image::ImageReader` over an in-memory cursor |
//! | Decode (AVIF) | `avif-parse` (container) + `rav1d` (AV1 decode) + BT.601 YUV→RGB |
//! | Render | 8-bit RGB/RGBA surface, `resize_exact` with `Lanczos3` |
//! | Encode JPEG | `JpegEncoder::new_with_quality` (alpha dropped) |
//! | Encode AVIF | `AvifEncoder::new_with_speed_quality` (rav1e, speed 6) |
//! | Encode PNG, WebP, TIFF | `DynamicImage::write_to` (lossless, quality ignored) |

use super::backend::{CompressError, Dimensions, ImageBackend, ImageFile};
use super::params::{EncodeParams, RenderParams};
use image::codecs::avif::AvifEncoder;
use image::codecs::jpeg::JpegEncoder;
use image::error::ImageError;
use image::imageops::FilterType;
use image::{DynamicImage, ImageFormat, ImageReader};
use std::io::Cursor;
use std::sync::LazyLock;

/// rav1e speed preset for AVIF output (0 = slowest/best, 10 = fastest).
const AVIF_SPEED: u8 = 6;

/// Extensions whose decoders are compiled in and known to work.
///
/// AVIF is deliberately excluded: the `image` crate's `"avif"` feature only enables the
/// **encoder** (rav1e). `ImageFormat::reading_enabled()` still reports `true` for AVIF,
/// so that API cannot be trusted on its own. AVIF input goes through [`decode_avif`].
const DECODABLE_CANDIDATES: &[(&str, ImageFormat)] = &[
    ("jpg", ImageFormat::Jpeg),
    ("jpeg", ImageFormat::Jpeg),
    ("png", ImageFormat::Png),
    ("tif", ImageFormat::Tiff),
    ("tiff", ImageFormat::Tiff),
    ("webp", ImageFormat::WebP),
];

static SUPPORTED_EXTENSIONS: LazyLock<Vec<&'static str>> = LazyLock::new(|| {
    let mut exts: Vec<&'static str> = DECODABLE_CANDIDATES
        .iter()
        .filter(|(_, fmt)| fmt.reading_enabled())
        .map(|(ext, _)| *ext)
        .collect();
    exts.push("avif");
    exts
});

/// Returns the set of image file extensions that have working decoders compiled in.
pub fn supported_input_extensions() -> &'static [&'static str] {
    &SUPPORTED_EXTENSIONS
}

/// Pure Rust backend using the `image` crate ecosystem.
///
/// See the [module docs](self) for the crate-to-stage mapping.
pub struct RustBackend;

impl RustBackend {
    pub fn new() -> Self {
        Self
    }
}

impl Default for RustBackend {
    fn default() -> Self {
        Self::new()
    }
}

/// Map an `image` error onto the compression taxonomy.
fn decode_error(format: ImageFormat, err: ImageError) -> CompressError {
    match err {
        ImageError::Limits(e) => CompressError::SurfaceAcquisition(e.to_string()),
        ImageError::Unsupported(e) => CompressError::UnsupportedFormat(e.to_string()),
        ImageError::IoError(e) => CompressError::ResourceRead(e),
        other => CompressError::Decode(format!("{}: {other}", format.to_mime_type())),
    }
}

fn decode_file(file: &ImageFile) -> Result<DynamicImage, CompressError> {
    let format = file.format();
    if format == ImageFormat::Avif {
        return decode_avif(file.bytes());
    }
    if !DECODABLE_CANDIDATES.iter().any(|(_, f)| *f == format) {
        return Err(CompressError::UnsupportedFormat(
            format.to_mime_type().to_string(),
        ));
    }
    ImageReader::with_format(Cursor::new(file.bytes()), format)
        .decode()
        .map_err(|e| decode_error(format, e))
}

/// Decode AVIF bytes using avif-parse (container) + rav1d (AV1 decode).
///
/// The `image` crate's `"avif"` feature only provides the encoder (rav1e).
/// Its decoder needs `"avif-native"`, which links the C library dav1d;
/// `rav1d` is the pure Rust port of it.
fn decode_avif(data: &[u8]) -> Result<DynamicImage, CompressError> {
    use rav1d::include::dav1d::data::Dav1dData;
    use rav1d::include::dav1d::dav1d::Dav1dSettings;
    use rav1d::include::dav1d::picture::Dav1dPicture;
    use rav1d::src::lib as dav1d;
    use std::ptr::NonNull;

    let avif = avif_parse::read_avif(&mut Cursor::new(data))
        .map_err(|e| CompressError::Decode(format!("AVIF container: {e:?}")))?;
    let av1: &[u8] = &avif.primary_item;

    let mut settings = std::mem::MaybeUninit::<Dav1dSettings>::uninit();
    unsafe { dav1d::dav1d_default_settings(NonNull::from(&mut settings).cast()) };
    let mut settings = unsafe { settings.assume_init() };
    settings.n_threads = 1;
    settings.max_frame_delay = 1;

    let mut ctx = None;
    let rc = unsafe { dav1d::dav1d_open(NonNull::new(&mut ctx), NonNull::new(&mut settings)) };
    if rc.0 != 0 {
        return Err(CompressError::SurfaceAcquisition(format!(
            "AV1 decoder unavailable ({})",
            rc.0
        )));
    }

    let mut input = Dav1dData::default();
    let buf = unsafe { dav1d::dav1d_data_create(NonNull::new(&mut input), av1.len()) };
    if buf.is_null() {
        unsafe { dav1d::dav1d_close(NonNull::new(&mut ctx)) };
        return Err(CompressError::SurfaceAcquisition(
            "AV1 input buffer allocation failed".into(),
        ));
    }
    unsafe { std::ptr::copy_nonoverlapping(av1.as_ptr(), buf, av1.len()) };

    let rc = unsafe { dav1d::dav1d_send_data(ctx, NonNull::new(&mut input)) };
    if rc.0 != 0 {
        unsafe {
            dav1d::dav1d_data_unref(NonNull::new(&mut input));
            dav1d::dav1d_close(NonNull::new(&mut ctx));
        }
        return Err(CompressError::Decode(format!("AV1 bitstream rejected ({})", rc.0)));
    }

    let mut pic: Dav1dPicture = unsafe { std::mem::zeroed() };
    let rc = unsafe { dav1d::dav1d_get_picture(ctx, NonNull::new(&mut pic)) };
    if rc.0 != 0 {
        unsafe { dav1d::dav1d_close(NonNull::new(&mut ctx)) };
        return Err(CompressError::Decode(format!("AV1 frame decode failed ({})", rc.0)));
    }

    let converted = picture_to_rgb8(&pic);
    unsafe {
        dav1d::dav1d_picture_unref(NonNull::new(&mut pic));
        dav1d::dav1d_close(NonNull::new(&mut ctx));
    }
    let (width, height, rgb) = converted?;

    image::RgbImage::from_raw(width, height, rgb)
        .map(DynamicImage::ImageRgb8)
        .ok_or_else(|| {
            CompressError::SurfaceAcquisition("decoded AVIF does not fit its raster".into())
        })
}

/// Byte length of an interleaved RGB8 raster, computed without `u32` overflow.
fn rgb8_len(width: u32, height: u32) -> usize {
    width as usize * height as usize * 3
}

/// Copy a decoded AV1 picture into an interleaved RGB8 buffer.
///
/// Must be called before the picture is released.
fn picture_to_rgb8(
    pic: &rav1d::include::dav1d::picture::Dav1dPicture,
) -> Result<(u32, u32, Vec<u8>), CompressError> {
    use rav1d::include::dav1d::headers::{
        DAV1D_PIXEL_LAYOUT_I400, DAV1D_PIXEL_LAYOUT_I420, DAV1D_PIXEL_LAYOUT_I422,
        DAV1D_PIXEL_LAYOUT_I444,
    };

    let missing = || CompressError::Decode("AV1 picture is missing a plane".to_string());
    let width = pic.p.w as u32;
    let height = pic.p.h as u32;
    let luma = pic.data[0].ok_or_else(missing)?.as_ptr() as *const u8;

    let view = match pic.p.layout {
        DAV1D_PIXEL_LAYOUT_I400 => YuvView {
            luma,
            cb: luma,
            cr: luma,
            luma_stride: pic.stride[0],
            chroma_stride: 0,
            bits: pic.p.bpc as u32,
            subsample: (false, false),
            monochrome: true,
        },
        layout => {
            let subsample = match layout {
                DAV1D_PIXEL_LAYOUT_I420 => (true, true),
                DAV1D_PIXEL_LAYOUT_I422 => (true, false),
                DAV1D_PIXEL_LAYOUT_I444 => (false, false),
                _ => {
                    return Err(CompressError::UnsupportedFormat(format!(
                        "AVIF pixel layout {layout}"
                    )));
                }
            };
            YuvView {
                luma,
                cb: pic.data[1].ok_or_else(missing)?.as_ptr() as *const u8,
                cr: pic.data[2].ok_or_else(missing)?.as_ptr() as *const u8,
                luma_stride: pic.stride[0],
                chroma_stride: pic.stride[1],
                bits: pic.p.bpc as u32,
                subsample,
                monochrome: false,
            }
        }
    };

    Ok((width, height, view.to_rgb8(width, height)))
}

/// Borrowed view of rav1d's YUV planes.
struct YuvView {
    luma: *const u8,
    cb: *const u8,
    cr: *const u8,
    luma_stride: isize,
    chroma_stride: isize,
    /// Bits per component: 8, 10 or 12.
    bits: u32,
    /// Chroma subsampling (horizontal, vertical); I420 = (true, true).
    subsample: (bool, bool),
    monochrome: bool,
}

impl YuvView {
    /// BT.601 YCbCr → RGB, scaled down to 8 bits per channel.
    fn to_rgb8(&self, width: u32, height: u32) -> Vec<u8> {
        let max = ((1u32 << self.bits) - 1) as f32;
        let center = (1u32 << (self.bits - 1)) as f32;
        let scale = 255.0 / max;
        let to_u8 = |v: f32| (v * scale).clamp(0.0, 255.0) as u8;

        let mut out = Vec::with_capacity(rgb8_len(width, height));
        for y in 0..height {
            for x in 0..width {
                let l = self.sample(self.luma, self.luma_stride, x, y);
                if self.monochrome {
                    let v = to_u8(l);
                    out.extend_from_slice(&[v, v, v]);
                    continue;
                }
                let cx = if self.subsample.0 { x / 2 } else { x };
                let cy = if self.subsample.1 { y / 2 } else { y };
                let cb = self.sample(self.cb, self.chroma_stride, cx, cy) - center;
                let cr = self.sample(self.cr, self.chroma_stride, cx, cy) - center;
                out.extend_from_slice(&[
                    to_u8(l + 1.402 * cr),
                    to_u8(l - 0.344136 * cb - 0.714136 * cr),
                    to_u8(l + 1.772 * cb),
                ]);
            }
        }
        out
    }

    /// One component value; >8-bit planes are stored as u16.
    #[inline]
    fn sample(&self, plane: *const u8, stride: isize, x: u32, y: u32) -> f32 {
        let row = y as isize * stride;
        if self.bits <= 8 {
            (unsafe { *plane.offset(row + x as isize) }) as f32
        } else {
            (unsafe { *(plane.offset(row + x as isize * 2) as *const u16) }) as f32
        }
    }
}

impl ImageBackend for RustBackend {
    type Surface = DynamicImage;

    fn decode(&self, file: &ImageFile) -> Result<DynamicImage, CompressError> {
        decode_file(file)
    }

    fn dimensions(&self, surface: &DynamicImage) -> Dimensions {
        Dimensions {
            width: surface.width(),
            height: surface.height(),
        }
    }

    fn render(
        &self,
        surface: DynamicImage,
        params: &RenderParams,
    ) -> Result<DynamicImage, CompressError> {
        if params.width == 0 || params.height == 0 {
            return Err(CompressError::SurfaceAcquisition(format!(
                "cannot allocate a {}x{} surface",
                params.width, params.height
            )));
        }
        // 8 bits per channel, alpha only when the source has it
        let flat = if surface.color().has_alpha() {
            DynamicImage::ImageRgba8(surface.into_rgba8())
        } else {
            DynamicImage::ImageRgb8(surface.into_rgb8())
        };
        if (flat.width(), flat.height()) == (params.width, params.height) {
            return Ok(flat);
        }
        Ok(flat.resize_exact(params.width, params.height, FilterType::Lanczos3))
    }

    fn encode(
        &self,
        surface: &DynamicImage,
        params: &EncodeParams,
    ) -> Result<Vec<u8>, CompressError> {
        let quality = params.quality.value() as u8;
        let mut out = Cursor::new(Vec::new());
        let written = match params.format {
            ImageFormat::Jpeg => DynamicImage::ImageRgb8(surface.to_rgb8())
                .write_with_encoder(JpegEncoder::new_with_quality(&mut out, quality)),
            ImageFormat::Avif => surface.write_with_encoder(
                AvifEncoder::new_with_speed_quality(&mut out, AVIF_SPEED, quality),
            ),
            ImageFormat::Png | ImageFormat::WebP | ImageFormat::Tiff => {
                surface.write_to(&mut out, params.format)
            }
            other => {
                return Err(CompressError::UnsupportedFormat(format!(
                    "no encoder for {}",
                    other.to_mime_type()
                )));
            }
        };
        written.map_err(|e| {
            CompressError::Encode(format!("{}: {e}", params.format.to_mime_type()))
        })?;
        Ok(out.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::imaging::{CompressOptions, Quality, SizeBudget, compress};
    use crate::test_helpers::{encode_as, noise_image};

    fn encode_params(format: ImageFormat, quality: u32) -> EncodeParams {
        EncodeParams {
            format,
            quality: Quality::new(quality),
        }
    }

    #[test]
    fn supported_extensions_match_decodable_formats() {
        let exts = supported_input_extensions();
        for expected in &["jpg", "jpeg", "png", "tif", "tiff", "webp", "avif"] {
            assert!(
                exts.contains(expected),
                "expected {expected} in supported extensions"
            );
        }
    }

    #[test]
    fn decode_synthetic_jpeg() {
        let bytes = encode_as(&noise_image(200, 150, 1), ImageFormat::Jpeg, 90);
        let backend = RustBackend::new();
        let img = backend
            .decode(&ImageFile::new(bytes, ImageFormat::Jpeg))
            .unwrap();
        assert_eq!(backend.dimensions(&img).as_tuple(), (200, 150));
    }

    #[test]
    fn decode_garbage_errors() {
        let backend = RustBackend::new();
        let err = backend
            .decode(&ImageFile::new(vec![0u8; 64], ImageFormat::Png))
            .unwrap_err();
        assert!(matches!(err, CompressError::Decode(_)));
    }

    #[test]
    fn decode_without_decoder_is_unsupported() {
        let backend = RustBackend::new();
        let err = backend
            .decode(&ImageFile::new(vec![0u8; 64], ImageFormat::Gif))
            .unwrap_err();
        assert!(matches!(err, CompressError::UnsupportedFormat(_)));
    }

    #[test]
    fn render_resizes_to_exact_dimensions() {
        let backend = RustBackend::new();
        let surface = backend
            .render(
                noise_image(400, 300, 2),
                &RenderParams {
                    width: 200,
                    height: 150,
                },
            )
            .unwrap();
        assert_eq!((surface.width(), surface.height()), (200, 150));
        assert!(matches!(surface, DynamicImage::ImageRgb8(_)));
    }

    #[test]
    fn render_keeps_alpha_and_flattens_depth() {
        let backend = RustBackend::new();
        let rgba16 = DynamicImage::ImageRgba16(noise_image(20, 10, 11).to_rgba16());
        let surface = backend
            .render(
                rgba16,
                &RenderParams {
                    width: 10,
                    height: 5,
                },
            )
            .unwrap();
        assert!(matches!(surface, DynamicImage::ImageRgba8(_)));
    }

    #[test]
    fn render_at_native_size_keeps_pixels() {
        let backend = RustBackend::new();
        let source = noise_image(32, 16, 3);
        let expected = source.to_rgb8();
        let surface = backend
            .render(
                source,
                &RenderParams {
                    width: 32,
                    height: 16,
                },
            )
            .unwrap();
        assert_eq!(surface.to_rgb8(), expected);
    }

    #[test]
    fn render_zero_surface_fails() {
        let backend = RustBackend::new();
        let err = backend
            .render(
                noise_image(10, 10, 4),
                &RenderParams {
                    width: 0,
                    height: 10,
                },
            )
            .unwrap_err();
        assert!(matches!(err, CompressError::SurfaceAcquisition(_)));
    }

    #[test]
    fn encode_preserves_media_type() {
        let backend = RustBackend::new();
        let surface = DynamicImage::ImageRgba8(noise_image(64, 48, 5).to_rgba8());
        for format in [
            ImageFormat::Jpeg,
            ImageFormat::Png,
            ImageFormat::WebP,
            ImageFormat::Tiff,
        ] {
            let bytes = backend
                .encode(&surface, &encode_params(format, 80))
                .unwrap();
            assert!(!bytes.is_empty());
            assert_eq!(image::guess_format(&bytes).unwrap(), format);
        }
    }

    #[test]
    fn jpeg_quality_controls_size() {
        let backend = RustBackend::new();
        let surface = DynamicImage::ImageRgba8(noise_image(256, 256, 6).to_rgba8());
        let high = backend
            .encode(&surface, &encode_params(ImageFormat::Jpeg, 80))
            .unwrap();
        let low = backend
            .encode(&surface, &encode_params(ImageFormat::Jpeg, 30))
            .unwrap();
        assert!(low.len() < high.len());
    }

    #[test]
    fn encode_without_encoder_is_unsupported() {
        let backend = RustBackend::new();
        let surface = noise_image(8, 8, 7);
        let err = backend
            .encode(&surface, &encode_params(ImageFormat::Bmp, 80))
            .unwrap_err();
        assert!(matches!(err, CompressError::UnsupportedFormat(_)));
    }

    #[test]
    fn avif_round_trip() {
        let backend = RustBackend::new();
        let surface = noise_image(64, 48, 8);
        let bytes = backend
            .encode(&surface, &encode_params(ImageFormat::Avif, 85))
            .unwrap();

        let decoded = backend
            .decode(&ImageFile::new(bytes, ImageFormat::Avif))
            .unwrap();
        assert_eq!(backend.dimensions(&decoded).as_tuple(), (64, 48));
    }

    #[test]
    #[cfg(target_pointer_width = "64")]
    fn rgb8_len_does_not_overflow_u32() {
        assert_eq!(rgb8_len(2, 3), 18);
        assert_eq!(rgb8_len(70_000, 70_000), 14_700_000_000);
    }

    #[test]
    fn avif_garbage_errors() {
        let err = decode_avif(&[0u8; 32]).unwrap_err();
        assert!(matches!(err, CompressError::Decode(_)));
    }

    #[test]
    fn compress_caps_dimensions_and_keeps_jpeg() {
        let file = ImageFile::new(
            encode_as(&noise_image(640, 400, 9), ImageFormat::Jpeg, 100),
            ImageFormat::Jpeg,
        );
        let options = CompressOptions {
            size_budget: SizeBudget::from_megabytes(0.0001),
            max_dimension: 320,
            ..CompressOptions::default()
        };

        let out = compress(&RustBackend::new(), &file, &options).unwrap();

        assert_eq!(out.blob.format(), ImageFormat::Jpeg);
        let decoded = image::load_from_memory(out.blob.bytes()).unwrap();
        assert_eq!((decoded.width(), decoded.height()), (320, 200));
        // 105 bytes can never hold a 320x200 noise JPEG
        let qualities: Vec<u32> = out.report.attempts.iter().map(|a| a.quality.value()).collect();
        assert_eq!(qualities, vec![80, 70, 60, 50, 40, 30]);
        assert!(!out.report.within_budget);
    }

    #[test]
    fn compress_png_stays_png() {
        let file = ImageFile::new(
            encode_as(&noise_image(300, 300, 10), ImageFormat::Png, 100),
            ImageFormat::Png,
        );
        let options = CompressOptions {
            size_budget: SizeBudget::from_megabytes(0.01),
            max_dimension: 100,
            ..CompressOptions::default()
        };

        let out = compress(&RustBackend::new(), &file, &options).unwrap();
        assert_eq!(image::guess_format(out.blob.bytes()).unwrap(), ImageFormat::Png);
        assert_eq!(out.report.output, Some(Dimensions { width: 100, height: 100 }));
    }
}
