//! Pure calculation functions for image dimensions.
//!
//! All functions here are pure and testable without any I/O or images.

/// Default cap on the longer side of a compressed image.
pub const MAX_DIMENSION: u32 = 1920;

/// Scale `source` down so neither side exceeds `max_dimension`.
///
/// When a side is over the cap, the longer side becomes exactly
/// `max_dimension` and the shorter side is scaled by the same ratio and
/// rounded to the nearest pixel (never below 1). Images already within the
/// cap keep their size; nothing is ever scaled up.
///
/// # Arguments
/// * `source` - Original image dimensions (width, height)
/// * `max_dimension` - Longest allowed side in pixels
///
/// # Returns
/// * `(width, height)` - Target surface dimensions
///
/// ```text
/// fit_within((3840, 2160), 1920) == (1920, 1080)
/// fit_within((1000, 3000), 1920) == (640, 1920)
/// fit_within((800, 600), 1920)   == (800, 600)
/// ```
pub fn fit_within(source: (u32, u32), max_dimension: u32) -> (u32, u32) {
    let (w, h) = source;
    if w <= max_dimension && h <= max_dimension {
        return (w, h);
    }

    if w >= h {
        // Landscape or square: width is the longer side
        let scaled = (h as f64 * max_dimension as f64 / w as f64).round() as u32;
        (max_dimension, scaled.max(1))
    } else {
        let scaled = (w as f64 * max_dimension as f64 / h as f64).round() as u32;
        (scaled.max(1), max_dimension)
    }
}
