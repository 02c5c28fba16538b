//! Parameter types for image operations.
//!
//! These structs describe *what* to do, not *how* to do it. They are the
//! interface between the [`compress`](super::compress) loop (which decides how
//! large the surface is and which quality to try next) and the
//! [`backend`](super::backend) (which does the actual pixel work). Keeping them
//! apart lets tests drive the loop with a mock backend.
//!
//! ## Types
//!
//! - [`Quality`] — Lossy encoding quality as a whole percentage (1–100). Clamped on construction.
//! - [`SizeBudget`] — Upper bound on output size, in megabytes of 1024×1024 bytes.
//! - [`RenderParams`] — Target surface dimensions for the render step.
//! - [`EncodeParams`] — Output media type and quality for one encode attempt.

use image::ImageFormat;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Bytes in one megabyte, as used by every size comparison in this crate.
pub const BYTES_PER_MB: f64 = 1024.0 * 1024.0;

/// Quality setting for lossy image encoding, stored as a percentage (1-100).
///
/// Callers usually think of quality as a fraction in `(0, 1]`; see
/// [`Quality::from_fraction`]. Holding it as an integer keeps the stepped
/// sequence `80, 70, … 30` exact.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Quality(pub u32);

impl Quality {
    /// Starting quality when the caller gives none (0.8).
    pub const DEFAULT: Quality = Quality(80);
    /// Lowest quality the compressor will try (0.3).
    pub const FLOOR: Quality = Quality(30);
    /// Amount quality drops between attempts (0.1).
    pub const STEP: u32 = 10;

    pub fn new(value: u32) -> Self {
        Self(value.clamp(1, 100))
    }

    /// Build from a fraction in `(0, 1]`, rounding to the nearest percent.
    pub fn from_fraction(fraction: f64) -> Self {
        Self::new((fraction * 100.0).round() as u32)
    }

    pub fn value(self) -> u32 {
        self.0
    }

    pub fn as_fraction(self) -> f64 {
        self.0 as f64 / 100.0
    }

    /// The next quality to try: one step lower, but never below `floor`.
    pub fn step_down(self, floor: Quality) -> Quality {
        Quality(self.0.saturating_sub(Self::STEP).max(floor.0))
    }
}

impl Default for Quality {
    fn default() -> Self {
        Self::DEFAULT
    }
}

impl fmt::Display for Quality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.2}", self.as_fraction())
    }
}

/// Maximum acceptable output size, in megabytes (1 MB = 1024×1024 bytes).
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SizeBudget(f64);

impl SizeBudget {
    pub fn from_megabytes(megabytes: f64) -> Self {
        Self(megabytes)
    }

    pub fn megabytes(self) -> f64 {
        self.0
    }

    /// Budget in whole bytes, rounded down.
    pub fn bytes(self) -> u64 {
        (self.0 * BYTES_PER_MB).floor() as u64
    }

    /// True when an input of `len` bytes can be returned untouched.
    ///
    /// Strictly smaller than the budget; an input exactly at the budget still
    /// goes through the pipeline.
    pub fn admits_unchanged(self, len: usize) -> bool {
        len as f64 / BYTES_PER_MB < self.0
    }

    /// True when an encoded blob of `len` bytes is still over budget.
    pub fn is_exceeded_by(self, len: usize) -> bool {
        len as f64 / BYTES_PER_MB > self.0
    }
}

impl Default for SizeBudget {
    fn default() -> Self {
        Self(10.0)
    }
}

impl fmt::Display for SizeBudget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} MB", self.0)
    }
}

/// Surface size for the render step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RenderParams {
    pub width: u32,
    pub height: u32,
}

/// One encode attempt: the media type to produce and the quality to use.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EncodeParams {
    pub format: ImageFormat,
    pub quality: Quality,
}
