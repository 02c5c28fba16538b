//! Adaptive compression: fit an image under a byte budget.
//!
//! ```text
//! size < budget ──────────────────────────────► original bytes (borrowed)
//!       │
//!       ▼
//!   ┌─► decode → fit_within(max_dimension) → render → encode(q)
//!   │                                                     │
//!   └──── q -= 0.1 ◄── size > budget && q > floor ────────┤
//!                                                         ▼
//!                                           encoded blob (met or not)
//! ```
//!
//! The surface is capped at `max_dimension` as soon as the input is over
//! budget, even when the resize alone would have been enough. Every attempt
//! runs the whole chain from the original bytes. Quality never drops below
//! `min_quality`; once it is reached the last blob is returned whether or not
//! it fits.

use super::backend::{Blob, CompressError, Dimensions, ImageBackend, ImageFile};
use super::calculations::{MAX_DIMENSION, fit_within};
use super::params::{EncodeParams, Quality, RenderParams, SizeBudget};
use serde::{Deserialize, Serialize};

/// Knobs for one compression call.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CompressOptions {
    pub size_budget: SizeBudget,
    /// Quality of the first encode attempt.
    pub quality: Quality,
    /// Quality floor. Reaching it ends the loop.
    pub min_quality: Quality,
    /// Longest side of the rendered surface.
    pub max_dimension: u32,
}

impl Default for CompressOptions {
    fn default() -> Self {
        Self {
            size_budget: SizeBudget::default(),
            quality: Quality::DEFAULT,
            min_quality: Quality::FLOOR,
            max_dimension: MAX_DIMENSION,
        }
    }
}

impl CompressOptions {
    /// Check `0 < min_quality <= quality <= 1`, a positive budget and a positive cap.
    pub fn validate(&self) -> Result<(), CompressError> {
        let mb = self.size_budget.megabytes();
        if !(mb.is_finite() && mb > 0.0) {
            return Err(CompressError::InvalidRequest(format!(
                "size budget must be positive, got {mb} MB"
            )));
        }
        if self.min_quality.value() == 0 || self.quality.value() > 100 {
            return Err(CompressError::InvalidRequest(
                "quality values must be within (0, 1]".into(),
            ));
        }
        if self.min_quality > self.quality {
            return Err(CompressError::InvalidRequest(format!(
                "min quality {} exceeds starting quality {}",
                self.min_quality, self.quality
            )));
        }
        if self.max_dimension == 0 {
            return Err(CompressError::InvalidRequest(
                "max dimension must be non-zero".into(),
            ));
        }
        Ok(())
    }
}

/// One encode attempt and the size it produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attempt {
    pub quality: Quality,
    pub bytes: usize,
}

/// What happened during a compression call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompressionReport {
    pub mime_type: String,
    pub original_bytes: usize,
    pub output_bytes: usize,
    pub budget_bytes: u64,
    /// Decoded size. Absent when the input was returned untouched.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<Dimensions>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<Dimensions>,
    /// Encode attempts in order. Empty for untouched inputs.
    #[serde(default)]
    pub attempts: Vec<Attempt>,
    pub within_budget: bool,
}

impl CompressionReport {
    pub fn is_passthrough(&self) -> bool {
        self.attempts.is_empty()
    }

    pub fn final_quality(&self) -> Option<Quality> {
        self.attempts.last().map(|a| a.quality)
    }

    pub fn was_resized(&self) -> bool {
        matches!((self.source, self.output), (Some(s), Some(o)) if s != o)
    }
}

/// Output blob plus its report.
#[derive(Debug, Clone, PartialEq)]
pub struct Compressed<'a> {
    pub blob: Blob<'a>,
    pub report: CompressionReport,
}

/// Shrink `file` until it fits `options.size_budget` or quality hits the floor.
///
/// The returned blob always has the media type of `file`. When the input is
/// already under budget the blob borrows `file`'s bytes and nothing is
/// decoded.
pub fn compress<'a, B: ImageBackend>(
    backend: &B,
    file: &'a ImageFile,
    options: &CompressOptions,
) -> Result<Compressed<'a>, CompressError> {
    options.validate()?;
    let budget = options.size_budget;

    if budget.admits_unchanged(file.len()) {
        return Ok(Compressed {
            blob: Blob::borrowed(file.bytes(), file.format()),
            report: CompressionReport {
                mime_type: file.mime_type().to_string(),
                original_bytes: file.len(),
                output_bytes: file.len(),
                budget_bytes: budget.bytes(),
                source: None,
                output: None,
                attempts: Vec::new(),
                within_budget: true,
            },
        });
    }

    let mut quality = options.quality;
    let mut attempts = Vec::new();
    let (encoded, source, (width, height)) = loop {
        let decoded = backend.decode(file)?;
        let source = backend.dimensions(&decoded);
        let target = fit_within(source.as_tuple(), options.max_dimension);
        let surface = backend.render(
            decoded,
            &RenderParams {
                width: target.0,
                height: target.1,
            },
        )?;
        let encoded = backend.encode(
            &surface,
            &EncodeParams {
                format: file.format(),
                quality,
            },
        )?;
        if encoded.is_empty() {
            return Err(CompressError::Encode(format!(
                "{} encoder produced no data at quality {quality}",
                file.mime_type()
            )));
        }
        attempts.push(Attempt {
            quality,
            bytes: encoded.len(),
        });

        if budget.is_exceeded_by(encoded.len()) && quality > options.min_quality {
            quality = quality.step_down(options.min_quality);
            continue;
        }
        break (encoded, source, target);
    };

    let report = CompressionReport {
        mime_type: file.mime_type().to_string(),
        original_bytes: file.len(),
        output_bytes: encoded.len(),
        budget_bytes: budget.bytes(),
        source: Some(source),
        output: Some(Dimensions { width, height }),
        attempts,
        within_budget: !budget.is_exceeded_by(encoded.len()),
    };
    Ok(Compressed {
        blob: Blob::owned(encoded, file.format()),
        report,
    })
}
