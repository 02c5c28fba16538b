//! Image processing — pure Rust, no system libraries.
//!
//! | Operation | Crate / function |
//! |---|---|
//! | **Decode** | `image::ImageReader` (AVIF: `avif-parse` + `rav1d`) |
//! | **Render** | 8-bit RGB/RGBA surface, Lanczos3 resize |
//! | **Encode** | `image` encoders, same media type as the input |
//! | **Data URL** | `base64` standard engine |
//!
//! The module is split into:
//! - **Calculations**: Pure functions for dimension math (unit testable)
//! - **Parameters**: Quality, size budget and per-stage parameters
//! - **Backend**: [`ImageBackend`] trait + [`RustBackend`]
//! - **Compress**: the budget loop driving a backend
//! - **Data URL**: blob ⇄ `data:` URL conversion

pub mod backend;
mod calculations;
pub mod compress;
pub mod data_url;
mod params;
pub mod rust_backend;

pub use backend::{Blob, CompressError, Dimensions, ImageBackend, ImageFile};
pub use calculations::{MAX_DIMENSION, fit_within};
pub use compress::{Attempt, CompressOptions, Compressed, CompressionReport, compress};
pub use data_url::{blob_to_base64, parse_data_url, read_to_base64};
pub use params::{BYTES_PER_MB, EncodeParams, Quality, RenderParams, SizeBudget};
pub use rust_backend::{RustBackend, supported_input_extensions};
