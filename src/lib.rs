//! # upload-shrink
//!
//! Shrinks images so they fit an upload size budget before they are sent to
//! an object store. Inputs already under budget pass through untouched;
//! larger ones are capped at 1920 px on the longer side and re-encoded at
//! stepped-down quality until they fit or quality reaches its floor.
//!
//! # Architecture
//!
//! ```text
//! ImageFile ──► compress ──► Blob ──► blob_to_base64 ──► data:image/…;base64,…
//!                  │
//!                  └── ImageBackend (decode → render → encode)
//! ```
//!
//! The library never prints and holds no state between calls. The binary
//! adds batch processing over files and directories, a layered config file,
//! and terminal output.
//!
//! # Module Map
//!
//! | Module | Role |
//! |--------|------|
//! | [`imaging`] | Budget-driven compression, backends, data URLs |
//! | [`batch`] | Parallel compression of many files into an output directory |
//! | [`config`] | `upload-shrink.toml` loading, merging with flags, validation |
//! | [`output`] | CLI output formatting of batch events and summaries |
//!
//! # Design Decisions
//!
//! ## Media Type Is Preserved
//!
//! A JPEG comes back as a JPEG, a PNG as a PNG. Quality only affects the
//! lossy encoders (JPEG, AVIF); PNG, WebP and TIFF are written losslessly, so
//! for them the dimension cap does the work.
//!
//! ## Integer Quality Steps
//!
//! Quality is stored as a whole percentage. Stepping `0.8` down by `0.1` in
//! floating point never lands exactly on `0.3`; with integers the attempt
//! sequence is exactly `80, 70, 60, 50, 40, 30` and the floor is never
//! crossed.
//!
//! ## Pure-Rust Imaging
//!
//! Decoding, resizing and encoding use the `image` crate; AVIF input is
//! decoded with `avif-parse` + `rav1d`. No system libraries, so the binary is
//! self-contained.

pub mod batch;
pub mod config;
pub mod imaging;
pub mod output;

#[cfg(test)]
pub(crate) mod test_helpers;
