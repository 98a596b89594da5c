//! Round-trip backend trait and shared types.
//!
//! The [`RoundTripBackend`] trait is the single operation every backend must
//! support: take one 8-bit RGB frame, push it through a video encoder at the
//! given [`Crf`], and decode the first frame back.
//!
//! Two implementations exist:
//! - [`NativeBackend`](super::native::NativeBackend): in-process AV1
//!   (`rav1e` encode, `rav1d` decode), compiled in with the `native` feature.
//! - [`FfmpegBackend`](super::ffmpeg::FfmpegBackend): two `ffmpeg` invocations
//!   through a temporary directory.
//!
//! Which one runs is decided once, by [`select_backend`](super::select_backend).

use super::params::Crf;
use image::RgbImage;
use std::process::ExitStatus;
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum BackendError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),
    #[error("{program} not found (is it installed and on PATH?)")]
    ToolNotFound { program: String },
    #[error("{stage} step exited with {status}: {stderr}")]
    ToolFailed {
        stage: &'static str,
        status: ExitStatus,
        stderr: String,
    },
    #[error("{stage} step timed out after {after:?}")]
    Timeout {
        stage: &'static str,
        after: Duration,
    },
    #[error("Backend unavailable: {0}")]
    Unavailable(String),
    #[error("Processing failed: {0}")]
    ProcessingFailed(String),
}

/// What came back out of the decoder.
#[derive(Debug, Clone, PartialEq)]
pub enum RoundTrip {
    /// The first decoded frame, in full-range 8-bit RGB.
    Decoded(RgbImage),
    /// The decoder produced no frame at all.
    Empty,
}

/// Trait for round-trip backends.
///
/// Implementations must leave no state behind between calls: every call gets
/// a fresh encoder, decoder and container.
pub trait RoundTripBackend {
    /// Short name used in logs and CLI output.
    fn name(&self) -> &'static str;

    /// Encode `frame` as a single-frame video at `crf` and decode it back.
    fn round_trip(&self, frame: &RgbImage, crf: Crf) -> Result<RoundTrip, BackendError>;
}
