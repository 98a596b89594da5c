//! Batch round-trip: normalized float images in, degraded float images out.
//!
//! ## Per-image steps
//!
//! ```text
//! Rgb32FImage ──clamp, ×255, truncate──▶ RgbImage
//!             ──backend.round_trip(crf)──▶ Decoded(RgbImage) | Empty
//!             ──÷255──▶ Rgb32FImage        (Empty: the input, untouched)
//! ```
//!
//! Images are processed strictly in order, one at a time. A backend error
//! aborts the batch and reports the index of the image that failed; an empty
//! decode does not, the source image is kept instead.

use crate::codec::{BackendError, Crf, RoundTrip, RoundTripBackend};
use image::{Rgb32FImage, RgbImage};
use thiserror::Error;
use tracing::{debug, info, warn};

#[derive(Error, Debug)]
pub enum CompressError {
    #[error("image {index}: {source}")]
    Backend {
        index: usize,
        #[source]
        source: BackendError,
    },
    #[error("image {index}: decoded frame is {actual:?}, expected {expected:?}")]
    DimensionMismatch {
        index: usize,
        expected: (u32, u32),
        actual: (u32, u32),
    },
}

/// How a single image came through the round-trip.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageOutcome {
    /// Replaced by the decoded frame.
    RoundTripped,
    /// The decoder produced nothing; the source image was kept.
    Unchanged,
}

/// Round-tripped images plus what happened to each one, index-aligned.
#[derive(Debug, Clone)]
pub struct CompressReport {
    pub images: Vec<Rgb32FImage>,
    pub outcomes: Vec<ImageOutcome>,
}

impl CompressReport {
    pub fn unchanged_count(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|o| **o == ImageOutcome::Unchanged)
            .count()
    }
}

/// Runs image batches through one backend, chosen up front.
pub struct Compressor {
    backend: Box<dyn RoundTripBackend>,
}

impl Compressor {
    pub fn new(backend: Box<dyn RoundTripBackend>) -> Self {
        Self { backend }
    }

    pub fn backend_name(&self) -> &'static str {
        self.backend.name()
    }

    /// Round-trip every image of `batch` at `crf`.
    ///
    /// The output has the same length and order as the input.
    pub fn compress(
        &self,
        batch: &[Rgb32FImage],
        crf: Crf,
    ) -> Result<Vec<Rgb32FImage>, CompressError> {
        self.compress_with_report(batch, crf).map(|r| r.images)
    }

    /// Like [`compress`](Self::compress), also returning per-image outcomes.
    pub fn compress_with_report(
        &self,
        batch: &[Rgb32FImage],
        crf: Crf,
    ) -> Result<CompressReport, CompressError> {
        if !crf.is_nominal() {
            warn!(%crf, "CRF outside 0-51, passing it to the codec unchanged");
        }

        let mut images = Vec::with_capacity(batch.len());
        let mut outcomes = Vec::with_capacity(batch.len());

        for (index, image) in batch.iter().enumerate() {
            let (out, outcome) = self.compress_one(index, image, crf)?;
            images.push(out);
            outcomes.push(outcome);
        }

        let report = CompressReport { images, outcomes };
        info!(
            backend = self.backend.name(),
            %crf,
            images = batch.len(),
            unchanged = report.unchanged_count(),
            "batch round-tripped"
        );
        Ok(report)
    }

    fn compress_one(
        &self,
        index: usize,
        image: &Rgb32FImage,
        crf: Crf,
    ) -> Result<(Rgb32FImage, ImageOutcome), CompressError> {
        let frame = to_rgb8(image);
        let result = self
            .backend
            .round_trip(&frame, crf)
            .map_err(|source| CompressError::Backend { index, source })?;

        match result {
            RoundTrip::Decoded(decoded) => {
                if decoded.dimensions() != image.dimensions() {
                    return Err(CompressError::DimensionMismatch {
                        index,
                        expected: image.dimensions(),
                        actual: decoded.dimensions(),
                    });
                }
                debug!(index, "round-tripped");
                Ok((to_rgb32f(&decoded), ImageOutcome::RoundTripped))
            }
            RoundTrip::Empty => {
                debug!(index, "decoder produced no frame, keeping source image");
                Ok((image.clone(), ImageOutcome::Unchanged))
            }
        }
    }
}

/// Normalized floats to 8-bit: clamp to [0,1] (NaN → 0), scale, truncate.
pub fn to_rgb8(image: &Rgb32FImage) -> RgbImage {
    let (width, height) = image.dimensions();
    let samples = image
        .as_raw()
        .iter()
        .map(|&v| {
            let v = if v.is_nan() { 0.0 } else { v.clamp(0.0, 1.0) };
            (v * 255.0) as u8
        })
        .collect();
    // Same sample count as the source buffer, so this cannot fail.
    RgbImage::from_raw(width, height, samples).unwrap_or_else(|| RgbImage::new(width, height))
}

/// 8-bit samples back to [0,1].
pub fn to_rgb32f(image: &RgbImage) -> Rgb32FImage {
    let (width, height) = image.dimensions();
    let samples = image
        .as_raw()
        .iter()
        .map(|&v| f32::from(v) / 255.0)
        .collect();
    Rgb32FImage::from_raw(width, height, samples).unwrap_or_else(|| Rgb32FImage::new(width, height))
}
