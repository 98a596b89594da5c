//! Runs the same batch through every available backend and compares the
//! degradation each one introduces.
//!
//! Run with: cargo test --test compare_backends -- --nocapture
//!
//! The ffmpeg half is skipped when ffmpeg (or its libx265 encoder) is missing;
//! the native half needs the default `native` feature.

use crf_roundtrip::codec::{BackendError, Crf, FfmpegBackend, RoundTripBackend};
use crf_roundtrip::compress::{CompressError, Compressor};
use image::{Rgb, Rgb32FImage};
use std::time::Instant;

/// Smooth gradients plus a checkerboard, so both flat and busy areas are hit.
fn textured(width: u32, height: u32) -> Rgb32FImage {
    Rgb32FImage::from_fn(width, height, |x, y| {
        let checker = if (x / 4 + y / 4) % 2 == 0 { 0.15 } else { 0.0 };
        Rgb([
            x as f32 / width as f32 * 0.8 + checker,
            y as f32 / height as f32 * 0.8 + checker,
            0.5 - checker,
        ])
    })
}

fn mean_abs_error(a: &Rgb32FImage, b: &Rgb32FImage) -> f32 {
    let sum: f32 = a
        .as_raw()
        .iter()
        .zip(b.as_raw())
        .map(|(x, y)| (x - y).abs())
        .sum();
    sum / a.as_raw().len() as f32
}

/// Round-trip `batch` at a low and a high CRF, checking the batch contract and
/// that quality drops as CRF rises. Returns `(mae_low, mae_high)`.
fn exercise(backend: Box<dyn RoundTripBackend>, batch: &[Rgb32FImage]) -> (f32, f32) {
    let compressor = Compressor::new(backend);

    let t = Instant::now();
    let low = compressor.compress(batch, Crf::new(0)).unwrap();
    let high = compressor.compress(batch, Crf::new(51)).unwrap();
    let elapsed = t.elapsed().as_millis();

    for out in [&low, &high] {
        assert_eq!(out.len(), batch.len());
        for (o, i) in out.iter().zip(batch) {
            assert_eq!(o.dimensions(), i.dimensions());
            assert!(o.as_raw().iter().all(|v| (0.0..=1.0).contains(v)));
        }
    }

    let mae_low = mean_abs_error(&low[0], &batch[0]);
    let mae_high = mean_abs_error(&high[0], &batch[0]);
    println!(
        "  {}: crf 0 mae={:.4}  crf 51 mae={:.4}  ({} ms)",
        compressor.backend_name(),
        mae_low,
        mae_high,
        elapsed
    );
    assert!(mae_low < mae_high, "crf 0 ({mae_low}) should beat crf 51 ({mae_high})");
    (mae_low, mae_high)
}

fn batch() -> Vec<Rgb32FImage> {
    vec![textured(96, 64), textured(33, 17), textured(64, 64)]
}

/// Even sizes of at least 64px, which libx265 with yuv420p accepts.
fn even_batch() -> Vec<Rgb32FImage> {
    vec![textured(96, 64), textured(80, 66), textured(64, 64)]
}

#[cfg(feature = "native")]
#[test]
fn native_backend_degrades_with_crf() {
    let (low, _) = exercise(
        Box::new(crf_roundtrip::codec::NativeBackend::new()),
        &batch(),
    );
    assert!(low < 0.05, "near-lossless setting drifted: {low}");
}

#[test]
fn ffmpeg_backend_degrades_with_crf() {
    let ffmpeg = FfmpegBackend::new();
    if !ffmpeg.is_available() {
        eprintln!("ffmpeg not found - skipping");
        return;
    }

    // Probe once so a build without libx265 skips instead of failing.
    let probe = Compressor::new(Box::new(FfmpegBackend::new()));
    match probe.compress(&[textured(16, 16)], Crf::new(28)) {
        Err(CompressError::Backend {
            source: BackendError::ToolFailed { stderr, .. },
            ..
        }) if stderr.contains("libx265") => {
            eprintln!("ffmpeg lacks libx265 - skipping");
            return;
        }
        other => {
            other.unwrap();
        }
    }

    exercise(Box::new(ffmpeg), &even_batch());
}

#[cfg(feature = "native")]
#[test]
fn backends_agree_on_shape() {
    let ffmpeg = FfmpegBackend::new();
    if !ffmpeg.is_available() {
        eprintln!("ffmpeg not found - skipping");
        return;
    }

    let batch = even_batch();
    let native = Compressor::new(Box::new(crf_roundtrip::codec::NativeBackend::new()))
        .compress(&batch, Crf::default())
        .unwrap();
    let external = match Compressor::new(Box::new(ffmpeg)).compress(&batch, Crf::default()) {
        Ok(out) => out,
        Err(CompressError::Backend {
            source: BackendError::ToolFailed { stderr, .. },
            ..
        }) if stderr.contains("libx265") => {
            eprintln!("ffmpeg lacks libx265 - skipping");
            return;
        }
        Err(e) => panic!("ffmpeg round-trip failed: {e}"),
    };

    assert_eq!(native.len(), external.len());
    for ((n, e), i) in native.iter().zip(&external).zip(&batch) {
        assert_eq!(n.dimensions(), i.dimensions());
        assert_eq!(e.dimensions(), i.dimensions());
        // Different codecs, same ballpark at the default CRF.
        assert!(mean_abs_error(n, e) < 0.1);
    }
}

#[test]
fn missing_tool_fails_first_image() {
    let compressor = Compressor::new(Box::new(
        FfmpegBackend::new().with_program("/nonexistent/ffmpeg"),
    ));
    let err = compressor.compress(&batch(), Crf::default()).unwrap_err();
    assert!(matches!(
        err,
        CompressError::Backend {
            index: 0,
            source: BackendError::ToolNotFound { .. },
        }
    ));
}
