//! One-time backend selection.
//!
//! The in-process codec is a compile-time capability (the `native` feature).
//! [`select_backend`] resolves the configured [`BackendChoice`] against it once
//! at startup; the result is handed to the compressor and never revisited.

use super::backend::{BackendError, RoundTripBackend};
use super::ffmpeg::FfmpegBackend;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

/// Which backend to run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum BackendChoice {
    /// In-process when compiled in, otherwise ffmpeg.
    #[default]
    Auto,
    /// In-process only; an error when not compiled in.
    Native,
    /// Always shell out to ffmpeg.
    Ffmpeg,
}

/// Whether the in-process codec was compiled into this build.
pub fn native_available() -> bool {
    cfg!(feature = "native")
}

/// Resolve `choice` into a concrete backend.
///
/// `Auto` falls back to `ffmpeg` with a warning when the in-process codec is
/// missing; an explicit `Native` request fails instead.
pub fn select_backend(
    choice: BackendChoice,
    native_speed: u8,
    ffmpeg: FfmpegBackend,
) -> Result<Box<dyn RoundTripBackend>, BackendError> {
    let backend: Box<dyn RoundTripBackend> = match (choice, native_available()) {
        (BackendChoice::Ffmpeg, _) => Box::new(ffmpeg),
        (BackendChoice::Auto | BackendChoice::Native, true) => native_backend(native_speed)?,
        (BackendChoice::Auto, false) => {
            warn!("in-process codec not compiled in, falling back to the ffmpeg CLI");
            Box::new(ffmpeg)
        }
        (BackendChoice::Native, false) => {
            return Err(BackendError::Unavailable(
                "built without the `native` feature".to_string(),
            ));
        }
    };
    info!(backend = backend.name(), "round-trip backend selected");
    Ok(backend)
}

#[cfg(feature = "native")]
fn native_backend(speed: u8) -> Result<Box<dyn RoundTripBackend>, BackendError> {
    Ok(Box::new(super::native::NativeBackend::with_speed(speed)))
}

#[cfg(not(feature = "native"))]
fn native_backend(_speed: u8) -> Result<Box<dyn RoundTripBackend>, BackendError> {
    Err(BackendError::Unavailable(
        "built without the `native` feature".to_string(),
    ))
}
