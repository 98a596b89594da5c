//! Single-frame video round-trips.
//!
//! | Backend | Encode | Container | Decode |
//! |---|---|---|---|
//! | **native** | `rav1e` (AV1) | in-memory IVF | `rav1d` |
//! | **ffmpeg** | `ffmpeg -c:v libx265` | MP4 in a temp dir | `ffmpeg` → PNG |
//!
//! The module is split into:
//! - **Parameters**: [`Crf`] and its mapping onto codec controls
//! - **Backend**: [`RoundTripBackend`] trait + [`NativeBackend`] / [`FfmpegBackend`]
//! - **Selection**: [`select_backend`], resolved once at startup
//! - **Color**: full-range RGB ⇄ YCbCr 4:2:0 for the in-process path

pub mod backend;
pub mod ffmpeg;
#[cfg(feature = "native")]
pub mod native;
mod params;
mod select;
pub mod yuv;

pub use backend::{BackendError, RoundTrip, RoundTripBackend};
pub use ffmpeg::FfmpegBackend;
#[cfg(feature = "native")]
pub use native::NativeBackend;
pub use params::{CRF_DEFAULT, CRF_MAX, CRF_MIN, Crf};
pub use select::{BackendChoice, native_available, select_backend};
