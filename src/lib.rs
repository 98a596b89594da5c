//! # crf-roundtrip
//!
//! Reproduces the degradation a video model sees on its conditioning frames:
//! every image of a batch is encoded as a one-frame video at a chosen Constant
//! Rate Factor (CRF) and immediately decoded back. Output images have the same
//! count, order and dimensions as the input; only the pixels change.
//!
//! # Pipeline
//!
//! ```text
//! Rgb32FImage batch ─▶ Compressor ─┬─▶ NativeBackend  (rav1e → IVF → rav1d)
//!                                  └─▶ FfmpegBackend  (ffmpeg encode → mp4 → ffmpeg decode)
//!                    ◀─ Rgb32FImage batch (decoded frames, or the input where nothing decoded)
//! ```
//!
//! # Module Map
//!
//! | Module | Role |
//! |--------|------|
//! | [`codec`] | [`RoundTripBackend`](codec::RoundTripBackend) trait, the two backends, CRF handling, backend selection, RGB ⇄ YUV |
//! | [`compress`] | [`Compressor`](compress::Compressor): sequential batch loop, float ⇄ 8-bit conversion |
//! | [`config`] | `crf-roundtrip.toml` loading, merging onto stock defaults, validation |
//! | [`batch`] | CLI helpers: discover input files, load them, write results |
//! | [`node`] | Declarative registration metadata for node-graph hosts |
//! | [`output`] | CLI output formatting |
//!
//! # Design Decisions
//!
//! ## Backend Chosen Once
//!
//! The backend is resolved when the compressor is built and never revisited.
//! The in-process codec is a compile-time capability (the `native` cargo
//! feature). In `auto` mode a build without it logs a warning and uses the
//! ffmpeg CLI; asking for `native` explicitly is an error.
//!
//! ## AV1 for the In-Process Path
//!
//! `rav1e` and `rav1d` are both pure Rust (rav1d being a port of dav1d), so
//! the default build needs no system codec libraries. The CRF is mapped onto
//! rav1e's quantizer so that x265's default CRF lands on rav1e's default
//! quantizer; the ffmpeg path passes it through verbatim to the chosen encoder
//! (`libx265` by default).
//!
//! ## Errors Abort, Empty Decodes Don't
//!
//! A failed encode, a failed tool invocation or a timeout aborts the batch
//! with the index of the offending image. A decoder that runs fine but yields
//! no frame is not an error: the source image is passed through untouched and
//! reported as [`ImageOutcome::Unchanged`](compress::ImageOutcome::Unchanged).

pub mod batch;
pub mod codec;
pub mod compress;
pub mod config;
pub mod node;
pub mod output;
