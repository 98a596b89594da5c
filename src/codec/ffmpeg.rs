//! External-process round-trip through the `ffmpeg` CLI.
//!
//! Each call gets its own temporary directory:
//!
//! ```text
//! crf-roundtrip-XXXXXX/
//! ├── input.png      # frame handed to the encoder
//! ├── output.mp4     # single-frame stream, yuv420p
//! ├── decoded.png    # first frame decoded back
//! ├── encode.log     # ffmpeg stderr, encode step
//! └── decode.log     # ffmpeg stderr, decode step
//! ```
//!
//! The directory is a [`tempfile::TempDir`], so it is removed on every exit
//! path, including tool failures and timeouts. A non-zero exit, a missing
//! binary, a timeout or an unreadable `decoded.png` is reported as an error;
//! there is no fallback to the source frame on this path.

use super::backend::{BackendError, RoundTrip, RoundTripBackend};
use super::params::Crf;
use image::{ImageFormat, RgbImage};
use std::ffi::OsString;
use std::fs::File;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::time::{Duration, Instant};
use tracing::debug;

pub const DEFAULT_PROGRAM: &str = "ffmpeg";
pub const DEFAULT_CODEC: &str = "libx265";
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(120);

const POLL_INTERVAL: Duration = Duration::from_millis(10);
/// How much of ffmpeg's stderr to keep in an error message.
const STDERR_TAIL: usize = 2000;

/// Backend that shells out to `ffmpeg` for both encode and decode.
#[derive(Debug, Clone)]
pub struct FfmpegBackend {
    program: PathBuf,
    codec: String,
    timeout: Option<Duration>,
    scratch_root: Option<PathBuf>,
}

impl FfmpegBackend {
    pub fn new() -> Self {
        Self {
            program: PathBuf::from(DEFAULT_PROGRAM),
            codec: DEFAULT_CODEC.to_string(),
            timeout: Some(DEFAULT_TIMEOUT),
            scratch_root: None,
        }
    }

    pub fn with_program(mut self, program: impl Into<PathBuf>) -> Self {
        self.program = program.into();
        self
    }

    pub fn with_codec(mut self, codec: impl Into<String>) -> Self {
        self.codec = codec.into();
        self
    }

    /// `None` waits forever.
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    /// Parent for the per-image scratch directories. Defaults to the system
    /// temp directory.
    pub fn with_scratch_root(mut self, root: Option<PathBuf>) -> Self {
        self.scratch_root = root;
        self
    }

    pub fn program(&self) -> &Path {
        &self.program
    }

    /// Whether `<program> -version` runs and exits cleanly.
    pub fn is_available(&self) -> bool {
        Command::new(&self.program)
            .arg("-version")
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .map(|s| s.success())
            .unwrap_or(false)
    }

    /// Run one ffmpeg invocation, stderr captured into `log`.
    fn run(&self, stage: &'static str, args: &[OsString], log: &Path) -> Result<(), BackendError> {
        debug!(stage, program = %self.program.display(), ?args, "running external tool");

        let mut child = Command::new(&self.program)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::from(File::create(log)?))
            .spawn()
            .map_err(|e| match e.kind() {
                std::io::ErrorKind::NotFound => BackendError::ToolNotFound {
                    program: self.program.display().to_string(),
                },
                _ => BackendError::Io(e),
            })?;

        let started = Instant::now();
        let status = loop {
            if let Some(status) = child.try_wait()? {
                break status;
            }
            if let Some(limit) = self.timeout
                && started.elapsed() >= limit
            {
                // Already-exited races are fine; the wait reaps either way.
                let _ = child.kill();
                let _ = child.wait();
                return Err(BackendError::Timeout {
                    stage,
                    after: limit,
                });
            }
            std::thread::sleep(POLL_INTERVAL);
        };

        if !status.success() {
            return Err(BackendError::ToolFailed {
                stage,
                status,
                stderr: stderr_tail(log),
            });
        }
        Ok(())
    }
}

impl Default for FfmpegBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl RoundTripBackend for FfmpegBackend {
    fn name(&self) -> &'static str {
        "ffmpeg"
    }

    fn round_trip(&self, frame: &RgbImage, crf: Crf) -> Result<RoundTrip, BackendError> {
        let mut builder = tempfile::Builder::new();
        builder.prefix("crf-roundtrip-");
        let workdir = match &self.scratch_root {
            Some(root) => builder.tempdir_in(root)?,
            None => builder.tempdir()?,
        };
        let input = workdir.path().join("input.png");
        let encoded = workdir.path().join("output.mp4");
        let decoded = workdir.path().join("decoded.png");

        frame.save_with_format(&input, ImageFormat::Png)?;

        self.run(
            "encode",
            &encode_args(&input, &encoded, &self.codec, crf),
            &workdir.path().join("encode.log"),
        )?;
        self.run(
            "decode",
            &decode_args(&encoded, &decoded),
            &workdir.path().join("decode.log"),
        )?;

        let image = image::open(&decoded).map_err(|e| {
            BackendError::ProcessingFailed(format!("unreadable ffmpeg output: {e}"))
        })?;
        Ok(RoundTrip::Decoded(image.to_rgb8()))
    }
}

/// `-y -i <input> -c:v <codec> -crf <crf> -pix_fmt yuv420p -frames:v 1 <output>`
pub fn encode_args(input: &Path, output: &Path, codec: &str, crf: Crf) -> Vec<OsString> {
    vec![
        "-y".into(),
        "-i".into(),
        input.into(),
        "-c:v".into(),
        codec.into(),
        "-crf".into(),
        crf.to_string().into(),
        "-pix_fmt".into(),
        "yuv420p".into(),
        "-frames:v".into(),
        "1".into(),
        output.into(),
    ]
}

/// `-y -i <encoded> -frames:v 1 <decoded>`
pub fn decode_args(encoded: &Path, decoded: &Path) -> Vec<OsString> {
    vec![
        "-y".into(),
        "-i".into(),
        encoded.into(),
        "-frames:v".into(),
        "1".into(),
        decoded.into(),
    ]
}

fn stderr_tail(log: &Path) -> String {
    let text = std::fs::read_to_string(log).unwrap_or_default();
    let text = text.trim();
    match text.char_indices().rev().nth(STDERR_TAIL) {
        Some((cut, _)) => format!("...{}", &text[cut..]),
        None => text.to_string(),
    }
}
