//! CLI output formatting.
//!
//! Each command has a `format_*` function returning `Vec<String>` and a
//! `print_*` wrapper that writes to stdout. Format functions are pure, which
//! keeps them testable without capturing stdout.
//!
//! ## Compress
//!
//! ```text
//! Round-trip (native, crf 28)
//! 001 dawn.jpg → 001-dawn.png
//! 002 dusk.png → 002-dusk.png
//!     unchanged: decoder produced no frame
//!
//! Round-tripped 2 images (1 unchanged)
//! ```
//!
//! ## Check
//!
//! ```text
//! Backend
//!     selected: native
//!     native: compiled in
//!     ffmpeg: available (ffmpeg)
//! ```

use crate::codec::Crf;
use crate::compress::{CompressReport, ImageOutcome};
use std::path::{Path, PathBuf};

/// Format a 1-based positional index as 3-digit zero-padded.
fn format_index(pos: usize) -> String {
    format!("{:0>3}", pos)
}

/// Return indentation string: 4 spaces per depth level.
fn indent(depth: usize) -> String {
    "    ".repeat(depth)
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|f| f.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

fn plural(n: usize) -> &'static str {
    if n == 1 { "" } else { "s" }
}

// ============================================================================
// compress
// ============================================================================

/// Lines for a finished `compress` run.
///
/// `sources` and `written` are index-aligned with `report.outcomes`.
pub fn format_compress_output(
    backend: &str,
    crf: Crf,
    sources: &[PathBuf],
    written: &[PathBuf],
    report: &CompressReport,
) -> Vec<String> {
    let mut lines = vec![format!("Round-trip ({}, crf {})", backend, crf)];

    for (i, ((source, dest), outcome)) in sources
        .iter()
        .zip(written)
        .zip(&report.outcomes)
        .enumerate()
    {
        lines.push(format!(
            "{} {} \u{2192} {}",
            format_index(i + 1),
            file_name(source),
            file_name(dest)
        ));
        if *outcome == ImageOutcome::Unchanged {
            lines.push(format!(
                "{}unchanged: decoder produced no frame",
                indent(1)
            ));
        }
    }

    let total = report.outcomes.len();
    let unchanged = report.unchanged_count();
    lines.push(String::new());
    if unchanged > 0 {
        lines.push(format!(
            "Round-tripped {} image{} ({} unchanged)",
            total,
            plural(total),
            unchanged
        ));
    } else {
        lines.push(format!("Round-tripped {} image{}", total, plural(total)));
    }
    lines
}

pub fn print_compress_output(
    backend: &str,
    crf: Crf,
    sources: &[PathBuf],
    written: &[PathBuf],
    report: &CompressReport,
) {
    for line in format_compress_output(backend, crf, sources, written, report) {
        println!("{}", line);
    }
}

// ============================================================================
// check
// ============================================================================

/// What `check` found out about the available backends.
#[derive(Debug, Clone)]
pub struct BackendStatus {
    /// Name of the backend the current config selects, or the selection error.
    pub selected: Result<&'static str, String>,
    pub native_compiled: bool,
    pub ffmpeg_program: PathBuf,
    pub ffmpeg_available: bool,
}

pub fn format_check_output(status: &BackendStatus) -> Vec<String> {
    let mut lines = vec!["Backend".to_string()];

    match &status.selected {
        Ok(name) => lines.push(format!("{}selected: {}", indent(1), name)),
        Err(e) => lines.push(format!("{}selected: none ({})", indent(1), e)),
    }
    lines.push(format!(
        "{}native: {}",
        indent(1),
        if status.native_compiled {
            "compiled in"
        } else {
            "not compiled in"
        }
    ));
    lines.push(format!(
        "{}ffmpeg: {} ({})",
        indent(1),
        if status.ffmpeg_available {
            "available"
        } else {
            "not found"
        },
        status.ffmpeg_program.display()
    ));
    lines
}

pub fn print_check_output(status: &BackendStatus) {
    for line in format_check_output(status) {
        println!("{}", line);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb32FImage;

    fn report(outcomes: Vec<ImageOutcome>) -> CompressReport {
        CompressReport {
            images: outcomes.iter().map(|_| Rgb32FImage::new(1, 1)).collect(),
            outcomes,
        }
    }

    #[test]
    fn format_index_pads_to_three_digits() {
        assert_eq!(format_index(1), "001");
        assert_eq!(format_index(42), "042");
        assert_eq!(format_index(1000), "1000");
    }

    #[test]
    fn indent_is_four_spaces_per_level() {
        assert_eq!(indent(0), "");
        assert_eq!(indent(2), "        ");
    }

    #[test]
    fn compress_output_lists_every_image() {
        let sources = vec![PathBuf::from("in/dawn.jpg"), PathBuf::from("in/dusk.png")];
        let written = vec![
            PathBuf::from("out/001-dawn.png"),
            PathBuf::from("out/002-dusk.png"),
        ];
        let lines = format_compress_output(
            "native",
            Crf::new(28),
            &sources,
            &written,
            &report(vec![ImageOutcome::RoundTripped, ImageOutcome::RoundTripped]),
        );

        assert_eq!(
            lines,
            vec![
                "Round-trip (native, crf 28)",
                "001 dawn.jpg \u{2192} 001-dawn.png",
                "002 dusk.png \u{2192} 002-dusk.png",
                "",
                "Round-tripped 2 images",
            ]
        );
    }

    #[test]
    fn compress_output_flags_unchanged_images() {
        let sources = vec![PathBuf::from("a.png")];
        let written = vec![PathBuf::from("001-a.png")];
        let lines = format_compress_output(
            "ffmpeg",
            Crf::new(40),
            &sources,
            &written,
            &report(vec![ImageOutcome::Unchanged]),
        );

        assert_eq!(lines[0], "Round-trip (ffmpeg, crf 40)");
        assert_eq!(lines[2], "    unchanged: decoder produced no frame");
        assert_eq!(lines.last().unwrap(), "Round-tripped 1 image (1 unchanged)");
    }

    #[test]
    fn check_output_reports_selection_and_tools() {
        let status = BackendStatus {
            selected: Ok("ffmpeg"),
            native_compiled: false,
            ffmpeg_program: PathBuf::from("/usr/bin/ffmpeg"),
            ffmpeg_available: true,
        };
        assert_eq!(
            format_check_output(&status),
            vec![
                "Backend",
                "    selected: ffmpeg",
                "    native: not compiled in",
                "    ffmpeg: available (/usr/bin/ffmpeg)",
            ]
        );
    }

    #[test]
    fn check_output_shows_selection_error() {
        let status = BackendStatus {
            selected: Err("native backend unavailable".into()),
            native_compiled: false,
            ffmpeg_program: PathBuf::from("ffmpeg"),
            ffmpeg_available: false,
        };
        let lines = format_check_output(&status);
        assert_eq!(lines[1], "    selected: none (native backend unavailable)");
        assert_eq!(lines[3], "    ffmpeg: not found (ffmpeg)");
    }
}
