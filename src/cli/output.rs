//! Output formatting for resolved videos

use crate::cli::args::VerbosityLevel;
use crate::core::video_info::{ResolvedVideo, StreamDescriptor};
use colored::Colorize;
use std::time::Duration;

/// Message printed for an item that could not be resolved
pub const NO_STREAM_MESSAGE: &str = "no playable stream could be found";

/// Output formatter for sigres
pub struct OutputFormatter {
    verbosity: VerbosityLevel,
}

impl OutputFormatter {
    /// Create a new output formatter
    pub fn new(verbosity: VerbosityLevel) -> Self {
        Self { verbosity }
    }

    /// Print error message
    pub fn error(&self, message: &str) {
        eprintln!("{} {}", "error:".red().bold(), message);
    }

    /// Report an item that failed to resolve
    pub fn print_failure(&self, input: &str, reason: &str) {
        self.error(&format!("{}: {}", input, NO_STREAM_MESSAGE));
        if self.verbosity == VerbosityLevel::Verbose {
            eprintln!("  {}", reason.dimmed());
        }
    }

    /// Print video header and stream table
    pub fn print_video(&self, input: &str, video: &ResolvedVideo, streams: &[&StreamDescriptor]) {
        if self.verbosity == VerbosityLevel::Quiet {
            for stream in streams {
                println!("{}", stream.url);
            }
            return;
        }

        println!("{}", video.title.as_deref().unwrap_or(input).bold());
        if let Some(duration) = video.duration {
            println!("  {}", format_duration(Duration::from_secs(duration)));
        }
        for stream in streams {
            println!("{}", format_stream_line(stream));
            println!("    {}", stream.url.dimmed());
        }
        println!();
    }

    /// Print a video as one JSON document
    pub fn print_json(
        &self,
        video: &ResolvedVideo,
        streams: &[&StreamDescriptor],
    ) -> serde_json::Result<()> {
        let value = serde_json::json!({
            "title": video.title,
            "duration": video.duration,
            "streams": streams,
        });
        println!("{}", serde_json::to_string_pretty(&value)?);
        Ok(())
    }
}

/// Single table row for a stream
pub fn format_stream_line(stream: &StreamDescriptor) -> String {
    let bitrate = stream
        .bitrate
        .map(|b| format!("{} kbps", b / 1000))
        .unwrap_or_else(|| "-".to_string());
    let otf = if stream.is_otf { " otf" } else { "" };
    format!(
        "  itag={:<4} {:<8} {:<5} {:>10}  {}{}",
        stream.itag,
        if stream.quality.is_empty() { "-" } else { stream.quality.as_str() },
        stream.extension(),
        bitrate,
        stream.mime_type,
        otf
    )
}

/// Format duration as human-readable string
fn format_duration(duration: Duration) -> String {
    let total_seconds = duration.as_secs();

    if total_seconds < 60 {
        format!("{}s", total_seconds)
    } else if total_seconds < 3600 {
        let minutes = total_seconds / 60;
        let seconds = total_seconds % 60;
        if seconds == 0 {
            format!("{}m", minutes)
        } else {
            format!("{}m {}s", minutes, seconds)
        }
    } else {
        let hours = total_seconds / 3600;
        let minutes = (total_seconds % 3600) / 60;
        if minutes == 0 {
            format!("{}h", hours)
        } else {
            format!("{}h {}m", hours, minutes)
        }
    }
}
