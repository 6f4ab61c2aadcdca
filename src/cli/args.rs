//! Command line argument parsing

use crate::core::resolver::ResolverOptions;
use clap::Parser;
use std::path::PathBuf;
use std::time::Duration;

/// Resolve playable stream urls for videos
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Video URLs or IDs
    #[arg(value_name = "VIDEO", required_unless_present = "page_file")]
    pub videos: Vec<String>,

    /// Print resolved videos as JSON
    #[arg(long)]
    pub json: bool,

    /// Only show the best audio-only stream
    #[arg(long, conflicts_with = "itag")]
    pub audio_only: bool,

    /// Only show the best stream with both audio and video
    #[arg(long, conflicts_with_all = ["audio_only", "itag"])]
    pub progressive: bool,

    /// Only show the stream with this format ID
    #[arg(long, value_name = "ITAG")]
    pub itag: Option<u32>,

    /// Resolve a saved watch page instead of fetching
    #[arg(long, value_name = "PATH")]
    pub page_file: Option<PathBuf>,

    /// Player script for --page-file
    #[arg(long, value_name = "PATH", requires = "page_file")]
    pub script_file: Option<PathBuf>,

    /// HTTP timeout (e.g., 30s, 1m)
    #[arg(long, value_name = "DURATION", default_value = "30s")]
    pub timeout: humantime::Duration,

    /// HTTP retries for transient errors
    #[arg(long, default_value = "3")]
    pub retries: u32,

    /// Override User-Agent header
    #[arg(long, value_name = "USER_AGENT")]
    pub user_agent: Option<String>,

    /// Proxy URL for all requests
    #[arg(long, value_name = "URL")]
    pub proxy: Option<String>,

    /// Origin for watch and embed pages
    #[arg(long, value_name = "URL", default_value = crate::utils::url::DEFAULT_BASE_URL)]
    pub base_url: String,

    /// Verbose output
    #[arg(short, long)]
    pub verbose: bool,

    /// Quiet output (only errors)
    #[arg(short, long)]
    pub quiet: bool,
}

impl Args {
    /// Get HTTP timeout as Duration
    pub fn timeout_duration(&self) -> Duration {
        self.timeout.into()
    }

    /// Build resolver options from the arguments
    pub fn resolver_options(&self) -> ResolverOptions {
        let mut options = ResolverOptions::default()
            .with_base_url(self.base_url.clone())
            .with_timeout(self.timeout_duration())
            .with_max_retries(self.retries);
        if let Some(user_agent) = &self.user_agent {
            options = options.with_user_agent(user_agent.clone());
        }
        if let Some(proxy) = &self.proxy {
            options = options.with_proxy(proxy.clone());
        }
        options
    }

    /// Get output verbosity level
    pub fn verbosity_level(&self) -> VerbosityLevel {
        if self.quiet {
            VerbosityLevel::Quiet
        } else if self.verbose {
            VerbosityLevel::Verbose
        } else {
            VerbosityLevel::Normal
        }
    }

    /// Default log filter for the verbosity level
    pub fn log_level(&self) -> &'static str {
        match self.verbosity_level() {
            VerbosityLevel::Quiet => "error",
            VerbosityLevel::Normal => "info",
            VerbosityLevel::Verbose => "debug",
        }
    }
}

/// Output verbosity level
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VerbosityLevel {
    /// Quiet (only errors)
    Quiet,
    /// Normal
    Normal,
    /// Verbose (debug info)
    Verbose,
}
