//! Main entry point for sigres CLI

use anyhow::Context;
use clap::Parser;
use sigres::cli::{Args, OutputFormatter};
use sigres::core::resolver::resolve_files;
use sigres::core::select;
use sigres::{ResolvedVideo, StreamDescriptor, StreamResolver};
use std::process::ExitCode;
use tracing::{debug, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    // Parse command line arguments
    let args = Args::parse();

    // Initialize logging
    init_logging(args.log_level())?;
    debug!("Starting sigres with args: {:?}", args);

    let formatter = OutputFormatter::new(args.verbosity_level());
    let resolver = StreamResolver::with_options(args.resolver_options())
        .context("failed to create HTTP client")?;
    let mut failed = 0usize;

    // Offline resolution of a saved page
    if let Some(page_file) = &args.page_file {
        let input = page_file.display().to_string();
        let result = resolve_files(page_file, args.script_file.as_deref()).await;
        if !report(&args, &formatter, &input, result)? {
            failed += 1;
        }
    }

    for video in &args.videos {
        let result = resolver.resolve(video).await;
        if !report(&args, &formatter, video, result)? {
            failed += 1;
        }
    }

    if failed > 0 {
        info!("{} item(s) failed", failed);
        return Ok(ExitCode::FAILURE);
    }
    Ok(ExitCode::SUCCESS)
}

/// Print one item's result, returning false if it produced no stream
fn report(
    args: &Args,
    formatter: &OutputFormatter,
    input: &str,
    result: sigres::Result<ResolvedVideo>,
) -> anyhow::Result<bool> {
    let video = match result {
        Ok(video) => video,
        Err(e) => {
            if e.is_format_change() {
                debug!("Page or player script format changed: {}", e);
            }
            formatter.print_failure(input, &e.to_string());
            return Ok(false);
        }
    };

    let streams = select_streams(args, &video);
    if streams.is_empty() {
        formatter.print_failure(input, "no stream matched the selection");
        return Ok(false);
    }

    if args.json {
        formatter.print_json(&video, &streams)?;
    } else {
        formatter.print_video(input, &video, &streams);
    }
    Ok(true)
}

/// Apply --audio-only / --progressive / --itag
fn select_streams<'a>(args: &Args, video: &'a ResolvedVideo) -> Vec<&'a StreamDescriptor> {
    if args.audio_only {
        select::best_audio(&video.streams).into_iter().collect()
    } else if args.progressive {
        select::best_progressive(&video.streams).into_iter().collect()
    } else if let Some(itag) = args.itag {
        select::by_itag(&video.streams, itag).into_iter().collect()
    } else {
        video.streams.iter().collect()
    }
}

/// Initialize logging system
fn init_logging(default_level: &str) -> anyhow::Result<()> {
    // RUST_LOG takes precedence over the verbosity flags
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level));

    tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(false)
                .with_file(true)
                .with_line_number(true)
                .compact(),
        )
        .try_init()
        .context("failed to initialize logging")?;

    Ok(())
}
