#![forbid(unsafe_code)]

//! Command-line entry point: exports every video of one YouTube channel to
//! `<output-dir>/<channel-name>.csv`.

use anyhow::{Context, Result};
use channel_export_tools::api::YouTubeClient;
use channel_export_tools::config::{SettingsOverrides, resolve_settings};
use channel_export_tools::export::{ExportOptions, export_channel, output_path};
use channel_export_tools::progress::ProgressWriter;
use clap::Parser;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(
    name = "export_channel",
    about = "Export the metadata of every video on a YouTube channel to CSV"
)]
struct ExportArgs {
    /// Channel id, e.g. UCoC47do520os_4DBMEFGg4A
    channel_id: String,

    /// Display name used for the output file; defaults to the channel id
    #[arg(long)]
    channel_name: Option<String>,

    /// Directory the CSV is written into (EXPORT_OUTPUT_DIR)
    #[arg(long)]
    output_dir: Option<PathBuf>,

    /// YouTube Data API key (YOUTUBE_API_KEY)
    #[arg(long)]
    api_key: Option<String>,

    /// Env file to read settings from
    #[arg(long, default_value = ".env")]
    env_file: PathBuf,

    /// Stop after this many search pages (EXPORT_MAX_PAGES)
    #[arg(long)]
    max_pages: Option<usize>,

    /// Write JSON progress reports to this file
    #[arg(long)]
    progress_file: Option<PathBuf>,
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn main() -> Result<()> {
    init_tracing();

    let args = ExportArgs::parse();
    let settings = resolve_settings(SettingsOverrides {
        api_key: args.api_key.clone(),
        output_dir: args.output_dir.clone(),
        max_pages: args.max_pages,
        env_path: Some(args.env_file.clone()),
    })?;

    let channel_name = args
        .channel_name
        .as_deref()
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .unwrap_or(&args.channel_id);
    let path = output_path(&settings.output_dir, channel_name);
    let progress = args.progress_file.clone().map(ProgressWriter::new);

    println!("===================================");
    println!("YouTube Channel Export");
    println!("===================================");
    println!("Channel: {} ({})", channel_name, args.channel_id);
    println!("Output: {}", path.display());
    if let Some(limit) = settings.max_pages {
        println!("Page limit: {limit}");
    }
    println!();

    if let Some(writer) = &progress {
        writer.write(0, "Listing channel videos");
    }

    let client = YouTubeClient::new(&settings.api_base, &settings.api_key, settings.timeout);
    let summary = export_channel(
        &client,
        &args.channel_id,
        &path,
        ExportOptions {
            max_pages: settings.max_pages,
        },
        |event| {
            if let Some(writer) = &progress {
                writer.record(event);
            }
        },
    )
    .with_context(|| format!("exporting channel {}", args.channel_id))?;

    println!();
    println!("Saved {} videos to {}", summary.rows, summary.path.display());

    Ok(())
}
