//! Splice CLI: one-shot video edits from the command line.
//!
//! Usage:
//!   splice trim <PATH> --start-ms <MS> --end-ms <MS>
//!   splice merge <PATH>...
//!   splice crop <PATH> --aspect 16:9
//!   splice metadata <PATH>
//!   splice invoke '<JSON>'
//!   splice check

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use splice_common::config::AppConfig;
use splice_export::Editor;
use splice_media_model::operation::Invocation;

mod commands;

#[derive(Parser)]
#[command(
    name = "splice",
    about = "One-shot video edits: trim, merge, crop, rotate, retime",
    version,
    author
)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit logs as JSON
    #[arg(long, global = true)]
    json_logs: bool,

    /// Directory for output files (overrides the configured scratch dir)
    #[arg(long, global = true)]
    scratch_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Keep only [start, end) of a video
    Trim {
        path: PathBuf,

        /// Start of the kept range (milliseconds)
        #[arg(long)]
        start_ms: i64,

        /// End of the kept range (milliseconds, exclusive)
        #[arg(long)]
        end_ms: i64,
    },

    /// Concatenate videos in order
    Merge {
        #[arg(required = true)]
        paths: Vec<PathBuf>,
    },

    /// Write the audio track to an audio-only file
    ExtractAudio { path: PathBuf },

    /// Write a copy without audio
    RemoveAudio { path: PathBuf },

    /// Change playback speed
    Speed {
        path: PathBuf,

        /// Speed multiplier (2.0 plays twice as fast)
        #[arg(short, long)]
        multiplier: f64,
    },

    /// Crop to the largest centered rectangle of an aspect ratio
    Crop {
        path: PathBuf,

        /// Aspect ratio as W:H
        #[arg(short, long, default_value = "16:9")]
        aspect: String,
    },

    /// Rotate clockwise by a multiple of 90 degrees
    Rotate {
        path: PathBuf,

        /// Degrees (negative values rotate counter-clockwise)
        #[arg(short, long, allow_hyphen_values = true)]
        degrees: i32,
    },

    /// Scale down to a target height, keeping the aspect ratio
    Compress {
        path: PathBuf,

        /// Target height in pixels
        #[arg(long, default_value = "720")]
        height: i64,
    },

    /// Extract a still frame as JPEG
    Thumbnail {
        path: PathBuf,

        /// Frame position (milliseconds)
        #[arg(long, default_value = "0")]
        position_ms: i64,

        /// JPEG quality 0-100 (defaults to the configured quality)
        #[arg(long)]
        quality: Option<i64>,

        /// Output width (requires --height)
        #[arg(long)]
        width: Option<i64>,

        /// Output height (requires --width)
        #[arg(long)]
        height: Option<i64>,
    },

    /// Print video metadata as JSON
    Metadata { path: PathBuf },

    /// Run an operation given as an invocation JSON object
    Invoke {
        /// e.g. '{"operation":"trim","path":"in.mp4","start_ms":0,"end_ms":1000}'
        json: String,
    },

    /// Check that the export tools are installed
    Check,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut config = AppConfig::load();
    if cli.verbose {
        config.logging.level = "debug".to_string();
    }
    if cli.json_logs {
        config.logging.json = true;
    }
    if let Some(dir) = cli.scratch_dir {
        config.scratch_dir = dir;
    }
    splice_common::logging::init_logging(&config.logging);

    let editor = Editor::with_ffmpeg(config);

    let invocation = match cli.command {
        Commands::Trim {
            path,
            start_ms,
            end_ms,
        } => Invocation::Trim {
            path,
            start_ms,
            end_ms,
        },
        Commands::Merge { paths } => Invocation::Merge { paths },
        Commands::ExtractAudio { path } => Invocation::ExtractAudio { path },
        Commands::RemoveAudio { path } => Invocation::RemoveAudio { path },
        Commands::Speed { path, multiplier } => Invocation::AdjustSpeed { path, multiplier },
        Commands::Crop { path, aspect } => Invocation::Crop {
            path,
            aspect_ratio: aspect,
        },
        Commands::Rotate { path, degrees } => Invocation::Rotate { path, degrees },
        Commands::Compress { path, height } => Invocation::Compress {
            path,
            target_height: height,
        },
        Commands::Thumbnail {
            path,
            position_ms,
            quality,
            width,
            height,
        } => Invocation::Thumbnail {
            path,
            position_ms,
            quality,
            width,
            height,
        },
        Commands::Metadata { path } => return commands::metadata::run(&editor, path),
        Commands::Invoke { json } => return commands::invoke::run(&editor, &json).await,
        Commands::Check => return commands::check::run(&editor),
    };

    commands::edit::run(&editor, invocation).await
}
