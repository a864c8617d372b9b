//! Kinema CLI - image-to-video and media generation over third-party APIs.
//!
//! Kinema submits generation jobs to Replicate, Stability AI or PiAPI, polls
//! them to completion and writes the finished artifact to disk.
//!
//! # Usage
//!
//! ```bash
//! # Animate an image (blank prompt: the image is captioned first)
//! kinema convert still.png --model stability
//!
//! # Re-download an earlier Stability generation
//! kinema fetch -g 3f1c... -o video.mp4
//!
//! # Run the browser form
//! kinema serve --bind 0.0.0.0:7860
//! ```

use clap::{Parser, Subcommand};
use kinema_core::Config;
use std::path::{Path, PathBuf};

mod cli;
mod logging;
mod server;

/// Kinema - image-to-video and media generation over third-party APIs.
#[derive(Parser, Debug)]
#[command(name = "kinema")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Enable verbose (debug) logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Output logs in JSON format
    #[arg(long, global = true)]
    json_logs: bool,

    /// Config file (defaults to the platform config directory)
    #[arg(long, global = true, env = "KINEMA_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

/// Available commands.
#[derive(Subcommand, Debug)]
enum Commands {
    /// Turn an image into a short video
    Convert(cli::convert::ConvertArgs),

    /// Describe an image in one line
    Caption(cli::tasks::CaptionArgs),

    /// Generate an image from a prompt
    Imagine(cli::tasks::ImagineArgs),

    /// Transcribe an audio clip to JSON
    Transcribe(cli::tasks::TranscribeArgs),

    /// Download the result of a previously submitted job
    Fetch(cli::fetch::FetchArgs),

    /// Serve the browser form
    Serve(cli::serve::ServeArgs),

    /// View and manage configuration
    Config(cli::config::ConfigArgs),
}

fn load_config(path: Option<&Path>) -> Result<Config, kinema_core::ConfigError> {
    match path {
        Some(path) => Config::load_from(path),
        None => Config::load(),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Vendor keys are usually kept in a .env file; a missing one is fine.
    let dotenv = dotenvy::dotenv();

    // Logging isn't initialized yet, so use eprintln for config warnings.
    let config = match load_config(cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!(
                "Warning: Failed to load config: {e}\n  \
                 Using default configuration. Check your config file with `kinema config path`."
            );
            Config::default()
        }
    };
    logging::init_from_config(&config, cli.verbose, cli.json_logs);

    tracing::debug!("Kinema v{}", kinema_core::VERSION);
    if let Ok(path) = dotenv {
        tracing::debug!("Loaded environment from {}", path.display());
    }

    match cli.command {
        Commands::Convert(args) => cli::convert::execute(args, config).await,
        Commands::Caption(args) => cli::tasks::caption(args, config).await,
        Commands::Imagine(args) => cli::tasks::imagine(args, config).await,
        Commands::Transcribe(args) => cli::tasks::transcribe(args, config).await,
        Commands::Fetch(args) => cli::fetch::execute(args, config).await,
        Commands::Serve(args) => cli::serve::execute(args, config).await,
        Commands::Config(args) => cli::config::execute(args, cli.config).await,
    }
}
