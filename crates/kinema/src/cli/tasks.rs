//! Single-shot Replicate tasks: `caption`, `imagine` and `transcribe`.

use anyhow::Context;
use clap::Args;
use kinema_core::{Config, Kinema, MediaInput};
use std::path::PathBuf;

/// Arguments for the `caption` command.
#[derive(Args, Debug)]
pub struct CaptionArgs {
    /// Image file or http(s) URL to describe
    #[arg(required = true)]
    pub image: String,
}

/// Arguments for the `imagine` command.
#[derive(Args, Debug)]
pub struct ImagineArgs {
    /// What to draw
    #[arg(required = true)]
    pub prompt: String,

    /// Output PNG path (defaults to a timestamped file in the output directory)
    #[arg(short, long)]
    pub output: Option<PathBuf>,
}

/// Arguments for the `transcribe` command.
#[derive(Args, Debug)]
pub struct TranscribeArgs {
    /// Audio file or http(s) URL
    #[arg(required = true)]
    pub audio: String,

    /// Output JSON path (defaults to a timestamped file in the output directory)
    #[arg(short, long)]
    pub output: Option<PathBuf>,
}

async fn load_media(source: &str) -> anyhow::Result<MediaInput> {
    MediaInput::load(source)
        .await
        .with_context(|| format!("Failed to read {source}"))
}

pub async fn caption(args: CaptionArgs, config: Config) -> anyhow::Result<()> {
    let image = load_media(&args.image).await?;
    let caption = Kinema::new(config).tasks().caption(&image).await?;
    println!("{caption}");
    Ok(())
}

pub async fn imagine(args: ImagineArgs, config: Config) -> anyhow::Result<()> {
    let output = args
        .output
        .unwrap_or_else(|| super::timestamped_path(&config.output_dir(), "image", "png"));
    let asset = Kinema::new(config)
        .tasks()
        .text_to_image(&args.prompt, &output)
        .await?;
    println!("{}", asset.path.display());
    Ok(())
}

pub async fn transcribe(args: TranscribeArgs, config: Config) -> anyhow::Result<()> {
    let audio = load_media(&args.audio).await?;
    let output = args
        .output
        .unwrap_or_else(|| super::timestamped_path(&config.output_dir(), "transcript", "json"));
    let asset = Kinema::new(config)
        .tasks()
        .speech_to_text(audio, &output)
        .await?;
    println!("{}", asset.path.display());
    Ok(())
}
