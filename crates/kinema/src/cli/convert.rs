//! The `kinema convert` command: one image in, one video out.

use clap::Args;
use kinema_core::{Config, ConversionService, Kinema};
use std::path::PathBuf;

/// Arguments for the `convert` command.
#[derive(Args, Debug)]
pub struct ConvertArgs {
    /// Image file or http(s) URL to animate
    #[arg(required = true)]
    pub image: String,

    /// Text prompt (leave blank to caption the image and use that)
    #[arg(short, long, default_value = "")]
    pub prompt: String,

    /// Image-to-video backend: replicate, stability or piapi
    /// (defaults to server.default_model)
    #[arg(short, long)]
    pub model: Option<String>,

    /// Output video path (defaults to a timestamped file in the output directory)
    #[arg(short, long)]
    pub output: Option<PathBuf>,
}

/// Execute the convert command.
pub async fn execute(args: ConvertArgs, config: Config) -> anyhow::Result<()> {
    let output = args
        .output
        .unwrap_or_else(|| super::timestamped_path(&config.output_dir(), "video", "mp4"));
    let model = args
        .model
        .unwrap_or_else(|| config.server.default_model.clone());

    let kinema = Kinema::new(config);
    let report = kinema
        .converter()
        .convert(&args.image, &args.prompt, &output, Some(&model))
        .await?;

    if args.prompt.trim().is_empty() && !report.prompt.is_empty() {
        eprintln!("Prompt (auto-caption): {}", report.prompt);
    }
    println!("{}", report.output_path.display());
    Ok(())
}
