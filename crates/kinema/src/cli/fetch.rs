//! The `kinema fetch` command: download the result of an earlier job.

use anyhow::Context;
use clap::Args;
use kinema_core::{Config, Kinema, ModelType, TaskKind};
use std::path::PathBuf;

/// Arguments for the `fetch` command.
#[derive(Args, Debug)]
pub struct FetchArgs {
    /// Job (generation) id returned at submission
    #[arg(short = 'g', long, required = true)]
    pub generation_id: String,

    /// Where to write the video
    #[arg(short = 'o', long, required = true)]
    pub video_path: PathBuf,

    /// Vendor that ran the job
    #[arg(long, default_value = "stability")]
    pub vendor: String,
}

/// Execute the fetch command.
pub async fn execute(args: FetchArgs, config: Config) -> anyhow::Result<()> {
    let model: ModelType = args.vendor.parse()?;
    let kinema = Kinema::new(config);
    let client = kinema
        .client(model)
        .with_context(|| format!("No client configured for {model}"))?;

    let (job, asset) = client
        .retrieve(&args.generation_id, TaskKind::ImageToVideo, &args.video_path)
        .await?;

    tracing::info!(job_id = %job.id, "Fetched {} bytes", asset.len());
    println!("{}", asset.path.display());
    Ok(())
}
