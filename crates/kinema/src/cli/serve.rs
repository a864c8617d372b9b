//! The `kinema serve` command: run the browser form.

use crate::server::{self, AppState};
use clap::Args;
use kinema_core::{Config, Kinema};

/// Arguments for the `serve` command.
#[derive(Args, Debug)]
pub struct ServeArgs {
    /// Address to listen on (defaults to server.bind)
    #[arg(short, long)]
    pub bind: Option<String>,
}

/// Execute the serve command.
pub async fn execute(args: ServeArgs, config: Config) -> anyhow::Result<()> {
    let bind = args.bind.unwrap_or_else(|| config.server.bind.clone());
    let state = AppState {
        output_dir: config.output_dir(),
        upload_dir: config.upload_dir(),
        default_model: config.server.default_model.clone(),
        keep_alive: config.server.keep_alive(),
        service: Kinema::new(config).converter(),
    };
    server::serve(state, &bind).await
}
