use std::path::PathBuf;

use clap::Args;
use tracing::info;

use crate::config::{self, RunnerConfig};
use crate::error::RunnerResult;

#[derive(Args)]
pub struct InitArgs {
    /// Directory to write runner.yaml into
    #[arg(long, default_value = ".")]
    dir: PathBuf,
    /// Replace an existing runner.yaml
    #[arg(long)]
    force: bool,
}

pub async fn run_init(args: InitArgs) -> RunnerResult<()> {
    let path = config::generate(&RunnerConfig::default(), &args.dir, args.force).await?;
    info!(path = %path.display(), "config written");
    println!("{}", path.display());
    Ok(())
}
