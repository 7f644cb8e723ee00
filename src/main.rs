use anyhow::Context;
use clap::Parser;
use codeframe::{cli::CliArgs, commands, config::load_config, registry::VideoRegistry};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    pretty_env_logger::init();

    let args = CliArgs::parse();
    let config = load_config(&args)?;

    let mut registry = VideoRegistry::new(config.accepted_mime.clone());
    if config.videos_dir.is_dir() {
        registry
            .scan(&config.videos_dir)
            .with_context(|| format!("scanning {}", config.videos_dir.display()))?;
    } else {
        log::warn!("Videos directory {} does not exist", config.videos_dir.display());
    }

    commands::run(&args.command, &config, &registry).await
}
