//! Window host for the letterfall scene.
//!
//! Usage:
//!   letterfall --assets assets --seed 7
//!   letterfall --config letterfall.toml

use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;

use letterfall::SceneConfig;

#[derive(Parser, Debug)]
#[command(about = "Falling letters, a spinning logo and a particle fountain", version)]
struct Args {
    /// TOML configuration file. Flags below override it.
    #[arg(long)]
    config: Option<PathBuf>,
    /// Directory holding the mesh bundle, environment image and particle sprite.
    #[arg(long)]
    assets: Option<PathBuf>,
    /// Seed for spawn heights, reset positions and particles.
    #[arg(long)]
    seed: Option<u64>,
}

fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => SceneConfig::from_file(path)
            .with_context(|| format!("reading config {}", path.display()))?,
        None => SceneConfig::new(),
    };
    if let Some(dir) = &args.assets {
        config = config.assets_dir(dir);
    }
    if let Some(seed) = args.seed {
        config = config.seed(seed);
    }

    log::info!("starting with assets from {}", config.assets.bundle.display());
    letterfall::run(config).context("event loop failed")?;
    Ok(())
}
