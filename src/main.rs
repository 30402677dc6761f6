// src/main.rs — parley entry point

use clap::Parser;

use parley::cli::{Cli, Commands};
use parley::infra::config::Config;
use parley::infra::logger;

#[tokio::main]
async fn main() {
    // Respects RUST_LOG
    logger::init_logging("warn");

    if let Err(e) = run().await {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}

async fn run() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Load config (falls back to defaults if no config.toml)
    let config = if let Some(ref path) = cli.config {
        Config::load_from(std::path::Path::new(path))?
    } else {
        Config::load()?
    };

    let extractor = parley::cli::build_extractor(&config);

    // Commands that don't talk to the agent
    match &cli.command {
        Some(Commands::Login) => return parley::cli::login::run_login().await,
        Some(Commands::Extract { path }) => {
            return parley::cli::extract::run_extract(&extractor, path).await;
        }
        _ => {}
    }

    let session = parley::cli::open_session(&config, &cli).await?;

    match &cli.command {
        Some(Commands::Ask { file, message }) => {
            parley::cli::ask::run_ask(&session, &extractor, message, file.as_deref()).await
        }
        _ => {
            let order = cli.render_order(&config);
            parley::cli::chat::run_chat(session, &extractor, &config, order).await
        }
    }
}
