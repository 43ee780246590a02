mod cli;
mod cmd;
mod config_gen;
mod format;

use clap::Parser;

use chunkvault_core::config::{self, ChunkVaultConfig};

use cli::{Cli, Commands};
use config_gen::run_config_generate;

fn main() {
    let cli = Cli::parse();

    let filter = match cli.verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();

    // `config` runs without a config file
    if let Commands::Config { dest } = &cli.command {
        if let Err(e) = run_config_generate(dest.as_deref()) {
            eprintln!("Error: {e}");
            std::process::exit(1);
        }
        return;
    }

    let config = match load(cli.config.as_deref()) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Error: {e}");
            std::process::exit(1);
        }
    };

    let result = match &cli.command {
        Commands::Put {
            file,
            owner,
            manifest,
        } => cmd::put::run_put(&config, file, owner, manifest.as_deref()),
        Commands::Get { manifest, output } => cmd::get::run_get(&config, manifest, output),
        Commands::Locate { hashes } => cmd::locate::run_locate(&config, hashes),
        Commands::Config { .. } => Ok(()),
    };

    if let Err(e) = result {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}

fn load(cli_config: Option<&str>) -> Result<ChunkVaultConfig, Box<dyn std::error::Error>> {
    let Some(source) = config::resolve_config_path(cli_config) else {
        let mut msg = String::from("no configuration file found. Searched:");
        for (path, level) in config::default_config_search_paths() {
            msg.push_str(&format!("\n  {} ({})", path.display(), level));
        }
        msg.push_str("\nRun `chunkvault config` to generate a starter config file.");
        return Err(msg.into());
    };
    tracing::info!("Using config: {source}");
    Ok(config::load_config(source.path())?)
}
