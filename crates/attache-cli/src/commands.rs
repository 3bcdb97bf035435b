use anyhow::Context;
use attache_server::{AppState, AttacheConfig, AttacheServer, StorageConfig};
use colored::Colorize;

use crate::cli::*;
use crate::document::{self, STORE_NAME};

pub fn run_command(cli: Cli) -> anyhow::Result<()> {
    match cli.command {
        Command::Serve(args) => cmd_serve(args),
        Command::Config(args) => cmd_config(args, cli.format),
    }
}

fn load_config(path: Option<&std::path::Path>) -> anyhow::Result<AttacheConfig> {
    match path {
        Some(path) => AttacheConfig::load(path)
            .with_context(|| format!("loading configuration from {}", path.display())),
        None => Ok(AttacheConfig::default()),
    }
}

/// Assemble the application state: the configured loader behind the demo store.
fn build_state(storage: &StorageConfig, seed: u64) -> anyhow::Result<AppState> {
    let loader = storage.build_loader().context("opening content backend")?;
    let store = document::document_store(loader, storage.store.clone(), seed)
        .context("building the documents store")?;
    Ok(AppState::new(&storage.store).with_store(store)?)
}

fn cmd_serve(args: ServeArgs) -> anyhow::Result<()> {
    let mut config = load_config(args.config.as_deref())?;
    if let Some(bind) = args.bind {
        config.server.bind_addr = bind;
    }
    let state = build_state(&config.storage, args.seed)?;

    println!("{} Attaché server", "✓".green().bold());
    println!("  Listening: {}", format!("http://{}", config.server.bind_addr).bold());
    println!("  Backend: {:?}", config.storage.backend);
    println!(
        "  Store: {} (documents 1..={})",
        format!("/{STORE_NAME}/{{id}}").yellow(),
        args.seed
    );

    let server = AttacheServer::new(config.server, state);
    let runtime = tokio::runtime::Runtime::new().context("starting async runtime")?;
    runtime.block_on(server.serve())?;
    Ok(())
}

fn cmd_config(args: ConfigArgs, format: OutputFormat) -> anyhow::Result<()> {
    let config = load_config(args.config.as_deref())?;
    match format {
        OutputFormat::Text => print!("{}", config.to_toml()?),
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&config)?),
    }
    Ok(())
}
