use std::net::SocketAddr;
use std::path::Path;

use anyhow::Context;
use colored::Colorize;

use bookshelf_server::{BookshelfServer, ServerConfig};

use crate::cli::*;

pub fn run_command(cli: Cli) -> anyhow::Result<()> {
    match cli.command {
        Command::Serve(args) => cmd_serve(resolve_config(cli.config.as_deref(), &args)?),
        Command::Config(args) => cmd_config(resolve_config(cli.config.as_deref(), &args.overrides)?),
    }
}

/// Layer command-line flags over the config file over the defaults.
fn resolve_config(file: Option<&Path>, args: &ServeArgs) -> anyhow::Result<ServerConfig> {
    let mut config = match file {
        Some(path) => ServerConfig::load(path)?,
        None => ServerConfig::default(),
    };
    if let Some(bind) = &args.bind {
        config.bind_addr = bind
            .parse::<SocketAddr>()
            .with_context(|| format!("invalid bind address {bind:?}"))?;
    }
    if let Some(dir) = &args.data_dir {
        config.data_dir = Some(dir.clone());
    }
    if let Some(capacity) = args.mailbox_capacity {
        anyhow::ensure!(capacity > 0, "mailbox capacity must be positive");
        config.mailbox_capacity = capacity;
    }
    Ok(config)
}

fn cmd_serve(config: ServerConfig) -> anyhow::Result<()> {
    let storage = match &config.data_dir {
        Some(dir) => dir.display().to_string(),
        None => "in-memory".into(),
    };
    println!(
        "{} Bookshelf on {} (storage: {})",
        "✓".green().bold(),
        config.bind_addr.to_string().bold(),
        storage.cyan()
    );

    let runtime = tokio::runtime::Runtime::new().context("failed to start Tokio runtime")?;
    runtime.block_on(BookshelfServer::new(config).serve())?;
    println!("{} Stopped.", "✓".green());
    Ok(())
}

fn cmd_config(config: ServerConfig) -> anyhow::Result<()> {
    print!("{}", config.to_toml_string()?);
    Ok(())
}
