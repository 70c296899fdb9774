use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Parser)]
#[command(
    name = "bookshelf",
    about = "Bookshelf: per-owner book catalog service",
    version,
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// TOML configuration file
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Command {
    /// Start the HTTP server
    Serve(ServeArgs),
    /// Print the effective configuration as TOML
    Config(ConfigArgs),
}

#[derive(Args, Default)]
pub struct ServeArgs {
    /// Address to listen on
    #[arg(long)]
    pub bind: Option<String>,
    /// Directory for persistent snapshots (in-memory when omitted)
    #[arg(long)]
    pub data_dir: Option<PathBuf>,
    /// Capacity of each actor mailbox
    #[arg(long)]
    pub mailbox_capacity: Option<usize>,
}

#[derive(Args)]
pub struct ConfigArgs {
    #[command(flatten)]
    pub overrides: ServeArgs,
}
