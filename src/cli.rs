// CLI module for handling command-line interface

use crate::constants::CONFIG_FILE;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "bucket")]
#[command(about = "Plugin manager for Minecraft server installations")]
pub struct Cli {
    /// Contexts to operate on: configured names or server paths, comma separated
    #[arg(short, long, global = true, default_value = ".")]
    pub context: String,

    /// Configuration file
    #[arg(short = 'f', long, global = true, default_value = CONFIG_FILE)]
    pub config: PathBuf,

    /// Do everything one step at a time
    #[arg(short = 'j', long, global = true)]
    pub serial: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Match installed plugins against the configured repositories
    Resolve,
    /// Show cached matches
    List,
    /// Discard the plugin cache
    Clean {
        /// Also delete the plugins folder
        #[arg(long)]
        all: bool,
    },
    /// Show configured and active contexts
    Contexts,
}
