pub use clap::Parser;

use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "ghost")]
#[command(about = "Device-bound identities and encrypted peer-to-peer file sync")]
pub struct Args {
    /// Path to the ghost directory (defaults to ~/.ghost)
    #[arg(long, global = true)]
    pub config_path: Option<PathBuf>,

    /// User to act as
    #[arg(long, short, global = true, env = "GHOST_USER")]
    pub user: Option<String>,

    /// Passphrase for --user
    #[arg(long, global = true, env = "GHOST_PASSPHRASE", hide_env_values = true)]
    pub passphrase: Option<String>,

    #[command(subcommand)]
    pub command: crate::Command,
}
