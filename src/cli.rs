use std::path::PathBuf;

use clap::Parser;

use crate::cmd::Commands;

/// Personal sprint dashboard CLI.
/// Settings and the API token live in ~/.sprintdash or a directory passed via --dir.
#[derive(Parser)]
#[command(name = "spd", version, about = "Sprint points dashboard CLI")]
pub struct Cli {
    /// Directory holding settings.json and the API token.
    #[arg(long, global = true)]
    pub dir: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}
