//! # spd - Sprint Points Dashboard
//!
//! A command-line dashboard for personal sprint tracking against a ClickUp
//! workspace: point totals for the current sprint, a weekly journal, an
//! annual scorecard and a pace check against a configurable weekly target.
//!
//! ## Key Features
//!
//! - **Sprint Overview**: progress, remaining tasks and deadline margins for
//!   the newest sprint list
//! - **Weekly Journal**: daily point breakdown with per-day completions,
//!   navigable to any past week
//! - **Annual Scorecard**: per-week history with inferred vacation weeks and
//!   yearly totals
//! - **Pace Check**: are you on track for the week, and how much is left for
//!   today
//! - **Offline Batches**: every view can replay a saved JSON batch instead of
//!   hitting the network
//!
//! ## Quick Start
//!
//! ```bash
//! # Store the API token and point at the workspace
//! spd login --token pk_xxx
//! spd settings --team-id 1234567 --folder-id 89012345
//!
//! # The three views
//! spd dashboard
//! spd week --back 1
//! spd year
//!
//! # Quick pace check
//! spd status
//! ```
//!
//! Configuration is stored locally in `~/.sprintdash/`: `settings.json` for
//! preferences and a separate `token` file for the API credential.

use std::path::PathBuf;

use clap::Parser;

pub mod aggregate;
pub mod api;
pub mod calendar;
pub mod cli;
pub mod cmd;
pub mod normalize;
pub mod settings;
pub mod status;

use cli::Cli;
use cmd::*;
use settings::Settings;

fn main() {
    env_logger::init();
    let cli = Cli::parse();

    // Determine the sprintdash directory
    let dir = if let Some(dir) = cli.dir.clone() {
        dir
    } else {
        let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
        PathBuf::from(home).join(".sprintdash")
    };
    if let Err(e) = std::fs::create_dir_all(&dir) {
        eprintln!("Failed to create directory {}: {}", dir.display(), e);
        std::process::exit(1);
    }

    let config = Settings::load(&dir);

    match cli.command {
        Commands::Dashboard { from_file } => {
            cmd_dashboard(&dir, &config, from_file.as_deref())
        }

        Commands::Week { date, back, from_file } => {
            cmd_week(&dir, &config, date, back, from_file.as_deref())
        }

        Commands::Year { from_file } => cmd_year(&dir, &config, from_file.as_deref()),

        Commands::Status { day, hour, points, from_file } => {
            cmd_status(&dir, &config, day, hour, points, from_file.as_deref())
        }

        Commands::Login { token } => cmd_login(&dir, token),

        Commands::Logout => cmd_logout(&dir),

        Commands::Settings {
            weekly_target, vacation_weeks, open_links_in, points_metric,
            group_by_project, team_id, folder_id,
        } => cmd_settings(&dir, config, weekly_target, vacation_weeks, open_links_in,
                          points_metric, group_by_project, team_id, folder_id),

        Commands::Completions { shell } => cmd_completions(shell),
    }
}
