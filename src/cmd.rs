//! Command implementations for the CLI interface.
//!
//! This module contains the handlers behind each subcommand: the three
//! dashboard views (sprint overview, weekly journal, annual scorecard), the
//! pace check, token and settings management, and shell completions. Each
//! view loads one task batch, normalizes it, and renders the aggregation
//! output as plain tables.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use chrono::{Datelike, Duration, Local, NaiveDate, TimeZone, Timelike, Weekday};
use clap::{CommandFactory, Subcommand};
use clap_complete::{generate, Shell};
use log::info;

use crate::aggregate::{aggregate, week_detail, SprintRef, SprintSummary, WeekDetail, WeeklyBucket};
use crate::api::{ApiError, Client, FetchBatch, SprintList};
use crate::calendar::week_range;
use crate::cli::Cli;
use crate::normalize::{normalize, ClosedMatcher, NormalizedTask};
use crate::settings::{self, LinkTarget, PointsMetric, Settings};
use crate::status::{compute_status_with, StatusOverride, StatusSnapshot};

const DAY_LABELS: [&str; 7] = ["Mon", "Tue", "Wed", "Thu", "Fri", "Sat", "Sun"];

#[derive(Subcommand)]
pub enum Commands {
    /// Sprint overview: pace check, sprint progress and task groups.
    Dashboard {
        /// Load a fetched batch from a JSON file instead of the network.
        #[arg(long)]
        from_file: Option<PathBuf>,
    },

    /// Weekly journal with a daily breakdown.
    Week {
        /// View the week containing this date (YYYY-MM-DD). Defaults to today.
        #[arg(long)]
        date: Option<String>,
        /// Go back N weeks from today.
        #[arg(long, default_value_t = 0)]
        back: i64,
        /// Load a fetched batch from a JSON file instead of the network.
        #[arg(long)]
        from_file: Option<PathBuf>,
    },

    /// Annual scorecard and per-week history.
    Year {
        /// Load a fetched batch from a JSON file instead of the network.
        #[arg(long)]
        from_file: Option<PathBuf>,
    },

    /// Pace check against the weekly target.
    Status {
        /// Simulate the ISO weekday (1 = Monday .. 7 = Sunday).
        #[arg(long)]
        day: Option<u32>,
        /// Simulate the hour of day (0-23).
        #[arg(long)]
        hour: Option<u32>,
        /// Simulate the weekly point total.
        #[arg(long)]
        points: Option<f64>,
        /// Load a fetched batch from a JSON file instead of the network.
        #[arg(long)]
        from_file: Option<PathBuf>,
    },

    /// Store the API bearer token.
    Login {
        /// Personal or OAuth bearer token for the provider API.
        #[arg(long)]
        token: String,
    },

    /// Forget the stored API token.
    Logout,

    /// Show or change settings.
    Settings {
        /// Weekly point target.
        #[arg(long)]
        weekly_target: Option<f64>,
        /// Planned vacation weeks per year.
        #[arg(long)]
        vacation_weeks: Option<u32>,
        /// Which task link to print: app | web.
        #[arg(long, value_enum)]
        open_links_in: Option<LinkTarget>,
        /// Point metric: sprint | total.
        #[arg(long, value_enum)]
        points_metric: Option<PointsMetric>,
        /// Group sprint tasks by project instead of status.
        #[arg(long)]
        group_by_project: Option<bool>,
        /// Provider workspace (team) id.
        #[arg(long)]
        team_id: Option<String>,
        /// Folder holding the sprint lists.
        #[arg(long)]
        folder_id: Option<String>,
    },

    /// Generate shell completion scripts.
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

/// A loaded, normalized dashboard snapshot.
struct Snapshot {
    tasks: Vec<NormalizedTask>,
    sprint: Option<SprintRef>,
}

fn sprint_ref(sprint: &SprintList) -> SprintRef {
    SprintRef {
        id: sprint.id.clone(),
        name: sprint.name.clone(),
        due_date: sprint
            .due_date
            .as_deref()
            .and_then(|s| s.trim().parse::<i64>().ok()),
    }
}

/// Fetch (or read) a batch and normalize it. On a 401 the stored token is
/// cleared before reporting the error, so the next run prompts a re-login.
fn load_snapshot(dir: &Path, settings: &Settings, from_file: Option<&Path>) -> Snapshot {
    let batch: FetchBatch = match from_file {
        Some(path) => {
            let buf = match fs::read_to_string(path) {
                Ok(buf) => buf,
                Err(e) => {
                    eprintln!("Failed to read {}: {}", path.display(), e);
                    std::process::exit(1);
                }
            };
            match serde_json::from_str(&buf) {
                Ok(batch) => batch,
                Err(e) => {
                    eprintln!("Failed to parse {}: {}", path.display(), e);
                    std::process::exit(1);
                }
            }
        }
        None => {
            let Some(token) = settings::load_token(dir) else {
                eprintln!("No API token stored. Run `spd login --token <token>` first.");
                std::process::exit(1);
            };
            let Some(team_id) = settings.team_id.clone() else {
                eprintln!("No team id configured. Run `spd settings --team-id <id>`.");
                std::process::exit(1);
            };
            let Some(folder_id) = settings.folder_id.clone() else {
                eprintln!("No sprint folder configured. Run `spd settings --folder-id <id>`.");
                std::process::exit(1);
            };
            let client = Client::new(&token);
            match client.fetch_batch(&team_id, &folder_id) {
                Ok(batch) => batch,
                Err(e @ ApiError::Unauthorized) => {
                    if let Err(io) = settings::clear_token(dir) {
                        eprintln!("Failed to clear stored token: {}", io);
                    }
                    eprintln!("{}", e);
                    std::process::exit(1);
                }
                Err(e) => {
                    eprintln!("Fetch failed: {}", e);
                    std::process::exit(1);
                }
            }
        }
    };

    info!(
        "loaded batch: sprint '{}', {} tasks",
        batch.sprint.name,
        batch.tasks.len()
    );

    let matcher = ClosedMatcher::default();
    let tasks = batch
        .tasks
        .iter()
        .map(|t| normalize(t, settings.points_metric, &matcher))
        .collect();
    Snapshot {
        tasks,
        sprint: Some(sprint_ref(&batch.sprint)),
    }
}

/// Format a point value without trailing noise ("7", "7.25").
fn fmt_pts(x: f64) -> String {
    if (x - x.round()).abs() < 1e-9 {
        format!("{:.0}", x)
    } else {
        format!("{}", x)
    }
}

/// Round for per-day display (half-point precision).
fn half_round(x: f64) -> f64 {
    (x * 2.0).round() / 2.0
}

/// Truncate a string to a maximum width, adding ellipsis if needed.
fn truncate(s: &str, width: usize) -> String {
    if s.chars().count() <= width {
        s.to_string()
    } else {
        let mut out = String::new();
        for (i, ch) in s.chars().enumerate() {
            if i + 1 >= width {
                out.push('…');
                break;
            }
            out.push(ch);
        }
        out
    }
}

fn current_week_status(
    tasks: &[NormalizedTask],
    settings: &Settings,
    overrides: StatusOverride,
) -> (WeekDetail, StatusSnapshot) {
    let now = Local::now();
    let detail = week_detail(tasks, now.date_naive());
    let snapshot = compute_status_with(
        detail.points,
        &detail.daily_breakdown,
        settings.weekly_target,
        now.weekday(),
        now.hour(),
        overrides,
    );
    (detail, snapshot)
}

fn print_status_card(s: &StatusSnapshot) {
    if s.is_up_to_date {
        println!(
            "On pace: {} pts done this week, {} expected by now.",
            fmt_pts(s.weekly_points),
            fmt_pts(s.expected_points)
        );
    } else {
        println!(
            "Behind: {} pts missing ({} done, {} expected by now).",
            fmt_pts(s.expected_points - s.weekly_points),
            fmt_pts(s.weekly_points),
            fmt_pts(s.expected_points)
        );
    }
    if s.target_today > 0.0 {
        println!(
            "Today: {} pts to go (quota {}{}).",
            fmt_pts(s.points_to_do_today),
            fmt_pts(s.target_today),
            if s.deficit > 0.0 {
                format!(" + catch-up {}", fmt_pts(s.deficit))
            } else {
                String::new()
            }
        );
    } else if s.deficit > 0.0 {
        println!("Off day, but {} pts of catch-up remain.", fmt_pts(s.deficit));
    }
    if s.banked_advance > 0.0 {
        println!("Banked from earlier days: +{} pts.", fmt_pts(s.banked_advance));
    }
    if s.total_advance > 0.0 {
        println!("Ahead of tonight's mark by {} pts.", fmt_pts(s.total_advance));
    }
}

fn print_sprint_progress(sprint: &SprintSummary) {
    let progress = if sprint.total_points > 0.0 {
        (sprint.completed_points / sprint.total_points * 100.0).round() as i64
    } else {
        0
    };
    println!();
    println!("Sprint:        {}", sprint.name);
    println!(
        "Progress:      {}% ({} / {} pts)",
        progress,
        fmt_pts(sprint.completed_points),
        fmt_pts(sprint.total_points)
    );
    println!("Remaining:     {} tasks", sprint.tasks_remaining);
    if sprint.days_left > 0 {
        let buffer = sprint.buffer_days - sprint.days_left;
        if buffer > 0 {
            println!("Deadline:      {}d (+{}d buffer)", sprint.days_left, buffer);
        } else {
            println!("Deadline:      {}d", sprint.days_left);
        }
    } else if sprint.buffer_days > 0 {
        println!("Deadline:      past, {}d of buffer left", sprint.buffer_days);
    }
}

/// Ordering of status groups on the dashboard, most actionable first.
fn status_priority(status: &str) -> u32 {
    let s = status.to_lowercase();
    if s.contains("à faire") || s.contains("to do") {
        1
    } else if s.contains("en cours") || s.contains("in progress") {
        2
    } else if s.contains("en attente") || s.contains("waiting") {
        3
    } else if s.contains("livré")
        || s.contains("delivered")
        || s.contains("done")
        || s.contains("complete")
    {
        4
    } else {
        100
    }
}

fn print_task_groups(tasks: &[NormalizedTask], group_by_project: bool) {
    if tasks.is_empty() {
        println!("\nNo tasks found for this sprint.");
        return;
    }

    let mut groups: BTreeMap<(u32, String), Vec<&NormalizedTask>> = BTreeMap::new();
    for task in tasks {
        let key = if group_by_project {
            (0, task.project.clone())
        } else {
            (status_priority(&task.status), task.status.clone())
        };
        groups.entry(key).or_default().push(task);
    }

    for ((_, label), mut group) in groups {
        group.sort_by(|a, b| {
            b.points
                .partial_cmp(&a.points)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        let group_points: f64 = group.iter().map(|t| t.points).sum();
        println!(
            "\n{} ({}) - {} pts",
            label.to_uppercase(),
            group.len(),
            fmt_pts(group_points)
        );
        for task in group {
            let reference = task.custom_id.clone().unwrap_or_else(|| {
                let mut id = task.id.clone();
                id.truncate(5);
                format!("#{}", id)
            });
            println!(
                "  {:<10} {:>6}  {}",
                truncate(&reference, 10),
                fmt_pts(task.points),
                task.name
            );
        }
    }
}

/// Sprint overview: pace card, sprint progress and the grouped task list.
pub fn cmd_dashboard(dir: &Path, settings: &Settings, from_file: Option<&Path>) {
    let snapshot = load_snapshot(dir, settings, from_file);
    let result = aggregate(
        &snapshot.tasks,
        snapshot.sprint.as_ref(),
        settings,
        Local::now(),
    );
    let (_, status) = current_week_status(&snapshot.tasks, settings, StatusOverride::default());

    print_status_card(&status);
    print_sprint_progress(&result.sprint);
    print_task_groups(&result.sprint.tasks, settings.group_by_project);
}

/// Weekly journal: daily breakdown plus the completed tasks of the viewed
/// week, navigable to any date.
pub fn cmd_week(
    dir: &Path,
    settings: &Settings,
    date: Option<String>,
    back: i64,
    from_file: Option<&Path>,
) {
    let viewed = match date {
        Some(s) => match NaiveDate::parse_from_str(&s, "%Y-%m-%d") {
            Ok(d) => d,
            Err(_) => {
                eprintln!("Invalid date '{}', expected YYYY-MM-DD.", s);
                std::process::exit(1);
            }
        },
        None => Local::now().date_naive() - Duration::weeks(back),
    };

    let snapshot = load_snapshot(dir, settings, from_file);
    // Recomputed for whichever week the user navigated to; authoritative for
    // that week even when it is the current one.
    let detail = week_detail(&snapshot.tasks, viewed);

    let (start, end) = week_range(viewed);
    println!(
        "Week of {} - {}",
        start.format("%-d %b"),
        end.format("%-d %b %Y")
    );
    println!(
        "Completed: {} tasks, {} pts",
        detail.tasks.len(),
        fmt_pts(detail.points)
    );
    if detail.points > 0.0 {
        let best = detail
            .daily_breakdown
            .iter()
            .enumerate()
            .max_by(|a, b| a.1.partial_cmp(b.1).unwrap_or(std::cmp::Ordering::Equal))
            .map(|(i, _)| DAY_LABELS[i])
            .unwrap_or("-");
        println!("Best day:  {}", best);
    }

    // Daily bars at half-point display precision.
    println!();
    let max = detail
        .daily_breakdown
        .iter()
        .cloned()
        .fold(0.0_f64, f64::max);
    for (i, label) in DAY_LABELS.iter().enumerate() {
        let points = half_round(detail.daily_breakdown[i]);
        let width = if max > 0.0 {
            ((detail.daily_breakdown[i] / max) * 30.0).round() as usize
        } else {
            0
        };
        println!("{:<4} {:<30} {}", label, "#".repeat(width), fmt_pts(points));
    }

    if detail.tasks.is_empty() {
        println!("\nNo tasks completed this week.");
        return;
    }

    // Journal: one section per day with completions, newest first.
    for day in 0..7usize {
        let mut day_tasks: Vec<&NormalizedTask> = detail
            .tasks
            .iter()
            .filter(|t| {
                t.date_done
                    .and_then(|ms| Local.timestamp_millis_opt(ms).single())
                    .map(|d| d.weekday().num_days_from_monday() as usize == day)
                    .unwrap_or(false)
            })
            .collect();
        if day_tasks.is_empty() {
            continue;
        }
        day_tasks.sort_by(|a, b| b.date_done.cmp(&a.date_done));

        let date = start.date() + Duration::days(day as i64);
        println!(
            "\n{} - {} pts",
            date.format("%A %-d %B"),
            fmt_pts(half_round(detail.daily_breakdown[day]))
        );
        for task in day_tasks {
            let link = match settings.open_links_in {
                LinkTarget::App => &task.app_url,
                LinkTarget::Web => &task.url,
            };
            println!(
                "  {:<14} {:>6}  {}",
                truncate(&task.project, 14),
                fmt_pts(task.points),
                task.name
            );
            println!("  {:<14} {:>6}  {}", "", "", link);
        }
    }
}

/// Annual scorecard and per-week history table.
pub fn cmd_year(dir: &Path, settings: &Settings, from_file: Option<&Path>) {
    let snapshot = load_snapshot(dir, settings, from_file);
    let result = aggregate(
        &snapshot.tasks,
        snapshot.sprint.as_ref(),
        settings,
        Local::now(),
    );
    let m = &result.metrics;

    println!("Annual target:   {}", fmt_pts(m.annual_target));
    println!("Total done:      {}", fmt_pts(m.total_points_done));
    println!("Work days:       {}", m.total_work_days);
    println!("Avg pts/week:    {}", fmt_pts(m.average_points_per_week));
    println!("Remaining:       {}", fmt_pts(m.annual_remaining));
    println!(
        "Vacation:        {} / {} weeks used ({} left)",
        m.vacation_weeks_used,
        settings.vacation_weeks,
        m.vacation_weeks_remaining.max(0)
    );

    if result.weeks.is_empty() {
        return;
    }

    println!();
    println!(
        "{:<6} {:<8} {:>5} {:>8} {:>7} {:>10}",
        "Week", "Start", "Days", "Target", "Done", "Remaining"
    );
    for week in result.weeks.iter().rev() {
        print_week_row(week);
    }

    let total_target: f64 = result.weeks.iter().map(|w| w.target).sum();
    let total_remaining: f64 = result
        .weeks
        .iter()
        .filter(|w| !w.is_holiday)
        .map(|w| w.remaining)
        .sum();
    println!(
        "{:<6} {:<8} {:>5} {:>8} {:>7} {:>10}",
        "TOTAL",
        "",
        m.total_work_days,
        fmt_pts(total_target),
        fmt_pts(m.total_points_done),
        fmt_pts(total_remaining)
    );
}

fn print_week_row(week: &WeeklyBucket) {
    let (target, remaining) = if week.is_holiday {
        ("vacation".to_string(), "-".to_string())
    } else {
        (fmt_pts(week.target), fmt_pts(week.remaining))
    };
    println!(
        "{:<6} {:<8} {:>5} {:>8} {:>7} {:>10}",
        format!("S{}", week.week),
        week.start_date.format("%-d %b").to_string(),
        week.work_days,
        target,
        fmt_pts(week.points),
        remaining
    );
}

/// Pace check, with debug overrides to simulate a weekday, hour or total.
pub fn cmd_status(
    dir: &Path,
    settings: &Settings,
    day: Option<u32>,
    hour: Option<u32>,
    points: Option<f64>,
    from_file: Option<&Path>,
) {
    let day = match day {
        Some(d) => match weekday_from_iso(d) {
            Some(w) => Some(w),
            None => {
                eprintln!("Invalid day {}, expected 1 (Monday) to 7 (Sunday).", d);
                std::process::exit(1);
            }
        },
        None => None,
    };
    if let Some(h) = hour {
        if h > 23 {
            eprintln!("Invalid hour {}, expected 0 to 23.", h);
            std::process::exit(1);
        }
    }

    let snapshot = load_snapshot(dir, settings, from_file);
    let overrides = StatusOverride { day, hour, points };
    let (detail, status) = current_week_status(&snapshot.tasks, settings, overrides);
    let active_days = detail.daily_breakdown.iter().filter(|p| **p > 0.0).count();

    print_status_card(&status);
    println!();
    println!(
        "Week so far:   {} pts over {} active days",
        fmt_pts(status.weekly_points),
        active_days
    );
    println!(
        "Daily quota:   {} pts (Mon-Thu)",
        fmt_pts(status.points_per_day)
    );
    println!(
        "By yesterday:  {} expected, {} done",
        fmt_pts(status.target_previously),
        fmt_pts(status.points_done_previously)
    );
    println!(
        "By tonight:    {} expected",
        fmt_pts(status.expected_by_end_of_today)
    );
    println!("Done today:    {}", fmt_pts(status.points_done_today));
}

fn weekday_from_iso(day: u32) -> Option<Weekday> {
    match day {
        1 => Some(Weekday::Mon),
        2 => Some(Weekday::Tue),
        3 => Some(Weekday::Wed),
        4 => Some(Weekday::Thu),
        5 => Some(Weekday::Fri),
        6 => Some(Weekday::Sat),
        7 => Some(Weekday::Sun),
        _ => None,
    }
}

/// Store the API bearer token.
pub fn cmd_login(dir: &Path, token: String) {
    if token.trim().is_empty() {
        eprintln!("Token cannot be empty.");
        std::process::exit(1);
    }
    if let Err(e) = settings::save_token(dir, &token) {
        eprintln!("Failed to store token: {}", e);
        std::process::exit(1);
    }
    println!("Token stored.");
}

/// Forget the stored API token.
pub fn cmd_logout(dir: &Path) {
    if let Err(e) = settings::clear_token(dir) {
        eprintln!("Failed to clear token: {}", e);
        std::process::exit(1);
    }
    println!("Token cleared.");
}

/// Show current settings, applying and persisting any changes first.
#[allow(clippy::too_many_arguments)]
pub fn cmd_settings(
    dir: &Path,
    mut current: Settings,
    weekly_target: Option<f64>,
    vacation_weeks: Option<u32>,
    open_links_in: Option<LinkTarget>,
    points_metric: Option<PointsMetric>,
    group_by_project: Option<bool>,
    team_id: Option<String>,
    folder_id: Option<String>,
) {
    let mut changed = false;
    if let Some(target) = weekly_target {
        if target <= 0.0 {
            eprintln!("Weekly target must be positive.");
            std::process::exit(1);
        }
        current.weekly_target = target;
        changed = true;
    }
    if let Some(weeks) = vacation_weeks {
        if weeks > 52 {
            eprintln!("Vacation weeks must be at most 52.");
            std::process::exit(1);
        }
        current.vacation_weeks = weeks;
        changed = true;
    }
    if let Some(target) = open_links_in {
        current.open_links_in = target;
        changed = true;
    }
    if let Some(metric) = points_metric {
        current.points_metric = metric;
        changed = true;
    }
    if let Some(group) = group_by_project {
        current.group_by_project = group;
        changed = true;
    }
    if let Some(id) = team_id {
        current.team_id = Some(id);
        changed = true;
    }
    if let Some(id) = folder_id {
        current.folder_id = Some(id);
        changed = true;
    }

    if changed {
        if let Err(e) = current.save(dir) {
            eprintln!("Failed to save settings: {}", e);
            std::process::exit(1);
        }
        println!("Settings saved.\n");
    }

    println!("Weekly target:     {}", fmt_pts(current.weekly_target));
    println!("Vacation weeks:    {}", current.vacation_weeks);
    println!(
        "Open links in:     {}",
        match current.open_links_in {
            LinkTarget::App => "app",
            LinkTarget::Web => "web",
        }
    );
    println!(
        "Points metric:     {}",
        match current.points_metric {
            PointsMetric::Sprint => "sprint",
            PointsMetric::Total => "total",
        }
    );
    println!("Group by project:  {}", current.group_by_project);
    println!(
        "Team id:           {}",
        current.team_id.as_deref().unwrap_or("-")
    );
    println!(
        "Folder id:         {}",
        current.folder_id.as_deref().unwrap_or("-")
    );
}

/// Generate shell completion scripts for the given shell.
pub fn cmd_completions(shell: Shell) {
    let mut app = Cli::command();
    let app_name = app.get_name().to_string();
    generate(shell, &mut app, app_name, &mut std::io::stdout());
}
