//! User configuration and credential storage.
//!
//! Settings live in `settings.json` under the sprintdash directory (default
//! `~/.sprintdash`). They are loaded once at startup, falling back to defaults
//! when the file is missing or unparsable, and written atomically on explicit
//! save. The API bearer token is stored next to them in a plain `token` file
//! so a 401 can wipe it independently of the settings.

use std::fs::{self, File};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

use clap::ValueEnum;
use serde::{Deserialize, Serialize};

/// Which of the two parallel point metrics drives the dashboard.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, ValueEnum, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum PointsMetric {
    /// The provider-native points field.
    Sprint,
    /// The "total points" custom field, falling back to the native field.
    Total,
}

/// Which rendering of a task deep link to print.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, ValueEnum, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum LinkTarget {
    /// Native app scheme (`clickup://`).
    App,
    /// Regular web URL.
    Web,
}

/// User-owned configuration, persisted as JSON.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub weekly_target: f64,
    pub vacation_weeks: u32,
    pub open_links_in: LinkTarget,
    pub points_metric: PointsMetric,
    pub group_by_project: bool,
    /// Workspace (team) id of the provider deployment.
    pub team_id: Option<String>,
    /// Folder holding the sprint lists; the newest list is the current sprint.
    pub folder_id: Option<String>,
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            weekly_target: 28.0,
            vacation_weeks: 4,
            open_links_in: LinkTarget::App,
            points_metric: PointsMetric::Total,
            group_by_project: false,
            team_id: None,
            folder_id: None,
        }
    }
}

impl Settings {
    fn path(dir: &Path) -> PathBuf {
        dir.join("settings.json")
    }

    /// Load settings from the sprintdash directory, defaulting when absent.
    pub fn load(dir: &Path) -> Self {
        let path = Self::path(dir);
        if !path.exists() {
            return Settings::default();
        }
        let mut buf = String::new();
        match File::open(&path).and_then(|mut f| f.read_to_string(&mut buf)) {
            Ok(_) => match serde_json::from_str(&buf) {
                Ok(settings) => settings,
                Err(e) => {
                    eprintln!("Error parsing settings, using defaults: {e}");
                    Settings::default()
                }
            },
            Err(e) => {
                eprintln!("Error reading settings, using defaults: {e}");
                Settings::default()
            }
        }
    }

    /// Save settings using atomic write (temp file + rename).
    pub fn save(&self, dir: &Path) -> std::io::Result<()> {
        let path = Self::path(dir);
        let tmp = path.with_extension("json.tmp");
        let mut f = File::create(&tmp)?;
        let data = serde_json::to_string_pretty(self).unwrap();
        f.write_all(data.as_bytes())?;
        f.flush()?;
        fs::rename(tmp, path)?;
        Ok(())
    }
}

fn token_path(dir: &Path) -> PathBuf {
    dir.join("token")
}

/// Read the stored bearer token, if any.
pub fn load_token(dir: &Path) -> Option<String> {
    let token = fs::read_to_string(token_path(dir)).ok()?;
    let token = token.trim().to_string();
    if token.is_empty() {
        None
    } else {
        Some(token)
    }
}

/// Store the bearer token.
pub fn save_token(dir: &Path, token: &str) -> std::io::Result<()> {
    fs::write(token_path(dir), token.trim())
}

/// Forget the stored bearer token. Called on logout and on a 401.
pub fn clear_token(dir: &Path) -> std::io::Result<()> {
    let path = token_path(dir);
    if path.exists() {
        fs::remove_file(path)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let s = Settings::default();
        assert_eq!(s.weekly_target, 28.0);
        assert_eq!(s.vacation_weeks, 4);
        assert_eq!(s.open_links_in, LinkTarget::App);
        assert_eq!(s.points_metric, PointsMetric::Total);
        assert!(!s.group_by_project);
    }

    #[test]
    fn test_save_and_load_round_trip() {
        let dir = std::env::temp_dir().join(format!("sprintdash_test_{}", std::process::id()));
        fs::create_dir_all(&dir).unwrap();
        let mut s = Settings::default();
        s.weekly_target = 20.0;
        s.vacation_weeks = 6;
        s.points_metric = PointsMetric::Sprint;
        s.team_id = Some("123".into());
        s.save(&dir).unwrap();
        let loaded = Settings::load(&dir);
        assert_eq!(loaded.weekly_target, 20.0);
        assert_eq!(loaded.vacation_weeks, 6);
        assert_eq!(loaded.points_metric, PointsMetric::Sprint);
        assert_eq!(loaded.team_id.as_deref(), Some("123"));
        fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn test_missing_settings_file_defaults() {
        let dir = std::env::temp_dir().join("sprintdash_test_missing");
        let s = Settings::load(&dir);
        assert_eq!(s.weekly_target, 28.0);
    }

    #[test]
    fn test_token_store() {
        let dir = std::env::temp_dir().join(format!("sprintdash_tok_{}", std::process::id()));
        fs::create_dir_all(&dir).unwrap();
        assert!(load_token(&dir).is_none());
        save_token(&dir, "  pk_abc123  \n").unwrap();
        assert_eq!(load_token(&dir).as_deref(), Some("pk_abc123"));
        clear_token(&dir).unwrap();
        assert!(load_token(&dir).is_none());
        fs::remove_dir_all(&dir).unwrap();
    }
}
