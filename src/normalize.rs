//! Task normalization.
//!
//! Converts a raw provider record into the canonical task shape the
//! aggregation pipeline works on: a resolved point value (custom field with
//! fallback to the native field), a project label, a completion flag and
//! timestamp, and both renderings of the task deep link. Malformed numeric
//! fields degrade to 0; nothing in here ever fails.

use crate::api::{RawTask, TaskStatus};
use crate::settings::PointsMetric;

/// Custom-field id holding "total points". Deployment-specific constant.
pub const TOTAL_POINTS_FIELD_ID: &str = "c080dbb1-90fc-4095-ac30-2d05d20b821a";

/// Decides whether a status object signals completion.
///
/// The provider's `type == "closed"` is the authoritative signal, but some
/// upstream configurations set only the status text, so a small literal
/// vocabulary is matched as well (case-sensitive, including the locale term
/// "livré"). The vocabulary is configurable so new locale strings can be
/// added without touching aggregation.
#[derive(Debug, Clone)]
pub struct ClosedMatcher {
    literals: Vec<String>,
}

impl Default for ClosedMatcher {
    fn default() -> Self {
        ClosedMatcher {
            literals: vec!["closed".into(), "complete".into(), "livré".into()],
        }
    }
}

impl ClosedMatcher {
    pub fn with_literals(literals: Vec<String>) -> Self {
        ClosedMatcher { literals }
    }

    pub fn is_closed(&self, status: &TaskStatus) -> bool {
        status.status_type == "closed" || self.literals.iter().any(|l| *l == status.status)
    }
}

/// A task in canonical form. Immutable once created.
#[derive(Debug, Clone)]
pub struct NormalizedTask {
    pub id: String,
    pub name: String,
    pub custom_id: Option<String>,
    /// Folder name unless the folder is hidden, else the owning list's name.
    pub project: String,
    /// Active point value, selected from the two metrics by configuration.
    pub points: f64,
    /// Provider-native point value.
    pub sprint_points: f64,
    /// Custom-field point value, falling back to the native one.
    pub total_points: f64,
    pub status: String,
    pub status_color: String,
    pub is_closed: bool,
    /// Completion timestamp, epoch milliseconds. None when not completed or
    /// the completion date is unknown.
    pub date_done: Option<i64>,
    pub url: String,
    pub app_url: String,
    /// Owning list id, for sprint membership checks.
    pub list_id: String,
    /// Secondary location ids, for sprint membership checks.
    pub location_ids: Vec<String>,
}

/// Parse a custom-field value as points. Numbers pass through, numeric
/// strings are parsed, anything else is 0. Never NaN, never negative.
fn parse_points(value: &serde_json::Value) -> f64 {
    let parsed = match value {
        serde_json::Value::Number(n) => n.as_f64().unwrap_or(0.0),
        serde_json::Value::String(s) => s.trim().parse::<f64>().unwrap_or(0.0),
        _ => 0.0,
    };
    if parsed.is_finite() && parsed > 0.0 {
        parsed
    } else {
        0.0
    }
}

fn parse_epoch_ms(value: Option<&String>) -> Option<i64> {
    value.and_then(|s| s.trim().parse::<i64>().ok())
}

/// Convert a raw task into canonical form.
pub fn normalize(task: &RawTask, metric: PointsMetric, matcher: &ClosedMatcher) -> NormalizedTask {
    let sprint_points = task.points.filter(|p| p.is_finite() && *p > 0.0).unwrap_or(0.0);

    let mut total_points = task
        .custom_fields
        .as_deref()
        .unwrap_or(&[])
        .iter()
        .find(|f| f.id == TOTAL_POINTS_FIELD_ID)
        .filter(|f| !f.value.is_null())
        .map(|f| parse_points(&f.value))
        .unwrap_or(0.0);
    // Fallback, not additive: the native field stands in when the custom
    // field is absent or zero.
    if total_points == 0.0 && sprint_points > 0.0 {
        total_points = sprint_points;
    }

    let points = match metric {
        PointsMetric::Sprint => sprint_points,
        PointsMetric::Total => total_points,
    };

    let project = match &task.folder {
        Some(folder) if !folder.hidden => folder.name.clone(),
        _ => task.list.name.clone(),
    };

    // Prefer date_closed; some records only carry date_done.
    let date_done =
        parse_epoch_ms(task.date_closed.as_ref()).or_else(|| parse_epoch_ms(task.date_done.as_ref()));

    let url = task
        .url
        .clone()
        .unwrap_or_else(|| format!("https://app.clickup.com/t/{}", task.id));
    let app_url = format!("clickup://t/{}", task.id);

    NormalizedTask {
        id: task.id.clone(),
        name: task.name.clone(),
        custom_id: task.custom_id.clone(),
        project,
        points,
        sprint_points,
        total_points,
        status: task.status.status.clone(),
        status_color: task.status.color.clone(),
        is_closed: matcher.is_closed(&task.status),
        date_done,
        url,
        app_url,
        list_id: task.list.id.clone(),
        location_ids: task
            .locations
            .as_deref()
            .unwrap_or(&[])
            .iter()
            .map(|l| l.id.clone())
            .collect(),
    }
}
