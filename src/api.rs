//! ClickUp API client and fetch orchestration.
//!
//! Thin I/O layer: typed wire structs over the provider's JSON, a blocking
//! reqwest client with bearer auth, and the batch orchestrator that pages
//! through open and closed task sets before handing a merged snapshot to the
//! aggregation pipeline. Pagination is sequential (page N+1 only after page
//! N's `last_page` flag is known), so there is never more than one request in
//! flight. No retries, no backoff: failures propagate to the caller, and a
//! 401 is surfaced as its own variant so the stored token can be cleared.

use std::collections::HashMap;

use chrono::{Datelike, Local, TimeZone};
use log::debug;
use serde::Deserialize;
use thiserror::Error;

const API_BASE: &str = "https://api.clickup.com/api/v2";

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("authentication rejected (401); stored token cleared, run `spd login` again")]
    Unauthorized,
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("unexpected response from {path}: HTTP {status}")]
    Status { path: String, status: u16 },
    #[error("no sprint list found in folder {0}")]
    NoSprint(String),
}

/// Task status object as the provider sends it.
#[derive(Debug, Clone, Deserialize)]
pub struct TaskStatus {
    #[serde(default)]
    pub status: String,
    #[serde(rename = "type", default)]
    pub status_type: String,
    #[serde(default)]
    pub color: String,
}

/// Owning list reference on a task.
#[derive(Debug, Clone, Deserialize)]
pub struct ListRef {
    pub id: String,
    #[serde(default)]
    pub name: String,
}

/// Owning folder reference; hidden folders are synthetic containers whose
/// name is not meaningful as a project label.
#[derive(Debug, Clone, Deserialize)]
pub struct FolderRef {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub hidden: bool,
}

/// Secondary location membership (tasks shown in more than one list).
#[derive(Debug, Clone, Deserialize)]
pub struct LocationRef {
    pub id: String,
}

/// A custom field entry. `value` is whatever JSON the field holds; point
/// fields carry numbers or numeric strings.
#[derive(Debug, Clone, Deserialize)]
pub struct CustomField {
    pub id: String,
    #[serde(default)]
    pub value: serde_json::Value,
}

/// A task record as fetched, before normalization.
#[derive(Debug, Clone, Deserialize)]
pub struct RawTask {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub custom_id: Option<String>,
    pub status: TaskStatus,
    pub list: ListRef,
    #[serde(default)]
    pub folder: Option<FolderRef>,
    #[serde(default)]
    pub points: Option<f64>,
    #[serde(default)]
    pub custom_fields: Option<Vec<CustomField>>,
    /// Epoch milliseconds as a numeric string.
    #[serde(default)]
    pub date_closed: Option<String>,
    /// Epoch milliseconds as a numeric string.
    #[serde(default)]
    pub date_done: Option<String>,
    #[serde(default)]
    pub locations: Option<Vec<LocationRef>>,
    #[serde(default)]
    pub url: Option<String>,
}

/// One page of a task listing.
#[derive(Debug, Deserialize)]
pub struct TasksPage {
    #[serde(default)]
    pub tasks: Vec<RawTask>,
    #[serde(default)]
    pub last_page: bool,
}

/// A sprint list inside the sprint folder.
#[derive(Debug, Clone, Deserialize)]
pub struct SprintList {
    pub id: String,
    #[serde(default)]
    pub name: String,
    /// Epoch milliseconds as a numeric string.
    #[serde(default)]
    pub due_date: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ListsResponse {
    #[serde(default)]
    lists: Vec<SprintList>,
}

/// The authenticated user.
#[derive(Debug, Clone, Deserialize)]
pub struct User {
    pub id: u64,
    #[serde(default)]
    pub username: String,
}

#[derive(Debug, Deserialize)]
struct UserResponse {
    user: User,
}

/// Everything one dashboard load needs, fetched as a single batch.
#[derive(Debug, Deserialize)]
pub struct FetchBatch {
    pub sprint: SprintList,
    pub user: User,
    pub tasks: Vec<RawTask>,
}

pub struct Client {
    http: reqwest::blocking::Client,
    token: String,
}

impl Client {
    pub fn new(token: &str) -> Self {
        Client {
            http: reqwest::blocking::Client::new(),
            token: token.to_string(),
        }
    }

    fn get<T: serde::de::DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<T, ApiError> {
        let url = format!("{API_BASE}/{path}");
        debug!("GET {url} {query:?}");
        let resp = self
            .http
            .get(&url)
            .header("Authorization", &self.token)
            .header("Content-Type", "application/json")
            .query(query)
            .send()?;
        let status = resp.status();
        if status.as_u16() == 401 {
            return Err(ApiError::Unauthorized);
        }
        if !status.is_success() {
            return Err(ApiError::Status {
                path: path.to_string(),
                status: status.as_u16(),
            });
        }
        Ok(resp.json()?)
    }

    /// The newest sprint list in the sprint folder.
    pub fn latest_sprint(&self, folder_id: &str) -> Result<SprintList, ApiError> {
        let resp: ListsResponse = self.get(
            &format!("folder/{folder_id}/list"),
            &[("archived", "false".to_string())],
        )?;
        resp.lists
            .into_iter()
            .next()
            .ok_or_else(|| ApiError::NoSprint(folder_id.to_string()))
    }

    /// The authenticated user behind the token.
    pub fn current_user(&self) -> Result<User, ApiError> {
        let resp: UserResponse = self.get("user", &[])?;
        Ok(resp.user)
    }

    /// One page of tasks assigned to `user_id`.
    fn tasks_page(
        &self,
        team_id: &str,
        user_id: u64,
        page: u32,
        include_closed: bool,
        date_done_gt: Option<i64>,
    ) -> Result<TasksPage, ApiError> {
        let mut query = vec![
            ("assignees[]", user_id.to_string()),
            ("page", page.to_string()),
            ("include_closed", include_closed.to_string()),
            ("subtasks", "true".to_string()),
        ];
        if let Some(after) = date_done_gt {
            query.push(("date_done_gt", after.to_string()));
        }
        self.get(&format!("team/{team_id}/task"), &query)
    }

    /// Page through all tasks matching the filter, sequentially.
    fn all_tasks(
        &self,
        team_id: &str,
        user_id: u64,
        include_closed: bool,
        date_done_gt: Option<i64>,
    ) -> Result<Vec<RawTask>, ApiError> {
        let mut tasks = Vec::new();
        let mut page = 0;
        loop {
            let batch = self.tasks_page(team_id, user_id, page, include_closed, date_done_gt)?;
            debug!(
                "page {page}: {} tasks, last_page={}",
                batch.tasks.len(),
                batch.last_page
            );
            tasks.extend(batch.tasks);
            if batch.last_page {
                break;
            }
            page += 1;
        }
        Ok(tasks)
    }

    /// Fetch the whole dashboard batch: current sprint, current user, and all
    /// of the user's open tasks plus tasks closed since the start of the year,
    /// merged and deduplicated by task id (last seen wins).
    pub fn fetch_batch(&self, team_id: &str, folder_id: &str) -> Result<FetchBatch, ApiError> {
        let sprint = self.latest_sprint(folder_id)?;
        let user = self.current_user()?;

        // Open tasks are few; fetch them all. Closed history only matters for
        // this year's statistics.
        let open = self.all_tasks(team_id, user.id, false, None)?;
        let closed = self.all_tasks(team_id, user.id, true, Some(start_of_year_ms()))?;

        let mut tasks: Vec<RawTask> = Vec::with_capacity(open.len() + closed.len());
        let mut seen: HashMap<String, usize> = HashMap::new();
        for task in open.into_iter().chain(closed) {
            match seen.get(&task.id) {
                Some(&i) => tasks[i] = task,
                None => {
                    seen.insert(task.id.clone(), tasks.len());
                    tasks.push(task);
                }
            }
        }
        debug!("merged batch: {} unique tasks", tasks.len());

        Ok(FetchBatch { sprint, user, tasks })
    }
}

/// Midnight on January 1st of the current year, local time, as epoch ms.
fn start_of_year_ms() -> i64 {
    let year = Local::now().year();
    Local
        .with_ymd_and_hms(year, 1, 1, 0, 0, 0)
        .single()
        .map(|d| d.timestamp_millis())
        .unwrap_or(0)
}
