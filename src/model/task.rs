// src/model/task.rs
//! Tasks, listed from "my tasks" or from one task list.

use super::user::UserIdType;
use crate::api::{ApiRequest, LarkTransport, QueryParams, TransportExt};
use crate::collection::ResourceAdapter;
use crate::error::AppError;
use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskMember {
    #[serde(default)]
    pub id: String,
    #[serde(default, rename = "type")]
    pub member_type: String,
    #[serde(default)]
    pub role: String,
    #[serde(default)]
    pub name: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskTime {
    /// Milliseconds since the epoch, as a string.
    #[serde(default)]
    pub timestamp: String,
    #[serde(default)]
    pub is_all_day: bool,
}

impl TaskTime {
    pub fn to_datetime(&self) -> Option<DateTime<Utc>> {
        let millis = self.timestamp.parse::<i64>().ok()?;
        DateTime::from_timestamp_millis(millis)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    #[serde(default)]
    pub guid: String,
    #[serde(default)]
    pub summary: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub completed_at: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub due: Option<TaskTime>,
    #[serde(default)]
    pub members: Vec<TaskMember>,
}

impl Task {
    pub fn is_completed(&self) -> bool {
        self.status == "done" || !matches!(self.completed_at.as_str(), "" | "0")
    }

    /// Names of the people assigned to the task.
    pub fn assignee_names(&self) -> Vec<&str> {
        self.members
            .iter()
            .filter(|m| m.role.is_empty() || m.role == "assignee")
            .map(|m| m.name.as_str())
            .filter(|name| !name.is_empty())
            .collect()
    }

    /// One-line summary: title, `@assignees` and due time.
    pub fn headline(&self) -> String {
        let assignees = self
            .assignee_names()
            .iter()
            .map(|name| format!("@{}", name))
            .collect::<Vec<_>>()
            .join(" ");
        let due = self
            .due
            .as_ref()
            .and_then(TaskTime::to_datetime)
            .map(|at| at.format("%Y-%m-%d %H:%M").to_string())
            .unwrap_or_default();
        [self.summary.as_str(), assignees.as_str(), due.as_str()]
            .into_iter()
            .filter(|part| !part.is_empty())
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// Which task listing to read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskSource {
    MyTasks,
    TaskList(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskFilter {
    pub source: TaskSource,
    pub completed: Option<bool>,
}

impl Default for TaskFilter {
    fn default() -> Self {
        Self {
            source: TaskSource::MyTasks,
            completed: None,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct TaskAdapter {
    pub id_type: UserIdType,
}

impl Default for TaskAdapter {
    fn default() -> Self {
        Self {
            id_type: UserIdType::UnionId,
        }
    }
}

#[async_trait::async_trait]
impl ResourceAdapter for TaskAdapter {
    type Raw = Task;
    type Item = Task;
    type Filter = TaskFilter;
    type Draft = IndexMap<String, Value>;

    fn base_path(&self) -> String {
        "task/v2/tasks".into()
    }

    fn list_path(&self, filter: &TaskFilter) -> String {
        match &filter.source {
            TaskSource::MyTasks => self.base_path(),
            TaskSource::TaskList(list) => format!("task/v2/tasklists/{}/tasks", list),
        }
    }

    fn list_params(&self, filter: &TaskFilter) -> Result<QueryParams, AppError> {
        let mut params = QueryParams::new();
        if filter.source == TaskSource::MyTasks {
            params.set("type", "my_tasks");
        }
        params.set("user_id_type", self.id_type);
        params.set_opt("completed", filter.completed);
        Ok(params)
    }

    fn normalize(&self, raw: Task) -> Task {
        raw
    }

    fn item_id(&self, item: &Task) -> Option<String> {
        Some(item.guid.clone()).filter(|id| !id.is_empty())
    }

    async fn fetch_one(&self, transport: &dyn LarkTransport, id: &str) -> Result<Task, AppError> {
        let request = ApiRequest::get(format!("{}/{}", self.base_path(), id))
            .with_param("user_id_type", self.id_type);
        transport.fetch_field(request, "task").await
    }

    async fn save_one(
        &self,
        transport: &dyn LarkTransport,
        fields: &IndexMap<String, Value>,
        id: Option<&str>,
    ) -> Result<Task, AppError> {
        let request = match id {
            Some(id) => ApiRequest::patch(format!("{}/{}", self.base_path(), id)).with_body(&json!({
                "task": fields,
                "update_fields": fields.keys().collect::<Vec<_>>()
            }))?,
            None => ApiRequest::post(self.base_path()).with_body(fields)?,
        }
        .with_param("user_id_type", self.id_type);
        transport.fetch_field(request, "task").await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn task(status: &str, completed_at: &str) -> Task {
        Task {
            summary: "Ship release".into(),
            status: status.into(),
            completed_at: completed_at.into(),
            due: Some(TaskTime {
                timestamp: "1700000000000".into(),
                is_all_day: false,
            }),
            members: vec![
                TaskMember {
                    name: "Ada".into(),
                    role: "assignee".into(),
                    ..Default::default()
                },
                TaskMember {
                    name: "Bob".into(),
                    role: "follower".into(),
                    ..Default::default()
                },
            ],
            ..Default::default()
        }
    }

    #[test]
    fn headline_joins_summary_assignees_and_due() {
        assert_eq!(task("todo", "0").headline(), "Ship release @Ada 2023-11-14 22:13");
    }

    #[test]
    fn completion_follows_status_or_timestamp() {
        assert!(task("done", "").is_completed());
        assert!(task("todo", "1700000000000").is_completed());
        assert!(!task("todo", "0").is_completed());
    }

    #[test]
    fn tasklist_source_changes_path_and_params() {
        let adapter = TaskAdapter::default();
        let filter = TaskFilter {
            source: TaskSource::TaskList("tl1".into()),
            completed: Some(false),
        };
        assert_eq!(adapter.list_path(&filter), "task/v2/tasklists/tl1/tasks");
        let params = adapter.list_params(&filter).unwrap();
        assert_eq!(params.get("type"), None);
        assert_eq!(params.get("completed"), Some("false"));
        assert_eq!(params.get("user_id_type"), Some("union_id"));
        assert_eq!(adapter.list_params(&TaskFilter::default()).unwrap().get("type"), Some("my_tasks"));
    }
}
