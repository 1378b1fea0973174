//! Conversion between the task API's JSON records and the display model.

use std::collections::HashSet;

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::error::{Result, TaskError};
use crate::model::{NewTask, Priority, Subtask, Task, TaskPatch};

const DATE_FORMAT: &str = "%Y-%m-%d";

/// A task record exactly as the remote API sends it.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WireTask {
    #[serde(deserialize_with = "flexible_id")]
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub completed: bool,
    #[serde(default, deserialize_with = "wire_priority")]
    pub priority: Priority,
    #[serde(default)]
    pub due_date: Option<String>,
    #[serde(default)]
    pub tags: Option<Vec<String>>,
    #[serde(default)]
    pub subtasks: Option<Vec<WireSubtask>>,
    #[serde(default, alias = "list")]
    pub project: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WireSubtask {
    #[serde(deserialize_with = "flexible_id")]
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub completed: bool,
}

impl TryFrom<WireTask> for Task {
    type Error = TaskError;

    fn try_from(wire: WireTask) -> Result<Self> {
        if wire.title.trim().is_empty() {
            return Err(TaskError::invalid_data(Some(wire.id), "title is empty"));
        }
        let due_date = match wire.due_date.as_deref() {
            Some(raw) => parse_due_date(raw)
                .map_err(|message| TaskError::invalid_data(Some(wire.id.clone()), message))?,
            None => None,
        };

        Ok(Task {
            id: wire.id,
            title: wire.title,
            description: wire.description,
            completed: wire.completed,
            priority: wire.priority,
            due_date,
            tags: wire.tags.unwrap_or_default(),
            subtasks: wire
                .subtasks
                .unwrap_or_default()
                .into_iter()
                .map(|subtask| Subtask {
                    id: subtask.id,
                    title: subtask.title,
                    completed: subtask.completed,
                })
                .collect(),
            project: wire.project.filter(|project| !project.is_empty()),
        })
    }
}

/// A record the API returned that could not be turned into a [`Task`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RejectedRecord {
    pub index: usize,
    pub error: TaskError,
}

#[derive(Debug, Clone, Default)]
pub struct DecodedTasks {
    pub tasks: Vec<Task>,
    pub rejected: Vec<RejectedRecord>,
}

/// Convert every record independently; a bad record is reported, not fatal.
pub fn decode_tasks(records: Vec<Value>) -> DecodedTasks {
    let mut decoded = DecodedTasks::default();
    let mut seen = HashSet::new();
    for (index, record) in records.into_iter().enumerate() {
        match decode_task(record) {
            Ok(task) if !seen.insert(task.id.clone()) => decoded.rejected.push(RejectedRecord {
                index,
                error: TaskError::invalid_data(Some(task.id), "duplicate id"),
            }),
            Ok(task) => decoded.tasks.push(task),
            Err(error) => decoded.rejected.push(RejectedRecord { index, error }),
        }
    }
    decoded
}

pub fn decode_task(record: Value) -> Result<Task> {
    let id = record_id(&record);
    let wire: WireTask = serde_json::from_value(record)
        .map_err(|err| TaskError::invalid_data(id, err.to_string()))?;
    Task::try_from(wire)
}

fn record_id(record: &Value) -> Option<String> {
    match record.get("id")? {
        Value::String(id) => Some(id.clone()),
        Value::Number(id) => Some(id.to_string()),
        _ => None,
    }
}

/// Parse a wire due date down to its calendar day.
///
/// Empty strings mean "no date". Timestamps keep the calendar date of their own offset.
pub fn parse_due_date(raw: &str) -> std::result::Result<Option<NaiveDate>, String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Ok(None);
    }

    if let Ok(date) = NaiveDate::parse_from_str(trimmed, DATE_FORMAT) {
        return Ok(Some(date));
    }

    if let Ok(timestamp) = DateTime::parse_from_rfc3339(trimmed) {
        return Ok(Some(timestamp.date_naive()));
    }

    for format in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M:%S"] {
        if let Ok(timestamp) = NaiveDateTime::parse_from_str(trimmed, format) {
            return Ok(Some(timestamp.date()));
        }
    }

    Err(format!("unrecognized dueDate '{trimmed}'"))
}

pub fn format_due_date(date: NaiveDate) -> String {
    date.format(DATE_FORMAT).to_string()
}

#[derive(Debug, Clone, Serialize)]
pub struct WireSubtaskBody {
    pub id: String,
    pub title: String,
    pub completed: bool,
}

impl From<&Subtask> for WireSubtaskBody {
    fn from(subtask: &Subtask) -> Self {
        Self {
            id: subtask.id.clone(),
            title: subtask.title.clone(),
            completed: subtask.completed,
        }
    }
}

/// Body of `PUT /tasks/{id}`; only changed fields are serialized.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WireTaskPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub priority: Option<u8>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tags: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub due_date: Option<Option<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subtasks: Option<Vec<WireSubtaskBody>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub project: Option<Option<String>>,
}

impl From<&TaskPatch> for WireTaskPatch {
    fn from(patch: &TaskPatch) -> Self {
        Self {
            completed: patch.completed,
            title: patch.title.clone(),
            description: patch.description.clone(),
            priority: patch.priority.map(Priority::to_wire),
            tags: patch.tags.clone(),
            due_date: patch.due_date.map(|date| date.map(format_due_date)),
            subtasks: patch
                .subtasks
                .as_ref()
                .map(|subtasks| subtasks.iter().map(WireSubtaskBody::from).collect()),
            project: patch.project.clone(),
        }
    }
}

/// Body of `POST /tasks`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WireNewTask {
    pub title: String,
    pub description: String,
    pub completed: bool,
    pub priority: u8,
    pub tags: Vec<String>,
    pub due_date: Option<String>,
    pub subtasks: Vec<WireSubtaskBody>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub project: Option<String>,
}

impl From<&NewTask> for WireNewTask {
    fn from(task: &NewTask) -> Self {
        Self {
            title: task.title.trim().to_string(),
            description: task.description.clone().unwrap_or_default(),
            completed: false,
            priority: task.priority.to_wire(),
            tags: task.tags.clone(),
            due_date: task.due_date.map(format_due_date),
            subtasks: Vec::new(),
            project: task.project.clone(),
        }
    }
}

fn flexible_id<'de, D>(deserializer: D) -> std::result::Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum RawId {
        Text(String),
        Number(serde_json::Number),
    }

    Ok(match RawId::deserialize(deserializer)? {
        RawId::Text(id) => id,
        RawId::Number(id) => id.to_string(),
    })
}

/// Any JSON number is accepted; values that are not a small integer mean no priority.
fn wire_priority<'de, D>(deserializer: D) -> std::result::Result<Priority, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Option::<serde_json::Number>::deserialize(deserializer)? {
        Some(number) => number
            .as_i64()
            .map(Priority::from_wire)
            .unwrap_or(Priority::None),
        None => Priority::None,
    })
}
