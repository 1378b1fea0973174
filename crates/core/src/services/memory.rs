//! In-process [`TaskApi`] holding JSON records in memory.
//!
//! Backs the CLI's `--demo` mode and the test suites. Every request is logged and
//! individual operations can be told to fail once.

use async_trait::async_trait;
use chrono::{Duration, NaiveDate};
use parking_lot::Mutex;
use serde_json::{json, Map, Value};

use crate::error::{Result, TaskError};
use crate::services::api::TaskApi;
use crate::wire::{format_due_date, WireNewTask, WireTaskPatch};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    List,
    Update,
    Delete,
    Create,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Request {
    List,
    Update { id: String, body: Value },
    Delete { id: String },
    Create { body: Value },
}

#[derive(Debug, Default)]
struct Inner {
    records: Vec<Value>,
    next_id: u64,
    failures: Vec<(Operation, TaskError)>,
    requests: Vec<Request>,
}

#[derive(Debug, Default)]
pub struct InMemoryTaskApi {
    inner: Mutex<Inner>,
}

struct SampleTask {
    title: &'static str,
    description: Option<&'static str>,
    priority: u8,
    due_in_days: Option<i64>,
    tags: &'static [&'static str],
    subtasks: &'static [(&'static str, bool)],
    completed: bool,
}

const SAMPLE_TASKS: &[SampleTask] = &[
    SampleTask {
        title: "Pay rent",
        description: Some("Transfer before the 1st"),
        priority: 3,
        due_in_days: Some(0),
        tags: &["home", "finance"],
        subtasks: &[],
        completed: false,
    },
    SampleTask {
        title: "Buy milk",
        description: None,
        priority: 0,
        due_in_days: None,
        tags: &["errands"],
        subtasks: &[],
        completed: true,
    },
    SampleTask {
        title: "Prepare quarterly review",
        description: Some("Slides plus metrics summary"),
        priority: 2,
        due_in_days: Some(5),
        tags: &["work"],
        subtasks: &[("Collect metrics", true), ("Draft slides", false), ("Rehearse", false)],
        completed: false,
    },
    SampleTask {
        title: "Renew passport",
        description: None,
        priority: 1,
        due_in_days: Some(-3),
        tags: &["admin"],
        subtasks: &[],
        completed: false,
    },
    SampleTask {
        title: "Plan weekend hike",
        description: Some("Check the weather first"),
        priority: 1,
        due_in_days: Some(12),
        tags: &["home"],
        subtasks: &[("Pick trail", false)],
        completed: false,
    },
];

impl InMemoryTaskApi {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_records(records: Vec<Value>) -> Self {
        let api = Self::new();
        api.set_records(records);
        api
    }

    /// A small, varied collection anchored on `today` so every filter has something to show.
    pub fn with_sample_tasks(today: NaiveDate) -> Self {
        let records = SAMPLE_TASKS
            .iter()
            .enumerate()
            .map(|(index, sample)| {
                let id = (index + 1).to_string();
                json!({
                    "id": id,
                    "title": sample.title,
                    "description": sample.description,
                    "completed": sample.completed,
                    "priority": sample.priority,
                    "dueDate": sample
                        .due_in_days
                        .map(|days| format_due_date(today + Duration::days(days))),
                    "tags": sample.tags,
                    "subtasks": sample
                        .subtasks
                        .iter()
                        .enumerate()
                        .map(|(position, (title, completed))| json!({
                            "id": format!("{id}-{}", position + 1),
                            "title": title,
                            "completed": completed,
                        }))
                        .collect::<Vec<_>>(),
                })
            })
            .collect();
        Self::with_records(records)
    }

    /// Replace the authoritative collection, as another client would.
    pub fn set_records(&self, records: Vec<Value>) {
        let mut inner = self.inner.lock();
        inner.next_id = records.len() as u64;
        inner.records = records;
    }

    pub fn records(&self) -> Vec<Value> {
        self.inner.lock().records.clone()
    }

    pub fn record(&self, id: &str) -> Option<Value> {
        self.inner
            .lock()
            .records
            .iter()
            .find(|record| record_id(record).as_deref() == Some(id))
            .cloned()
    }

    /// The next call of `operation` fails with `error`. Queued failures are consumed in order.
    pub fn fail_next(&self, operation: Operation, error: TaskError) {
        self.inner.lock().failures.push((operation, error));
    }

    pub fn requests(&self) -> Vec<Request> {
        self.inner.lock().requests.clone()
    }

    pub fn clear_requests(&self) {
        self.inner.lock().requests.clear();
    }
}

impl Inner {
    fn take_failure(&mut self, operation: Operation) -> Option<TaskError> {
        let position = self
            .failures
            .iter()
            .position(|(candidate, _)| *candidate == operation)?;
        Some(self.failures.remove(position).1)
    }

    fn position(&self, id: &str) -> Option<usize> {
        self.records
            .iter()
            .position(|record| record_id(record).as_deref() == Some(id))
    }
}

#[async_trait]
impl TaskApi for InMemoryTaskApi {
    async fn list_tasks(&self) -> Result<Vec<Value>> {
        let mut inner = self.inner.lock();
        inner.requests.push(Request::List);
        if let Some(error) = inner.take_failure(Operation::List) {
            return Err(error);
        }
        Ok(inner.records.clone())
    }

    async fn update_task(&self, id: &str, patch: &WireTaskPatch) -> Result<Value> {
        let body = to_object(patch)?;
        let mut inner = self.inner.lock();
        inner.requests.push(Request::Update {
            id: id.to_string(),
            body: Value::Object(body.clone()),
        });
        if let Some(error) = inner.take_failure(Operation::Update) {
            return Err(error);
        }
        let position = inner
            .position(id)
            .ok_or_else(|| TaskError::api(format!("PUT /tasks/{id}"), 404, "Task not found"))?;
        let record = &mut inner.records[position];
        if let Value::Object(fields) = record {
            fields.extend(body);
        }
        Ok(record.clone())
    }

    async fn delete_task(&self, id: &str) -> Result<()> {
        let mut inner = self.inner.lock();
        inner.requests.push(Request::Delete { id: id.to_string() });
        if let Some(error) = inner.take_failure(Operation::Delete) {
            return Err(error);
        }
        let position = inner
            .position(id)
            .ok_or_else(|| TaskError::api(format!("DELETE /tasks/{id}"), 404, "Task not found"))?;
        inner.records.remove(position);
        Ok(())
    }

    async fn create_task(&self, task: &WireNewTask) -> Result<Value> {
        let mut body = to_object(task)?;
        let mut inner = self.inner.lock();
        inner.requests.push(Request::Create {
            body: Value::Object(body.clone()),
        });
        if let Some(error) = inner.take_failure(Operation::Create) {
            return Err(error);
        }
        inner.next_id += 1;
        let mut id = inner.next_id;
        while inner.position(&id.to_string()).is_some() {
            id += 1;
        }
        inner.next_id = id;
        body.insert("id".to_string(), Value::String(id.to_string()));
        let record = Value::Object(body);
        inner.records.push(record.clone());
        Ok(record)
    }
}

fn to_object<T: serde::Serialize>(body: &T) -> Result<Map<String, Value>> {
    match serde_json::to_value(body) {
        Ok(Value::Object(fields)) => Ok(fields),
        Ok(_) => Err(TaskError::validation("request body must be a JSON object")),
        Err(err) => Err(TaskError::validation(format!(
            "request body could not be encoded: {err}"
        ))),
    }
}

fn record_id(record: &Value) -> Option<String> {
    match record.get("id")? {
        Value::String(id) => Some(id.clone()),
        Value::Number(id) => Some(id.to_string()),
        _ => None,
    }
}
