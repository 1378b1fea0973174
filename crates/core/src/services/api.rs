//! Port for the remote Task API.

use async_trait::async_trait;
use serde_json::Value;

use crate::error::Result;
use crate::wire::{WireNewTask, WireTaskPatch};

/// The remote collaborator that owns authoritative task state.
///
/// Records come back as raw JSON so that one malformed task can be rejected without
/// discarding the rest of the collection.
#[async_trait]
pub trait TaskApi: Send + Sync {
    /// `GET /tasks`
    async fn list_tasks(&self) -> Result<Vec<Value>>;

    /// `PUT /tasks/{id}` carrying only the changed fields.
    async fn update_task(&self, id: &str, patch: &WireTaskPatch) -> Result<Value>;

    /// `DELETE /tasks/{id}`
    async fn delete_task(&self, id: &str) -> Result<()>;

    /// `POST /tasks`
    async fn create_task(&self, task: &WireNewTask) -> Result<Value>;
}
