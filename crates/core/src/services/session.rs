//! Drives the store against a [`TaskApi`]: loading, optimistic mutations and reconciliation.

use parking_lot::Mutex;
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::clock::{Clock, SystemClock};
use crate::error::{Result, TaskError};
use crate::model::{ListFilters, NewTask, SortKey, Subtask, Task, TaskFilter, TaskPatch};
use crate::services::api::TaskApi;
use crate::store::{Action, FetchPurpose, MutationKind, TaskStore};
use crate::telemetry::{Event, Handle};
use crate::view::{self, ViewModel};
use crate::wire::{decode_tasks, WireNewTask, WireTaskPatch};

/// Final state of a mutation once the API has answered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MutationOutcome {
    Confirmed,
    RolledBack(TaskError),
}

impl MutationOutcome {
    pub fn is_confirmed(&self) -> bool {
        matches!(self, MutationOutcome::Confirmed)
    }
}

/// Tally of a bulk operation, which runs one item at a time.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BulkReport {
    pub confirmed: usize,
    pub rolled_back: Vec<(String, TaskError)>,
}

impl BulkReport {
    fn record(&mut self, id: String, outcome: MutationOutcome) {
        match outcome {
            MutationOutcome::Confirmed => self.confirmed += 1,
            MutationOutcome::RolledBack(error) => self.rolled_back.push((id, error)),
        }
    }

    pub fn attempted(&self) -> usize {
        self.confirmed + self.rolled_back.len()
    }
}

/// Local half of a two-phase mutation: the change is visible, the request is in flight.
#[derive(Debug)]
struct PendingMutation {
    kind: MutationKind,
    previous: Task,
}

pub struct TaskSession<A> {
    api: A,
    store: Mutex<TaskStore>,
    clock: Box<dyn Clock>,
    telemetry: Handle,
}

impl<A: TaskApi> TaskSession<A> {
    pub fn new(api: A) -> Self {
        Self::with_clock(api, SystemClock)
    }

    pub fn with_clock(api: A, clock: impl Clock + 'static) -> Self {
        Self {
            api,
            store: Mutex::new(TaskStore::new()),
            clock: Box::new(clock),
            telemetry: Handle::new(),
        }
    }

    pub fn api(&self) -> &A {
        &self.api
    }

    pub fn telemetry(&self) -> &Handle {
        &self.telemetry
    }

    /// Recompute the view model from the current store.
    pub fn view(&self) -> ViewModel {
        let store = self.store.lock();
        view::derive(&store, self.clock.today())
    }

    pub fn snapshot(&self) -> TaskStore {
        self.store.lock().clone()
    }

    pub fn task(&self, id: &str) -> Option<Task> {
        self.store.lock().task(id).cloned()
    }

    pub fn filters(&self) -> ListFilters {
        self.store.lock().filters().clone()
    }

    pub fn dispatch(&self, action: Action) -> bool {
        self.store.lock().apply(action)
    }

    pub fn set_search(&self, query: impl Into<String>) {
        self.dispatch(Action::SearchChanged(query.into()));
    }

    pub fn set_filter(&self, filter: TaskFilter) {
        self.dispatch(Action::FilterChanged(filter));
    }

    pub fn set_tag(&self, tag: Option<String>) {
        self.dispatch(Action::TagChanged(tag));
    }

    pub fn set_sort(&self, sort: SortKey) {
        self.dispatch(Action::SortChanged(sort));
    }

    pub fn set_show_completed(&self, show: bool) {
        self.dispatch(Action::ShowCompletedChanged(show));
    }

    pub fn select(&self, id: Option<&str>) -> Result<()> {
        let id = id.map(str::to_string);
        if self.dispatch(Action::TaskSelected(id.clone())) {
            Ok(())
        } else {
            Err(TaskError::not_found(id.unwrap_or_default()))
        }
    }

    pub fn toggle_bulk(&self, id: &str) -> Result<()> {
        if self.dispatch(Action::BulkToggled(id.to_string())) {
            Ok(())
        } else {
            Err(TaskError::not_found(id))
        }
    }

    pub fn clear_bulk(&self) {
        self.dispatch(Action::BulkCleared);
    }

    /// Fetch the full collection and replace the local copy. Failures land in the store
    /// as the list error panel and are also returned.
    pub async fn load(&self) -> Result<usize> {
        self.fetch(FetchPurpose::Load).await
    }

    async fn fetch(&self, purpose: FetchPurpose) -> Result<usize> {
        let seq = self.store.lock().begin_fetch(purpose);
        self.telemetry.record(Event::FetchStarted { seq });
        debug!(seq, ?purpose, "fetching tasks");

        match self.api.list_tasks().await {
            Ok(records) => {
                let decoded = decode_tasks(records);
                for rejected in &decoded.rejected {
                    warn!(index = rejected.index, error = %rejected.error, "skipping malformed task");
                }
                let count = decoded.tasks.len();
                let rejected = decoded.rejected.len();
                let accepted = self.store.lock().apply(Action::FetchSucceeded {
                    seq,
                    tasks: decoded.tasks,
                    rejected,
                });
                if accepted {
                    info!(seq, count, rejected, "tasks loaded");
                    self.telemetry.record(Event::FetchCompleted {
                        seq,
                        count,
                        rejected,
                    });
                } else {
                    debug!(seq, "discarding stale fetch result");
                    self.telemetry.record(Event::StaleFetchDiscarded { seq });
                }
                Ok(count)
            }
            Err(error) => {
                warn!(seq, error = %error, "failed to fetch tasks");
                let accepted = self.store.lock().apply(Action::FetchFailed {
                    seq,
                    purpose,
                    error: error.clone(),
                });
                if accepted {
                    self.telemetry.record(Event::FetchFailed {
                        seq,
                        error: error.to_string(),
                    });
                } else {
                    self.telemetry.record(Event::StaleFetchDiscarded { seq });
                }
                Err(error)
            }
        }
    }

    fn begin(&self, kind: MutationKind, id: &str, patch: &TaskPatch) -> Result<PendingMutation> {
        if patch.is_empty() {
            return Err(TaskError::validation("nothing to update"));
        }
        let mut store = self.store.lock();
        let previous = store.task(id).cloned().ok_or_else(|| TaskError::not_found(id))?;
        store.apply(Action::PatchApplied {
            id: id.to_string(),
            patch: patch.clone(),
        });
        store.apply(Action::MutationQueued(kind));
        drop(store);

        self.telemetry
            .record(Event::MutationQueued(kind.label().to_string()));
        Ok(PendingMutation { kind, previous })
    }

    async fn settle(&self, pending: PendingMutation, result: Result<Value>) -> MutationOutcome {
        let PendingMutation { kind, previous } = pending;
        match result {
            Ok(_) => {
                self.store.lock().apply(Action::MutationConfirmed(kind));
                self.telemetry
                    .record(Event::MutationConfirmed(kind.label().to_string()));
                MutationOutcome::Confirmed
            }
            Err(error) => {
                warn!(action = kind.label(), id = %previous.id, error = %error, "mutation failed; reconciling");
                if self.fetch(FetchPurpose::Reconcile).await.is_err() {
                    warn!(id = %previous.id, "reconciling fetch failed; restoring previous task");
                    self.store.lock().apply(Action::TaskRestored(previous));
                }
                self.store.lock().apply(Action::MutationFailed {
                    kind,
                    error: error.clone(),
                });
                self.telemetry.record(Event::MutationRolledBack {
                    action: kind.label().to_string(),
                    error: error.to_string(),
                });
                MutationOutcome::RolledBack(error)
            }
        }
    }

    /// Apply `patch` locally, send it, and keep or roll back depending on the response.
    pub async fn update(
        &self,
        kind: MutationKind,
        id: &str,
        patch: TaskPatch,
    ) -> Result<MutationOutcome> {
        let pending = self.begin(kind, id, &patch)?;
        let body = WireTaskPatch::from(&patch);
        let result = self.api.update_task(id, &body).await;
        Ok(self.settle(pending, result).await)
    }

    pub async fn toggle_complete(&self, id: &str) -> Result<MutationOutcome> {
        let completed = self.existing(id)?.completed;
        self.update(
            MutationKind::ToggleComplete,
            id,
            TaskPatch::completed(!completed),
        )
        .await
    }

    pub async fn set_completed(&self, id: &str, completed: bool) -> Result<MutationOutcome> {
        self.existing(id)?;
        self.update(
            MutationKind::ToggleComplete,
            id,
            TaskPatch::completed(completed),
        )
        .await
    }

    pub async fn edit_task(&self, id: &str, mut patch: TaskPatch) -> Result<MutationOutcome> {
        if let Some(title) = patch.title.as_mut() {
            *title = title.trim().to_string();
            if title.is_empty() {
                return Err(TaskError::validation("task title cannot be empty"));
            }
        }
        if let Some(tags) = patch.tags.take() {
            patch.tags = Some(clean_tags(tags));
        }
        if let Some(project) = patch.project.take() {
            let project = project
                .map(|project| project.trim().to_string())
                .filter(|project| !project.is_empty());
            patch.project = Some(project);
        }
        self.update(MutationKind::Edit, id, patch).await
    }

    /// Deletes are not applied locally first; success removes the task and refetches.
    pub async fn delete_task(&self, id: &str) -> Result<MutationOutcome> {
        self.existing(id)?;
        let kind = MutationKind::Delete;
        self.store.lock().apply(Action::MutationQueued(kind));
        self.telemetry
            .record(Event::MutationQueued(kind.label().to_string()));

        match self.api.delete_task(id).await {
            Ok(()) => {
                {
                    let mut store = self.store.lock();
                    store.apply(Action::TaskRemoved { id: id.to_string() });
                    store.apply(Action::MutationConfirmed(kind));
                }
                self.telemetry
                    .record(Event::MutationConfirmed(kind.label().to_string()));
                let _ = self.fetch(FetchPurpose::Reconcile).await;
                Ok(MutationOutcome::Confirmed)
            }
            Err(error) => {
                warn!(id, error = %error, "delete failed");
                self.store.lock().apply(Action::MutationFailed {
                    kind,
                    error: error.clone(),
                });
                self.telemetry.record(Event::MutationRolledBack {
                    action: kind.label().to_string(),
                    error: error.to_string(),
                });
                Ok(MutationOutcome::RolledBack(error))
            }
        }
    }

    pub async fn create_task(&self, mut task: NewTask) -> Result<MutationOutcome> {
        task.title = task.title.trim().to_string();
        if task.title.is_empty() {
            return Err(TaskError::validation("task title cannot be empty"));
        }
        task.tags = clean_tags(task.tags);

        let kind = MutationKind::Create;
        self.store.lock().apply(Action::MutationQueued(kind));
        self.telemetry
            .record(Event::MutationQueued(kind.label().to_string()));

        match self.api.create_task(&WireNewTask::from(&task)).await {
            Ok(_) => {
                self.store.lock().apply(Action::MutationConfirmed(kind));
                self.telemetry
                    .record(Event::MutationConfirmed(kind.label().to_string()));
                let _ = self.fetch(FetchPurpose::Reconcile).await;
                Ok(MutationOutcome::Confirmed)
            }
            Err(error) => {
                warn!(title = %task.title, error = %error, "create failed");
                self.store.lock().apply(Action::MutationFailed {
                    kind,
                    error: error.clone(),
                });
                self.telemetry.record(Event::MutationRolledBack {
                    action: kind.label().to_string(),
                    error: error.to_string(),
                });
                Ok(MutationOutcome::RolledBack(error))
            }
        }
    }

    pub async fn add_subtask(&self, task_id: &str, title: &str) -> Result<MutationOutcome> {
        let title = title.trim();
        if title.is_empty() {
            return Err(TaskError::validation("subtask title cannot be empty"));
        }
        let mut subtasks = self.existing(task_id)?.subtasks;
        subtasks.push(Subtask::new(title));
        self.update(
            MutationKind::AddSubtask,
            task_id,
            TaskPatch::subtasks(subtasks),
        )
        .await
    }

    pub async fn toggle_subtask(&self, task_id: &str, subtask_id: &str) -> Result<MutationOutcome> {
        let subtasks = self.map_subtask(task_id, subtask_id, |subtask| {
            subtask.completed = !subtask.completed;
        })?;
        self.update(
            MutationKind::ToggleSubtask,
            task_id,
            TaskPatch::subtasks(subtasks),
        )
        .await
    }

    pub async fn edit_subtask(
        &self,
        task_id: &str,
        subtask_id: &str,
        title: &str,
    ) -> Result<MutationOutcome> {
        let title = title.trim();
        if title.is_empty() {
            return Err(TaskError::validation("subtask title cannot be empty"));
        }
        let subtasks = self.map_subtask(task_id, subtask_id, |subtask| {
            subtask.title = title.to_string();
        })?;
        self.update(
            MutationKind::EditSubtask,
            task_id,
            TaskPatch::subtasks(subtasks),
        )
        .await
    }

    pub async fn delete_subtask(&self, task_id: &str, subtask_id: &str) -> Result<MutationOutcome> {
        let mut subtasks = self.existing(task_id)?.subtasks;
        let before = subtasks.len();
        subtasks.retain(|subtask| subtask.id != subtask_id);
        if subtasks.len() == before {
            return Err(TaskError::not_found(subtask_id));
        }
        self.update(
            MutationKind::DeleteSubtask,
            task_id,
            TaskPatch::subtasks(subtasks),
        )
        .await
    }

    /// Marks every subtask done in a single update. Already-complete lists are left alone.
    pub async fn complete_subtasks(&self, task_id: &str) -> Result<MutationOutcome> {
        let mut subtasks = self.existing(task_id)?.subtasks;
        if subtasks.iter().all(|subtask| subtask.completed) {
            return Ok(MutationOutcome::Confirmed);
        }
        for subtask in &mut subtasks {
            subtask.completed = true;
        }
        self.update(
            MutationKind::CompleteSubtasks,
            task_id,
            TaskPatch::subtasks(subtasks),
        )
        .await
    }

    /// Complete every incomplete task in the currently displayed list.
    pub async fn complete_all(&self) -> BulkReport {
        let ids = self.visible_ids(|task| !task.completed);
        self.complete_each(ids).await
    }

    /// Delete every completed task in the currently displayed list.
    pub async fn clear_completed(&self) -> BulkReport {
        let ids = self.visible_ids(|task| task.completed);
        self.delete_each(ids).await
    }

    pub async fn bulk_complete(&self) -> BulkReport {
        let ids: Vec<String> = {
            let store = self.store.lock();
            store
                .bulk_selection()
                .iter()
                .filter(|id| store.task(id).map(|task| !task.completed).unwrap_or(false))
                .cloned()
                .collect()
        };
        let report = self.complete_each(ids).await;
        self.clear_bulk();
        report
    }

    pub async fn bulk_delete(&self) -> BulkReport {
        let ids = self.store.lock().bulk_selection().to_vec();
        let report = self.delete_each(ids).await;
        self.clear_bulk();
        report
    }

    async fn complete_each(&self, ids: Vec<String>) -> BulkReport {
        let mut report = BulkReport::default();
        for id in ids {
            match self.set_completed(&id, true).await {
                Ok(outcome) => report.record(id, outcome),
                Err(error) => report.rolled_back.push((id, error)),
            }
        }
        report
    }

    async fn delete_each(&self, ids: Vec<String>) -> BulkReport {
        let mut report = BulkReport::default();
        for id in ids {
            match self.delete_task(&id).await {
                Ok(outcome) => report.record(id, outcome),
                Err(error) => report.rolled_back.push((id, error)),
            }
        }
        report
    }

    fn visible_ids(&self, keep: impl Fn(&Task) -> bool) -> Vec<String> {
        self.view()
            .tasks()
            .filter(|task| keep(task))
            .map(|task| task.id.clone())
            .collect()
    }

    fn existing(&self, id: &str) -> Result<Task> {
        self.task(id).ok_or_else(|| TaskError::not_found(id))
    }

    fn map_subtask(
        &self,
        task_id: &str,
        subtask_id: &str,
        change: impl FnOnce(&mut Subtask),
    ) -> Result<Vec<Subtask>> {
        let mut subtasks = self.existing(task_id)?.subtasks;
        let subtask = subtasks
            .iter_mut()
            .find(|subtask| subtask.id == subtask_id)
            .ok_or_else(|| TaskError::not_found(subtask_id))?;
        change(subtask);
        Ok(subtasks)
    }
}

/// Trim tags and drop blanks. Order and repeats are kept as entered.
fn clean_tags(tags: Vec<String>) -> Vec<String> {
    tags.into_iter()
        .map(|tag| tag.trim().to_string())
        .filter(|tag| !tag.is_empty())
        .collect()
}
