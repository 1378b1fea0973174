//! End-to-end behaviour of the derived list and the optimistic mutation protocol.

use async_trait::async_trait;
use chrono::{Duration, NaiveDate};
use pretty_assertions::assert_eq;
use rstest::rstest;
use serde_json::{json, Value};
use tokio::sync::Notify;

use taskdeck_core::filters::{self, Predicate};
use taskdeck_core::services::memory::{InMemoryTaskApi, Operation};
use taskdeck_core::wire::{decode_tasks, WireNewTask, WireTaskPatch};
use taskdeck_core::{
    derive_tasks, FixedClock, ListFilters, ListPanel, MutationOutcome, Priority, SortKey,
    TaskApi, TaskError, TaskFilter, TaskSession,
};

fn today() -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 1, 1).unwrap()
}

fn sample_records() -> Vec<Value> {
    vec![
        json!({ "id": "1", "title": "Pay rent", "priority": 3, "completed": false, "dueDate": "2024-01-01" }),
        json!({ "id": "2", "title": "Buy milk", "priority": 0, "completed": true, "dueDate": null }),
    ]
}

fn ids(tasks: &[taskdeck_core::Task]) -> Vec<&str> {
    tasks.iter().map(|task| task.id.as_str()).collect()
}

#[test]
fn pending_filter_with_priority_sort() {
    let tasks = decode_tasks(sample_records()).tasks;
    let filters = ListFilters {
        filter: TaskFilter::Pending,
        sort: SortKey::Priority,
        ..ListFilters::default()
    };
    assert_eq!(ids(&derive_tasks(&tasks, &filters, today())), vec!["1"]);
}

#[test]
fn search_for_milk() {
    let tasks = decode_tasks(sample_records()).tasks;
    let filters = ListFilters {
        search: "milk".into(),
        ..ListFilters::default()
    };
    assert_eq!(ids(&derive_tasks(&tasks, &filters, today())), vec!["2"]);
}

#[test]
fn predicate_order_does_not_change_the_result() {
    let tasks = decode_tasks(vec![
        json!({ "id": "a", "title": "Write report", "tags": ["work"], "completed": false }),
        json!({ "id": "b", "title": "Report expenses", "tags": ["work"], "completed": true }),
        json!({ "id": "c", "title": "Report a bug", "tags": ["home"], "completed": false }),
        json!({ "id": "d", "title": "Walk dog", "tags": ["work"], "completed": false }),
    ])
    .tasks;
    let predicates = [
        Predicate::Search("report".into()),
        Predicate::Pending,
        Predicate::Tag("work".into()),
    ];
    let orders: [[usize; 3]; 6] = [
        [0, 1, 2],
        [0, 2, 1],
        [1, 0, 2],
        [1, 2, 0],
        [2, 0, 1],
        [2, 1, 0],
    ];

    for order in orders {
        let ordered: Vec<Predicate> = order.iter().map(|&i| predicates[i].clone()).collect();
        let mut result = tasks.clone();
        for predicate in &ordered {
            result = filters::apply(&result, std::slice::from_ref(predicate));
        }
        assert_eq!(ids(&result), vec!["a"], "order {order:?}");
    }
}

#[rstest]
#[case(SortKey::Priority)]
#[case(SortKey::Completed)]
fn tied_keys_keep_input_order(#[case] sort: SortKey) {
    let tasks = decode_tasks(vec![
        json!({ "id": "1", "title": "x", "priority": 2, "completed": false }),
        json!({ "id": "2", "title": "x", "priority": 2, "completed": false }),
        json!({ "id": "3", "title": "x", "priority": 2, "completed": false }),
    ])
    .tasks;
    let filters = ListFilters {
        sort,
        ..ListFilters::default()
    };
    assert_eq!(
        ids(&derive_tasks(&tasks, &filters, today())),
        vec!["1", "2", "3"]
    );
}

#[rstest]
#[case(7, false, true)]
#[case(8, false, false)]
#[case(1, true, false)]
fn due_soon_boundary(#[case] days_out: i64, #[case] completed: bool, #[case] included: bool) {
    let due = today() + Duration::days(days_out);
    let tasks = decode_tasks(vec![json!({
        "id": "1",
        "title": "Boundary",
        "completed": completed,
        "dueDate": due.format("%Y-%m-%d").to_string(),
    })])
    .tasks;
    let filters = ListFilters {
        filter: TaskFilter::DueSoon,
        ..ListFilters::default()
    };
    assert_eq!(
        derive_tasks(&tasks, &filters, today()).len(),
        usize::from(included)
    );
}

#[tokio::test]
async fn derivation_is_idempotent() {
    let session = TaskSession::with_clock(
        InMemoryTaskApi::with_sample_tasks(today()),
        FixedClock(today()),
    );
    session.load().await.unwrap();
    session.set_sort(SortKey::Title);
    session.set_filter(TaskFilter::Priority(Priority::Low));

    assert_eq!(session.view(), session.view());
}

#[tokio::test]
async fn failed_toggle_ends_at_refetched_state_not_the_guess() {
    let api = InMemoryTaskApi::with_records(sample_records());
    let session = TaskSession::with_clock(api, FixedClock(today()));
    session.load().await.unwrap();

    // Another client renames the task; the update itself is refused.
    session.api().set_records(vec![
        json!({ "id": "1", "title": "Pay rent (landlord)", "priority": 3, "completed": false, "dueDate": "2024-01-01" }),
        json!({ "id": "2", "title": "Buy milk", "priority": 0, "completed": true, "dueDate": null }),
    ]);
    session
        .api()
        .fail_next(Operation::Update, TaskError::api("PUT /tasks/1", 500, ""));

    let outcome = session.toggle_complete("1").await.unwrap();

    assert!(matches!(outcome, MutationOutcome::RolledBack(_)));
    let task = session.task("1").unwrap();
    assert!(!task.completed);
    assert_eq!(task.title, "Pay rent (landlord)");
}

#[tokio::test]
async fn load_failure_shows_error_panel_and_retry_recovers() {
    let api = InMemoryTaskApi::with_records(sample_records());
    api.fail_next(Operation::List, TaskError::network("http://api.test", "refused"));
    let session = TaskSession::with_clock(api, FixedClock(today()));

    assert!(session.load().await.is_err());
    assert!(matches!(
        session.view().panel,
        ListPanel::Error { retryable: true, .. }
    ));

    session.load().await.unwrap();
    assert_eq!(session.view().task_ids(), vec!["1", "2"]);
}

#[tokio::test]
async fn malformed_record_is_excluded_with_a_notice() {
    let mut records = sample_records();
    records.push(json!({ "id": "3", "title": "Broken", "dueDate": "someday" }));
    let session = TaskSession::with_clock(
        InMemoryTaskApi::with_records(records),
        FixedClock(today()),
    );

    assert_eq!(session.load().await.unwrap(), 2);
    let view = session.view();
    assert_eq!(view.task_ids(), vec!["1", "2"]);
    assert!(view.notice.is_some());
}

/// Holds every update until released, so the optimistic state can be observed.
struct GatedApi {
    inner: InMemoryTaskApi,
    gate: Notify,
}

#[async_trait]
impl TaskApi for GatedApi {
    async fn list_tasks(&self) -> taskdeck_core::Result<Vec<Value>> {
        self.inner.list_tasks().await
    }

    async fn update_task(&self, id: &str, patch: &WireTaskPatch) -> taskdeck_core::Result<Value> {
        self.gate.notified().await;
        self.inner.update_task(id, patch).await
    }

    async fn delete_task(&self, id: &str) -> taskdeck_core::Result<()> {
        self.inner.delete_task(id).await
    }

    async fn create_task(&self, task: &WireNewTask) -> taskdeck_core::Result<Value> {
        self.inner.create_task(task).await
    }
}

#[tokio::test]
async fn optimistic_value_is_visible_before_the_response() {
    let session = TaskSession::with_clock(
        GatedApi {
            inner: InMemoryTaskApi::with_records(sample_records()),
            gate: Notify::new(),
        },
        FixedClock(today()),
    );
    session.load().await.unwrap();

    let observe = async {
        let seen = session.task("1").map(|task| task.completed);
        assert_eq!(session.snapshot().pending_mutations(), 1);
        session.api().gate.notify_one();
        seen
    };
    let (outcome, seen) = tokio::join!(session.toggle_complete("1"), observe);

    assert_eq!(seen, Some(true));
    assert_eq!(outcome.unwrap(), MutationOutcome::Confirmed);
    assert_eq!(session.snapshot().pending_mutations(), 0);
}
