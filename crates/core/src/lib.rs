//! Task view-model: wire conversion, filtering, sorting, derivation and the
//! optimistic mutation protocol against a remote Task API.

pub mod clock;
pub mod config;
pub mod error;
pub mod filters;
pub mod model;
pub mod services;
pub mod sort;
pub mod store;
pub mod telemetry;
pub mod view;
pub mod wire;

pub use clock::{Clock, FixedClock, SystemClock};
pub use config::{AppConfig, ConfigOverrides};
pub use error::{ErrorKind, Result, TaskError};
pub use model::*;
pub use services::session::BulkReport;
pub use services::{HttpTaskApi, InMemoryTaskApi, MutationOutcome, TaskApi, TaskSession};
pub use store::{Action, LoadState, MutationKind, Notice, NoticeKind, TaskStore};
pub use view::{derive, derive_tasks, ListPanel, TaskRow, TaskStats, ViewModel};
