pub mod api;
pub mod http;
pub mod memory;
pub mod session;

pub use api::TaskApi;
pub use http::HttpTaskApi;
pub use memory::InMemoryTaskApi;
pub use session::{MutationOutcome, TaskSession};
