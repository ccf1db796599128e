pub mod database;
pub mod memory;
pub mod metrics;
pub mod store;

pub use database::GemDb;
pub use memory::InMemoryGemStore;
pub use metrics::{get_metrics, init_metrics};
pub use store::{GemStore, UpdateOutcome};
