pub mod gems;
pub mod health;

pub use gems::{create_gem, delete_gem, get_gem, list_gems, update_gem};
pub use health::{health_check, metrics_endpoint, root};
