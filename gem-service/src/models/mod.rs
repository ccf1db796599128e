pub mod gem;

pub use gem::{Gem, GemChanges, GemId};
