pub mod gems;

pub use gems::{CreateGemResponse, MessageResponse};
