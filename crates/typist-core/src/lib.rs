pub mod config;
pub mod error;
pub mod events;
pub mod types;

pub use config::TypistConfig;
pub use error::{Result, TypistError};
pub use events::{EventEnvelope, ReadySnapshot, SessionEvent};
pub use types::*;
