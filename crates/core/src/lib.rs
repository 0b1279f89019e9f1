pub mod config;
pub mod error;
pub mod event_type;

pub use config::Config;
pub use error::*;
pub use event_type::EventType;
