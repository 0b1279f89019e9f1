use thiserror::Error;

#[derive(Error, Debug)]
pub enum SecprobeError {
    #[error("Unknown event type: {0}")]
    UnknownEventType(String),

    #[error("Invalid config value for {key}: {value}")]
    InvalidConfig { key: String, value: String },
}

pub type Result<T> = std::result::Result<T, SecprobeError>;
