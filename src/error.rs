use std::fmt;

#[derive(Debug)]
pub enum MonitorError {
    NetworkError(String),
    ModelError(String),
    ConfigError(String),
    IoError(String),
    ParseError(String),
}

impl fmt::Display for MonitorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MonitorError::NetworkError(msg) => write!(f, "Network error: {}", msg),
            MonitorError::ModelError(msg) => write!(f, "Model error: {}", msg),
            MonitorError::ConfigError(msg) => write!(f, "Configuration error: {}", msg),
            MonitorError::IoError(msg) => write!(f, "IO error: {}", msg),
            MonitorError::ParseError(msg) => write!(f, "Parse error: {}", msg),
        }
    }
}

impl std::error::Error for MonitorError {}

impl From<std::io::Error> for MonitorError {
    fn from(err: std::io::Error) -> Self {
        MonitorError::IoError(err.to_string())
    }
}

impl From<csv::Error> for MonitorError {
    fn from(err: csv::Error) -> Self {
        MonitorError::IoError(err.to_string())
    }
}

impl From<serde_json::Error> for MonitorError {
    fn from(err: serde_json::Error) -> Self {
        MonitorError::ParseError(err.to_string())
    }
}

impl From<std::num::ParseIntError> for MonitorError {
    fn from(err: std::num::ParseIntError) -> Self {
        MonitorError::ParseError(err.to_string())
    }
}

impl From<pyo3::PyErr> for MonitorError {
    fn from(err: pyo3::PyErr) -> Self {
        MonitorError::ModelError(err.to_string())
    }
}

impl From<ctrlc::Error> for MonitorError {
    fn from(err: ctrlc::Error) -> Self {
        MonitorError::ConfigError(err.to_string())
    }
}

impl From<&str> for MonitorError {
    fn from(msg: &str) -> Self {
        MonitorError::ConfigError(msg.to_string())
    }
}

impl From<String> for MonitorError {
    fn from(msg: String) -> Self {
        MonitorError::ConfigError(msg)
    }
}

pub type Result<T> = std::result::Result<T, MonitorError>;
