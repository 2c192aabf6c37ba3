use std::fmt;

#[derive(Debug)]
pub enum ConfigError {
    /// TOML parse / deserialization error.
    Parse(String),
    /// Config validation error (bad threshold, zero batch size, etc.).
    Validation(String),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Parse(msg) => write!(f, "config parse error: {msg}"),
            Self::Validation(msg) => write!(f, "config validation error: {msg}"),
        }
    }
}

impl std::error::Error for ConfigError {}
