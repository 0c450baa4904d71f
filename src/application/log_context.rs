//! Structured log fields passed explicitly through a request

use std::fmt;
use tracing::{error, info, warn};

/// Key/value pairs attached to every log line of one operation
#[derive(Debug, Clone, Default)]
pub struct LogContext {
    fields: Vec<(&'static str, String)>,
}

impl LogContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a field. Empty values are skipped.
    pub fn with(mut self, key: &'static str, value: impl fmt::Display) -> Self {
        let value = value.to_string();
        if !value.is_empty() {
            self.fields.push((key, value));
        }
        self
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.fields
            .iter()
            .rev()
            .find(|(k, _)| *k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn info(&self, message: &str) {
        info!(fields = %self, "{}", message);
    }

    pub fn warn(&self, message: &str, err: &dyn fmt::Display) {
        warn!(fields = %self, error = %err, "{}", message);
    }

    pub fn error(&self, message: &str, err: &dyn fmt::Display) {
        error!(fields = %self, error = %err, "{}", message);
    }
}

impl fmt::Display for LogContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, (key, value)) in self.fields.iter().enumerate() {
            if i > 0 {
                f.write_str(" ")?;
            }
            write!(f, "{}={:?}", key, value)?;
        }
        Ok(())
    }
}
