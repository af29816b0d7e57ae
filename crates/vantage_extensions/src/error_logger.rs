//! Structured error reporting with a short in-memory history.

use parking_lot::Mutex;
use std::collections::VecDeque;
use std::error::Error;
use tracing::{error, warn};
use vantage_extension_api::current_timestamp_millis;

/// Records kept by [`ErrorLogger::recent`].
pub const HISTORY_CAPACITY: usize = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorLevel {
    Critical,
    Error,
    Warn,
}

impl std::fmt::Display for ErrorLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            ErrorLevel::Critical => "CRITICAL",
            ErrorLevel::Error => "ERROR",
            ErrorLevel::Warn => "WARN",
        })
    }
}

/// Items an error relates to and what an operator can do about it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ErrorContext {
    pub related: Vec<String>,
    pub what_to_do: Option<String>,
}

impl ErrorContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn related(mut self, item: impl ToString) -> Self {
        self.related.push(item.to_string());
        self
    }

    pub fn what_to_do(mut self, advice: impl Into<String>) -> Self {
        self.what_to_do = Some(advice.into());
        self
    }
}

/// A logged error as kept in the history.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorRecord {
    pub level: ErrorLevel,
    pub message: String,
    pub context: ErrorContext,
    pub logged_at: i64,
}

#[derive(Debug, Default)]
pub struct ErrorLogger {
    history: Mutex<VecDeque<ErrorRecord>>,
}

impl ErrorLogger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn log(&self, level: ErrorLevel, err: &dyn Error, context: ErrorContext) {
        let message = err.to_string();
        let related = context.related.join(", ");
        let what_to_do = context.what_to_do.as_deref().unwrap_or("-");
        match level {
            ErrorLevel::Critical | ErrorLevel::Error => {
                error!(severity = %level, related = %related, what_to_do = %what_to_do, "{}", message)
            }
            ErrorLevel::Warn => {
                warn!(related = %related, what_to_do = %what_to_do, "{}", message)
            }
        }

        let mut history = self.history.lock();
        if history.len() == HISTORY_CAPACITY {
            history.pop_front();
        }
        history.push_back(ErrorRecord {
            level,
            message,
            context,
            logged_at: current_timestamp_millis(),
        });
    }

    /// Logged errors, oldest first.
    pub fn recent(&self) -> Vec<ErrorRecord> {
        self.history.lock().iter().cloned().collect()
    }

    pub fn count(&self) -> usize {
        self.history.lock().len()
    }
}
