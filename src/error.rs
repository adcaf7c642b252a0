//! Error handling for motionvis-rs
//!
//! This module defines the error taxonomy and a Result alias used
//! throughout the crate.

use thiserror::Error;

/// Main error type for motionvis-rs operations
#[derive(Error, Debug)]
pub enum MotionVisError {
    /// A sample carried the wrong number of channel values
    #[error("Arity error: expected {expected} channel values, got {actual}")]
    Arity { expected: usize, actual: usize },

    /// A channel name did not resolve against the channel set
    #[error("Unknown channel: {0}")]
    UnknownChannel(String),

    /// Errors related to configuration loading/saving/validation
    #[error("Configuration error: {0}")]
    Config(String),

    /// Errors related to parsing incoming sample data
    #[error("Parse error: {0}")]
    Parse(String),

    /// A sink failed to persist a flushed window
    #[error("Sink error: {0}")]
    Sink(String),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Generic errors with context
    #[error("{context}: {source}")]
    WithContext {
        context: String,
        #[source]
        source: Box<MotionVisError>,
    },
}

impl MotionVisError {
    /// Add context to an error
    pub fn with_context(self, context: impl Into<String>) -> Self {
        MotionVisError::WithContext {
            context: context.into(),
            source: Box::new(self),
        }
    }

    /// Whether this error (or the error it wraps) is an arity mismatch
    pub fn is_arity(&self) -> bool {
        match self {
            MotionVisError::Arity { .. } => true,
            MotionVisError::WithContext { source, .. } => source.is_arity(),
            _ => false,
        }
    }
}

impl From<serde_json::Error> for MotionVisError {
    fn from(err: serde_json::Error) -> Self {
        MotionVisError::Serialization(err.to_string())
    }
}

/// Result type alias for motionvis-rs operations
pub type Result<T> = std::result::Result<T, MotionVisError>;

/// Extension trait for adding context to Results
pub trait ResultExt<T> {
    /// Add context to an error result
    fn context(self, context: impl Into<String>) -> Result<T>;

    /// Add context lazily to an error result
    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String;
}

impl<T> ResultExt<T> for Result<T> {
    fn context(self, context: impl Into<String>) -> Result<T> {
        self.map_err(|e| e.with_context(context))
    }

    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String,
    {
        self.map_err(|e| e.with_context(f()))
    }
}

impl<T> ResultExt<T> for std::result::Result<T, std::io::Error> {
    fn context(self, context: impl Into<String>) -> Result<T> {
        self.map_err(|e| MotionVisError::Io(e).with_context(context))
    }

    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String,
    {
        self.map_err(|e| MotionVisError::Io(e).with_context(f()))
    }
}
