//! # Handler Outcomes
//!
//! Error type returned by task handlers. Besides ordinary failures it carries the
//! two non-failure outcomes the task runner understands:
//! - `Retry`: run the handler again later, leaving the status untouched
//! - `Wait`: pause the task without failing it

use crate::error::StewardError;
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum HandlerError {
    #[error("task should be retried{}", retry_suffix(.after, .reason))]
    Retry {
        after: Option<Duration>,
        reason: String,
    },

    #[error("task set to wait: {reason}")]
    Wait { reason: String },

    #[error("{0}")]
    Failed(#[from] anyhow::Error),
}

fn retry_suffix(after: &Option<Duration>, reason: &str) -> String {
    match (after, reason.is_empty()) {
        (Some(after), true) => format!(" after {after:?}"),
        (Some(after), false) => format!(" after {after:?}: {reason}"),
        (None, false) => format!(": {reason}"),
        (None, true) => String::new(),
    }
}

impl HandlerError {
    /// Retry on the next pass that finds the task ready
    pub fn retry() -> Self {
        Self::Retry {
            after: None,
            reason: String::new(),
        }
    }

    pub fn retry_after(after: Duration, reason: impl Into<String>) -> Self {
        Self::Retry {
            after: Some(after),
            reason: reason.into(),
        }
    }

    pub fn wait(reason: impl Into<String>) -> Self {
        Self::Wait {
            reason: reason.into(),
        }
    }

    pub fn failed(message: impl std::fmt::Display) -> Self {
        Self::Failed(anyhow::anyhow!("{message}"))
    }

    pub fn is_retry(&self) -> bool {
        matches!(self, Self::Retry { .. })
    }

    pub fn is_wait(&self) -> bool {
        matches!(self, Self::Wait { .. })
    }
}

impl From<StewardError> for HandlerError {
    fn from(err: StewardError) -> Self {
        Self::Failed(anyhow::Error::new(err))
    }
}

pub type HandlerResult = Result<(), HandlerError>;
