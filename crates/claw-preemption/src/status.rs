//! Outcome of a filter, extension hook or victim selection.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::PreemptionError;

/// Outcome class.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum StatusCode {
    /// The operation succeeded.
    #[default]
    Success,
    /// An internal failure.
    Error,
    /// The workload does not fit, but changes on the node may help.
    Unschedulable,
    /// The workload does not fit and no change on the node will help.
    UnschedulableAndUnresolvable,
}

impl StatusCode {
    /// Returns the conventional spelling.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Success => "Success",
            Self::Error => "Error",
            Self::Unschedulable => "Unschedulable",
            Self::UnschedulableAndUnresolvable => "UnschedulableAndUnresolvable",
        }
    }
}

impl fmt::Display for StatusCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A status code with human-readable reasons.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Status {
    code: StatusCode,
    reasons: Vec<String>,
}

impl Status {
    /// Creates a status with one reason.
    #[must_use]
    pub fn new(code: StatusCode, reason: impl Into<String>) -> Self {
        Self {
            code,
            reasons: vec![reason.into()],
        }
    }

    /// A success status.
    #[must_use]
    pub const fn success() -> Self {
        Self {
            code: StatusCode::Success,
            reasons: Vec::new(),
        }
    }

    /// An `Unschedulable` status.
    #[must_use]
    pub fn unschedulable(reason: impl Into<String>) -> Self {
        Self::new(StatusCode::Unschedulable, reason)
    }

    /// Appends a reason.
    #[must_use]
    pub fn with_reason(mut self, reason: impl Into<String>) -> Self {
        self.reasons.push(reason.into());
        self
    }

    /// Wraps an error into an `Error` status.
    #[must_use]
    pub fn from_error(err: &PreemptionError) -> Self {
        Self::new(StatusCode::Error, err.to_string())
    }

    /// Returns the code.
    #[must_use]
    pub const fn code(&self) -> StatusCode {
        self.code
    }

    /// Returns the reasons.
    #[must_use]
    pub fn reasons(&self) -> &[String] {
        &self.reasons
    }

    /// Returns the reasons joined into one message.
    #[must_use]
    pub fn message(&self) -> String {
        self.reasons.join(", ")
    }

    /// Returns true for `Success`.
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.code == StatusCode::Success
    }

    /// Converts a non-success status into an error.
    #[must_use]
    pub fn as_error(&self) -> Option<PreemptionError> {
        (!self.is_success()).then(|| PreemptionError::Extension {
            reason: format!("{}: {}", self.code, self.message()),
        })
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.reasons.is_empty() {
            write!(f, "{}", self.code)
        } else {
            write!(f, "{}: {}", self.code, self.message())
        }
    }
}
