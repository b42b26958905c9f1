//! Severity classification shared by every error in Ironclad.
//!
//! Each error kind reports an [`ErrorClass`] and a [`Severity`] through the
//! [`Classified`] trait.  Implementations use exhaustive `match` expressions
//! with no wildcard arm, so adding a new kind without deciding its severity
//! is a compile error.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Ordered urgency of an error.
///
/// The derived ordering follows declaration order, giving
/// `Warning < Error < Critical`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// Benign or self-resolving condition. Logged, never interrupts the caller.
    Warning,
    /// The local operation failed; the caller may retry or degrade.
    Error,
    /// Must be surfaced to the safety controller, never handled locally.
    Critical,
}

impl Severity {
    /// The propagation policy attached to this severity.
    pub fn propagation(self) -> Propagation {
        match self {
            Severity::Warning => Propagation::LogAndContinue,
            Severity::Error => Propagation::FailOperation,
            Severity::Critical => Propagation::Escalate,
        }
    }

    pub fn is_critical(self) -> bool {
        self == Severity::Critical
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Warning => write!(f, "warning"),
            Severity::Error => write!(f, "error"),
            Severity::Critical => write!(f, "critical"),
        }
    }
}

/// What the code that observes an error is expected to do with it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Propagation {
    /// Log the error and carry on with the current operation.
    LogAndContinue,
    /// Abort the local operation and hand the error to the caller.
    FailOperation,
    /// Publish the error to the safety controller's intake.
    Escalate,
}

/// Top-level family an error belongs to.  Every error value has exactly one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ErrorClass {
    Hardware,
    Safety,
    Kinematics,
    Invalid,
    State,
    Category,
    Protocol,
}

impl fmt::Display for ErrorClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ErrorClass::Hardware => "hardware",
            ErrorClass::Safety => "safety",
            ErrorClass::Kinematics => "kinematics",
            ErrorClass::Invalid => "invalid",
            ErrorClass::State => "state",
            ErrorClass::Category => "category",
            ErrorClass::Protocol => "protocol",
        };
        f.write_str(name)
    }
}

/// The contract every error type in the system satisfies.
pub trait Classified {
    /// The class this error belongs to.
    fn class(&self) -> ErrorClass;

    /// The urgency of this particular error value.
    fn severity(&self) -> Severity;
}
