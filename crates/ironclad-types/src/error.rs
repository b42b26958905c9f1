//! Closed error taxonomy.
//!
//! One enum per [`ErrorClass`], gathered under [`RobotError`].  Severity is
//! never stored: each kind computes it in [`Classified::severity`].
//! [`SafetyError`] has no severity input at all and always reports
//! [`Severity::Critical`].

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::path::ComponentPath;
use crate::severity::{Classified, ErrorClass, Severity};

// ────────────────────────────────────────────────────────────────────────────
// Hardware
// ────────────────────────────────────────────────────────────────────────────

#[derive(Error, Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum HardwareError {
    #[error("Hardware Fault on {component} (code {code}): {details}")]
    Fault {
        component: String,
        code: u32,
        details: String,
    },

    #[error("Lost communication with {component}")]
    CommunicationLost { component: String },

    #[error("{component} timed out during {operation}")]
    Timeout { component: String, operation: String },

    #[error("{component} degraded: {details}")]
    Degraded { component: String, details: String },
}

impl Classified for HardwareError {
    fn class(&self) -> ErrorClass {
        ErrorClass::Hardware
    }

    fn severity(&self) -> Severity {
        match self {
            HardwareError::Fault { .. }
            | HardwareError::CommunicationLost { .. }
            | HardwareError::Timeout { .. } => Severity::Error,
            HardwareError::Degraded { .. } => Severity::Warning,
        }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Safety
// ────────────────────────────────────────────────────────────────────────────

/// Why a single component failed to disarm.
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum DisarmFailureReason {
    /// The component's disarm operation reported an error.
    #[error("disarm rejected: {0}")]
    Rejected(String),

    /// The disarm operation did not finish before its deadline.
    #[error("disarm timed out after {after_ms} ms")]
    TimedOut { after_ms: u64 },

    /// The disarm operation panicked or its task was cancelled.
    #[error("disarm task aborted: {0}")]
    Aborted(String),
}

/// One entry of an aggregate [`SafetyError::DisarmFailed`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DisarmFailure {
    pub component: ComponentPath,
    pub reason: DisarmFailureReason,
}

impl fmt::Display for DisarmFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.component, self.reason)
    }
}

/// Safety-class errors.  Always [`Severity::Critical`].
#[derive(Error, Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum SafetyError {
    #[error("Collision risk between {first} and {second} (penetration {penetration_depth:.4} m)")]
    CollisionRisk {
        first: ComponentPath,
        second: ComponentPath,
        penetration_depth: f64,
    },

    #[error("{component} exceeded its {quantity} limit: {value} > {limit}")]
    LimitViolation {
        component: ComponentPath,
        quantity: String,
        value: f64,
        limit: f64,
    },

    #[error("Emergency stop requested: {reason}")]
    EmergencyStop { reason: String },

    #[error("Disarm failed for {} component(s); manual intervention required: {}", .failures.len(), join_failures(.failures))]
    DisarmFailed { failures: Vec<DisarmFailure> },
}

fn join_failures(failures: &[DisarmFailure]) -> String {
    failures
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

impl SafetyError {
    /// The fixed severity of every safety-class error.
    pub const SEVERITY: Severity = Severity::Critical;
}

impl Classified for SafetyError {
    fn class(&self) -> ErrorClass {
        ErrorClass::Safety
    }

    fn severity(&self) -> Severity {
        Self::SEVERITY
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Kinematics
// ────────────────────────────────────────────────────────────────────────────

#[derive(Error, Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum KinematicsError {
    #[error("Target unreachable for chain {chain}: {details}")]
    Unreachable { chain: String, details: String },

    #[error("IK for chain {chain} did not converge after {iterations} iterations")]
    NoConvergence { chain: String, iterations: u32 },

    #[error("Chain {chain} is near a singularity (condition number {condition:.1})")]
    NearSingularity { chain: String, condition: f64 },

    #[error("Self-collision between {first} and {second} (penetration {penetration_depth:.4} m)")]
    SelfCollision {
        first: ComponentPath,
        second: ComponentPath,
        penetration_depth: f64,
    },
}

impl Classified for KinematicsError {
    fn class(&self) -> ErrorClass {
        ErrorClass::Kinematics
    }

    fn severity(&self) -> Severity {
        match self {
            KinematicsError::Unreachable { .. } | KinematicsError::NoConvergence { .. } => {
                Severity::Error
            }
            KinematicsError::NearSingularity { .. } | KinematicsError::SelfCollision { .. } => {
                Severity::Warning
            }
        }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Invalid input
// ────────────────────────────────────────────────────────────────────────────

#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum InvalidError {
    #[error("Invalid parameter {name}: {reason}")]
    Parameter { name: String, reason: String },

    #[error("Invalid command {command}: {reason}")]
    Command { command: String, reason: String },

    #[error("Invalid component path {path:?}: {reason}")]
    ComponentPath { path: String, reason: String },
}

impl Classified for InvalidError {
    fn class(&self) -> ErrorClass {
        ErrorClass::Invalid
    }

    fn severity(&self) -> Severity {
        match self {
            InvalidError::Parameter { .. }
            | InvalidError::Command { .. }
            | InvalidError::ComponentPath { .. } => Severity::Error,
        }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// State
// ────────────────────────────────────────────────────────────────────────────

#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum StateError {
    #[error("{component} is not armed")]
    NotArmed { component: ComponentPath },

    #[error("{component} cannot move from {from} to {to}")]
    InvalidTransition {
        component: ComponentPath,
        from: String,
        to: String,
    },

    #[error("{component} is not registered")]
    UnknownComponent { component: ComponentPath },

    #[error("Safety controller is not running")]
    ControllerStopped,
}

impl Classified for StateError {
    fn class(&self) -> ErrorClass {
        ErrorClass::State
    }

    fn severity(&self) -> Severity {
        match self {
            StateError::NotArmed { .. }
            | StateError::InvalidTransition { .. }
            | StateError::UnknownComponent { .. }
            | StateError::ControllerStopped => Severity::Error,
        }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Category
// ────────────────────────────────────────────────────────────────────────────

#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum CategoryError {
    #[error("{component} is a {found}, expected a {expected}")]
    Mismatch {
        component: ComponentPath,
        expected: String,
        found: String,
    },

    #[error("Unknown component category {category:?}")]
    Unknown { category: String },
}

impl Classified for CategoryError {
    fn class(&self) -> ErrorClass {
        ErrorClass::Category
    }

    fn severity(&self) -> Severity {
        match self {
            CategoryError::Mismatch { .. } | CategoryError::Unknown { .. } => Severity::Error,
        }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Protocol
// ────────────────────────────────────────────────────────────────────────────

#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProtocolError {
    #[error("Failed to decode {message}: {details}")]
    Decode { message: String, details: String },

    #[error("Unsupported message {message}")]
    Unsupported { message: String },

    #[error("Message {message} is deprecated")]
    Deprecated { message: String },
}

impl Classified for ProtocolError {
    fn class(&self) -> ErrorClass {
        ErrorClass::Protocol
    }

    fn severity(&self) -> Severity {
        match self {
            ProtocolError::Decode { .. } | ProtocolError::Unsupported { .. } => Severity::Error,
            ProtocolError::Deprecated { .. } => Severity::Warning,
        }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// RobotError
// ────────────────────────────────────────────────────────────────────────────

/// Global error type spanning every class.
#[derive(Error, Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "class", content = "kind", rename_all = "lowercase")]
pub enum RobotError {
    #[error(transparent)]
    Hardware(#[from] HardwareError),

    #[error(transparent)]
    Safety(#[from] SafetyError),

    #[error(transparent)]
    Kinematics(#[from] KinematicsError),

    #[error(transparent)]
    Invalid(#[from] InvalidError),

    #[error(transparent)]
    State(#[from] StateError),

    #[error(transparent)]
    Category(#[from] CategoryError),

    #[error(transparent)]
    Protocol(#[from] ProtocolError),
}

impl Classified for RobotError {
    fn class(&self) -> ErrorClass {
        match self {
            RobotError::Hardware(e) => e.class(),
            RobotError::Safety(e) => e.class(),
            RobotError::Kinematics(e) => e.class(),
            RobotError::Invalid(e) => e.class(),
            RobotError::State(e) => e.class(),
            RobotError::Category(e) => e.class(),
            RobotError::Protocol(e) => e.class(),
        }
    }

    fn severity(&self) -> Severity {
        match self {
            RobotError::Hardware(e) => e.severity(),
            RobotError::Safety(e) => e.severity(),
            RobotError::Kinematics(e) => e.severity(),
            RobotError::Invalid(e) => e.severity(),
            RobotError::State(e) => e.severity(),
            RobotError::Category(e) => e.severity(),
            RobotError::Protocol(e) => e.severity(),
        }
    }
}
