//! `ironclad-types` – shared vocabulary of the Ironclad safety stack.
//!
//! - [`severity`] – [`Severity`], [`ErrorClass`] and the [`Classified`]
//!   contract every error implements.
//! - [`error`] – the closed error taxonomy gathered under [`RobotError`].
//! - [`path`] – [`ComponentPath`], a component's location in the robot tree.
//!
//! [`ErrorRecord`] is the envelope routed over the error intake bus.

pub mod error;
pub mod path;
pub mod severity;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub use error::{
    CategoryError, DisarmFailure, DisarmFailureReason, HardwareError, InvalidError,
    KinematicsError, ProtocolError, RobotError, SafetyError, StateError,
};
pub use path::ComponentPath;
pub use severity::{Classified, ErrorClass, Propagation, Severity};

/// An error raised somewhere in the component tree, as published on the
/// intake bus.
///
/// The record carries no severity of its own; [`Classified::severity`]
/// always defers to the wrapped [`RobotError`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorRecord {
    pub id: Uuid,
    pub timestamp: DateTime<Utc>,
    /// The component that raised the error.
    pub source: ComponentPath,
    pub error: RobotError,
}

impl ErrorRecord {
    /// Stamp a new record raised by `source`.
    pub fn new(source: ComponentPath, error: impl Into<RobotError>) -> Self {
        Self {
            id: Uuid::new_v4(),
            timestamp: Utc::now(),
            source,
            error: error.into(),
        }
    }
}

impl Classified for ErrorRecord {
    fn class(&self) -> ErrorClass {
        self.error.class()
    }

    fn severity(&self) -> Severity {
        self.error.severity()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn record_defers_to_wrapped_error() {
        let source = ComponentPath::parse("cli").unwrap();
        let record = ErrorRecord::new(
            source.clone(),
            SafetyError::EmergencyStop {
                reason: "operator Ctrl-C".into(),
            },
        );
        assert_eq!(record.source, source);
        assert_eq!(record.class(), ErrorClass::Safety);
        assert_eq!(record.severity(), Severity::Critical);
    }

    #[test]
    fn record_roundtrip() {
        let record = ErrorRecord::new(
            ComponentPath::parse("base/left_wheel").unwrap(),
            HardwareError::CommunicationLost {
                component: "left_wheel".into(),
            },
        );
        let json = serde_json::to_string(&record).unwrap();
        let back: ErrorRecord = serde_json::from_str(&json).unwrap();
        assert_eq!(back.id, record.id);
        assert_eq!(back.source, record.source);
        assert_eq!(back.error, record.error);
        assert_eq!(back.severity(), Severity::Error);
    }
}
