//! [`ComponentPath`] – identifies a component by its position in the robot's
//! component tree, e.g. `arm/shoulder/motor`.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::InvalidError;

const SEPARATOR: char = '/';

/// Ordered path segments from the robot root down to a component.
///
/// Serialised as its `/`-joined string form.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ComponentPath {
    segments: Vec<String>,
}

impl ComponentPath {
    /// Build a path from already-validated segments.
    ///
    /// # Errors
    ///
    /// Returns [`InvalidError::ComponentPath`] when there are no segments or a
    /// segment is empty or contains `/`.
    pub fn new<I, S>(segments: I) -> Result<Self, InvalidError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let segments: Vec<String> = segments.into_iter().map(Into::into).collect();
        if segments.is_empty() {
            return Err(InvalidError::ComponentPath {
                path: String::new(),
                reason: "path has no segments".to_string(),
            });
        }
        for segment in &segments {
            if segment.is_empty() || segment.contains(SEPARATOR) {
                return Err(InvalidError::ComponentPath {
                    path: segments.join("/"),
                    reason: format!("invalid segment {segment:?}"),
                });
            }
        }
        Ok(Self { segments })
    }

    /// Parse a `/`-separated path.  Leading and trailing separators are
    /// ignored.
    pub fn parse(raw: &str) -> Result<Self, InvalidError> {
        let trimmed = raw.trim().trim_matches(SEPARATOR);
        if trimmed.is_empty() {
            return Err(InvalidError::ComponentPath {
                path: raw.to_string(),
                reason: "path has no segments".to_string(),
            });
        }
        Self::new(trimmed.split(SEPARATOR))
    }

    /// Append a child segment.
    pub fn child(&self, segment: impl Into<String>) -> Result<Self, InvalidError> {
        let mut segments = self.segments.clone();
        segments.push(segment.into());
        Self::new(segments)
    }

    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    /// The final segment, i.e. the component's own name.
    pub fn name(&self) -> &str {
        // `new` guarantees at least one segment.
        self.segments.last().map(String::as_str).unwrap_or_default()
    }

    /// True when `self` is a strict ancestor of `other`.
    pub fn is_ancestor_of(&self, other: &ComponentPath) -> bool {
        other.segments.len() > self.segments.len()
            && other.segments[..self.segments.len()] == self.segments[..]
    }
}

impl fmt::Display for ComponentPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.segments.join("/"))
    }
}

impl FromStr for ComponentPath {
    type Err = InvalidError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for ComponentPath {
    type Error = InvalidError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<ComponentPath> for String {
    fn from(path: ComponentPath) -> Self {
        path.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_and_display_roundtrip() {
        let path = ComponentPath::parse("arm/shoulder/motor").unwrap();
        assert_eq!(path.segments().len(), 3);
        assert_eq!(path.name(), "motor");
        assert_eq!(path.to_string(), "arm/shoulder/motor");
    }

    #[test]
    fn parse_ignores_surrounding_separators() {
        let path: ComponentPath = "/base/left_wheel/".parse().unwrap();
        assert_eq!(path.to_string(), "base/left_wheel");
    }

    #[test]
    fn empty_path_is_rejected() {
        assert!(ComponentPath::parse("").is_err());
        assert!(ComponentPath::parse("///").is_err());
    }

    #[test]
    fn empty_inner_segment_is_rejected() {
        assert!(matches!(
            ComponentPath::parse("arm//motor"),
            Err(InvalidError::ComponentPath { .. })
        ));
    }

    #[test]
    fn child_extends_path() {
        let arm = ComponentPath::parse("arm").unwrap();
        let motor = arm.child("motor").unwrap();
        assert_eq!(motor.to_string(), "arm/motor");
        assert!(arm.is_ancestor_of(&motor));
        assert!(!motor.is_ancestor_of(&arm));
        assert!(!arm.is_ancestor_of(&arm));
    }

    #[test]
    fn child_rejects_separator() {
        let arm = ComponentPath::parse("arm").unwrap();
        assert!(arm.child("a/b").is_err());
    }

    #[test]
    fn serializes_as_string() {
        let path = ComponentPath::parse("gripper/relay").unwrap();
        let json = serde_json::to_string(&path).unwrap();
        assert_eq!(json, "\"gripper/relay\"");
        let back: ComponentPath = serde_json::from_str(&json).unwrap();
        assert_eq!(back, path);
        assert!(serde_json::from_str::<ComponentPath>("\"\"").is_err());
    }
}
