//! Per-component disarm status and the controller's registration table.
//!
//! ```text
//! Armed ──▶ Disarming ──▶ Disarmed
//!                    └──▶ DisarmFailed
//! ```
//!
//! Nothing in this module moves a component back to `Armed`.  A
//! `DisarmFailed` component may only re-enter `Disarming` through an explicit
//! single-component disarm request.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use ironclad_types::{ComponentPath, DisarmFailureReason, StateError};
use serde::{Deserialize, Serialize};

use crate::disarm::Disarm;

// ────────────────────────────────────────────────────────────────────────────
// Public types
// ────────────────────────────────────────────────────────────────────────────

/// Where a registered component is in the disarm lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ComponentStatus {
    Armed,
    Disarming,
    Disarmed,
    DisarmFailed,
}

impl ComponentStatus {
    /// Motion commands must be refused while any component reports `false`.
    pub fn is_armed(self) -> bool {
        self == ComponentStatus::Armed
    }
}

impl fmt::Display for ComponentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ComponentStatus::Armed => "armed",
            ComponentStatus::Disarming => "disarming",
            ComponentStatus::Disarmed => "disarmed",
            ComponentStatus::DisarmFailed => "disarm_failed",
        };
        f.write_str(s)
    }
}

/// Point-in-time copy of the registration table.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SafetyControllerState {
    pub armed_components: BTreeSet<ComponentPath>,
    pub disarmed_components: BTreeSet<ComponentPath>,
    pub in_flight: BTreeSet<ComponentPath>,
    /// Components whose last disarm attempt failed, with the reason.
    pub failed_components: BTreeMap<ComponentPath, DisarmFailureReason>,
}

impl SafetyControllerState {
    /// `true` when every registered component is armed.
    pub fn all_armed(&self) -> bool {
        self.disarmed_components.is_empty()
            && self.in_flight.is_empty()
            && self.failed_components.is_empty()
    }

    pub fn status_of(&self, path: &ComponentPath) -> Option<ComponentStatus> {
        if self.armed_components.contains(path) {
            Some(ComponentStatus::Armed)
        } else if self.in_flight.contains(path) {
            Some(ComponentStatus::Disarming)
        } else if self.disarmed_components.contains(path) {
            Some(ComponentStatus::Disarmed)
        } else if self.failed_components.contains_key(path) {
            Some(ComponentStatus::DisarmFailed)
        } else {
            None
        }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Registration table
// ────────────────────────────────────────────────────────────────────────────

pub(crate) struct Registration {
    capability: Arc<dyn Disarm>,
    timeout: Duration,
    status: ComponentStatus,
    failure: Option<DisarmFailureReason>,
}

/// What a disarm task needs to run.
pub(crate) struct DisarmTicket {
    pub(crate) capability: Arc<dyn Disarm>,
    pub(crate) timeout: Duration,
}

/// Registered components keyed by path.  Owned and mutated only by the
/// controller task.
#[derive(Default)]
pub(crate) struct RegistrationTable {
    entries: HashMap<ComponentPath, Registration>,
}

impl RegistrationTable {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Register `path` as armed.
    ///
    /// Re-registering an armed component replaces its capability and
    /// timeout.  Re-registering a component in any other status is refused,
    /// since it would re-arm it.
    pub(crate) fn register(
        &mut self,
        path: ComponentPath,
        capability: Arc<dyn Disarm>,
        timeout: Duration,
    ) -> Result<(), StateError> {
        match self.entries.get_mut(&path) {
            Some(entry) if entry.status.is_armed() => {
                entry.capability = capability;
                entry.timeout = timeout;
                Ok(())
            }
            Some(entry) => Err(StateError::InvalidTransition {
                component: path,
                from: entry.status.to_string(),
                to: ComponentStatus::Armed.to_string(),
            }),
            None => {
                self.entries.insert(
                    path,
                    Registration {
                        capability,
                        timeout,
                        status: ComponentStatus::Armed,
                        failure: None,
                    },
                );
                Ok(())
            }
        }
    }

    /// Remove `path`.  A component mid-disarm cannot be removed.
    pub(crate) fn deregister(&mut self, path: &ComponentPath) -> Result<(), StateError> {
        match self.entries.get(path).map(|e| e.status) {
            None => Err(StateError::UnknownComponent {
                component: path.clone(),
            }),
            Some(ComponentStatus::Disarming) => Err(StateError::InvalidTransition {
                component: path.clone(),
                from: ComponentStatus::Disarming.to_string(),
                to: "deregistered".to_string(),
            }),
            Some(_) => {
                self.entries.remove(path);
                Ok(())
            }
        }
    }

    pub(crate) fn status(&self, path: &ComponentPath) -> Option<ComponentStatus> {
        self.entries.get(path).map(|e| e.status)
    }

    pub(crate) fn failure(&self, path: &ComponentPath) -> Option<&DisarmFailureReason> {
        self.entries.get(path).and_then(|e| e.failure.as_ref())
    }

    /// Every path currently in `status`, sorted.
    pub(crate) fn paths_with(&self, status: ComponentStatus) -> Vec<ComponentPath> {
        let mut paths: Vec<_> = self
            .entries
            .iter()
            .filter(|(_, e)| e.status == status)
            .map(|(p, _)| p.clone())
            .collect();
        paths.sort();
        paths
    }

    /// Move `path` into `Disarming` and hand out what the disarm task needs.
    ///
    /// Allowed from `Armed` and from `DisarmFailed`.
    pub(crate) fn begin_disarm(&mut self, path: &ComponentPath) -> Result<DisarmTicket, StateError> {
        let entry = self
            .entries
            .get_mut(path)
            .ok_or_else(|| StateError::UnknownComponent {
                component: path.clone(),
            })?;
        match entry.status {
            ComponentStatus::Armed | ComponentStatus::DisarmFailed => {
                entry.status = ComponentStatus::Disarming;
                entry.failure = None;
                Ok(DisarmTicket {
                    capability: Arc::clone(&entry.capability),
                    timeout: entry.timeout,
                })
            }
            from @ (ComponentStatus::Disarming | ComponentStatus::Disarmed) => {
                Err(StateError::InvalidTransition {
                    component: path.clone(),
                    from: from.to_string(),
                    to: ComponentStatus::Disarming.to_string(),
                })
            }
        }
    }

    /// Record the outcome of a disarm task.  Returns the new status, or
    /// `None` when `path` is no longer registered.
    pub(crate) fn finish_disarm(
        &mut self,
        path: &ComponentPath,
        result: &Result<(), DisarmFailureReason>,
    ) -> Option<ComponentStatus> {
        let entry = self.entries.get_mut(path)?;
        match result {
            Ok(()) => {
                entry.status = ComponentStatus::Disarmed;
                entry.failure = None;
            }
            Err(reason) => {
                entry.status = ComponentStatus::DisarmFailed;
                entry.failure = Some(reason.clone());
            }
        }
        Some(entry.status)
    }

    pub(crate) fn snapshot(&self) -> SafetyControllerState {
        let mut state = SafetyControllerState::default();
        for (path, entry) in &self.entries {
            match entry.status {
                ComponentStatus::Armed => {
                    state.armed_components.insert(path.clone());
                }
                ComponentStatus::Disarming => {
                    state.in_flight.insert(path.clone());
                }
                ComponentStatus::Disarmed => {
                    state.disarmed_components.insert(path.clone());
                }
                ComponentStatus::DisarmFailed => {
                    let reason = entry
                        .failure
                        .clone()
                        .unwrap_or_else(|| DisarmFailureReason::Aborted("unknown".into()));
                    state.failed_components.insert(path.clone(), reason);
                }
            }
        }
        state
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::disarm::FnDisarm;

    fn path(s: &str) -> ComponentPath {
        ComponentPath::parse(s).unwrap()
    }

    fn ok_cap() -> Arc<dyn Disarm> {
        Arc::new(FnDisarm::new(|| Ok(())))
    }

    fn table_with(paths: &[&str]) -> RegistrationTable {
        let mut table = RegistrationTable::new();
        for p in paths {
            table
                .register(path(p), ok_cap(), Duration::from_millis(100))
                .unwrap();
        }
        table
    }

    #[test]
    fn registered_component_starts_armed() {
        let table = table_with(&["arm/shoulder"]);
        assert_eq!(table.status(&path("arm/shoulder")), Some(ComponentStatus::Armed));
        assert_eq!(table.status(&path("arm/elbow")), None);
    }

    #[test]
    fn disarm_lifecycle_success() {
        let mut table = table_with(&["arm/shoulder"]);
        let p = path("arm/shoulder");
        table.begin_disarm(&p).unwrap();
        assert_eq!(table.status(&p), Some(ComponentStatus::Disarming));
        assert_eq!(table.finish_disarm(&p, &Ok(())), Some(ComponentStatus::Disarmed));
    }

    #[test]
    fn failure_records_reason_and_allows_manual_retry() {
        let mut table = table_with(&["base/relay"]);
        let p = path("base/relay");
        table.begin_disarm(&p).unwrap();
        let reason = DisarmFailureReason::Rejected("contactor welded".into());
        table.finish_disarm(&p, &Err(reason.clone()));
        assert_eq!(table.status(&p), Some(ComponentStatus::DisarmFailed));
        assert_eq!(table.failure(&p), Some(&reason));

        table.begin_disarm(&p).unwrap();
        assert_eq!(table.failure(&p), None);
    }

    #[test]
    fn disarmed_component_cannot_begin_again() {
        let mut table = table_with(&["arm/shoulder"]);
        let p = path("arm/shoulder");
        table.begin_disarm(&p).unwrap();
        table.finish_disarm(&p, &Ok(()));
        assert!(matches!(
            table.begin_disarm(&p),
            Err(StateError::InvalidTransition { .. })
        ));
    }

    #[test]
    fn reregistering_disarmed_component_is_refused() {
        let mut table = table_with(&["arm/shoulder"]);
        let p = path("arm/shoulder");
        table.begin_disarm(&p).unwrap();
        table.finish_disarm(&p, &Ok(()));

        let err = table
            .register(p.clone(), ok_cap(), Duration::from_millis(100))
            .unwrap_err();
        assert!(matches!(err, StateError::InvalidTransition { ref to, .. } if to == "armed"));
        assert_eq!(table.status(&p), Some(ComponentStatus::Disarmed));
    }

    #[test]
    fn deregister_refused_while_disarming() {
        let mut table = table_with(&["arm/shoulder"]);
        let p = path("arm/shoulder");
        table.begin_disarm(&p).unwrap();
        assert!(table.deregister(&p).is_err());
        table.finish_disarm(&p, &Ok(()));
        table.deregister(&p).unwrap();
        assert_eq!(table.status(&p), None);
        assert!(matches!(
            table.deregister(&p),
            Err(StateError::UnknownComponent { .. })
        ));
    }

    #[test]
    fn finish_for_removed_component_is_ignored() {
        let mut table = RegistrationTable::new();
        assert_eq!(table.finish_disarm(&path("ghost"), &Ok(())), None);
    }

    #[test]
    fn snapshot_partitions_components() {
        let mut table = table_with(&["a", "b", "c", "d"]);
        table.begin_disarm(&path("b")).unwrap();
        table.begin_disarm(&path("c")).unwrap();
        table.finish_disarm(&path("c"), &Ok(()));
        table.begin_disarm(&path("d")).unwrap();
        table.finish_disarm(
            &path("d"),
            &Err(DisarmFailureReason::TimedOut { after_ms: 100 }),
        );

        let snap = table.snapshot();
        assert!(snap.armed_components.contains(&path("a")));
        assert!(snap.in_flight.contains(&path("b")));
        assert!(snap.disarmed_components.contains(&path("c")));
        assert_eq!(
            snap.failed_components.get(&path("d")),
            Some(&DisarmFailureReason::TimedOut { after_ms: 100 })
        );
        assert_eq!(snap.status_of(&path("b")), Some(ComponentStatus::Disarming));
        assert!(!snap.all_armed());
        assert_eq!(table.paths_with(ComponentStatus::Armed), vec![path("a")]);
    }
}
