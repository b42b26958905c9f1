//! [`CollisionMonitor`] – turns geometric contacts into classified errors.
//!
//! The monitor holds the current world-space [`Shape`] of each named body and
//! a list of watched pairs.  Every [`scan`][CollisionMonitor::scan] runs
//! [`test_with_margin_and`] on each pair and wraps hits into error records:
//!
//! | [`PairKind`] | Raised error | Severity |
//! |---|---|---|
//! | `Environment` | [`SafetyError::CollisionRisk`] | `Critical` |
//! | `SelfCollision` | [`KinematicsError::SelfCollision`] | `Warning` |
//!
//! Publishing an environment hit on the [`ErrorBus`] is what makes the safety
//! controller disarm the robot.

use std::collections::HashMap;

use ironclad_collision::{
    CollisionResult, LocalShape, Pose, Shape, Tolerances, test_with_margin_and,
};
use ironclad_middleware::{BusError, ErrorBus};
use ironclad_types::{ComponentPath, ErrorRecord, KinematicsError, SafetyError, StateError};
use serde::{Deserialize, Serialize};
use tracing::debug;

// ────────────────────────────────────────────────────────────────────────────
// Public types
// ────────────────────────────────────────────────────────────────────────────

/// How a contact between two watched bodies is classified.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PairKind {
    /// Robot against its surroundings.  A contact is a safety hazard.
    #[default]
    Environment,
    /// Two links of the same robot.  Tolerable, reported as a warning.
    SelfCollision,
}

/// A pair of bodies tested on every scan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WatchedPair {
    pub first: ComponentPath,
    pub second: ComponentPath,
    /// Extra clearance added to both shapes.  Non-positive means none.
    #[serde(default)]
    pub margin: f64,
    #[serde(default)]
    pub kind: PairKind,
}

/// One body of a [`SceneConfig`], placed in its own frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BodyConfig {
    pub path: ComponentPath,
    pub shape: LocalShape,
    #[serde(default)]
    pub pose: Pose,
}

/// Declarative description of a monitored scene, as loaded from TOML.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SceneConfig {
    #[serde(default)]
    pub bodies: Vec<BodyConfig>,
    #[serde(default)]
    pub pairs: Vec<WatchedPair>,
    #[serde(default)]
    pub tolerances: Tolerances,
}

// ────────────────────────────────────────────────────────────────────────────
// CollisionMonitor
// ────────────────────────────────────────────────────────────────────────────

/// Watches body pairs for contact.
///
/// # Example
///
/// ```
/// use ironclad_collision::{Shape, Vec3};
/// use ironclad_kernel::collision_monitor::{CollisionMonitor, PairKind};
/// use ironclad_types::{Classified, ComponentPath, Severity};
///
/// let gripper = ComponentPath::parse("arm/gripper").unwrap();
/// let table = ComponentPath::parse("world/table").unwrap();
///
/// let mut monitor = CollisionMonitor::new(ComponentPath::parse("monitor").unwrap());
/// monitor.update_body(gripper.clone(), Shape::sphere(Vec3::new(0.0, 0.0, 0.05), 0.1));
/// monitor.update_body(table.clone(), Shape::sphere(Vec3::ZERO, 0.1));
/// monitor.watch(gripper, table, 0.0, PairKind::Environment).unwrap();
///
/// let records = monitor.scan();
/// assert_eq!(records.len(), 1);
/// assert_eq!(records[0].severity(), Severity::Critical);
/// ```
pub struct CollisionMonitor {
    source: ComponentPath,
    bodies: HashMap<ComponentPath, Shape>,
    pairs: Vec<WatchedPair>,
    tolerances: Tolerances,
}

impl CollisionMonitor {
    /// Create an empty monitor.  Records it raises carry `source`.
    pub fn new(source: ComponentPath) -> Self {
        Self {
            source,
            bodies: HashMap::new(),
            pairs: Vec::new(),
            tolerances: Tolerances::default(),
        }
    }

    /// Build a monitor from a scene description, placing every body at its
    /// configured pose.
    ///
    /// # Errors
    ///
    /// [`StateError::UnknownComponent`] when a pair names a body the scene
    /// does not declare.
    pub fn from_config(source: ComponentPath, scene: &SceneConfig) -> Result<Self, StateError> {
        let mut monitor = Self::new(source).with_tolerances(scene.tolerances);
        for body in &scene.bodies {
            monitor.update_body(body.path.clone(), body.shape.to_world(&body.pose));
        }
        for pair in &scene.pairs {
            monitor.watch(
                pair.first.clone(),
                pair.second.clone(),
                pair.margin,
                pair.kind,
            )?;
        }
        Ok(monitor)
    }

    pub fn with_tolerances(mut self, tolerances: Tolerances) -> Self {
        self.tolerances = tolerances;
        self
    }

    /// Insert or replace the world-space shape of `path`.
    pub fn update_body(&mut self, path: ComponentPath, shape: Shape) {
        self.bodies.insert(path, shape);
    }

    /// Remove a body.  Pairs naming it are skipped until it is added back.
    pub fn remove_body(&mut self, path: &ComponentPath) -> Option<Shape> {
        self.bodies.remove(path)
    }

    /// Start watching `first` against `second`.
    ///
    /// # Errors
    ///
    /// [`StateError::UnknownComponent`] when either body is unknown.
    pub fn watch(
        &mut self,
        first: ComponentPath,
        second: ComponentPath,
        margin: f64,
        kind: PairKind,
    ) -> Result<(), StateError> {
        for path in [&first, &second] {
            if !self.bodies.contains_key(path) {
                return Err(StateError::UnknownComponent {
                    component: path.clone(),
                });
            }
        }
        self.pairs.push(WatchedPair {
            first,
            second,
            margin,
            kind,
        });
        Ok(())
    }

    /// Test every watched pair and return one record per contact.
    pub fn scan(&self) -> Vec<ErrorRecord> {
        self.pairs
            .iter()
            .filter_map(|pair| {
                let (Some(a), Some(b)) = (self.bodies.get(&pair.first), self.bodies.get(&pair.second))
                else {
                    debug!(first = %pair.first, second = %pair.second, "pair skipped, body missing");
                    return None;
                };
                match test_with_margin_and(a, b, pair.margin, &self.tolerances) {
                    CollisionResult::NoCollision => None,
                    CollisionResult::Collision { penetration_depth } => {
                        debug!(
                            first = %pair.first,
                            second = %pair.second,
                            penetration_depth,
                            kind = ?pair.kind,
                            "contact detected"
                        );
                        Some(self.record(pair, penetration_depth))
                    }
                }
            })
            .collect()
    }

    /// [`scan`][Self::scan] and publish every record on `bus`.
    ///
    /// Returns the number of records published.
    ///
    /// # Errors
    ///
    /// [`BusError::NoSubscribers`] for the first record nobody received.
    pub fn scan_and_publish(&self, bus: &ErrorBus) -> Result<usize, BusError> {
        let records = self.scan();
        let count = records.len();
        for record in records {
            bus.publish(record)?;
        }
        Ok(count)
    }

    fn record(&self, pair: &WatchedPair, penetration_depth: f64) -> ErrorRecord {
        let first = pair.first.clone();
        let second = pair.second.clone();
        match pair.kind {
            PairKind::Environment => ErrorRecord::new(
                self.source.clone(),
                SafetyError::CollisionRisk {
                    first,
                    second,
                    penetration_depth,
                },
            ),
            PairKind::SelfCollision => ErrorRecord::new(
                self.source.clone(),
                KinematicsError::SelfCollision {
                    first,
                    second,
                    penetration_depth,
                },
            ),
        }
    }
}
