//! Simulated world for headless runs: the configured scene plus constant
//! velocity motions, scanned once per cycle.

use std::collections::{HashMap, HashSet};
use std::time::Duration;

use ironclad_collision::{LocalShape, Pose, Vec3};
use ironclad_kernel::{CollisionMonitor, SceneConfig};
use ironclad_middleware::{BusError, ErrorBus};
use ironclad_types::{ComponentPath, ErrorRecord, KinematicsError, RobotError, SafetyError, StateError};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

/// A body drifting at a constant velocity (m/s) until the robot is disarmed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Motion {
    pub path: ComponentPath,
    pub velocity: Vec3,
}

type ContactKey = (ComponentPath, ComponentPath);

pub struct SimulatedScene {
    monitor: CollisionMonitor,
    bodies: HashMap<ComponentPath, (LocalShape, Pose)>,
    motions: Vec<Motion>,
    contacts: HashSet<ContactKey>,
    halted: bool,
}

impl SimulatedScene {
    /// # Errors
    ///
    /// [`StateError::UnknownComponent`] when a watched pair or a motion names
    /// a body the scene does not declare.
    pub fn new(
        source: ComponentPath,
        scene: &SceneConfig,
        motions: Vec<Motion>,
    ) -> Result<Self, StateError> {
        let monitor = CollisionMonitor::from_config(source, scene)?;
        let bodies: HashMap<_, _> = scene
            .bodies
            .iter()
            .map(|b| (b.path.clone(), (b.shape, b.pose)))
            .collect();
        if let Some(m) = motions.iter().find(|m| !bodies.contains_key(&m.path)) {
            return Err(StateError::UnknownComponent {
                component: m.path.clone(),
            });
        }
        Ok(Self {
            monitor,
            bodies,
            motions,
            contacts: HashSet::new(),
            halted: false,
        })
    }

    /// Advance every moving body by `dt`.  No-op once halted.
    pub fn step(&mut self, dt: Duration) {
        if self.halted {
            return;
        }
        let secs = dt.as_secs_f64();
        for motion in &self.motions {
            if let Some((shape, pose)) = self.bodies.get_mut(&motion.path) {
                pose.translation += motion.velocity * secs;
                self.monitor
                    .update_body(motion.path.clone(), shape.to_world(pose));
            }
        }
    }

    /// Freeze every motion; the drives that produced it are disarmed.
    pub fn halt(&mut self) {
        if !self.halted {
            info!(motions = self.motions.len(), "scene motion halted");
        }
        self.halted = true;
    }

    pub fn is_halted(&self) -> bool {
        self.halted
    }

    pub fn pose(&self, path: &ComponentPath) -> Option<Pose> {
        self.bodies.get(path).map(|(_, pose)| *pose)
    }

    /// Records for contacts that started since the previous scan.
    ///
    /// A pair that stays in contact is reported once; it is reported again
    /// only after it separates and touches anew.
    pub fn scan_new_contacts(&mut self) -> Vec<ErrorRecord> {
        let records = self.monitor.scan();
        let current: HashSet<ContactKey> = records.iter().filter_map(contact_key).collect();
        let fresh: Vec<ErrorRecord> = records
            .into_iter()
            .filter(|r| contact_key(r).is_some_and(|key| !self.contacts.contains(&key)))
            .collect();
        for ended in self.contacts.difference(&current) {
            debug!(first = %ended.0, second = %ended.1, "contact cleared");
        }
        self.contacts = current;
        fresh
    }

    /// [`scan_new_contacts`][Self::scan_new_contacts] and publish them.
    ///
    /// # Errors
    ///
    /// [`BusError::NoSubscribers`] for the first record nobody received.
    pub fn publish_new_contacts(&mut self, bus: &ErrorBus) -> Result<usize, BusError> {
        let records = self.scan_new_contacts();
        let count = records.len();
        for record in records {
            bus.publish(record)?;
        }
        Ok(count)
    }
}

fn contact_key(record: &ErrorRecord) -> Option<ContactKey> {
    match &record.error {
        RobotError::Safety(SafetyError::CollisionRisk { first, second, .. })
        | RobotError::Kinematics(KinematicsError::SelfCollision { first, second, .. }) => {
            Some((first.clone(), second.clone()))
        }
        _ => None,
    }
}
