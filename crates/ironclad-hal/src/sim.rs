//! In-process simulated drivers for headless runs and tests.
//!
//! [`SimRegistry`] builds a [`HardwareRegistry`] pre-populated with stub
//! drivers that record commands and return plausible state.  Each stub can be
//! told how to behave when disarmed ([`SimBehaviour`]), which is how the
//! escalation path is exercised without a physical robot.
//!
//! # Example
//!
//! ```rust
//! use ironclad_hal::sim::{SimBehaviour, SimRegistry};
//!
//! let registry = SimRegistry::new()
//!     .with_drive_base()
//!     .with_relay("gripper")
//!     .with_actuator_behaviour("wrist", SimBehaviour::HangOnDisarm)
//!     .build();
//!
//! assert_eq!(registry.len(), 4);
//! ```
//!
//! # Stub behaviour
//!
//! | Driver | Armed | After a successful disarm |
//! |---|---|---|
//! | [`SimActuator`] | Stores the last `set_position` value. | Holds position; further commands fail. |
//! | [`SimRelay`]    | Stores the last `set_state` value. | De-energised; energising fails. |

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use ironclad_types::HardwareError;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::actuator::Actuator;
use crate::registry::HardwareRegistry;
use crate::relay::Relay;

/// Fault code reported when a disarmed stub is commanded.
pub const FAULT_DISARMED: u32 = 1;

/// Fault code reported by [`SimBehaviour::FailDisarm`].
pub const FAULT_DISARM_REJECTED: u32 = 2;

/// How a simulated driver responds to `disarm`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SimBehaviour {
    /// Disarms immediately.
    #[default]
    Nominal,
    /// Refuses to disarm with the given reason.
    FailDisarm(String),
    /// Never completes; only a deadline gets the caller out.
    HangOnDisarm,
}

impl SimBehaviour {
    async fn disarm(&self, id: &str) -> Result<(), HardwareError> {
        match self {
            SimBehaviour::Nominal => Ok(()),
            SimBehaviour::FailDisarm(reason) => {
                warn!(driver = id, reason = %reason, "simulated disarm refused");
                Err(HardwareError::Fault {
                    component: id.to_string(),
                    code: FAULT_DISARM_REJECTED,
                    details: reason.clone(),
                })
            }
            SimBehaviour::HangOnDisarm => {
                warn!(driver = id, "simulated disarm hanging");
                std::future::pending::<()>().await;
                Ok(())
            }
        }
    }
}

/// Observes a simulated driver after it has been boxed into a registry.
#[derive(Debug, Clone, Default)]
pub struct SimProbe {
    disarm_calls: Arc<AtomicUsize>,
}

impl SimProbe {
    /// How many times `disarm` has been entered.
    pub fn disarm_calls(&self) -> usize {
        self.disarm_calls.load(Ordering::SeqCst)
    }

    fn record(&self) {
        self.disarm_calls.fetch_add(1, Ordering::SeqCst);
    }
}

fn disarmed_fault(id: &str) -> HardwareError {
    HardwareError::Fault {
        component: id.to_string(),
        code: FAULT_DISARMED,
        details: "driver is disarmed".into(),
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Stub actuator
// ────────────────────────────────────────────────────────────────────────────

/// A simulated position-controlled actuator.
pub struct SimActuator {
    id: String,
    position: f32,
    armed: bool,
    behaviour: SimBehaviour,
    probe: SimProbe,
}

impl SimActuator {
    /// Create a nominal simulated actuator with the given identifier.
    pub fn new(id: impl Into<String>) -> Box<Self> {
        Self::with_behaviour(id, SimBehaviour::Nominal)
    }

    pub fn with_behaviour(id: impl Into<String>, behaviour: SimBehaviour) -> Box<Self> {
        Box::new(Self {
            id: id.into(),
            position: 0.0,
            armed: true,
            behaviour,
            probe: SimProbe::default(),
        })
    }

    pub fn probe(&self) -> SimProbe {
        self.probe.clone()
    }
}

#[async_trait]
impl Actuator for SimActuator {
    fn id(&self) -> &str {
        &self.id
    }

    fn set_position(&mut self, target_rad: f32) -> Result<(), HardwareError> {
        if !self.armed {
            return Err(disarmed_fault(&self.id));
        }
        self.position = target_rad;
        Ok(())
    }

    fn position(&self) -> f32 {
        self.position
    }

    async fn disarm(&mut self) -> Result<(), HardwareError> {
        self.probe.record();
        self.behaviour.disarm(&self.id).await?;
        self.armed = false;
        debug!(driver = %self.id, position = self.position, "simulated actuator holding");
        Ok(())
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Stub relay
// ────────────────────────────────────────────────────────────────────────────

/// A simulated relay (discrete on/off device).
pub struct SimRelay {
    id: String,
    state: bool,
    armed: bool,
    behaviour: SimBehaviour,
    probe: SimProbe,
}

impl SimRelay {
    /// Create a nominal simulated relay with the given identifier.
    pub fn new(id: impl Into<String>) -> Box<Self> {
        Self::with_behaviour(id, SimBehaviour::Nominal)
    }

    pub fn with_behaviour(id: impl Into<String>, behaviour: SimBehaviour) -> Box<Self> {
        Box::new(Self {
            id: id.into(),
            state: false,
            armed: true,
            behaviour,
            probe: SimProbe::default(),
        })
    }

    pub fn probe(&self) -> SimProbe {
        self.probe.clone()
    }
}

#[async_trait]
impl Relay for SimRelay {
    fn id(&self) -> &str {
        &self.id
    }

    fn set_state(&mut self, active: bool) -> Result<(), HardwareError> {
        if active && !self.armed {
            return Err(disarmed_fault(&self.id));
        }
        self.state = active;
        Ok(())
    }

    fn state(&self) -> bool {
        self.state
    }

    async fn disarm(&mut self) -> Result<(), HardwareError> {
        self.probe.record();
        self.behaviour.disarm(&self.id).await?;
        self.state = false;
        self.armed = false;
        debug!(driver = %self.id, "simulated relay de-energised");
        Ok(())
    }
}

// ────────────────────────────────────────────────────────────────────────────
// SimRegistry builder
// ────────────────────────────────────────────────────────────────────────────

/// Kind of simulated driver in a [`SimDriverConfig`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SimDriverKind {
    Actuator,
    Relay,
}

/// One simulated driver, as listed in the operator config file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SimDriverConfig {
    pub id: String,
    pub kind: SimDriverKind,
    #[serde(default)]
    pub behaviour: SimBehaviour,
}

/// Builder that constructs a [`HardwareRegistry`] pre-populated with
/// simulated drivers.
#[derive(Default)]
pub struct SimRegistry {
    actuators: Vec<Box<dyn Actuator>>,
    relays: Vec<Box<dyn Relay>>,
}

impl SimRegistry {
    /// Create an empty [`SimRegistry`] builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder pre-populated from config entries.
    pub fn from_config(drivers: &[SimDriverConfig]) -> Self {
        drivers.iter().fold(Self::new(), |builder, driver| match driver.kind {
            SimDriverKind::Actuator => {
                builder.with_actuator_behaviour(driver.id.clone(), driver.behaviour.clone())
            }
            SimDriverKind::Relay => {
                builder.with_relay_behaviour(driver.id.clone(), driver.behaviour.clone())
            }
        })
    }

    /// Add `"left_wheel"` and `"right_wheel"` actuators.
    pub fn with_drive_base(self) -> Self {
        self.with_actuator("left_wheel").with_actuator("right_wheel")
    }

    pub fn with_actuator(self, id: impl Into<String>) -> Self {
        self.with_actuator_behaviour(id, SimBehaviour::Nominal)
    }

    pub fn with_actuator_behaviour(mut self, id: impl Into<String>, behaviour: SimBehaviour) -> Self {
        self.actuators.push(SimActuator::with_behaviour(id, behaviour));
        self
    }

    pub fn with_relay(self, id: impl Into<String>) -> Self {
        self.with_relay_behaviour(id, SimBehaviour::Nominal)
    }

    pub fn with_relay_behaviour(mut self, id: impl Into<String>, behaviour: SimBehaviour) -> Self {
        self.relays.push(SimRelay::with_behaviour(id, behaviour));
        self
    }

    /// Register a custom actuator driver.  Useful when a test needs to keep
    /// a [`SimProbe`] on a specific driver.
    pub fn with_driver(mut self, actuator: Box<dyn Actuator>) -> Self {
        self.actuators.push(actuator);
        self
    }

    /// Consume the builder and return a fully configured [`HardwareRegistry`].
    pub fn build(self) -> HardwareRegistry {
        let mut registry = HardwareRegistry::new();
        for a in self.actuators {
            registry.register_actuator(a);
        }
        for r in self.relays {
            registry.register_relay(r);
        }
        registry
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Tests
// ────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    #[tokio::test]
    async fn nominal_actuator_holds_position_and_refuses_motion() {
        let mut act = SimActuator::new("elbow");
        let probe = act.probe();
        act.set_position(0.4).unwrap();

        act.disarm().await.unwrap();
        act.disarm().await.unwrap();

        assert_eq!(probe.disarm_calls(), 2);
        assert!((act.position() - 0.4).abs() < f32::EPSILON);
        assert!(matches!(
            act.set_position(1.0),
            Err(HardwareError::Fault {
                code: FAULT_DISARMED,
                ..
            })
        ));
    }

    #[tokio::test]
    async fn nominal_relay_de_energises_and_stays_off() {
        let mut relay = SimRelay::new("gripper");
        relay.set_state(true).unwrap();

        relay.disarm().await.unwrap();
        assert!(!relay.state());
        assert!(relay.set_state(true).is_err());
        // Switching off stays allowed.
        relay.set_state(false).unwrap();
    }

    #[tokio::test]
    async fn fail_disarm_leaves_driver_armed() {
        let mut relay = SimRelay::with_behaviour("pump", SimBehaviour::FailDisarm("welded".into()));
        relay.set_state(true).unwrap();

        let err = relay.disarm().await.unwrap_err();
        assert!(err.to_string().contains("welded"));
        assert!(relay.state());
        relay.set_state(false).unwrap();
        relay.set_state(true).unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn hang_on_disarm_never_completes() {
        let mut act = SimActuator::with_behaviour("wrist", SimBehaviour::HangOnDisarm);
        let probe = act.probe();

        let result = tokio::time::timeout(Duration::from_secs(60), act.disarm()).await;
        assert!(result.is_err());
        assert_eq!(probe.disarm_calls(), 1);
        // The abandoned disarm never flipped the driver.
        act.set_position(0.1).unwrap();
    }

    #[test]
    fn builder_collects_every_driver() {
        let registry = SimRegistry::new()
            .with_drive_base()
            .with_actuator("end_effector")
            .with_relay("gripper")
            .build();

        assert_eq!(
            registry.ids(),
            vec!["end_effector", "gripper", "left_wheel", "right_wheel"]
        );
    }

    #[tokio::test]
    async fn with_driver_keeps_probe_usable() {
        let act = SimActuator::new("probe_me");
        let probe = act.probe();
        let registry = SimRegistry::new().with_driver(act).build();

        registry
            .actuator("probe_me")
            .unwrap()
            .lock()
            .await
            .disarm()
            .await
            .unwrap();
        assert_eq!(probe.disarm_calls(), 1);
    }

    #[test]
    fn drivers_parse_from_toml() {
        #[derive(Deserialize)]
        struct Doc {
            drivers: Vec<SimDriverConfig>,
        }

        let doc: Doc = toml::from_str(
            r#"
            [[drivers]]
            id = "left_wheel"
            kind = "actuator"

            [[drivers]]
            id = "brake"
            kind = "relay"
            behaviour = { fail_disarm = "brake stuck" }

            [[drivers]]
            id = "wrist"
            kind = "actuator"
            behaviour = "hang_on_disarm"
            "#,
        )
        .unwrap();

        assert_eq!(doc.drivers[0].behaviour, SimBehaviour::Nominal);
        assert_eq!(
            doc.drivers[1].behaviour,
            SimBehaviour::FailDisarm("brake stuck".into())
        );
        assert_eq!(doc.drivers[2].behaviour, SimBehaviour::HangOnDisarm);

        let registry = SimRegistry::from_config(&doc.drivers).build();
        assert!(registry.actuator("wrist").is_some());
        assert!(registry.relay("brake").is_some());
    }
}
