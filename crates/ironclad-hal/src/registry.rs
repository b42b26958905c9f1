//! [`HardwareRegistry`] – central driver registry.
//!
//! The registry owns every registered [`Actuator`] and [`Relay`] driver and
//! resolves commands by driver identifier.  Drivers live behind
//! `Arc<tokio::sync::Mutex<_>>` so the same instance can be commanded by the
//! registry and disarmed by the safety controller.
//!
//! # Safety registration
//!
//! [`HardwareRegistry::register_with`] hands each driver's `disarm` to a
//! [`SafetyHandle`] as a [`Disarm`] capability under `prefix/<id>`.  A
//! driver's disarm runs while holding its lock, so a command in flight
//! finishes before the disarm starts and no command interleaves with it.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use ironclad_kernel::{Disarm, SafetyHandle};
use ironclad_types::{ComponentPath, HardwareError, InvalidError, StateError};
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::actuator::Actuator;
use crate::relay::Relay;

/// An actuator driver shared between the registry and the safety controller.
pub type SharedActuator = Arc<Mutex<Box<dyn Actuator>>>;

/// A relay driver shared between the registry and the safety controller.
pub type SharedRelay = Arc<Mutex<Box<dyn Relay>>>;

#[derive(Error, Debug)]
pub enum RegistryError {
    #[error("no driver registered as '{id}'")]
    UnknownDriver { id: String },

    #[error(transparent)]
    Hardware(#[from] HardwareError),

    #[error(transparent)]
    Path(#[from] InvalidError),

    #[error(transparent)]
    State(#[from] StateError),
}

/// Central hardware driver registry.
///
/// Actuators and relays share one identifier namespace: registering a driver
/// replaces any driver of either kind with the same `id`.
#[derive(Default)]
pub struct HardwareRegistry {
    actuators: HashMap<String, SharedActuator>,
    relays: HashMap<String, SharedRelay>,
}

impl HardwareRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an actuator driver.
    pub fn register_actuator(&mut self, actuator: Box<dyn Actuator>) {
        let id = actuator.id().to_string();
        self.relays.remove(&id);
        self.actuators.insert(id, Arc::new(Mutex::new(actuator)));
    }

    /// Register a relay driver.
    pub fn register_relay(&mut self, relay: Box<dyn Relay>) {
        let id = relay.id().to_string();
        self.actuators.remove(&id);
        self.relays.insert(id, Arc::new(Mutex::new(relay)));
    }

    pub fn actuator(&self, id: &str) -> Option<SharedActuator> {
        self.actuators.get(id).cloned()
    }

    pub fn relay(&self, id: &str) -> Option<SharedRelay> {
        self.relays.get(id).cloned()
    }

    /// Every registered driver identifier, sorted.
    pub fn ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self
            .actuators
            .keys()
            .chain(self.relays.keys())
            .cloned()
            .collect();
        ids.sort();
        ids
    }

    pub fn len(&self) -> usize {
        self.actuators.len() + self.relays.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Command actuator `id` to `target_rad`.
    ///
    /// # Errors
    ///
    /// [`RegistryError::UnknownDriver`] when `id` is not a registered
    /// actuator, [`RegistryError::Hardware`] when the driver refuses.
    pub async fn actuate(&self, id: &str, target_rad: f32) -> Result<(), RegistryError> {
        let driver = self.actuator(id).ok_or_else(|| RegistryError::UnknownDriver {
            id: id.to_string(),
        })?;
        driver.lock().await.set_position(target_rad)?;
        debug!(actuator = id, target_rad, "actuator commanded");
        Ok(())
    }

    /// Drive relay `id` to `active`.
    ///
    /// # Errors
    ///
    /// As for [`actuate`][Self::actuate].
    pub async fn trigger_relay(&self, id: &str, active: bool) -> Result<(), RegistryError> {
        let driver = self.relay(id).ok_or_else(|| RegistryError::UnknownDriver {
            id: id.to_string(),
        })?;
        driver.lock().await.set_state(active)?;
        debug!(relay = id, active, "relay commanded");
        Ok(())
    }

    /// Register every driver's disarm with the safety controller behind
    /// `handle`, each under `prefix/<id>`.
    ///
    /// Returns the registered paths, sorted.
    ///
    /// # Errors
    ///
    /// [`RegistryError::Path`] when a driver id is not a valid path segment,
    /// [`RegistryError::State`] when the controller refuses a registration
    /// or has stopped.  Drivers registered before the failure stay
    /// registered.
    pub async fn register_with(
        &self,
        handle: &SafetyHandle,
        prefix: &ComponentPath,
    ) -> Result<Vec<ComponentPath>, RegistryError> {
        let mut capabilities: Vec<(String, Arc<dyn Disarm>)> = Vec::with_capacity(self.len());
        for (id, driver) in &self.actuators {
            let capability: Arc<dyn Disarm> = Arc::new(ActuatorDisarm(Arc::clone(driver)));
            capabilities.push((id.clone(), capability));
        }
        for (id, driver) in &self.relays {
            let capability: Arc<dyn Disarm> = Arc::new(RelayDisarm(Arc::clone(driver)));
            capabilities.push((id.clone(), capability));
        }
        capabilities.sort_by(|a, b| a.0.cmp(&b.0));

        let mut paths = Vec::with_capacity(capabilities.len());
        for (id, capability) in capabilities {
            let path = prefix.child(id)?;
            handle.register(path.clone(), capability).await?;
            info!(component = %path, "driver registered with safety controller");
            paths.push(path);
        }
        Ok(paths)
    }
}

struct ActuatorDisarm(SharedActuator);

#[async_trait]
impl Disarm for ActuatorDisarm {
    async fn disarm(&self) -> Result<(), String> {
        let mut driver = self.0.lock().await;
        driver.disarm().await.map_err(|e| e.to_string())
    }
}

struct RelayDisarm(SharedRelay);

#[async_trait]
impl Disarm for RelayDisarm {
    async fn disarm(&self) -> Result<(), String> {
        let mut driver = self.0.lock().await;
        driver.disarm().await.map_err(|e| e.to_string())
    }
}
