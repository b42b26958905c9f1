//! `ironclad-hal` – Hardware Abstraction Layer
//!
//! Driver traits for the things that can move or energise, a registry that
//! hands every driver's disarm operation to the safety controller, and
//! simulated drivers for headless runs.
//!
//! # Modules
//!
//! - [`actuator`] – position-controlled [`Actuator`][actuator::Actuator]
//!   drivers (motors, joints, wheels).
//! - [`relay`] – discrete on/off [`Relay`][relay::Relay] drivers.
//! - [`registry`] – [`HardwareRegistry`][registry::HardwareRegistry].
//! - [`sim`] – [`SimActuator`][sim::SimActuator], [`SimRelay`][sim::SimRelay]
//!   and the [`SimRegistry`][sim::SimRegistry] builder.

pub mod actuator;
pub mod registry;
pub mod relay;
pub mod sim;

pub use actuator::Actuator;
pub use registry::{HardwareRegistry, RegistryError};
pub use relay::Relay;
pub use sim::{
    SimActuator, SimBehaviour, SimDriverConfig, SimDriverKind, SimProbe, SimRegistry, SimRelay,
};
