//! `ironclad-kernel` – Safety & Orchestration
//!
//! The brainstem of Ironclad.  It does not plan or move anything; it watches
//! for hazards and, when one is reported, disarms the robot.
//!
//! # Modules
//!
//! - [`controller`] – [`SafetyController`][controller::SafetyController]:
//!   the actor that owns the registration table and runs disarm sweeps on
//!   every `Critical` error, plus its [`SafetyHandle`][controller::SafetyHandle].
//! - [`disarm`] – the [`Disarm`][disarm::Disarm] capability components hand
//!   to the controller.
//! - [`state`] – [`ComponentStatus`][state::ComponentStatus] and the
//!   [`SafetyControllerState`][state::SafetyControllerState] snapshot.
//! - [`collision_monitor`] – [`CollisionMonitor`][collision_monitor::CollisionMonitor]:
//!   runs the collision engine over watched body pairs and raises
//!   severity-classified errors on the bus.
//! - [`config`] – [`SafetyConfig`][config::SafetyConfig].

pub mod collision_monitor;
pub mod config;
pub mod controller;
pub mod disarm;
pub mod state;

pub use collision_monitor::{CollisionMonitor, PairKind, SceneConfig};
pub use config::SafetyConfig;
pub use controller::{DisarmOutcome, SafetyController, SafetyHandle, SweepReport, SweepTrigger};
pub use disarm::{Disarm, FnDisarm};
pub use state::{ComponentStatus, SafetyControllerState};
