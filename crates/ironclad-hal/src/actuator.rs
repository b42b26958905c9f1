//! Generic `Actuator` trait for motors, servos, and any position-controlled
//! hardware.
//!
//! Drivers implement this trait and register themselves with a
//! [`HardwareRegistry`][crate::registry::HardwareRegistry], which hands each
//! driver's [`disarm`][Actuator::disarm] to the safety controller.

use async_trait::async_trait;
use ironclad_types::HardwareError;

/// A position-controlled hardware actuator (motor, servo, joint, wheel, …).
#[async_trait]
pub trait Actuator: Send + Sync {
    /// Stable identifier for this actuator, e.g. `"arm_joint_1"` or
    /// `"left_wheel"`.  Becomes the last segment of its component path.
    fn id(&self) -> &str;

    /// Command the actuator to move to `target_rad` (radians from its zero
    /// position).
    ///
    /// # Errors
    ///
    /// Returns a [`HardwareError`] if the command cannot be applied, e.g.
    /// the actuator is disarmed or in a fault state.
    fn set_position(&mut self, target_rad: f32) -> Result<(), HardwareError>;

    /// Return the actuator's most recently known position in radians.
    fn position(&self) -> f32;

    /// Stop commanding motion.
    ///
    /// The default holds the current position, which on a real motor
    /// controller means a "hold" setpoint rather than coasting.  Must be
    /// idempotent.
    async fn disarm(&mut self) -> Result<(), HardwareError> {
        let hold = self.position();
        self.set_position(hold)
    }
}
