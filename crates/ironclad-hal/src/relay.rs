//! Generic `Relay` trait for discrete on/off hardware devices (solenoids,
//! power switches, brake releases, …).

use async_trait::async_trait;
use ironclad_types::HardwareError;

/// A discrete on/off hardware device.
#[async_trait]
pub trait Relay: Send + Sync {
    /// Stable identifier for this relay, e.g. `"gripper_solenoid"`.
    fn id(&self) -> &str;

    /// Drive the relay to `active` (`true` = energised / on,
    /// `false` = de-energised / off).
    ///
    /// # Errors
    ///
    /// Returns a [`HardwareError`] if the command cannot be applied.
    fn set_state(&mut self, active: bool) -> Result<(), HardwareError>;

    /// Return the relay's current state (`true` = energised).
    fn state(&self) -> bool;

    /// De-energise the relay.
    async fn disarm(&mut self) -> Result<(), HardwareError> {
        self.set_state(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct MockRelay {
        id: String,
        state: bool,
    }

    impl MockRelay {
        fn new(id: &str) -> Self {
            Self {
                id: id.to_string(),
                state: false,
            }
        }
    }

    impl Relay for MockRelay {
        fn id(&self) -> &str {
            &self.id
        }

        fn set_state(&mut self, active: bool) -> Result<(), HardwareError> {
            self.state = active;
            Ok(())
        }

        fn state(&self) -> bool {
            self.state
        }
    }

    #[test]
    fn mock_relay_toggle() {
        let mut relay = MockRelay::new("gripper");
        assert_eq!(relay.id(), "gripper");
        assert!(!relay.state());

        relay.set_state(true).unwrap();
        assert!(relay.state());

        relay.set_state(false).unwrap();
        assert!(!relay.state());
    }

    #[tokio::test]
    async fn default_disarm_de_energises() {
        let mut relay = MockRelay::new("brake_release");
        relay.set_state(true).unwrap();

        relay.disarm().await.unwrap();
        assert!(!relay.state());

        // Idempotent.
        relay.disarm().await.unwrap();
        assert!(!relay.state());
    }
}
