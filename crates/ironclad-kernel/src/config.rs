//! [`SafetyConfig`] – tunables of the safety controller.

use std::time::Duration;

use serde::{Deserialize, Serialize};

fn default_disarm_timeout_ms() -> u64 {
    500
}

fn default_command_capacity() -> usize {
    64
}

fn default_sweep_history_capacity() -> usize {
    16
}

/// Safety controller settings, usually loaded from the `[safety]` table of
/// the operator config file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SafetyConfig {
    /// Deadline applied to each component's disarm call unless it registered
    /// its own.
    #[serde(default = "default_disarm_timeout_ms")]
    pub disarm_timeout_ms: u64,

    /// Depth of the handle → controller command queue.
    #[serde(default = "default_command_capacity")]
    pub command_capacity: usize,

    /// Finished sweep reports buffered for slow
    /// [`subscribe_sweeps`][crate::SafetyHandle::subscribe_sweeps] receivers.
    #[serde(default = "default_sweep_history_capacity")]
    pub sweep_history_capacity: usize,
}

impl SafetyConfig {
    pub fn disarm_timeout(&self) -> Duration {
        Duration::from_millis(self.disarm_timeout_ms)
    }
}

impl Default for SafetyConfig {
    fn default() -> Self {
        Self {
            disarm_timeout_ms: default_disarm_timeout_ms(),
            command_capacity: default_command_capacity(),
            sweep_history_capacity: default_sweep_history_capacity(),
        }
    }
}
