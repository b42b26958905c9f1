//! [`Disarm`] – the capability a component hands to the safety controller.
//!
//! A disarm operation must be idempotent, must either succeed or report a
//! reason, and should not block indefinitely.  The controller enforces a
//! deadline regardless of how the implementation behaves.

use async_trait::async_trait;

/// A component's disarm operation.
///
/// # Example
///
/// ```
/// use ironclad_kernel::disarm::{Disarm, FnDisarm};
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// let brake = FnDisarm::new(|| Ok(()));
/// assert!(brake.disarm().await.is_ok());
/// # }
/// ```
#[async_trait]
pub trait Disarm: Send + Sync {
    /// Put the component in a state where it can no longer command actuation.
    ///
    /// # Errors
    ///
    /// A human-readable reason when the component could not be disarmed.
    async fn disarm(&self) -> Result<(), String>;
}

/// Adapts a synchronous closure into a [`Disarm`] capability.
pub struct FnDisarm<F> {
    f: F,
}

impl<F> FnDisarm<F>
where
    F: Fn() -> Result<(), String> + Send + Sync,
{
    pub fn new(f: F) -> Self {
        Self { f }
    }
}

#[async_trait]
impl<F> Disarm for FnDisarm<F>
where
    F: Fn() -> Result<(), String> + Send + Sync,
{
    async fn disarm(&self) -> Result<(), String> {
        (self.f)()
    }
}
