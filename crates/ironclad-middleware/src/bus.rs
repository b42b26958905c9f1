//! Error intake bus.
//!
//! Uses a [`tokio::sync::broadcast`] channel under the hood so that every
//! subscriber receives every [`ErrorRecord`] without any single subscriber
//! blocking the others or the publisher.
//!
//! Any component may publish.  The safety controller is the one subscriber
//! that acts on `Critical` records; loggers and operator consoles may attach
//! filtered subscribers with [`ErrorBus::subscribe_at_least`].
//!
//! | Severity | Propagation on publish |
//! |---|---|
//! | `Warning` | logged at `warn!` by the publisher, never interrupts it |
//! | `Error` | logged at `warn!`, the publisher fails its local operation |
//! | `Critical` | logged at `error!`, acted on by the safety controller |

use ironclad_types::{
    Classified, ComponentPath, ErrorClass, ErrorRecord, RobotError, Severity,
};
use thiserror::Error;
use tokio::sync::broadcast;
use tracing::{debug, error, warn};

/// Default channel capacity (number of buffered records before old ones are
/// dropped for slow subscribers).
pub const DEFAULT_CAPACITY: usize = 256;

/// Errors returned by [`ErrorBus`].
#[derive(Debug, Error)]
pub enum BusError {
    /// Nobody is listening.  The record is lost.
    #[error("no subscribers on the error bus, dropped {severity} {class} record from {origin}")]
    NoSubscribers {
        origin: ComponentPath,
        class: ErrorClass,
        severity: Severity,
    },
}

/// Shared error bus.  Clone it cheaply – all clones share the same underlying
/// broadcast channel.
#[derive(Clone, Debug)]
pub struct ErrorBus {
    sender: broadcast::Sender<ErrorRecord>,
}

impl ErrorBus {
    /// Create a new bus with the given channel capacity.
    ///
    /// # Panics
    ///
    /// Panics if `capacity` is zero, like [`broadcast::channel`].  Callers
    /// loading capacity from configuration must validate it first.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publish `record`.
    ///
    /// Returns the number of active receivers that were handed the record.
    ///
    /// # Errors
    ///
    /// [`BusError::NoSubscribers`] when nothing is subscribed.  A `Critical`
    /// record with no subscribers is additionally logged at `error!` since
    /// no controller will see it.
    pub fn publish(&self, record: ErrorRecord) -> Result<usize, BusError> {
        let severity = record.severity();
        match severity {
            Severity::Critical => error!(
                source = %record.source,
                class = %record.class(),
                error = %record.error,
                "critical error raised"
            ),
            Severity::Error | Severity::Warning => warn!(
                source = %record.source,
                class = %record.class(),
                severity = %severity,
                error = %record.error,
                "error raised"
            ),
        }

        match self.sender.send(record) {
            Ok(n) => Ok(n),
            Err(broadcast::error::SendError(record)) => {
                if severity.is_critical() {
                    error!(source = %record.source, "critical error published with no subscribers");
                }
                Err(BusError::NoSubscribers {
                    class: record.class(),
                    severity,
                    origin: record.source,
                })
            }
        }
    }

    /// Wrap `error` in a fresh [`ErrorRecord`] raised by `source` and publish
    /// it.
    ///
    /// # Errors
    ///
    /// See [`ErrorBus::publish`].
    pub fn raise(
        &self,
        source: ComponentPath,
        error: impl Into<RobotError>,
    ) -> Result<usize, BusError> {
        self.publish(ErrorRecord::new(source, error))
    }

    /// Subscribe to every record.
    pub fn subscribe(&self) -> ErrorReceiver {
        ErrorReceiver {
            receiver: self.sender.subscribe(),
        }
    }

    /// Subscribe to records of at least `min` severity.
    pub fn subscribe_at_least(&self, min: Severity) -> SeveritySubscriber {
        SeveritySubscriber {
            min,
            receiver: self.sender.subscribe(),
        }
    }
}

impl Default for ErrorBus {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Raw receiver
// ────────────────────────────────────────────────────────────────────────────

/// An async receiver of every record on the bus.
///
/// Lag is surfaced to the caller rather than skipped: a consumer that must
/// not miss a `Critical` record (the safety controller) needs to know when
/// records were dropped unseen.
pub struct ErrorReceiver {
    receiver: broadcast::Receiver<ErrorRecord>,
}

impl ErrorReceiver {
    /// Wait for the next record.
    ///
    /// Returns:
    /// * `Ok(record)` – a successfully received record.
    /// * `Err(broadcast::error::RecvError::Lagged(n))` – the subscriber fell
    ///   behind and `n` records were dropped.
    /// * `Err(broadcast::error::RecvError::Closed)` – every bus handle has
    ///   been dropped.
    pub async fn recv(&mut self) -> Result<ErrorRecord, broadcast::error::RecvError> {
        let result = self.receiver.recv().await;
        if let Err(broadcast::error::RecvError::Lagged(n)) = &result {
            warn!(lagged_by = *n, "ErrorReceiver lagged");
        }
        result
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Severity-filtered subscriber
// ────────────────────────────────────────────────────────────────────────────

/// A subscriber that only delivers records at or above a minimum severity.
pub struct SeveritySubscriber {
    min: Severity,
    receiver: broadcast::Receiver<ErrorRecord>,
}

impl SeveritySubscriber {
    /// Wait for the next record that passes the severity filter.
    ///
    /// Returns `None` when the bus is closed and no further records will
    /// arrive.
    pub async fn recv(&mut self) -> Option<ErrorRecord> {
        loop {
            match self.receiver.recv().await {
                Ok(record) if record.severity() >= self.min => return Some(record),
                Ok(record) => {
                    debug!(source = %record.source, "SeveritySubscriber skipped record");
                    continue;
                }
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    warn!(min = %self.min, lagged_by = n, "SeveritySubscriber lagged");
                    continue;
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }
}
