//! `ironclad-middleware` – The Nervous System
//!
//! Routes severity-classified errors from wherever they are raised to
//! whoever must act on them, without caring about their meaning.
//!
//! # Modules
//!
//! - [`bus`] – [`ErrorBus`], the error intake bus built on a Tokio broadcast
//!   channel, with raw and severity-filtered subscribers.

pub mod bus;

pub use bus::{BusError, DEFAULT_CAPACITY, ErrorBus, ErrorReceiver, SeveritySubscriber};
