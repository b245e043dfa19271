//! Worker process reporting orphan inventory resources to Open Delivery Gear.
//!
//! The binary loads [`config::WorkerConfig`], connects to the inventory
//! database, authenticates against the API and periodically runs the
//! configured reconciliation jobs through the [`scheduler::Scheduler`].

pub mod bootstrap;
pub mod config;
pub mod db;
pub mod metrics_server;
pub mod observability;
pub mod scheduler;

pub use config::{ConfigError, WorkerConfig};
pub use scheduler::{JobOutcome, RetryPolicy, Scheduler};
