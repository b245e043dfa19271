//! Tasks reporting orphan inventory resources as findings to Open Delivery
//! Gear.
//!
//! Each resource kind is served by a [`Reconciler`] which replaces the
//! previously reported findings of the kind with the current inventory state.

pub mod error;
pub mod extractor;
pub mod mapping;
pub mod metrics;
pub mod models;
pub mod payload;
pub mod reconciler;
pub mod registry;

pub use error::{NON_RETRYABLE_STATUS_CODES, ReconcileError, Retry, Stage, classify_api_error};
pub use extractor::{ExtractError, PgExtractor, ResourceExtractor};
pub use mapping::{ComponentIdentity, FindingProjection, MappedBatch, build_batch, runtime_labels};
pub use metrics::{RecorderMetrics, ReconcileMetrics, describe_metrics};
pub use models::InventoryRow;
pub use payload::{Payload, PayloadError};
pub use reconciler::{Reconciler, RunReport};
pub use registry::{
    DynTaskHandler, RegistryError, TaskHandler, TaskRegistry, builtin_task_names,
    default_registry,
};
