//! The boundary trait between the reconciler and the remote delivery service.

use std::sync::Arc;

use async_trait::async_trait;

use crate::error::ApiError;
use crate::types::{ArtefactMetadata, ComponentArtefactId, LabelSet, RuntimeArtefactResultItem};

/// Operations against the remote artefact-metadata and runtime-artefact
/// stores.
///
/// Implementations never retry; failures are reported as [`ApiError`] and the
/// caller decides whether a retry is worthwhile. Calls with an empty input
/// list are no-ops and must not reach the remote service.
#[async_trait]
pub trait DeliveryService: Send + Sync {
    /// Lists artefact metadata of the given datatype matching `filter`.
    ///
    /// An empty result is valid (e.g. on the first run).
    async fn query_artefact_metadata(
        &self,
        datatype: &str,
        filter: &ComponentArtefactId,
    ) -> Result<Vec<ArtefactMetadata>, ApiError>;

    /// Removes the given artefact metadata entries.
    async fn delete_artefact_metadata(&self, entries: &[ArtefactMetadata]) -> Result<(), ApiError>;

    /// Creates or updates the given artefact metadata entries.
    async fn submit_artefact_metadata(&self, entries: &[ArtefactMetadata]) -> Result<(), ApiError>;

    /// Lists runtime artefacts carrying all of the given labels.
    async fn query_runtime_artefacts(
        &self,
        labels: &LabelSet,
    ) -> Result<Vec<RuntimeArtefactResultItem>, ApiError>;

    /// Removes runtime artefacts by name.
    async fn delete_runtime_artefacts(&self, names: &[String]) -> Result<(), ApiError>;

    /// Registers the given artefacts as one labelled runtime-artefact batch.
    async fn submit_runtime_artefacts(
        &self,
        labels: &LabelSet,
        artefacts: &[ComponentArtefactId],
    ) -> Result<(), ApiError>;
}

/// Type alias for a shareable delivery service.
pub type DynDeliveryService = Arc<dyn DeliveryService>;
