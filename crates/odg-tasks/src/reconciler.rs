//! The reconciliation pipeline for one resource kind.
//!
//! A run extracts the current orphan resources from the inventory, removes
//! everything previously reported for the kind and submits the fresh set:
//!
//! 1. validate the payload
//! 2. extract rows
//! 3. map rows to findings (discovered gauge)
//! 4. query previously reported findings
//! 5. delete them, together with the kind's runtime artefacts
//! 6. stop if there is nothing to report
//! 7. submit findings and scan-info entries (reported gauge)
//! 8. submit runtime artefacts
//!
//! The remote service has no retention mechanism, so old findings must be
//! deleted explicitly before new ones are submitted.

use std::future::Future;
use std::sync::Arc;

use chrono::Utc;
use odg_api::{DynDeliveryService, datatype};
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument};

use crate::error::{ReconcileError, Stage};
use crate::extractor::ResourceExtractor;
use crate::mapping::{ComponentIdentity, FindingProjection, build_batch, runtime_labels};
use crate::metrics::ReconcileMetrics;
use crate::payload::Payload;

/// Summary of a successful run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RunReport {
    /// Rows returned by the inventory query.
    pub discovered: usize,
    /// Previously reported findings removed from the remote service.
    pub deleted_findings: usize,
    /// Previously registered runtime artefacts removed.
    pub deleted_runtime_artefacts: usize,
    /// Findings submitted in this run.
    pub reported: usize,
    /// Runtime artefacts submitted in this run.
    pub runtime_artefacts_submitted: usize,
    /// Rows whose artefact identity duplicated an earlier row.
    pub identity_collisions: usize,
}

/// Reconciles one resource kind `R` against the remote service.
pub struct Reconciler<R> {
    extractor: Arc<dyn ResourceExtractor<R>>,
    remote: DynDeliveryService,
    metrics: Arc<dyn ReconcileMetrics>,
}

impl<R: FindingProjection> Reconciler<R> {
    pub fn new(
        extractor: Arc<dyn ResourceExtractor<R>>,
        remote: DynDeliveryService,
        metrics: Arc<dyn ReconcileMetrics>,
    ) -> Self {
        Self {
            extractor,
            remote,
            metrics,
        }
    }

    /// Name of the task backed by this reconciler.
    pub fn task_name(&self) -> &'static str {
        R::TASK_NAME
    }

    /// Runs the pipeline once.
    ///
    /// # Errors
    ///
    /// Aborts at the first failing step. Remote state may be left partially
    /// updated; the next run redoes every step.
    #[instrument(
        name = "reconcile",
        skip_all,
        fields(
            task = R::TASK_NAME,
            component_name = %payload.component_name,
            component_version = %payload.component_version,
        )
    )]
    pub async fn run(
        &self,
        payload: &Payload,
        cancel: &CancellationToken,
    ) -> Result<RunReport, ReconcileError> {
        payload.validate()?;
        let component = ComponentIdentity::from(payload);
        let mut report = RunReport::default();

        let extract = self.extractor.extract(&payload.query);
        let rows = until_cancelled(cancel, Stage::Extracting, extract).await??;

        let batch = build_batch(&rows, &component, Utc::now());
        report.discovered = rows.len();
        report.identity_collisions = batch.collisions;
        info!(count = rows.len(), "found {}", R::LOG_NOUN);
        self.metrics.set_discovered(R::PROVIDER, R::KIND, report.discovered);

        let old_entries = until_cancelled(
            cancel,
            Stage::QueryingFindings,
            self.remote
                .query_artefact_metadata(datatype::INVENTORY, &component.filter(R::KIND)),
        )
        .await?
        .map_err(|e| ReconcileError::remote(Stage::QueryingFindings, e))?;

        info!(count = old_entries.len(), "deleting old {} from odg", R::LOG_NOUN);
        until_cancelled(
            cancel,
            Stage::DeletingFindings,
            self.remote.delete_artefact_metadata(&old_entries),
        )
        .await?
        .map_err(|e| ReconcileError::remote(Stage::DeletingFindings, e))?;
        report.deleted_findings = old_entries.len();

        let labels = runtime_labels(R::KIND, &component.name);
        if R::TRACKS_RUNTIME_ARTEFACTS {
            let items = until_cancelled(
                cancel,
                Stage::QueryingRuntimeArtefacts,
                self.remote.query_runtime_artefacts(&labels),
            )
            .await?
            .map_err(|e| ReconcileError::remote(Stage::QueryingRuntimeArtefacts, e))?;

            let names: Vec<String> = items
                .into_iter()
                .filter(|item| labels.matches(&item.metadata.labels))
                .map(|item| item.metadata.name)
                .collect();

            info!(count = names.len(), "deleting old runtime artefacts from odg");
            until_cancelled(
                cancel,
                Stage::DeletingRuntimeArtefacts,
                self.remote.delete_runtime_artefacts(&names),
            )
            .await?
            .map_err(|e| ReconcileError::remote(Stage::DeletingRuntimeArtefacts, e))?;
            report.deleted_runtime_artefacts = names.len();
        }

        if batch.is_empty() {
            info!("no {} to report", R::LOG_NOUN);
            self.metrics.set_reported(R::PROVIDER, R::KIND, 0);
            return Ok(report);
        }

        info!(count = batch.findings, "submitting {} to odg", R::LOG_NOUN);
        until_cancelled(
            cancel,
            Stage::SubmittingFindings,
            self.remote.submit_artefact_metadata(&batch.entries),
        )
        .await?
        .map_err(|e| ReconcileError::remote(Stage::SubmittingFindings, e))?;
        report.reported = batch.findings;
        self.metrics.set_reported(R::PROVIDER, R::KIND, report.reported);

        if R::TRACKS_RUNTIME_ARTEFACTS {
            info!(
                count = batch.runtime_artefacts.len(),
                "submitting runtime artefacts"
            );
            until_cancelled(
                cancel,
                Stage::SubmittingRuntimeArtefacts,
                self.remote
                    .submit_runtime_artefacts(&labels, &batch.runtime_artefacts),
            )
            .await?
            .map_err(|e| ReconcileError::remote(Stage::SubmittingRuntimeArtefacts, e))?;
            report.runtime_artefacts_submitted = batch.runtime_artefacts.len();
        }

        debug!(?report, "reconciliation finished");
        Ok(report)
    }
}

/// Drives `fut` unless `cancel` fires first.
async fn until_cancelled<F: Future>(
    cancel: &CancellationToken,
    stage: Stage,
    fut: F,
) -> Result<F::Output, ReconcileError> {
    if cancel.is_cancelled() {
        return Err(ReconcileError::cancelled(stage));
    }
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(ReconcileError::cancelled(stage)),
        output = fut => Ok(output),
    }
}
