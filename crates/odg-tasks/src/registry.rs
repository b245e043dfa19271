//! Task name to handler table.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use odg_api::DynDeliveryService;
use tokio_util::sync::CancellationToken;

use crate::error::ReconcileError;
use crate::extractor::ResourceExtractor;
use crate::mapping::FindingProjection;
use crate::metrics::ReconcileMetrics;
use crate::models::{
    OrphanPublicAddressGcp, OrphanVirtualMachineAws, OrphanVirtualMachineAzure,
    OrphanVirtualMachineGcp, OrphanVirtualMachineOpenStack,
};
use crate::payload::Payload;
use crate::reconciler::{Reconciler, RunReport};

/// Errors raised by registry operations.
#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("unknown task: {0}")]
    UnknownTask(String),

    #[error("task already registered: {0}")]
    Duplicate(String),
}

/// A named unit of work dispatched by the scheduler.
#[async_trait]
pub trait TaskHandler: Send + Sync {
    fn name(&self) -> &'static str;

    async fn handle(
        &self,
        payload: &Payload,
        cancel: &CancellationToken,
    ) -> Result<RunReport, ReconcileError>;
}

#[async_trait]
impl<R: FindingProjection> TaskHandler for Reconciler<R> {
    fn name(&self) -> &'static str {
        self.task_name()
    }

    async fn handle(
        &self,
        payload: &Payload,
        cancel: &CancellationToken,
    ) -> Result<RunReport, ReconcileError> {
        self.run(payload, cancel).await
    }
}

/// Type alias for a shareable task handler.
pub type DynTaskHandler = Arc<dyn TaskHandler>;

/// Table of task handlers keyed by task name.
#[derive(Default, Clone)]
pub struct TaskRegistry {
    handlers: BTreeMap<&'static str, DynTaskHandler>,
}

impl TaskRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a handler under its own name.
    pub fn register(&mut self, handler: DynTaskHandler) -> Result<(), RegistryError> {
        let name = handler.name();
        if self.handlers.contains_key(name) {
            return Err(RegistryError::Duplicate(name.to_string()));
        }
        self.handlers.insert(name, handler);
        Ok(())
    }

    /// Looks up a handler by exact name.
    pub fn get(&self, name: &str) -> Result<DynTaskHandler, RegistryError> {
        self.handlers
            .get(name)
            .cloned()
            .ok_or_else(|| RegistryError::UnknownTask(name.to_string()))
    }

    /// Registered task names, sorted.
    pub fn names(&self) -> Vec<&'static str> {
        self.handlers.keys().copied().collect()
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}

impl std::fmt::Debug for TaskRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TaskRegistry")
            .field("tasks", &self.names())
            .finish()
    }
}

/// Names of all built-in tasks, sorted.
pub fn builtin_task_names() -> Vec<&'static str> {
    let mut names = vec![
        OrphanVirtualMachineAws::TASK_NAME,
        OrphanVirtualMachineGcp::TASK_NAME,
        OrphanVirtualMachineAzure::TASK_NAME,
        OrphanVirtualMachineOpenStack::TASK_NAME,
        OrphanPublicAddressGcp::TASK_NAME,
    ];
    names.sort_unstable();
    names
}

fn reconciler<R, E>(
    extractor: &Arc<E>,
    remote: &DynDeliveryService,
    metrics: &Arc<dyn ReconcileMetrics>,
) -> DynTaskHandler
where
    R: FindingProjection,
    E: ResourceExtractor<R> + 'static,
{
    let extractor: Arc<dyn ResourceExtractor<R>> = extractor.clone();
    Arc::new(Reconciler::<R>::new(extractor, remote.clone(), metrics.clone()))
}

/// Builds the registry of all built-in tasks over a shared extractor.
pub fn default_registry<E>(
    extractor: Arc<E>,
    remote: DynDeliveryService,
    metrics: Arc<dyn ReconcileMetrics>,
) -> Result<TaskRegistry, RegistryError>
where
    E: ResourceExtractor<OrphanVirtualMachineAws>
        + ResourceExtractor<OrphanVirtualMachineGcp>
        + ResourceExtractor<OrphanVirtualMachineAzure>
        + ResourceExtractor<OrphanVirtualMachineOpenStack>
        + ResourceExtractor<OrphanPublicAddressGcp>
        + 'static,
{
    let mut registry = TaskRegistry::new();
    registry.register(reconciler::<OrphanVirtualMachineAws, E>(&extractor, &remote, &metrics))?;
    registry.register(reconciler::<OrphanVirtualMachineGcp, E>(&extractor, &remote, &metrics))?;
    registry.register(reconciler::<OrphanVirtualMachineAzure, E>(&extractor, &remote, &metrics))?;
    registry.register(reconciler::<OrphanVirtualMachineOpenStack, E>(
        &extractor, &remote, &metrics,
    ))?;
    registry.register(reconciler::<OrphanPublicAddressGcp, E>(&extractor, &remote, &metrics))?;
    Ok(registry)
}
