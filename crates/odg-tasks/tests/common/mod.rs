//! In-memory fakes for reconciler tests.

#![allow(dead_code)]

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use odg_api::{
    ApiError, ArtefactMetadata, ComponentArtefactId, DeliveryService, LabelSet, ProviderName,
    ResourceKind, RuntimeArtefactObjectMeta, RuntimeArtefactResultItem, RuntimeArtefactSpec,
};
use odg_tasks::{ExtractError, ReconcileMetrics, ResourceExtractor};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Op {
    QueryMetadata,
    DeleteMetadata,
    SubmitMetadata,
    QueryRuntime,
    DeleteRuntime,
    SubmitRuntime,
}

#[derive(Default)]
struct State {
    metadata: Vec<ArtefactMetadata>,
    runtime: Vec<RuntimeArtefactResultItem>,
    calls: Vec<(Op, usize)>,
    failures: HashMap<Op, u16>,
    next_runtime_id: usize,
}

/// Remote service keeping metadata keyed by artefact identity and datatype.
#[derive(Default)]
pub struct FakeDeliveryService {
    state: Mutex<State>,
}

impl FakeDeliveryService {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Makes every call of `op` fail with the given HTTP status.
    pub fn fail(&self, op: Op, status_code: u16) {
        self.state.lock().unwrap().failures.insert(op, status_code);
    }

    pub fn clear_failures(&self) {
        self.state.lock().unwrap().failures.clear();
    }

    pub fn seed_metadata(&self, entries: Vec<ArtefactMetadata>) {
        self.state.lock().unwrap().metadata.extend(entries);
    }

    pub fn seed_runtime(&self, name: &str, labels: &[(&str, &str)]) {
        self.state
            .lock()
            .unwrap()
            .runtime
            .push(RuntimeArtefactResultItem {
                metadata: RuntimeArtefactObjectMeta {
                    name: name.to_string(),
                    labels: labels
                        .iter()
                        .map(|(k, v)| (k.to_string(), v.to_string()))
                        .collect(),
                },
                spec: RuntimeArtefactSpec::default(),
            });
    }

    pub fn metadata(&self) -> Vec<ArtefactMetadata> {
        self.state.lock().unwrap().metadata.clone()
    }

    pub fn runtime(&self) -> Vec<RuntimeArtefactResultItem> {
        self.state.lock().unwrap().runtime.clone()
    }

    pub fn runtime_names(&self) -> Vec<String> {
        self.runtime().into_iter().map(|i| i.metadata.name).collect()
    }

    pub fn calls(&self) -> Vec<(Op, usize)> {
        self.state.lock().unwrap().calls.clone()
    }

    pub fn count(&self, op: Op) -> usize {
        self.calls().iter().filter(|(o, _)| *o == op).count()
    }

    pub fn total_calls(&self) -> usize {
        self.calls().len()
    }

    /// Remote state without timestamps, comparable across runs.
    pub fn snapshot(&self) -> (Vec<(ComponentArtefactId, String)>, Vec<ComponentArtefactId>) {
        let mut metadata: Vec<_> = self
            .metadata()
            .into_iter()
            .map(|e| (e.artefact, e.meta.datatype))
            .collect();
        metadata.sort_by(|a, b| format!("{a:?}").cmp(&format!("{b:?}")));

        let mut runtime: Vec<_> = self
            .runtime()
            .into_iter()
            .filter_map(|i| i.spec.artefact)
            .collect();
        runtime.sort_by(|a, b| format!("{a:?}").cmp(&format!("{b:?}")));

        (metadata, runtime)
    }

    fn record(&self, op: Op, count: usize) -> Result<(), ApiError> {
        let mut state = self.state.lock().unwrap();
        state.calls.push((op, count));
        match state.failures.get(&op) {
            Some(code) => Err(ApiError::status(*code, "FAKE", format!("{op:?}"), "injected")),
            None => Ok(()),
        }
    }
}

fn same_entry(a: &ArtefactMetadata, b: &ArtefactMetadata) -> bool {
    a.artefact == b.artefact && a.meta.datatype == b.meta.datatype
}

#[async_trait]
impl DeliveryService for FakeDeliveryService {
    async fn query_artefact_metadata(
        &self,
        datatype: &str,
        filter: &ComponentArtefactId,
    ) -> Result<Vec<ArtefactMetadata>, ApiError> {
        self.record(Op::QueryMetadata, 1)?;
        let state = self.state.lock().unwrap();
        Ok(state
            .metadata
            .iter()
            .filter(|e| {
                e.meta.datatype == datatype
                    && e.artefact.component_name == filter.component_name
                    && e.artefact.component_version == filter.component_version
                    && e.artefact.artefact_kind == filter.artefact_kind
                    && e.artefact.artefact.artefact_type == filter.artefact.artefact_type
            })
            .cloned()
            .collect())
    }

    async fn delete_artefact_metadata(&self, entries: &[ArtefactMetadata]) -> Result<(), ApiError> {
        self.record(Op::DeleteMetadata, entries.len())?;
        let mut state = self.state.lock().unwrap();
        state
            .metadata
            .retain(|existing| !entries.iter().any(|e| same_entry(existing, e)));
        Ok(())
    }

    async fn submit_artefact_metadata(&self, entries: &[ArtefactMetadata]) -> Result<(), ApiError> {
        self.record(Op::SubmitMetadata, entries.len())?;
        let mut state = self.state.lock().unwrap();
        for entry in entries {
            state.metadata.retain(|existing| !same_entry(existing, entry));
            state.metadata.push(entry.clone());
        }
        Ok(())
    }

    async fn query_runtime_artefacts(
        &self,
        _labels: &LabelSet,
    ) -> Result<Vec<RuntimeArtefactResultItem>, ApiError> {
        self.record(Op::QueryRuntime, 1)?;
        Ok(self.state.lock().unwrap().runtime.clone())
    }

    async fn delete_runtime_artefacts(&self, names: &[String]) -> Result<(), ApiError> {
        self.record(Op::DeleteRuntime, names.len())?;
        let mut state = self.state.lock().unwrap();
        state.runtime.retain(|item| !names.contains(&item.metadata.name));
        Ok(())
    }

    async fn submit_runtime_artefacts(
        &self,
        labels: &LabelSet,
        artefacts: &[ComponentArtefactId],
    ) -> Result<(), ApiError> {
        self.record(Op::SubmitRuntime, artefacts.len())?;
        let mut state = self.state.lock().unwrap();
        let labels: BTreeMap<String, String> = labels
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        for artefact in artefacts {
            state.next_runtime_id += 1;
            let name = format!("runtime-artefact-{}", state.next_runtime_id);
            state.runtime.push(RuntimeArtefactResultItem {
                metadata: RuntimeArtefactObjectMeta {
                    name,
                    labels: labels.clone(),
                },
                spec: RuntimeArtefactSpec {
                    artefact: Some(artefact.clone()),
                },
            });
        }
        Ok(())
    }
}

/// Extractor returning fixed rows, or failing with the given error.
pub struct FakeExtractor<R> {
    rows: Vec<R>,
    failure: Option<fn() -> ExtractError>,
    calls: AtomicUsize,
}

impl<R> FakeExtractor<R> {
    pub fn new(rows: Vec<R>) -> Arc<Self> {
        Arc::new(Self {
            rows,
            failure: None,
            calls: AtomicUsize::new(0),
        })
    }

    pub fn failing(failure: fn() -> ExtractError) -> Arc<Self> {
        Arc::new(Self {
            rows: Vec::new(),
            failure: Some(failure),
            calls: AtomicUsize::new(0),
        })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl<R: Clone + Send + Sync + 'static> ResourceExtractor<R> for FakeExtractor<R> {
    async fn extract(&self, _query: &str) -> Result<Vec<R>, ExtractError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match self.failure {
            Some(failure) => Err(failure()),
            None => Ok(self.rows.clone()),
        }
    }
}

/// Metrics sink remembering the last value of every gauge.
#[derive(Default)]
pub struct RecordingMetrics {
    discovered: Mutex<HashMap<(ProviderName, ResourceKind), usize>>,
    reported: Mutex<HashMap<(ProviderName, ResourceKind), usize>>,
}

impl RecordingMetrics {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn discovered(&self, provider: ProviderName, kind: ResourceKind) -> Option<usize> {
        self.discovered.lock().unwrap().get(&(provider, kind)).copied()
    }

    pub fn reported(&self, provider: ProviderName, kind: ResourceKind) -> Option<usize> {
        self.reported.lock().unwrap().get(&(provider, kind)).copied()
    }
}

impl ReconcileMetrics for RecordingMetrics {
    fn set_discovered(&self, provider: ProviderName, kind: ResourceKind, count: usize) {
        self.discovered
            .lock()
            .unwrap()
            .insert((provider, kind), count);
    }

    fn set_reported(&self, provider: ProviderName, kind: ResourceKind, count: usize) {
        self.reported.lock().unwrap().insert((provider, kind), count);
    }
}

/// Inventory without any orphan resources, for every row type.
pub struct EmptyInventory;

#[async_trait]
impl<R: Send + 'static> ResourceExtractor<R> for EmptyInventory {
    async fn extract(&self, _query: &str) -> Result<Vec<R>, ExtractError> {
        Ok(Vec::new())
    }
}
