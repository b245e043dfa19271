//! Mapping of inventory rows to findings and artefact identities.

use std::collections::{BTreeMap, HashSet};

use chrono::{DateTime, Utc};
use odg_api::{
    ArtefactKind, ArtefactMetadata, ComponentArtefactId, Finding, LabelSet, LocalArtefactId,
    Metadata, ProviderName, ResourceKind, Severity, datasource, datatype,
};
use serde::Serialize;
use tracing::warn;

use crate::models::{
    OrphanPublicAddressGcp, OrphanVirtualMachineAws, OrphanVirtualMachineAzure,
    OrphanVirtualMachineGcp, OrphanVirtualMachineOpenStack,
};
use crate::payload::Payload;

/// Label key naming the datasource which created a runtime artefact.
pub const LABEL_CREATED_BY: &str = "created-by";

/// Label key naming the resource kind of a runtime artefact.
pub const LABEL_RESOURCE_KIND: &str = "resource-kind";

/// Label key naming the component of a runtime artefact.
pub const LABEL_COMPONENT_NAME: &str = "component-name";

/// Static description of how rows of one resource kind become findings.
pub trait FindingProjection: Serialize + Send + Sync + 'static {
    /// Name of the task reporting this kind.
    const TASK_NAME: &'static str;
    const PROVIDER: ProviderName;
    const KIND: ResourceKind;
    const SUMMARY: &'static str;
    /// Noun used in log messages, e.g. `orphan aws instances`.
    const LOG_NOUN: &'static str;
    /// Whether a scan-info entry accompanies every finding.
    const EMITS_SCAN_INFO: bool = true;
    /// Whether findings are also registered as runtime artefacts.
    const TRACKS_RUNTIME_ARTEFACTS: bool = true;

    fn artefact_name(&self) -> String;
    fn resource_name(&self) -> String;
    fn extra_id(&self) -> BTreeMap<String, String>;
}

fn extra_id<const N: usize>(pairs: [(&str, &str); N]) -> BTreeMap<String, String> {
    pairs
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

impl FindingProjection for OrphanVirtualMachineAws {
    const TASK_NAME: &'static str = "odg:task:report-orphan-vms-aws";
    const PROVIDER: ProviderName = ProviderName::Aws;
    const KIND: ResourceKind = ResourceKind::VirtualMachineAws;
    const SUMMARY: &'static str = "Orphan Virtual Machine";
    const LOG_NOUN: &'static str = "orphan aws instances";

    fn artefact_name(&self) -> String {
        self.instance_id.clone()
    }

    fn resource_name(&self) -> String {
        self.instance_id.clone()
    }

    fn extra_id(&self) -> BTreeMap<String, String> {
        extra_id([
            ("vpc_id", self.vpc_id.as_str()),
            ("region_name", self.region_name.as_str()),
            ("account_id", self.account_id.as_str()),
        ])
    }
}

impl FindingProjection for OrphanVirtualMachineGcp {
    const TASK_NAME: &'static str = "odg:task:report-orphan-vms-gcp";
    const PROVIDER: ProviderName = ProviderName::Gcp;
    const KIND: ResourceKind = ResourceKind::VirtualMachineGcp;
    const SUMMARY: &'static str = "Orphan Virtual Machine";
    const LOG_NOUN: &'static str = "orphan gcp instances";

    fn artefact_name(&self) -> String {
        self.name.clone()
    }

    fn resource_name(&self) -> String {
        self.instance_id.to_string()
    }

    fn extra_id(&self) -> BTreeMap<String, String> {
        let instance_id = self.instance_id.to_string();
        extra_id([
            ("instance_id", instance_id.as_str()),
            ("project_id", self.project_id.as_str()),
        ])
    }
}

impl FindingProjection for OrphanVirtualMachineAzure {
    const TASK_NAME: &'static str = "odg:task:report-orphan-vms-az";
    const PROVIDER: ProviderName = ProviderName::Azure;
    const KIND: ResourceKind = ResourceKind::VirtualMachineAzure;
    const SUMMARY: &'static str = "Orphan Virtual Machine";
    const LOG_NOUN: &'static str = "orphan azure virtual machines";

    fn artefact_name(&self) -> String {
        self.name.clone()
    }

    fn resource_name(&self) -> String {
        self.name.clone()
    }

    fn extra_id(&self) -> BTreeMap<String, String> {
        extra_id([
            ("subscription_id", self.subscription_id.as_str()),
            ("resource_group", self.resource_group.as_str()),
            ("location", self.location.as_str()),
        ])
    }
}

impl FindingProjection for OrphanVirtualMachineOpenStack {
    const TASK_NAME: &'static str = "odg:task:report-orphan-vms-openstack";
    const PROVIDER: ProviderName = ProviderName::OpenStack;
    const KIND: ResourceKind = ResourceKind::VirtualMachineOpenStack;
    const SUMMARY: &'static str = "Orphan Server";
    const LOG_NOUN: &'static str = "orphan openstack servers";

    fn artefact_name(&self) -> String {
        self.name.clone()
    }

    fn resource_name(&self) -> String {
        self.server_id.clone()
    }

    fn extra_id(&self) -> BTreeMap<String, String> {
        extra_id([
            ("server_id", self.server_id.as_str()),
            ("project_id", self.project_id.as_str()),
        ])
    }
}

impl FindingProjection for OrphanPublicAddressGcp {
    const TASK_NAME: &'static str = "odg:task:report-orphan-ip-addresses-gcp";
    const PROVIDER: ProviderName = ProviderName::Gcp;
    const KIND: ResourceKind = ResourceKind::IpAddressGcp;
    const SUMMARY: &'static str = "Orphan Public IP Address";
    const LOG_NOUN: &'static str = "orphan gcp public ip addresses";
    const EMITS_SCAN_INFO: bool = false;
    const TRACKS_RUNTIME_ARTEFACTS: bool = false;

    fn artefact_name(&self) -> String {
        self.name.clone()
    }

    fn resource_name(&self) -> String {
        format!("{}:{}", self.project_id, self.name)
    }

    fn extra_id(&self) -> BTreeMap<String, String> {
        extra_id([
            ("project_id", self.project_id.as_str()),
            ("forwarding_rule", self.name.as_str()),
        ])
    }
}

/// The component findings are associated with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComponentIdentity {
    pub name: String,
    pub version: String,
}

impl ComponentIdentity {
    pub fn new(name: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
        }
    }

    /// Filter selecting every previously reported artefact of `kind`.
    pub fn filter(&self, kind: ResourceKind) -> ComponentArtefactId {
        ComponentArtefactId::component_filter(&self.name, &self.version, kind.as_str())
    }
}

impl From<&Payload> for ComponentIdentity {
    fn from(payload: &Payload) -> Self {
        Self::new(&payload.component_name, &payload.component_version)
    }
}

/// Labels identifying the runtime artefacts of `kind` for a component.
pub fn runtime_labels(kind: ResourceKind, component_name: &str) -> LabelSet {
    LabelSet::new()
        .with(LABEL_CREATED_BY, datasource::INVENTORY)
        .with(LABEL_RESOURCE_KIND, kind.as_str())
        .with(LABEL_COMPONENT_NAME, component_name)
}

/// Maps a single row to its finding and artefact identity.
pub fn map_row<R: FindingProjection>(
    row: &R,
    component: &ComponentIdentity,
) -> (Finding, ComponentArtefactId) {
    let identity = ComponentArtefactId {
        component_name: component.name.clone(),
        component_version: component.version.clone(),
        artefact: LocalArtefactId {
            artefact_name: row.artefact_name(),
            artefact_type: R::KIND.as_str().to_string(),
            artefact_version: component.version.clone(),
            artefact_extra_id: row.extra_id(),
        },
        artefact_kind: ArtefactKind::Runtime,
    };

    let resource_name = row.resource_name();
    let attributes = serde_json::to_value(row).unwrap_or_else(|e| {
        warn!(
            task = R::TASK_NAME,
            resource_name = %resource_name,
            error = %e,
            "failed to serialize row attributes, reporting finding without them"
        );
        serde_json::Value::Object(serde_json::Map::new())
    });

    let finding = Finding {
        severity: Severity::High,
        provider_name: R::PROVIDER,
        resource_kind: R::KIND,
        resource_name,
        summary: R::SUMMARY.to_string(),
        attributes,
    };

    (finding, identity)
}

/// Everything one run submits for a resource kind.
#[derive(Debug, Clone, Default)]
pub struct MappedBatch {
    /// Findings, each followed by its scan-info entry where the kind emits one.
    pub entries: Vec<ArtefactMetadata>,
    /// Runtime artefacts to register. Empty for kinds which do not track them.
    pub runtime_artefacts: Vec<ComponentArtefactId>,
    /// Number of findings in `entries`.
    pub findings: usize,
    /// Number of rows whose identity was already produced by an earlier row.
    pub collisions: usize,
}

impl MappedBatch {
    pub fn is_empty(&self) -> bool {
        self.findings == 0
    }
}

/// Maps all rows of one run.
pub fn build_batch<R: FindingProjection>(
    rows: &[R],
    component: &ComponentIdentity,
    now: DateTime<Utc>,
) -> MappedBatch {
    let per_row = if R::EMITS_SCAN_INFO { 2 } else { 1 };
    let mut batch = MappedBatch {
        entries: Vec::with_capacity(rows.len() * per_row),
        ..Default::default()
    };
    let mut seen = HashSet::with_capacity(rows.len());
    let discovery_date = now.date_naive();

    for row in rows {
        let (finding, identity) = map_row(row, component);

        if !seen.insert(identity.clone()) {
            batch.collisions += 1;
            warn!(
                task = R::TASK_NAME,
                artefact_name = %identity.artefact.artefact_name,
                "duplicate artefact identity in mapped findings"
            );
        }

        batch.entries.push(ArtefactMetadata {
            artefact: identity.clone(),
            meta: Metadata::inventory(datatype::INVENTORY, now),
            data: Some(finding),
            discovery_date: Some(discovery_date),
        });
        batch.findings += 1;

        if R::EMITS_SCAN_INFO {
            batch.entries.push(ArtefactMetadata {
                artefact: identity.clone(),
                meta: Metadata::inventory(datatype::ARTEFACT_SCAN_INFO, now),
                data: None,
                discovery_date: Some(discovery_date),
            });
        }

        if R::TRACKS_RUNTIME_ARTEFACTS {
            batch.runtime_artefacts.push(identity);
        }
    }

    batch
}
