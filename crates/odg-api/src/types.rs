//! Wire types of the Open Delivery Gear API.
//!
//! These mirror the upstream delivery-service models (`dso.model`) field for
//! field. The JSON names are a contract with the remote service and must not
//! be renamed.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Deserializer, Serialize};

/// Datasource values used in [`Metadata::datasource`].
pub mod datasource {
    /// Entries created by the inventory extension.
    pub const INVENTORY: &str = "inventory";
}

/// Datatype values used in [`Metadata::datatype`] and as the `type` query
/// parameter of the metadata query endpoint.
pub mod datatype {
    /// An inventory finding (orphan resource).
    pub const INVENTORY: &str = "finding/inventory";

    /// Marker that an artefact has been scanned by a datasource.
    pub const ARTEFACT_SCAN_INFO: &str = "meta/artefact_scan_info";
}

/// Kind of an artefact, see upstream `ArtefactKind`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ArtefactKind {
    Artefact,
    Resource,
    #[default]
    Runtime,
    Source,
}

/// Severity of a finding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Severity {
    None,
    Low,
    Medium,
    High,
    Critical,
    Blocker,
}

/// Cloud provider an orphan resource originates from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderName {
    Aws,
    Gcp,
    Azure,
    #[serde(rename = "openstack")]
    OpenStack,
}

impl ProviderName {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Aws => "aws",
            Self::Gcp => "gcp",
            Self::Azure => "azure",
            Self::OpenStack => "openstack",
        }
    }
}

impl fmt::Display for ProviderName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Kind of an orphan resource. Also used as the artefact type of the
/// associated artefact identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ResourceKind {
    #[serde(rename = "aws-virtual-machine")]
    VirtualMachineAws,
    #[serde(rename = "gcp-virtual-machine")]
    VirtualMachineGcp,
    #[serde(rename = "azure-virtual-machine")]
    VirtualMachineAzure,
    #[serde(rename = "openstack-virtual-machine")]
    VirtualMachineOpenStack,
    #[serde(rename = "gcp-public-ip-address")]
    IpAddressGcp,
}

impl ResourceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::VirtualMachineAws => "aws-virtual-machine",
            Self::VirtualMachineGcp => "gcp-virtual-machine",
            Self::VirtualMachineAzure => "azure-virtual-machine",
            Self::VirtualMachineOpenStack => "openstack-virtual-machine",
            Self::IpAddressGcp => "gcp-public-ip-address",
        }
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Representation of the upstream `InventoryFinding`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Finding {
    pub severity: Severity,

    /// Provider the orphan resource originates from.
    pub provider_name: ProviderName,

    /// Kind of the orphan resource.
    pub resource_kind: ResourceKind,

    /// Unique name of the orphan resource within the provider.
    pub resource_name: String,

    /// Short summary of the finding.
    pub summary: String,

    /// Raw attributes of the inventory row the finding was built from.
    #[serde(default)]
    pub attributes: serde_json::Value,
}

/// Representation of the upstream `LocalArtefactId`.
///
/// `artefact_extra_id` is kept in a [`BTreeMap`], so equality and hashing do
/// not depend on insertion order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LocalArtefactId {
    #[serde(default)]
    pub artefact_name: String,
    #[serde(default)]
    pub artefact_type: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub artefact_version: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub artefact_extra_id: BTreeMap<String, String>,
}

/// Representation of the upstream `ComponentArtefactId`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ComponentArtefactId {
    #[serde(default)]
    pub component_name: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub component_version: String,
    pub artefact: LocalArtefactId,
    #[serde(default)]
    pub artefact_kind: ArtefactKind,
}

impl ComponentArtefactId {
    /// Filter matching every artefact of the given type for a component.
    pub fn component_filter(
        component_name: impl Into<String>,
        component_version: impl Into<String>,
        artefact_type: impl Into<String>,
    ) -> Self {
        Self {
            component_name: component_name.into(),
            component_version: component_version.into(),
            artefact: LocalArtefactId {
                artefact_type: artefact_type.into(),
                ..Default::default()
            },
            artefact_kind: ArtefactKind::Runtime,
        }
    }
}

/// Representation of the upstream `Metadata`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Metadata {
    pub datasource: String,
    #[serde(rename = "type")]
    pub datatype: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub creation_date: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_update: Option<DateTime<Utc>>,
}

impl Metadata {
    /// Metadata for an entry created by the inventory datasource at `now`.
    pub fn inventory(datatype: &str, now: DateTime<Utc>) -> Self {
        Self {
            datasource: datasource::INVENTORY.to_string(),
            datatype: datatype.to_string(),
            creation_date: Some(now),
            last_update: Some(now),
        }
    }
}

/// Representation of the upstream `ArtefactMetadata`.
///
/// Scan-info entries carry no `data`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArtefactMetadata {
    pub artefact: ComponentArtefactId,
    pub meta: Metadata,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Finding>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub discovery_date: Option<NaiveDate>,
}

/// Object metadata of a runtime artefact as returned by the
/// runtime-artefacts service extension.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuntimeArtefactObjectMeta {
    pub name: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub labels: BTreeMap<String, String>,
}

/// Spec of a runtime artefact.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuntimeArtefactSpec {
    #[serde(default)]
    pub artefact: Option<ComponentArtefactId>,
}

/// An item returned when listing runtime artefacts.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuntimeArtefactResultItem {
    pub metadata: RuntimeArtefactObjectMeta,
    #[serde(default)]
    pub spec: RuntimeArtefactSpec,
}

/// Request body wrapping artefact metadata entries or query filters.
#[derive(Debug, Serialize)]
pub struct Entries<'a, T> {
    pub entries: &'a [T],
}

/// Request body used when uploading runtime artefacts.
#[derive(Debug, Serialize)]
pub struct RuntimeArtefactUpload<'a> {
    pub artefacts: &'a [ComponentArtefactId],
}

/// An unordered set of runtime-artefact labels.
///
/// An item matches when it carries every label of the set with an identical
/// value. Extra labels on the item are ignored.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LabelSet(BTreeMap<String, String>);

impl LabelSet {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.0.insert(key.into(), value.into());
        self
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Returns `true` if every label of this set appears in `labels` with the
    /// same value.
    pub fn matches(&self, labels: &BTreeMap<String, String>) -> bool {
        self.0
            .iter()
            .all(|(key, value)| labels.get(key).is_some_and(|v| v == value))
    }

    /// Encodes the set as repeated `label=key:value` query parameters.
    pub fn to_query(&self) -> Vec<(&'static str, String)> {
        self.0
            .iter()
            .map(|(key, value)| ("label", format!("{key}:{value}")))
            .collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for LabelSet {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(
            iter.into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }
}

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}
