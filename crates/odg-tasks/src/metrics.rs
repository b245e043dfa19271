//! Gauges about discovered and reported orphan resources.

use metrics::{describe_gauge, gauge};
use odg_api::{ProviderName, ResourceKind};

/// Metric names.
pub mod names {
    pub const DISCOVERED_ORPHAN_RESOURCES: &str = "inventory_odg_discovered_orphan_resources";
    pub const REPORTED_ORPHAN_RESOURCES: &str = "inventory_odg_reported_orphan_resources";

    pub const LABEL_PROVIDER_NAME: &str = "provider_name";
    pub const LABEL_RESOURCE_KIND: &str = "resource_kind";
}

/// Sink for the per-kind reconciliation gauges.
pub trait ReconcileMetrics: Send + Sync {
    /// Number of orphan resources found in the inventory.
    fn set_discovered(&self, provider: ProviderName, kind: ResourceKind, count: usize);

    /// Number of orphan resources reported to the remote service.
    fn set_reported(&self, provider: ProviderName, kind: ResourceKind, count: usize);
}

/// Records the gauges through the installed `metrics` recorder.
#[derive(Debug, Clone, Copy, Default)]
pub struct RecorderMetrics;

impl ReconcileMetrics for RecorderMetrics {
    fn set_discovered(&self, provider: ProviderName, kind: ResourceKind, count: usize) {
        gauge!(
            names::DISCOVERED_ORPHAN_RESOURCES,
            names::LABEL_PROVIDER_NAME => provider.as_str(),
            names::LABEL_RESOURCE_KIND => kind.as_str()
        )
        .set(count as f64);
    }

    fn set_reported(&self, provider: ProviderName, kind: ResourceKind, count: usize) {
        gauge!(
            names::REPORTED_ORPHAN_RESOURCES,
            names::LABEL_PROVIDER_NAME => provider.as_str(),
            names::LABEL_RESOURCE_KIND => kind.as_str()
        )
        .set(count as f64);
    }
}

/// Registers help texts for the gauges. Call after installing a recorder.
pub fn describe_metrics() {
    describe_gauge!(
        names::DISCOVERED_ORPHAN_RESOURCES,
        "Number of discovered orphan resources"
    );
    describe_gauge!(
        names::REPORTED_ORPHAN_RESOURCES,
        "Number of orphan resources reported to Open Delivery Gear"
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use metrics_exporter_prometheus::PrometheusBuilder;

    #[test]
    fn test_gauges_are_labelled_and_overwritten() {
        let recorder = PrometheusBuilder::new().build_recorder();
        let handle = recorder.handle();

        metrics::with_local_recorder(&recorder, || {
            describe_metrics();
            let sink = RecorderMetrics;
            sink.set_discovered(ProviderName::Aws, ResourceKind::VirtualMachineAws, 7);
            sink.set_discovered(ProviderName::Aws, ResourceKind::VirtualMachineAws, 3);
            sink.set_reported(ProviderName::Gcp, ResourceKind::IpAddressGcp, 2);
        });

        let rendered = handle.render();
        assert!(rendered.contains(
            "inventory_odg_discovered_orphan_resources{provider_name=\"aws\",resource_kind=\"aws-virtual-machine\"} 3"
        ));
        assert!(rendered.contains(
            "inventory_odg_reported_orphan_resources{provider_name=\"gcp\",resource_kind=\"gcp-public-ip-address\"} 2"
        ));
        assert!(rendered.contains("# HELP inventory_odg_discovered_orphan_resources"));
    }
}
