//! Reconciliation of stored state against a vendor report.
//!
//! The policy decides whether the vendor's view is applied to the stored
//! record. The resulting update always goes through `save_state`, so
//! `last_updated` is refreshed even when nothing is applied.

use serde::Serialize;
use tracing::debug;

use dockyard_core::ReconcilePolicy;
use dockyard_providers::ProviderReport;
use dockyard_state::{ResourceMapping, StateRecord, StateUpdate};

/// Outcome of `sync_resource_state`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SyncReport {
    /// The record after reconciliation.
    pub mapping: ResourceMapping,
    /// Fields the vendor report changed.
    pub changed_fields: Vec<String>,
    pub policy: ReconcilePolicy,
    /// False when the policy kept the stored record.
    pub applied: bool,
}

/// Whether a vendor report should be applied over the stored record.
pub fn vendor_is_current(policy: ReconcilePolicy, stored: &StateRecord, report: &ProviderReport) -> bool {
    match policy {
        ReconcilePolicy::VendorWins => true,
        ReconcilePolicy::LastWriterWins => report.observed_at >= stored.last_updated,
    }
}

/// Build the update that reconciles `stored` with `report` under `policy`.
///
/// When the report is not applied the update carries no fields.
pub fn reconcile(policy: ReconcilePolicy, stored: &StateRecord, report: &ProviderReport) -> (StateUpdate, bool) {
    let mut update = StateUpdate::new(&stored.provider_resource_id);
    if !vendor_is_current(policy, stored, report) {
        debug!(
            resource_id = %stored.resource_id,
            observed_at = report.observed_at,
            last_updated = stored.last_updated,
            "vendor report is older than stored state, keeping stored fields"
        );
        return (update, false);
    }

    update.status = Some(report.status.to_state());
    update.vendor_resource_id = Some(report.vendor_resource_id.clone());
    update.reported = report.fields.clone();
    (update, true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use dockyard_core::{Category, ProviderKind, ResourceState};
    use dockyard_providers::ReportedStatus;
    use dockyard_state::RecordState;
    use serde_json::json;

    fn stored(last_updated: u64) -> StateRecord {
        StateRecord {
            resource_id: "database-neon-1".to_string(),
            resource_type: "database".to_string(),
            provider: "neon".to_string(),
            provider_resource_id: "database-neon-1".to_string(),
            category: Category::Databases,
            state: RecordState::new(
                Category::Databases,
                ProviderKind::Adapter,
                ResourceState::Provisioning,
            ),
            last_updated,
        }
    }

    fn report(observed_at: u64) -> ProviderReport {
        ProviderReport {
            vendor_resource_id: "br-cool-sun-1234".to_string(),
            status: ReportedStatus::Ready,
            fields: json!({"endpoint": "ep-1.neon.tech", "engine": "postgres"})
                .as_object()
                .cloned()
                .unwrap(),
            observed_at,
        }
    }

    #[test]
    fn vendor_wins_applies_stale_reports() {
        let (update, applied) = reconcile(ReconcilePolicy::VendorWins, &stored(2_000), &report(1_000));
        assert!(applied);
        assert_eq!(update.status, Some(ResourceState::Provisioned));
        assert_eq!(update.vendor_resource_id.as_deref(), Some("br-cool-sun-1234"));
        assert_eq!(update.reported.len(), 2);
    }

    #[test]
    fn last_writer_wins_ignores_older_reports() {
        let (update, applied) =
            reconcile(ReconcilePolicy::LastWriterWins, &stored(2_000), &report(1_000));
        assert!(!applied);
        assert_eq!(update.provider_resource_id, "database-neon-1");
        assert!(update.status.is_none());
        assert!(update.reported.is_empty());
    }

    #[test]
    fn last_writer_wins_applies_newer_reports() {
        let (update, applied) =
            reconcile(ReconcilePolicy::LastWriterWins, &stored(2_000), &report(2_000));
        assert!(applied);
        assert_eq!(update.status, Some(ResourceState::Provisioned));
    }

    #[test]
    fn applied_update_merges_into_known_fields() {
        let mut record = stored(0);
        let (update, _) = reconcile(ReconcilePolicy::VendorWins, &record, &report(1));
        let changed = record.merge(&update);
        assert_eq!(changed, ["status", "vendor_resource_id", "endpoint", "engine"]);
        assert_eq!(
            record.state.fields.get("endpoint"),
            Some(&Some("ep-1.neon.tech".to_string()))
        );
    }
}
