use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};

pub const COMMANDS_TOTAL: &str = "fakestore_commands_total";
pub const EXPIRED_KEYS_TOTAL: &str = "fakestore_expired_keys_total";
pub const WATCH_CONFLICTS_TOTAL: &str = "fakestore_watch_conflicts_total";
pub const TRANSACTIONS_TOTAL: &str = "fakestore_transactions_total";

/// Install a global Prometheus recorder and return its render handle.
/// Without a recorder every counter below is a no-op.
pub fn init_metrics() -> Option<PrometheusHandle> {
    match PrometheusBuilder::new().install_recorder() {
        Ok(handle) => Some(handle),
        Err(err) => {
            tracing::warn!(error = %err, "failed to install prometheus metrics recorder");
            None
        }
    }
}
