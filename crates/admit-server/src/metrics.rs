//! Prometheus recorder.

use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use std::sync::OnceLock;
use tracing::{error, info, warn};

static PROMETHEUS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

/// Installs the global recorder and registers metric descriptions.
///
/// Returns false if a recorder could not be installed.
pub fn init_metrics() -> bool {
    if PROMETHEUS_HANDLE.get().is_some() {
        return true;
    }

    match PrometheusBuilder::new().install_recorder() {
        Ok(handle) => {
            if PROMETHEUS_HANDLE.set(handle).is_err() {
                warn!("Failed to store Prometheus handle (already set)");
                return false;
            }
            admit_cache::metrics::register_metrics();
            admit_realtime::metrics::register_metrics();
            info!("Prometheus metrics initialized");
            true
        }
        Err(e) => {
            error!(error = %e, "Failed to install Prometheus recorder");
            false
        }
    }
}

/// Renders all metrics in Prometheus text format, or `None` if metrics were
/// never initialized.
pub fn render_metrics() -> Option<String> {
    PROMETHEUS_HANDLE.get().map(PrometheusHandle::render)
}
