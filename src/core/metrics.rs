use std::sync::OnceLock;

use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};

use crate::core::config::Settings;

static RECORDER: OnceLock<PrometheusHandle> = OnceLock::new();

/// Installs the Prometheus recorder when enabled. A no-op on repeat
/// calls so test routers can share one process-wide recorder.
pub(crate) fn install(settings: &Settings) -> anyhow::Result<()> {
    if !settings.telemetry().prometheus_enabled || RECORDER.get().is_some() {
        return Ok(());
    }

    let handle = PrometheusBuilder::new().install_recorder()?;
    let _ = RECORDER.set(handle);
    Ok(())
}

/// Current metrics in the Prometheus exposition format, or `None` when
/// the recorder was never installed.
pub(crate) fn scrape() -> Option<String> {
    RECORDER.get().map(PrometheusHandle::render)
}
