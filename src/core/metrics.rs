use std::sync::OnceLock;

use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};

use crate::core::config::Settings;

/// Page grades recorded through the grading page, labeled neither by course
/// nor by grader to keep cardinality flat.
pub(crate) const GRADES_RECORDED: &str = "grades_recorded_total";
/// Flow sessions closed and aggregated (student finish, machine grading
/// included).
pub(crate) const SESSIONS_FINISHED: &str = "flow_sessions_finished_total";

static PROM_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

pub(crate) fn init(settings: &Settings) -> anyhow::Result<()> {
    if !settings.telemetry().prometheus_enabled {
        return Ok(());
    }

    let handle = PrometheusBuilder::new().install_recorder()?;
    if PROM_HANDLE.set(handle).is_err() {
        tracing::debug!("Prometheus recorder already installed");
        return Ok(());
    }

    metrics::describe_counter!(
        GRADES_RECORDED,
        "Page visit grades recorded by instructors and TAs"
    );
    metrics::describe_counter!(
        SESSIONS_FINISHED,
        "Flow sessions finished and aggregated"
    );

    Ok(())
}

pub(crate) fn render() -> Option<String> {
    PROM_HANDLE.get().map(|handle| handle.render())
}
