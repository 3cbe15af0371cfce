use tokio::signal;

/// Resolves when the process is asked to stop, then logs which signal
/// triggered the drain. Grading transactions already in flight run to
/// completion under axum's graceful shutdown.
pub(crate) async fn shutdown_signal() {
    let triggered_by = wait_for_signal().await;
    tracing::info!(signal = triggered_by, "Shutdown requested; draining in-flight grading requests");
}

#[cfg(unix)]
async fn wait_for_signal() -> &'static str {
    use tokio::signal::unix::SignalKind;

    let mut sigterm = match signal::unix::signal(SignalKind::terminate()) {
        Ok(stream) => stream,
        Err(err) => {
            tracing::error!(error = %err, "Failed to install SIGTERM handler; falling back to Ctrl+C only");
            wait_for_ctrl_c().await;
            return "SIGINT";
        }
    };

    tokio::select! {
        _ = sigterm.recv() => "SIGTERM",
        _ = wait_for_ctrl_c() => "SIGINT",
    }
}

#[cfg(not(unix))]
async fn wait_for_signal() -> &'static str {
    wait_for_ctrl_c().await;
    "ctrl-c"
}

async fn wait_for_ctrl_c() {
    if let Err(err) = signal::ctrl_c().await {
        tracing::error!(error = %err, "Failed to install Ctrl+C handler");
        std::future::pending::<()>().await;
    }
}
