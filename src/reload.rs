use tokio::sync::watch;
use tracing::info;

/// Receiver side of the reload request channel
///
/// The value is a generation counter; every change is one reload request.
pub type ReloadReceiver = watch::Receiver<u64>;

/// Create a reload channel and spawn the SIGUSR2 handler feeding it
///
/// Must be called from within a tokio runtime.
#[cfg(unix)]
pub fn setup_reload_signal() -> ReloadReceiver {
    let (reload_tx, reload_rx) = watch::channel(0u64);

    tokio::spawn(async move {
        use tokio::signal::unix::{signal, SignalKind};

        let mut sigusr2 = match signal(SignalKind::user_defined2()) {
            Ok(s) => s,
            Err(e) => {
                tracing::error!(target: "scripting", "Failed to register SIGUSR2 handler: {}", e);
                return;
            }
        };

        while sigusr2.recv().await.is_some() {
            if reload_tx.is_closed() {
                info!(target: "scripting", "Reload receiver dropped, shutting down SIGUSR2 handler");
                break;
            }

            info!(target: "scripting", "Received SIGUSR2 - triggering module reload");
            reload_tx.send_modify(|generation| *generation += 1);
        }
    });

    reload_rx
}

/// Create a reload channel (non-Unix platforms don't support SIGUSR2)
#[cfg(not(unix))]
pub fn setup_reload_signal() -> ReloadReceiver {
    let (reload_tx, reload_rx) = watch::channel(0u64);
    tracing::warn!(target: "scripting", "SIGUSR2 reload not supported on this platform");
    // Keep the sender alive so the receiver never reports a closed channel
    std::mem::forget(reload_tx);
    reload_rx
}

/// Whether a reload was requested since the last call; marks it as seen
pub fn take_reload_request(rx: &mut ReloadReceiver) -> bool {
    match rx.has_changed() {
        Ok(true) => {
            rx.borrow_and_update();
            true
        }
        _ => false,
    }
}
