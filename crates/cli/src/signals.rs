use tokio::sync::watch;
use tracing::{info, warn};

/// Flips `shutdown` on Ctrl-C. On unix SIGTERM and SIGHUP are logged and
/// ignored so the scheduler keeps running.
pub fn spawn(shutdown: watch::Sender<bool>) -> std::io::Result<()> {
	#[cfg(unix)]
	{
		use tokio::signal::unix::{SignalKind, signal};

		let mut sigint = signal(SignalKind::interrupt())?;
		let mut sigterm = signal(SignalKind::terminate())?;
		let mut sighup = signal(SignalKind::hangup())?;
		tokio::spawn(async move {
			loop {
				tokio::select! {
					_ = sigint.recv() => {
						info!(target = "prune", "SIGINT received; closing the browser");
						break;
					}
					_ = sigterm.recv() => warn!(target = "prune", "SIGTERM received; ignoring (use Ctrl-C to stop)"),
					_ = sighup.recv() => warn!(target = "prune", "SIGHUP received; ignoring"),
				}
			}
			shutdown.send_replace(true);
		});
	}

	#[cfg(not(unix))]
	tokio::spawn(async move {
		if let Err(err) = tokio::signal::ctrl_c().await {
			warn!(target = "prune", error = %err, "failed to listen for Ctrl-C");
			return;
		}
		info!(target = "prune", "Ctrl-C received; closing the browser");
		shutdown.send_replace(true);
	});

	Ok(())
}
