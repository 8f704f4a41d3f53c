//! A Chrome instance driven over one DevTools websocket.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use prune_protocol::{AttachToTargetResult, CreateTargetResult};
use prune_runtime::{Connection, TransportParts};
use serde_json::{Value, json};
use tokio::process::Child;
use tokio::sync::{broadcast, watch};
use tracing::debug;

use crate::driver::{CdpPage, PageDriver};
use crate::error::Result;
use crate::session::Browser;

/// Page and connection settings for a new browser.
#[derive(Debug, Clone)]
pub(super) struct PageSettings {
	pub cookie_url: String,
	pub command_timeout: Duration,
	pub navigation_timeout: Duration,
}

pub struct ChromeBrowser {
	connection: Arc<Connection>,
	page: Arc<CdpPage>,
	closed: watch::Sender<bool>,
	/// Set for browsers we launched; attached browsers only lose our tab.
	/// Spawned with `kill_on_drop`, so dropping the browser stops it.
	child: Mutex<Option<Child>>,
	command_timeout: Duration,
}

impl ChromeBrowser {
	/// Opens a fresh tab on the browser behind `parts` and attaches to it.
	///
	/// A launched `child` is killed when the tab cannot be set up.
	pub(super) async fn open(parts: TransportParts, child: Option<Child>, settings: PageSettings) -> Result<Arc<Self>> {
		let connection = Arc::new(Connection::new(parts));
		let runner = Arc::clone(&connection);
		tokio::spawn(async move { runner.run().await });

		let events = connection.subscribe();
		let timeout = settings.command_timeout;
		let (target_id, session_id) = match create_page(&connection, timeout).await {
			Ok(ids) => ids,
			Err(err) => {
				if let Some(child) = child {
					super::reap(child).await;
				}
				return Err(err);
			}
		};
		debug!(target = "prune.cdp", %target_id, %session_id, "page attached");

		let page = Arc::new(CdpPage::new(
			Arc::clone(&connection),
			target_id,
			session_id,
			settings.cookie_url,
			settings.command_timeout,
			settings.navigation_timeout,
		));
		let (closed, _) = watch::channel(false);
		let browser = Arc::new(Self {
			connection,
			page,
			closed,
			child: Mutex::new(child),
			command_timeout: timeout,
		});
		browser.watch_target(events);
		Ok(browser)
	}

	/// Flips `closed` when the connection drops or our page goes away.
	fn watch_target(self: &Arc<Self>, mut events: broadcast::Receiver<prune_protocol::Event>) {
		let mut connection_closed = self.connection.closed();
		let closed = self.closed.clone();
		let target_id = self.page.target_id().to_string();
		let session_id = self.page.session_id().to_string();
		tokio::spawn(async move {
			loop {
				tokio::select! {
					changed = connection_closed.changed() => {
						if changed.is_err() || *connection_closed.borrow() {
							debug!(target = "prune.cdp", "browser connection closed");
							break;
						}
					}
					event = events.recv() => match event {
						Ok(event) if ends_page(&event.method, &event.params, &target_id, &session_id) => {
							debug!(target = "prune.cdp", method = %event.method, "page target gone");
							break;
						}
						Ok(_) | Err(broadcast::error::RecvError::Lagged(_)) => {}
						Err(broadcast::error::RecvError::Closed) => break,
					},
				}
			}
			closed.send_replace(true);
		});
	}
}

/// Creates a blank tab and attaches a flat session to it.
async fn create_page(connection: &Connection, timeout: Duration) -> Result<(String, String)> {
	connection
		.send_timeout("Target.setDiscoverTargets", json!({ "discover": true }), None, timeout)
		.await?;
	let created: CreateTargetResult = serde_json::from_value(
		connection
			.send_timeout("Target.createTarget", json!({ "url": "about:blank" }), None, timeout)
			.await?,
	)?;
	let attached: AttachToTargetResult = serde_json::from_value(
		connection
			.send_timeout(
				"Target.attachToTarget",
				json!({ "targetId": created.target_id, "flatten": true }),
				None,
				timeout,
			)
			.await?,
	)?;
	Ok((created.target_id, attached.session_id))
}

fn ends_page(method: &str, params: &Value, target_id: &str, session_id: &str) -> bool {
	match method {
		"Target.targetDestroyed" | "Target.targetCrashed" => params["targetId"] == target_id,
		"Target.detachedFromTarget" => params["sessionId"] == session_id,
		"Inspector.detached" => true,
		_ => false,
	}
}

#[async_trait]
impl Browser for ChromeBrowser {
	fn page(&self) -> Arc<dyn PageDriver> {
		Arc::clone(&self.page) as Arc<dyn PageDriver>
	}

	fn closed(&self) -> watch::Receiver<bool> {
		self.closed.subscribe()
	}

	async fn close(&self) {
		let child = self.child.lock().take();
		let (method, params) = if child.is_some() {
			("Browser.close", json!({}))
		} else {
			("Target.closeTarget", json!({ "targetId": self.page.target_id() }))
		};
		if let Err(err) = self.connection.send_timeout(method, params, None, self.command_timeout).await {
			debug!(target = "prune.cdp", %method, error = %err, "close request failed");
		}
		if let Some(mut child) = child {
			if tokio::time::timeout(self.command_timeout, child.wait()).await.is_err() {
				debug!(target = "prune.cdp", "browser still running after close; killing it");
				super::reap(child).await;
			}
		}
		self.closed.send_replace(true);
	}
}
