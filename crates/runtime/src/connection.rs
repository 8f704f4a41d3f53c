//! DevTools connection: request/response correlation and event fan-out.
//!
//! # Message Flow
//!
//! 1. Caller invokes [`Connection::send`] with a method, params and optional
//!    target session id
//! 2. The connection allocates an id and parks a oneshot sender under it
//! 3. The request is written through the transport
//! 4. [`Connection::run`] reads inbound messages; responses complete the
//!    parked oneshot, events are broadcast to subscribers
//! 5. When the transport ends every pending request fails with
//!    [`Error::ConnectionClosed`] and the `closed` watch flips to `true`

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use parking_lot::Mutex;
use prune_protocol::{Event, Message, Request};
use serde_json::Value;
use tokio::sync::{broadcast, mpsc, oneshot, watch};
use tracing::{debug, trace, warn};

use crate::error::{Error, Result};
use crate::transport::{TransportParts, TransportReceiver, TransportSender};

const EVENT_CAPACITY: usize = 256;

type Callback = oneshot::Sender<Result<Value>>;

/// Connection to one browser endpoint.
///
/// Shared between tasks behind an `Arc`; [`run`](Connection::run) must be
/// spawned exactly once.
pub struct Connection {
	last_id: AtomicU64,
	callbacks: Mutex<HashMap<u64, Callback>>,
	sender: tokio::sync::Mutex<Box<dyn TransportSender>>,
	receiver: Mutex<Option<Box<dyn TransportReceiver>>>,
	message_rx: Mutex<Option<mpsc::UnboundedReceiver<Value>>>,
	events: broadcast::Sender<Event>,
	closed: watch::Sender<bool>,
}

impl Connection {
	pub fn new(parts: TransportParts) -> Self {
		let (events, _) = broadcast::channel(EVENT_CAPACITY);
		let (closed, _) = watch::channel(false);
		Self {
			last_id: AtomicU64::new(1),
			callbacks: Mutex::new(HashMap::new()),
			sender: tokio::sync::Mutex::new(parts.sender),
			receiver: Mutex::new(Some(parts.receiver)),
			message_rx: Mutex::new(Some(parts.message_rx)),
			events,
			closed,
		}
	}

	/// Sends a command and waits for its response.
	pub async fn send(&self, method: &str, params: Value, session_id: Option<&str>) -> Result<Value> {
		let (id, rx) = self.register();
		if let Err(err) = self.write(id, method, params, session_id).await {
			self.callbacks.lock().remove(&id);
			return Err(err);
		}
		rx.await.map_err(|_| Error::ConnectionClosed).and_then(|result| result)
	}

	/// Like [`send`](Self::send) but gives up after `timeout`.
	pub async fn send_timeout(&self, method: &str, params: Value, session_id: Option<&str>, timeout: Duration) -> Result<Value> {
		let (id, rx) = self.register();
		if let Err(err) = self.write(id, method, params, session_id).await {
			self.callbacks.lock().remove(&id);
			return Err(err);
		}
		match tokio::time::timeout(timeout, rx).await {
			Ok(result) => result.map_err(|_| Error::ConnectionClosed).and_then(|result| result),
			Err(_) => {
				self.callbacks.lock().remove(&id);
				Err(Error::Timeout {
					method: method.to_string(),
					timeout,
				})
			}
		}
	}

	/// Subscribes to protocol events received after this call.
	pub fn subscribe(&self) -> broadcast::Receiver<Event> {
		self.events.subscribe()
	}

	/// Watch that flips to `true` once the transport has ended.
	pub fn closed(&self) -> watch::Receiver<bool> {
		self.closed.subscribe()
	}

	pub fn is_closed(&self) -> bool {
		*self.closed.borrow()
	}

	/// Runs the dispatch loop until the transport ends.
	pub async fn run(&self) {
		let receiver = self.receiver.lock().take();
		let message_rx = self.message_rx.lock().take();
		let (Some(receiver), Some(mut message_rx)) = (receiver, message_rx) else {
			warn!(target = "prune.cdp", "connection loop started twice; ignoring");
			return;
		};

		let pump = tokio::spawn(async move {
			if let Err(err) = receiver.run().await {
				debug!(target = "prune.cdp", error = %err, "transport ended");
			}
		});

		while let Some(raw) = message_rx.recv().await {
			match serde_json::from_value::<Message>(raw) {
				Ok(message) => self.dispatch(message),
				Err(err) => warn!(target = "prune.cdp", error = %err, "failed to parse inbound message"),
			}
		}

		let _ = pump.await;
		self.shutdown();
	}

	fn register(&self) -> (u64, oneshot::Receiver<Result<Value>>) {
		let id = self.last_id.fetch_add(1, Ordering::SeqCst);
		let (tx, rx) = oneshot::channel();
		self.callbacks.lock().insert(id, tx);
		(id, rx)
	}

	async fn write(&self, id: u64, method: &str, params: Value, session_id: Option<&str>) -> Result<()> {
		if self.is_closed() {
			return Err(Error::ConnectionClosed);
		}
		let request = Request {
			id,
			method: method.to_string(),
			params,
			session_id: session_id.map(str::to_string),
		};
		trace!(target = "prune.cdp", id, %method, "send");
		let value = serde_json::to_value(&request)?;
		self.sender.lock().await.send(value).await
	}

	fn dispatch(&self, message: Message) {
		match message {
			Message::Response(response) => {
				let Some(callback) = self.callbacks.lock().remove(&response.id) else {
					debug!(target = "prune.cdp", id = response.id, "response for unknown or abandoned request");
					return;
				};
				let result = match response.error {
					Some(error) => Err(Error::Protocol {
						code: error.code,
						message: error.message,
					}),
					None => Ok(response.result.unwrap_or(Value::Null)),
				};
				let _ = callback.send(result);
			}
			Message::Event(event) => {
				trace!(target = "prune.cdp", method = %event.method, "event");
				let _ = self.events.send(event);
			}
		}
	}

	fn shutdown(&self) {
		let pending: Vec<Callback> = self.callbacks.lock().drain().map(|(_, cb)| cb).collect();
		for callback in pending {
			let _ = callback.send(Err(Error::ConnectionClosed));
		}
		self.closed.send_replace(true);
		debug!(target = "prune.cdp", "connection closed");
	}
}
