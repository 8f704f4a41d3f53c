//! In-memory transport for exercising the connection without a browser.
//!
//! ```ignore
//! let (parts, controller) = FakeTransportBuilder::new().build();
//! let connection = Arc::new(Connection::new(parts));
//! tokio::spawn({
//!     let conn = Arc::clone(&connection);
//!     async move { conn.run().await }
//! });
//!
//! let fut = connection.send("Page.navigate", json!({"url": "about:blank"}), None);
//! controller.inject_response(0, json!({"frameId": "F"}));
//! let result = fut.await?;
//! ```

use std::sync::Arc;

use parking_lot::Mutex;
use serde_json::{Value, json};
use tokio::sync::mpsc;

use crate::error::Result;
use crate::transport::{BoxFuture, TransportParts, TransportReceiver, TransportSender};

/// Builder for fake transport instances.
#[derive(Debug, Default)]
pub struct FakeTransportBuilder {
	_private: (),
}

impl FakeTransportBuilder {
	pub fn new() -> Self {
		Self::default()
	}

	/// Builds the transport parts and the controller that drives them.
	pub fn build(self) -> (TransportParts, FakeTransportController) {
		let (inbound_tx, inbound_rx) = mpsc::unbounded_channel();
		let (message_tx, message_rx) = mpsc::unbounded_channel();
		let sent = Arc::new(Mutex::new(Vec::new()));

		let parts = TransportParts {
			sender: Box::new(FakeSender { sent: Arc::clone(&sent) }),
			receiver: Box::new(FakeReceiver { inbound_rx, message_tx }),
			message_rx,
		};

		(parts, FakeTransportController { inbound_tx, sent })
	}
}

/// Injects inbound messages and inspects outbound ones.
#[derive(Clone)]
pub struct FakeTransportController {
	inbound_tx: mpsc::UnboundedSender<Option<Value>>,
	sent: Arc<Mutex<Vec<Value>>>,
}

impl FakeTransportController {
	/// Injects a raw inbound message.
	pub fn inject(&self, message: Value) {
		let _ = self.inbound_tx.send(Some(message));
	}

	/// Injects a successful response for request `id`.
	pub fn inject_response(&self, id: u64, result: Value) {
		self.inject(json!({ "id": id, "result": result }));
	}

	/// Injects a protocol error for request `id`.
	pub fn inject_error(&self, id: u64, code: i64, message: &str) {
		self.inject(json!({ "id": id, "error": { "code": code, "message": message } }));
	}

	/// Injects an event, optionally scoped to a target session.
	pub fn inject_event(&self, method: &str, params: Value, session_id: Option<&str>) {
		let mut event = json!({ "method": method, "params": params });
		if let Some(session_id) = session_id {
			event["sessionId"] = Value::String(session_id.to_string());
		}
		self.inject(event);
	}

	/// Simulates the browser dropping the connection.
	pub fn disconnect(&self) {
		let _ = self.inbound_tx.send(None);
	}

	/// Takes every message sent so far.
	pub fn take_sent(&self) -> Vec<Value> {
		std::mem::take(&mut *self.sent.lock())
	}

	/// Number of messages sent so far.
	pub fn sent_count(&self) -> usize {
		self.sent.lock().len()
	}
}

struct FakeSender {
	sent: Arc<Mutex<Vec<Value>>>,
}

impl TransportSender for FakeSender {
	fn send(&mut self, message: Value) -> BoxFuture<'_, Result<()>> {
		self.sent.lock().push(message);
		Box::pin(async { Ok(()) })
	}
}

struct FakeReceiver {
	inbound_rx: mpsc::UnboundedReceiver<Option<Value>>,
	message_tx: mpsc::UnboundedSender<Value>,
}

impl TransportReceiver for FakeReceiver {
	fn run(mut self: Box<Self>) -> BoxFuture<'static, Result<()>> {
		Box::pin(async move {
			while let Some(Some(message)) = self.inbound_rx.recv().await {
				if self.message_tx.send(message).is_err() {
					break;
				}
			}
			Ok(())
		})
	}
}
