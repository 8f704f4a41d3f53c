//! Message transports for the DevTools connection.
//!
//! A transport is split into a sending half, a receiving half that pumps
//! inbound JSON into an unbounded channel, and that channel's receiver. The
//! [`Connection`](crate::Connection) owns all three.

use std::future::Future;
use std::pin::Pin;

use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use serde_json::Value;
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};
use tracing::{debug, warn};

use crate::error::{Error, Result};

/// Boxed future returned by transport halves.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Sending half of a transport.
pub trait TransportSender: Send {
	/// Serializes and writes one message.
	fn send(&mut self, message: Value) -> BoxFuture<'_, Result<()>>;
}

/// Receiving half of a transport.
pub trait TransportReceiver: Send {
	/// Pumps inbound messages until the peer goes away.
	fn run(self: Box<Self>) -> BoxFuture<'static, Result<()>>;
}

/// The pieces a [`Connection`](crate::Connection) is built from.
pub struct TransportParts {
	pub sender: Box<dyn TransportSender>,
	pub receiver: Box<dyn TransportReceiver>,
	pub message_rx: mpsc::UnboundedReceiver<Value>,
}

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Websocket transport to a browser's `webSocketDebuggerUrl`.
pub struct WebSocketTransport;

impl WebSocketTransport {
	/// Opens the websocket and returns the split transport.
	pub async fn connect(url: &str) -> Result<TransportParts> {
		let (stream, _response) = tokio_tungstenite::connect_async(url).await?;
		debug!(target = "prune.cdp", %url, "websocket connected");

		let (sink, stream) = stream.split();
		let (message_tx, message_rx) = mpsc::unbounded_channel();

		Ok(TransportParts {
			sender: Box::new(WebSocketSender { sink }),
			receiver: Box::new(WebSocketReceiver { stream, message_tx }),
			message_rx,
		})
	}
}

struct WebSocketSender {
	sink: SplitSink<WsStream, Message>,
}

impl TransportSender for WebSocketSender {
	fn send(&mut self, message: Value) -> BoxFuture<'_, Result<()>> {
		Box::pin(async move {
			let text = serde_json::to_string(&message)?;
			self.sink.send(Message::Text(text.into())).await?;
			Ok(())
		})
	}
}

struct WebSocketReceiver {
	stream: SplitStream<WsStream>,
	message_tx: mpsc::UnboundedSender<Value>,
}

impl TransportReceiver for WebSocketReceiver {
	fn run(mut self: Box<Self>) -> BoxFuture<'static, Result<()>> {
		Box::pin(async move {
			while let Some(frame) = self.stream.next().await {
				let text = match frame? {
					Message::Text(text) => text,
					Message::Close(_) => break,
					_ => continue,
				};
				match serde_json::from_str::<Value>(&text) {
					Ok(value) => {
						if self.message_tx.send(value).is_err() {
							break;
						}
					}
					Err(err) => warn!(target = "prune.cdp", error = %err, "dropping unparseable frame"),
				}
			}
			Err(Error::ConnectionClosed)
		})
	}
}

#[cfg(test)]
mod tests {
	use serde_json::json;
	use tokio::net::TcpListener;

	use super::*;

	#[tokio::test]
	async fn websocket_transport_round_trip() {
		let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
		let addr = listener.local_addr().unwrap();

		let server = tokio::spawn(async move {
			let (stream, _) = listener.accept().await.unwrap();
			let ws = tokio_tungstenite::accept_async(stream).await.unwrap();
			let (mut ws_tx, mut ws_rx) = ws.split();

			let incoming = ws_rx.next().await.unwrap().unwrap();
			let parsed: Value = serde_json::from_str(incoming.to_text().unwrap()).unwrap();
			assert_eq!(parsed["method"], "Browser.getVersion");

			ws_tx
				.send(Message::Text(r#"{"id":1,"result":{"product":"Chrome"}}"#.into()))
				.await
				.unwrap();
		});

		let parts = WebSocketTransport::connect(&format!("ws://{addr}")).await.unwrap();
		let mut sender = parts.sender;
		let mut rx = parts.message_rx;
		let recv_task = tokio::spawn(parts.receiver.run());

		sender.send(json!({ "id": 1, "method": "Browser.getVersion" })).await.unwrap();

		let reply = rx.recv().await.expect("should receive reply");
		assert_eq!(reply["result"]["product"], "Chrome");

		recv_task.abort();
		let _ = recv_task.await;
		server.await.unwrap();
	}
}
