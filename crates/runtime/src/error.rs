//! Error type for the DevTools runtime.

use std::time::Duration;

/// Failures raised while talking to the browser.
#[derive(Debug, thiserror::Error)]
pub enum Error {
	#[error("transport error: {0}")]
	Transport(String),

	#[error("websocket error: {0}")]
	WebSocket(#[from] Box<tokio_tungstenite::tungstenite::Error>),

	#[error("protocol error {code}: {message}")]
	Protocol { code: i64, message: String },

	#[error("timed out after {timeout:?} waiting for {method}")]
	Timeout { method: String, timeout: Duration },

	#[error("connection closed")]
	ConnectionClosed,

	#[error("invalid message: {0}")]
	Json(#[from] serde_json::Error),

	#[error(transparent)]
	Io(#[from] std::io::Error),
}

impl From<tokio_tungstenite::tungstenite::Error> for Error {
	fn from(err: tokio_tungstenite::tungstenite::Error) -> Self {
		Error::WebSocket(Box::new(err))
	}
}

impl Error {
	/// Returns `true` for command timeouts.
	pub fn is_timeout(&self) -> bool {
		matches!(self, Error::Timeout { .. })
	}

	/// Returns `true` when the browser, target, or session went away.
	pub fn is_closed(&self) -> bool {
		match self {
			Error::ConnectionClosed | Error::WebSocket(_) => true,
			Error::Protocol { message, .. } => {
				let message = message.to_ascii_lowercase();
				message.contains("target closed") || message.contains("session with given id not found") || message.contains("no target with given id")
			}
			_ => false,
		}
	}
}

/// Result alias for runtime operations.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn closed_target_protocol_errors_count_as_closed() {
		let err = Error::Protocol {
			code: -32000,
			message: "Session with given id not found.".into(),
		};
		assert!(err.is_closed());
		assert!(!err.is_timeout());
	}

	#[test]
	fn generic_protocol_errors_are_not_closed() {
		let err = Error::Protocol {
			code: -32602,
			message: "Invalid parameters".into(),
		};
		assert!(!err.is_closed());
	}
}
