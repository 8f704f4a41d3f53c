//! Chrome DevTools Protocol message envelopes and the command results we read.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Command sent to the browser.
///
/// ```json
/// { "id": 7, "method": "Page.navigate", "params": { "url": "..." }, "sessionId": "..." }
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Request {
	/// Unique request id used to correlate the response.
	pub id: u64,
	/// Domain-qualified method name.
	pub method: String,
	/// Method parameters.
	#[serde(default)]
	pub params: Value,
	/// Flattened target session the command is routed to.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub session_id: Option<String>,
}

/// Command response, either `result` or `error` is set.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Response {
	pub id: u64,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub result: Option<Value>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub error: Option<ErrorPayload>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub session_id: Option<String>,
}

/// Protocol-level error returned for a failed command.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorPayload {
	pub code: i64,
	pub message: String,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub data: Option<String>,
}

/// Unsolicited notification (no `id`).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Event {
	pub method: String,
	#[serde(default)]
	pub params: Value,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub session_id: Option<String>,
}

/// Discriminated union of inbound messages.
///
/// Messages carrying an `id` are responses, everything else is an event.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Message {
	Response(Response),
	Event(Event),
}

/// `/json/version` response subset.
#[derive(Debug, Clone, Deserialize)]
pub struct CdpVersionInfo {
	#[serde(rename = "webSocketDebuggerUrl")]
	pub web_socket_debugger_url: String,
	#[serde(rename = "Browser", default)]
	pub browser: Option<String>,
}

/// Browser cookie as returned by `Network.getCookies`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Cookie {
	pub name: String,
	pub value: String,
	#[serde(default)]
	pub domain: Option<String>,
	#[serde(default)]
	pub path: Option<String>,
	#[serde(default)]
	pub http_only: bool,
	#[serde(default)]
	pub secure: bool,
}

/// `Network.getCookies` result.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct GetCookiesResult {
	#[serde(default)]
	pub cookies: Vec<Cookie>,
}

/// `Target.createTarget` result.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateTargetResult {
	pub target_id: String,
}

/// `Target.attachToTarget` result.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttachToTargetResult {
	pub session_id: String,
}

/// `Page.navigate` result. `errorText` is set when navigation failed outright.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NavigateResult {
	#[serde(default)]
	pub frame_id: Option<String>,
	#[serde(default)]
	pub error_text: Option<String>,
}

/// Subset of `Runtime.RemoteObject` used with `returnByValue`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RemoteObject {
	#[serde(rename = "type", default)]
	pub kind: Option<String>,
	#[serde(default)]
	pub value: Option<Value>,
	#[serde(default)]
	pub description: Option<String>,
}

/// `Runtime.evaluate` exception details.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExceptionDetails {
	#[serde(default)]
	pub text: String,
	#[serde(default)]
	pub exception: Option<RemoteObject>,
}

impl ExceptionDetails {
	/// Best human-readable description of the thrown value.
	pub fn message(&self) -> String {
		self.exception
			.as_ref()
			.and_then(|e| e.description.clone())
			.unwrap_or_else(|| self.text.clone())
	}
}

/// `Runtime.evaluate` result.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EvaluateResult {
	#[serde(default)]
	pub result: RemoteObject,
	#[serde(default)]
	pub exception_details: Option<ExceptionDetails>,
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn message_with_id_is_response() {
		let msg: Message = serde_json::from_str(r#"{"id": 3, "result": {"frameId": "F"}, "sessionId": "S"}"#).unwrap();
		match msg {
			Message::Response(r) => {
				assert_eq!(r.id, 3);
				assert_eq!(r.session_id.as_deref(), Some("S"));
				assert!(r.error.is_none());
			}
			Message::Event(_) => panic!("expected response"),
		}
	}

	#[test]
	fn message_without_id_is_event() {
		let msg: Message = serde_json::from_str(r#"{"method": "Target.targetDestroyed", "params": {"targetId": "T"}}"#).unwrap();
		match msg {
			Message::Event(e) => {
				assert_eq!(e.method, "Target.targetDestroyed");
				assert_eq!(e.params["targetId"], "T");
			}
			Message::Response(_) => panic!("expected event"),
		}
	}

	#[test]
	fn error_response_keeps_code_and_message() {
		let msg: Message = serde_json::from_str(r#"{"id": 9, "error": {"code": -32000, "message": "Target closed"}}"#).unwrap();
		let Message::Response(r) = msg else { panic!("expected response") };
		let err = r.error.unwrap();
		assert_eq!(err.code, -32000);
		assert_eq!(err.message, "Target closed");
	}

	#[test]
	fn request_omits_missing_session() {
		let req = Request {
			id: 1,
			method: "Target.getTargets".into(),
			params: Value::Null,
			session_id: None,
		};
		let json = serde_json::to_value(&req).unwrap();
		assert!(json.get("sessionId").is_none());
	}

	#[test]
	fn evaluate_exception_prefers_description() {
		let result: EvaluateResult = serde_json::from_str(
			r#"{"result": {"type": "object"}, "exceptionDetails": {"text": "Uncaught", "exception": {"type": "object", "description": "TypeError: boom"}}}"#,
		)
		.unwrap();
		assert_eq!(result.exception_details.unwrap().message(), "TypeError: boom");
	}
}
