//! [`PageDriver`] over a DevTools page session.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use prune_protocol::{Cookie, EvaluateResult, GetCookiesResult, NavigateResult};
use prune_runtime::Connection;
use serde_json::{Value, json};
use tracing::{debug, trace};

use super::script::{self, Op};
use super::{Intent, ListScope, PageDriver};
use crate::error::{PruneError, Result};
use crate::wait::Poll;

/// A page target attached through a flat DevTools session.
pub struct CdpPage {
	connection: Arc<Connection>,
	session_id: String,
	target_id: String,
	cookie_url: String,
	command_timeout: Duration,
	navigation_timeout: Duration,
}

impl CdpPage {
	pub fn new(
		connection: Arc<Connection>,
		target_id: String,
		session_id: String,
		cookie_url: String,
		command_timeout: Duration,
		navigation_timeout: Duration,
	) -> Self {
		Self {
			connection,
			session_id,
			target_id,
			cookie_url,
			command_timeout,
			navigation_timeout,
		}
	}

	pub fn target_id(&self) -> &str {
		&self.target_id
	}

	pub fn session_id(&self) -> &str {
		&self.session_id
	}

	async fn call(&self, method: &str, params: Value) -> Result<Value> {
		Ok(self
			.connection
			.send_timeout(method, params, Some(&self.session_id), self.command_timeout)
			.await?)
	}

	/// Evaluates `expression` and returns its JSON value.
	pub async fn evaluate(&self, expression: &str) -> Result<Value> {
		let raw = self
			.call(
				"Runtime.evaluate",
				json!({
					"expression": expression,
					"returnByValue": true,
					"awaitPromise": true,
				}),
			)
			.await?;
		let result: EvaluateResult = serde_json::from_value(raw)?;
		if let Some(details) = result.exception_details {
			return Err(PruneError::Driver(details.message()));
		}
		Ok(result.result.value.unwrap_or(Value::Null))
	}

	async fn intent_op(&self, intent: &Intent, op: Op) -> Result<Value> {
		trace!(target = "prune.cdp", ?intent, ?op, "intent");
		self.evaluate(&script::intent_op(intent, op)).await
	}
}

#[async_trait]
impl PageDriver for CdpPage {
	async fn navigate(&self, url: &str) -> Result<()> {
		debug!(target = "prune.cdp", %url, "navigate");
		let raw = self.call("Page.navigate", json!({ "url": url })).await?;
		let result: NavigateResult = serde_json::from_value(raw)?;
		if let Some(reason) = result.error_text.filter(|e| !e.is_empty()) {
			return Err(PruneError::Navigation {
				url: url.to_string(),
				reason,
			});
		}

		let poll = Poll::new(self.navigation_timeout, Duration::from_millis(100));
		let ready = poll
			.retry(|| async move {
				match self.evaluate(script::READY_STATE).await {
					Ok(Value::String(state)) if state != "loading" => Some(Ok(())),
					Err(err) if err.is_session_closed() => Some(Err(err)),
					_ => None,
				}
			})
			.await;
		match ready {
			Some(result) => result,
			None => Err(PruneError::Navigation {
				url: url.to_string(),
				reason: format!("document not ready after {:?}", self.navigation_timeout),
			}),
		}
	}

	async fn current_url(&self) -> Result<String> {
		Ok(self.evaluate(script::LOCATION).await?.as_str().unwrap_or_default().to_string())
	}

	async fn count(&self, intent: &Intent) -> Result<usize> {
		Ok(self.intent_op(intent, Op::Count).await?.as_u64().unwrap_or(0) as usize)
	}

	async fn click(&self, intent: &Intent) -> Result<bool> {
		Ok(self.intent_op(intent, Op::Click).await?.as_bool().unwrap_or(false))
	}

	async fn click_all(&self, intent: &Intent) -> Result<usize> {
		Ok(self.intent_op(intent, Op::ClickAll).await?.as_u64().unwrap_or(0) as usize)
	}

	async fn fill(&self, intent: &Intent, value: &str) -> Result<bool> {
		Ok(self.evaluate(&script::fill(intent, value)).await?.as_bool().unwrap_or(false))
	}

	async fn read_text(&self, intent: &Intent) -> Result<Option<String>> {
		Ok(match self.intent_op(intent, Op::Text).await? {
			Value::String(s) => Some(s),
			_ => None,
		})
	}

	async fn scroll(&self, scope: ListScope) -> Result<()> {
		self.evaluate(&script::scroll(scope)).await?;
		Ok(())
	}

	async fn cookies(&self) -> Result<Vec<Cookie>> {
		let raw = self
			.call("Network.getCookies", json!({ "urls": [self.cookie_url] }))
			.await?;
		let result: GetCookiesResult = serde_json::from_value(raw)?;
		Ok(result.cookies)
	}

	async fn fetch_json(&self, url: &str, headers: &[(&str, &str)]) -> Result<Option<Value>> {
		match self.evaluate(&script::fetch_json(url, headers)).await? {
			Value::Null => Ok(None),
			value => Ok(Some(value)),
		}
	}
}
