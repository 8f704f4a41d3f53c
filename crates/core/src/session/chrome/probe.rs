//! DevTools endpoint discovery over `/json/version`.

use std::time::Duration;

use prune_protocol::CdpVersionInfo;

use crate::error::{PruneError, Result};

const PROBE_TIMEOUT: Duration = Duration::from_millis(400);

fn client() -> Result<reqwest::Client> {
	reqwest::Client::builder()
		.timeout(PROBE_TIMEOUT)
		.build()
		.map_err(|e| PruneError::Context(format!("failed to create HTTP client: {e}")))
}

/// Version URLs tried for a local debugging port.
fn local_version_urls(port: u16) -> [String; 3] {
	[
		format!("http://127.0.0.1:{port}/json/version"),
		format!("http://localhost:{port}/json/version"),
		format!("http://[::1]:{port}/json/version"),
	]
}

/// `/json/version` URL for a user-supplied endpoint such as `http://localhost:9222`.
pub(super) fn version_url(endpoint: &str) -> Result<String> {
	let mut base = url::Url::parse(endpoint.trim())?;
	match base.scheme() {
		"http" | "https" => {}
		"ws" => base.set_scheme("http").map_err(|_| PruneError::Context(format!("unsupported endpoint {endpoint}")))?,
		"wss" => base.set_scheme("https").map_err(|_| PruneError::Context(format!("unsupported endpoint {endpoint}")))?,
		other => return Err(PruneError::Context(format!("unsupported endpoint scheme {other}"))),
	}
	base.set_path("/json/version");
	base.set_query(None);
	Ok(base.to_string())
}

async fn fetch(client: &reqwest::Client, url: &str) -> std::result::Result<CdpVersionInfo, String> {
	let response = client.get(url).send().await.map_err(|e| e.to_string())?;
	if !response.status().is_success() {
		return Err(format!("unexpected status {}", response.status()));
	}
	response.json().await.map_err(|e| format!("invalid /json/version response: {e}"))
}

/// Endpoint metadata of a browser listening on a local `port`.
pub(super) async fn fetch_local_endpoint(port: u16) -> Result<CdpVersionInfo> {
	let client = client()?;
	let mut last_error = "no response".to_string();
	for url in local_version_urls(port) {
		match fetch(&client, &url).await {
			Ok(info) => return Ok(info),
			Err(err) => last_error = err,
		}
	}
	Err(PruneError::Context(format!("no debugging endpoint on port {port}: {last_error}")))
}

/// Endpoint metadata of a browser at `endpoint`.
pub(super) async fn fetch_endpoint(endpoint: &str) -> Result<CdpVersionInfo> {
	let url = version_url(endpoint)?;
	fetch(&client()?, &url).await.map_err(PruneError::Context)
}

#[cfg(test)]
mod tests {
	use tokio::io::{AsyncReadExt, AsyncWriteExt};
	use tokio::net::TcpListener;

	use super::*;

	#[test]
	fn version_url_replaces_path() {
		assert_eq!(version_url("http://localhost:9222").unwrap(), "http://localhost:9222/json/version");
		assert_eq!(
			version_url("ws://127.0.0.1:9222/devtools/browser/abc").unwrap(),
			"http://127.0.0.1:9222/json/version"
		);
		assert!(version_url("ftp://host").is_err());
	}

	#[test]
	fn local_urls_cover_loopback_variants() {
		let urls = local_version_urls(9333);
		assert!(urls.iter().all(|u| u.ends_with(":9333/json/version")));
		assert!(urls[2].contains("[::1]"));
	}

	#[tokio::test]
	async fn fetches_debugger_url() {
		let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
		let port = listener.local_addr().unwrap().port();
		tokio::spawn(async move {
			let (mut socket, _) = listener.accept().await.unwrap();
			let mut buf = [0u8; 1024];
			let _ = socket.read(&mut buf).await;
			let body = r#"{"Browser":"Chrome/130.0","webSocketDebuggerUrl":"ws://127.0.0.1/devtools/browser/x"}"#;
			let response = format!(
				"HTTP/1.1 200 OK\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
				body.len()
			);
			socket.write_all(response.as_bytes()).await.unwrap();
		});

		let info = fetch_endpoint(&format!("http://127.0.0.1:{port}")).await.unwrap();
		assert_eq!(info.web_socket_debugger_url, "ws://127.0.0.1/devtools/browser/x");
		assert_eq!(info.browser.as_deref(), Some("Chrome/130.0"));
	}
}
