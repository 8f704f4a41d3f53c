//! Process and port helpers shared by the browser launcher.

#[cfg(unix)]
use std::path::PathBuf;
use std::process::Command;

use tracing::debug;

/// Returns `true` when a process with `pid` appears alive on this platform.
pub fn pid_is_alive(pid: u32) -> bool {
	if pid == 0 {
		return false;
	}
	if pid == std::process::id() {
		return true;
	}

	#[cfg(unix)]
	{
		if PathBuf::from("/proc").join(pid.to_string()).exists() {
			return true;
		}

		Command::new("kill")
			.arg("-0")
			.arg(pid.to_string())
			.status()
			.map(|status| status.success())
			.unwrap_or(false)
	}

	#[cfg(windows)]
	{
		let filter = format!("PID eq {pid}");
		match Command::new("tasklist").args(["/FI", &filter, "/FO", "CSV", "/NH"]).output() {
			Ok(output) if output.status.success() => tasklist_has_pid(String::from_utf8_lossy(&output.stdout).as_ref(), pid),
			_ => false,
		}
	}

	#[cfg(not(any(unix, windows)))]
	{
		false
	}
}

/// Asks the OS for a free localhost port to use as a remote-debugging port.
pub fn free_local_port() -> std::io::Result<u16> {
	let listener = std::net::TcpListener::bind(("127.0.0.1", 0))?;
	Ok(listener.local_addr()?.port())
}

/// Terminates every process whose executable name matches one of `names`.
///
/// Returns the names for which the platform tool reported a match.
pub fn kill_processes_named(names: &[&str]) -> Vec<String> {
	let mut killed = Vec::new();
	for name in names {
		#[cfg(unix)]
		let status = Command::new("pkill").args(["-x", name]).status();
		#[cfg(windows)]
		let status = Command::new("taskkill").args(["/IM", name, "/F"]).status();
		#[cfg(not(any(unix, windows)))]
		let status: std::io::Result<std::process::ExitStatus> = Err(std::io::Error::other("unsupported platform"));

		match status {
			Ok(status) if status.success() => {
				debug!(target = "prune.process", %name, "terminated matching processes");
				killed.push((*name).to_string());
			}
			Ok(_) => debug!(target = "prune.process", %name, "no matching process"),
			Err(err) => debug!(target = "prune.process", %name, error = %err, "process kill tool failed"),
		}
	}
	killed
}

#[cfg(any(test, windows))]
fn tasklist_has_pid(output: &str, pid: u32) -> bool {
	let pid_str = pid.to_string();
	output.lines().any(|line| {
		let line = line.trim();
		line.starts_with('"')
			&& line
				.trim_matches('"')
				.split("\",\"")
				.nth(1)
				.is_some_and(|field| field.trim() == pid_str.as_str())
	})
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn tasklist_parser_matches_csv_line() {
		let output = "\"chrome.exe\",\"4321\",\"Console\",\"1\",\"250,000 K\"\r\n";
		assert!(tasklist_has_pid(output, 4321));
		assert!(!tasklist_has_pid(output, 1));
	}

	#[test]
	fn tasklist_parser_ignores_info_lines() {
		assert!(!tasklist_has_pid("INFO: No tasks are running which match the specified criteria.\r\n", 4321));
	}

	#[test]
	fn current_process_is_alive() {
		assert!(pid_is_alive(std::process::id()));
	}

	#[test]
	fn pid_zero_is_never_alive() {
		assert!(!pid_is_alive(0));
	}

	#[test]
	fn free_port_is_bindable() {
		let port = free_local_port().unwrap();
		assert!(port > 0);
		assert!(std::net::TcpListener::bind(("127.0.0.1", port)).is_ok());
	}
}
