//! Profile directory naming and lock inspection.

use std::ffi::OsString;
use std::path::{Path, PathBuf};

/// Profile directories tried after the configured one.
const PROFILE_CANDIDATES: [&str; 6] = ["Default", "Profile 1", "Profile 2", "Profile 3", "Profile 4", "Profile 5"];

/// Chrome's profile lock inside a user data directory.
pub const SINGLETON_LOCK: &str = "SingletonLock";

/// First existing profile directory of `user_data_dir`, preferring `configured`.
///
/// `None` lets the browser choose.
pub fn select_profile_directory(user_data_dir: &Path, configured: &str) -> Option<String> {
	let configured = configured.trim();
	std::iter::once(configured)
		.chain(PROFILE_CANDIDATES)
		.filter(|name| !name.is_empty())
		.find(|name| user_data_dir.join(name).is_dir())
		.map(str::to_string)
}

/// Fallback pool: the base directory followed by `base-1` .. `base-slots`.
pub fn pool_dirs(base: &Path, slots: usize) -> Vec<PathBuf> {
	let mut dirs = Vec::with_capacity(slots + 1);
	dirs.push(base.to_path_buf());
	for slot in 1..=slots {
		let mut name = OsString::from(base.as_os_str());
		name.push(format!("-{slot}"));
		dirs.push(PathBuf::from(name));
	}
	dirs
}

/// One-off profile directory under the pool base.
pub fn temporary_dir(base: &Path, stamp_ms: i64) -> PathBuf {
	base.join(format!("run-{stamp_ms}"))
}

/// Pid of the live process holding `user_data_dir`, if any.
///
/// Chrome's lock is a symlink whose target reads `<hostname>-<pid>`. A
/// stale lock left by a crashed browser reports no holder.
#[cfg(unix)]
pub fn lock_holder(user_data_dir: &Path) -> Option<u32> {
	let target = std::fs::read_link(user_data_dir.join(SINGLETON_LOCK)).ok()?;
	let pid = parse_lock_target(&target.to_string_lossy())?;
	prune_runtime::process::pid_is_alive(pid).then_some(pid)
}

#[cfg(not(unix))]
pub fn lock_holder(_user_data_dir: &Path) -> Option<u32> {
	None
}

#[cfg_attr(not(unix), allow(dead_code))]
fn parse_lock_target(target: &str) -> Option<u32> {
	target.rsplit_once('-')?.1.parse().ok()
}

/// Whether browser output or an error message describes a held profile.
pub fn is_lock_message(message: &str) -> bool {
	let lower = message.to_ascii_lowercase();
	lower.contains("processsingleton") || lower.contains("singletonlock") || lower.contains("profile directory")
}

#[cfg(test)]
mod tests {
	use tempfile::TempDir;

	use super::*;

	#[test]
	fn configured_profile_wins_when_present() {
		let temp = TempDir::new().unwrap();
		std::fs::create_dir(temp.path().join("Default")).unwrap();
		std::fs::create_dir(temp.path().join("Work")).unwrap();
		assert_eq!(select_profile_directory(temp.path(), "Work").as_deref(), Some("Work"));
	}

	#[test]
	fn falls_back_to_first_existing_candidate() {
		let temp = TempDir::new().unwrap();
		std::fs::create_dir(temp.path().join("Profile 2")).unwrap();
		assert_eq!(select_profile_directory(temp.path(), "Missing").as_deref(), Some("Profile 2"));
	}

	#[test]
	fn empty_data_dir_selects_nothing() {
		let temp = TempDir::new().unwrap();
		assert_eq!(select_profile_directory(temp.path(), "Default"), None);
	}

	#[test]
	fn pool_numbers_siblings_of_base() {
		let dirs = pool_dirs(Path::new("/home/u/.follow-prune-chrome"), 2);
		assert_eq!(
			dirs,
			vec![
				PathBuf::from("/home/u/.follow-prune-chrome"),
				PathBuf::from("/home/u/.follow-prune-chrome-1"),
				PathBuf::from("/home/u/.follow-prune-chrome-2"),
			]
		);
	}

	#[test]
	fn temporary_dir_is_nested_under_base() {
		assert_eq!(temporary_dir(Path::new("/b"), 1700), PathBuf::from("/b/run-1700"));
	}

	#[test]
	fn lock_target_parsing() {
		assert_eq!(parse_lock_target("my-host.local-4242"), Some(4242));
		assert_eq!(parse_lock_target("nohyphen"), None);
	}

	#[test]
	fn lock_messages_are_recognised() {
		assert!(is_lock_message("Failed to create a ProcessSingleton for your profile directory"));
		assert!(is_lock_message("SingletonLock: File exists"));
		assert!(!is_lock_message("Connection refused"));
	}

	#[cfg(unix)]
	#[test]
	fn live_lock_reports_holder() {
		let temp = TempDir::new().unwrap();
		let pid = std::process::id();
		std::os::unix::fs::symlink(format!("host-{pid}"), temp.path().join(SINGLETON_LOCK)).unwrap();
		assert_eq!(lock_holder(temp.path()), Some(pid));
	}

	#[cfg(unix)]
	#[test]
	fn missing_lock_has_no_holder() {
		let temp = TempDir::new().unwrap();
		assert_eq!(lock_holder(temp.path()), None);
	}
}
