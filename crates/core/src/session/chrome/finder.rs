//! Chrome executable discovery.

use std::path::{Path, PathBuf};

/// Locates an installed Chrome or Chromium.
pub(super) fn find_chrome_executable() -> Option<PathBuf> {
	let candidates: Vec<String> = if cfg!(target_os = "macos") {
		vec![
			"/Applications/Google Chrome.app/Contents/MacOS/Google Chrome",
			"/Applications/Chromium.app/Contents/MacOS/Chromium",
			"/Applications/Google Chrome Canary.app/Contents/MacOS/Google Chrome Canary",
		]
		.into_iter()
		.map(str::to_string)
		.collect()
	} else if cfg!(target_os = "windows") {
		windows_chrome_candidates()
	} else {
		vec![
			"google-chrome-stable",
			"google-chrome",
			"chromium-browser",
			"chromium",
			"/usr/bin/google-chrome-stable",
			"/usr/bin/google-chrome",
			"/usr/bin/chromium-browser",
			"/usr/bin/chromium",
			"/snap/bin/chromium",
		]
		.into_iter()
		.map(str::to_string)
		.collect()
	};

	candidates.into_iter().find_map(|candidate| resolve(&candidate))
}

fn resolve(candidate: &str) -> Option<PathBuf> {
	if candidate.starts_with('/') || candidate.contains('\\') || candidate.contains(':') {
		let path = Path::new(candidate);
		path.exists().then(|| path.to_path_buf())
	} else {
		which::which(candidate).ok()
	}
}

pub(super) fn windows_chrome_candidates() -> Vec<String> {
	let mut roots = Vec::new();
	for key in ["PROGRAMFILES", "PROGRAMFILES(X86)", "LOCALAPPDATA"] {
		if let Ok(value) = std::env::var(key) {
			roots.push(PathBuf::from(value));
		}
	}
	if roots.is_empty() {
		roots.push(PathBuf::from(r"C:\Program Files"));
		roots.push(PathBuf::from(r"C:\Program Files (x86)"));
	}

	let suffixes: &[&[&str]] = &[
		&["Google", "Chrome", "Application", "chrome.exe"],
		&["Chromium", "Application", "chrome.exe"],
	];

	let mut candidates = Vec::new();
	for root in roots {
		for suffix in suffixes {
			let mut path = root.clone();
			path.extend(*suffix);
			candidates.push(path.to_string_lossy().to_string());
		}
	}
	candidates.extend(["chrome.exe".to_string(), "chrome".to_string(), "chromium.exe".to_string()]);
	candidates
}

/// Process names of browsers that may hold the primary profile.
pub(super) fn competing_process_names() -> &'static [&'static str] {
	if cfg!(target_os = "windows") {
		&["chrome.exe"]
	} else if cfg!(target_os = "macos") {
		&["Google Chrome"]
	} else {
		&["chrome", "google-chrome", "google-chrome-stable", "chromium", "chromium-browser"]
	}
}
