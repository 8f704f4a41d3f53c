//! In-memory [`Launcher`] and [`Browser`] for tests.
//!
//! Profile directories can be marked locked or broken, launches are recorded,
//! and every browser wraps a fresh [`MockPage`].

use std::collections::{HashMap, HashSet};
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::watch;

use super::{Browser, LaunchRequest, Launcher};
use crate::driver::{MockPage, PageDriver};
use crate::error::{PruneError, Result};

/// Browser backed by a [`MockPage`].
pub struct MockBrowser {
	page: Arc<MockPage>,
	closed: watch::Sender<bool>,
	close_calls: AtomicUsize,
}

impl MockBrowser {
	pub fn new(page: MockPage) -> Self {
		let (closed, _) = watch::channel(false);
		Self {
			page: Arc::new(page),
			closed,
			close_calls: AtomicUsize::new(0),
		}
	}

	pub fn mock_page(&self) -> Arc<MockPage> {
		Arc::clone(&self.page)
	}

	/// Simulates the browser disappearing on its own.
	pub fn crash(&self) {
		self.page.close();
		self.closed.send_replace(true);
	}

	pub fn close_calls(&self) -> usize {
		self.close_calls.load(Ordering::SeqCst)
	}
}

#[async_trait]
impl Browser for MockBrowser {
	fn page(&self) -> Arc<dyn PageDriver> {
		Arc::clone(&self.page) as Arc<dyn PageDriver>
	}

	fn closed(&self) -> watch::Receiver<bool> {
		self.closed.subscribe()
	}

	async fn close(&self) {
		self.close_calls.fetch_add(1, Ordering::SeqCst);
		self.crash();
	}
}

type PageFactory = Box<dyn Fn() -> MockPage + Send + Sync>;

/// Scripted launcher.
pub struct MockLauncher {
	pages: PageFactory,
	locked: Mutex<HashSet<PathBuf>>,
	broken: Mutex<HashMap<PathBuf, String>>,
	failures_left: AtomicUsize,
	refuse_attach: AtomicBool,
	unlock_on_close: AtomicBool,
	close_competing_fails: AtomicBool,
	close_competing: AtomicUsize,
	launches: Mutex<Vec<LaunchRequest>>,
	attaches: Mutex<Vec<String>>,
	browsers: Mutex<Vec<Arc<MockBrowser>>>,
}

impl Default for MockLauncher {
	fn default() -> Self {
		Self::new()
	}
}

impl MockLauncher {
	pub fn new() -> Self {
		Self::with_pages(MockPage::default)
	}

	/// Launcher whose browsers open pages built by `pages`.
	pub fn with_pages(pages: impl Fn() -> MockPage + Send + Sync + 'static) -> Self {
		Self {
			pages: Box::new(pages),
			locked: Mutex::new(HashSet::new()),
			broken: Mutex::new(HashMap::new()),
			failures_left: AtomicUsize::new(0),
			refuse_attach: AtomicBool::new(false),
			unlock_on_close: AtomicBool::new(false),
			close_competing_fails: AtomicBool::new(false),
			close_competing: AtomicUsize::new(0),
			launches: Mutex::new(Vec::new()),
			attaches: Mutex::new(Vec::new()),
			browsers: Mutex::new(Vec::new()),
		}
	}

	/// Launches on `dir` fail as held by another process.
	pub fn lock(&self, dir: PathBuf) {
		self.locked.lock().insert(dir);
	}

	/// Launches on `dir` fail with a non-lock error.
	pub fn fail(&self, dir: PathBuf, reason: &str) {
		self.broken.lock().insert(dir, reason.to_string());
	}

	/// The next `n` launches fail regardless of directory.
	pub fn fail_next(&self, n: usize) {
		self.failures_left.store(n, Ordering::SeqCst);
	}

	pub fn refuse_attach(&self) {
		self.refuse_attach.store(true, Ordering::SeqCst);
	}

	/// Closing competitors releases every lock.
	pub fn unlock_on_close_competing(&self) {
		self.unlock_on_close.store(true, Ordering::SeqCst);
	}

	/// Closing competitors reports an error after doing its work.
	pub fn fail_close_competing(&self) {
		self.close_competing_fails.store(true, Ordering::SeqCst);
	}

	pub fn launches(&self) -> Vec<LaunchRequest> {
		self.launches.lock().clone()
	}

	pub fn attaches(&self) -> Vec<String> {
		self.attaches.lock().clone()
	}

	pub fn close_competing_calls(&self) -> usize {
		self.close_competing.load(Ordering::SeqCst)
	}

	/// Browsers handed out so far, oldest first.
	pub fn browsers(&self) -> Vec<Arc<MockBrowser>> {
		self.browsers.lock().clone()
	}

	pub fn latest(&self) -> Option<Arc<MockBrowser>> {
		self.browsers.lock().last().cloned()
	}

	fn spawn_browser(&self) -> Arc<dyn Browser> {
		let browser = Arc::new(MockBrowser::new((self.pages)()));
		self.browsers.lock().push(Arc::clone(&browser));
		browser
	}
}

#[async_trait]
impl Launcher for MockLauncher {
	async fn launch(&self, request: &LaunchRequest) -> Result<Arc<dyn Browser>> {
		self.launches.lock().push(request.clone());
		let dir = &request.user_data_dir;
		if self.locked.lock().contains(dir) {
			return Err(PruneError::ProfileLocked { dir: dir.clone() });
		}
		if let Some(reason) = self.broken.lock().get(dir) {
			return Err(PruneError::BrowserLaunch(reason.clone()));
		}
		let pending = self.failures_left.load(Ordering::SeqCst);
		if pending > 0 {
			self.failures_left.store(pending - 1, Ordering::SeqCst);
			return Err(PruneError::BrowserLaunch("scripted launch failure".into()));
		}
		Ok(self.spawn_browser())
	}

	async fn attach(&self, endpoint: &str) -> Result<Arc<dyn Browser>> {
		self.attaches.lock().push(endpoint.to_string());
		if self.refuse_attach.load(Ordering::SeqCst) {
			return Err(PruneError::Context("connection refused".into()));
		}
		Ok(self.spawn_browser())
	}

	async fn close_competing(&self) -> Result<()> {
		self.close_competing.fetch_add(1, Ordering::SeqCst);
		if self.unlock_on_close.load(Ordering::SeqCst) {
			self.locked.lock().clear();
		}
		if self.close_competing_fails.load(Ordering::SeqCst) {
			return Err(PruneError::Context("process kill task failed".into()));
		}
		Ok(())
	}
}
