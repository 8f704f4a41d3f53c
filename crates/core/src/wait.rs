//! Bounded polling.
//!
//! Waits in this crate never error on timeout: they report whether the
//! condition was observed and the caller decides whether to proceed.

use std::future::Future;
use std::time::Duration;

use tokio::sync::watch;
use tokio::time::{Instant, sleep};

/// A bounded poll: check, sleep `interval`, repeat until `timeout` elapses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Poll {
	pub timeout: Duration,
	pub interval: Duration,
}

impl Poll {
	pub const fn new(timeout: Duration, interval: Duration) -> Self {
		Self { timeout, interval }
	}

	/// Polls `check` until it yields `true` or the timeout passes.
	///
	/// The condition is always checked at least once.
	pub async fn until<F, Fut>(&self, mut check: F) -> bool
	where
		F: FnMut() -> Fut,
		Fut: Future<Output = bool>,
	{
		self.retry(|| {
			let fut = check();
			async move { fut.await.then_some(()) }
		})
		.await
		.is_some()
	}

	/// Retries `attempt` until it produces a value or the timeout passes.
	pub async fn retry<T, F, Fut>(&self, mut attempt: F) -> Option<T>
	where
		F: FnMut() -> Fut,
		Fut: Future<Output = Option<T>>,
	{
		let deadline = Instant::now() + self.timeout;
		loop {
			if let Some(value) = attempt().await {
				return Some(value);
			}
			let now = Instant::now();
			if now >= deadline {
				return None;
			}
			sleep(self.interval.min(deadline - now)).await;
		}
	}
}

/// Resolves once `shutdown` reads `true`.
///
/// A dropped sender can never request shutdown, so this then pends forever.
pub async fn shutdown_requested(shutdown: &mut watch::Receiver<bool>) {
	while !*shutdown.borrow_and_update() {
		if shutdown.changed().await.is_err() {
			std::future::pending::<()>().await;
		}
	}
}

/// Sleeps for `duration` unless shutdown is requested first.
///
/// Returns `false` when interrupted.
pub async fn sleep_or_shutdown(duration: Duration, shutdown: &mut watch::Receiver<bool>) -> bool {
	tokio::select! {
		_ = sleep(duration) => true,
		_ = shutdown_requested(shutdown) => false,
	}
}

#[cfg(test)]
mod tests {
	use std::sync::Arc;
	use std::sync::atomic::{AtomicUsize, Ordering};

	use super::*;

	#[tokio::test]
	async fn until_returns_true_once_condition_holds() {
		let calls = Arc::new(AtomicUsize::new(0));
		let poll = Poll::new(Duration::from_secs(1), Duration::from_millis(1));
		let seen = {
			let calls = Arc::clone(&calls);
			poll.until(move || {
				let n = calls.fetch_add(1, Ordering::SeqCst);
				async move { n >= 2 }
			})
			.await
		};
		assert!(seen);
		assert_eq!(calls.load(Ordering::SeqCst), 3);
	}

	#[tokio::test(start_paused = true)]
	async fn until_reports_false_on_timeout() {
		let poll = Poll::new(Duration::from_secs(5), Duration::from_millis(300));
		let started = Instant::now();
		assert!(!poll.until(|| async { false }).await);
		assert!(started.elapsed() >= Duration::from_secs(5));
	}

	#[tokio::test]
	async fn zero_timeout_still_checks_once() {
		let poll = Poll::new(Duration::ZERO, Duration::from_millis(10));
		assert_eq!(poll.retry(|| async { Some(7) }).await, Some(7));
	}

	#[tokio::test(start_paused = true)]
	async fn shutdown_interrupts_sleep() {
		let (tx, mut rx) = watch::channel(false);
		tokio::spawn(async move {
			sleep(Duration::from_secs(5)).await;
			let _ = tx.send(true);
		});
		assert!(!sleep_or_shutdown(Duration::from_secs(3600), &mut rx).await);
	}

	#[tokio::test(start_paused = true)]
	async fn sleep_completes_without_shutdown() {
		let (_tx, mut rx) = watch::channel(false);
		assert!(sleep_or_shutdown(Duration::from_secs(1), &mut rx).await);
	}
}
