//! Ordered fallback strategies for one unfollow cycle.
//!
//! A [`StrategyChain`] runs its strategies in order against a removal
//! budget. A strategy that fails to open or to produce work hands the
//! remaining budget to the next one; a strategy that runs to completion
//! ends the cycle. Skip rules are applied here, uniformly, to every work
//! item that carries account attributes.

mod api;
mod ui_list;

use async_trait::async_trait;
use tracing::{debug, info, warn};

pub use api::ApiStrategy;
pub use ui_list::UiListStrategy;

use crate::auth::Authenticator;
use crate::candidate::Candidate;
use crate::config::Timings;
use crate::driver::PageDriver;
use crate::error::{PruneError, Result};
use crate::executor::Executor;
use crate::filter::SkipRules;
use crate::site::Site;
use crate::source::ListRow;

/// Collaborators a strategy needs for one cycle.
#[derive(Clone, Copy)]
pub struct StrategyContext<'a> {
	/// Handle of the logged-in account, when known.
	pub username: Option<&'a str>,
	pub site: &'a Site,
	pub timings: &'a Timings,
	pub auth: &'a Authenticator,
	pub executor: &'a Executor,
}

/// One unit of work produced by a strategy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Work {
	/// A row of the rendered list. Carries no account attributes.
	Row(ListRow),
	/// An account from the API, with attributes.
	Account(Candidate),
}

impl Work {
	pub fn candidate(&self) -> Option<&Candidate> {
		match self {
			Work::Row(_) => None,
			Work::Account(candidate) => Some(candidate),
		}
	}

	pub fn label(&self) -> &str {
		match self {
			Work::Row(row) => row.username.as_deref().unwrap_or("(list row)"),
			Work::Account(candidate) => &candidate.username,
		}
	}
}

/// A way of finding and removing followed accounts.
#[async_trait]
pub trait Strategy: Send {
	fn name(&self) -> &'static str;

	/// Whether this strategy's work items carry account attributes.
	fn supports_skip_rules(&self) -> bool;

	/// Prepares for a cycle that may remove up to `budget` accounts.
	async fn open(&mut self, page: &dyn PageDriver, ctx: &StrategyContext<'_>, budget: usize) -> Result<()>;

	/// Produces the next work item, or `None` when exhausted.
	async fn next(&mut self, page: &dyn PageDriver, ctx: &StrategyContext<'_>) -> Result<Option<Work>>;

	/// Attempts `work`; `true` when it counts as removed.
	async fn execute_one(&mut self, page: &dyn PageDriver, ctx: &StrategyContext<'_>, work: &Work) -> Result<bool>;

	/// Called when the strategy produced no work at all this cycle.
	async fn on_empty(&mut self, page: &dyn PageDriver, ctx: &StrategyContext<'_>) -> Result<()>;
}

/// Per-strategy summary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StrategyRun {
	pub name: &'static str,
	pub produced: usize,
	pub removed: usize,
	/// Why the strategy handed over to the next one.
	pub error: Option<String>,
}

/// What one cycle achieved.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CycleReport {
	pub allowed: usize,
	pub removed: usize,
	pub attempted: usize,
	pub skipped: usize,
	pub runs: Vec<StrategyRun>,
	/// The browser went away mid-cycle.
	pub session_closed: bool,
}

/// Ordered strategies plus the skip rules applied to their work.
pub struct StrategyChain {
	strategies: Vec<Box<dyn Strategy>>,
	skip: SkipRules,
}

impl StrategyChain {
	pub fn new(strategies: Vec<Box<dyn Strategy>>, skip: SkipRules) -> Self {
		Self { strategies, skip }
	}

	/// List UI first, then the API.
	pub fn standard(site: Site, skip: SkipRules) -> Self {
		Self::new(vec![Box::new(UiListStrategy::new()), Box::new(ApiStrategy::new(site))], skip)
	}

	pub fn names(&self) -> Vec<&'static str> {
		self.strategies.iter().map(|s| s.name()).collect()
	}

	/// Logs the strategies that will ignore the configured skip rules.
	pub fn warn_unfiltered(&self) {
		if self.skip.is_empty() {
			return;
		}
		for strategy in self.strategies.iter().filter(|s| !s.supports_skip_rules()) {
			warn!(
				target = "prune.strategy",
				strategy = strategy.name(),
				"skip rules are configured but this strategy cannot see account attributes; they apply only to the API fallback"
			);
		}
	}

	/// Removes up to `allowed` accounts. Never fails: errors are logged and
	/// either fall through to the next strategy or end the cycle.
	pub async fn run_cycle(&mut self, page: &dyn PageDriver, ctx: &StrategyContext<'_>, allowed: usize) -> CycleReport {
		let mut report = CycleReport {
			allowed,
			..CycleReport::default()
		};

		for strategy in self.strategies.iter_mut() {
			if report.removed >= allowed {
				break;
			}
			let budget = allowed - report.removed;
			let name = strategy.name();
			let mut run = StrategyRun {
				name,
				produced: 0,
				removed: 0,
				error: None,
			};
			info!(target = "prune.strategy", strategy = name, budget, "strategy started");

			let failure = match strategy.open(page, ctx, budget).await {
				Ok(()) => drive(strategy.as_mut(), page, ctx, &self.skip, &mut report, &mut run, allowed).await,
				Err(err) => Some(err),
			};

			match failure {
				Some(err) => {
					warn!(
						target = "prune.strategy",
						strategy = name,
						removed = run.removed,
						error = %err,
						"strategy failed; falling back"
					);
					run.error = Some(err.to_string());
					let closed = err.is_session_closed();
					report.runs.push(run);
					if closed {
						report.session_closed = true;
						break;
					}
				}
				None => {
					if run.produced == 0 {
						if let Err(err) = strategy.on_empty(page, ctx).await {
							if err.is_session_closed() {
								report.session_closed = true;
							}
							warn!(target = "prune.strategy", strategy = name, error = %err, "empty-result handling failed");
						}
					}
					info!(target = "prune.strategy", strategy = name, removed = run.removed, "strategy finished");
					report.runs.push(run);
					break;
				}
			}
		}
		report
	}
}

/// Pulls work from `strategy` until the budget is met or it runs dry.
/// Returns the error that stopped it, if any.
async fn drive(
	strategy: &mut dyn Strategy,
	page: &dyn PageDriver,
	ctx: &StrategyContext<'_>,
	skip: &SkipRules,
	report: &mut CycleReport,
	run: &mut StrategyRun,
	allowed: usize,
) -> Option<PruneError> {
	while report.removed < allowed {
		let work = match strategy.next(page, ctx).await {
			Ok(Some(work)) => work,
			Ok(None) => return None,
			Err(err) => return Some(err),
		};
		run.produced += 1;

		if let Some(reason) = work.candidate().and_then(|c| skip.reason(c)) {
			debug!(target = "prune.strategy", user = work.label(), reason, "skipped");
			report.skipped += 1;
			continue;
		}

		report.attempted += 1;
		match strategy.execute_one(page, ctx, &work).await {
			Ok(true) => {
				report.removed += 1;
				run.removed += 1;
			}
			Ok(false) => debug!(target = "prune.strategy", user = work.label(), "not removed"),
			Err(err) => return Some(err),
		}
	}
	None
}

#[cfg(test)]
mod tests {
	use std::collections::VecDeque;
	use std::sync::Arc;

	use parking_lot::Mutex;

	use super::*;
	use crate::config::Credentials;
	use crate::driver::MockPage;
	use crate::executor::VerifyPolicy;

	/// Strategy replaying a script of results.
	struct Scripted {
		name: &'static str,
		open: Option<PruneError>,
		items: VecDeque<Result<Work>>,
		executed: Arc<Mutex<Vec<String>>>,
		empties: Arc<Mutex<usize>>,
	}

	impl Scripted {
		fn new(name: &'static str, items: Vec<Result<Work>>) -> Self {
			Self {
				name,
				open: None,
				items: items.into(),
				executed: Arc::default(),
				empties: Arc::default(),
			}
		}
	}

	#[async_trait]
	impl Strategy for Scripted {
		fn name(&self) -> &'static str {
			self.name
		}

		fn supports_skip_rules(&self) -> bool {
			true
		}

		async fn open(&mut self, _: &dyn PageDriver, _: &StrategyContext<'_>, _: usize) -> Result<()> {
			match self.open.take() {
				Some(err) => Err(err),
				None => Ok(()),
			}
		}

		async fn next(&mut self, _: &dyn PageDriver, _: &StrategyContext<'_>) -> Result<Option<Work>> {
			self.items.pop_front().transpose()
		}

		async fn execute_one(&mut self, _: &dyn PageDriver, _: &StrategyContext<'_>, work: &Work) -> Result<bool> {
			self.executed.lock().push(work.label().to_string());
			Ok(!work.label().starts_with("fail"))
		}

		async fn on_empty(&mut self, _: &dyn PageDriver, _: &StrategyContext<'_>) -> Result<()> {
			*self.empties.lock() += 1;
			Ok(())
		}
	}

	fn account(name: &str) -> Result<Work> {
		Ok(Work::Account(Candidate::named(name)))
	}

	struct Deps {
		site: Site,
		timings: Timings,
		auth: Authenticator,
		executor: Executor,
	}

	impl Deps {
		fn new() -> Self {
			let site = Site::default();
			let timings = Timings::immediate();
			let auth = Authenticator::new(site.clone(), Credentials::default(), timings.clone());
			let executor = Executor::new(site.clone(), timings.clone(), VerifyPolicy::Optimistic, auth.clone());
			Self {
				site,
				timings,
				auth,
				executor,
			}
		}

		fn ctx(&self) -> StrategyContext<'_> {
			StrategyContext {
				username: Some("me"),
				site: &self.site,
				timings: &self.timings,
				auth: &self.auth,
				executor: &self.executor,
			}
		}
	}

	#[tokio::test]
	async fn stops_at_budget() {
		let deps = Deps::new();
		let first = Scripted::new("first", vec![account("a"), account("b"), account("c")]);
		let executed = Arc::clone(&first.executed);
		let mut chain = StrategyChain::new(vec![Box::new(first)], SkipRules::default());

		let report = chain.run_cycle(&MockPage::default(), &deps.ctx(), 2).await;
		assert_eq!(report.removed, 2);
		assert_eq!(*executed.lock(), vec!["a", "b"]);
	}

	#[tokio::test]
	async fn open_failure_falls_through_with_full_budget() {
		let deps = Deps::new();
		let mut first = Scripted::new("first", vec![]);
		first.open = Some(PruneError::ListUnavailable("gone".into()));
		let second = Scripted::new("second", vec![account("a"), account("b")]);
		let mut chain = StrategyChain::new(vec![Box::new(first), Box::new(second)], SkipRules::default());

		let report = chain.run_cycle(&MockPage::default(), &deps.ctx(), 5).await;
		assert_eq!(report.removed, 2);
		assert_eq!(report.runs.len(), 2);
		assert!(report.runs[0].error.as_deref().unwrap().contains("gone"));
	}

	#[tokio::test]
	async fn mid_run_failure_keeps_removals_and_passes_remaining_budget() {
		let deps = Deps::new();
		let first = Scripted::new("first", vec![account("a"), Err(PruneError::Driver("selector drift".into()))]);
		let second = Scripted::new("second", vec![account("b"), account("c"), account("d")]);
		let second_executed = Arc::clone(&second.executed);
		let mut chain = StrategyChain::new(vec![Box::new(first), Box::new(second)], SkipRules::default());

		let report = chain.run_cycle(&MockPage::default(), &deps.ctx(), 3).await;
		assert_eq!(report.removed, 3);
		assert_eq!(report.runs[0].removed, 1);
		assert_eq!(*second_executed.lock(), vec!["b", "c"]);
	}

	#[tokio::test]
	async fn completed_strategy_ends_the_cycle() {
		let deps = Deps::new();
		let first = Scripted::new("first", vec![account("fail-1")]);
		let second = Scripted::new("second", vec![account("b")]);
		let second_executed = Arc::clone(&second.executed);
		let mut chain = StrategyChain::new(vec![Box::new(first), Box::new(second)], SkipRules::default());

		let report = chain.run_cycle(&MockPage::default(), &deps.ctx(), 3).await;
		assert_eq!(report.removed, 0);
		assert_eq!(report.attempted, 1);
		assert!(second_executed.lock().is_empty());
	}

	#[tokio::test]
	async fn skipped_candidates_never_reach_execution() {
		let deps = Deps::new();
		let mut verified = Candidate::named("celebrity");
		verified.verified = true;
		let first = Scripted::new(
			"first",
			vec![Ok(Work::Account(verified)), account("shopfront"), account("friend")],
		);
		let executed = Arc::clone(&first.executed);
		let skip = SkipRules::from_lists(true, false, "", "shop", "");
		let mut chain = StrategyChain::new(vec![Box::new(first)], skip);

		let report = chain.run_cycle(&MockPage::default(), &deps.ctx(), 10).await;
		assert_eq!(*executed.lock(), vec!["friend"]);
		assert_eq!(report.skipped, 2);
		assert_eq!(report.removed, 1);
	}

	#[tokio::test]
	async fn empty_strategy_gets_on_empty() {
		let deps = Deps::new();
		let first = Scripted::new("first", vec![]);
		let empties = Arc::clone(&first.empties);
		let mut chain = StrategyChain::new(vec![Box::new(first)], SkipRules::default());

		chain.run_cycle(&MockPage::default(), &deps.ctx(), 3).await;
		assert_eq!(*empties.lock(), 1);
	}

	#[tokio::test]
	async fn closed_session_stops_the_chain() {
		let deps = Deps::new();
		let first = Scripted::new("first", vec![Err(PruneError::NoSession)]);
		let second = Scripted::new("second", vec![account("b")]);
		let second_executed = Arc::clone(&second.executed);
		let mut chain = StrategyChain::new(vec![Box::new(first), Box::new(second)], SkipRules::default());

		let report = chain.run_cycle(&MockPage::default(), &deps.ctx(), 3).await;
		assert!(report.session_closed);
		assert!(second_executed.lock().is_empty());
	}
}
