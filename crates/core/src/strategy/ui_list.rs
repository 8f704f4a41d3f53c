use async_trait::async_trait;
use tokio::time::sleep;
use tracing::info;

use super::{Strategy, StrategyContext, Work};
use crate::driver::PageDriver;
use crate::error::{PruneError, Result};
use crate::executor::Outcome;
use crate::source::{ATTEMPT_HEADROOM, UiListCursor, open_following_list};

/// Unfollows straight from the rendered following list.
#[derive(Debug, Default)]
pub struct UiListStrategy {
	cursor: Option<UiListCursor>,
}

impl UiListStrategy {
	pub fn new() -> Self {
		Self::default()
	}
}

#[async_trait]
impl Strategy for UiListStrategy {
	fn name(&self) -> &'static str {
		"following-list"
	}

	fn supports_skip_rules(&self) -> bool {
		false
	}

	async fn open(&mut self, page: &dyn PageDriver, ctx: &StrategyContext<'_>, budget: usize) -> Result<()> {
		self.cursor = None;
		let username = ctx
			.username
			.ok_or_else(|| PruneError::ListUnavailable("account username is unknown".into()))?;
		let scope = open_following_list(page, ctx.site, ctx.auth, ctx.timings, username).await?;
		self.cursor = Some(UiListCursor::new(scope, budget + ATTEMPT_HEADROOM));
		Ok(())
	}

	async fn next(&mut self, page: &dyn PageDriver, ctx: &StrategyContext<'_>) -> Result<Option<Work>> {
		let Some(cursor) = self.cursor.as_mut() else {
			return Ok(None);
		};
		Ok(cursor.next(page, ctx.timings).await?.map(Work::Row))
	}

	async fn execute_one(&mut self, page: &dyn PageDriver, ctx: &StrategyContext<'_>, work: &Work) -> Result<bool> {
		let Work::Row(row) = work else {
			return Ok(false);
		};
		let outcome = ctx.executor.unfollow_row(page, row).await?;
		if outcome != Outcome::Confirmed {
			if let Some(cursor) = self.cursor.as_mut() {
				cursor.mark_stale();
			}
		}
		Ok(ctx.executor.counts(outcome))
	}

	async fn on_empty(&mut self, _page: &dyn PageDriver, ctx: &StrategyContext<'_>) -> Result<()> {
		info!(target = "prune.strategy", "following list has no actionable rows");
		sleep(ctx.timings.empty_list_settle).await;
		Ok(())
	}
}
