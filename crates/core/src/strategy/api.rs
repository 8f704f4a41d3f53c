use async_trait::async_trait;
use tracing::{info, warn};

use super::{Strategy, StrategyContext, Work};
use crate::driver::PageDriver;
use crate::error::Result;
use crate::site::Site;
use crate::source::{ATTEMPT_HEADROOM, ApiCursor};

/// Lists followed accounts through the private API and unfollows each from
/// its profile page.
#[derive(Debug)]
pub struct ApiStrategy {
	cursor: ApiCursor,
}

impl ApiStrategy {
	pub fn new(site: Site) -> Self {
		Self {
			cursor: ApiCursor::new(site, 0),
		}
	}
}

#[async_trait]
impl Strategy for ApiStrategy {
	fn name(&self) -> &'static str {
		"api"
	}

	fn supports_skip_rules(&self) -> bool {
		true
	}

	async fn open(&mut self, _page: &dyn PageDriver, _ctx: &StrategyContext<'_>, budget: usize) -> Result<()> {
		self.cursor.restart(budget + ATTEMPT_HEADROOM);
		Ok(())
	}

	async fn next(&mut self, page: &dyn PageDriver, ctx: &StrategyContext<'_>) -> Result<Option<Work>> {
		Ok(self.cursor.next(page, ctx.auth).await?.map(Work::Account))
	}

	async fn execute_one(&mut self, page: &dyn PageDriver, ctx: &StrategyContext<'_>, work: &Work) -> Result<bool> {
		let Work::Account(candidate) = work else {
			return Ok(false);
		};
		let outcome = ctx.executor.unfollow_profile(page, candidate).await?;
		Ok(ctx.executor.counts(outcome))
	}

	async fn on_empty(&mut self, page: &dyn PageDriver, ctx: &StrategyContext<'_>) -> Result<()> {
		if ctx.auth.is_logged_in(page).await? {
			warn!(target = "prune.strategy", "logged in but the API returned no followed accounts");
			return Ok(());
		}
		info!(target = "prune.strategy", "API returned nothing and the session is logged out; logging in again");
		ctx.auth.ensure_logged_in(page).await
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::auth::Authenticator;
	use crate::config::{Credentials, Timings};
	use crate::driver::mock::{MockAccount, MockPage};
	use crate::executor::{Executor, VerifyPolicy};
	use crate::filter::SkipRules;
	use crate::strategy::{StrategyChain, UiListStrategy};

	struct Deps {
		site: Site,
		timings: Timings,
		auth: Authenticator,
		executor: Executor,
	}

	fn deps() -> Deps {
		let site = Site::default();
		let timings = Timings::immediate();
		let auth = Authenticator::new(site.clone(), Credentials::default(), timings.clone());
		let executor = Executor::new(site.clone(), timings.clone(), VerifyPolicy::Optimistic, auth.clone());
		Deps {
			site,
			timings,
			auth,
			executor,
		}
	}

	impl Deps {
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
	async fn list_failure_falls_back_to_api_with_skip_rules() {
		let deps = deps();
		let page = MockPage::new("me")
			.with_list(None, None)
			.with_accounts([
				MockAccount::following("friend"),
				MockAccount::following("shop.brand"),
				MockAccount::following("pal"),
			])
			.with_api_pages([Some(MockPage::api_page(&["friend", "shop.brand", "pal"], None))]);

		let skip = SkipRules::from_lists(false, false, "", "shop", "");
		let mut chain = StrategyChain::standard(deps.site.clone(), skip);
		let report = chain.run_cycle(&page, &deps.ctx(), 5).await;

		assert_eq!(report.removed, 2);
		assert_eq!(report.skipped, 1);
		assert_eq!(page.actions(), vec!["friend", "pal"]);
		assert!(report.runs[0].error.is_some());
		assert_eq!(report.runs[1].name, "api");
	}

	#[tokio::test]
	async fn empty_api_while_logged_out_triggers_login() {
		let deps = deps();
		let page = MockPage::new("me").with_list(None, None).login_after_checks(2);

		let mut chain = StrategyChain::new(
			vec![Box::new(UiListStrategy::new()), Box::new(ApiStrategy::new(deps.site.clone()))],
			SkipRules::default(),
		);
		let report = chain.run_cycle(&page, &deps.ctx(), 5).await;

		assert_eq!(report.removed, 0);
		assert!(page.is_logged_in());
		assert!(page.navigations().iter().any(|u| u == "https://www.instagram.com/"));
	}
}
