mod cli;
mod logging;
mod signals;

use std::process::ExitCode;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use colored::Colorize;
use prune::session::Launcher;
use prune::wait::shutdown_requested;
use prune::{Acquirer, Authenticator, ChromeLauncher, Orchestrator, SessionSupervisor, StrategyChain, SystemClock};
use tokio::sync::watch;
use tracing::{error, info};

use crate::cli::Cli;

#[tokio::main]
async fn main() -> ExitCode {
	let dotenv = dotenvy::dotenv();
	let cli = Cli::parse();
	logging::init_logging(cli.verbose);
	logging::install_panic_hook();
	if let Ok(path) = dotenv {
		info!(target = "prune", path = %path.display(), "loaded environment file");
	}

	match run(cli).await {
		Ok(()) => ExitCode::SUCCESS,
		Err(err) => {
			error!(target = "prune", error = %format!("{err:#}"), "fatal");
			eprintln!("{} {err:#}", "error:".red().bold());
			ExitCode::FAILURE
		}
	}
}

async fn run(cli: Cli) -> anyhow::Result<()> {
	let config = cli.into_config();
	let (shutdown_tx, shutdown_rx) = watch::channel(false);
	signals::spawn(shutdown_tx).context("failed to install signal handlers")?;

	info!(
		target = "prune",
		version = env!("CARGO_PKG_VERSION"),
		per_cycle = config.quota.per_cycle,
		daily_cap = config.quota.daily_cap,
		"follow-prune starting"
	);

	let launcher: Arc<dyn Launcher> = Arc::new(ChromeLauncher::new(&config.browser, &config.site, &config.timings));
	let acquirer = Acquirer::new(config.browser.clone(), config.timings.clone(), launcher);
	let auth = Authenticator::new(config.site.clone(), config.credentials.clone(), config.timings.clone());

	let mut startup_shutdown = shutdown_rx.clone();
	let supervisor = tokio::select! {
		started = SessionSupervisor::start(acquirer, auth, config.timings.clone(), shutdown_rx.clone()) => {
			started.context("could not start the browser session")?
		}
		_ = shutdown_requested(&mut startup_shutdown) => {
			info!(target = "prune", "shutdown requested during startup");
			return Ok(());
		}
	};

	let chain = StrategyChain::standard(config.site.clone(), config.skip.clone());
	let mut orchestrator = Orchestrator::new(&config, chain, supervisor.handle(), Arc::new(SystemClock));
	orchestrator.run(shutdown_rx).await;
	supervisor.join().await;
	info!(target = "prune", "stopped");
	Ok(())
}
