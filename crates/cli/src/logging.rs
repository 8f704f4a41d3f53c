use tracing::error;
use tracing_subscriber::EnvFilter;

/// Installs the fmt subscriber. `RUST_LOG` wins over `-v`.
pub fn init_logging(verbose: u8) {
	let directives = match verbose {
		0 => "info",
		1 => "info,prune=debug",
		_ => "debug,prune=trace",
	};
	let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(directives));

	tracing_subscriber::fmt()
		.with_env_filter(filter)
		.with_target(verbose > 0)
		.init();
}

/// Routes panics through the log. Panicking tasks do not end the process.
pub fn install_panic_hook() {
	std::panic::set_hook(Box::new(|info| {
		let location = info.location().map(|l| format!("{}:{}", l.file(), l.line())).unwrap_or_default();
		error!(target = "prune", %location, panic = %info, "panic");
	}));
}
