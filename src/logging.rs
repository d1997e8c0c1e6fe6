//! Logging setup. Thin wrapper over `env_logger`, the hosted-binary
//! equivalent of the bare-metal level filter the teacher hand-rolls for its
//! no_std target — this binary runs on a normal OS, so the ecosystem crate
//! does the job instead.

/// Initializes the `log` facade from `-v` count, unless `RUST_LOG` is set.
pub fn init(verbosity: u8) {
	if std::env::var_os("RUST_LOG").is_some() {
		env_logger::init();
		return;
	}

	let level = match verbosity {
		0 => log::LevelFilter::Warn,
		1 => log::LevelFilter::Info,
		2 => log::LevelFilter::Debug,
		_ => log::LevelFilter::Trace,
	};

	env_logger::Builder::new().filter_level(level).init();
}
