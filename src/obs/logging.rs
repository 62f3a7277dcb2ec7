// crates.io
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

/// Builds the filter: `RUST_LOG` wins, otherwise `debug` or `info` depending on `enable_debug`.
pub fn log_filter(enable_debug: bool) -> EnvFilter {
	EnvFilter::try_from_default_env().unwrap_or_else(|_| default_filter(enable_debug))
}

/// Installs the global fmt subscriber. Later calls are ignored.
pub fn init_logging(enable_debug: bool) {
	let _ = tracing_subscriber::registry()
		.with(log_filter(enable_debug))
		.with(tracing_subscriber::fmt::layer())
		.try_init();
}

fn default_filter(enable_debug: bool) -> EnvFilter {
	if enable_debug {
		EnvFilter::new("info,hub_authorization=debug,tower_http=debug")
	} else {
		EnvFilter::new("info")
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn debug_flag_raises_crate_level() {
		assert!(default_filter(true).to_string().contains("hub_authorization=debug"));
		assert_eq!(default_filter(false).to_string(), "info");
	}
}
