//! Tracing subscriber setup for hosts that do not install their own.

use tracing_subscriber::EnvFilter;

use crate::config::CoreConfig;

/// Filter used when `RUST_LOG` is unset
pub fn default_filter(config: &CoreConfig) -> &'static str {
    if config.verbose_logging {
        "info,warden_core=debug"
    } else {
        "info"
    }
}

/// Install a fmt subscriber. `RUST_LOG` wins over the config.
///
/// Returns `false` if a global subscriber was already set; calling this more
/// than once is harmless.
pub fn init_logging(config: &CoreConfig) -> bool {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter(config)));

    let installed = tracing_subscriber::fmt().with_env_filter(filter).try_init().is_ok();
    if installed {
        tracing::info!("Warden Core v{} logging initialized", env!("CARGO_PKG_VERSION"));
    }
    installed
}
