//! Tracing setup shared by the binaries

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};
use wdome_common::config::CompiledDefaults;

/// Default filter directive when `RUST_LOG` is unset
///
/// The configured level when it is a valid filter, otherwise the compiled default.
pub fn default_directive(configured: &str) -> String {
    let configured = configured.trim();
    if !configured.is_empty() && EnvFilter::try_new(configured).is_ok() {
        configured.to_string()
    } else {
        CompiledDefaults::for_current_platform().log_level
    }
}

/// Install the global subscriber: `RUST_LOG` first, then the configured level
pub fn init_tracing(configured_level: &str) {
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(default_directive(configured_level))),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_blank_level_uses_compiled_default() {
        assert_eq!(default_directive(""), "info");
        assert_eq!(default_directive("   "), "info");
    }

    #[test]
    fn test_configured_level_kept() {
        assert_eq!(default_directive("debug"), "debug");
        assert_eq!(default_directive(" wdome_ie=trace "), "wdome_ie=trace");
    }
}
