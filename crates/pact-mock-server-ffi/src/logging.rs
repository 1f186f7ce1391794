//! Log setup for foreign callers.

use tracing_subscriber::EnvFilter;

const DEFAULT_LOG_LEVEL: &str = "info";

/// Build the filter from `env_var`, then `RUST_LOG`, then `info`.
pub(crate) fn env_filter(env_var: Option<&str>) -> EnvFilter {
    env_var
        .and_then(|name| std::env::var(name).ok())
        .and_then(|directives| EnvFilter::try_new(directives).ok())
        .or_else(|| EnvFilter::try_from_default_env().ok())
        .unwrap_or_else(|| EnvFilter::new(DEFAULT_LOG_LEVEL))
}

/// Install the global subscriber. Returns false if one is already set.
pub(crate) fn init_logging(env_var: Option<&str>) -> bool {
    tracing_subscriber::fmt()
        .with_env_filter(env_filter(env_var))
        .with_thread_names(true)
        .try_init()
        .is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_filter_from_named_variable() {
        std::env::set_var("PACT_FFI_TEST_LOG", "debug");
        let filter = env_filter(Some("PACT_FFI_TEST_LOG"));
        assert_eq!(filter.to_string(), "debug");
    }

    #[test]
    fn test_second_init_is_harmless() {
        init_logging(None);
        assert!(!init_logging(None));
    }
}
