//! Logging setup based on `tracing-subscriber`.

/// Default filter used by [`init`].
pub const DEFAULT_FILTER: &str = "info,vertexa_render=debug,wgpu_core=warn,wgpu_hal=warn,naga=warn";

/// Install a global fmt subscriber with the default filter.
///
/// Honors `RUST_LOG` when it is set.
pub fn init() {
    init_with_filter(DEFAULT_FILTER);
}

/// Install a global fmt subscriber with a custom fallback filter.
///
/// Calling this more than once is harmless; later calls are ignored.
pub fn init_with_filter(filter: &str) {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_twice_does_not_panic() {
        init_with_filter("warn");
        init();
    }
}
