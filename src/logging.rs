use tracing_subscriber::EnvFilter;

/// Installs a fmt subscriber for binaries and ad-hoc debugging.
///
/// `RUST_LOG` takes precedence over `default_filter`. Calling this twice is
/// harmless; the second installation is ignored.
pub fn init_tracing(default_filter: &str) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_level(true)
        .with_timer(tracing_subscriber::fmt::time::UtcTime::rfc_3339())
        .try_init();
}
