use tracing_subscriber::EnvFilter;

/// Initialize logging for the binaries.
///
/// `RUST_LOG` wins when set, otherwise everything at `info` and above is shown.
pub fn init() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .compact()
        .init();
}
