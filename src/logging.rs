use tracing_subscriber::{fmt, EnvFilter};

/// Dependencies stay quiet unless RUST_LOG says otherwise.
const DEFAULT_FILTER: &str = "warn,hyper=error,reqwest=error,eventypop_tester=warn";

/// Logs go to stderr; stdout carries command output only.
pub fn init_logging(json: bool) {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

    if json {
        let _ = fmt::Subscriber::builder()
            .with_env_filter(env_filter)
            .json()
            .with_current_span(false)
            .with_writer(std::io::stderr)
            .try_init();
    } else {
        let _ = fmt::Subscriber::builder()
            .with_env_filter(env_filter)
            .with_target(false)
            .compact()
            .with_writer(std::io::stderr)
            .try_init();
    }
}
