pub const LOG_ENV: &str = "PENNYWISE_LOG";
const DEFAULT_FILTER: &str = "pennywise=info,sqlx=warn";

/// Install the JSON tracing subscriber and bridge `log` records into it.
///
/// The filter comes from `PENNYWISE_LOG` and defaults to
/// `pennywise=info,sqlx=warn`. Calling this more than once is harmless; only
/// the first subscriber wins.
pub fn init() {
    let _ = tracing_log::LogTracer::init();
    let _ = tracing_subscriber::fmt()
        .with_env_filter(std::env::var(LOG_ENV).unwrap_or_else(|_| DEFAULT_FILTER.into()))
        .json()
        .with_target(true)
        .with_writer(std::io::stderr)
        .with_timer(tracing_subscriber::fmt::time::UtcTime::rfc_3339())
        .try_init();
}
