use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Install the global subscriber.
/// - JSON logs unless WXBRIDGE_LOG_FORMAT=pretty
/// - RUST_LOG respected; default to "info,wxb=debug"
pub fn init(service_name: &str) {
    let default_filter = "info,wxb=debug";
    let env_filter = std::env::var("RUST_LOG").unwrap_or_else(|_| default_filter.to_string());
    let pretty = std::env::var("WXBRIDGE_LOG_FORMAT").is_ok_and(|f| f.eq_ignore_ascii_case("pretty"));

    let registry = tracing_subscriber::registry().with(EnvFilter::new(env_filter));
    if pretty {
        registry.with(tracing_subscriber::fmt::layer().pretty()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    }

    tracing::info!(service = %service_name, "logging initialized");
}
