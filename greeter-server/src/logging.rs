use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

/// Install the global subscriber. `RUST_LOG` overrides the defaults.
pub fn init(verbose: bool) {
    let default_filter = if verbose {
        "greeter=debug,greeter_core=debug,tower_http=debug"
    } else {
        "greeter=info,greeter_core=info,tower_http=info"
    };

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter)))
        .with(tracing_subscriber::fmt::layer().with_target(false).compact())
        .init();
}
