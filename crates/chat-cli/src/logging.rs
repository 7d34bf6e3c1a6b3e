use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Install the global subscriber. `RUST_LOG` wins over `level`; `log`
/// records from dependencies are bridged into the same output.
pub fn init_logging(level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let result = tracing_subscriber::registry()
        .with(filter)
        .with(
            fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(true)
                .with_line_number(false)
                .with_file(false),
        )
        .try_init();

    if let Err(e) = result {
        eprintln!("Logging already initialised: {e}");
    }
}

/// Level used when `RUST_LOG` is unset.
pub fn default_level(debug: bool, log_level: Option<&str>) -> String {
    match (debug, log_level) {
        (true, _) => "debug".to_string(),
        (false, Some(level)) => level.to_string(),
        (false, None) => "warn".to_string(),
    }
}
