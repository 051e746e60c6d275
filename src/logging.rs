use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Install the global tracing subscriber.
///
/// `RUST_LOG` wins when set; otherwise this crate logs at debug in debug
/// builds and info in release builds, and dependencies only warn.
pub fn init() {
    let default_level = if cfg!(debug_assertions) { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("warn,tierdeck={}", default_level)));

    let installed = tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(false))
        .try_init();

    if let Err(e) = installed {
        eprintln!("Logging already initialized: {}", e);
    }
}
