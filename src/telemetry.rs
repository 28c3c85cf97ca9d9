use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

const DEFAULT_FILTER: &str = "coach_log=info";

/// Install the global tracing subscriber. `RUST_LOG` overrides the default
/// filter. Calling this more than once is harmless.
pub fn init() {
  let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

  let installed = tracing_subscriber::registry()
    .with(filter)
    .with(tracing_subscriber::fmt::layer())
    .try_init()
    .is_ok();

  if installed {
    tracing::debug!("tracing initialized");
  }
}
