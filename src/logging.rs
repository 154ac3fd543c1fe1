use std::io;

use tracing_subscriber::{
    Layer,
    filter::{LevelFilter, Targets},
    fmt,
    layer::SubscriberExt,
    util::SubscriberInitExt,
};

#[derive(Debug, thiserror::Error)]
pub enum LogError {
    #[error("subscriber init failed: {0}")]
    SubscriberInit(#[from] tracing_subscriber::util::TryInitError),
}

/// Installs the global stderr subscriber. Per-request failures are logged at
/// `DEBUG`, so they only show up with `verbose`.
pub fn init(verbose: bool) -> Result<(), LogError> {
    let layer = fmt::layer()
        .with_writer(io::stderr)
        .with_target(false)
        .without_time()
        .with_filter(filter(verbose));

    tracing_subscriber::registry().with(layer).try_init()?;
    Ok(())
}

/// `verbose` only opens this crate up to `DEBUG`; the http stack stays at `WARN`.
fn filter(verbose: bool) -> Targets {
    let targets = Targets::new().with_default(LevelFilter::WARN);
    if verbose {
        targets.with_target(env!("CARGO_CRATE_NAME"), LevelFilter::DEBUG)
    } else {
        targets
    }
}
