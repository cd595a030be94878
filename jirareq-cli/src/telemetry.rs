use std::{fmt::Display, time::Instant};

use tracing::info;
use tracing_subscriber::EnvFilter;

const LOG_ENV: &str = "JIRAREQ_LOG";
const DEFAULT_LOG_LEVEL: &str = "warn";

pub fn init_logging() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_env(LOG_ENV)
                .or_else(|_| EnvFilter::try_new(DEFAULT_LOG_LEVEL))
                .unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_LEVEL)),
        )
        .with_writer(std::io::stderr)
        .try_init();
}

/// Runs `action` and reports its duration on the `jirareq_telemetry` target.
pub fn timed<T, E, F>(op: &str, action: F) -> Result<T, E>
where
    E: Display,
    F: FnOnce() -> Result<T, E>,
{
    let started = Instant::now();
    let result = action();
    let duration_ms = started.elapsed().as_millis() as u64;
    match &result {
        Ok(_) => info!(target: "jirareq_telemetry", op, status = "ok", duration_ms),
        Err(err) => info!(
            target: "jirareq_telemetry",
            op,
            status = "error",
            duration_ms,
            error = %err
        ),
    }
    result
}
