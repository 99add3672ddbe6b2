//! # Structured Logging
//!
//! Logging setup and span helpers built on the tracing ecosystem.
//!
//! Every broker operation gets an `op_span!` with a generated operation id
//! so all fan-out calls belonging to one logical request can be correlated
//! in the log stream. Bearer tokens and root credentials are never logged;
//! only backend addresses, statuses and counts are.

use tracing_subscriber::EnvFilter;

use crate::config::ObservabilityConfig;
use crate::errors::Result;

/// Create a tracing span for one broker operation.
///
/// The span carries the operation name and a fresh operation id; fan-out
/// calls add their own `backend` fields underneath it.
///
/// ```rust,ignore
/// let span = op_span!("rotate");
/// let span = op_span!("write", backends = 3);
/// ```
#[macro_export]
macro_rules! op_span {
    ($operation:expr) => {
        tracing::info_span!(
            "broker_operation",
            operation = %$operation,
            operation_id = %uuid::Uuid::new_v4()
        )
    };
    ($operation:expr, $($field:tt)*) => {
        tracing::info_span!(
            "broker_operation",
            operation = %$operation,
            operation_id = %uuid::Uuid::new_v4(),
            $($field)*
        )
    };
}

/// Initialize the global tracing subscriber.
///
/// The filter comes from `RUST_LOG` when set, otherwise from the configured
/// log level. Safe to call more than once; later calls are no-ops.
pub fn init_logging(config: &ObservabilityConfig) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.log_level.clone()));

    let builder = tracing_subscriber::fmt().with_env_filter(filter).with_target(true);

    // A subscriber may already be installed (tests, embedding applications).
    let result = if config.json_logs {
        builder.json().try_init()
    } else {
        builder.try_init()
    };

    if let Err(e) = result {
        tracing::debug!(error = %e, "Tracing subscriber already initialized");
    }

    Ok(())
}

/// Log effective configuration at startup. Credentials are redacted by
/// their own Display impl and never reach this function as plain strings.
pub fn log_config_info(config: &crate::config::AppConfig) {
    tracing::info!(
        service_name = %config.observability.service_name,
        backend_count = config.backends.len(),
        token_refresh_secs = config.token_refresh_secs,
        request_timeout_secs = config.request_timeout_secs,
        log_level = %config.observability.log_level,
        "vaultmesh broker configuration"
    );
}
