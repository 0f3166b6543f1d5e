//! Console logging via the tracing ecosystem.
//!
//! Logs go to stdout for container-friendly collection. The level comes
//! from the `logger.level` config section, overridable with `RUST_LOG`.
//! ANSI colors are enabled only when stdout is a TTY.

use std::io::IsTerminal;
use std::sync::OnceLock;

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

static TRACING_INITIALIZED: OnceLock<()> = OnceLock::new();

/// Initialize the global tracing subscriber. Safe to call more than once;
/// subsequent calls are no-ops.
pub fn init_tracing(default_level: &str) {
    let default_level = default_level.to_string();
    TRACING_INITIALIZED.get_or_init(|| {
        let filter =
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&default_level));

        let use_ansi = std::io::stdout().is_terminal();

        let console_layer = fmt::layer()
            .with_target(true)
            .with_level(true)
            .with_ansi(use_ansi);

        if tracing_subscriber::registry()
            .with(filter)
            .with(console_layer)
            .try_init()
            .is_ok()
        {
            tracing::info!(ansi_colors = use_ansi, "console logging initialized");
        }
    });
}
