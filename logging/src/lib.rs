//! Log configuration shared by the `geokv` binaries.

use tracing::metadata::LevelFilter;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{fmt, EnvFilter};

/// Installs a global subscriber writing to stderr at `INFO`, unless `RUST_LOG` says otherwise.
pub fn configure() {
    configure_with_default(LevelFilter::INFO);
}

/// Same as [`configure`] but with a caller-chosen default level. `RUST_LOG` still wins.
pub fn configure_with_default(level: LevelFilter) {
    // Keep stdout clean for the demo's own output.
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr).with_ansi(false))
        .with(
            EnvFilter::builder()
                .with_default_directive(level.into())
                .from_env_lossy(),
        )
        .init();
}
