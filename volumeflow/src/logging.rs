//! Process-wide tracing setup.

use std::sync::OnceLock;

use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use crate::runtime::FilesystemLayout;
use crate::runtime::layout::filenames;
use volumeflow_shared::VolumeflowResult;

/// Set on the first call. Holds the writer guard when our subscriber was
/// installed, `None` when another subscriber already owned the process.
static LOG_GUARD: OnceLock<Option<WorkerGuard>> = OnceLock::new();

/// Install a daily-rolling file subscriber under `<home>/logs`.
///
/// Filter comes from `RUST_LOG`, defaulting to `info`. Only the first call
/// does anything; if another global subscriber is already installed (a test
/// harness, an embedding application) it is left in place.
pub fn init_logging_for(layout: &FilesystemLayout) -> VolumeflowResult<()> {
    if LOG_GUARD.get().is_some() {
        return Ok(());
    }

    std::fs::create_dir_all(layout.logs_dir())?;
    let mut installed = false;
    LOG_GUARD.get_or_init(|| {
        installed = true;
        install_subscriber(layout)
    });

    if installed {
        tracing::debug!(logs_dir = %layout.logs_dir().display(), "logging initialized");
    }
    Ok(())
}

fn install_subscriber(layout: &FilesystemLayout) -> Option<WorkerGuard> {
    let appender = tracing_appender::rolling::daily(layout.logs_dir(), filenames::LOG_PREFIX);
    let (writer, guard) = tracing_appender::non_blocking(appender);

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let installed = tracing_subscriber::registry()
        .with(env_filter)
        .with(
            fmt::layer()
                .with_writer(writer)
                .with_ansi(false)
                .with_target(true)
                .with_thread_ids(true),
        )
        .try_init();

    match installed {
        Ok(()) => Some(guard),
        Err(e) => {
            tracing::debug!("global subscriber already installed: {}", e);
            None
        }
    }
}
