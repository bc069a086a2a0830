//! Ctrl+C handling.
//!
//! A single process-wide [`ShutdownHandler`] owns the `AtomicBool` that the
//! scan pipeline, deletion executor and prune pass poll between files. The
//! first interrupt sets the flag; work in flight finishes, nothing new starts,
//! and the command exits with code 130.
//!
//! ```rust,no_run
//! use dupedb::scanner::ScanConfig;
//! use dupedb::signal::install_handler;
//!
//! let handler = install_handler().unwrap();
//! let config = ScanConfig::default().with_shutdown_flag(handler.flag());
//! ```

use std::io::Write;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock};

/// Shared shutdown flag.
#[derive(Debug, Clone, Default)]
pub struct ShutdownHandler {
    flag: Arc<AtomicBool>,
}

impl ShutdownHandler {
    /// A handler with no shutdown requested and no signal hook.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// True once Ctrl+C was pressed or a shutdown was requested.
    #[must_use]
    pub fn is_shutdown_requested(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }

    /// Set the flag as if Ctrl+C had been pressed.
    pub fn request_shutdown(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    /// The flag to hand to [`ScanConfig`](crate::scanner::ScanConfig) and friends.
    #[must_use]
    pub fn flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.flag)
    }

    fn reset(&self) {
        self.flag.store(false, Ordering::SeqCst);
    }
}

/// Error installing the Ctrl+C hook.
#[derive(Debug, thiserror::Error)]
pub enum SignalError {
    /// `ctrlc` could not register the handler, usually because another one
    /// is already installed.
    #[error("failed to install signal handler: {0}")]
    InstallFailed(#[from] ctrlc::Error),
}

static GLOBAL_HANDLER: OnceLock<ShutdownHandler> = OnceLock::new();

/// Install the Ctrl+C hook, or return the already-installed handler with its
/// flag cleared.
///
/// The hook can only be registered once per process, so repeated calls (as
/// happen when tests drive `run_app` several times) share one handler.
///
/// # Errors
///
/// Returns [`SignalError::InstallFailed`] if the OS refuses the hook on the
/// first call.
pub fn install_handler() -> Result<ShutdownHandler, SignalError> {
    if let Some(handler) = GLOBAL_HANDLER.get() {
        handler.reset();
        return Ok(handler.clone());
    }

    let handler = ShutdownHandler::new();
    let flag = handler.flag();
    let hook = ctrlc::set_handler(move || {
        flag.store(true, Ordering::SeqCst);
        let mut stderr = std::io::stderr();
        let _ = writeln!(stderr, "\nInterrupted, finishing current files...");
        let _ = stderr.flush();
        log::info!("Shutdown signal received");
    });

    match hook {
        Ok(()) => Ok(GLOBAL_HANDLER.get_or_init(|| handler).clone()),
        Err(ctrlc::Error::MultipleHandlers) => {
            log::debug!("Ctrl+C hook already registered elsewhere, using an unhooked flag");
            Ok(GLOBAL_HANDLER.get_or_init(ShutdownHandler::new).clone())
        }
        Err(e) => Err(e.into()),
    }
}
