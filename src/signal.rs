//! Ctrl+C handling.
//!
//! A single `AtomicBool` is shared between the signal hook and the ingestion
//! run. The walker checks it between entries and the pipeline between
//! batches; once raised, the run stops and the freshness cache is not saved.
//!
//! ```rust,no_run
//! use lorekeeper::ingest::IngestOptions;
//! use lorekeeper::signal::install_handler;
//!
//! let handler = install_handler().expect("signal handler");
//! let options = IngestOptions::default().with_shutdown_flag(handler.get_flag());
//! ```

use std::io::Write;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock};

/// Exit code for SIGINT (128 + 2).
pub const EXIT_CODE_INTERRUPTED: i32 = 130;

/// Printed to stderr when Ctrl+C arrives.
const INTERRUPT_MESSAGE: &str = "\nInterrupted.";

/// Shared shutdown flag.
#[derive(Debug, Clone, Default)]
pub struct ShutdownHandler {
    flag: Arc<AtomicBool>,
}

impl ShutdownHandler {
    /// Handler with no shutdown requested.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether Ctrl+C was pressed or [`request_shutdown`](Self::request_shutdown) called.
    #[must_use]
    pub fn is_shutdown_requested(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }

    /// Raise the flag by hand.
    pub fn request_shutdown(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    /// The flag, to pass to
    /// [`IngestOptions::with_shutdown_flag`](crate::ingest::IngestOptions::with_shutdown_flag).
    #[must_use]
    pub fn get_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.flag)
    }

    /// Lower the flag so the handler can serve another run.
    pub fn reset(&self) {
        self.flag.store(false, Ordering::SeqCst);
    }
}

/// Signal handler installation failure.
#[derive(Debug, thiserror::Error)]
pub enum SignalError {
    /// The Ctrl+C hook could not be registered.
    #[error("Failed to install signal handler: {0}")]
    InstallFailed(#[from] ctrlc::Error),
}

static GLOBAL_HANDLER: OnceLock<ShutdownHandler> = OnceLock::new();

/// Install the process-wide Ctrl+C hook and return its handler.
///
/// `ctrlc` accepts one hook per process. Later calls (repeated
/// [`crate::run_app`] invocations, parallel tests) get the installed handler
/// back with its flag lowered. If another component already owns the hook,
/// an unhooked handler is returned.
///
/// # Errors
///
/// Currently always succeeds; the `Result` leaves room for platforms where
/// registration is fatal.
pub fn install_handler() -> Result<ShutdownHandler, SignalError> {
    if let Some(handler) = GLOBAL_HANDLER.get() {
        handler.reset();
        return Ok(handler.clone());
    }

    let handler = ShutdownHandler::new();
    let flag = handler.get_flag();
    let installed = ctrlc::set_handler(move || {
        flag.store(true, Ordering::SeqCst);
        let mut stderr = std::io::stderr();
        let _ = writeln!(stderr, "{INTERRUPT_MESSAGE}");
        let _ = stderr.flush();
        log::info!("Shutdown signal received");
    });

    let handler = match installed {
        Ok(()) => handler,
        Err(e) => {
            log::debug!("Ctrl+C hook unavailable ({e}), using unhooked handler");
            handler
        }
    };
    let global = GLOBAL_HANDLER.get_or_init(|| handler);
    global.reset();
    Ok(global.clone())
}
