//! Error reporting: the single path through which failures become visible.
//!
//! Components never print. They hand an [`ErrorReport`] to an [`ErrorSink`]
//! and return the matching [`Error`] to their caller. The module-level
//! [`ErrorHandler`] counts what it sees (so that [`Module::init_check`] can
//! fail a module that reported errors during setup) and forwards each report
//! to `tracing`, or to a user callback when one is installed.
//!
//! [`Module::init_check`]: crate::Module::init_check

use crate::error::{Error, Status};
use parking_lot::RwLock;
use std::panic::Location;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::SystemTime;

/// How bad a reported failure is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(u8)]
pub enum Severity {
    /// The component cannot continue.
    Critical = 2,
    /// The operation failed.
    Error = 3,
    /// Something unexpected happened but the operation continued.
    Warning = 4,
    /// Normal but significant condition.
    Notice = 5,
    /// Informational.
    Info = 6,
}

impl Severity {
    /// Whether this severity marks a failed operation.
    pub const fn is_failure(self) -> bool {
        matches!(self, Self::Critical | Self::Error)
    }
}

/// Which part of the framework raised a report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Component {
    /// Framework-level plumbing.
    System,
    /// Module lifecycle.
    Module,
    /// App registration and instance management.
    App,
    /// Session bookkeeping.
    Session,
    /// Signal-processing configuration.
    SpConfig,
    /// Processor lifecycle and frame handling.
    SpProcessor,
    /// Channel model.
    Channel,
    /// Observer registry.
    Observer,
}

impl Component {
    /// Short lowercase name, used as a structured log field.
    pub const fn name(self) -> &'static str {
        match self {
            Self::System => "system",
            Self::Module => "module",
            Self::App => "app",
            Self::Session => "session",
            Self::SpConfig => "sp_config",
            Self::SpProcessor => "sp_processor",
            Self::Channel => "channel",
            Self::Observer => "observer",
        }
    }
}

/// One reported failure.
#[derive(Debug, Clone)]
pub struct ErrorReport {
    /// The error returned to the caller.
    pub error: Error,
    /// Severity assigned by the reporting component.
    pub severity: Severity,
    /// Reporting component.
    pub component: Component,
    /// Source location of the call that raised the error.
    pub location: &'static Location<'static>,
    /// Wall-clock time of the report.
    pub timestamp: SystemTime,
}

impl ErrorReport {
    /// Kind of the reported error.
    pub fn status(&self) -> Status {
        self.error.kind()
    }
}

/// Receiver of error reports.
///
/// Implementations must be callable from any thread, including the media
/// thread, and should return quickly.
pub trait ErrorSink: Send + Sync {
    /// Record one report.
    fn report(&self, report: &ErrorReport);
}

impl<F> ErrorSink for F
where
    F: Fn(&ErrorReport) + Send + Sync,
{
    fn report(&self, report: &ErrorReport) {
        self(report)
    }
}

/// Report `error` to `sink` and hand it back for propagation.
///
/// Captures the caller's source location.
#[track_caller]
pub fn raise(sink: &dyn ErrorSink, error: Error, severity: Severity, component: Component) -> Error {
    let report = ErrorReport {
        error: error.clone(),
        severity,
        component,
        location: Location::caller(),
        timestamp: SystemTime::now(),
    };
    sink.report(&report);
    error
}

type ReportCallback = Arc<dyn Fn(&ErrorReport) + Send + Sync>;

/// Module-level error sink.
///
/// Counts failure reports and forwards every report to `tracing` unless a
/// callback has been installed with [`set_callback`](Self::set_callback).
#[derive(Default)]
pub struct ErrorHandler {
    failures: AtomicUsize,
    callback: RwLock<Option<ReportCallback>>,
}

impl ErrorHandler {
    /// Create a handler that forwards to `tracing`.
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace `tracing` forwarding with `callback`.
    pub fn set_callback(&self, callback: impl Fn(&ErrorReport) + Send + Sync + 'static) {
        *self.callback.write() = Some(Arc::new(callback));
    }

    /// Restore `tracing` forwarding.
    pub fn clear_callback(&self) {
        *self.callback.write() = None;
    }

    /// Whether any critical or error report has been seen.
    pub fn has_error(&self) -> bool {
        self.failure_count() > 0
    }

    /// Number of critical or error reports seen.
    pub fn failure_count(&self) -> usize {
        self.failures.load(Ordering::Acquire)
    }

    /// Reset the failure counter.
    pub fn reset(&self) {
        self.failures.store(0, Ordering::Release);
    }
}

impl ErrorSink for ErrorHandler {
    fn report(&self, report: &ErrorReport) {
        if report.severity.is_failure() {
            self.failures.fetch_add(1, Ordering::AcqRel);
        }

        let callback = self.callback.read().clone();
        match callback {
            Some(callback) => callback(report),
            None => emit(report),
        }
    }
}

impl std::fmt::Debug for ErrorHandler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ErrorHandler")
            .field("failures", &self.failure_count())
            .field("callback", &self.callback.read().is_some())
            .finish()
    }
}

fn emit(report: &ErrorReport) {
    let component = report.component.name();
    let file = report.location.file();
    let line = report.location.line();
    match report.severity {
        Severity::Critical => {
            tracing::error!(component, file, line, critical = true, "{}", report.error);
        }
        Severity::Error => tracing::error!(component, file, line, "{}", report.error),
        Severity::Warning => tracing::warn!(component, file, line, "{}", report.error),
        Severity::Notice => tracing::info!(component, file, line, "{}", report.error),
        Severity::Info => tracing::debug!(component, file, line, "{}", report.error),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;

    #[test]
    fn raise_returns_error_and_records_location() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = {
            let seen = Arc::clone(&seen);
            move |r: &ErrorReport| seen.lock().push((r.status(), r.location.file()))
        };

        let err = raise(
            &sink,
            Error::invalid_argument("missing process"),
            Severity::Error,
            Component::App,
        );

        assert_eq!(err.kind(), Status::InvalidArgument);
        let seen = seen.lock();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].0, Status::InvalidArgument);
        assert!(seen[0].1.ends_with("report.rs"));
    }

    #[test]
    fn handler_counts_only_failures() {
        let handler = ErrorHandler::new();
        raise(&handler, Error::invalid_argument("a"), Severity::Warning, Component::System);
        assert!(!handler.has_error());

        raise(&handler, Error::invalid_argument("b"), Severity::Error, Component::System);
        raise(&handler, Error::MediaBug("c".into()), Severity::Critical, Component::SpProcessor);
        assert_eq!(handler.failure_count(), 2);

        handler.reset();
        assert!(!handler.has_error());
    }

    #[test]
    fn handler_callback_replaces_forwarding() {
        let handler = ErrorHandler::new();
        let hits = Arc::new(AtomicUsize::new(0));
        {
            let hits = Arc::clone(&hits);
            handler.set_callback(move |_| {
                hits.fetch_add(1, Ordering::Relaxed);
            });
        }
        raise(&handler, Error::invalid_argument("x"), Severity::Info, Component::Module);
        assert_eq!(hits.load(Ordering::Relaxed), 1);

        handler.clear_callback();
        raise(&handler, Error::invalid_argument("y"), Severity::Info, Component::Module);
        assert_eq!(hits.load(Ordering::Relaxed), 1);
    }

    #[test]
    fn severity_ordering_matches_levels() {
        assert!(Severity::Critical < Severity::Info);
        assert!(Severity::Critical.is_failure());
        assert!(!Severity::Notice.is_failure());
    }
}
