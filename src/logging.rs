//! Explicit logging context.
//!
//! The library only emits `tracing` events. The process entry point owns a
//! [`LogContext`] and runs its work inside [`LogContext::scope`]; nothing here
//! installs a global subscriber.

use std::fs::OpenOptions;
use std::io;
use std::path::PathBuf;
use std::sync::Mutex;

use serde::{Deserialize, Serialize};
use tracing::level_filters::LevelFilter;
use tracing::Dispatch;
use tracing_subscriber::fmt::writer::BoxMakeWriter;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Verbosity {
    /// Errors only.
    Quiet,
    #[default]
    Normal,
    Verbose,
    Trace,
}

impl Verbosity {
    #[must_use]
    pub const fn level(self) -> LevelFilter {
        match self {
            Self::Quiet => LevelFilter::ERROR,
            Self::Normal => LevelFilter::INFO,
            Self::Verbose => LevelFilter::DEBUG,
            Self::Trace => LevelFilter::TRACE,
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum LogDestination {
    #[default]
    Stderr,
    /// Appended to; created if missing.
    File(PathBuf),
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct LogContext {
    pub verbosity: Verbosity,
    pub destination: LogDestination,
}

impl LogContext {
    #[must_use]
    pub const fn new(verbosity: Verbosity, destination: LogDestination) -> Self {
        Self { verbosity, destination }
    }

    /// Build the dispatcher for this context.
    ///
    /// # Errors
    ///
    /// Returns the I/O error if the log file cannot be opened.
    pub fn dispatch(&self) -> io::Result<Dispatch> {
        let (writer, ansi) = match &self.destination {
            LogDestination::Stderr => (BoxMakeWriter::new(io::stderr), true),
            LogDestination::File(path) => {
                let file = OpenOptions::new().create(true).append(true).open(path)?;
                (BoxMakeWriter::new(Mutex::new(file)), false)
            }
        };
        let subscriber = tracing_subscriber::fmt()
            .with_max_level(self.verbosity.level())
            .with_writer(writer)
            .with_ansi(ansi)
            .with_target(false)
            .finish();
        Ok(Dispatch::new(subscriber))
    }

    /// Run `f` with this context as the current thread's default dispatcher.
    /// Mining workers inherit it.
    ///
    /// # Errors
    ///
    /// As [`LogContext::dispatch`].
    pub fn scope<T>(&self, f: impl FnOnce() -> T) -> io::Result<T> {
        let dispatch = self.dispatch()?;
        Ok(tracing::dispatcher::with_default(&dispatch, f))
    }
}
