//! Per-target logging context.
//!
//! A session owns its own `tracing` dispatcher writing to the target's log
//! file. Work runs inside [`LogSession::in_scope`], so nothing attached for
//! one target can leak lines into the log of the next.

use std::fs::{File, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use fpp_core::errors::{ErrorInfo, FppError};
use tracing::Dispatch;
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::{fmt, Registry};

/// How a session binds its log file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct LogOptions {
    /// Record debug events.
    pub debug: bool,
    /// Truncate the file before use (it is created when missing).
    pub fresh: bool,
    /// Mirror events to stderr.
    pub echo_stderr: bool,
}

/// Logging context bound to one target.
pub struct LogSession {
    dispatch: Dispatch,
    path: PathBuf,
    level: LevelFilter,
}

impl std::fmt::Debug for LogSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LogSession")
            .field("path", &self.path)
            .field("level", &self.level)
            .finish_non_exhaustive()
    }
}

impl LogSession {
    /// Opens `path` (appending, or truncating when `opts.fresh`) and builds
    /// the session's dispatcher.
    pub fn open(path: &Path, opts: LogOptions) -> Result<Self, FppError> {
        let file = open_log_file(path, opts.fresh).map_err(|err| {
            FppError::Io(
                ErrorInfo::new("log_open", err.to_string())
                    .with_context("path", path.display().to_string()),
            )
        })?;
        let level = if opts.debug {
            LevelFilter::DEBUG
        } else {
            LevelFilter::INFO
        };
        let file_layer = fmt::layer()
            .with_writer(Mutex::new(file))
            .with_ansi(false)
            .with_target(false);
        let subscriber = Registry::default().with(level).with(file_layer);
        let dispatch = if opts.echo_stderr {
            Dispatch::new(subscriber.with(fmt::layer().with_writer(io::stderr).with_target(false)))
        } else {
            Dispatch::new(subscriber)
        };
        Ok(Self {
            dispatch,
            path: path.to_path_buf(),
            level,
        })
    }

    /// Log file of the session.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Most verbose level recorded.
    pub fn level(&self) -> LevelFilter {
        self.level
    }

    /// Runs `f` with this session as the current thread's dispatcher.
    pub fn in_scope<T>(&self, f: impl FnOnce() -> T) -> T {
        tracing::dispatcher::with_default(&self.dispatch, f)
    }
}

fn open_log_file(path: &Path, fresh: bool) -> io::Result<File> {
    if fresh {
        File::create(path)
    } else {
        OpenOptions::new().create(true).append(true).open(path)
    }
}
