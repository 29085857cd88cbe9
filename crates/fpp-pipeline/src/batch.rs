//! Multi-target driver: the only recovery boundary.

use std::io::Write;
use std::path::{Path, PathBuf};

use fpp_core::errors::FppError;
use tracing::{debug, error, info, warn};

use crate::artifacts::ArtifactKind;
use crate::backend::ModelingBackend;
use crate::interrupt::InterruptFlag;
use crate::logging::{LogOptions, LogSession};
use crate::options::RunOptions;
use crate::pipeline::run_target;
use crate::report::{BatchReport, TargetOutcome, TargetReport};

/// Where the per-target events go besides the target's log file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct BatchSettings {
    /// Mirror target events to stderr.
    pub echo_stderr: bool,
}

/// Processes `targets` in order, one fully before the next.
///
/// A failing target is logged and recorded, then the batch moves on. An
/// interrupt stops the batch and is returned as the error. One line
/// `<name> FPP: <value>` is written to `out` for each completed target.
pub fn run_batch<B: ModelingBackend, W: Write>(
    backend: &B,
    targets: &[PathBuf],
    opts: &RunOptions,
    settings: BatchSettings,
    interrupt: &InterruptFlag,
    out: &mut W,
) -> Result<BatchReport, FppError> {
    let mut reports = Vec::with_capacity(targets.len());
    for folder in targets {
        interrupt.check("batch")?;
        let outcome = process_target(backend, folder, opts, settings, interrupt)?;
        if let TargetOutcome::Completed(summary) = &outcome {
            if let Err(err) = writeln!(out, "{} FPP: {}", summary.name, summary.fpp) {
                warn!(error = %err, "could not write target summary");
            }
        }
        reports.push(TargetReport {
            folder: folder.clone(),
            outcome,
        });
    }
    interrupt.check("batch")?;
    let report = BatchReport::new(opts, reports);
    info!(
        targets = report.targets.len(),
        completed = report.completed(),
        failed = report.failed(),
        "batch finished"
    );
    Ok(report)
}

fn process_target<B: ModelingBackend>(
    backend: &B,
    folder: &Path,
    opts: &RunOptions,
    settings: BatchSettings,
    interrupt: &InterruptFlag,
) -> Result<TargetOutcome, FppError> {
    let log_path = folder.join(ArtifactKind::RunLog.file_name(&opts.ichrone).unwrap_or_default());
    let log_options = LogOptions {
        debug: opts.debug,
        fresh: opts.newlog,
        echo_stderr: settings.echo_stderr,
    };
    let session = match LogSession::open(&log_path, log_options) {
        Ok(session) => session,
        Err(err) => {
            error!(folder = %folder.display(), error = %err, "cannot open target log");
            return Ok(TargetOutcome::failed(err));
        }
    };

    let result = session.in_scope(|| {
        debug!(path = %session.path().display(), level = %session.level(), "log session bound");
        let result = run_target(backend, folder, opts, interrupt);
        match &result {
            Ok(summary) => info!(name = %summary.name, fpp = summary.fpp, "target complete"),
            Err(err) if err.is_interrupt() => warn!(error = %err, "target interrupted"),
            Err(err) => {
                let info = err.info();
                error!(
                    kind = %err.kind(),
                    code = %info.code,
                    context = ?info.context,
                    hint = info.hint.as_deref().unwrap_or(""),
                    "target failed: {}",
                    info.message
                );
            }
        }
        result
    });

    match result {
        Ok(summary) => Ok(TargetOutcome::Completed(summary)),
        Err(err) if err.is_interrupt() => Err(err),
        Err(err) => Ok(TargetOutcome::failed(err)),
    }
}
