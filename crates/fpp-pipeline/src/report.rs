use std::fmt::Write as _;
use std::fs;
use std::path::{Path, PathBuf};

use chrono::Utc;
use serde::{Deserialize, Serialize};

use fpp_core::errors::{ErrorInfo, FailureKind, FppError};
use fpp_core::likelihood::LikelihoodTable;
use fpp_core::provenance::{RunProvenance, SchemaVersion};

use crate::files::write_atomic;
use crate::hash::stable_hash_string;
use crate::options::RunOptions;
use crate::serde::{from_json_slice, to_canonical_json_bytes};
use crate::stages::StageKind;
use crate::stat::DistributionSummary;

/// Schema of serialized batch reports.
pub const REPORT_SCHEMA: SchemaVersion = SchemaVersion::new(1, 0, 0);

/// Result of a completed target.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TargetSummary {
    /// Candidate name.
    pub name: String,
    /// False positive probability.
    pub fpp: f64,
    /// Planet validation factor, absent when the likelihoods are degenerate.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fpv: Option<f64>,
    /// Odds label such as `1 in 340`.
    pub odds: String,
    /// Stages that did work, in order.
    pub stages_run: Vec<StageKind>,
    /// Cached stages whose outputs were reused.
    pub stages_skipped: Vec<StageKind>,
    /// Bootstrap distribution, when resampling was requested.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bootstrap: Option<DistributionSummary>,
}

/// Tagged per-target result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", tag = "outcome")]
pub enum TargetOutcome {
    /// The pipeline ran to the end.
    Completed(TargetSummary),
    /// The pipeline stopped; the batch moved on.
    Failed {
        /// Classification of the failure.
        kind: FailureKind,
        /// Full error payload.
        error: FppError,
    },
}

impl TargetOutcome {
    /// Outcome of a failed target.
    pub fn failed(error: FppError) -> Self {
        TargetOutcome::Failed {
            kind: error.kind(),
            error,
        }
    }

    /// Whether the target completed.
    pub fn is_completed(&self) -> bool {
        matches!(self, TargetOutcome::Completed(_))
    }
}

/// Outcome of one target directory.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TargetReport {
    /// Target directory as given on the command line.
    pub folder: PathBuf,
    /// What happened.
    pub outcome: TargetOutcome,
}

/// Outcomes of every processed target, in processing order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchReport {
    /// Report schema.
    pub schema: SchemaVersion,
    /// Per-target outcomes.
    pub targets: Vec<TargetReport>,
    /// Provenance of the run.
    pub provenance: RunProvenance,
}

impl BatchReport {
    /// Assembles the report of a finished batch.
    pub fn new(opts: &RunOptions, targets: Vec<TargetReport>) -> Self {
        Self {
            schema: REPORT_SCHEMA,
            targets,
            provenance: provenance(opts),
        }
    }

    /// Number of completed targets.
    pub fn completed(&self) -> usize {
        self.targets
            .iter()
            .filter(|target| target.outcome.is_completed())
            .count()
    }

    /// Number of failed targets.
    pub fn failed(&self) -> usize {
        self.targets.len() - self.completed()
    }

    /// Writes the report as canonical JSON.
    pub fn write(&self, path: &Path) -> Result<(), FppError> {
        let bytes = to_canonical_json_bytes(self)?;
        write_atomic(path, &bytes)
    }

    /// Reads a report written by [`BatchReport::write`], rejecting reports
    /// of an incompatible schema.
    pub fn load(path: &Path) -> Result<Self, FppError> {
        let bytes = fs::read(path).map_err(|err| {
            FppError::Io(
                ErrorInfo::new("report_read", err.to_string())
                    .with_context("path", path.display().to_string()),
            )
        })?;
        let report: Self = from_json_slice(&bytes)?;
        if !REPORT_SCHEMA.reads(report.schema) {
            return Err(FppError::Serde(
                ErrorInfo::new("report_schema", "report was written with an incompatible schema")
                    .with_context("path", path.display().to_string())
                    .with_context("found", report.schema.to_string())
                    .with_context("supported", REPORT_SCHEMA.to_string()),
            ));
        }
        Ok(report)
    }
}

fn provenance(opts: &RunOptions) -> RunProvenance {
    RunProvenance::new(
        stable_hash_string(opts).unwrap_or_default(),
        opts.seed,
        Utc::now().to_rfc3339(),
    )
    .with_tool("fpp-pipeline", env!("CARGO_PKG_VERSION"))
}

/// Text of `results.txt`: header lines, then one row per model.
pub fn render_results(name: &str, table: &LikelihoodTable, fpp: f64, fpv: Option<f64>) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "# name: {name}");
    let _ = writeln!(out, "# FPP: {fpp}");
    let _ = writeln!(out, "# odds: {}", fpp_core::likelihood::odds_label(fpp));
    match fpv {
        Some(fpv) => {
            let _ = writeln!(out, "# fpV: {fpv}");
        }
        None => out.push_str("# fpV: nan\n"),
    }
    let _ = writeln!(out, "# fp_specific: {}", table.fp_specific);
    out.push_str("model prior lhood posterior\n");
    for (model, (_, share)) in table.models.iter().zip(table.posterior_shares()) {
        let _ = writeln!(
            out,
            "{} {:e} {:e} {:.6}",
            model.short_name, model.prior, model.lhood, share
        );
    }
    out
}
