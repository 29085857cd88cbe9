//! Bootstrap uncertainty of the FPP.

use std::fmt::Write as _;
use std::fs;
use std::path::Path;

use fpp_core::errors::{ErrorInfo, FppError};
use fpp_core::rng::SubstreamSeeds;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::backend::Calculation;
use crate::files::write_atomic;
use crate::interrupt::InterruptFlag;
use crate::stat::DistributionSummary;

/// Resampled FPP values of one target with their summary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BootstrapResult {
    /// Candidate name.
    pub name: String,
    /// Master seed the per-iteration seeds were derived from.
    pub seed: u64,
    /// FPP of each resample, in iteration order.
    pub values: Vec<f64>,
    /// Summary statistics of `values`.
    pub summary: DistributionSummary,
}

impl BootstrapResult {
    /// Wraps `values` and computes their summary.
    pub fn new(name: impl Into<String>, seed: u64, values: Vec<f64>) -> Self {
        let summary = DistributionSummary::from_values(&values);
        Self {
            name: name.into(),
            seed,
            values,
            summary,
        }
    }

    /// Text form: `#`-prefixed header lines, then `iteration fpp` rows.
    pub fn render(&self) -> String {
        let s = &self.summary;
        let mut out = String::new();
        let _ = writeln!(out, "# name: {}", self.name);
        let _ = writeln!(out, "# resamples: {}", self.values.len());
        let _ = writeln!(out, "# seed: {}", self.seed);
        let _ = writeln!(out, "# median: {}", s.q50);
        let _ = writeln!(out, "# q16: {}", s.q16);
        let _ = writeln!(out, "# q84: {}", s.q84);
        let _ = writeln!(out, "# mean: {}", s.mean);
        let _ = writeln!(out, "# std: {}", s.std);
        out.push_str("iteration fpp\n");
        for (iteration, value) in self.values.iter().enumerate() {
            let _ = writeln!(out, "{iteration} {value}");
        }
        out
    }

    /// Writes [`BootstrapResult::render`] to `path` atomically.
    pub fn write(&self, path: &Path) -> Result<(), FppError> {
        write_atomic(path, self.render().as_bytes())
    }

    /// Reads a file produced by [`BootstrapResult::write`].
    pub fn load(path: &Path) -> Result<Self, FppError> {
        let text = fs::read_to_string(path).map_err(|err| {
            FppError::Io(
                ErrorInfo::new("bootstrap_read", err.to_string())
                    .with_context("path", path.display().to_string()),
            )
        })?;
        Self::parse(&text).map_err(|err| err.with_context("path", path.display().to_string()))
    }

    fn parse(text: &str) -> Result<Self, FppError> {
        let mut name = String::new();
        let mut seed = 0u64;
        let mut values = Vec::new();
        for (index, line) in text.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() || line == "iteration fpp" {
                continue;
            }
            if let Some(header) = line.strip_prefix('#') {
                if let Some((key, value)) = header.split_once(':') {
                    match key.trim() {
                        "name" => name = value.trim().to_string(),
                        "seed" => seed = value.trim().parse().map_err(|_| malformed(index, line))?,
                        _ => {}
                    }
                }
                continue;
            }
            let value = line
                .split_whitespace()
                .nth(1)
                .and_then(|raw| raw.parse::<f64>().ok())
                .ok_or_else(|| malformed(index, line))?;
            values.push(value);
        }
        Ok(Self::new(name, seed, values))
    }
}

fn malformed(index: usize, line: &str) -> FppError {
    FppError::Serde(
        ErrorInfo::new("bootstrap_malformed", "unexpected line in bootstrap results")
            .with_context("line", (index + 1).to_string())
            .with_context("text", line.to_string()),
    )
}

/// Repeats the resample, refit and likelihood cycle sequentially.
#[derive(Debug, Clone, Copy)]
pub struct BootstrapEstimator<'a> {
    resamples: usize,
    master_seed: u64,
    interrupt: &'a InterruptFlag,
}

impl<'a> BootstrapEstimator<'a> {
    /// Estimator drawing `resamples` seeds from `master_seed`.
    pub fn new(resamples: usize, master_seed: u64, interrupt: &'a InterruptFlag) -> Self {
        Self {
            resamples,
            master_seed,
            interrupt,
        }
    }

    /// Runs every iteration against `calc`. The interrupt flag is polled
    /// before each one.
    pub fn run<C: Calculation + ?Sized>(&self, calc: &mut C) -> Result<BootstrapResult, FppError> {
        let mut values = Vec::with_capacity(self.resamples);
        for (iteration, seed) in SubstreamSeeds::new(self.master_seed, self.resamples as u64).enumerate() {
            self.interrupt
                .check("bootstrap")
                .map_err(|err| err.with_context("iteration", iteration.to_string()))?;
            let fpp = resample_once(calc, seed)
                .map_err(|err| err.with_context("iteration", iteration.to_string()))?;
            debug!(iteration, seed, fpp, "bootstrap resample");
            values.push(fpp);
        }
        let result = BootstrapResult::new(calc.name(), self.master_seed, values);
        info!(
            resamples = result.values.len(),
            median = result.summary.q50,
            "bootstrap complete"
        );
        Ok(result)
    }
}

fn resample_once<C: Calculation + ?Sized>(calc: &mut C, seed: u64) -> Result<f64, FppError> {
    calc.resample_signal(seed)?;
    calc.refit_signal()?;
    let table = calc.compute_likelihoods(true)?;
    table.fpp(&[])
}
