//! Ordered stage plan of one target run.

use std::fmt;

use fpp_core::errors::{ErrorInfo, FppError};
use serde::{Deserialize, Serialize};

use crate::artifacts::{ArtifactKind, Multiplicity};
use crate::options::RunOptions;

/// One step of the per-target pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", tag = "stage", content = "multiplicity")]
pub enum StageKind {
    /// MCMC re-fit of the trapezoidal signal model.
    RefitSignal,
    /// Diagnostic corner plot of the signal fit.
    SignalCorner,
    /// Addition of the boxy and long comparison models.
    InjectArtificial,
    /// Likelihoods, FPP, plots and the results table.
    ComputeFpp,
    /// Bootstrap resampling of the FPP.
    Bootstrap,
    /// Corner plots of one star-model fit.
    StarModelCorners(Multiplicity),
}

impl StageKind {
    /// Whether the stage is skipped when every output is reusable and no
    /// input was regenerated during the run.
    pub fn is_cached(&self) -> bool {
        matches!(self, StageKind::SignalCorner | StageKind::StarModelCorners(_))
    }
}

impl fmt::Display for StageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StageKind::RefitSignal => f.write_str("refit-signal"),
            StageKind::SignalCorner => f.write_str("signal-corner"),
            StageKind::InjectArtificial => f.write_str("inject-artificial"),
            StageKind::ComputeFpp => f.write_str("compute-fpp"),
            StageKind::Bootstrap => f.write_str("bootstrap"),
            StageKind::StarModelCorners(mult) => write!(f, "star-model-corners[{}]", mult.as_str()),
        }
    }
}

/// Stage together with the artifacts it consumes and produces.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageSpec {
    /// Stage identifier.
    pub kind: StageKind,
    /// Artifacts read by the stage.
    pub inputs: Vec<ArtifactKind>,
    /// Artifacts written by the stage.
    pub outputs: Vec<ArtifactKind>,
}

impl StageSpec {
    /// Declares `kind` with its fixed artifact wiring.
    pub fn new(kind: StageKind) -> Self {
        use ArtifactKind as A;
        let (inputs, outputs) = match kind {
            StageKind::RefitSignal => (vec![], vec![A::SignalFit]),
            StageKind::SignalCorner => (vec![A::SignalFit], vec![A::SignalCorner]),
            StageKind::InjectArtificial => (vec![A::PopulationSet], vec![A::ModelSet]),
            StageKind::ComputeFpp => (
                vec![A::SignalFit, A::PopulationSet, A::ModelSet],
                vec![
                    A::LikelihoodCache,
                    A::SignalPlot,
                    A::FppSummaryPlot,
                    A::Results,
                ],
            ),
            StageKind::Bootstrap => (vec![A::Results], vec![A::BootstrapResults]),
            StageKind::StarModelCorners(mult) => (
                vec![A::StarModelFit(mult)],
                vec![A::StarCornerPhysical(mult), A::StarCornerObserved(mult)],
            ),
        };
        Self {
            kind,
            inputs,
            outputs,
        }
    }
}

/// Validated ordered list of stages.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StagePlan {
    stages: Vec<StageSpec>,
}

impl StagePlan {
    /// Plan implied by the run options.
    ///
    /// The signal refit is listed only under `refit_trsig`. The corner stages
    /// are always listed; the cache decides whether they do any work.
    pub fn for_options(opts: &RunOptions) -> Result<Self, FppError> {
        let mut kinds = Vec::new();
        if opts.recompute.refit_trsig {
            kinds.push(StageKind::RefitSignal);
        }
        kinds.push(StageKind::SignalCorner);
        if opts.include_artificial {
            kinds.push(StageKind::InjectArtificial);
        }
        kinds.push(StageKind::ComputeFpp);
        if opts.bootstrap > 0 {
            kinds.push(StageKind::Bootstrap);
        }
        kinds.extend(Multiplicity::ALL.into_iter().map(StageKind::StarModelCorners));
        Self::from_stages(kinds.into_iter().map(StageSpec::new).collect())
    }

    /// Builds a plan from explicit stages, checking producer ordering.
    pub fn from_stages(stages: Vec<StageSpec>) -> Result<Self, FppError> {
        let plan = Self { stages };
        plan.validate()?;
        Ok(plan)
    }

    /// Checks that each artifact has at most one producer and that every
    /// artifact consumed inside the plan is produced by an earlier stage.
    pub fn validate(&self) -> Result<(), FppError> {
        for (index, stage) in self.stages.iter().enumerate() {
            for output in &stage.outputs {
                if let Some(other) = self.stages[..index]
                    .iter()
                    .find(|earlier| earlier.outputs.contains(output))
                {
                    return Err(plan_error(
                        "stage_duplicate_producer",
                        "artifact is produced by more than one stage",
                    )
                    .with_context("artifact", output.to_string())
                    .with_context("first", other.kind.to_string())
                    .with_context("second", stage.kind.to_string()));
                }
            }
            for input in &stage.inputs {
                if let Some(later) = self.stages[index..]
                    .iter()
                    .find(|candidate| candidate.outputs.contains(input))
                {
                    return Err(plan_error(
                        "stage_order",
                        "stage consumes an artifact produced later in the plan",
                    )
                    .with_context("artifact", input.to_string())
                    .with_context("consumer", stage.kind.to_string())
                    .with_context("producer", later.kind.to_string()));
                }
            }
        }
        Ok(())
    }

    /// Stages in execution order.
    pub fn stages(&self) -> &[StageSpec] {
        &self.stages
    }

    /// Stage identifiers in execution order.
    pub fn kinds(&self) -> Vec<StageKind> {
        self.stages.iter().map(|stage| stage.kind).collect()
    }

    /// Whether `kind` is part of the plan.
    pub fn contains(&self, kind: StageKind) -> bool {
        self.stages.iter().any(|stage| stage.kind == kind)
    }
}

fn plan_error(code: &str, message: &str) -> FppError {
    FppError::Configuration(ErrorInfo::new(code, message))
}
