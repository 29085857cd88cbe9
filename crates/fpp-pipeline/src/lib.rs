#![doc = "Per-target stage pipeline, artifact cache and batch driver for FPP runs."]
#![deny(missing_docs)]

/// Artifact names and per-directory layout.
pub mod artifacts;
/// Interface to the modeling and plotting backend.
pub mod backend;
/// Multi-target batch driver.
pub mod batch;
/// Bootstrap resampling of the FPP.
pub mod bootstrap;
/// Artifact cache gate and manifest.
pub mod cache;
/// Atomic file writes.
pub mod files;
/// Canonical hashing helpers.
pub mod hash;
/// Cancellation token.
pub mod interrupt;
/// Per-target log sessions.
pub mod logging;
/// Run options.
pub mod options;
/// Stage execution for one target.
pub mod pipeline;
/// Report assembly helpers.
pub mod report;
/// Canonical JSON serde helpers.
pub mod serde;
/// Stage plan.
pub mod stages;
/// Summary statistics.
pub mod stat;

pub use artifacts::{ArtifactKind, ArtifactLayout, Multiplicity};
pub use backend::{ArtificialModel, Calculation, LoadRequest, ModelingBackend, StarModelFit};
pub use batch::{run_batch, BatchSettings};
pub use bootstrap::{BootstrapEstimator, BootstrapResult};
pub use cache::{
    forced_by, ArtifactCache, ArtifactState, CacheManifest, InputFingerprints, StaleReason,
};
pub use interrupt::InterruptFlag;
pub use logging::{LogOptions, LogSession};
pub use options::{
    RecomputeFlags, RunOptions, DEFAULT_ARTIFICIAL_PRIOR, DEFAULT_ICHRONE, DEFAULT_POPULATION_SIZE,
};
pub use pipeline::{run_target, REFERENCE_POPULATION};
pub use report::{render_results, BatchReport, TargetOutcome, TargetReport, TargetSummary};
pub use stages::{StageKind, StagePlan, StageSpec};
pub use stat::DistributionSummary;
