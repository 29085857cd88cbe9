use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// Stellar configuration hypothesis of a star-model fit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Multiplicity {
    /// One star.
    Single,
    /// Bound pair.
    Binary,
    /// Hierarchical triple.
    Triple,
}

impl Multiplicity {
    /// All hypotheses, in processing order.
    pub const ALL: [Multiplicity; 3] = [
        Multiplicity::Single,
        Multiplicity::Binary,
        Multiplicity::Triple,
    ];

    /// Label used in artifact file names.
    pub fn as_str(&self) -> &'static str {
        match self {
            Multiplicity::Single => "single",
            Multiplicity::Binary => "binary",
            Multiplicity::Triple => "triple",
        }
    }
}

/// Named artifact of one target directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", tag = "kind", content = "multiplicity")]
pub enum ArtifactKind {
    /// Per-target run log.
    RunLog,
    /// Persisted transit-signal fit.
    SignalFit,
    /// Corner plot of the trapezoid fit.
    SignalCorner,
    /// Simulated population set.
    PopulationSet,
    /// Background star-field simulation.
    StarField,
    /// Backend likelihood cache.
    LikelihoodCache,
    /// The set of models held in memory by the calculation.
    ModelSet,
    /// Transit-signal plot.
    SignalPlot,
    /// FPP summary plot.
    FppSummaryPlot,
    /// Per-model prior, likelihood and FPP table.
    Results,
    /// Bootstrap FPP distribution.
    BootstrapResults,
    /// Persisted stellar-isochrone fit.
    StarModelFit(Multiplicity),
    /// Physical-parameter corner plot of a star-model fit.
    StarCornerPhysical(Multiplicity),
    /// Observed-parameter corner plot of a star-model fit.
    StarCornerObserved(Multiplicity),
    /// Cache manifest maintained by the orchestrator.
    CacheManifest,
}

impl ArtifactKind {
    /// Whether the artifact lives on disk.
    pub fn is_persistent(&self) -> bool {
        !matches!(self, ArtifactKind::ModelSet)
    }

    /// Directory-relative file name, `None` for in-memory artifacts.
    pub fn file_name(&self, ichrone: &str) -> Option<String> {
        let name = match self {
            ArtifactKind::RunLog => "run.log".to_string(),
            ArtifactKind::SignalFit => "trsig.pkl".to_string(),
            ArtifactKind::SignalCorner => "trap_corner.png".to_string(),
            ArtifactKind::PopulationSet => "popset.h5".to_string(),
            ArtifactKind::StarField => "starfield.h5".to_string(),
            ArtifactKind::LikelihoodCache => "lhoodcache.dat".to_string(),
            ArtifactKind::ModelSet => return None,
            ArtifactKind::SignalPlot => "signal.png".to_string(),
            ArtifactKind::FppSummaryPlot => "FPPsummary.png".to_string(),
            ArtifactKind::Results => "results.txt".to_string(),
            ArtifactKind::BootstrapResults => "results_bootstrap.txt".to_string(),
            ArtifactKind::StarModelFit(mult) => {
                format!("{ichrone}_starmodel_{}.h5", mult.as_str())
            }
            ArtifactKind::StarCornerPhysical(mult) => {
                format!("{ichrone}_corner_physical_{}.png", mult.as_str())
            }
            ArtifactKind::StarCornerObserved(mult) => {
                format!("{ichrone}_corner_observed_{}.png", mult.as_str())
            }
            ArtifactKind::CacheManifest => ".fpp-cache.json".to_string(),
        };
        Some(name)
    }
}

impl fmt::Display for ArtifactKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArtifactKind::StarModelFit(mult) => write!(f, "star-model-fit[{}]", mult.as_str()),
            ArtifactKind::StarCornerPhysical(mult) => {
                write!(f, "star-corner-physical[{}]", mult.as_str())
            }
            ArtifactKind::StarCornerObserved(mult) => {
                write!(f, "star-corner-observed[{}]", mult.as_str())
            }
            other => write!(f, "{other:?}"),
        }
    }
}

/// Resolves artifact kinds to paths inside one target directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactLayout {
    folder: PathBuf,
    ichrone: String,
}

impl ArtifactLayout {
    /// Layout for `folder` using the `ichrone` stellar-model family.
    pub fn new(folder: impl Into<PathBuf>, ichrone: impl Into<String>) -> Self {
        Self {
            folder: folder.into(),
            ichrone: ichrone.into(),
        }
    }

    /// Target directory.
    pub fn folder(&self) -> &Path {
        &self.folder
    }

    /// Stellar-model family.
    pub fn ichrone(&self) -> &str {
        &self.ichrone
    }

    /// Path of a persistent artifact, `None` for in-memory ones.
    pub fn path(&self, kind: ArtifactKind) -> Option<PathBuf> {
        kind.file_name(&self.ichrone)
            .map(|name| self.folder.join(name))
    }

    /// Path of a persistent artifact.
    ///
    /// Callers only pass kinds that are known to be persistent.
    pub fn file(&self, kind: ArtifactKind) -> PathBuf {
        match kind.file_name(&self.ichrone) {
            Some(name) => self.folder.join(name),
            None => self.folder.clone(),
        }
    }
}
