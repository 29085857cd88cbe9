//! Narrow interface to the external modeling and plotting libraries.

use std::path::Path;

use fpp_config::TargetConfig;
use fpp_core::errors::FppError;
use fpp_core::likelihood::LikelihoodTable;
use serde::{Deserialize, Serialize};

/// Everything the backend needs to construct a calculation for one target.
#[derive(Debug, Clone, Copy)]
pub struct LoadRequest<'a> {
    /// Parsed descriptors of the target.
    pub config: &'a TargetConfig,
    /// Transit-signal descriptor name.
    pub ini_file: &'a str,
    /// Simulated population size.
    pub n: usize,
    /// Regenerate population simulations instead of reading their caches.
    pub recalc: bool,
    /// Refit trapezoid models while keeping the populations.
    pub refit_trap: bool,
    /// Stellar-model family.
    pub ichrone: &'a str,
}

/// Synthetic comparison population added on request.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", tag = "model")]
pub enum ArtificialModel {
    /// Box-shaped signals steeper than any simulated eclipsing binary.
    Boxy {
        /// Prior probability.
        prior: f64,
        /// Largest trapezoid slope of the reference population.
        slope_max: f64,
    },
    /// Signals longer than nearly all simulated eclipsing binaries.
    Long {
        /// Prior probability.
        prior: f64,
        /// 99th percentile transit duration of the reference population.
        duration_p99: f64,
    },
}

impl ArtificialModel {
    /// Short model name.
    pub fn short_name(&self) -> &'static str {
        match self {
            ArtificialModel::Boxy { .. } => "boxy",
            ArtificialModel::Long { .. } => "long",
        }
    }

    /// Prior probability.
    pub fn prior(&self) -> f64 {
        match self {
            ArtificialModel::Boxy { prior, .. } | ArtificialModel::Long { prior, .. } => *prior,
        }
    }
}

/// One target's loaded FPP computation: the signal fit plus its populations.
///
/// Every call blocks until the library returns; artifacts written as side
/// effects land at the paths passed in.
pub trait Calculation {
    /// Candidate name.
    fn name(&self) -> &str;

    /// Re-runs the MCMC fit of the trapezoidal signal model.
    fn refit_signal(&mut self) -> Result<(), FppError>;

    /// Persists the current signal fit.
    fn save_signal(&self, path: &Path) -> Result<(), FppError>;

    /// Draws the trapezoid-fit corner plot.
    fn plot_signal_corner(&self, path: &Path) -> Result<(), FppError>;

    /// Values of `column` across the simulated population of `model`.
    fn population_column(&self, model: &str, column: &str) -> Result<Vec<f64>, FppError>;

    /// Adds a comparison model to the set the FPP is computed over.
    fn add_artificial_model(&mut self, model: &ArtificialModel) -> Result<(), FppError>;

    /// Computes per-model priors and likelihoods, bypassing the likelihood
    /// cache when `recalc` is set.
    fn compute_likelihoods(&mut self, recalc: bool) -> Result<LikelihoodTable, FppError>;

    /// Draws the signal, per-model likelihood and FPP summary plots.
    fn plot_fpp(&self, folder: &Path, table: &LikelihoodTable) -> Result<(), FppError>;

    /// Replaces the fitted signal by a resampled realisation.
    fn resample_signal(&mut self, seed: u64) -> Result<(), FppError>;
}

/// A persisted stellar-isochrone fit.
pub trait StarModelFit {
    /// Draws the physical- and observed-parameter corner plots.
    fn corner_plots(&self, physical: &Path, observed: &Path) -> Result<(), FppError>;
}

/// Entry point of the modeling library.
pub trait ModelingBackend {
    /// Calculation type produced by [`ModelingBackend::load_calculation`].
    type Calculation: Calculation;
    /// Star-model type produced by [`ModelingBackend::load_star_model`].
    type StarModel: StarModelFit;

    /// Builds the calculation of one target, reusing cached populations
    /// unless `request.recalc` is set.
    fn load_calculation(&self, request: &LoadRequest<'_>) -> Result<Self::Calculation, FppError>;

    /// Loads a persisted star-model fit.
    fn load_star_model(&self, path: &Path) -> Result<Self::StarModel, FppError>;
}
