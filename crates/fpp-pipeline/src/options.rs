use serde::{Deserialize, Serialize};

use fpp_config::DEFAULT_SIGNAL_DESCRIPTOR;

/// Default simulated population size.
pub const DEFAULT_POPULATION_SIZE: usize = 20_000;
/// Default prior assigned to each artificial comparison model.
pub const DEFAULT_ARTIFICIAL_PRIOR: f64 = 5e-5;
/// Default stellar-model family.
pub const DEFAULT_ICHRONE: &str = "mist";

/// Options governing a batch run; parsed once and shared read-only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunOptions {
    /// Transit-signal descriptor name inside each target directory.
    pub inifile: String,
    /// Simulated population size.
    pub n: usize,
    /// Recompute flags.
    pub recompute: RecomputeFlags,
    /// Number of bootstrap resamples; zero disables the stage.
    pub bootstrap: usize,
    /// Master seed for bootstrap resampling.
    pub seed: u64,
    /// Add the boxy and long comparison models before computing the FPP.
    pub include_artificial: bool,
    /// Prior given to each artificial model.
    pub artificial_prior: f64,
    /// Stellar-model family identifier.
    pub ichrone: String,
    /// Escalate target logs to debug level.
    pub debug: bool,
    /// Truncate each target log before use.
    pub newlog: bool,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            inifile: DEFAULT_SIGNAL_DESCRIPTOR.to_string(),
            n: DEFAULT_POPULATION_SIZE,
            recompute: RecomputeFlags::default(),
            bootstrap: 0,
            seed: 0,
            include_artificial: false,
            artificial_prior: DEFAULT_ARTIFICIAL_PRIOR,
            ichrone: DEFAULT_ICHRONE.to_string(),
            debug: false,
            newlog: false,
        }
    }
}

/// Flags that force regeneration of cached work.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct RecomputeFlags {
    /// Discard and regenerate all population simulations.
    pub recalc: bool,
    /// Force likelihood recomputation.
    pub recalc_lhood: bool,
    /// Refit the trapezoidal models while keeping the populations.
    pub refit_trap: bool,
    /// Redo the MCMC transit-signal fit.
    pub refit_trsig: bool,
}
