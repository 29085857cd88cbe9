//! Combination of per-model priors and likelihoods into the final probability.

use serde::{Deserialize, Serialize};

use crate::errors::{ErrorInfo, FppError};

/// Short name under which the planet hypothesis is reported by the backend.
pub const PLANET_MODEL: &str = "pl";

/// Default target false positive probability used by [`LikelihoodTable::fpv`].
pub const DEFAULT_FPPV: f64 = 0.005;

/// Odds above which the summary label is clamped.
const ODDS_CEILING: f64 = 1e6;

/// Prior and likelihood of one astrophysical hypothesis.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelLikelihood {
    /// Short identifier (`pl`, `eb`, `heb`, `beb`, `boxy`, `long`, ...).
    pub short_name: String,
    /// Descriptive model name used in plots and logs.
    pub name: String,
    /// Prior probability of the hypothesis.
    pub prior: f64,
    /// Likelihood of the observed signal under the hypothesis.
    pub lhood: f64,
}

impl ModelLikelihood {
    /// Unnormalized posterior weight `prior * lhood`.
    pub fn weight(&self) -> f64 {
        self.prior * self.lhood
    }
}

/// Ordered per-model likelihood rows returned by a likelihood computation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LikelihoodTable {
    /// Rows in the order the backend reports its models.
    pub models: Vec<ModelLikelihood>,
    /// Planet occurrence factor specific to the candidate radius bin.
    pub fp_specific: f64,
}

impl LikelihoodTable {
    /// Builds a table, rejecting non-finite or negative priors and likelihoods.
    pub fn new(models: Vec<ModelLikelihood>, fp_specific: f64) -> Result<Self, FppError> {
        for model in &models {
            if !model.prior.is_finite()
                || !model.lhood.is_finite()
                || model.prior < 0.0
                || model.lhood < 0.0
            {
                return Err(FppError::Backend(
                    ErrorInfo::new("invalid_likelihood", "prior and likelihood must be finite and non-negative")
                        .with_context("model", model.short_name.clone())
                        .with_context("prior", model.prior.to_string())
                        .with_context("lhood", model.lhood.to_string()),
                ));
            }
        }
        Ok(Self {
            models,
            fp_specific,
        })
    }

    /// Looks up a row by short name.
    pub fn get(&self, short_name: &str) -> Option<&ModelLikelihood> {
        self.models
            .iter()
            .find(|model| model.short_name == short_name)
    }

    /// Returns the planet row or an error naming the missing hypothesis.
    pub fn planet(&self) -> Result<&ModelLikelihood, FppError> {
        self.get(PLANET_MODEL).ok_or_else(|| {
            FppError::Backend(
                ErrorInfo::new("planet_model_missing", "likelihood table has no planet model")
                    .with_context("models", self.short_names().join(",")),
            )
        })
    }

    /// Short names of every row, in order.
    pub fn short_names(&self) -> Vec<String> {
        self.models
            .iter()
            .map(|model| model.short_name.clone())
            .collect()
    }

    /// Summed weight of the false positive hypotheses not listed in `skip`.
    pub fn false_positive_weight(&self, skip: &[&str]) -> f64 {
        self.models
            .iter()
            .filter(|model| model.short_name != PLANET_MODEL)
            .filter(|model| !skip.contains(&model.short_name.as_str()))
            .map(ModelLikelihood::weight)
            .sum()
    }

    /// False positive probability `1 - Lpl / (Lpl + Lfp)`.
    pub fn fpp(&self, skip: &[&str]) -> Result<f64, FppError> {
        let planet = self.planet()?.weight();
        let total = planet + self.false_positive_weight(skip);
        if total <= 0.0 {
            return Err(FppError::Backend(
                ErrorInfo::new("degenerate_likelihoods", "all hypotheses have zero weight")
                    .with_context("models", self.short_names().join(",")),
            ));
        }
        Ok(1.0 - planet / total)
    }

    /// Ratio of planet weight to false positive weight, scaled by `fp_specific`.
    pub fn pval(&self, skip: &[&str]) -> Result<f64, FppError> {
        let planet = self.planet()?.weight();
        let false_positive = self.false_positive_weight(skip);
        if false_positive <= 0.0 || self.fp_specific <= 0.0 {
            return Err(FppError::Backend(
                ErrorInfo::new("degenerate_pval", "false positive weight or fp_specific is zero")
                    .with_context("fp_specific", self.fp_specific.to_string()),
            ));
        }
        Ok(planet / false_positive / self.fp_specific)
    }

    /// Planet occurrence rate needed to validate at the target FPP `fppv`.
    pub fn fpv(&self, fppv: f64, skip: &[&str]) -> Result<f64, FppError> {
        let pval = self.pval(skip)?;
        Ok((1.0 - fppv) / (pval * fppv))
    }

    /// Posterior share of every row, normalized over all rows.
    pub fn posterior_shares(&self) -> Vec<(String, f64)> {
        let total: f64 = self.models.iter().map(ModelLikelihood::weight).sum();
        self.models
            .iter()
            .map(|model| {
                let share = if total > 0.0 {
                    model.weight() / total
                } else {
                    0.0
                };
                (model.short_name.clone(), share)
            })
            .collect()
    }
}

/// Human readable odds label such as `1 in 340` for a probability.
pub fn odds_label(fpp: f64) -> String {
    if fpp <= 0.0 {
        return format!("< 1 in {:.0e}", ODDS_CEILING);
    }
    let odds = 1.0 / fpp;
    if odds > ODDS_CEILING {
        format!("< 1 in {:.0e}", ODDS_CEILING)
    } else {
        format!("1 in {}", odds.floor() as u64)
    }
}
