//! Per-target stage execution.

use std::path::Path;

use fpp_config::{load_target_config, TargetConfig};
use fpp_core::errors::{ErrorInfo, FppError};
use fpp_core::likelihood::{odds_label, DEFAULT_FPPV};
use tracing::{debug, info};

use crate::artifacts::{ArtifactKind, ArtifactLayout, Multiplicity};
use crate::backend::{ArtificialModel, Calculation, LoadRequest, ModelingBackend, StarModelFit};
use crate::bootstrap::{BootstrapEstimator, BootstrapResult};
use crate::cache::{ArtifactCache, ArtifactState};
use crate::files::write_atomic;
use crate::hash::target_fingerprints;
use crate::interrupt::InterruptFlag;
use crate::options::RunOptions;
use crate::report::{render_results, TargetSummary};
use crate::stages::{StageKind, StagePlan, StageSpec};
use crate::stat::{max_of, percentile_of};

/// Population the artificial models are calibrated against.
pub const REFERENCE_POPULATION: &str = "eb";

const POPULATION_OUTPUTS: [ArtifactKind; 2] = [ArtifactKind::PopulationSet, ArtifactKind::StarField];

struct FppEstimate {
    value: f64,
    fpv: Option<f64>,
}

/// Runs the whole stage plan for the target in `folder`.
///
/// Must be called inside the target's log session; every event lands in
/// the current dispatcher.
pub fn run_target<B: ModelingBackend>(
    backend: &B,
    folder: &Path,
    opts: &RunOptions,
    interrupt: &InterruptFlag,
) -> Result<TargetSummary, FppError> {
    interrupt.check("load")?;
    let config = load_target_config(folder, &opts.inifile)?;
    let plan = StagePlan::for_options(opts)?;
    let layout = ArtifactLayout::new(folder, opts.ichrone.clone());
    let fingerprints = target_fingerprints(&config, opts, &layout)?;
    let mut cache = ArtifactCache::open(layout, opts.recompute, fingerprints);
    info!(
        name = %config.signal.name,
        folder = %folder.display(),
        stages = plan.stages().len(),
        "processing target"
    );

    let calc = load_calculation(backend, &config, opts, &mut cache)?;
    let mut run = TargetRun {
        backend,
        opts,
        interrupt,
        cache,
        calc,
        estimate: None,
        bootstrap: None,
        stages_run: Vec::new(),
        stages_skipped: Vec::new(),
    };
    for stage in plan.stages() {
        interrupt.check(&stage.kind.to_string())?;
        run.execute(stage)?;
    }
    // A Ctrl-C during the last stage must still cancel the target.
    interrupt.check("finish")?;
    run.finish()
}

fn load_calculation<B: ModelingBackend>(
    backend: &B,
    config: &TargetConfig,
    opts: &RunOptions,
    cache: &mut ArtifactCache,
) -> Result<B::Calculation, FppError> {
    let stale = POPULATION_OUTPUTS
        .iter()
        .any(|kind| matches!(cache.state(*kind), ArtifactState::Stale(_)));
    let request = LoadRequest {
        config,
        ini_file: &opts.inifile,
        n: opts.n,
        recalc: opts.recompute.recalc || stale,
        refit_trap: opts.recompute.refit_trap,
        ichrone: &opts.ichrone,
    };
    if !stale && !cache.needs_run(&[ArtifactKind::PopulationSet]) {
        return backend.load_calculation(&request);
    }
    if stale {
        info!(n = opts.n, "population simulations will be regenerated");
    }
    cache.begin(&POPULATION_OUTPUTS)?;
    let calc = backend.load_calculation(&request)?;
    cache.complete(&POPULATION_OUTPUTS)?;
    Ok(calc)
}

struct TargetRun<'a, B: ModelingBackend> {
    backend: &'a B,
    opts: &'a RunOptions,
    interrupt: &'a InterruptFlag,
    cache: ArtifactCache,
    calc: B::Calculation,
    estimate: Option<FppEstimate>,
    bootstrap: Option<BootstrapResult>,
    stages_run: Vec<StageKind>,
    stages_skipped: Vec<StageKind>,
}

impl<'a, B: ModelingBackend> TargetRun<'a, B> {
    fn execute(&mut self, stage: &StageSpec) -> Result<(), FppError> {
        if stage.kind.is_cached() && !self.must_run(stage) {
            debug!(stage = %stage.kind, "outputs reusable, skipping");
            self.stages_skipped.push(stage.kind);
            return Ok(());
        }
        info!(stage = %stage.kind, "running stage");
        match stage.kind {
            StageKind::RefitSignal => self.refit_signal(stage)?,
            StageKind::SignalCorner => self.signal_corner(stage)?,
            StageKind::InjectArtificial => self.inject_artificial()?,
            StageKind::ComputeFpp => self.compute_fpp(stage)?,
            StageKind::Bootstrap => self.bootstrap(stage)?,
            StageKind::StarModelCorners(mult) => self.star_model_corners(stage, mult)?,
        }
        self.stages_run.push(stage.kind);
        Ok(())
    }

    fn must_run(&self, stage: &StageSpec) -> bool {
        self.inputs_refreshed(stage) || self.cache.needs_run(&stage.outputs)
    }

    fn inputs_refreshed(&self, stage: &StageSpec) -> bool {
        stage
            .inputs
            .iter()
            .any(|kind| self.cache.was_refreshed(*kind))
    }

    fn layout(&self) -> &ArtifactLayout {
        self.cache.layout()
    }

    fn refit_signal(&mut self, stage: &StageSpec) -> Result<(), FppError> {
        let path = self.layout().file(ArtifactKind::SignalFit);
        self.cache.begin(&stage.outputs)?;
        self.calc.refit_signal()?;
        self.calc.save_signal(&path)?;
        self.cache.complete(&stage.outputs)?;
        info!(path = %path.display(), "saved refit transit signal");
        Ok(())
    }

    fn signal_corner(&mut self, stage: &StageSpec) -> Result<(), FppError> {
        let path = self.layout().file(ArtifactKind::SignalCorner);
        self.cache.begin(&stage.outputs)?;
        self.calc.plot_signal_corner(&path)?;
        self.cache.complete(&stage.outputs)?;
        info!(path = %path.display(), "wrote trapezoid corner plot");
        Ok(())
    }

    fn inject_artificial(&mut self) -> Result<(), FppError> {
        let prior = self.opts.artificial_prior;
        let slopes = self.calc.population_column(REFERENCE_POPULATION, "slope")?;
        let slope_max = max_of(&slopes).ok_or_else(|| empty_column("slope"))?;
        let durations = self
            .calc
            .population_column(REFERENCE_POPULATION, "duration")?;
        let duration_p99 = percentile_of(&durations, 0.99);
        if !duration_p99.is_finite() {
            return Err(empty_column("duration"));
        }
        for model in [
            ArtificialModel::Boxy { prior, slope_max },
            ArtificialModel::Long {
                prior,
                duration_p99,
            },
        ] {
            self.calc.add_artificial_model(&model)?;
        }
        info!(prior, slope_max, duration_p99, "added boxy and long models");
        Ok(())
    }

    fn compute_fpp(&mut self, stage: &StageSpec) -> Result<(), FppError> {
        // A refit signal alone keeps the likelihood cache.
        let recalc = matches!(
            self.cache.state(ArtifactKind::LikelihoodCache),
            ArtifactState::Stale(_)
        ) || self.cache.was_refreshed(ArtifactKind::PopulationSet);
        self.cache.begin(&stage.outputs)?;
        let table = self.calc.compute_likelihoods(recalc)?;
        for model in &table.models {
            info!(
                "{}: {:.3e} x {:.3e} = {:.3e}",
                model.short_name,
                model.prior,
                model.lhood,
                model.weight()
            );
        }
        let value = table.fpp(&[])?;
        let fpv = match table.fpv(DEFAULT_FPPV, &[]) {
            Ok(fpv) => Some(fpv),
            Err(err) => {
                debug!(error = %err, "fpV undefined for this table");
                None
            }
        };
        let folder = self.layout().folder().to_path_buf();
        self.calc.plot_fpp(&folder, &table)?;
        let results = self.layout().file(ArtifactKind::Results);
        write_atomic(
            &results,
            render_results(self.calc.name(), &table, value, fpv).as_bytes(),
        )?;
        self.cache.complete(&stage.outputs)?;
        info!(fpp = value, odds = %odds_label(value), "computed FPP");
        self.estimate = Some(FppEstimate { value, fpv });
        Ok(())
    }

    fn bootstrap(&mut self, stage: &StageSpec) -> Result<(), FppError> {
        let estimator = BootstrapEstimator::new(self.opts.bootstrap, self.opts.seed, self.interrupt);
        let result = estimator.run(&mut self.calc)?;
        let path = self.layout().file(ArtifactKind::BootstrapResults);
        result.write(&path)?;
        self.cache.complete(&stage.outputs)?;
        info!(
            resamples = result.values.len(),
            path = %path.display(),
            "wrote bootstrap results"
        );
        self.bootstrap = Some(result);
        Ok(())
    }

    fn star_model_corners(&mut self, stage: &StageSpec, mult: Multiplicity) -> Result<(), FppError> {
        let fit = self.layout().file(ArtifactKind::StarModelFit(mult));
        if !fit.is_file() {
            return Err(FppError::MissingArtifact(
                ErrorInfo::new("starmodel_missing", "star-model fit not found")
                    .with_context("path", fit.display().to_string())
                    .with_context("multiplicity", mult.as_str())
                    .with_hint("fit the stellar models for this target before plotting"),
            ));
        }
        let physical = self.layout().file(ArtifactKind::StarCornerPhysical(mult));
        let observed = self.layout().file(ArtifactKind::StarCornerObserved(mult));
        let model = self.backend.load_star_model(&fit)?;
        self.cache.begin(&stage.outputs)?;
        model.corner_plots(&physical, &observed)?;
        self.cache.complete(&stage.outputs)?;
        info!(multiplicity = mult.as_str(), "wrote star-model corner plots");
        Ok(())
    }

    fn finish(self) -> Result<TargetSummary, FppError> {
        let estimate = self.estimate.ok_or_else(|| {
            FppError::backend("fpp_not_computed", "stage plan finished without an FPP")
        })?;
        Ok(TargetSummary {
            name: self.calc.name().to_string(),
            fpp: estimate.value,
            fpv: estimate.fpv,
            odds: odds_label(estimate.value),
            stages_run: self.stages_run,
            stages_skipped: self.stages_skipped,
            bootstrap: self.bootstrap.map(|result| result.summary),
        })
    }
}

fn empty_column(column: &str) -> FppError {
    FppError::Backend(
        ErrorInfo::new("population_column_empty", "reference population has no finite values")
            .with_context("population", REFERENCE_POPULATION)
            .with_context("column", column),
    )
}
