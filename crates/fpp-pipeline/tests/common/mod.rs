#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use fpp_core::{FppError, LikelihoodTable, ModelLikelihood};
use fpp_pipeline::{
    ArtificialModel, Calculation, InterruptFlag, LoadRequest, ModelingBackend, Multiplicity,
    StarModelFit,
};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

pub const ICHRONE: &str = "mist";

/// Shared record of every backend call, in order.
#[derive(Debug, Clone, Default)]
pub struct CallLog(Arc<Mutex<Vec<String>>>);

impl CallLog {
    fn push(&self, entry: String) {
        self.0.lock().expect("call log").push(entry);
    }

    pub fn entries(&self) -> Vec<String> {
        self.0.lock().expect("call log").clone()
    }

    pub fn count(&self, prefix: &str) -> usize {
        self.entries()
            .iter()
            .filter(|entry| entry.starts_with(prefix))
            .count()
    }

    pub fn clear(&self) {
        self.0.lock().expect("call log").clear();
    }
}

/// Scripted stand-in for the modeling library. Every artifact it "writes"
/// is a small non-empty file.
#[derive(Debug, Clone, Default)]
pub struct FakeBackend {
    pub calls: CallLog,
    /// Candidate names whose load fails with a backend error.
    pub fail_load: Vec<String>,
    /// Candidate names whose likelihood computation raises a keyboard
    /// interrupt; the flag is raised as the signal handler would.
    pub interrupt_compute: Vec<String>,
    /// Star-model fit file names whose corner plotting is hit by a Ctrl-C;
    /// the plots are still written, as a blocking library call would.
    pub interrupt_corners: Vec<String>,
    pub interrupt: InterruptFlag,
}

impl FakeBackend {
    pub fn new() -> Self {
        Self::default()
    }
}

fn touch(path: &Path, contents: &str) -> Result<(), FppError> {
    fs::write(path, contents).map_err(|err| FppError::io("fake_write", err))
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default()
}

pub struct FakeCalculation {
    name: String,
    folder: PathBuf,
    calls: CallLog,
    interrupt: Option<InterruptFlag>,
    models: Vec<ModelLikelihood>,
    planet_scale: f64,
}

impl FakeCalculation {
    fn record(&self, entry: impl AsRef<str>) {
        self.calls.push(format!("{}:{}", entry.as_ref(), self.name));
    }
}

fn base_models() -> Vec<ModelLikelihood> {
    [
        ("pl", "Planets", 0.01, 1.0),
        ("eb", "EBs", 0.5, 0.001),
        ("heb", "HEBs", 0.1, 0.002),
        ("beb", "BEBs", 0.05, 0.006),
    ]
    .into_iter()
    .map(|(short_name, name, prior, lhood)| ModelLikelihood {
        short_name: short_name.to_string(),
        name: name.to_string(),
        prior,
        lhood,
    })
    .collect()
}

/// FPP of an unperturbed fake table.
pub fn expected_fpp() -> f64 {
    1.0 - 0.01 / (0.01 + 0.5 * 0.001 + 0.1 * 0.002 + 0.05 * 0.006)
}

impl Calculation for FakeCalculation {
    fn name(&self) -> &str {
        &self.name
    }

    fn refit_signal(&mut self) -> Result<(), FppError> {
        self.record("refit");
        Ok(())
    }

    fn save_signal(&self, path: &Path) -> Result<(), FppError> {
        self.record("save_signal");
        touch(path, "trsig")
    }

    fn plot_signal_corner(&self, path: &Path) -> Result<(), FppError> {
        self.record("signal_corner");
        touch(path, "corner")
    }

    fn population_column(&self, model: &str, column: &str) -> Result<Vec<f64>, FppError> {
        match (model, column) {
            ("eb", "slope") => Ok((1..=10).map(f64::from).collect()),
            ("eb", "duration") => Ok((0..=100).map(|value| f64::from(value) / 100.0).collect()),
            _ => Err(FppError::backend("unknown_column", format!("{model}.{column}"))),
        }
    }

    fn add_artificial_model(&mut self, model: &ArtificialModel) -> Result<(), FppError> {
        self.record(format!("artificial:{}", model.short_name()));
        self.models.push(ModelLikelihood {
            short_name: model.short_name().to_string(),
            name: model.short_name().to_string(),
            prior: model.prior(),
            lhood: 0.0,
        });
        Ok(())
    }

    fn compute_likelihoods(&mut self, recalc: bool) -> Result<LikelihoodTable, FppError> {
        self.record(format!("compute:recalc={recalc}"));
        if let Some(flag) = &self.interrupt {
            flag.raise();
            return Err(FppError::interrupted("KeyboardInterrupt"));
        }
        let cache = self.folder.join("lhoodcache.dat");
        if recalc || !cache.exists() {
            touch(&cache, "lhood")?;
        }
        let mut models = self.models.clone();
        if let Some(planet) = models.iter_mut().find(|model| model.short_name == "pl") {
            planet.lhood *= self.planet_scale;
        }
        LikelihoodTable::new(models, 0.01)
    }

    fn plot_fpp(&self, folder: &Path, table: &LikelihoodTable) -> Result<(), FppError> {
        self.record("plot_fpp");
        touch(&folder.join("signal.png"), "signal")?;
        touch(&folder.join("FPPsummary.png"), "summary")?;
        for model in &table.models {
            touch(&folder.join(format!("{}.png", model.short_name)), "model")?;
        }
        Ok(())
    }

    fn resample_signal(&mut self, seed: u64) -> Result<(), FppError> {
        self.record(format!("resample:{seed}"));
        let mut rng = StdRng::seed_from_u64(seed);
        self.planet_scale = rng.gen_range(0.5..1.5);
        Ok(())
    }
}

pub struct FakeStarModel {
    calls: CallLog,
    fit: String,
    interrupt: Option<InterruptFlag>,
}

impl StarModelFit for FakeStarModel {
    fn corner_plots(&self, physical: &Path, observed: &Path) -> Result<(), FppError> {
        self.calls.push(format!("star_corners:{}", self.fit));
        if let Some(flag) = &self.interrupt {
            flag.raise();
        }
        touch(physical, "physical")?;
        touch(observed, "observed")
    }
}

impl ModelingBackend for FakeBackend {
    type Calculation = FakeCalculation;
    type StarModel = FakeStarModel;

    fn load_calculation(&self, request: &LoadRequest<'_>) -> Result<FakeCalculation, FppError> {
        let name = request.config.signal.name.clone();
        self.calls
            .push(format!("load:recalc={}:{}", request.recalc, name));
        if self.fail_load.contains(&name) {
            return Err(FppError::backend("population_failed", "simulation blew up"));
        }
        let folder = request.config.folder.clone();
        let popset = folder.join("popset.h5");
        if request.recalc || !popset.exists() {
            touch(&popset, "populations")?;
            touch(&folder.join("starfield.h5"), "field")?;
        }
        let trsig = folder.join("trsig.pkl");
        if !trsig.exists() {
            touch(&trsig, "trsig")?;
        }
        Ok(FakeCalculation {
            interrupt: self
                .interrupt_compute
                .contains(&name)
                .then(|| self.interrupt.clone()),
            name,
            folder,
            calls: self.calls.clone(),
            models: base_models(),
            planet_scale: 1.0,
        })
    }

    fn load_star_model(&self, path: &Path) -> Result<FakeStarModel, FppError> {
        let fit = file_name(path);
        self.calls.push(format!("load_star:{fit}"));
        if !path.exists() {
            return Err(FppError::missing_artifact("fake_missing", fit));
        }
        Ok(FakeStarModel {
            calls: self.calls.clone(),
            interrupt: self
                .interrupt_corners
                .contains(&fit)
                .then(|| self.interrupt.clone()),
            fit,
        })
    }
}

pub fn signal_descriptor(name: &str) -> String {
    format!(
        "name = {name}\nra = 279.704\ndec = 50.2418\nperiod = 289.8623\nrprs = 0.0203\n\
         photfile = lc.csv\nTeff = 5642, 50\n\n[constraints]\nmaxrad = 12\n"
    )
}

pub const STAR_DESCRIPTOR_TEXT: &str = "[twomass]\nJ = 10.523, 0.022\nK = 10.093, 0.018\n[kepler]\nKepler = 11.664\n";

/// Writes a complete target: both descriptors plus all three star-model fits.
pub fn write_target(dir: &Path, name: &str) {
    write_target_with_fits(dir, name, &Multiplicity::ALL);
}

pub fn write_target_with_fits(dir: &Path, name: &str, fits: &[Multiplicity]) {
    fs::create_dir_all(dir).expect("target dir");
    fs::write(dir.join("fpp.ini"), signal_descriptor(name)).expect("fpp.ini");
    fs::write(dir.join("star.ini"), STAR_DESCRIPTOR_TEXT).expect("star.ini");
    for mult in fits {
        fs::write(
            dir.join(format!("{ICHRONE}_starmodel_{}.h5", mult.as_str())),
            "fit",
        )
        .expect("star model");
    }
}

pub fn corner_pair(dir: &Path, mult: Multiplicity) -> (PathBuf, PathBuf) {
    (
        dir.join(format!("{ICHRONE}_corner_physical_{}.png", mult.as_str())),
        dir.join(format!("{ICHRONE}_corner_observed_{}.png", mult.as_str())),
    )
}

/// Sorted file names of `dir`.
pub fn listing(dir: &Path) -> Vec<String> {
    let mut names: Vec<String> = fs::read_dir(dir)
        .expect("read dir")
        .map(|entry| entry.expect("entry").file_name().to_string_lossy().into_owned())
        .collect();
    names.sort();
    names
}
