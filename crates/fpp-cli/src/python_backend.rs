//! `ModelingBackend` backed by vespa through an embedded Python module.

use std::ffi::CString;
use std::path::Path;

use fpp_core::errors::{ErrorInfo, FppError};
use fpp_core::likelihood::LikelihoodTable;
use fpp_pipeline::{ArtificialModel, Calculation, LoadRequest, ModelingBackend, StarModelFit};
use pyo3::exceptions::PyKeyboardInterrupt;
use pyo3::ffi::c_str;
use pyo3::prelude::*;
use pyo3::types::PyModule;
use serde::de::DeserializeOwned;
use serde_json::{json, Value};

const BRIDGE_SOURCE: &str = include_str!("../python/vespa_bridge.py");

/// Maps a Python exception: keyboard interrupts cancel the batch, the
/// bridge's `ConfigurationError` marks bad descriptors, anything else is a
/// backend failure.
fn map_py_error(py: Python<'_>, module: &Bound<'_, PyModule>, err: PyErr, function: &str) -> FppError {
    let message = err.value(py).to_string();
    let exception = err
        .get_type(py)
        .name()
        .map(|name| name.to_string())
        .unwrap_or_default();
    if err.is_instance_of::<PyKeyboardInterrupt>(py) {
        return FppError::interrupted("KeyboardInterrupt").with_context("function", function);
    }
    let info = ErrorInfo::new(format!("python_{function}"), message)
        .with_context("exception", exception)
        .with_context("function", function);
    let is_configuration = module
        .getattr("ConfigurationError")
        .is_ok_and(|class| matches!(err.matches(py, class), Ok(true)));
    if is_configuration {
        FppError::Configuration(info)
    } else {
        FppError::Backend(info)
    }
}

/// Makes the running bridge call raise `KeyboardInterrupt` at its next
/// bytecode boundary. Does nothing while no Python code runs.
pub fn raise_keyboard_interrupt() {
    // SAFETY: async-signal-safe, callable from any thread without holding
    // the interpreter lock; the interpreter is initialised before the
    // handler calling this is installed.
    unsafe { pyo3::ffi::PyErr_SetInterrupt() }
}

fn decode<T: DeserializeOwned>(function: &str, text: &str) -> Result<T, FppError> {
    serde_json::from_str(text).map_err(|err| {
        FppError::Serde(
            ErrorInfo::new("bridge_decode", err.to_string()).with_context("function", function),
        )
    })
}

/// Handle on the embedded bridge module.
pub struct VespaBackend {
    module: Py<PyModule>,
}

impl VespaBackend {
    /// Starts the interpreter and loads the bridge module.
    pub fn initialise() -> Result<Self, FppError> {
        let source = CString::new(BRIDGE_SOURCE)
            .map_err(|err| FppError::backend("bridge_source", err.to_string()))?;
        Python::attach(|py| {
            let module = PyModule::from_code(
                py,
                source.as_c_str(),
                c_str!("vespa_bridge.py"),
                c_str!("vespa_bridge"),
            )
            .map_err(|err| {
                FppError::Backend(
                    ErrorInfo::new("bridge_init", err.value(py).to_string())
                        .with_hint("check that vespa, isochrones and matplotlib are importable"),
                )
            })?;
            Ok(Self {
                module: module.unbind(),
            })
        })
    }
}

impl ModelingBackend for VespaBackend {
    type Calculation = VespaCalculation;
    type StarModel = VespaStarModel;

    fn load_calculation(&self, request: &LoadRequest<'_>) -> Result<VespaCalculation, FppError> {
        let payload = json!({
            "folder": request.config.folder.display().to_string(),
            "ini_file": request.ini_file,
            "n": request.n,
            "recalc": request.recalc,
            "refit_trap": request.refit_trap,
            "ichrone": request.ichrone,
        })
        .to_string();
        Python::attach(|py| {
            let module = self.module.bind(py);
            let (calc, name): (Py<PyAny>, String) = module
                .call_method1("load_calculation", (payload.as_str(),))
                .and_then(|value| value.extract())
                .map_err(|err| map_py_error(py, module, err, "load_calculation"))?;
            Ok(VespaCalculation {
                module: self.module.clone_ref(py),
                calc,
                name,
            })
        })
    }

    fn load_star_model(&self, path: &Path) -> Result<VespaStarModel, FppError> {
        let path = path.display().to_string();
        Python::attach(|py| {
            let module = self.module.bind(py);
            let model = module
                .call_method1("load_star_model", (path.as_str(),))
                .map_err(|err| map_py_error(py, module, err, "load_star_model"))?;
            Ok(VespaStarModel {
                module: self.module.clone_ref(py),
                model: model.unbind(),
            })
        })
    }
}

/// Calls `function(target, payload)` on the bridge and decodes its JSON reply.
fn call_bridge<T: DeserializeOwned>(
    module: &Py<PyModule>,
    target: &Py<PyAny>,
    function: &str,
    payload: Value,
) -> Result<T, FppError> {
    let payload = payload.to_string();
    let reply = Python::attach(|py| {
        let module = module.bind(py);
        module
            .call_method1(function, (target.bind(py), payload.as_str()))
            .and_then(|value| value.extract::<String>())
            .map_err(|err| map_py_error(py, module, err, function))
    })?;
    decode(function, &reply)
}

/// A vespa `FPPCalculation`.
pub struct VespaCalculation {
    module: Py<PyModule>,
    calc: Py<PyAny>,
    name: String,
}

impl VespaCalculation {
    fn call<T: DeserializeOwned>(&self, function: &str, payload: Value) -> Result<T, FppError> {
        call_bridge(&self.module, &self.calc, function, payload)
    }
}

impl Calculation for VespaCalculation {
    fn name(&self) -> &str {
        &self.name
    }

    fn refit_signal(&mut self) -> Result<(), FppError> {
        self.call("refit_signal", Value::Null)
    }

    fn save_signal(&self, path: &Path) -> Result<(), FppError> {
        self.call("save_signal", json!({ "path": path.display().to_string() }))
    }

    fn plot_signal_corner(&self, path: &Path) -> Result<(), FppError> {
        self.call("plot_signal_corner", json!({ "path": path.display().to_string() }))
    }

    fn population_column(&self, model: &str, column: &str) -> Result<Vec<f64>, FppError> {
        self.call(
            "population_column",
            json!({ "model": model, "column": column }),
        )
    }

    fn add_artificial_model(&mut self, model: &ArtificialModel) -> Result<(), FppError> {
        let payload = serde_json::to_value(model)
            .map_err(|err| FppError::Serde(ErrorInfo::new("bridge_encode", err.to_string())))?;
        self.call("add_artificial_model", payload)
    }

    fn compute_likelihoods(&mut self, recalc: bool) -> Result<LikelihoodTable, FppError> {
        let table: LikelihoodTable = self.call("compute_likelihoods", json!({ "recalc": recalc }))?;
        LikelihoodTable::new(table.models, table.fp_specific)
    }

    fn plot_fpp(&self, folder: &Path, _table: &LikelihoodTable) -> Result<(), FppError> {
        self.call("plot_fpp", json!({ "folder": folder.display().to_string() }))
    }

    fn resample_signal(&mut self, seed: u64) -> Result<(), FppError> {
        self.call("resample_signal", json!({ "seed": seed }))
    }
}

/// A persisted isochrones `StarModel`.
pub struct VespaStarModel {
    module: Py<PyModule>,
    model: Py<PyAny>,
}

impl StarModelFit for VespaStarModel {
    fn corner_plots(&self, physical: &Path, observed: &Path) -> Result<(), FppError> {
        call_bridge(
            &self.module,
            &self.model,
            "star_corner_plots",
            json!({
                "physical": physical.display().to_string(),
                "observed": observed.display().to_string(),
            }),
        )
    }
}
