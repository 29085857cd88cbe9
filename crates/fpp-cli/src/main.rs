use std::error::Error;
use std::io;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use fpp_config::DEFAULT_SIGNAL_DESCRIPTOR;
use fpp_core::errors::FppError;
use fpp_pipeline::{
    BatchReport, InterruptFlag, RecomputeFlags, RunOptions,
    DEFAULT_ARTIFICIAL_PRIOR, DEFAULT_ICHRONE, DEFAULT_POPULATION_SIZE,
};
use tracing::info;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

#[cfg(feature = "python")]
mod python_backend;

const EXIT_INTERRUPTED: u8 = 130;
const EXIT_USAGE: u8 = 2;

#[derive(Parser, Debug)]
#[command(
    name = "fpp-batch",
    version,
    about = "Compute the false positive probability of transit candidates"
)]
struct Cli {
    /// Target directories, each holding the signal descriptor and star.ini.
    #[arg(default_value = ".")]
    folders: Vec<PathBuf>,
    /// Transit-signal descriptor name inside each directory.
    #[arg(long, default_value = DEFAULT_SIGNAL_DESCRIPTOR)]
    inifile: String,
    /// Size of each simulated population.
    #[arg(long, default_value_t = DEFAULT_POPULATION_SIZE)]
    n: usize,
    /// Regenerate every population simulation.
    #[arg(long)]
    recalc: bool,
    /// Recompute the likelihoods instead of reading their cache.
    #[arg(long = "recalc_lhood")]
    recalc_lhood: bool,
    /// Refit the trapezoid models while keeping the populations.
    #[arg(long = "refit_trap")]
    refit_trap: bool,
    /// Redo the MCMC fit of the transit signal.
    #[arg(long = "refit_trsig")]
    refit_trsig: bool,
    /// Number of bootstrap resamples of the FPP.
    #[arg(long, default_value_t = 0)]
    bootstrap: usize,
    /// Master seed of the bootstrap resamples.
    #[arg(long, default_value_t = 0)]
    seed: u64,
    /// Add the boxy and long comparison models.
    #[arg(long = "include_artificial")]
    include_artificial: bool,
    /// Prior of each artificial model.
    #[arg(long = "artificial_prior", default_value_t = DEFAULT_ARTIFICIAL_PRIOR)]
    artificial_prior: f64,
    /// Stellar-model family.
    #[arg(long, default_value = DEFAULT_ICHRONE)]
    ichrone: String,
    /// Write debug events to each target log.
    #[arg(long)]
    debug: bool,
    /// Truncate each target log before use.
    #[arg(long)]
    newlog: bool,
    /// Write the batch report as JSON.
    #[arg(long)]
    report: Option<PathBuf>,
}

impl Cli {
    fn run_options(&self) -> RunOptions {
        RunOptions {
            inifile: self.inifile.clone(),
            n: self.n,
            recompute: RecomputeFlags {
                recalc: self.recalc,
                recalc_lhood: self.recalc_lhood,
                refit_trap: self.refit_trap,
                refit_trsig: self.refit_trsig,
            },
            bootstrap: self.bootstrap,
            seed: self.seed,
            include_artificial: self.include_artificial,
            artificial_prior: self.artificial_prior,
            ichrone: self.ichrone.clone(),
            debug: self.debug,
            newlog: self.newlog,
        }
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing();

    let interrupt = InterruptFlag::new();
    match run(&cli, &interrupt) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => exit_code(err.as_ref()),
    }
}

fn exit_code(err: &(dyn Error + 'static)) -> ExitCode {
    match err.downcast_ref::<FppError>() {
        Some(fpp) if fpp.is_interrupt() => {
            eprintln!("interrupted");
            ExitCode::from(EXIT_INTERRUPTED)
        }
        Some(fpp) if fpp.info().code == "no_backend" => {
            eprintln!("error: {fpp}");
            ExitCode::from(EXIT_USAGE)
        }
        _ => {
            eprintln!("error: {err}");
            ExitCode::FAILURE
        }
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(io::stderr))
        .try_init();
}

/// First Ctrl-C asks the pipeline to stop at the next boundary and makes the
/// running backend call raise `KeyboardInterrupt`; a second one exits
/// immediately.
///
/// Must be installed after the backend is initialised: the OS-level handler
/// installed here replaces the one Python registered while loading.
#[cfg(feature = "python")]
fn install_interrupt_handler(flag: InterruptFlag) {
    let installed = ctrlc::set_handler(move || {
        if flag.raise() {
            std::process::exit(i32::from(EXIT_INTERRUPTED));
        }
        python_backend::raise_keyboard_interrupt();
        eprintln!("interrupt received, stopping after the current step (Ctrl-C again to quit now)");
    });
    if let Err(err) = installed {
        tracing::warn!(error = %err, "cannot install the Ctrl-C handler");
    }
}

fn run(cli: &Cli, interrupt: &InterruptFlag) -> Result<(), Box<dyn Error>> {
    let opts = cli.run_options();
    let report = execute(&cli.folders, &opts, interrupt)?;
    info!(
        completed = report.completed(),
        failed = report.failed(),
        "all targets processed"
    );
    if let Some(path) = &cli.report {
        report.write(path)?;
    }
    Ok(())
}

#[cfg(feature = "python")]
fn execute(
    folders: &[PathBuf],
    opts: &RunOptions,
    interrupt: &InterruptFlag,
) -> Result<BatchReport, FppError> {
    let backend = python_backend::VespaBackend::initialise()?;
    install_interrupt_handler(interrupt.clone());
    let settings = fpp_pipeline::BatchSettings { echo_stderr: true };
    let stdout = io::stdout();
    let mut out = stdout.lock();
    fpp_pipeline::run_batch(&backend, folders, opts, settings, interrupt, &mut out)
}

#[cfg(not(feature = "python"))]
fn execute(
    _folders: &[PathBuf],
    _opts: &RunOptions,
    _interrupt: &InterruptFlag,
) -> Result<BatchReport, FppError> {
    Err(
        FppError::configuration("no_backend", "built without a modeling backend")
            .with_hint("rebuild fpp-cli with `--features python`"),
    )
}
