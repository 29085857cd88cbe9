use std::fs::File;
use std::io;
use std::path::Path;

use fpp_config::{IniDocument, TargetConfig};
use fpp_core::errors::{ErrorInfo, FppError};
use serde::Serialize;
use sha2::{Digest, Sha256};

use crate::artifacts::{ArtifactKind, ArtifactLayout, Multiplicity};
use crate::cache::InputFingerprints;
use crate::options::RunOptions;
use crate::serde::to_canonical_json_bytes;

/// Computes a stable SHA256 hash for the provided serializable value.
pub fn stable_hash_string<T: Serialize>(value: &T) -> Result<String, FppError> {
    let bytes = to_canonical_json_bytes(value)?;
    let digest = Sha256::digest(&bytes);
    Ok(format!("{:x}", digest))
}

#[derive(Serialize)]
struct PopulationInputs<'a> {
    signal: &'a IniDocument,
    photometry: &'a IniDocument,
    n: usize,
    ichrone: &'a str,
}

/// Fingerprint of what the simulated populations are generated from: the
/// parsed descriptor keys, the population size and the stellar-model family.
/// Comments and layout of the descriptors do not contribute.
pub fn population_fingerprint(config: &TargetConfig, opts: &RunOptions) -> Result<String, FppError> {
    stable_hash_string(&PopulationInputs {
        signal: &config.signal_document,
        photometry: &config.photometry_document,
        n: opts.n,
        ichrone: &opts.ichrone,
    })
}

/// SHA256 of a file's contents.
pub fn file_fingerprint(path: &Path) -> Result<String, FppError> {
    let mut file = File::open(path).map_err(|err| fingerprint_error(path, err))?;
    let mut hasher = Sha256::new();
    io::copy(&mut file, &mut hasher).map_err(|err| fingerprint_error(path, err))?;
    Ok(format!("{:x}", hasher.finalize()))
}

/// Current input fingerprints of every fingerprinted artifact of a target.
///
/// Populations and the likelihood cache follow [`population_fingerprint`].
/// Each star-model corner pair follows the contents of its fit, when the fit
/// exists. Everything else is gated on existence and recompute flags only.
pub fn target_fingerprints(
    config: &TargetConfig,
    opts: &RunOptions,
    layout: &ArtifactLayout,
) -> Result<InputFingerprints, FppError> {
    let population = population_fingerprint(config, opts)?;
    let mut fingerprints = InputFingerprints::new();
    for kind in [
        ArtifactKind::PopulationSet,
        ArtifactKind::StarField,
        ArtifactKind::LikelihoodCache,
    ] {
        fingerprints.insert(kind, population.clone());
    }
    for mult in Multiplicity::ALL {
        let fit = layout.file(ArtifactKind::StarModelFit(mult));
        if !fit.is_file() {
            continue;
        }
        let digest = file_fingerprint(&fit)?;
        fingerprints.insert(ArtifactKind::StarCornerPhysical(mult), digest.clone());
        fingerprints.insert(ArtifactKind::StarCornerObserved(mult), digest);
    }
    Ok(fingerprints)
}

fn fingerprint_error(path: &Path, err: io::Error) -> FppError {
    FppError::Io(
        ErrorInfo::new("fingerprint_read", err.to_string())
            .with_context("path", path.display().to_string()),
    )
}
