//! Per-target descriptor loading: the transit-signal file and `star.ini`.

#![deny(missing_docs)]

mod ini;
mod photometry;
mod signal;

use std::fs;
use std::path::{Path, PathBuf};

use fpp_core::errors::{ErrorInfo, FppError};

pub use ini::{IniDocument, IniValue, Measurement, Section, ROOT_SECTION};
pub use photometry::{BandMagnitude, StarPhotometry};
pub use signal::{TransitSignalConfig, SPECTROSCOPIC_KEYS};

/// Default transit-signal descriptor name.
pub const DEFAULT_SIGNAL_DESCRIPTOR: &str = "fpp.ini";
/// Photometry descriptor name, fixed per target directory.
pub const STAR_DESCRIPTOR: &str = "star.ini";

/// Both descriptors of one target, parsed.
///
/// The documents are kept alongside the typed views so that callers can
/// fingerprint descriptor content independently of comments and layout.
#[derive(Debug, Clone, PartialEq)]
pub struct TargetConfig {
    /// Target directory.
    pub folder: PathBuf,
    /// Path of the transit-signal descriptor.
    pub signal_path: PathBuf,
    /// Path of the photometry descriptor.
    pub photometry_path: PathBuf,
    /// Parsed transit-signal descriptor.
    pub signal: TransitSignalConfig,
    /// Parsed photometry descriptor.
    pub photometry: StarPhotometry,
    /// Every key of the transit-signal descriptor.
    pub signal_document: IniDocument,
    /// Every key of the photometry descriptor.
    pub photometry_document: IniDocument,
}

/// Reads and parses `<folder>/<ini_file>` and `<folder>/star.ini`.
pub fn load_target_config(folder: &Path, ini_file: &str) -> Result<TargetConfig, FppError> {
    let signal_path = folder.join(ini_file);
    let photometry_path = folder.join(STAR_DESCRIPTOR);

    let signal_text = read_descriptor(&signal_path, "signal_read")?;
    let photometry_text = read_descriptor(&photometry_path, "photometry_read")?;

    let signal_document = IniDocument::parse(&signal_text)
        .map_err(|err| err.with_context("path", signal_path.display().to_string()))?;
    let photometry_document = IniDocument::parse(&photometry_text)
        .map_err(|err| err.with_context("path", photometry_path.display().to_string()))?;

    let signal = TransitSignalConfig::from_document(&signal_document, folder)
        .map_err(|err| err.with_context("path", signal_path.display().to_string()))?;
    let photometry = StarPhotometry::from_document(&photometry_document);

    Ok(TargetConfig {
        folder: folder.to_path_buf(),
        signal_path,
        photometry_path,
        signal,
        photometry,
        signal_document,
        photometry_document,
    })
}

fn read_descriptor(path: &Path, code: &str) -> Result<String, FppError> {
    fs::read_to_string(path).map_err(|err| {
        FppError::Configuration(
            ErrorInfo::new(code, err.to_string())
                .with_context("path", path.display().to_string()),
        )
    })
}
