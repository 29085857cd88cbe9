use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use fpp_core::errors::{ErrorInfo, FppError};
use serde::{Deserialize, Serialize};

use crate::ini::{IniDocument, IniValue, Measurement, Section};

/// Spectroscopic constraints recognised in the signal descriptor.
pub const SPECTROSCOPIC_KEYS: [&str; 3] = ["Teff", "logg", "feh"];

/// Flat transit-signal descriptor of one target.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransitSignalConfig {
    /// Candidate name reported in summaries.
    pub name: String,
    /// Right ascension in degrees.
    pub ra: Option<f64>,
    /// Declination in degrees.
    pub dec: Option<f64>,
    /// Orbital period in days.
    pub period: Option<f64>,
    /// Planet-to-star radius ratio.
    pub rprs: Option<f64>,
    /// Light-curve file, resolved against the target directory.
    pub photfile: Option<PathBuf>,
    /// Spectroscopic value/uncertainty pairs keyed by parameter.
    pub spectroscopy: BTreeMap<String, Measurement>,
    /// Raw `[constraints]` section, forwarded untouched to the backend.
    pub constraints: Section,
}

impl TransitSignalConfig {
    /// Extracts the signal descriptor from a parsed document.
    ///
    /// Only `name` is required here; the modeling backend owns validation of
    /// everything else.
    pub fn from_document(document: &IniDocument, folder: &Path) -> Result<Self, FppError> {
        let root = document.root().cloned().unwrap_or_default();
        let name = root
            .get("name")
            .map(|name| name.trim().to_string())
            .filter(|name| !name.is_empty())
            .ok_or_else(|| {
                FppError::Configuration(
                    ErrorInfo::new("signal_name_missing", "transit-signal descriptor has no `name`")
                        .with_context("folder", folder.display().to_string())
                        .with_hint("add `name = <candidate>` before any section header"),
                )
            })?;

        let number = |key: &str| root.get(key).and_then(|raw| IniValue::parse(raw).as_f64());
        let spectroscopy = SPECTROSCOPIC_KEYS
            .iter()
            .filter_map(|key| {
                root.get(*key)
                    .and_then(|raw| IniValue::parse(raw).as_measurement())
                    .map(|measurement| (key.to_string(), measurement))
            })
            .collect();

        Ok(Self {
            name,
            ra: number("ra"),
            dec: number("dec"),
            period: number("period"),
            rprs: number("rprs"),
            photfile: root.get("photfile").map(|file| folder.join(file)),
            spectroscopy,
            constraints: document.section("constraints").cloned().unwrap_or_default(),
        })
    }
}
