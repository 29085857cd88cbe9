use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::ini::{IniDocument, IniValue};

/// One observed magnitude.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BandMagnitude {
    /// Survey the band belongs to (the section name).
    pub survey: String,
    /// Band identifier, e.g. `J` or `Kepler`.
    pub band: String,
    /// Magnitude.
    pub value: f64,
    /// One-sigma uncertainty when given.
    pub uncertainty: Option<f64>,
}

/// Sectioned host-star photometry descriptor.
///
/// Numeric entries of a survey section are magnitudes. Anything else in a
/// section (observation switches such as `relative = False`) is kept raw in
/// `settings` for the modeling backend to interpret.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct StarPhotometry {
    /// Magnitudes in file order.
    pub bands: Vec<BandMagnitude>,
    /// Non-numeric section entries, survey to key to raw value.
    #[serde(default)]
    pub settings: BTreeMap<String, BTreeMap<String, String>>,
    /// Root-level keys (stellar properties such as `Teff`), kept raw.
    pub properties: BTreeMap<String, String>,
}

impl StarPhotometry {
    /// Extracts magnitudes from every named section of the document.
    pub fn from_document(document: &IniDocument) -> Self {
        let mut bands = Vec::new();
        let mut settings: BTreeMap<String, BTreeMap<String, String>> = BTreeMap::new();
        for (survey, keys) in document.named_sections() {
            for (key, raw) in keys {
                let (value, uncertainty) = match IniValue::parse(raw) {
                    IniValue::Number(value) => (value, None),
                    IniValue::Measurement(m) => (m.value, Some(m.uncertainty)),
                    IniValue::Text(text) => {
                        settings
                            .entry(survey.to_string())
                            .or_default()
                            .insert(key.clone(), text);
                        continue;
                    }
                };
                bands.push(BandMagnitude {
                    survey: survey.to_string(),
                    band: key.clone(),
                    value,
                    uncertainty,
                });
            }
        }
        Self {
            bands,
            settings,
            properties: document.root().cloned().unwrap_or_default(),
        }
    }

    /// Raw non-numeric entry `key` of `survey`.
    pub fn setting(&self, survey: &str, key: &str) -> Option<&str> {
        self.settings
            .get(survey)
            .and_then(|keys| keys.get(key))
            .map(String::as_str)
    }

    /// Finds a band by name in any survey.
    pub fn band(&self, band: &str) -> Option<&BandMagnitude> {
        self.bands.iter().find(|entry| entry.band == band)
    }
}
