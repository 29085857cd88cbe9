use std::collections::BTreeMap;
use std::fmt;

use fpp_core::errors::{ErrorInfo, FppError};
use serde::{Deserialize, Serialize};

/// Name under which keys that precede any `[section]` header are stored.
pub const ROOT_SECTION: &str = "";

/// Keys and raw values of one section.
pub type Section = BTreeMap<String, String>;

/// A value paired with its one-sigma uncertainty.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Measurement {
    /// Central value.
    pub value: f64,
    /// One-sigma uncertainty.
    pub uncertainty: f64,
}

impl fmt::Display for Measurement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} +/- {}", self.value, self.uncertainty)
    }
}

/// Lazily typed view of a raw descriptor value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "kebab-case")]
pub enum IniValue {
    /// A single number.
    Number(f64),
    /// A `value, uncertainty` pair.
    Measurement(Measurement),
    /// Anything else.
    Text(String),
}

impl IniValue {
    /// Interprets a raw value.
    pub fn parse(raw: &str) -> Self {
        let trimmed = raw.trim();
        if let Ok(number) = trimmed.parse::<f64>() {
            return IniValue::Number(number);
        }
        let parts: Vec<&str> = trimmed.split(',').map(str::trim).collect();
        if let [value, uncertainty] = parts.as_slice() {
            if let (Ok(value), Ok(uncertainty)) = (value.parse::<f64>(), uncertainty.parse::<f64>())
            {
                return IniValue::Measurement(Measurement { value, uncertainty });
            }
        }
        IniValue::Text(trimmed.to_string())
    }

    /// Central value for numbers and measurements.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            IniValue::Number(value) => Some(*value),
            IniValue::Measurement(measurement) => Some(measurement.value),
            IniValue::Text(_) => None,
        }
    }

    /// Measurement view; a bare number has no uncertainty and yields `None`.
    pub fn as_measurement(&self) -> Option<Measurement> {
        match self {
            IniValue::Measurement(measurement) => Some(*measurement),
            _ => None,
        }
    }
}

/// Parsed INI-style descriptor: ordered sections of `key = value` pairs.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct IniDocument {
    sections: Vec<(String, Section)>,
}

impl IniDocument {
    /// Parses descriptor text. Later duplicate keys overwrite earlier ones.
    pub fn parse(text: &str) -> Result<Self, FppError> {
        let mut document = IniDocument::default();
        let mut current = ROOT_SECTION.to_string();
        for (idx, raw_line) in text.lines().enumerate() {
            let line = strip_comment(raw_line).trim();
            if line.is_empty() {
                continue;
            }
            if let Some(header) = line.strip_prefix('[') {
                let Some(name) = header.strip_suffix(']') else {
                    return Err(syntax_error(idx, raw_line, "unterminated section header"));
                };
                let name = name.trim();
                if name.is_empty() {
                    return Err(syntax_error(idx, raw_line, "empty section name"));
                }
                current = name.to_string();
                document.section_mut(&current);
                continue;
            }
            let Some((key, value)) = line.split_once('=') else {
                return Err(syntax_error(idx, raw_line, "expected `key = value`"));
            };
            let key = key.trim();
            if key.is_empty() {
                return Err(syntax_error(idx, raw_line, "empty key"));
            }
            document
                .section_mut(&current)
                .insert(key.to_string(), unquote(value.trim()).to_string());
        }
        Ok(document)
    }

    /// Keys that appear before any section header.
    pub fn root(&self) -> Option<&Section> {
        self.section(ROOT_SECTION)
    }

    /// Looks up a section by name.
    pub fn section(&self, name: &str) -> Option<&Section> {
        self.sections
            .iter()
            .find(|(section, _)| section == name)
            .map(|(_, keys)| keys)
    }

    /// Named sections in file order, root excluded.
    pub fn named_sections(&self) -> impl Iterator<Item = (&str, &Section)> {
        self.sections
            .iter()
            .filter(|(name, _)| name != ROOT_SECTION)
            .map(|(name, keys)| (name.as_str(), keys))
    }

    /// Raw value of `key` in `section`.
    pub fn get(&self, section: &str, key: &str) -> Option<&str> {
        self.section(section)
            .and_then(|keys| keys.get(key))
            .map(String::as_str)
    }

    /// Typed value of `key` in `section`.
    pub fn value(&self, section: &str, key: &str) -> Option<IniValue> {
        self.get(section, key).map(IniValue::parse)
    }

    fn section_mut(&mut self, name: &str) -> &mut Section {
        let position = match self.sections.iter().position(|(section, _)| section == name) {
            Some(position) => position,
            None => {
                self.sections.push((name.to_string(), Section::new()));
                self.sections.len() - 1
            }
        };
        &mut self.sections[position].1
    }
}

fn strip_comment(line: &str) -> &str {
    let trimmed = line.trim_start();
    if trimmed.starts_with('#') || trimmed.starts_with(';') {
        return "";
    }
    match line.find(" #") {
        Some(idx) => &line[..idx],
        None => line,
    }
}

fn unquote(value: &str) -> &str {
    for quote in ['"', '\''] {
        if value.len() >= 2 && value.starts_with(quote) && value.ends_with(quote) {
            return &value[1..value.len() - 1];
        }
    }
    value
}

fn syntax_error(idx: usize, line: &str, message: &str) -> FppError {
    FppError::Configuration(
        ErrorInfo::new("ini_syntax", message)
            .with_context("line", (idx + 1).to_string())
            .with_context("text", line.trim().to_string()),
    )
}
