//! Where a batch report came from: layout version, options hash and tools.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Layout version of a serialized batch report.
///
/// A reader accepts any report whose major version equals its own; minor
/// and patch bumps only add optional fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SchemaVersion {
    /// Bumped when existing fields change meaning or disappear.
    pub major: u32,
    /// Bumped when optional fields are added.
    pub minor: u32,
    /// Bumped for fixes that leave the layout untouched.
    pub patch: u32,
}

impl SchemaVersion {
    /// Version `major.minor.patch`.
    pub const fn new(major: u32, minor: u32, patch: u32) -> Self {
        Self {
            major,
            minor,
            patch,
        }
    }

    /// Whether a reader at `self` can load a report written at `written`.
    pub fn reads(&self, written: SchemaVersion) -> bool {
        self.major == written.major
    }
}

impl Default for SchemaVersion {
    fn default() -> Self {
        Self::new(1, 0, 0)
    }
}

impl fmt::Display for SchemaVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)
    }
}

/// Run provenance stored in every batch report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct RunProvenance {
    /// SHA256 of the canonical run options.
    pub options_hash: String,
    /// Bootstrap master seed.
    pub seed: u64,
    /// RFC 3339 creation time of the report.
    pub created_at: String,
    /// Component name to version.
    pub tool_versions: BTreeMap<String, String>,
}

impl RunProvenance {
    /// Provenance of a run with the given options hash, seed and timestamp.
    pub fn new(options_hash: impl Into<String>, seed: u64, created_at: impl Into<String>) -> Self {
        Self {
            options_hash: options_hash.into(),
            seed,
            created_at: created_at.into(),
            tool_versions: BTreeMap::new(),
        }
    }

    /// Records the version of one component.
    pub fn with_tool(mut self, name: impl Into<String>, version: impl Into<String>) -> Self {
        self.tool_versions.insert(name.into(), version.into());
        self
    }
}
