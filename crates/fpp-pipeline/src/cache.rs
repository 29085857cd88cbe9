//! Artifact cache gate: decides which expensive stages may be skipped.
//!
//! Existence of the output file is the primary cache key. On top of that a
//! per-target manifest records which artifacts were being produced when a
//! run stopped and which input fingerprint each finished artifact came from.

use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::{Path, PathBuf};

use chrono::Utc;
use fpp_core::errors::FppError;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::artifacts::{ArtifactKind, ArtifactLayout};
use crate::files::write_atomic;
use crate::options::RecomputeFlags;
use crate::serde::{from_json_slice, to_canonical_json_bytes};

/// Why an existing artifact cannot be reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum StaleReason {
    /// A recompute flag covers the artifact.
    Forced,
    /// A previous run started producing it and never finished.
    Incomplete,
    /// The file is empty.
    Empty,
    /// It was produced from different descriptor contents or options.
    InputsChanged,
}

/// Cache state of one artifact.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", tag = "state", content = "reason")]
pub enum ArtifactState {
    /// No file on disk.
    Absent,
    /// File on disk that must not be reused.
    Stale(StaleReason),
    /// File on disk that may be reused.
    Valid,
}

impl ArtifactState {
    /// Whether the artifact may be reused.
    pub fn is_valid(&self) -> bool {
        matches!(self, ArtifactState::Valid)
    }
}

/// Whether a recompute flag forces regeneration of `kind`.
pub fn forced_by(kind: ArtifactKind, flags: RecomputeFlags) -> bool {
    match kind {
        ArtifactKind::SignalFit | ArtifactKind::SignalCorner => flags.refit_trsig,
        ArtifactKind::LikelihoodCache => flags.recalc_lhood || flags.recalc,
        ArtifactKind::PopulationSet | ArtifactKind::StarField => flags.recalc,
        _ => false,
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", tag = "status")]
enum ManifestEntry {
    InProgress {
        started_at: String,
    },
    Complete {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        fingerprint: Option<String>,
        completed_at: String,
    },
}

/// On-disk record of artifact production, keyed by file name.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct CacheManifest {
    #[serde(default)]
    entries: BTreeMap<String, ManifestEntry>,
}

impl CacheManifest {
    fn load(path: &Path) -> Self {
        let Ok(bytes) = fs::read(path) else {
            return Self::default();
        };
        match from_json_slice(&bytes) {
            Ok(manifest) => manifest,
            Err(err) => {
                warn!(path = %path.display(), error = %err, "ignoring unreadable cache manifest");
                Self::default()
            }
        }
    }

    /// Number of tracked artifacts.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether nothing is tracked yet.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Input fingerprints of the current run, per artifact.
///
/// An artifact without an entry is never invalidated by its inputs; only
/// existence, recompute flags and in-progress markers gate it.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct InputFingerprints {
    entries: BTreeMap<ArtifactKind, String>,
}

impl InputFingerprints {
    /// No fingerprinted artifacts.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the current fingerprint of `kind`.
    pub fn insert(&mut self, kind: ArtifactKind, fingerprint: impl Into<String>) {
        self.entries.insert(kind, fingerprint.into());
    }

    /// Builder form of [`InputFingerprints::insert`].
    pub fn with(mut self, kind: ArtifactKind, fingerprint: impl Into<String>) -> Self {
        self.insert(kind, fingerprint);
        self
    }

    /// Current fingerprint of `kind`.
    pub fn get(&self, kind: ArtifactKind) -> Option<&str> {
        self.entries.get(&kind).map(String::as_str)
    }
}

/// Cache of one target directory for one run.
#[derive(Debug)]
pub struct ArtifactCache {
    layout: ArtifactLayout,
    flags: RecomputeFlags,
    fingerprints: InputFingerprints,
    manifest_path: PathBuf,
    manifest: CacheManifest,
    refreshed: BTreeSet<ArtifactKind>,
}

impl ArtifactCache {
    /// Opens the cache, reading the manifest when one exists.
    pub fn open(layout: ArtifactLayout, flags: RecomputeFlags, fingerprints: InputFingerprints) -> Self {
        let manifest_path = layout.file(ArtifactKind::CacheManifest);
        let manifest = CacheManifest::load(&manifest_path);
        Self {
            layout,
            flags,
            fingerprints,
            manifest_path,
            manifest,
            refreshed: BTreeSet::new(),
        }
    }

    /// Layout of the target directory.
    pub fn layout(&self) -> &ArtifactLayout {
        &self.layout
    }

    /// Current manifest contents.
    pub fn manifest(&self) -> &CacheManifest {
        &self.manifest
    }

    /// Tri-state view of one artifact.
    pub fn state(&self, kind: ArtifactKind) -> ArtifactState {
        let Some(path) = self.layout.path(kind) else {
            return ArtifactState::Absent;
        };
        let Ok(metadata) = fs::metadata(&path) else {
            return ArtifactState::Absent;
        };
        if self.refreshed.contains(&kind) {
            return ArtifactState::Valid;
        }
        if forced_by(kind, self.flags) {
            return ArtifactState::Stale(StaleReason::Forced);
        }
        match self.manifest.entries.get(&self.key(kind)) {
            Some(ManifestEntry::InProgress { .. }) => {
                return ArtifactState::Stale(StaleReason::Incomplete)
            }
            Some(ManifestEntry::Complete { fingerprint, .. }) => {
                if let Some(current) = self.fingerprints.get(kind) {
                    if fingerprint.as_deref() != Some(current) {
                        return ArtifactState::Stale(StaleReason::InputsChanged);
                    }
                }
            }
            None => {}
        }
        if metadata.len() == 0 {
            return ArtifactState::Stale(StaleReason::Empty);
        }
        ArtifactState::Valid
    }

    /// Whether a stage producing `outputs` must run: any output not Valid.
    pub fn needs_run(&self, outputs: &[ArtifactKind]) -> bool {
        outputs.iter().any(|kind| {
            let state = self.state(*kind);
            if !state.is_valid() {
                debug!(artifact = %kind, ?state, "artifact requires regeneration");
            }
            !state.is_valid()
        })
    }

    /// Whether `kind` was produced earlier in this run.
    pub fn was_refreshed(&self, kind: ArtifactKind) -> bool {
        self.refreshed.contains(&kind)
    }

    /// Marks `outputs` as being produced, persisting the manifest first.
    pub fn begin(&mut self, outputs: &[ArtifactKind]) -> Result<(), FppError> {
        let started_at = Utc::now().to_rfc3339();
        for kind in outputs.iter().filter(|kind| kind.is_persistent()) {
            self.manifest.entries.insert(
                self.key(*kind),
                ManifestEntry::InProgress {
                    started_at: started_at.clone(),
                },
            );
        }
        self.persist()
    }

    /// Records `outputs` as finished from the current inputs.
    pub fn complete(&mut self, outputs: &[ArtifactKind]) -> Result<(), FppError> {
        let completed_at = Utc::now().to_rfc3339();
        for kind in outputs.iter().filter(|kind| kind.is_persistent()) {
            self.manifest.entries.insert(
                self.key(*kind),
                ManifestEntry::Complete {
                    fingerprint: self.fingerprints.get(*kind).map(str::to_string),
                    completed_at: completed_at.clone(),
                },
            );
            self.refreshed.insert(*kind);
        }
        self.persist()
    }

    fn key(&self, kind: ArtifactKind) -> String {
        kind.file_name(self.layout.ichrone())
            .unwrap_or_else(|| kind.to_string())
    }

    fn persist(&self) -> Result<(), FppError> {
        let bytes = to_canonical_json_bytes(&self.manifest)?;
        write_atomic(&self.manifest_path, &bytes)
    }
}
