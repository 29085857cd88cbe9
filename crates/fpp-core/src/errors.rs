//! Structured error types shared across the FPP crates.

use std::collections::BTreeMap;
use std::fmt::{self, Display};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Structured payload attached to every [`FppError`] variant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorInfo {
    /// Stable machine readable error code.
    pub code: String,
    /// Human readable diagnostic message.
    pub message: String,
    /// Contextual key value pairs (paths, model names, etc.).
    #[serde(default)]
    pub context: BTreeMap<String, String>,
    /// Optional hint that may help the caller resolve the issue.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hint: Option<String>,
}

impl ErrorInfo {
    /// Creates a new error payload with the provided code and message.
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            context: BTreeMap::new(),
            hint: None,
        }
    }

    /// Adds a context entry to the payload.
    pub fn with_context(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.context.insert(key.into(), value.into());
        self
    }

    /// Sets a human readable hint for remediation.
    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }
}

/// Canonical error type for the orchestrator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Error)]
#[serde(tag = "family", content = "detail")]
pub enum FppError {
    /// Malformed or incomplete target configuration.
    #[error("configuration error: {0}")]
    Configuration(ErrorInfo),
    /// A required upstream artifact is absent.
    #[error("missing artifact: {0}")]
    MissingArtifact(ErrorInfo),
    /// The user cancelled the batch.
    #[error("interrupted: {0}")]
    Interrupted(ErrorInfo),
    /// Failures raised by the delegated modeling backend.
    #[error("backend error: {0}")]
    Backend(ErrorInfo),
    /// Filesystem errors.
    #[error("io error: {0}")]
    Io(ErrorInfo),
    /// Serialization and schema errors.
    #[error("serde error: {0}")]
    Serde(ErrorInfo),
}

/// Classification used by the batch driver to decide how far a failure reaches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FailureKind {
    /// Target configuration could not be used; fatal to that target.
    Configuration,
    /// A prerequisite artifact was missing; fatal to that target.
    MissingArtifact,
    /// User cancellation; fatal to the whole batch.
    Interrupted,
    /// Anything else raised while processing a target.
    Unclassified,
}

impl Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            FailureKind::Configuration => "configuration",
            FailureKind::MissingArtifact => "missing-artifact",
            FailureKind::Interrupted => "interrupted",
            FailureKind::Unclassified => "unclassified",
        };
        f.write_str(label)
    }
}

impl Display for ErrorInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (code: {})", self.message, self.code)?;
        if !self.context.is_empty() {
            write!(f, " | context: [")?;
            for (idx, (key, value)) in self.context.iter().enumerate() {
                if idx > 0 {
                    write!(f, ", ")?;
                }
                write!(f, "{key}={value}")?;
            }
            write!(f, "]")?;
        }
        if let Some(hint) = &self.hint {
            write!(f, " | hint: {hint}")?;
        }
        Ok(())
    }
}

impl FppError {
    /// Shorthand for a configuration error.
    pub fn configuration(code: &str, message: impl Into<String>) -> Self {
        FppError::Configuration(ErrorInfo::new(code, message))
    }

    /// Shorthand for a missing-artifact error.
    pub fn missing_artifact(code: &str, message: impl Into<String>) -> Self {
        FppError::MissingArtifact(ErrorInfo::new(code, message))
    }

    /// Shorthand for a backend error.
    pub fn backend(code: &str, message: impl Into<String>) -> Self {
        FppError::Backend(ErrorInfo::new(code, message))
    }

    /// Shorthand for an I/O error.
    pub fn io(code: &str, err: impl ToString) -> Self {
        FppError::Io(ErrorInfo::new(code, err.to_string()))
    }

    /// Interrupt raised by the user.
    pub fn interrupted(message: impl Into<String>) -> Self {
        FppError::Interrupted(ErrorInfo::new("user_interrupt", message))
    }

    /// Returns a reference to the payload describing the error.
    pub fn info(&self) -> &ErrorInfo {
        match self {
            FppError::Configuration(info)
            | FppError::MissingArtifact(info)
            | FppError::Interrupted(info)
            | FppError::Backend(info)
            | FppError::Io(info)
            | FppError::Serde(info) => info,
        }
    }

    /// Returns the failure classification of this error.
    pub fn kind(&self) -> FailureKind {
        match self {
            FppError::Configuration(_) => FailureKind::Configuration,
            FppError::MissingArtifact(_) => FailureKind::MissingArtifact,
            FppError::Interrupted(_) => FailureKind::Interrupted,
            FppError::Backend(_) | FppError::Io(_) | FppError::Serde(_) => {
                FailureKind::Unclassified
            }
        }
    }

    /// Returns true when the error must abort the whole batch.
    pub fn is_interrupt(&self) -> bool {
        self.kind() == FailureKind::Interrupted
    }

    /// Adds a context entry to the payload, keeping the variant.
    pub fn with_context(self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.map_info(|info| info.with_context(key, value))
    }

    /// Sets a remediation hint, keeping the variant.
    pub fn with_hint(self, hint: impl Into<String>) -> Self {
        self.map_info(|info| info.with_hint(hint))
    }

    fn map_info(self, f: impl FnOnce(ErrorInfo) -> ErrorInfo) -> Self {
        match self {
            FppError::Configuration(info) => FppError::Configuration(f(info)),
            FppError::MissingArtifact(info) => FppError::MissingArtifact(f(info)),
            FppError::Interrupted(info) => FppError::Interrupted(f(info)),
            FppError::Backend(info) => FppError::Backend(f(info)),
            FppError::Io(info) => FppError::Io(f(info)),
            FppError::Serde(info) => FppError::Serde(f(info)),
        }
    }
}
