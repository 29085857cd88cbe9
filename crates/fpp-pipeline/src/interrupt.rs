use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use fpp_core::errors::FppError;

/// Cancellation token shared between the signal handler and the pipeline.
///
/// Backend calls are blocking, so the flag is polled at stage and bootstrap
/// iteration boundaries.
#[derive(Debug, Clone, Default)]
pub struct InterruptFlag {
    raised: Arc<AtomicBool>,
}

impl InterruptFlag {
    /// Creates a lowered flag.
    pub fn new() -> Self {
        Self::default()
    }

    /// Raises the flag. Returns true if it was already raised.
    pub fn raise(&self) -> bool {
        self.raised.swap(true, Ordering::SeqCst)
    }

    /// Whether the flag has been raised.
    pub fn is_raised(&self) -> bool {
        self.raised.load(Ordering::SeqCst)
    }

    /// Fails with `Interrupted` once the flag is raised.
    pub fn check(&self, at: &str) -> Result<(), FppError> {
        if self.is_raised() {
            return Err(FppError::interrupted("interrupted by user").with_context("at", at));
        }
        Ok(())
    }
}
