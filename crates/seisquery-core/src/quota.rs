//! Per-request object budget and cancellation check.
//!
//! The guard is a policy object: it never performs I/O. The assembler
//! charges it after every batch of materialized objects and polls it at
//! every object boundary.

use crate::error::{Result, SearchError};
use tokio_util::sync::CancellationToken;

#[derive(Debug, Clone)]
pub struct QuotaGuard {
    count: usize,
    ceiling: Option<usize>,
    cancel: CancellationToken,
}

impl QuotaGuard {
    /// `ceiling = None` disables the object limit; cancellation still
    /// applies.
    pub fn new(ceiling: Option<usize>, cancel: CancellationToken) -> Self {
        Self {
            count: 0,
            ceiling,
            cancel,
        }
    }

    /// A guard without limit that is never cancelled.
    pub fn unlimited() -> Self {
        Self::new(None, CancellationToken::new())
    }

    pub fn count(&self) -> usize {
        self.count
    }

    pub fn ceiling(&self) -> Option<usize> {
        self.ceiling
    }

    /// Add `n` materialized objects and check the ceiling and the caller.
    /// The count keeps growing even after it crossed the ceiling so the
    /// reported total reflects the last batch.
    pub fn charge(&mut self, n: usize) -> Result<()> {
        self.count = self.count.saturating_add(n);
        self.check()
    }

    /// Fail if the ceiling was crossed or the caller disconnected.
    pub fn check(&self) -> Result<()> {
        self.checkpoint()?;
        match self.ceiling {
            Some(max) if self.count > max => {
                tracing::debug!(count = self.count, max, "object ceiling exceeded");
                Err(SearchError::QuotaExceeded { max })
            }
            _ => Ok(()),
        }
    }

    /// Fail if the caller disconnected.
    pub fn checkpoint(&self) -> Result<()> {
        if self.cancel.is_cancelled() {
            return Err(SearchError::Disconnected);
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
