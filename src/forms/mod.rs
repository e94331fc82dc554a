//! Entry forms: raw text fields, validation into request bodies, and guarded
//! submission.
//!
//! Validation always runs before anything is sent; a form that fails it
//! never reaches the network and keeps its field values.

pub mod budget;
pub mod goal;
pub mod transaction;

use std::sync::atomic::{AtomicBool, Ordering};

use tracing::debug;

use crate::error::ClientError;

pub use budget::CreateBudgetForm;
pub use goal::CreateGoalForm;
pub use transaction::AddTransactionForm;

/// Lets at most one submission of a form be in flight.
#[derive(Debug, Default)]
pub struct SubmitGuard {
    busy: AtomicBool,
}

impl SubmitGuard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claims the guard, or `None` while another submission holds it.
    pub fn try_acquire(&self) -> Option<SubmitPermit<'_>> {
        self.busy
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| SubmitPermit { guard: self })
    }

    /// Like [`try_acquire`](Self::try_acquire), mapping a held guard to [`ClientError::Busy`].
    pub fn acquire(&self) -> Result<SubmitPermit<'_>, ClientError> {
        self.try_acquire().ok_or_else(|| {
            debug!("submission already in flight");
            ClientError::Busy
        })
    }

    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::Acquire)
    }
}

/// Releases the guard when dropped.
#[derive(Debug)]
pub struct SubmitPermit<'a> {
    guard: &'a SubmitGuard,
}

impl Drop for SubmitPermit<'_> {
    fn drop(&mut self) {
        self.guard.busy.store(false, Ordering::Release);
    }
}

/// Trims a text field, `None` when blank.
pub(crate) fn non_blank(value: &str) -> Option<&str> {
    let value = value.trim();
    (!value.is_empty()).then_some(value)
}
