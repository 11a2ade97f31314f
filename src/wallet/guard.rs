//! Busy guard for per-session operations
//!
//! The flag is set on acquire and cleared on drop, so an early return or a
//! dropped future can never leave a session stuck busy.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::errors::{TransferError, TransferResult};

/// RAII claim on a session flag
#[derive(Debug)]
pub struct SubmissionGuard {
    flag: Arc<AtomicBool>,
}

impl SubmissionGuard {
    /// Claim `flag`, or fail with `Busy` if it is already held
    pub fn try_acquire(flag: &Arc<AtomicBool>) -> TransferResult<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .map_err(|_| TransferError::Busy)?;
        Ok(Self {
            flag: Arc::clone(flag),
        })
    }
}

impl Drop for SubmissionGuard {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::Release);
    }
}
