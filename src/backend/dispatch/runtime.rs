//! Process-wide lifecycle guard for the dispatch runtime
//!
//! The dispatch runtime's init/shutdown cycle is global state, not
//! reference-counted: one live instance per process. The guard makes a
//! second concurrent construction fail as a setup error instead of silently
//! nesting runtime lifecycles.

use crate::error::{Error, Result};
use std::sync::atomic::{AtomicBool, Ordering};

static RUNTIME_LIVE: AtomicBool = AtomicBool::new(false);

/// Token proving this instance owns the process-wide dispatch runtime
///
/// Acquired during [`DispatchStream`](super::DispatchStream) construction and
/// released when the stream is dropped.
#[derive(Debug)]
pub struct RuntimeGuard {
    _private: (),
}

impl RuntimeGuard {
    /// Claim the process-wide runtime slot.
    ///
    /// # Errors
    ///
    /// Returns [`Error::RuntimeActive`] if another dispatch instance is live.
    pub fn acquire() -> Result<Self> {
        if RUNTIME_LIVE.swap(true, Ordering::AcqRel) {
            return Err(Error::RuntimeActive);
        }
        log::debug!("dispatch runtime initialized");
        Ok(Self { _private: () })
    }
}

impl Drop for RuntimeGuard {
    fn drop(&mut self) {
        RUNTIME_LIVE.store(false, Ordering::Release);
        log::debug!("dispatch runtime shut down");
    }
}
