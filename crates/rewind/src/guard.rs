#![forbid(unsafe_code)]

//! Reentrancy guard held for the duration of an undo/redo transition.
//!
//! Restoring a snapshot mutates the document, and the document usually
//! announces mutations on the same channels that trigger captures. While a
//! [`GuardToken`] is alive those captures are suppressed.
//!
//! The flag is an `AtomicBool` behind an `Arc` and acquisition is a
//! compare-and-swap, so the same type works when the host delivers
//! notifications from more than one thread.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// Shared flag; cloning yields another handle to the same flag.
#[derive(Clone, Default)]
pub struct ReentrancyGuard {
    held: Arc<AtomicBool>,
}

impl fmt::Debug for ReentrancyGuard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReentrancyGuard")
            .field("held", &self.is_held())
            .finish()
    }
}

impl ReentrancyGuard {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Acquire the guard. Returns `None` if it is already held.
    #[must_use]
    pub fn try_enter(&self) -> Option<GuardToken> {
        self.held
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| GuardToken {
                held: Arc::clone(&self.held),
            })
    }

    /// Is a transition currently running?
    #[must_use]
    pub fn is_held(&self) -> bool {
        self.held.load(Ordering::Acquire)
    }
}

/// Scoped ownership of a [`ReentrancyGuard`]; releases it on drop.
#[must_use = "the guard is released as soon as the token is dropped"]
pub struct GuardToken {
    held: Arc<AtomicBool>,
}

impl fmt::Debug for GuardToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GuardToken").finish_non_exhaustive()
    }
}

impl Drop for GuardToken {
    fn drop(&mut self) {
        self.held.store(false, Ordering::Release);
    }
}
