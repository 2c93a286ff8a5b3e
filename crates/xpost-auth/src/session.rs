//! Single-slot storage for the in-flight PKCE session
//!
//! The service supports one authorization attempt at a time: a new
//! authorization overwrites any prior in-flight session (last writer wins),
//! and completing the callback consumes the session exactly once. Success or
//! failure, the slot ends up empty, so a captured callback cannot be replayed.

use std::sync::Mutex;

/// Ephemeral PKCE state created when an authorization URL is generated.
#[derive(Debug, Clone)]
pub struct PkceSession {
    /// Code verifier sent during token exchange (43-128 chars)
    pub verifier: String,
    /// Anti-CSRF token echoed back by the authorization server
    pub state: String,
}

/// Process-wide single-slot session store.
#[derive(Debug, Default)]
pub struct SessionSlot {
    inner: Mutex<Option<PkceSession>>,
}

impl SessionSlot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a session, overwriting any in-flight one.
    pub fn store(&self, session: PkceSession) {
        let mut slot = self.inner.lock().expect("session slot poisoned");
        *slot = Some(session);
    }

    /// Take the session out of the slot, leaving it empty.
    ///
    /// This is the consume-once operation: callers take the session before
    /// validating it, so every completion path leaves the slot cleared.
    pub fn take(&self) -> Option<PkceSession> {
        let mut slot = self.inner.lock().expect("session slot poisoned");
        slot.take()
    }

    /// Clear the slot without reading it.
    pub fn clear(&self) {
        let mut slot = self.inner.lock().expect("session slot poisoned");
        *slot = None;
    }
}
