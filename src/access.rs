//! Session-level access control for a feed window
//!
//! The gate starts open for authenticated callers and closes the first time
//! the backing store rejects the caller's credential. It only reopens
//! through a fresh initial load.

/// Whether the caller may currently talk to the backing store
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct AccessGate {
    has_full_access: bool,
    caller_authenticated: bool,
}

impl AccessGate {
    /// Create a gate for a caller; open iff the caller is authenticated
    pub fn new(authenticated: bool) -> Self {
        Self {
            has_full_access: authenticated,
            caller_authenticated: authenticated,
        }
    }

    /// Gate for a caller with no session
    pub fn anonymous() -> Self {
        Self::new(false)
    }

    /// Close the gate after an authorization failure. Returns whether this
    /// call changed anything.
    pub fn downgrade(&mut self) -> bool {
        let was_open = self.has_full_access;
        self.has_full_access = false;
        was_open
    }

    /// Start over for a new initial load
    pub fn reset(&mut self, authenticated: bool) {
        self.has_full_access = authenticated;
        self.caller_authenticated = authenticated;
    }

    /// Polling and mutations are allowed only while this holds
    pub fn can_operate(&self) -> bool {
        self.has_full_access
    }

    pub fn has_full_access(&self) -> bool {
        self.has_full_access
    }

    pub fn caller_authenticated(&self) -> bool {
        self.caller_authenticated
    }
}
