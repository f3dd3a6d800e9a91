//! Small primitives shared by the cart and favorites state machines.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

/// A flip of the login flag.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    LoggedIn,
    LoggedOut,
}

/// Edge detector over the login flag.
///
/// Starts from "logged out", so the first observation of a logged-in
/// session (for example a credential restored from storage) is an edge.
/// Repeated observations of the same value yield nothing.
#[derive(Debug, Default)]
pub struct EdgeDetector {
    last: AtomicBool,
}

impl EdgeDetector {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            last: AtomicBool::new(false),
        }
    }

    /// Record `logged_in` and return the transition, if it is one.
    pub fn observe(&self, logged_in: bool) -> Option<Transition> {
        let previous = self.last.swap(logged_in, Ordering::SeqCst);
        match (previous, logged_in) {
            (false, true) => Some(Transition::LoggedIn),
            (true, false) => Some(Transition::LoggedOut),
            _ => None,
        }
    }
}

/// Monotonic ticket taken before a request is sent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Ticket(u64);

/// Discards responses that are older than the last applied one.
///
/// Every request draws a [`Ticket`]; a response may overwrite shared state
/// only if its ticket is newer than that of the last response applied.
/// [`VersionGate::invalidate`] moves the watermark past every ticket issued
/// so far, so nothing already in flight can be applied afterwards.
///
/// Incremental changes (one id added to a set) use
/// [`VersionGate::try_merge`], which only rejects tickets that predate the
/// last invalidation.
#[derive(Debug, Default)]
pub struct VersionGate {
    issued: AtomicU64,
    applied: AtomicU64,
    invalidated: AtomicU64,
}

impl VersionGate {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            issued: AtomicU64::new(0),
            applied: AtomicU64::new(0),
            invalidated: AtomicU64::new(0),
        }
    }

    /// Draw the next ticket.
    pub fn ticket(&self) -> Ticket {
        Ticket(self.issued.fetch_add(1, Ordering::SeqCst) + 1)
    }

    /// Claim the right to apply the response for `ticket`.
    ///
    /// Returns `false` if a newer response was already applied.
    pub fn try_apply(&self, ticket: Ticket) -> bool {
        self.applied.fetch_max(ticket.0, Ordering::SeqCst) < ticket.0
    }

    /// Claim the right to merge the response for `ticket` into shared state.
    ///
    /// Returns `false` only if the state was invalidated after the ticket
    /// was drawn. A successful merge also supersedes older full responses.
    pub fn try_merge(&self, ticket: Ticket) -> bool {
        if self.invalidated.load(Ordering::SeqCst) >= ticket.0 {
            return false;
        }
        self.applied.fetch_max(ticket.0, Ordering::SeqCst);
        true
    }

    /// Reject every response issued so far.
    pub fn invalidate(&self) {
        let ticket = self.ticket();
        self.invalidated.fetch_max(ticket.0, Ordering::SeqCst);
        self.applied.fetch_max(ticket.0, Ordering::SeqCst);
    }
}
