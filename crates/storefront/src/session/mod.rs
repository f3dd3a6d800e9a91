//! Session state: who is logged in, derived from the stored credential.
//!
//! [`Session`] is the single source of truth for the login flag. It never
//! asks the network; the flag is a pure function of the stored credential,
//! recomputed whenever the credential changes (locally or in another tab).
//!
//! Subscribers get a [`watch::Receiver`] whose value is updated before
//! `set_credential`/`clear_credential` return, so a reader never observes a
//! stale status after a transition. Notifications fire only on actual
//! changes.
//!
//! State that belongs to one account registers a [`SessionObserver`]. It is
//! told synchronously, inside the transition, when the session ends or is
//! replaced by another account's, so no path that clears the credential can
//! leave that state behind.

mod claims;
mod token_store;

pub use claims::{DecodeError, decode_claims};
pub use token_store::{CREDENTIAL_KEY, TokenStore};

use std::sync::{Mutex, PoisonError, Weak};

use secrecy::ExposeSecret;
use tokio::sync::watch;
use tracing::{debug, warn};

use tienda_core::IdentityClaims;

use crate::error::{self, ApiError, StoreError};
use crate::storage::StorageEvent;

/// Current authentication status.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum SessionStatus {
    #[default]
    LoggedOut,
    /// Logged in; the claims are untrusted display data.
    LoggedIn(IdentityClaims),
}

impl SessionStatus {
    #[must_use]
    pub const fn is_logged_in(&self) -> bool {
        matches!(self, Self::LoggedIn(_))
    }

    #[must_use]
    pub const fn claims(&self) -> Option<&IdentityClaims> {
        match self {
            Self::LoggedIn(claims) => Some(claims),
            Self::LoggedOut => None,
        }
    }
}

/// Per-account state that must not outlive the session it was loaded for.
pub trait SessionObserver: Send + Sync {
    /// The session logged out, or another account logged in over it.
    fn session_ended(&self);
}

/// Session state owner.
pub struct Session {
    tokens: TokenStore,
    status: watch::Sender<SessionStatus>,
    observers: Mutex<Vec<Weak<dyn SessionObserver>>>,
}

impl Session {
    /// Create the session and restore it from any stored credential.
    #[must_use]
    pub fn new(tokens: TokenStore) -> Self {
        let (status, _) = watch::channel(SessionStatus::LoggedOut);
        let session = Self {
            tokens,
            status,
            observers: Mutex::new(Vec::new()),
        };
        session.resync();
        session
    }

    /// Store a new credential and recompute the status.
    ///
    /// A credential that does not decode logs the session out, exactly as
    /// [`Session::clear_credential`] would, and yields `Ok(None)`.
    ///
    /// # Errors
    ///
    /// Returns an error if the credential cannot be persisted.
    pub fn set_credential(&self, token: &str) -> Result<Option<IdentityClaims>, StoreError> {
        let Some(claims) = self.decode(token) else {
            return Ok(None);
        };
        self.tokens.set(token).map_err(ApiError::from)?;
        self.publish(SessionStatus::LoggedIn(claims.clone()));
        Ok(Some(claims))
    }

    /// Remove the credential and mark the session logged out.
    ///
    /// Failing to delete the stored value is logged; the in-memory status is
    /// reset regardless.
    pub fn clear_credential(&self) {
        if let Err(e) = self.tokens.clear() {
            warn!(error = %e, "Failed to remove stored credential");
        }
        self.publish(SessionStatus::LoggedOut);
    }

    /// Decode the claims of `token`.
    ///
    /// On failure the session is cleared and `None` returned; decode errors
    /// are never surfaced to callers.
    pub fn decode(&self, token: &str) -> Option<IdentityClaims> {
        match decode_claims(token) {
            Ok(claims) => Some(claims),
            Err(e) => {
                warn!(error = %e, "Discarding undecodable credential");
                self.clear_credential();
                None
            }
        }
    }

    /// Cached login flag.
    #[must_use]
    pub fn is_logged_in(&self) -> bool {
        self.status.borrow().is_logged_in()
    }

    /// Claims of the current session, if any.
    #[must_use]
    pub fn claims(&self) -> Option<IdentityClaims> {
        self.status.borrow().claims().cloned()
    }

    /// Snapshot of the current status.
    #[must_use]
    pub fn status(&self) -> SessionStatus {
        self.status.borrow().clone()
    }

    /// Subscribe to status changes.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<SessionStatus> {
        self.status.subscribe()
    }

    /// Register `observer` for session ends. Dropped observers are pruned.
    pub fn observe(&self, observer: Weak<dyn SessionObserver>) {
        let mut observers = self
            .observers
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        observers.retain(|o| o.strong_count() > 0);
        observers.push(observer);
    }

    /// The credential store backing this session.
    #[must_use]
    pub const fn token_store(&self) -> &TokenStore {
        &self.tokens
    }

    /// Recompute the status from storage. Returns whether it changed.
    pub fn resync(&self) -> bool {
        let Some(token) = self.tokens.get() else {
            return self.publish(SessionStatus::LoggedOut);
        };
        match decode_claims(token.expose_secret()) {
            Ok(claims) => self.publish(SessionStatus::LoggedIn(claims)),
            Err(e) => {
                warn!(error = %e, "Stored credential does not decode, clearing it");
                if let Err(e) = self.tokens.clear() {
                    warn!(error = %e, "Failed to remove stored credential");
                }
                self.publish(SessionStatus::LoggedOut)
            }
        }
    }

    /// React to a storage change made by another tab.
    ///
    /// Returns whether the session status changed.
    pub fn handle_storage_event(&self, event: &StorageEvent) -> bool {
        if !TokenStore::is_credential_event(event) {
            return false;
        }
        debug!(
            present = event.new_value.is_some(),
            "Credential changed in another tab"
        );
        self.resync()
    }

    fn publish(&self, next: SessionStatus) -> bool {
        let mut ended = false;
        let changed = self.status.send_if_modified(|current| {
            if *current == next {
                return false;
            }
            ended = match (&*current, &next) {
                (SessionStatus::LoggedIn(prev), SessionStatus::LoggedIn(claims)) => {
                    prev.sub != claims.sub
                }
                (SessionStatus::LoggedIn(_), SessionStatus::LoggedOut) => true,
                (SessionStatus::LoggedOut, _) => false,
            };
            *current = next;
            true
        });

        if ended {
            self.notify_ended();
        }

        if changed {
            match &*self.status.borrow() {
                SessionStatus::LoggedIn(claims) => {
                    debug!(subject = %claims.sub, "Session active");
                    error::set_sentry_user(&claims.sub);
                }
                SessionStatus::LoggedOut => {
                    debug!("Session cleared");
                    error::clear_sentry_user();
                }
            }
        }
        changed
    }

    fn notify_ended(&self) {
        let observers: Vec<_> = self
            .observers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .filter_map(Weak::upgrade)
            .collect();
        for observer in observers {
            observer.session_ended();
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;
    use crate::storage::{KeyValueStorage, MemoryStorage};
    use crate::test_support::fake_token;

    fn session_over(storage: &MemoryStorage) -> Session {
        Session::new(TokenStore::new(Arc::new(storage.tab())))
    }

    #[test]
    fn test_starts_logged_out() {
        let session = session_over(&MemoryStorage::new());
        assert!(!session.is_logged_in());
        assert!(session.claims().is_none());
    }

    #[test]
    fn test_set_credential_decodes_identity() {
        let session = session_over(&MemoryStorage::new());

        let claims = session
            .set_credential(&fake_token("a@b.com", "Ana"))
            .unwrap()
            .unwrap();

        assert_eq!(claims.name.as_deref(), Some("Ana"));
        assert!(session.is_logged_in());
        assert_eq!(session.claims().unwrap().display_name(), "Ana");
        assert!(session.token_store().get().is_some());
    }

    #[test]
    fn test_malformed_credentials_clear_the_session() {
        for bad in ["no-dots", "h.!!!.s", "h.bm90IGpzb24.s", "a.b"] {
            let session = session_over(&MemoryStorage::new());
            session.set_credential(&fake_token("a@b.com", "Ana")).unwrap();

            assert_eq!(session.set_credential(bad).unwrap(), None, "token {bad}");
            assert!(!session.is_logged_in());
            assert!(session.token_store().get().is_none());
        }
    }

    #[test]
    fn test_clear_credential() {
        let session = session_over(&MemoryStorage::new());
        session.set_credential(&fake_token("a@b.com", "Ana")).unwrap();

        session.clear_credential();

        assert!(!session.is_logged_in());
        assert_eq!(session.status(), SessionStatus::LoggedOut);
        assert!(session.token_store().get().is_none());
    }

    #[test]
    fn test_restores_from_storage() {
        let storage = MemoryStorage::new();
        storage.set(CREDENTIAL_KEY, &fake_token("a@b.com", "Ana")).unwrap();

        let session = session_over(&storage);
        assert!(session.is_logged_in());
    }

    #[test]
    fn test_restore_discards_corrupt_credential() {
        let storage = MemoryStorage::new();
        storage.set(CREDENTIAL_KEY, "garbage").unwrap();

        let session = session_over(&storage);

        assert!(!session.is_logged_in());
        assert_eq!(storage.get(CREDENTIAL_KEY).unwrap(), None);
    }

    #[test]
    fn test_subscribers_see_transitions_once() {
        let session = session_over(&MemoryStorage::new());
        let mut rx = session.subscribe();
        let token = fake_token("a@b.com", "Ana");

        session.set_credential(&token).unwrap();
        assert!(rx.has_changed().unwrap());
        assert!(rx.borrow_and_update().is_logged_in());

        // Same credential again is not a change
        session.set_credential(&token).unwrap();
        assert!(!rx.has_changed().unwrap());

        session.clear_credential();
        assert!(rx.has_changed().unwrap());
        assert!(!rx.borrow_and_update().is_logged_in());
    }

    #[test]
    fn test_storage_event_from_other_tab() {
        let storage = MemoryStorage::new();
        let this_tab = session_over(&storage);
        let other_tab = session_over(&storage);
        let mut events = this_tab.token_store().subscribe();

        other_tab.set_credential(&fake_token("a@b.com", "Ana")).unwrap();
        let event = events.try_recv().unwrap();
        assert!(this_tab.handle_storage_event(&event));
        assert!(this_tab.is_logged_in());

        other_tab.clear_credential();
        let event = events.try_recv().unwrap();
        assert!(this_tab.handle_storage_event(&event));
        assert!(!this_tab.is_logged_in());
    }

    #[derive(Default)]
    struct EndCounter(AtomicUsize);

    impl SessionObserver for EndCounter {
        fn session_ended(&self) {
            self.0.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn observed(session: &Session) -> Arc<EndCounter> {
        let counter = Arc::new(EndCounter::default());
        let weak: Weak<dyn SessionObserver> = Arc::downgrade(&counter) as Weak<EndCounter>;
        session.observe(weak);
        counter
    }

    #[test]
    fn test_observers_told_when_session_ends() {
        let session = session_over(&MemoryStorage::new());
        let ends = observed(&session);

        session.set_credential(&fake_token("a@b.com", "Ana")).unwrap();
        assert_eq!(ends.0.load(Ordering::SeqCst), 0);

        session.clear_credential();
        assert_eq!(ends.0.load(Ordering::SeqCst), 1);

        // Already logged out
        session.clear_credential();
        assert_eq!(ends.0.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_failed_decode_ends_session_for_observers() {
        let session = session_over(&MemoryStorage::new());
        let ends = observed(&session);
        session.set_credential(&fake_token("a@b.com", "Ana")).unwrap();

        assert!(session.decode("garbage").is_none());

        assert!(!session.is_logged_in());
        assert_eq!(ends.0.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_account_switch_ends_previous_session() {
        let session = session_over(&MemoryStorage::new());
        let ends = observed(&session);
        session.set_credential(&fake_token("a@b.com", "Ana")).unwrap();

        // Refreshed claims for the same account are not an end
        session.set_credential(&fake_token("a@b.com", "Ana María")).unwrap();
        assert_eq!(ends.0.load(Ordering::SeqCst), 0);

        session.set_credential(&fake_token("luis@tienda.es", "Luis")).unwrap();
        assert_eq!(ends.0.load(Ordering::SeqCst), 1);
        assert!(session.is_logged_in());
    }

    #[test]
    fn test_dropped_observers_are_skipped() {
        let session = session_over(&MemoryStorage::new());
        drop(observed(&session));
        session.set_credential(&fake_token("a@b.com", "Ana")).unwrap();

        session.clear_credential();
        let ends = observed(&session);

        assert!(!session.is_logged_in());
        assert_eq!(session.observers.lock().unwrap().len(), 1);
        assert_eq!(ends.0.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_unrelated_storage_event_is_ignored() {
        let session = session_over(&MemoryStorage::new());
        let event = StorageEvent {
            key: "theme".to_string(),
            new_value: Some("dark".to_string()),
        };

        assert!(!session.handle_storage_event(&event));
    }
}
