//! Session / identity provider.
//!
//! The record store and the form controller never read identity from global
//! state; they are handed an [`IdentityProvider`] at construction. Sign-in
//! mechanics live outside this workspace and drive a [`SessionHandle`].

use tokio::sync::watch;

use crate::error::{Error, Result};
use crate::models::OwnerId;

/// Current identity plus whether the provider is still settling.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionState {
    pub owner: Option<OwnerId>,
    /// True until the provider has decided whether anyone is signed in.
    pub settling: bool,
}

impl Default for SessionState {
    fn default() -> Self {
        Self {
            owner: None,
            settling: true,
        }
    }
}

/// Source of the signed-in owner.
pub trait IdentityProvider: Send + Sync {
    /// The signed-in owner, if any.
    fn current(&self) -> Option<OwnerId>;

    /// True while the provider has not yet resolved the session.
    fn is_settling(&self) -> bool;

    /// The signed-in owner, or [`Error::StoreUnavailable`].
    fn require(&self) -> Result<OwnerId> {
        self.current().ok_or(Error::StoreUnavailable)
    }
}

/// Watch-channel backed session, cheap to clone and share.
#[derive(Clone)]
pub struct SessionHandle {
    tx: std::sync::Arc<watch::Sender<SessionState>>,
}

impl SessionHandle {
    /// A session that is still settling with nobody signed in.
    pub fn new() -> Self {
        let (tx, _) = watch::channel(SessionState::default());
        Self {
            tx: std::sync::Arc::new(tx),
        }
    }

    /// A settled session already signed in as `owner`.
    pub fn signed_in(owner: OwnerId) -> Self {
        let handle = Self::new();
        handle.sign_in(owner);
        handle
    }

    pub fn sign_in(&self, owner: OwnerId) {
        tracing::info!(owner = %owner, "Session signed in");
        self.tx.send_replace(SessionState {
            owner: Some(owner),
            settling: false,
        });
    }

    pub fn sign_out(&self) {
        tracing::info!("Session signed out");
        self.tx.send_replace(SessionState {
            owner: None,
            settling: false,
        });
    }

    /// Mark the session resolved without changing the owner.
    pub fn settle(&self) {
        self.tx.send_modify(|state| state.settling = false);
    }

    /// Receiver that observes every session change.
    pub fn watch(&self) -> watch::Receiver<SessionState> {
        self.tx.subscribe()
    }
}

impl Default for SessionHandle {
    fn default() -> Self {
        Self::new()
    }
}

impl IdentityProvider for SessionHandle {
    fn current(&self) -> Option<OwnerId> {
        self.tx.borrow().owner.clone()
    }

    fn is_settling(&self) -> bool {
        self.tx.borrow().settling
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_session_is_settling_and_anonymous() {
        let session = SessionHandle::new();
        assert!(session.is_settling());
        assert!(session.current().is_none());
        assert!(matches!(session.require(), Err(Error::StoreUnavailable)));
    }

    #[test]
    fn test_sign_in_and_out() {
        let session = SessionHandle::new();
        let owner = OwnerId::new("u1").unwrap();
        session.sign_in(owner.clone());
        assert!(!session.is_settling());
        assert_eq!(session.require().unwrap(), owner);
        session.sign_out();
        assert!(session.current().is_none());
    }

    #[test]
    fn test_settle_keeps_owner() {
        let session = SessionHandle::new();
        session.settle();
        assert!(!session.is_settling());
        assert!(session.current().is_none());
    }

    #[tokio::test]
    async fn test_watch_observes_changes() {
        let session = SessionHandle::new();
        let mut rx = session.watch();
        let clone = session.clone();
        clone.sign_in(OwnerId::new("u2").unwrap());
        rx.changed().await.unwrap();
        assert_eq!(rx.borrow().owner.as_ref().unwrap().as_str(), "u2");
    }
}
