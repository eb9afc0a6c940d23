//! Signed-in user identity shared with the poll loop.
//!
//! # Invariants
//! - `None` means nobody is signed in.
//! - Every change is observable by subscribers; dropping every `Identity`
//!   clone closes the subscription.

use log::info;
use std::sync::Arc;
use tokio::sync::watch;

pub type UserId = String;

/// Observable current-user slot.
#[derive(Debug, Clone)]
pub struct Identity {
    tx: Arc<watch::Sender<Option<UserId>>>,
}

impl Identity {
    pub fn new(initial: Option<UserId>) -> Self {
        let (tx, _rx) = watch::channel(initial);
        Self { tx: Arc::new(tx) }
    }

    pub fn signed_in(user_id: impl Into<UserId>) -> Self {
        Self::new(Some(user_id.into()))
    }

    pub fn signed_out() -> Self {
        Self::new(None)
    }

    pub fn current_user_id(&self) -> Option<UserId> {
        self.tx.borrow().clone()
    }

    /// Switches the active user. No-op when `user_id` is already active.
    pub fn sign_in(&self, user_id: impl Into<UserId>) {
        let user_id = user_id.into();
        let changed = self.tx.send_if_modified(|current| {
            if current.as_deref() == Some(user_id.as_str()) {
                return false;
            }
            *current = Some(user_id.clone());
            true
        });
        if changed {
            info!("event=identity_change module=identity status=ok signed_in=true");
        }
    }

    pub fn sign_out(&self) {
        let changed = self.tx.send_if_modified(|current| current.take().is_some());
        if changed {
            info!("event=identity_change module=identity status=ok signed_in=false");
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<Option<UserId>> {
        self.tx.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::Identity;

    #[test]
    fn sign_in_and_out_update_current_user() {
        let identity = Identity::signed_out();
        assert_eq!(identity.current_user_id(), None);

        identity.sign_in("op-7");
        assert_eq!(identity.current_user_id().as_deref(), Some("op-7"));

        identity.sign_out();
        assert_eq!(identity.current_user_id(), None);
    }

    #[test]
    fn repeated_sign_in_does_not_notify() {
        let identity = Identity::signed_in("op-7");
        let rx = identity.subscribe();
        identity.sign_in("op-7");
        assert!(!rx.has_changed().unwrap());
        identity.sign_in("op-8");
        assert!(rx.has_changed().unwrap());
    }
}
