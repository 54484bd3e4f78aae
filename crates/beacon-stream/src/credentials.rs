//! Bearer credential sources.
//!
//! The channel asks its [`CredentialProvider`] for a token at the start of
//! every connection attempt and never caches it, so a token that appears or
//! changes between attempts is used on the next one.

use std::sync::Arc;

use parking_lot::RwLock;
use secrecy::{ExposeSecret, SecretString};

/// Supplies the bearer token for a connection attempt.
pub trait CredentialProvider: Send + Sync {
    /// Current token, or `None` if the user is not signed in yet.
    fn credential(&self) -> Option<SecretString>;
}

impl<F> CredentialProvider for F
where
    F: Fn() -> Option<SecretString> + Send + Sync,
{
    fn credential(&self) -> Option<SecretString> {
        self()
    }
}

/// Shared, settable token holder.
///
/// Clones share the same slot: the login flow keeps one clone and calls
/// [`set`](Self::set), the channel reads through another.
#[derive(Clone, Default)]
pub struct CredentialSlot {
    token: Arc<RwLock<Option<SecretString>>>,
}

impl CredentialSlot {
    /// Create an empty slot.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a slot holding `token`.
    pub fn with_token(token: impl Into<String>) -> Self {
        let slot = Self::new();
        slot.set(token);
        slot
    }

    /// Store a token, replacing any previous one. An empty token clears the slot.
    pub fn set(&self, token: impl Into<String>) {
        let token: String = token.into();
        *self.token.write() = (!token.is_empty()).then(|| SecretString::from(token));
    }

    /// Remove the token (e.g. on sign-out).
    pub fn clear(&self) {
        *self.token.write() = None;
    }

    /// Whether a token is present.
    pub fn is_set(&self) -> bool {
        self.token.read().is_some()
    }
}

impl CredentialProvider for CredentialSlot {
    fn credential(&self) -> Option<SecretString> {
        self.token
            .read()
            .as_ref()
            .map(|token| SecretString::from(token.expose_secret().to_owned()))
    }
}

impl std::fmt::Debug for CredentialSlot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CredentialSlot")
            .field("is_set", &self.is_set())
            .finish()
    }
}
