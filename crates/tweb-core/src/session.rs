#![forbid(unsafe_code)]

//! Per-tab session tokens.
//!
//! Several browser tabs can share one server-side session. Every request
//! carries a token that is stable for the lifetime of a tab and distinct
//! across tabs, so the server can keep per-tab state apart.
//!
//! # Construction rules
//!
//! [`TabSession::resolve`] decides, in order:
//!
//! 1. a token propagated through an explicit "open in new tab" link wins;
//! 2. otherwise a token already held in the tab's storage is reused;
//! 3. otherwise a fresh token is minted.
//!
//! The resolved token is written back to storage so reloads keep it.

use uuid::Uuid;

/// Storage key under which the token is persisted.
pub const STORAGE_KEY: &str = "tweb.tab";

/// Tab-scoped key/value storage (a browser's `sessionStorage`).
pub trait TabStorage {
    fn get(&self, key: &str) -> Option<String>;
    fn set(&mut self, key: &str, value: &str);
}

/// In-memory [`TabStorage`] for hosts without one and for tests.
#[derive(Debug, Clone, Default)]
pub struct MemoryTabStorage {
    entries: Vec<(String, String)>,
}

impl MemoryTabStorage {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl TabStorage for MemoryTabStorage {
    fn get(&self, key: &str) -> Option<String> {
        self.entries
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.clone())
    }

    fn set(&mut self, key: &str, value: &str) {
        match self.entries.iter_mut().find(|(k, _)| k == key) {
            Some(slot) => slot.1 = value.to_string(),
            None => self.entries.push((key.to_string(), value.to_string())),
        }
    }
}

/// How a [`TabSession`] came to be.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TabOrigin {
    /// Minted for this tab.
    Minted,
    /// Reused from tab storage.
    Restored,
    /// Handed over by the tab that opened this one.
    Propagated,
}

/// The per-tab session token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TabSession {
    token: String,
    origin: TabOrigin,
}

impl TabSession {
    /// Mint a fresh token.
    #[must_use]
    pub fn mint() -> Self {
        Self {
            token: Uuid::new_v4().simple().to_string(),
            origin: TabOrigin::Minted,
        }
    }

    /// Wrap a known token.
    #[must_use]
    pub fn with_token(token: impl Into<String>, origin: TabOrigin) -> Self {
        Self {
            token: token.into(),
            origin,
        }
    }

    /// Apply the construction rules and persist the result.
    pub fn resolve(storage: &mut dyn TabStorage, propagated: Option<&str>) -> Self {
        let session = match propagated.map(str::trim).filter(|t| !t.is_empty()) {
            Some(token) => Self::with_token(token, TabOrigin::Propagated),
            None => match storage.get(STORAGE_KEY).filter(|t| !t.is_empty()) {
                Some(token) => Self::with_token(token, TabOrigin::Restored),
                None => Self::mint(),
            },
        };
        storage.set(STORAGE_KEY, &session.token);
        session
    }

    #[must_use]
    pub fn token(&self) -> &str {
        &self.token
    }

    #[must_use]
    pub fn origin(&self) -> TabOrigin {
        self.origin
    }
}
