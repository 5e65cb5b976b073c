//! The persisted authentication flag.
//!
//! Authentication itself happens elsewhere; the widget only records that the
//! user is signed in so navigation can route around the login screen, and
//! clears the record on logout.

use std::sync::Arc;

use crate::error::Result;
use crate::storage::Storage;

const AUTH_KEY: &str = "isAuthenticated";

/// Reads and writes the `isAuthenticated` flag.
pub struct AuthSession {
    storage: Arc<dyn Storage>,
}

impl AuthSession {
    /// Creates a session over `storage`.
    pub fn new(storage: Arc<dyn Storage>) -> Self {
        Self { storage }
    }

    /// Returns true if the flag is set.
    pub fn is_authenticated(&self) -> Result<bool> {
        Ok(self.storage.get(AUTH_KEY)?.as_deref() == Some("true"))
    }

    /// Sets the flag.
    pub fn login(&self) -> Result<()> {
        self.storage.set(AUTH_KEY, "true")
    }

    /// Clears the flag.
    pub fn logout(&self) -> Result<()> {
        self.storage.remove(AUTH_KEY)
    }
}
