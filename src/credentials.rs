// Session-scoped credential storage
use crate::error::{EngineError, EngineResult};
use std::fmt;
use std::sync::RwLock;

/// Tenant application id and API key pair
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub tenant_id: String,
    pub api_key: String,
}

impl Credentials {
    pub fn new(tenant_id: impl Into<String>, api_key: impl Into<String>) -> EngineResult<Self> {
        let tenant_id = tenant_id.into().trim().to_string();
        let api_key = api_key.into().trim().to_string();
        if tenant_id.is_empty() || api_key.is_empty() {
            return Err(EngineError::validation(
                "credentials require both an application id and an API key",
            ));
        }
        Ok(Self { tenant_id, api_key })
    }
}

// Never print the key, even in debug output
impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("tenant_id", &self.tenant_id)
            .field("api_key", &"<redacted>")
            .finish()
    }
}

/// Which credential pair a target is read from or written to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Tenant {
    #[default]
    Primary,
    Secondary,
}

/// In-memory credential store with an explicit lifecycle.
///
/// Created at session start, read-only while an operation runs, and
/// emptied by [`CredentialStore::clear`]. Nothing is persisted.
#[derive(Debug, Default)]
pub struct CredentialStore {
    primary: RwLock<Option<Credentials>>,
    destination: RwLock<Option<Credentials>>,
}

impl CredentialStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_primary(credentials: Credentials) -> Self {
        let store = Self::new();
        store.set_primary(credentials);
        store
    }

    pub fn set_primary(&self, credentials: Credentials) {
        *self.primary.write().unwrap_or_else(|e| e.into_inner()) = Some(credentials);
    }

    pub fn set_destination(&self, credentials: Credentials) {
        *self.destination.write().unwrap_or_else(|e| e.into_inner()) = Some(credentials);
    }

    pub fn primary(&self) -> EngineResult<Credentials> {
        self.primary
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
            .ok_or_else(|| EngineError::validation("credentials are missing"))
    }

    /// Destination pair, if one was supplied and it differs from the primary pair
    pub fn destination(&self) -> Option<Credentials> {
        let destination = self
            .destination
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()?;
        match self.primary() {
            Ok(primary) if primary == destination => None,
            _ => Some(destination),
        }
    }

    pub fn is_connected(&self) -> bool {
        self.primary
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .is_some()
    }

    /// Forget every stored pair
    pub fn clear(&self) {
        *self.primary.write().unwrap_or_else(|e| e.into_inner()) = None;
        *self.destination.write().unwrap_or_else(|e| e.into_inner()) = None;
    }
}
