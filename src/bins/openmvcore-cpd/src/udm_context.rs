//! Subscriber credential store
//!
//! Maps a permanent subscriber identity (IMSI) to its shared secret. Lookups
//! are synchronous and never touch the network.

use std::collections::HashMap;
use std::sync::RwLock;

use crate::config::SubscriberEntry;

#[derive(Debug, Default)]
pub struct CredentialStore {
    secrets: RwLock<HashMap<String, String>>,
}

impl CredentialStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_entries(entries: &[SubscriberEntry]) -> Self {
        let store = Self::new();
        for entry in entries {
            store.provision(&entry.imsi, &entry.secret);
        }
        store
    }

    /// Stored secret for `imsi`
    pub fn secret(&self, imsi: &str) -> Option<String> {
        self.secrets.read().ok()?.get(imsi).cloned()
    }

    /// Add or replace a credential
    pub fn provision(&self, imsi: &str, secret: &str) {
        if let Ok(mut secrets) = self.secrets.write() {
            if secrets.insert(imsi.to_string(), secret.to_string()).is_none() {
                log::debug!("[{}] Credential provisioned", imsi);
            } else {
                log::debug!("[{}] Credential replaced", imsi);
            }
        }
    }

    pub fn remove(&self, imsi: &str) -> bool {
        match self.secrets.write() {
            Ok(mut secrets) => secrets.remove(imsi).is_some(),
            Err(_) => false,
        }
    }

    pub fn len(&self) -> usize {
        self.secrets.read().map(|s| s.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
