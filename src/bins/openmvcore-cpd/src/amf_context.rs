//! Subscriber context store
//!
//! One [`SubscriberContext`] per identity, overwritten on every registration
//! attempt. Entries only go away through [`SubscriberStore::remove`].

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use chrono::{DateTime, Utc};
use serde::Serialize;

/// Auth result
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AuthResult {
    Pass,
    Fail,
}

/// Registration status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RegistrationStatus {
    Registered,
    AuthFailed,
}

impl From<AuthResult> for RegistrationStatus {
    fn from(result: AuthResult) -> Self {
        match result {
            AuthResult::Pass => RegistrationStatus::Registered,
            AuthResult::Fail => RegistrationStatus::AuthFailed,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SubscriberContext {
    pub imsi: String,
    /// Transient identifier assigned by the access node
    pub ran_ue_id: String,
    /// Transport address of the access node that carried the attempt
    pub access_peer: SocketAddr,
    pub auth_result: AuthResult,
    pub status: RegistrationStatus,
    pub created_at: DateTime<Utc>,
    pub last_seen: DateTime<Utc>,
}

#[derive(Debug, Default)]
pub struct SubscriberStore {
    ue_list: RwLock<HashMap<String, SubscriberContext>>,
}

impl SubscriberStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> RwLockReadGuard<'_, HashMap<String, SubscriberContext>> {
        self.ue_list.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<String, SubscriberContext>> {
        self.ue_list.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Record the outcome of a registration attempt
    pub fn upsert(
        &self,
        imsi: &str,
        ran_ue_id: &str,
        access_peer: SocketAddr,
        auth_result: AuthResult,
    ) -> SubscriberContext {
        let now = Utc::now();
        let mut ue_list = self.write();

        let created_at = ue_list.get(imsi).map(|ue| ue.created_at).unwrap_or(now);
        let ue = SubscriberContext {
            imsi: imsi.to_string(),
            ran_ue_id: ran_ue_id.to_string(),
            access_peer,
            auth_result,
            status: auth_result.into(),
            created_at,
            last_seen: now,
        };

        if ue_list.insert(imsi.to_string(), ue.clone()).is_none() {
            log::info!("[Added] Number of AMF-UEs is now {}", ue_list.len());
        }
        ue
    }

    pub fn find(&self, imsi: &str) -> Option<SubscriberContext> {
        self.read().get(imsi).cloned()
    }

    /// Snapshot of every context, ordered by identity
    pub fn list(&self) -> Vec<SubscriberContext> {
        let mut list: Vec<_> = self.read().values().cloned().collect();
        list.sort_by(|a, b| a.imsi.cmp(&b.imsi));
        list
    }

    pub fn remove(&self, imsi: &str) -> Option<SubscriberContext> {
        let mut ue_list = self.write();
        let ue = ue_list.remove(imsi)?;
        log::info!("[Removed] Number of AMF-UEs is now {}", ue_list.len());
        Some(ue)
    }

    pub fn count(&self) -> usize {
        self.read().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn gnb() -> SocketAddr {
        "192.0.2.1:38412".parse().unwrap()
    }

    #[test]
    fn test_upsert_preserves_created_at() {
        let store = SubscriberStore::new();
        let first = store.upsert("001010123456789", "1", gnb(), AuthResult::Fail);
        assert_eq!(first.status, RegistrationStatus::AuthFailed);
        assert_eq!(first.access_peer, gnb());

        let second = store.upsert("001010123456789", "2", gnb(), AuthResult::Pass);
        assert_eq!(second.created_at, first.created_at);
        assert!(second.last_seen >= first.last_seen);
        assert_eq!(second.status, RegistrationStatus::Registered);
        assert_eq!(second.ran_ue_id, "2");
        assert_eq!(store.count(), 1);
    }

    #[test]
    fn test_list_and_remove() {
        let store = SubscriberStore::new();
        store.upsert("001010987654321", "1", gnb(), AuthResult::Pass);
        store.upsert("001010123456789", "2", gnb(), AuthResult::Pass);

        let list = store.list();
        assert_eq!(list.len(), 2);
        assert_eq!(list[0].imsi, "001010123456789");

        assert!(store.remove("001010123456789").is_some());
        assert!(store.remove("001010123456789").is_none());
        assert!(store.find("001010123456789").is_none());
        assert_eq!(store.count(), 1);
    }

    #[test]
    fn test_upsert_after_poisoned_lock() {
        let store = Arc::new(SubscriberStore::new());
        let poisoner = store.clone();
        let _ = std::thread::spawn(move || {
            let _guard = poisoner.ue_list.write().unwrap();
            panic!("poison the subscriber list");
        })
        .join();
        assert!(store.ue_list.is_poisoned());

        store.upsert("001010123456789", "1", gnb(), AuthResult::Pass);
        assert_eq!(store.count(), 1);
        assert_eq!(
            store.find("001010123456789").map(|ue| ue.status),
            Some(RegistrationStatus::Registered)
        );
    }
}
