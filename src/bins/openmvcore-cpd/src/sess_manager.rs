//! Session manager
//!
//! Drives the per-subscriber session state machine. Store mutations happen
//! under the store lock; the lock is always released before the N4
//! exchange and re-taken to apply its outcome.

use std::net::Ipv4Addr;
use std::sync::Arc;

use chrono::Utc;

use crate::error::SessionError;
use crate::event::{DomainEvent, EventPublisher, ForwardingSessionCreated};
use crate::gsm_sm::{GsmEvent, SessionState};
use crate::pfcp_path::ForwardingRuleInstaller;
use crate::smf_context::{NewSession, QosProfile, Session, SessionStore};
use crate::ue_ip_pool::UeIpPool;

pub struct SessionManager {
    store: Arc<SessionStore>,
    pool: Arc<UeIpPool>,
    installer: Arc<dyn ForwardingRuleInstaller>,
    events: Arc<dyn EventPublisher>,
    default_qos: QosProfile,
    bearer_id: u8,
}

impl SessionManager {
    pub fn new(
        store: Arc<SessionStore>,
        pool: Arc<UeIpPool>,
        installer: Arc<dyn ForwardingRuleInstaller>,
        events: Arc<dyn EventPublisher>,
        default_qos: QosProfile,
        bearer_id: u8,
    ) -> Self {
        Self {
            store,
            pool,
            installer,
            events,
            default_qos,
            bearer_id,
        }
    }

    pub fn store(&self) -> &Arc<SessionStore> {
        &self.store
    }

    pub fn pool(&self) -> &Arc<UeIpPool> {
        &self.pool
    }

    /// Create the session for `imsi`, or return the live one unchanged
    pub async fn create_session(
        &self,
        imsi: &str,
        peer_teid: u32,
        peer_addr: Ipv4Addr,
    ) -> Result<Session, SessionError> {
        let sess = {
            let mut table = self.store.lock();
            if let Some(existing) = table.get(imsi) {
                if existing.peer_teid != peer_teid || existing.peer_addr != peer_addr {
                    log::warn!(
                        "[{}] Duplicate session request with different peer (teid=0x{:x} addr={}), keeping 0x{:x}/{}",
                        imsi,
                        peer_teid,
                        peer_addr,
                        existing.peer_teid,
                        existing.peer_addr
                    );
                } else {
                    log::debug!("[{}] Session already exists ({})", imsi, existing.state.name());
                }
                return Ok(existing.clone());
            }

            let ue_addr = self.pool.allocate()?;
            table.add(NewSession {
                imsi: imsi.to_string(),
                ue_addr,
                peer_teid,
                peer_addr,
                bearer_id: self.bearer_id,
                qos: self.default_qos,
            })
        };

        match self.installer.install(&sess).await {
            Ok(ack) => {
                let active = {
                    let mut table = self.store.lock();
                    let Some(entry) = table.get_mut(imsi) else {
                        // removed while installing; keep the address free
                        self.pool.release(sess.ue_addr);
                        return Err(SessionError::SessionNotFound);
                    };
                    entry.up_seid = Some(ack.up_seid);
                    entry.transition(GsmEvent::InstallSucceeded)?;
                    entry.clone()
                };

                log::info!(
                    "[{}] Session active (id={}, ue={}, teid=0x{:x})",
                    imsi,
                    active.session_id,
                    active.ue_addr,
                    active.local_teid
                );
                self.events.publish(DomainEvent::ForwardingSessionCreated(ForwardingSessionCreated {
                    identity: active.imsi.clone(),
                    session_id: active.session_id,
                    tunnel_id: active.local_teid,
                    address: active.ue_addr,
                    timestamp: Utc::now(),
                }));
                Ok(active)
            }
            Err(e) => {
                log::error!("[{}] Forwarding installation failed: {}", imsi, e);
                {
                    let mut table = self.store.lock();
                    if let Some(mut failed) = table.remove(imsi) {
                        let _ = failed.transition(GsmEvent::InstallFailed);
                    }
                }
                self.pool.release(sess.ue_addr);
                Err(e.into())
            }
        }
    }

    /// Tear down the session for `imsi` and return its final state
    pub async fn delete_session(&self, imsi: &str) -> Result<Session, SessionError> {
        let sess = {
            let mut table = self.store.lock();
            let entry = table.get_mut(imsi).ok_or(SessionError::SessionNotFound)?;
            match entry.state {
                SessionState::Active | SessionState::Modifying => {}
                // creation or deletion in flight
                _ => return Err(SessionError::SessionNotFound),
            }
            entry.transition(GsmEvent::DeleteRequested)?;
            entry.clone()
        };

        if let Err(e) = self.installer.uninstall(&sess).await {
            log::warn!("[{}] Forwarding teardown failed: {}", imsi, e);
        }

        let mut deleted = {
            let mut table = self.store.lock();
            table.remove(imsi).unwrap_or(sess)
        };
        self.pool.release(deleted.ue_addr);
        deleted.transition(GsmEvent::TeardownDone)?;

        log::info!("[{}] Session deleted (id={}, ue={})", imsi, deleted.session_id, deleted.ue_addr);
        Ok(deleted)
    }

    /// Replace the bearer QoS of an active session and push the new rates
    /// to the user plane. The stored QoS only changes once the user plane
    /// accepted the update.
    pub async fn modify_bearer(&self, imsi: &str, qos: QosProfile) -> Result<Session, SessionError> {
        let mut pushed = {
            let mut table = self.store.lock();
            let entry = table.get_mut(imsi).ok_or(SessionError::SessionNotFound)?;
            if entry.state != SessionState::Active {
                return Err(SessionError::InvalidState(entry.state.name()));
            }
            entry.transition(GsmEvent::ModifyRequested)?;
            entry.clone()
        };
        pushed.qos = qos;

        let result = self.installer.modify(&pushed).await;

        let mut table = self.store.lock();
        let entry = table.get_mut(imsi).ok_or(SessionError::SessionNotFound)?;
        if entry.state != SessionState::Modifying {
            // deleted while the update was in flight
            return Err(SessionError::InvalidState(entry.state.name()));
        }

        match result {
            Ok(()) => {
                entry.qos = qos;
                entry.transition(GsmEvent::ModifyApplied)?;
                log::info!("[{}] Bearer modified (qci={}, arp={})", imsi, qos.qci, qos.arp_priority);
                Ok(entry.clone())
            }
            Err(e) => {
                entry.transition(GsmEvent::ModifyFailed)?;
                log::error!("[{}] Bearer modification failed, keeping qci={}: {}", imsi, entry.qos.qci, e);
                Err(e.into())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::InstallError;
    use crate::event::{EventBus, SUBJECT_FORWARDING_CREATED};
    use crate::pfcp_path::InstallAck;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
    use std::time::Duration;
    use tokio::sync::Notify;

    #[derive(Default)]
    struct MockInstaller {
        fail: AtomicBool,
        fail_uninstall: AtomicBool,
        fail_modify: AtomicBool,
        installs: AtomicU64,
        modifies: AtomicU64,
        uninstalls: AtomicU64,
        gate: Option<Arc<Notify>>,
        uninstall_gate: Option<Arc<Notify>>,
    }

    #[async_trait]
    impl ForwardingRuleInstaller for MockInstaller {
        async fn install(&self, sess: &Session) -> Result<InstallAck, InstallError> {
            self.installs.fetch_add(1, Ordering::SeqCst);
            if let Some(gate) = &self.gate {
                gate.notified().await;
            }
            if self.fail.load(Ordering::SeqCst) {
                return Err(InstallError::Timeout(Duration::from_secs(5)));
            }
            Ok(InstallAck { up_seid: sess.cp_seid + 1000 })
        }

        async fn modify(&self, _sess: &Session) -> Result<(), InstallError> {
            self.modifies.fetch_add(1, Ordering::SeqCst);
            if self.fail_modify.load(Ordering::SeqCst) {
                return Err(InstallError::Rejected(mvc_pfcp::prelude::PfcpCause::SessionContextNotFound));
            }
            Ok(())
        }

        async fn uninstall(&self, _sess: &Session) -> Result<(), InstallError> {
            self.uninstalls.fetch_add(1, Ordering::SeqCst);
            if let Some(gate) = &self.uninstall_gate {
                gate.notified().await;
            }
            if self.fail_uninstall.load(Ordering::SeqCst) {
                return Err(InstallError::Protocol("gone".to_string()));
            }
            Ok(())
        }
    }

    const IMSI: &str = "001010123456789";
    const PEER: Ipv4Addr = Ipv4Addr::new(192, 168, 1, 10);

    fn manager_with(installer: Arc<MockInstaller>, last_octet: u8) -> (SessionManager, Arc<EventBus>) {
        let bus = Arc::new(EventBus::new());
        let pool = UeIpPool::new(Ipv4Addr::new(10, 0, 0, 1), Ipv4Addr::new(10, 0, 0, last_octet)).unwrap();
        let mgr = SessionManager::new(
            Arc::new(SessionStore::new()),
            Arc::new(pool),
            installer,
            bus.clone(),
            QosProfile::default(),
            5,
        );
        (mgr, bus)
    }

    #[tokio::test]
    async fn test_create_session_active() {
        let (mgr, bus) = manager_with(Arc::new(MockInstaller::default()), 254);
        let mut sub = bus.subscribe(&[SUBJECT_FORWARDING_CREATED]);

        let sess = mgr.create_session(IMSI, 0x100, PEER).await.unwrap();
        assert_eq!(sess.state, SessionState::Active);
        assert_eq!(sess.ue_addr, Ipv4Addr::new(10, 0, 0, 1));
        assert_eq!(sess.bearer_id, 5);
        assert_eq!(sess.up_seid, Some(sess.cp_seid + 1000));

        match sub.try_recv() {
            Some(DomainEvent::ForwardingSessionCreated(e)) => {
                assert_eq!(e.session_id, sess.session_id);
                assert_eq!(e.tunnel_id, sess.local_teid);
                assert_eq!(e.address, sess.ue_addr);
            }
            other => panic!("unexpected event: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_create_is_idempotent() {
        let installer = Arc::new(MockInstaller::default());
        let (mgr, _bus) = manager_with(installer.clone(), 254);

        let first = mgr.create_session(IMSI, 0x100, PEER).await.unwrap();
        let second = mgr.create_session(IMSI, 0x999, Ipv4Addr::new(192, 168, 1, 99)).await.unwrap();
        assert_eq!(first, second);
        assert_eq!(installer.installs.load(Ordering::SeqCst), 1);
        assert_eq!(mgr.pool().in_use_count(), 1);
    }

    #[tokio::test]
    async fn test_exhaustion_creates_nothing() {
        let (mgr, _bus) = manager_with(Arc::new(MockInstaller::default()), 1);
        mgr.create_session(IMSI, 1, PEER).await.unwrap();
        let err = mgr.create_session("001010987654321", 2, PEER).await.unwrap_err();
        assert!(matches!(err, SessionError::ResourceExhausted));
        assert!(mgr.store().find("001010987654321").is_none());
    }

    #[tokio::test]
    async fn test_install_failure_compensates() {
        let installer = Arc::new(MockInstaller::default());
        installer.fail.store(true, Ordering::SeqCst);
        let (mgr, _bus) = manager_with(installer.clone(), 254);

        let err = mgr.create_session(IMSI, 0x100, PEER).await.unwrap_err();
        assert!(matches!(err, SessionError::Install(InstallError::Timeout(_))));
        assert!(mgr.store().find(IMSI).is_none());
        assert_eq!(mgr.pool().in_use_count(), 0);

        installer.fail.store(false, Ordering::SeqCst);
        let sess = mgr.create_session(IMSI, 0x100, PEER).await.unwrap();
        assert_eq!(sess.ue_addr, Ipv4Addr::new(10, 0, 0, 1));
    }

    #[tokio::test]
    async fn test_delete_releases_address() {
        let installer = Arc::new(MockInstaller::default());
        installer.fail_uninstall.store(true, Ordering::SeqCst);
        let (mgr, _bus) = manager_with(installer.clone(), 254);

        let sess = mgr.create_session(IMSI, 0x100, PEER).await.unwrap();
        let deleted = mgr.delete_session(IMSI).await.unwrap();
        assert_eq!(deleted.state, SessionState::Deleted);
        assert_eq!(deleted.session_id, sess.session_id);
        assert_eq!(installer.uninstalls.load(Ordering::SeqCst), 1);
        assert_eq!(mgr.store().count(), 0);
        assert!(!mgr.pool().is_allocated(sess.ue_addr));

        assert!(matches!(
            mgr.delete_session(IMSI).await,
            Err(SessionError::SessionNotFound)
        ));
    }

    #[tokio::test]
    async fn test_delete_during_initializing() {
        let gate = Arc::new(Notify::new());
        let installer = Arc::new(MockInstaller {
            gate: Some(gate.clone()),
            ..Default::default()
        });
        let (mgr, _bus) = manager_with(installer, 254);
        let mgr = Arc::new(mgr);

        let creating = tokio::spawn({
            let mgr = mgr.clone();
            async move { mgr.create_session(IMSI, 0x100, PEER).await }
        });
        while mgr.store().find(IMSI).is_none() {
            tokio::task::yield_now().await;
        }
        assert_eq!(mgr.store().find(IMSI).unwrap().state, SessionState::Initializing);

        assert!(matches!(
            mgr.delete_session(IMSI).await,
            Err(SessionError::SessionNotFound)
        ));
        assert_eq!(mgr.store().find(IMSI).unwrap().state, SessionState::Initializing);

        gate.notify_one();
        let sess = creating.await.unwrap().unwrap();
        assert_eq!(sess.state, SessionState::Active);
        assert_eq!(mgr.delete_session(IMSI).await.unwrap().state, SessionState::Deleted);
    }

    #[tokio::test]
    async fn test_modify_bearer() {
        let (mgr, _bus) = manager_with(Arc::new(MockInstaller::default()), 254);
        let qos = QosProfile {
            qci: 5,
            arp_priority: 2,
            ..QosProfile::default()
        };

        assert!(matches!(mgr.modify_bearer(IMSI, qos).await, Err(SessionError::SessionNotFound)));

        mgr.create_session(IMSI, 0x100, PEER).await.unwrap();
        let sess = mgr.modify_bearer(IMSI, qos).await.unwrap();
        assert_eq!(sess.state, SessionState::Active);
        assert_eq!(sess.qos.qci, 5);
        assert_eq!(mgr.store().find(IMSI).unwrap().qos.arp_priority, 2);
    }

    #[tokio::test]
    async fn test_modify_failure_keeps_old_qos() {
        let installer = Arc::new(MockInstaller::default());
        installer.fail_modify.store(true, Ordering::SeqCst);
        let (mgr, _bus) = manager_with(installer.clone(), 254);
        mgr.create_session(IMSI, 0x100, PEER).await.unwrap();

        let qos = QosProfile {
            qci: 1,
            mbr_ul: 1,
            mbr_dl: 1,
            ..QosProfile::default()
        };
        let err = mgr.modify_bearer(IMSI, qos).await.unwrap_err();
        assert!(matches!(err, SessionError::Install(InstallError::Rejected(_))));
        assert_eq!(installer.modifies.load(Ordering::SeqCst), 1);

        let sess = mgr.store().find(IMSI).unwrap();
        assert_eq!(sess.state, SessionState::Active);
        assert_eq!(sess.qos, QosProfile::default());
    }

    #[tokio::test]
    async fn test_modify_during_deleting() {
        let gate = Arc::new(Notify::new());
        let installer = Arc::new(MockInstaller {
            uninstall_gate: Some(gate.clone()),
            ..Default::default()
        });
        let (mgr, _bus) = manager_with(installer.clone(), 254);
        let mgr = Arc::new(mgr);
        mgr.create_session(IMSI, 0x100, PEER).await.unwrap();

        let deleting = tokio::spawn({
            let mgr = mgr.clone();
            async move { mgr.delete_session(IMSI).await }
        });
        while mgr.store().find(IMSI).map(|s| s.state) != Some(SessionState::Deleting) {
            tokio::task::yield_now().await;
        }

        let qos = QosProfile {
            qci: 5,
            ..QosProfile::default()
        };
        assert!(matches!(
            mgr.modify_bearer(IMSI, qos).await,
            Err(SessionError::InvalidState("SESSION_STATE_DELETING"))
        ));
        let sess = mgr.store().find(IMSI).unwrap();
        assert_eq!(sess.state, SessionState::Deleting);
        assert_eq!(sess.qos, QosProfile::default());
        assert_eq!(installer.modifies.load(Ordering::SeqCst), 0);

        gate.notify_one();
        assert_eq!(deleting.await.unwrap().unwrap().state, SessionState::Deleted);
        assert!(matches!(mgr.modify_bearer(IMSI, qos).await, Err(SessionError::SessionNotFound)));
    }
}
