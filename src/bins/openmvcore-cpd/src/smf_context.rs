//! Session context
//!
//! Live sessions keyed by IMSI behind one store-wide lock. Callers take the
//! lock through [`SessionStore::lock`] and must drop the guard before any
//! network I/O.

use std::collections::{HashMap, HashSet};
use std::net::Ipv4Addr;
use std::sync::{Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Utc};
use mvc_gtp::BearerQos;
use serde::Serialize;
use uuid::Uuid;

use crate::config::QosConfig;
use crate::error::SessionError;
use crate::gsm_sm::{next_state, GsmEvent, SessionState};

/// Bearer QoS profile; bit rates in kbps
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct QosProfile {
    pub qci: u8,
    pub arp_priority: u8,
    pub preemption_capability: bool,
    pub preemption_vulnerability: bool,
    pub mbr_ul: u64,
    pub mbr_dl: u64,
    pub gbr_ul: u64,
    pub gbr_dl: u64,
}

impl From<&QosConfig> for QosProfile {
    fn from(config: &QosConfig) -> Self {
        Self {
            qci: config.qci,
            arp_priority: config.arp_priority,
            preemption_capability: config.preemption_capability,
            preemption_vulnerability: config.preemption_vulnerability,
            mbr_ul: config.mbr_ul_kbps,
            mbr_dl: config.mbr_dl_kbps,
            gbr_ul: config.gbr_ul_kbps,
            gbr_dl: config.gbr_dl_kbps,
        }
    }
}

impl Default for QosProfile {
    fn default() -> Self {
        Self::from(&QosConfig::default())
    }
}

impl From<&BearerQos> for QosProfile {
    fn from(qos: &BearerQos) -> Self {
        Self {
            qci: qos.qci,
            arp_priority: qos.priority_level,
            // PCI/PVI set means the capability is disabled
            preemption_capability: !qos.pci,
            preemption_vulnerability: !qos.pvi,
            mbr_ul: qos.mbr_ul,
            mbr_dl: qos.mbr_dl,
            gbr_ul: qos.gbr_ul,
            gbr_dl: qos.gbr_dl,
        }
    }
}

impl From<&QosProfile> for BearerQos {
    fn from(qos: &QosProfile) -> Self {
        BearerQos {
            pci: !qos.preemption_capability,
            priority_level: qos.arp_priority,
            pvi: !qos.preemption_vulnerability,
            qci: qos.qci,
            mbr_ul: qos.mbr_ul,
            mbr_dl: qos.mbr_dl,
            gbr_ul: qos.gbr_ul,
            gbr_dl: qos.gbr_dl,
        }
    }
}

/// SMF Session
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Session {
    pub session_id: Uuid,
    pub imsi: String,
    pub ue_addr: Ipv4Addr,
    /// Core-assigned tunnel endpoint, unique among live sessions
    pub local_teid: u32,
    pub peer_teid: u32,
    pub peer_addr: Ipv4Addr,
    pub bearer_id: u8,
    pub qos: QosProfile,
    /// N4 SEID allocated on the control plane side
    pub cp_seid: u64,
    /// N4 SEID returned by the user plane
    pub up_seid: Option<u64>,
    pub state: SessionState,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Session {
    /// Apply `event`, refusing transitions the state machine does not allow
    pub fn transition(&mut self, event: GsmEvent) -> Result<SessionState, SessionError> {
        let next = next_state(self.state, event).ok_or(SessionError::InvalidState(self.state.name()))?;
        log::debug!(
            "[{}] {} --{}--> {}",
            self.imsi,
            self.state.name(),
            event.name(),
            next.name()
        );
        self.state = next;
        self.updated_at = Utc::now();
        Ok(next)
    }
}

/// Parameters for a session that has not been stored yet
pub struct NewSession {
    pub imsi: String,
    pub ue_addr: Ipv4Addr,
    pub peer_teid: u32,
    pub peer_addr: Ipv4Addr,
    pub bearer_id: u8,
    pub qos: QosProfile,
}

#[derive(Debug)]
pub struct SessionTable {
    sessions: HashMap<String, Session>,
    local_teids: HashSet<u32>,
    next_teid: u32,
    next_cp_seid: u64,
}

impl SessionTable {
    fn new() -> Self {
        Self {
            sessions: HashMap::new(),
            local_teids: HashSet::new(),
            next_teid: 1,
            next_cp_seid: 1,
        }
    }

    pub fn get(&self, imsi: &str) -> Option<&Session> {
        self.sessions.get(imsi)
    }

    pub fn get_mut(&mut self, imsi: &str) -> Option<&mut Session> {
        self.sessions.get_mut(imsi)
    }

    fn allocate_teid(&mut self) -> u32 {
        loop {
            let teid = self.next_teid;
            self.next_teid = self.next_teid.wrapping_add(1).max(1);
            if !self.local_teids.contains(&teid) {
                return teid;
            }
        }
    }

    /// Build an INITIALIZING session, assign its identifiers and store it
    pub fn add(&mut self, params: NewSession) -> Session {
        let now = Utc::now();
        let local_teid = self.allocate_teid();
        let cp_seid = self.next_cp_seid;
        self.next_cp_seid = self.next_cp_seid.wrapping_add(1).max(1);

        let sess = Session {
            session_id: Uuid::new_v4(),
            imsi: params.imsi,
            ue_addr: params.ue_addr,
            local_teid,
            peer_teid: params.peer_teid,
            peer_addr: params.peer_addr,
            bearer_id: params.bearer_id,
            qos: params.qos,
            cp_seid,
            up_seid: None,
            state: SessionState::Initializing,
            created_at: now,
            updated_at: now,
        };

        self.local_teids.insert(local_teid);
        self.sessions.insert(sess.imsi.clone(), sess.clone());
        log::info!("[Added] Number of SMF-Sessions is now {}", self.sessions.len());
        sess
    }

    pub fn remove(&mut self, imsi: &str) -> Option<Session> {
        let sess = self.sessions.remove(imsi)?;
        self.local_teids.remove(&sess.local_teid);
        log::info!("[Removed] Number of SMF-Sessions is now {}", self.sessions.len());
        Some(sess)
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}

/// SMF Context session store
#[derive(Debug)]
pub struct SessionStore {
    table: Mutex<SessionTable>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self {
            table: Mutex::new(SessionTable::new()),
        }
    }

    pub fn lock(&self) -> MutexGuard<'_, SessionTable> {
        self.table.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn find(&self, imsi: &str) -> Option<Session> {
        self.lock().get(imsi).cloned()
    }

    /// Snapshot ordered by IMSI
    pub fn list(&self) -> Vec<Session> {
        let mut list: Vec<_> = self.lock().sessions.values().cloned().collect();
        list.sort_by(|a, b| a.imsi.cmp(&b.imsi));
        list
    }

    pub fn count(&self) -> usize {
        self.lock().len()
    }
}

impl Default for SessionStore {
    fn default() -> Self {
        Self::new()
    }
}
