//! UPF session context

use std::collections::HashMap;
use std::net::Ipv4Addr;
use std::sync::RwLock;

use mvc_pfcp::prelude::Bitrate;

/// Forwarding state installed for one PFCP session
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpSession {
    pub up_seid: u64,
    pub cp_seid: u64,
    pub cp_addr: Ipv4Addr,
    pub ue_addr: Option<Ipv4Addr>,
    pub ul_teid: Option<u32>,
    /// Downlink tunnel towards the access side (teid, address)
    pub dl_tunnel: Option<(u32, Ipv4Addr)>,
    pub pdr_count: usize,
    pub far_count: usize,
    pub qer_count: usize,
    /// Enforced bit rates of the session QER
    pub mbr: Option<Bitrate>,
    pub gbr: Option<Bitrate>,
}

/// Sessions keyed by the locally assigned SEID
#[derive(Debug, Default)]
pub struct UpSessionTable {
    sessions: RwLock<HashMap<u64, UpSession>>,
}

impl UpSessionTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, sess: UpSession) {
        if let Ok(mut sessions) = self.sessions.write() {
            sessions.insert(sess.up_seid, sess);
            log::info!("[Added] Number of UPF-Sessions is now {}", sessions.len());
        }
    }

    pub fn remove(&self, up_seid: u64) -> Option<UpSession> {
        let mut sessions = self.sessions.write().ok()?;
        let sess = sessions.remove(&up_seid)?;
        log::info!("[Removed] Number of UPF-Sessions is now {}", sessions.len());
        Some(sess)
    }

    /// Apply `f` to a stored session, returning the updated copy
    pub fn update<F>(&self, up_seid: u64, f: F) -> Option<UpSession>
    where
        F: FnOnce(&mut UpSession),
    {
        let mut sessions = self.sessions.write().ok()?;
        let sess = sessions.get_mut(&up_seid)?;
        f(sess);
        Some(sess.clone())
    }

    pub fn find(&self, up_seid: u64) -> Option<UpSession> {
        self.sessions.read().ok()?.get(&up_seid).cloned()
    }

    pub fn find_by_ue_addr(&self, addr: Ipv4Addr) -> Option<UpSession> {
        let sessions = self.sessions.read().ok()?;
        sessions.values().find(|s| s.ue_addr == Some(addr)).cloned()
    }

    pub fn count(&self) -> usize {
        self.sessions.read().map(|s| s.len()).unwrap_or(0)
    }
}
