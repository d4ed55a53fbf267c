//! N4 path towards the user plane
//!
//! A single UDP socket connected to the user plane. Requests are tracked by
//! sequence number; a background task matches each reply to its pending
//! request and drops anything that does not correlate.

use std::collections::HashMap;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use mvc_pfcp::prelude::*;
use mvc_pfcp::PFCP_MAX_SEQUENCE_NUMBER;
use tokio::net::UdpSocket;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

use crate::config::PfcpConfig;
use crate::error::InstallError;
use crate::n4_build::{
    build_session_establishment_request, build_session_modification_request, recovery_time_stamp,
};
use crate::smf_context::Session;

const MAX_PFCP_DATAGRAM: usize = 8192;

/// Result of a successful installation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InstallAck {
    /// SEID allocated by the user plane
    pub up_seid: u64,
}

/// Installs, updates and removes the forwarding rules of one session
#[async_trait]
pub trait ForwardingRuleInstaller: Send + Sync {
    async fn install(&self, sess: &Session) -> Result<InstallAck, InstallError>;

    /// Push the QoS currently held in `sess` to its installed QER
    async fn modify(&self, sess: &Session) -> Result<(), InstallError>;

    /// Best-effort teardown of the rules installed for `sess`
    async fn uninstall(&self, sess: &Session) -> Result<(), InstallError>;
}

struct PendingRequest {
    /// Header SEID the reply must carry, `None` for node messages
    seid: Option<u64>,
    tx: oneshot::Sender<(PfcpHeader, PfcpMessage)>,
}

type PendingMap = Arc<Mutex<HashMap<u32, PendingRequest>>>;

/// PFCP client bound to one user plane peer
pub struct PfcpInstaller {
    socket: Arc<UdpSocket>,
    peer: SocketAddr,
    node_id: NodeId,
    cp_addr: Ipv4Addr,
    response_timeout: Duration,
    next_seq: AtomicU32,
    pending: PendingMap,
    recv_task: JoinHandle<()>,
}

impl PfcpInstaller {
    /// Bind the local socket and start the receive task
    pub async fn connect(config: &PfcpConfig) -> Result<Self, InstallError> {
        let socket = UdpSocket::bind(config.local_addr).await?;
        socket.connect(config.upf_addr).await?;

        let cp_addr = match socket.local_addr()?.ip() {
            IpAddr::V4(ip) if !ip.is_unspecified() => ip,
            _ => Ipv4Addr::LOCALHOST,
        };
        log::info!(
            "PFCP path {} -> {} (timeout {:?})",
            socket.local_addr()?,
            config.upf_addr,
            config.response_timeout()
        );

        let socket = Arc::new(socket);
        let pending: PendingMap = Arc::new(Mutex::new(HashMap::new()));
        let recv_task = tokio::spawn(receive_loop(socket.clone(), pending.clone()));

        Ok(Self {
            socket,
            peer: config.upf_addr,
            node_id: NodeId::new_ipv4(cp_addr),
            cp_addr,
            response_timeout: config.response_timeout(),
            next_seq: AtomicU32::new(1),
            pending,
            recv_task,
        })
    }

    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.socket.local_addr()
    }

    pub fn peer(&self) -> SocketAddr {
        self.peer
    }

    fn up_addr(&self) -> Ipv4Addr {
        match self.peer.ip() {
            IpAddr::V4(ip) => ip,
            IpAddr::V6(_) => Ipv4Addr::UNSPECIFIED,
        }
    }

    fn next_sequence(&self) -> u32 {
        (self.next_seq.fetch_add(1, Ordering::Relaxed) % PFCP_MAX_SEQUENCE_NUMBER) + 1
    }

    fn forget(&self, seq: u32) {
        if let Ok(mut pending) = self.pending.lock() {
            pending.remove(&seq);
        }
    }

    /// Send `msg` and wait for the correlated reply
    ///
    /// `header_seid` is the SEID written into the request header; `reply_seid`
    /// is the one the response must carry.
    async fn transact(
        &self,
        msg: PfcpMessage,
        header_seid: Option<u64>,
        reply_seid: Option<u64>,
    ) -> Result<(PfcpHeader, PfcpMessage), InstallError> {
        let seq = self.next_sequence();
        let (tx, rx) = oneshot::channel();
        if let Ok(mut pending) = self.pending.lock() {
            pending.insert(seq, PendingRequest { seid: reply_seid, tx });
        }

        let buf = build_message(&msg, seq, header_seid);
        log::debug!("[PFCP] TX {} seq={} ({} bytes)", msg.message_type().name(), seq, buf.len());
        if let Err(e) = self.socket.send(&buf).await {
            self.forget(seq);
            return Err(e.into());
        }

        match tokio::time::timeout(self.response_timeout, rx).await {
            Ok(Ok(reply)) => Ok(reply),
            Ok(Err(_)) => {
                self.forget(seq);
                Err(InstallError::Protocol("N4 path closed".to_string()))
            }
            Err(_) => {
                self.forget(seq);
                log::warn!(
                    "[PFCP] No {} response from {} within {:?} (seq={})",
                    msg.message_type().name(),
                    self.peer,
                    self.response_timeout,
                    seq
                );
                Err(InstallError::Timeout(self.response_timeout))
            }
        }
    }

    /// PFCP Association Setup with the peer
    pub async fn associate(&self) -> Result<(), InstallError> {
        let req = AssociationSetupRequest::new(self.node_id.clone(), recovery_time_stamp());
        match self.transact(PfcpMessage::AssociationSetupRequest(req), None, None).await? {
            (_, PfcpMessage::AssociationSetupResponse(rsp)) if rsp.cause.is_success() => {
                log::info!("PFCP associated with {} ({:?})", self.peer, rsp.node_id);
                Ok(())
            }
            (_, PfcpMessage::AssociationSetupResponse(rsp)) => Err(InstallError::Rejected(rsp.cause)),
            (_, other) => Err(unexpected(&other)),
        }
    }

    /// PFCP Heartbeat; returns the peer's recovery time stamp
    pub async fn heartbeat(&self) -> Result<u32, InstallError> {
        let req = HeartbeatRequest::new(recovery_time_stamp());
        match self.transact(PfcpMessage::HeartbeatRequest(req), None, None).await? {
            (_, PfcpMessage::HeartbeatResponse(rsp)) => Ok(rsp.recovery_time_stamp),
            (_, other) => Err(unexpected(&other)),
        }
    }
}

fn unexpected(msg: &PfcpMessage) -> InstallError {
    InstallError::Protocol(format!("unexpected {}", msg.message_type().name()))
}

#[async_trait]
impl ForwardingRuleInstaller for PfcpInstaller {
    async fn install(&self, sess: &Session) -> Result<InstallAck, InstallError> {
        let req = build_session_establishment_request(&self.node_id, self.cp_addr, self.up_addr(), sess);
        log::info!(
            "[{}] PFCP Session Establishment (ue={}, teid=0x{:x}, cp_seid={})",
            sess.imsi,
            sess.ue_addr,
            sess.local_teid,
            sess.cp_seid
        );

        let rsp = match self
            .transact(PfcpMessage::SessionEstablishmentRequest(req), Some(0), Some(sess.cp_seid))
            .await?
        {
            (_, PfcpMessage::SessionEstablishmentResponse(rsp)) => rsp,
            (_, other) => return Err(unexpected(&other)),
        };

        if !rsp.cause.is_success() {
            return Err(InstallError::Rejected(rsp.cause));
        }
        let up_f_seid = rsp
            .up_f_seid
            .ok_or_else(|| InstallError::Protocol("missing UP F-SEID".to_string()))?;

        log::info!("[{}] PFCP session established (up_seid={})", sess.imsi, up_f_seid.seid);
        Ok(InstallAck { up_seid: up_f_seid.seid })
    }

    async fn modify(&self, sess: &Session) -> Result<(), InstallError> {
        let Some(up_seid) = sess.up_seid else {
            return Ok(());
        };
        let req = build_session_modification_request(sess);
        log::info!(
            "[{}] PFCP Session Modification (up_seid={}, mbr={}/{})",
            sess.imsi,
            up_seid,
            sess.qos.mbr_ul,
            sess.qos.mbr_dl
        );

        match self
            .transact(PfcpMessage::SessionModificationRequest(req), Some(up_seid), Some(sess.cp_seid))
            .await?
        {
            (_, PfcpMessage::SessionModificationResponse(rsp)) if rsp.cause.is_success() => {
                log::info!("[{}] PFCP session modified (up_seid={})", sess.imsi, up_seid);
                Ok(())
            }
            (_, PfcpMessage::SessionModificationResponse(rsp)) => Err(InstallError::Rejected(rsp.cause)),
            (_, other) => Err(unexpected(&other)),
        }
    }

    async fn uninstall(&self, sess: &Session) -> Result<(), InstallError> {
        let Some(up_seid) = sess.up_seid else {
            return Ok(());
        };

        match self
            .transact(
                PfcpMessage::SessionDeletionRequest(SessionDeletionRequest),
                Some(up_seid),
                Some(sess.cp_seid),
            )
            .await?
        {
            (_, PfcpMessage::SessionDeletionResponse(rsp)) if rsp.cause.is_success() => {
                log::info!("[{}] PFCP session deleted (up_seid={})", sess.imsi, up_seid);
                Ok(())
            }
            (_, PfcpMessage::SessionDeletionResponse(rsp)) => Err(InstallError::Rejected(rsp.cause)),
            (_, other) => Err(unexpected(&other)),
        }
    }
}

impl Drop for PfcpInstaller {
    fn drop(&mut self) {
        self.recv_task.abort();
    }
}

async fn receive_loop(socket: Arc<UdpSocket>, pending: PendingMap) {
    let mut buf = vec![0u8; MAX_PFCP_DATAGRAM];
    loop {
        let len = match socket.recv(&mut buf).await {
            Ok(len) => len,
            Err(e) => {
                // ICMP errors surface here on a connected socket
                log::debug!("[PFCP] recv error: {}", e);
                continue;
            }
        };

        let mut data = Bytes::copy_from_slice(&buf[..len]);
        let (header, msg) = match parse_message(&mut data) {
            Ok(parsed) => parsed,
            Err(e) => {
                log::warn!("[PFCP] Dropping undecodable datagram ({} bytes): {}", len, e);
                continue;
            }
        };

        dispatch(&pending, header, msg);
    }
}

fn dispatch(pending: &PendingMap, header: PfcpHeader, msg: PfcpMessage) {
    let Ok(mut pending) = pending.lock() else {
        return;
    };
    let seq = header.sequence_number;

    match pending.get(&seq) {
        None => {
            log::debug!("[PFCP] No pending request for {} seq={}", msg.message_type().name(), seq);
        }
        Some(req) if req.seid != header.seid => {
            log::warn!(
                "[PFCP] {} seq={} SEID mismatch (expected {:?}, got {:?})",
                msg.message_type().name(),
                seq,
                req.seid,
                header.seid
            );
        }
        Some(_) => {
            if let Some(req) = pending.remove(&seq) {
                log::debug!("[PFCP] RX {} seq={}", msg.message_type().name(), seq);
                let _ = req.tx.send((header, msg));
            }
        }
    }
}
