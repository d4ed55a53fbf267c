//! UPF PFCP path
//!
//! Answers node and session requests from the control plane over UDP.

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use bytes::{Bytes, BytesMut};
use mvc_pfcp::prelude::*;
use tokio::net::UdpSocket;
use tokio_util::sync::CancellationToken;

use crate::context::{UpSession, UpSessionTable};

const MAX_PFCP_DATAGRAM: usize = 65536;

/// Seconds between the NTP epoch (1900) and the Unix epoch
const NTP_UNIX_OFFSET: u64 = 2_208_988_800;

/// Async PFCP server
pub struct PfcpServer {
    socket: Arc<UdpSocket>,
    local_node_id: NodeId,
    local_ipv4: Ipv4Addr,
    recovery_time_stamp: u32,
    next_seid: AtomicU64,
    sessions: Arc<UpSessionTable>,
}

impl PfcpServer {
    pub async fn bind(local_addr: SocketAddr) -> std::io::Result<Self> {
        let socket = UdpSocket::bind(local_addr).await?;
        let bound = socket.local_addr()?;
        log::info!("PFCP server bound to {bound}");

        let local_ipv4 = match bound.ip() {
            IpAddr::V4(ip) if !ip.is_unspecified() => ip,
            _ => Ipv4Addr::LOCALHOST,
        };

        let recovery_time_stamp = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map(|d| (d.as_secs() + NTP_UNIX_OFFSET) as u32)
            .unwrap_or(0);

        Ok(Self {
            socket: Arc::new(socket),
            local_node_id: NodeId::new_ipv4(local_ipv4),
            local_ipv4,
            recovery_time_stamp,
            next_seid: AtomicU64::new(1),
            sessions: Arc::new(UpSessionTable::new()),
        })
    }

    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.socket.local_addr()
    }

    pub fn sessions(&self) -> Arc<UpSessionTable> {
        self.sessions.clone()
    }

    fn alloc_seid(&self) -> u64 {
        self.next_seid.fetch_add(1, Ordering::SeqCst)
    }

    /// Serve requests until `cancel` fires
    pub async fn run(&self, cancel: CancellationToken) -> std::io::Result<()> {
        let mut buf = vec![0u8; MAX_PFCP_DATAGRAM];
        log::info!("PFCP server starting main loop");

        loop {
            let (len, src_addr) = tokio::select! {
                _ = cancel.cancelled() => break,
                res = self.socket.recv_from(&mut buf) => match res {
                    Ok(r) => r,
                    Err(e) => {
                        log::error!("PFCP socket error: {e}");
                        continue;
                    }
                },
            };
            log::debug!("PFCP received {len} bytes from {src_addr}");

            if let Some(response) = self.handle_datagram(&buf[..len], src_addr) {
                if let Err(e) = self.socket.send_to(&response, src_addr).await {
                    log::error!("PFCP send to {src_addr} failed: {e}");
                }
            }
        }

        log::info!("PFCP server shutting down");
        Ok(())
    }

    /// Decode one datagram and build the encoded response, if any
    pub fn handle_datagram(&self, data: &[u8], src_addr: SocketAddr) -> Option<BytesMut> {
        let mut bytes = Bytes::copy_from_slice(data);
        let (header, msg) = match parse_message(&mut bytes) {
            Ok(decoded) => decoded,
            Err(e) => {
                log::warn!("PFCP decode error from {src_addr}: {e}");
                return None;
            }
        };
        log::debug!(
            "PFCP message: type={}, seq={}, seid={:?}",
            header.message_type.name(),
            header.sequence_number,
            header.seid
        );

        let (response, seid) = self.handle_message(&header, msg, src_addr)?;
        Some(build_message(&response, header.sequence_number, seid))
    }

    /// Returns the response and the SEID for its header
    pub fn handle_message(
        &self,
        header: &PfcpHeader,
        msg: PfcpMessage,
        src_addr: SocketAddr,
    ) -> Option<(PfcpMessage, Option<u64>)> {
        match msg {
            PfcpMessage::HeartbeatRequest(_) => {
                log::debug!("Heartbeat Request from {src_addr}");
                let rsp = HeartbeatResponse::new(self.recovery_time_stamp);
                Some((PfcpMessage::HeartbeatResponse(rsp), None))
            }
            PfcpMessage::AssociationSetupRequest(req) => {
                log::info!("PFCP Association established with {src_addr} ({:?})", req.node_id);
                let rsp = AssociationSetupResponse::new(
                    self.local_node_id.clone(),
                    PfcpCause::RequestAccepted,
                    self.recovery_time_stamp,
                );
                Some((PfcpMessage::AssociationSetupResponse(rsp), None))
            }
            PfcpMessage::SessionEstablishmentRequest(req) => {
                let cp_seid = req.cp_f_seid.seid;
                let rsp = self.establish(req);
                Some((PfcpMessage::SessionEstablishmentResponse(rsp), Some(cp_seid)))
            }
            PfcpMessage::SessionModificationRequest(req) => {
                let (rsp, cp_seid) = self.modify(header.seid.unwrap_or(0), req);
                Some((PfcpMessage::SessionModificationResponse(rsp), Some(cp_seid)))
            }
            PfcpMessage::SessionDeletionRequest(_) => {
                let (rsp, cp_seid) = self.delete(header.seid.unwrap_or(0));
                Some((PfcpMessage::SessionDeletionResponse(rsp), Some(cp_seid)))
            }
            other => {
                log::warn!("Unhandled PFCP message type: {}", other.message_type().name());
                None
            }
        }
    }

    fn establish(&self, req: SessionEstablishmentRequest) -> SessionEstablishmentResponse {
        if req.create_pdrs.is_empty() || req.create_fars.is_empty() {
            log::warn!("Session Establishment without PDR/FAR (cp_seid={})", req.cp_f_seid.seid);
            return SessionEstablishmentResponse::new(
                self.local_node_id.clone(),
                PfcpCause::MandatoryIeMissing,
            );
        }

        let ul_teid = req.create_pdrs.iter().find_map(|p| p.pdi.local_f_teid.map(|f| f.teid));
        let ue_addr = req
            .create_pdrs
            .iter()
            .find_map(|p| p.pdi.ue_ip_address.map(|u| u.addr));
        let dl_tunnel = req
            .create_fars
            .iter()
            .filter_map(|f| f.forwarding_parameters.as_ref())
            .find_map(|fp| fp.outer_header_creation)
            .map(|ohc| (ohc.teid, ohc.ipv4_addr));

        let qer = req.create_qers.first();
        let sess = UpSession {
            up_seid: self.alloc_seid(),
            cp_seid: req.cp_f_seid.seid,
            cp_addr: req.cp_f_seid.ipv4_addr,
            ue_addr,
            ul_teid,
            dl_tunnel,
            pdr_count: req.create_pdrs.len(),
            far_count: req.create_fars.len(),
            qer_count: req.create_qers.len(),
            mbr: qer.and_then(|q| q.maximum_bitrate),
            gbr: qer.and_then(|q| q.guaranteed_bitrate),
        };
        log::info!(
            "Session established (up_seid={}, cp_seid={}, ue={:?}, pdrs={}, fars={}, qers={})",
            sess.up_seid,
            sess.cp_seid,
            sess.ue_addr,
            sess.pdr_count,
            sess.far_count,
            sess.qer_count
        );

        let mut rsp =
            SessionEstablishmentResponse::new(self.local_node_id.clone(), PfcpCause::RequestAccepted);
        rsp.up_f_seid = Some(FSeid::new_ipv4(sess.up_seid, self.local_ipv4));
        rsp.created_pdrs = req
            .create_pdrs
            .iter()
            .filter(|p| p.pdi.local_f_teid.is_some())
            .map(|p| CreatedPdr {
                pdr_id: p.pdr_id,
                local_f_teid: p.pdi.local_f_teid,
            })
            .collect();
        self.sessions.insert(sess);
        rsp
    }

    fn modify(&self, up_seid: u64, req: SessionModificationRequest) -> (SessionModificationResponse, u64) {
        let updated = self.sessions.update(up_seid, |sess| {
            for qer in &req.update_qers {
                if let Some(mbr) = qer.maximum_bitrate {
                    sess.mbr = Some(mbr);
                }
                if let Some(gbr) = qer.guaranteed_bitrate {
                    sess.gbr = Some(gbr);
                }
            }
        });
        match updated {
            Some(sess) => {
                log::info!(
                    "Session modified (up_seid={}, cp_seid={}, mbr={:?}, gbr={:?})",
                    up_seid,
                    sess.cp_seid,
                    sess.mbr,
                    sess.gbr
                );
                (SessionModificationResponse::new(PfcpCause::RequestAccepted), sess.cp_seid)
            }
            None => {
                log::warn!("No session context for up_seid={up_seid}");
                (SessionModificationResponse::new(PfcpCause::SessionContextNotFound), 0)
            }
        }
    }

    fn delete(&self, up_seid: u64) -> (SessionDeletionResponse, u64) {
        match self.sessions.remove(up_seid) {
            Some(sess) => {
                log::info!("Session deleted (up_seid={}, cp_seid={})", up_seid, sess.cp_seid);
                (SessionDeletionResponse::new(PfcpCause::RequestAccepted), sess.cp_seid)
            }
            None => {
                log::warn!("No session context for up_seid={up_seid}");
                (SessionDeletionResponse::new(PfcpCause::SessionContextNotFound), 0)
            }
        }
    }
}
