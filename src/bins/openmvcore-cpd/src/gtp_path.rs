//! GTPv2-C session interface
//!
//! UDP listener answering Create Session, Modify Bearer, Delete Session and
//! Echo requests. Each datagram is handled on its own task.

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::sync::Arc;

use bytes::Bytes;
use mvc_gtp::header::Gtp2Header;
use mvc_gtp::message::{build_message, parse_message};
use mvc_gtp::{Gtp2Cause, Gtp2Message};
use tokio::net::UdpSocket;
use tokio_util::sync::CancellationToken;

use crate::error::CodecError;
use crate::gtp_build::{
    build_create_session_response, build_delete_session_response, build_modify_bearer_response,
    build_rejection,
};
use crate::sess_manager::SessionManager;
use crate::smf_context::QosProfile;

const MAX_GTP_DATAGRAM: usize = 4096;

/// Recovery counter reported in Echo Response
const RESTART_COUNTER: u8 = 1;

pub struct GtpServer {
    socket: Arc<UdpSocket>,
    manager: Arc<SessionManager>,
    /// User plane address handed out in the core F-TEID
    up_addr: Ipv4Addr,
}

impl GtpServer {
    pub async fn bind(addr: SocketAddr, manager: Arc<SessionManager>, up_addr: Ipv4Addr) -> std::io::Result<Self> {
        let socket = UdpSocket::bind(addr).await?;
        log::info!("GTP-C server listening on {}", socket.local_addr()?);
        Ok(Self {
            socket: Arc::new(socket),
            manager,
            up_addr,
        })
    }

    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.socket.local_addr()
    }

    /// Serve until `cancel` fires
    pub async fn run(self, cancel: CancellationToken) {
        let mut buf = vec![0u8; MAX_GTP_DATAGRAM];
        loop {
            let (len, from) = tokio::select! {
                _ = cancel.cancelled() => break,
                result = self.socket.recv_from(&mut buf) => match result {
                    Ok(received) => received,
                    Err(e) => {
                        log::warn!("GTP-C recv error: {}", e);
                        continue;
                    }
                },
            };

            let data = Bytes::copy_from_slice(&buf[..len]);
            let socket = self.socket.clone();
            let manager = self.manager.clone();
            let up_addr = self.up_addr;
            let token = cancel.child_token();
            tokio::spawn(async move {
                tokio::select! {
                    _ = token.cancelled() => {}
                    _ = handle_datagram(&socket, &manager, up_addr, data, from) => {}
                }
            });
        }
        log::info!("GTP-C server stopped");
    }
}

async fn handle_datagram(
    socket: &UdpSocket,
    manager: &SessionManager,
    up_addr: Ipv4Addr,
    data: Bytes,
    from: SocketAddr,
) {
    let reply = match parse_message(&mut data.clone()) {
        Ok((header, msg)) => {
            log::debug!("[GTP-C] RX {} from {} seq={}", header.message_type.name(), from, header.sequence_number);
            handle_message(manager, up_addr, &header, msg, from)
                .await
                .map(|(rsp, teid)| (rsp, teid, header.sequence_number))
        }
        Err(e) => {
            let err = CodecError::from(e);
            log::warn!("[GTP-C] Malformed message from {}: {}", from, err);
            // answer requests whose header still decodes
            Gtp2Header::decode(&mut data.clone())
                .ok()
                .and_then(|header| {
                    build_rejection(header.message_type, err.gtp_cause())
                        .map(|rsp| (rsp, header.teid.unwrap_or(0), header.sequence_number))
                })
        }
    };

    let Some((rsp, teid, seq)) = reply else {
        return;
    };
    match build_message(&rsp, teid, seq) {
        Ok(out) => {
            if let Err(e) = socket.send_to(&out, from).await {
                log::warn!("[GTP-C] send to {} failed: {}", from, e);
            }
        }
        Err(e) => log::error!("[GTP-C] Failed to encode {}: {}", rsp.message_type().name(), e),
    }
}

/// Dispatch one request; returns the response and its header TEID
pub async fn handle_message(
    manager: &SessionManager,
    up_addr: Ipv4Addr,
    header: &Gtp2Header,
    msg: Gtp2Message,
    from: SocketAddr,
) -> Option<(Gtp2Message, u32)> {
    let teid = header.teid.unwrap_or(0);
    match msg {
        Gtp2Message::EchoRequest { .. } => Some((Gtp2Message::EchoResponse { recovery: RESTART_COUNTER }, 0)),
        Gtp2Message::CreateSessionRequest(req) => {
            let peer_addr = match (req.sender_f_teid.ipv4_addr, from.ip()) {
                (Some(addr), _) => addr,
                (None, IpAddr::V4(addr)) => addr,
                (None, IpAddr::V6(_)) => {
                    log::warn!("[{}] Create Session without IPv4 peer address", req.imsi);
                    return build_rejection(header.message_type, Gtp2Cause::MandatoryIeMissing).map(|r| (r, teid));
                }
            };
            let peer_teid = req.sender_f_teid.teid;
            let rsp = match manager.create_session(&req.imsi, peer_teid, peer_addr).await {
                Ok(sess) => build_create_session_response(&sess, up_addr),
                Err(e) => {
                    log::warn!("[{}] Create Session rejected: {}", req.imsi, e);
                    Gtp2Message::CreateSessionResponse(mvc_gtp::CreateSessionResponse::rejected(e.gtp_cause()))
                }
            };
            Some((rsp, peer_teid))
        }
        Gtp2Message::ModifyBearerRequest(req) => {
            let rsp = match manager.modify_bearer(&req.imsi, QosProfile::from(&req.bearer_qos)).await {
                Ok(sess) => build_modify_bearer_response(&sess),
                Err(e) => {
                    log::warn!("[{}] Modify Bearer rejected: {}", req.imsi, e);
                    build_rejection(header.message_type, e.gtp_cause())?
                }
            };
            Some((rsp, teid))
        }
        Gtp2Message::DeleteSessionRequest(req) => {
            let cause = match manager.delete_session(&req.imsi).await {
                Ok(_) => Gtp2Cause::RequestAccepted,
                Err(e) => {
                    log::warn!("[{}] Delete Session rejected: {}", req.imsi, e);
                    e.gtp_cause()
                }
            };
            Some((build_delete_session_response(cause), teid))
        }
        Gtp2Message::EchoResponse { .. }
        | Gtp2Message::CreateSessionResponse(_)
        | Gtp2Message::ModifyBearerResponse(_)
        | Gtp2Message::DeleteSessionResponse(_) => {
            log::debug!("[GTP-C] Ignoring unsolicited {} from {}", header.message_type.name(), from);
            None
        }
    }
}
