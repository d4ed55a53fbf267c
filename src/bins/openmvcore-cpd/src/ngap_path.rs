//! Registration transport
//!
//! Stream listener standing in for the N2 association. Every accepted
//! connection runs on its own task with a child cancellation token.

use std::net::SocketAddr;
use std::sync::Arc;

use bytes::Bytes;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio_util::sync::CancellationToken;

use crate::error::CodecError;
use crate::gmm_handler::Authenticator;
use crate::ngap_build::{build_registration_response, NgSetupResponse, NgapMessage, MAX_NGAP_FRAME_LEN};

pub const AMF_NAME: &str = "openmvcore-amf";

pub struct NgapServer {
    listener: TcpListener,
    authenticator: Arc<Authenticator>,
}

impl NgapServer {
    pub async fn bind(addr: SocketAddr, authenticator: Arc<Authenticator>) -> std::io::Result<Self> {
        let listener = TcpListener::bind(addr).await?;
        log::info!("NGAP server listening on {}", listener.local_addr()?);
        Ok(Self {
            listener,
            authenticator,
        })
    }

    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Accept connections until `cancel` fires
    pub async fn run(self, cancel: CancellationToken) {
        loop {
            let (stream, peer) = tokio::select! {
                _ = cancel.cancelled() => break,
                result = self.listener.accept() => match result {
                    Ok(accepted) => accepted,
                    Err(e) => {
                        log::warn!("NGAP accept error: {}", e);
                        continue;
                    }
                },
            };

            log::info!("gNB-N2 accepted [{}]", peer);
            let authenticator = self.authenticator.clone();
            let token = cancel.child_token();
            tokio::spawn(async move {
                tokio::select! {
                    _ = token.cancelled() => log::debug!("gNB-N2 [{}] cancelled", peer),
                    result = serve_connection(stream, peer, &authenticator) => {
                        if let Err(e) = result {
                            log::warn!("gNB-N2 [{}] closed: {}", peer, e);
                        }
                    }
                }
                log::info!("gNB-N2 [{}] connection closed", peer);
            });
        }
        log::info!("NGAP server stopped");
    }
}

/// Read one frame body; `Ok(None)` on clean end of stream
async fn read_frame(stream: &mut TcpStream) -> std::io::Result<Option<Bytes>> {
    let len = match stream.read_u32().await {
        Ok(len) => len as usize,
        Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => return Ok(None),
        Err(e) => return Err(e),
    };
    if len > MAX_NGAP_FRAME_LEN {
        return Err(std::io::Error::new(
            std::io::ErrorKind::InvalidData,
            CodecError::Oversized(len),
        ));
    }
    let mut body = vec![0u8; len];
    stream.read_exact(&mut body).await?;
    Ok(Some(Bytes::from(body)))
}

async fn serve_connection(
    mut stream: TcpStream,
    peer: SocketAddr,
    authenticator: &Authenticator,
) -> std::io::Result<()> {
    while let Some(frame) = read_frame(&mut stream).await? {
        let msg = match NgapMessage::decode(&frame) {
            Ok(msg) => msg,
            Err(CodecError::UnknownMessageType(t)) => {
                log::warn!("gNB-N2 [{}] unknown message type {}, ignored", peer, t);
                continue;
            }
            Err(e) => {
                log::warn!("gNB-N2 [{}] undecodable frame: {}", peer, e);
                continue;
            }
        };

        let Some(reply) = handle_message(authenticator, peer, msg) else {
            continue;
        };
        match reply.encode() {
            Ok(out) => stream.write_all(&out).await?,
            Err(e) => log::error!("gNB-N2 [{}] failed to encode {}: {}", peer, reply.name(), e),
        }
    }
    Ok(())
}

/// Handle one decoded message and return the reply, if any
pub fn handle_message(authenticator: &Authenticator, peer: SocketAddr, msg: NgapMessage) -> Option<NgapMessage> {
    match msg {
        NgapMessage::NgSetupRequest(req) => {
            log::info!("gNB-N2 [{}] NG Setup (gnb_id={})", peer, req.gnb_id);
            Some(NgapMessage::NgSetupResponse(NgSetupResponse {
                amf_name: AMF_NAME.to_string(),
                accepted: true,
            }))
        }
        NgapMessage::InitialUeMessage(req) => {
            let outcome = authenticator.authenticate(
                &req.subscriber_identity,
                &req.presented_secret,
                &req.transient_session_id,
                peer,
            );
            Some(build_registration_response(outcome.passed(), outcome.reason()))
        }
        NgapMessage::NgSetupResponse(_) | NgapMessage::RegistrationResponse(_) => {
            log::debug!("gNB-N2 [{}] ignoring unsolicited {}", peer, msg.name());
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::amf_context::SubscriberStore;
    use crate::config::CpConfig;
    use crate::event::EventBus;
    use crate::ngap_build::{InitialUeMessage, NgSetupRequest};
    use crate::udm_context::CredentialStore;
    use chrono::Utc;

    fn authenticator() -> Arc<Authenticator> {
        Arc::new(Authenticator::new(
            Arc::new(CredentialStore::from_entries(&CpConfig::default().subscribers)),
            Arc::new(SubscriberStore::new()),
            Arc::new(EventBus::new()),
        ))
    }

    async fn read_reply(stream: &mut TcpStream) -> NgapMessage {
        let len = stream.read_u32().await.unwrap() as usize;
        let mut body = vec![0u8; len];
        stream.read_exact(&mut body).await.unwrap();
        NgapMessage::decode(&Bytes::from(body)).unwrap()
    }

    #[tokio::test]
    async fn test_registration_over_tcp() {
        let auth = authenticator();
        let server = NgapServer::bind("127.0.0.1:0".parse().unwrap(), auth.clone()).await.unwrap();
        let addr = server.local_addr().unwrap();
        let cancel = CancellationToken::new();
        let handle = tokio::spawn(server.run(cancel.clone()));

        let mut stream = TcpStream::connect(addr).await.unwrap();

        // garbage and unknown frames do not kill the connection
        stream.write_all(&[0, 0, 0, 2, 3, b'{']).await.unwrap();
        stream.write_all(&[0, 0, 0, 3, 42, b'{', b'}']).await.unwrap();

        let req = NgapMessage::InitialUeMessage(InitialUeMessage {
            transient_session_id: "ran-ue-7".to_string(),
            subscriber_identity: "001010123456789".to_string(),
            presented_secret: "secret123".to_string(),
            timestamp: Utc::now(),
        });
        stream.write_all(&req.encode().unwrap()).await.unwrap();

        match read_reply(&mut stream).await {
            NgapMessage::RegistrationResponse(rsp) => {
                assert!(rsp.success);
                assert_eq!(rsp.reason, "authentication successful");
            }
            other => panic!("unexpected {:?}", other),
        }
        let ue = auth.subscribers().find("001010123456789").unwrap();
        assert_eq!(ue.access_peer, stream.local_addr().unwrap());

        cancel.cancel();
        handle.await.unwrap();
    }

    #[test]
    fn test_ng_setup_and_rejection() {
        let auth = authenticator();
        let peer: SocketAddr = "127.0.0.1:1".parse().unwrap();

        let setup = handle_message(
            &auth,
            peer,
            NgapMessage::NgSetupRequest(NgSetupRequest {
                gnb_id: "gnb-1".to_string(),
                gnb_name: None,
            }),
        );
        assert!(matches!(setup, Some(NgapMessage::NgSetupResponse(ref r)) if r.accepted));

        let reply = handle_message(
            &auth,
            peer,
            NgapMessage::InitialUeMessage(InitialUeMessage {
                transient_session_id: "1".to_string(),
                subscriber_identity: "123".to_string(),
                presented_secret: "x".to_string(),
                timestamp: Utc::now(),
            }),
        );
        match reply {
            Some(NgapMessage::RegistrationResponse(rsp)) => {
                assert!(!rsp.success);
                assert_eq!(rsp.reason, "malformed identity");
            }
            other => panic!("unexpected {:?}", other),
        }
    }
}
