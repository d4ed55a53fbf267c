//! N4 integration tests
//!
//! Association and heartbeat against the user plane responder, plus the
//! compensation path when the user plane never answers.

use std::net::Ipv4Addr;
use std::time::{Duration, Instant};

use mvc_gtp::{CreateSessionRequest, DeleteSessionRequest, FTeid, Gtp2Cause, Gtp2Message, F_TEID_S1_U_ENODEB_GTP_U};
use openmvcore_cpd::InstallError;
use openmvcore_tests::{TestCore, IMSI_1};
use tokio::net::UdpSocket;

fn create_request(imsi: &str) -> Gtp2Message {
    Gtp2Message::CreateSessionRequest(CreateSessionRequest {
        imsi: imsi.to_string(),
        sender_f_teid: FTeid::new(F_TEID_S1_U_ENODEB_GTP_U, 0x55, Some(Ipv4Addr::new(192, 0, 2, 20))),
        ebi: Some(5),
        bearer_qos: None,
    })
}

#[tokio::test]
async fn test_association_and_heartbeat() {
    let core = TestCore::start().await;

    core.installer.associate().await.unwrap();
    let recovery = core.installer.heartbeat().await.unwrap();
    assert_ne!(recovery, 0);
    assert_eq!(core.installer.peer(), core.upf.as_ref().unwrap().addr);

    core.shutdown().await;
}

#[tokio::test]
async fn test_install_timeout_releases_resources() {
    let silent = UdpSocket::bind("127.0.0.1:0").await.unwrap();
    let core = TestCore::start_with_silent_upf(&silent, 300).await;
    let client = core.gtp_client().await;

    let started = Instant::now();
    match client.request(&create_request(IMSI_1)).await {
        (_, Gtp2Message::CreateSessionResponse(rsp)) => {
            assert_eq!(rsp.cause, Gtp2Cause::RemotePeerNotResponding);
            assert!(rsp.paa.is_none());
        }
        (_, other) => panic!("unexpected {:?}", other.message_type()),
    }
    assert!(started.elapsed() >= Duration::from_millis(300));

    assert!(core.ctx.sessions.find(IMSI_1).is_none());
    assert_eq!(core.ctx.pool.in_use_count(), 0);
    // the compensated address is the next one handed out
    assert_eq!(core.ctx.pool.allocate().unwrap(), Ipv4Addr::new(10, 0, 0, 1));

    let mut buf = [0u8; 2048];
    let (len, _) = silent.recv_from(&mut buf).await.unwrap();
    assert!(len > 0);

    assert!(matches!(core.installer.heartbeat().await, Err(InstallError::Timeout(_))));

    core.shutdown().await;
}

#[tokio::test]
async fn test_delete_completes_when_user_plane_lost_session() {
    let core = TestCore::start_with(|config| config.pfcp.response_timeout_ms = 500).await;
    let client = core.gtp_client().await;

    assert!(matches!(
        client.request(&create_request(IMSI_1)).await,
        (_, Gtp2Message::CreateSessionResponse(rsp)) if rsp.cause == Gtp2Cause::RequestAccepted
    ));
    let up_seid = core.ctx.sessions.find(IMSI_1).unwrap().up_seid.unwrap();
    assert!(core.upf_server().sessions().remove(up_seid).is_some());

    let req = Gtp2Message::DeleteSessionRequest(DeleteSessionRequest { imsi: IMSI_1.to_string() });
    match client.request(&req).await {
        (_, Gtp2Message::DeleteSessionResponse(rsp)) => assert_eq!(rsp.cause, Gtp2Cause::RequestAccepted),
        (_, other) => panic!("unexpected {:?}", other.message_type()),
    }
    assert!(core.ctx.sessions.find(IMSI_1).is_none());
    assert_eq!(core.ctx.pool.in_use_count(), 0);

    core.shutdown().await;
}
