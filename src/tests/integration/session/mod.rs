//! Session management integration tests
//!
//! GTP-C requests drive the session manager, which installs forwarding
//! state on a live user plane responder.

use std::net::Ipv4Addr;
use std::time::Duration;

use mvc_gtp::{
    BearerQos, CreateSessionRequest, DeleteSessionRequest, FTeid, Gtp2Cause, Gtp2Message, Gtp2MessageType,
    ModifyBearerRequest, F_TEID_S1_U_ENODEB_GTP_U,
};
use openmvcore_cpd::event::{DomainEvent, SUBJECT_FORWARDING_CREATED};
use openmvcore_cpd::gsm_sm::SessionState;
use openmvcore_tests::{GtpClient, TestCore, IMSI_1, IMSI_2, IMSI_3};

const ENB_ADDR: Ipv4Addr = Ipv4Addr::new(192, 0, 2, 10);

fn create_request(imsi: &str, enb_teid: u32) -> Gtp2Message {
    Gtp2Message::CreateSessionRequest(CreateSessionRequest {
        imsi: imsi.to_string(),
        sender_f_teid: FTeid::new(F_TEID_S1_U_ENODEB_GTP_U, enb_teid, Some(ENB_ADDR)),
        ebi: Some(5),
        bearer_qos: None,
    })
}

fn delete_request(imsi: &str) -> Gtp2Message {
    Gtp2Message::DeleteSessionRequest(DeleteSessionRequest { imsi: imsi.to_string() })
}

async fn create(client: &GtpClient, imsi: &str, enb_teid: u32) -> mvc_gtp::CreateSessionResponse {
    match client.request(&create_request(imsi, enb_teid)).await {
        (_, Gtp2Message::CreateSessionResponse(rsp)) => rsp,
        (_, other) => panic!("unexpected {:?}", other.message_type()),
    }
}

async fn delete(client: &GtpClient, imsi: &str) -> Gtp2Cause {
    match client.request(&delete_request(imsi)).await {
        (_, Gtp2Message::DeleteSessionResponse(rsp)) => rsp.cause,
        (_, other) => panic!("unexpected {:?}", other.message_type()),
    }
}

#[tokio::test]
async fn test_session_lifecycle_with_address_reuse() {
    let core = TestCore::start().await;
    let client = core.gtp_client().await;

    let (header, msg) = client.request(&create_request(IMSI_1, 0x1234)).await;
    assert_eq!(header.teid, Some(0x1234));
    let Gtp2Message::CreateSessionResponse(rsp) = msg else {
        panic!("expected Create Session Response");
    };
    assert_eq!(rsp.cause, Gtp2Cause::RequestAccepted);
    assert_eq!(rsp.paa, Some(Ipv4Addr::new(10, 0, 0, 1)));
    assert_eq!(rsp.ebi, Some(5));
    let core_teid = rsp.sender_f_teid.unwrap();
    assert_eq!(core_teid.ipv4_addr, Some(Ipv4Addr::LOCALHOST));
    assert_ne!(core_teid.teid, 0);

    let sess = core.ctx.sessions.find(IMSI_1).unwrap();
    assert_eq!(sess.state, SessionState::Active);
    assert_eq!(sess.local_teid, core_teid.teid);
    assert!(sess.up_seid.is_some());

    let up = core.upf_server().sessions().find(sess.up_seid.unwrap()).unwrap();
    assert_eq!(up.cp_seid, sess.cp_seid);
    assert_eq!(up.ue_addr, Some(Ipv4Addr::new(10, 0, 0, 1)));
    assert_eq!(up.ul_teid, Some(core_teid.teid));
    assert_eq!(up.dl_tunnel, Some((0x1234, ENB_ADDR)));
    assert_eq!((up.pdr_count, up.far_count, up.qer_count), (2, 2, 1));

    assert_eq!(create(&client, IMSI_2, 0x2000).await.paa, Some(Ipv4Addr::new(10, 0, 0, 2)));

    assert_eq!(delete(&client, IMSI_1).await, Gtp2Cause::RequestAccepted);
    assert!(core.ctx.sessions.find(IMSI_1).is_none());
    assert!(!core.ctx.pool.is_allocated(Ipv4Addr::new(10, 0, 0, 1)));
    assert_eq!(core.upf_server().sessions().count(), 1);

    // released address is handed out before untouched ones
    assert_eq!(create(&client, IMSI_3, 0x3000).await.paa, Some(Ipv4Addr::new(10, 0, 0, 1)));
    assert_eq!(core.ctx.pool.in_use_count(), 2);

    core.shutdown().await;
}

#[tokio::test]
async fn test_create_session_is_idempotent() {
    let core = TestCore::start().await;
    let client = core.gtp_client().await;

    let first = create(&client, IMSI_1, 0x1234).await;
    let second = create(&client, IMSI_1, 0x1234).await;
    assert_eq!(second.cause, Gtp2Cause::RequestAccepted);
    assert_eq!(first.paa, second.paa);
    assert_eq!(first.sender_f_teid, second.sender_f_teid);

    assert_eq!(core.ctx.sessions.count(), 1);
    assert_eq!(core.ctx.pool.in_use_count(), 1);
    assert_eq!(core.upf_server().sessions().count(), 1);

    core.shutdown().await;
}

#[tokio::test]
async fn test_forwarding_created_event() {
    let core = TestCore::start().await;
    let mut events = core.ctx.events.subscribe(&[SUBJECT_FORWARDING_CREATED]);
    let client = core.gtp_client().await;

    let rsp = create(&client, IMSI_1, 0x1234).await;
    let event = tokio::time::timeout(Duration::from_secs(2), events.recv())
        .await
        .unwrap()
        .unwrap();
    match event {
        DomainEvent::ForwardingSessionCreated(ev) => {
            let sess = core.ctx.sessions.find(IMSI_1).unwrap();
            assert_eq!(ev.identity, IMSI_1);
            assert_eq!(ev.session_id, sess.session_id);
            assert_eq!(ev.tunnel_id, rsp.sender_f_teid.unwrap().teid);
            assert_eq!(Some(ev.address), rsp.paa);
        }
        other => panic!("unexpected event {:?}", other),
    }

    core.shutdown().await;
}

#[tokio::test]
async fn test_pool_exhaustion() {
    let core = TestCore::start_with(|config| {
        config.ue_pool.first = Ipv4Addr::new(10, 0, 0, 1);
        config.ue_pool.last = Ipv4Addr::new(10, 0, 0, 1);
    })
    .await;
    let client = core.gtp_client().await;

    assert_eq!(create(&client, IMSI_1, 1).await.cause, Gtp2Cause::RequestAccepted);
    let rsp = create(&client, IMSI_2, 2).await;
    assert_eq!(rsp.cause, Gtp2Cause::AllDynamicAddressesAreOccupied);
    assert!(rsp.paa.is_none());
    assert!(core.ctx.sessions.find(IMSI_2).is_none());
    assert_eq!(core.upf_server().sessions().count(), 1);

    assert_eq!(delete(&client, IMSI_1).await, Gtp2Cause::RequestAccepted);
    assert_eq!(create(&client, IMSI_2, 2).await.paa, Some(Ipv4Addr::new(10, 0, 0, 1)));

    core.shutdown().await;
}

#[tokio::test]
async fn test_delete_unknown_session() {
    let core = TestCore::start().await;
    let client = core.gtp_client().await;

    assert_eq!(delete(&client, IMSI_1).await, Gtp2Cause::ContextNotFound);
    assert_eq!(core.ctx.pool.in_use_count(), 0);

    core.shutdown().await;
}

#[tokio::test]
async fn test_modify_bearer() {
    let core = TestCore::start().await;
    let client = core.gtp_client().await;
    create(&client, IMSI_1, 0x1234).await;

    let up_seid = core.ctx.sessions.find(IMSI_1).unwrap().up_seid.unwrap();
    let rates = |core: &TestCore| {
        let up = core.upf_server().sessions().find(up_seid).unwrap();
        (
            up.mbr.map(|b| (b.uplink_kbps, b.downlink_kbps)),
            up.gbr.map(|b| (b.uplink_kbps, b.downlink_kbps)),
        )
    };
    assert_eq!(rates(&core), (Some((100_000, 100_000)), None));

    let mut qos = BearerQos::new(7, 2);
    qos.mbr_ul = 50_000;
    qos.mbr_dl = 200_000;
    let req = Gtp2Message::ModifyBearerRequest(ModifyBearerRequest {
        imsi: IMSI_1.to_string(),
        bearer_qos: qos,
    });
    match client.request(&req).await {
        (_, Gtp2Message::ModifyBearerResponse(rsp)) => {
            assert_eq!(rsp.cause, Gtp2Cause::RequestAccepted);
            assert_eq!(rsp.bearer_qos, Some(qos));
        }
        (_, other) => panic!("unexpected {:?}", other.message_type()),
    }

    let sess = core.ctx.sessions.find(IMSI_1).unwrap();
    assert_eq!(sess.state, SessionState::Active);
    assert_eq!(sess.qos.qci, 7);
    assert_eq!(sess.qos.mbr_dl, 200_000);
    assert_eq!(rates(&core), (Some((50_000, 200_000)), None));

    let req = Gtp2Message::ModifyBearerRequest(ModifyBearerRequest {
        imsi: IMSI_2.to_string(),
        bearer_qos: qos,
    });
    match client.request(&req).await {
        (_, Gtp2Message::ModifyBearerResponse(rsp)) => assert_eq!(rsp.cause, Gtp2Cause::ContextNotFound),
        (_, other) => panic!("unexpected {:?}", other.message_type()),
    }

    core.shutdown().await;
}

#[tokio::test]
async fn test_missing_mandatory_ie() {
    let core = TestCore::start().await;
    let client = core.gtp_client().await;

    // a Create Session carrying only the IMSI
    let mut raw = mvc_gtp::message::build_message(&delete_request(IMSI_1), 0, 77).unwrap();
    raw[1] = Gtp2MessageType::CreateSessionRequest as u8;

    let (header, msg) = client.send_raw(&raw).await;
    assert_eq!(header.sequence_number, 77);
    match msg {
        Gtp2Message::CreateSessionResponse(rsp) => assert_eq!(rsp.cause, Gtp2Cause::MandatoryIeMissing),
        other => panic!("unexpected {:?}", other.message_type()),
    }
    assert_eq!(core.ctx.sessions.count(), 0);

    core.shutdown().await;
}

#[tokio::test]
async fn test_echo() {
    let core = TestCore::start().await;
    let client = core.gtp_client().await;

    let (header, msg) = client.request(&Gtp2Message::EchoRequest { recovery: 3 }).await;
    assert!(header.teid.is_none());
    assert!(matches!(msg, Gtp2Message::EchoResponse { .. }));

    core.shutdown().await;
}
