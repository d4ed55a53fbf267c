//! Registration integration tests
//!
//! Subscribers register over the TCP listener; results are checked on the
//! wire, in the subscriber store and on the event bus.

use std::time::Duration;

use openmvcore_cpd::amf_context::{AuthResult, RegistrationStatus};
use openmvcore_cpd::event::{DomainEvent, SUBJECT_QUOTA_DEDUCTED, SUBJECT_SUBSCRIBER_REGISTERED};
use openmvcore_cpd::gmm_handler::AUTH_SUCCESS_REASON;
use openmvcore_cpd::ngap_build::{NgSetupRequest, NgapMessage};
use openmvcore_cpd::ngap_path::AMF_NAME;
use openmvcore_cpd::QuotaError;
use openmvcore_tests::{exchange_ngap, register, TestCore, IMSI_1, IMSI_2, SECRET_1};
use tokio::net::TcpStream;

#[tokio::test]
async fn test_registration_success() {
    let core = TestCore::start().await;
    let mut events = core.ctx.events.subscribe(&[SUBJECT_SUBSCRIBER_REGISTERED]);

    let rsp = register(core.ngap_addr, IMSI_1, SECRET_1).await;
    assert!(rsp.success);
    assert_eq!(rsp.reason, AUTH_SUCCESS_REASON);

    let sub = core.ctx.subscribers.find(IMSI_1).unwrap();
    assert_eq!(sub.auth_result, AuthResult::Pass);
    assert_eq!(sub.status, RegistrationStatus::Registered);

    let event = tokio::time::timeout(Duration::from_secs(2), events.recv())
        .await
        .unwrap()
        .unwrap();
    match event {
        DomainEvent::SubscriberRegistered(ev) => {
            assert_eq!(ev.identity, IMSI_1);
            assert_eq!(ev.session_id, format!("ran-ue-{IMSI_1}"));
        }
        other => panic!("unexpected event {:?}", other),
    }

    core.shutdown().await;
}

#[tokio::test]
async fn test_registration_failures_are_recorded_without_events() {
    let core = TestCore::start().await;
    let mut events = core.ctx.events.subscribe(&[SUBJECT_SUBSCRIBER_REGISTERED]);

    let rsp = register(core.ngap_addr, IMSI_2, "wrong").await;
    assert!(!rsp.success);
    assert_eq!(rsp.reason, "invalid credential");
    assert_eq!(
        core.ctx.subscribers.find(IMSI_2).map(|s| s.status),
        Some(RegistrationStatus::AuthFailed)
    );

    let rsp = register(core.ngap_addr, "001019999999999", "whatever").await;
    assert!(!rsp.success);
    assert_eq!(rsp.reason, "unknown identity");

    let rsp = register(core.ngap_addr, "12ab", "whatever").await;
    assert!(!rsp.success);
    assert_eq!(rsp.reason, "malformed identity");
    assert!(core.ctx.subscribers.find("12ab").is_none());

    assert_eq!(core.ctx.subscribers.count(), 2);
    assert!(events.try_recv().is_none());

    core.shutdown().await;
}

#[tokio::test]
async fn test_reregistration_after_failure() {
    let core = TestCore::start().await;

    assert!(!register(core.ngap_addr, IMSI_1, "bad").await.success);
    let first = core.ctx.subscribers.find(IMSI_1).unwrap();

    assert!(register(core.ngap_addr, IMSI_1, SECRET_1).await.success);
    let second = core.ctx.subscribers.find(IMSI_1).unwrap();
    assert_eq!(second.status, RegistrationStatus::Registered);
    assert_eq!(second.created_at, first.created_at);
    assert_eq!(core.ctx.subscribers.count(), 1);

    core.shutdown().await;
}

#[tokio::test]
async fn test_ng_setup_then_registration_on_same_connection() {
    let core = TestCore::start().await;
    let mut stream = TcpStream::connect(core.ngap_addr).await.unwrap();

    let setup = NgapMessage::NgSetupRequest(NgSetupRequest {
        gnb_id: "gnb-1".to_string(),
        gnb_name: Some("test-gnb".to_string()),
    });
    match exchange_ngap(&mut stream, &setup).await {
        NgapMessage::NgSetupResponse(rsp) => {
            assert!(rsp.accepted);
            assert_eq!(rsp.amf_name, AMF_NAME);
        }
        other => panic!("unexpected reply {}", other.name()),
    }
    drop(stream);

    assert!(register(core.ngap_addr, IMSI_1, SECRET_1).await.success);
    core.shutdown().await;
}

#[tokio::test]
async fn test_quota_deduction_event() {
    let core = TestCore::start().await;
    let mut events = core.ctx.events.subscribe(&[SUBJECT_QUOTA_DEDUCTED]);

    assert_eq!(core.ctx.ledger.deduct(IMSI_1, 30).unwrap(), 70);
    assert_eq!(core.ctx.ledger.deduct(IMSI_1, 80), Err(QuotaError::InsufficientBalance));
    assert_eq!(core.ctx.ledger.deduct(IMSI_2, 1), Err(QuotaError::SubscriberNotFound));

    match events.recv().await {
        Some(DomainEvent::QuotaDeducted(ev)) => {
            assert_eq!(ev.identity, IMSI_1);
            assert_eq!(ev.amount, 30);
            assert_eq!(ev.remaining, 70);
        }
        other => panic!("unexpected event {:?}", other),
    }
    assert!(events.try_recv().is_none());

    core.shutdown().await;
}
