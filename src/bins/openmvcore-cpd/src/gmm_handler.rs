//! Registration authenticator
//!
//! Validates a registration against the credential store, records the
//! outcome in the subscriber store and announces successful registrations.

use std::net::SocketAddr;
use std::sync::Arc;

use chrono::Utc;

use crate::amf_context::{AuthResult, SubscriberStore};
use crate::error::AuthError;
use crate::event::{DomainEvent, EventPublisher, SubscriberRegistered};
use crate::udm_context::CredentialStore;

pub const MIN_IMSI_LEN: usize = 10;
pub const MAX_IMSI_LEN: usize = 15;

pub const AUTH_SUCCESS_REASON: &str = "authentication successful";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthOutcome {
    pub result: Result<(), AuthError>,
}

impl AuthOutcome {
    pub fn passed(&self) -> bool {
        self.result.is_ok()
    }

    pub fn reason(&self) -> String {
        match &self.result {
            Ok(()) => AUTH_SUCCESS_REASON.to_string(),
            Err(e) => e.to_string(),
        }
    }
}

fn validate_imsi(imsi: &str) -> Result<(), AuthError> {
    if imsi.len() < MIN_IMSI_LEN || imsi.len() > MAX_IMSI_LEN || !imsi.bytes().all(|b| b.is_ascii_digit()) {
        return Err(AuthError::MalformedIdentity);
    }
    Ok(())
}

pub struct Authenticator {
    credentials: Arc<CredentialStore>,
    subscribers: Arc<SubscriberStore>,
    events: Arc<dyn EventPublisher>,
}

impl Authenticator {
    pub fn new(
        credentials: Arc<CredentialStore>,
        subscribers: Arc<SubscriberStore>,
        events: Arc<dyn EventPublisher>,
    ) -> Self {
        Self {
            credentials,
            subscribers,
            events,
        }
    }

    pub fn subscribers(&self) -> &Arc<SubscriberStore> {
        &self.subscribers
    }

    /// Authenticate one registration attempt
    ///
    /// A malformed identity is rejected before either store is consulted.
    /// Every well-formed attempt overwrites the subscriber context.
    pub fn authenticate(&self, imsi: &str, secret: &str, ran_ue_id: &str, access_peer: SocketAddr) -> AuthOutcome {
        if let Err(e) = validate_imsi(imsi) {
            log::warn!("[{}] Registration rejected: malformed identity ({} chars)", access_peer, imsi.len());
            return AuthOutcome { result: Err(e) };
        }

        let result = match self.credentials.secret(imsi) {
            None => Err(AuthError::UnknownIdentity),
            Some(stored) if stored == secret => Ok(()),
            Some(_) => Err(AuthError::InvalidCredential),
        };

        let auth_result = if result.is_ok() { AuthResult::Pass } else { AuthResult::Fail };
        self.subscribers.upsert(imsi, ran_ue_id, access_peer, auth_result);

        match &result {
            Ok(()) => {
                log::info!("[{}] Registration accepted (ran_ue_id={}, peer={})", imsi, ran_ue_id, access_peer);
                self.events.publish(DomainEvent::SubscriberRegistered(SubscriberRegistered {
                    identity: imsi.to_string(),
                    session_id: ran_ue_id.to_string(),
                    timestamp: Utc::now(),
                }));
            }
            Err(e) => log::warn!("[{}] Registration rejected: {} (peer={})", imsi, e, access_peer),
        }

        AuthOutcome { result }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::amf_context::RegistrationStatus;
    use crate::config::CpConfig;
    use crate::event::{EventBus, SUBJECT_SUBSCRIBER_REGISTERED};

    fn gnb() -> SocketAddr {
        "192.0.2.1:38412".parse().unwrap()
    }

    fn setup() -> (Authenticator, Arc<EventBus>) {
        let bus = Arc::new(EventBus::new());
        let auth = Authenticator::new(
            Arc::new(CredentialStore::from_entries(&CpConfig::default().subscribers)),
            Arc::new(SubscriberStore::new()),
            bus.clone(),
        );
        (auth, bus)
    }

    #[test]
    fn test_valid_credentials_pass() {
        let (auth, bus) = setup();
        let mut sub = bus.subscribe(&[SUBJECT_SUBSCRIBER_REGISTERED]);

        let outcome = auth.authenticate("001010123456789", "secret123", "ran-1", gnb());
        assert!(outcome.passed());
        assert_eq!(outcome.reason(), "authentication successful");

        let ue = auth.subscribers().find("001010123456789").unwrap();
        assert_eq!(ue.status, RegistrationStatus::Registered);
        assert_eq!(ue.access_peer, gnb());

        match sub.try_recv() {
            Some(DomainEvent::SubscriberRegistered(e)) => {
                assert_eq!(e.identity, "001010123456789");
                assert_eq!(e.session_id, "ran-1");
            }
            other => panic!("unexpected event: {:?}", other),
        }
    }

    #[test]
    fn test_wrong_secret() {
        let (auth, bus) = setup();
        let mut sub = bus.subscribe(&[]);

        let outcome = auth.authenticate("001010123456789", "wrong", "ran-1", gnb());
        assert_eq!(outcome.result, Err(AuthError::InvalidCredential));
        assert_eq!(outcome.reason(), "invalid credential");

        let ue = auth.subscribers().find("001010123456789").unwrap();
        assert_eq!(ue.status, RegistrationStatus::AuthFailed);
        assert!(sub.try_recv().is_none());
    }

    #[test]
    fn test_unknown_identity_recorded() {
        let (auth, _bus) = setup();
        let outcome = auth.authenticate("999999999999999", "x", "ran-1", gnb());
        assert_eq!(outcome.reason(), "unknown identity");
        assert_eq!(
            auth.subscribers().find("999999999999999").unwrap().status,
            RegistrationStatus::AuthFailed
        );
    }

    #[test]
    fn test_malformed_identity_not_recorded() {
        let (auth, _bus) = setup();
        for imsi in ["", "12345", "00101abc456789", "0010101234567890"] {
            let outcome = auth.authenticate(imsi, "secret123", "ran-1", gnb());
            assert_eq!(outcome.result, Err(AuthError::MalformedIdentity));
        }
        assert_eq!(auth.subscribers().count(), 0);
    }

    #[test]
    fn test_last_outcome_overwrites() {
        let (auth, _bus) = setup();
        auth.authenticate("001010123456789", "secret123", "ran-1", gnb());
        auth.authenticate("001010123456789", "bad", "ran-2", gnb());
        let ue = auth.subscribers().find("001010123456789").unwrap();
        assert_eq!(ue.auth_result, AuthResult::Fail);
        assert_eq!(ue.ran_ue_id, "ran-2");
    }
}
