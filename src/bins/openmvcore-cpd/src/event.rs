//! Domain events
//!
//! Events are published on a process-local broadcast bus. Delivery is
//! at-most-once: a subscriber that falls behind loses the oldest events and
//! publishing with no subscribers drops the event after a log line.

use std::net::Ipv4Addr;
use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use uuid::Uuid;

pub const SUBJECT_SUBSCRIBER_REGISTERED: &str = "subscriber.registered";
pub const SUBJECT_FORWARDING_CREATED: &str = "session.forwarding.created";
pub const SUBJECT_QUOTA_DEDUCTED: &str = "quota.deducted";

pub const DEFAULT_EVENT_CAPACITY: usize = 1024;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubscriberRegistered {
    pub identity: String,
    /// Transient identifier presented by the access node
    pub session_id: String,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ForwardingSessionCreated {
    pub identity: String,
    pub session_id: Uuid,
    pub tunnel_id: u32,
    pub address: Ipv4Addr,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuotaDeducted {
    pub identity: String,
    pub amount: u64,
    pub remaining: u64,
    pub timestamp: DateTime<Utc>,
}

/// Event carried on the bus; serialized as the bare payload
///
/// The subject travels beside the payload, so decoding goes through
/// [`DomainEvent::from_payload`] rather than `Deserialize`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum DomainEvent {
    SubscriberRegistered(SubscriberRegistered),
    ForwardingSessionCreated(ForwardingSessionCreated),
    QuotaDeducted(QuotaDeducted),
}

impl DomainEvent {
    pub fn subject(&self) -> &'static str {
        match self {
            DomainEvent::SubscriberRegistered(_) => SUBJECT_SUBSCRIBER_REGISTERED,
            DomainEvent::ForwardingSessionCreated(_) => SUBJECT_FORWARDING_CREATED,
            DomainEvent::QuotaDeducted(_) => SUBJECT_QUOTA_DEDUCTED,
        }
    }

    pub fn identity(&self) -> &str {
        match self {
            DomainEvent::SubscriberRegistered(e) => &e.identity,
            DomainEvent::ForwardingSessionCreated(e) => &e.identity,
            DomainEvent::QuotaDeducted(e) => &e.identity,
        }
    }

    /// JSON payload as published on the subject
    pub fn payload(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Decode a payload received on `subject`
    ///
    /// Returns `Ok(None)` for subjects this bus does not carry.
    pub fn from_payload(subject: &str, payload: &str) -> Result<Option<Self>, serde_json::Error> {
        let event = match subject {
            SUBJECT_SUBSCRIBER_REGISTERED => DomainEvent::SubscriberRegistered(serde_json::from_str(payload)?),
            SUBJECT_FORWARDING_CREATED => DomainEvent::ForwardingSessionCreated(serde_json::from_str(payload)?),
            SUBJECT_QUOTA_DEDUCTED => DomainEvent::QuotaDeducted(serde_json::from_str(payload)?),
            _ => return Ok(None),
        };
        Ok(Some(event))
    }
}

/// Publishing side of the event bus
pub trait EventPublisher: Send + Sync {
    /// Publish without blocking; returns the number of subscribers reached
    fn publish(&self, event: DomainEvent) -> usize;
}

/// In-process event bus backed by a broadcast channel
pub struct EventBus {
    sender: broadcast::Sender<DomainEvent>,
    published: AtomicU64,
}

impl EventBus {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_EVENT_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self {
            sender,
            published: AtomicU64::new(0),
        }
    }

    /// Subscribe to the given subjects; an empty list means every subject
    pub fn subscribe(&self, subjects: &[&'static str]) -> Subscription {
        log::debug!("New event subscription {:?}", subjects);
        Subscription {
            receiver: self.sender.subscribe(),
            subjects: subjects.to_vec(),
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }

    pub fn events_published(&self) -> u64 {
        self.published.load(Ordering::Relaxed)
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl EventPublisher for EventBus {
    fn publish(&self, event: DomainEvent) -> usize {
        let subject = event.subject();
        self.published.fetch_add(1, Ordering::Relaxed);

        match self.sender.send(event) {
            Ok(receivers) => {
                log::debug!("Event [{}] published to {} receiver(s)", subject, receivers);
                receivers
            }
            Err(_) => {
                log::warn!("Event [{}] dropped (no receivers)", subject);
                0
            }
        }
    }
}

/// Receiving side filtered by subject
pub struct Subscription {
    receiver: broadcast::Receiver<DomainEvent>,
    subjects: Vec<&'static str>,
}

impl Subscription {
    fn accepts(&self, event: &DomainEvent) -> bool {
        self.subjects.is_empty() || self.subjects.contains(&event.subject())
    }

    /// Next matching event, or `None` once the bus is gone
    pub async fn recv(&mut self) -> Option<DomainEvent> {
        loop {
            match self.receiver.recv().await {
                Ok(event) if self.accepts(&event) => return Some(event),
                Ok(_) => continue,
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    log::warn!("Event subscriber lagged, {} event(s) lost", skipped);
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }

    /// Non-blocking variant of [`Subscription::recv`]
    pub fn try_recv(&mut self) -> Option<DomainEvent> {
        loop {
            match self.receiver.try_recv() {
                Ok(event) if self.accepts(&event) => return Some(event),
                Ok(_) => continue,
                Err(broadcast::error::TryRecvError::Lagged(skipped)) => {
                    log::warn!("Event subscriber lagged, {} event(s) lost", skipped);
                }
                Err(_) => return None,
            }
        }
    }
}
