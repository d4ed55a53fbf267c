//! Online charging
//!
//! Per-subscriber quota balance in MB plus the billing listener that follows
//! session starts on the event bus.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use chrono::Utc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::config::BalanceEntry;
use crate::error::QuotaError;
use crate::event::{DomainEvent, EventBus, EventPublisher, QuotaDeducted, SUBJECT_FORWARDING_CREATED};

pub struct QuotaLedger {
    balances: RwLock<HashMap<String, u64>>,
    events: Arc<dyn EventPublisher>,
}

impl QuotaLedger {
    pub fn new(events: Arc<dyn EventPublisher>) -> Self {
        Self {
            balances: RwLock::new(HashMap::new()),
            events,
        }
    }

    pub fn from_entries(entries: &[BalanceEntry], events: Arc<dyn EventPublisher>) -> Self {
        let ledger = Self::new(events);
        for entry in entries {
            ledger.set_balance(&entry.imsi, entry.balance_mb);
        }
        ledger
    }

    pub fn set_balance(&self, imsi: &str, balance_mb: u64) {
        if let Ok(mut balances) = self.balances.write() {
            balances.insert(imsi.to_string(), balance_mb);
        }
    }

    pub fn balance(&self, imsi: &str) -> Option<u64> {
        self.balances.read().ok()?.get(imsi).copied()
    }

    /// Deduct `amount` MB and return the remaining balance
    pub fn deduct(&self, imsi: &str, amount: u64) -> Result<u64, QuotaError> {
        if amount == 0 {
            return Err(QuotaError::InvalidAmount);
        }

        let remaining = {
            let mut balances = self.balances.write().map_err(|_| QuotaError::SubscriberNotFound)?;
            let balance = balances.get_mut(imsi).ok_or(QuotaError::SubscriberNotFound)?;
            if *balance < amount {
                log::warn!("[{}] Quota deduction of {} MB refused (balance {} MB)", imsi, amount, balance);
                return Err(QuotaError::InsufficientBalance);
            }
            *balance -= amount;
            *balance
        };

        log::info!("[{}] Deducted {} MB, {} MB remaining", imsi, amount, remaining);
        self.events.publish(DomainEvent::QuotaDeducted(QuotaDeducted {
            identity: imsi.to_string(),
            amount,
            remaining,
            timestamp: Utc::now(),
        }));
        Ok(remaining)
    }
}

/// Log every session start until `cancel` fires or the bus goes away
pub fn spawn_billing_listener(bus: &EventBus, cancel: CancellationToken) -> JoinHandle<()> {
    let mut sub = bus.subscribe(&[SUBJECT_FORWARDING_CREATED]);
    tokio::spawn(async move {
        loop {
            let event = tokio::select! {
                _ = cancel.cancelled() => break,
                event = sub.recv() => event,
            };
            match event {
                Some(DomainEvent::ForwardingSessionCreated(e)) => {
                    log::info!(
                        "[{}] Billing: session {} started (ue={}, teid=0x{:x})",
                        e.identity,
                        e.session_id,
                        e.address,
                        e.tunnel_id
                    );
                }
                Some(_) => {}
                None => break,
            }
        }
        log::debug!("Billing listener stopped");
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CpConfig;
    use crate::event::SUBJECT_QUOTA_DEDUCTED;

    fn ledger() -> (QuotaLedger, Arc<EventBus>) {
        let bus = Arc::new(EventBus::new());
        (QuotaLedger::from_entries(&CpConfig::default().balances, bus.clone()), bus)
    }

    #[test]
    fn test_deduct_publishes_remaining() {
        let (ledger, bus) = ledger();
        let mut sub = bus.subscribe(&[SUBJECT_QUOTA_DEDUCTED]);

        assert_eq!(ledger.deduct("001010123456789", 30), Ok(70));
        assert_eq!(ledger.balance("001010123456789"), Some(70));

        match sub.try_recv() {
            Some(DomainEvent::QuotaDeducted(e)) => {
                assert_eq!(e.amount, 30);
                assert_eq!(e.remaining, 70);
            }
            other => panic!("unexpected event: {:?}", other),
        }
    }

    #[test]
    fn test_deduct_errors() {
        let (ledger, bus) = ledger();
        let mut sub = bus.subscribe(&[]);

        assert_eq!(ledger.deduct("001010123456789", 0), Err(QuotaError::InvalidAmount));
        assert_eq!(
            ledger.deduct("001010987654321", 1).unwrap_err().to_string(),
            "subscriber not found"
        );
        assert_eq!(
            ledger.deduct("001010123456789", 101).unwrap_err().to_string(),
            "insufficient balance"
        );
        assert_eq!(ledger.balance("001010123456789"), Some(100));
        assert!(sub.try_recv().is_none());
    }

    #[test]
    fn test_exact_balance() {
        let (ledger, _bus) = ledger();
        assert_eq!(ledger.deduct("001010123456789", 100), Ok(0));
        assert_eq!(ledger.deduct("001010123456789", 1), Err(QuotaError::InsufficientBalance));
    }

    #[tokio::test]
    async fn test_billing_listener_stops_on_cancel() {
        let bus = EventBus::new();
        let cancel = CancellationToken::new();
        let handle = spawn_billing_listener(&bus, cancel.clone());
        assert_eq!(bus.subscriber_count(), 1);
        cancel.cancel();
        handle.await.unwrap();
    }
}
