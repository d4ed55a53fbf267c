//! Control plane context
//!
//! Builds every store and service from a [`CpConfig`] and wires them
//! together. Nothing here is global; the daemon and the integration tests
//! each own their context.

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::sync::Arc;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::amf_context::SubscriberStore;
use crate::config::CpConfig;
use crate::error::PoolError;
use crate::event::EventBus;
use crate::gmm_handler::Authenticator;
use crate::gtp_path::GtpServer;
use crate::ngap_path::NgapServer;
use crate::ocs::{spawn_billing_listener, QuotaLedger};
use crate::pfcp_path::ForwardingRuleInstaller;
use crate::sess_manager::SessionManager;
use crate::smf_context::{QosProfile, SessionStore};
use crate::udm_context::CredentialStore;
use crate::ue_ip_pool::UeIpPool;

pub struct CpContext {
    pub config: CpConfig,
    pub events: Arc<EventBus>,
    pub credentials: Arc<CredentialStore>,
    pub subscribers: Arc<SubscriberStore>,
    pub authenticator: Arc<Authenticator>,
    pub sessions: Arc<SessionStore>,
    pub pool: Arc<UeIpPool>,
    pub manager: Arc<SessionManager>,
    pub ledger: Arc<QuotaLedger>,
}

impl CpContext {
    pub fn new(config: CpConfig, installer: Arc<dyn ForwardingRuleInstaller>) -> Result<Self, PoolError> {
        let events = Arc::new(EventBus::with_capacity(config.events.capacity));
        let credentials = Arc::new(CredentialStore::from_entries(&config.subscribers));
        let subscribers = Arc::new(SubscriberStore::new());
        let authenticator = Arc::new(Authenticator::new(
            credentials.clone(),
            subscribers.clone(),
            events.clone(),
        ));

        let pool = Arc::new(UeIpPool::new(config.ue_pool.first, config.ue_pool.last)?);
        let sessions = Arc::new(SessionStore::new());
        let manager = Arc::new(SessionManager::new(
            sessions.clone(),
            pool.clone(),
            installer,
            events.clone(),
            QosProfile::from(&config.qos),
            config.qos.bearer_id,
        ));
        let ledger = Arc::new(QuotaLedger::from_entries(&config.balances, events.clone()));

        log::info!(
            "Control plane context ready ({} subscribers, {} UE addresses)",
            credentials.len(),
            pool.capacity()
        );

        Ok(Self {
            config,
            events,
            credentials,
            subscribers,
            authenticator,
            sessions,
            pool,
            manager,
            ledger,
        })
    }

    /// User plane address advertised in the core F-TEID
    pub fn up_addr(&self) -> Ipv4Addr {
        match self.config.pfcp.upf_addr.ip() {
            IpAddr::V4(ip) if !ip.is_unspecified() => ip,
            _ => Ipv4Addr::LOCALHOST,
        }
    }
}

/// Running listeners
pub struct CpServices {
    pub ngap_addr: SocketAddr,
    pub gtpc_addr: SocketAddr,
    tasks: Vec<JoinHandle<()>>,
}

impl CpServices {
    /// Wait for every listener task to finish
    pub async fn join(self) {
        for task in self.tasks {
            if let Err(e) = task.await {
                log::error!("Service task failed: {}", e);
            }
        }
    }
}

/// Bind the registration and session listeners and start the billing listener
///
/// A bind failure is returned to the caller; everything else runs until
/// `cancel` fires.
pub async fn start_services(ctx: &CpContext, cancel: &CancellationToken) -> std::io::Result<CpServices> {
    let ngap = NgapServer::bind(ctx.config.ngap.addr, ctx.authenticator.clone()).await?;
    let gtpc = GtpServer::bind(ctx.config.gtpc.addr, ctx.manager.clone(), ctx.up_addr()).await?;
    let ngap_addr = ngap.local_addr()?;
    let gtpc_addr = gtpc.local_addr()?;

    let tasks = vec![
        tokio::spawn(ngap.run(cancel.clone())),
        tokio::spawn(gtpc.run(cancel.clone())),
        spawn_billing_listener(&ctx.events, cancel.clone()),
    ];

    Ok(CpServices {
        ngap_addr,
        gtpc_addr,
        tasks,
    })
}
