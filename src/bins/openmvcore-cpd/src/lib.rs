//! OpenMVCore session control plane
//!
//! Registration, session management and user plane peering for a
//! simplified mobile core:
//!
//! - `gmm_handler`: registration authenticator over the credential store
//! - `sess_manager`: per-subscriber session state machine
//! - `ue_ip_pool`: UE address allocation with reclaim
//! - `pfcp_path`: forwarding rule installation towards the user plane
//! - `event`: domain events for billing and other collaborators
//!
//! # Interfaces
//!
//! - N2-style registration over a framed stream (`ngap_path`)
//! - GTPv2-C session requests over UDP (`gtp_path`)
//! - N4/PFCP towards the user plane (`pfcp_path`)

pub mod amf_context;
pub mod config;
pub mod context;
pub mod error;
pub mod event;
pub mod gmm_handler;
pub mod gsm_sm;
pub mod gtp_build;
pub mod gtp_path;
pub mod n4_build;
pub mod ngap_build;
pub mod ngap_path;
pub mod ocs;
pub mod pfcp_path;
pub mod sess_manager;
pub mod smf_context;
pub mod udm_context;
pub mod ue_ip_pool;


pub use config::CpConfig;
pub use context::{start_services, CpContext, CpServices};
pub use error::{AuthError, CodecError, InstallError, PoolError, QuotaError, SessionError};
pub use event::{DomainEvent, EventBus, EventPublisher};
pub use pfcp_path::{ForwardingRuleInstaller, InstallAck, PfcpInstaller};
pub use sess_manager::SessionManager;
