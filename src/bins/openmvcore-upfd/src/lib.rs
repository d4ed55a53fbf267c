//! OpenMVCore user plane N4 responder
//!
//! A minimal PFCP peer for the session control plane: it accepts the
//! association, answers heartbeats and keeps a table of established
//! sessions keyed by its own SEID. No packets are forwarded.

pub mod context;
pub mod pfcp_path;

pub use context::{UpSession, UpSessionTable};
pub use pfcp_path::PfcpServer;
