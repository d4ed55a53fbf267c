//! OpenMVCore integration tests
//!
//! Drives the control plane through its real listeners (TCP registration,
//! GTPv2-C over UDP) with the user plane responder on the N4 side.
//!
//! ## Test Categories
//!
//! - `registration`: subscriber authentication and registration events
//! - `session`: session create/modify/delete and UE address reuse
//! - `pfcp`: N4 association, heartbeat and install timeout handling

pub mod pfcp;
pub mod registration;
pub mod session;
