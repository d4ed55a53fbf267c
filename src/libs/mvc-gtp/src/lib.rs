//! OpenMVCore GTPv2-C Library
//!
//! Encoding and decoding of the GTPv2-C (3GPP TS 29.274) subset that drives
//! the session interface of the control plane: echo, create/modify/delete
//! session exchanges with the information elements needed for a single
//! default bearer (IMSI, cause, F-TEID, PAA, EBI, bearer QoS).

pub mod error;
pub mod header;
pub mod ie;
pub mod message;


pub use error::{GtpError, GtpResult};
pub use header::{Gtp2Header, Gtp2MessageType, GTPV2C_HEADER_LEN, GTPV2C_HEADER_LEN_NO_TEID};
pub use ie::{BearerQos, FTeid, Gtp2Cause, Gtp2Ie, Gtp2IeType};
pub use message::{
    CreateSessionRequest, CreateSessionResponse, DeleteSessionRequest, DeleteSessionResponse,
    Gtp2Message, ModifyBearerRequest, ModifyBearerResponse,
};

/// GTPv2-C UDP port (2123)
pub const GTPV2_C_UDP_PORT: u16 = 2123;

/// F-TEID interface type: S1-U eNodeB GTP-U
pub const F_TEID_S1_U_ENODEB_GTP_U: u8 = 0;

/// F-TEID interface type: S1-U SGW GTP-U
pub const F_TEID_S1_U_SGW_GTP_U: u8 = 1;
