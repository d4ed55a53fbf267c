//! OpenMVCore PFCP Library
//!
//! Encoding and decoding of the PFCP (3GPP TS 29.244) subset spoken on the N4
//! reference point between the session control plane and the user plane:
//! node-level heartbeat and association setup, plus session establishment and
//! deletion carrying the packet detection, forwarding and QoS rules for a
//! single default bearer.
//!
//! # Example
//!
//! ```rust
//! use mvc_pfcp::message::{HeartbeatRequest, PfcpMessage, build_message, parse_message};
//!
//! let msg = PfcpMessage::HeartbeatRequest(HeartbeatRequest::new(1_700_000_000));
//! let mut bytes = build_message(&msg, 7, None).freeze();
//! let (header, decoded) = parse_message(&mut bytes).unwrap();
//! assert_eq!(header.sequence_number, 7);
//! assert_eq!(decoded, msg);
//! ```

pub mod error;
pub mod header;
pub mod ie;
pub mod message;
pub mod types;


pub use error::{PfcpError, PfcpResult};
pub use header::{PfcpHeader, PfcpMessageType, PFCP_HEADER_LEN, PFCP_HEADER_LEN_WITH_SEID};
pub use types::{PFCP_MAX_SEQUENCE_NUMBER, PFCP_UDP_PORT};

/// Re-export commonly used types
pub mod prelude {
    pub use crate::error::{PfcpError, PfcpResult};
    pub use crate::header::{PfcpHeader, PfcpMessageType};
    pub use crate::message::{
        build_message, parse_message, AssociationSetupRequest, AssociationSetupResponse,
        HeartbeatRequest, HeartbeatResponse, PfcpMessage, SessionDeletionRequest,
        SessionDeletionResponse, SessionEstablishmentRequest, SessionEstablishmentResponse,
        SessionModificationRequest, SessionModificationResponse,
    };
    pub use crate::types::{
        ApplyAction, Bitrate, CreateFar, CreatePdr, CreateQer, CreatedPdr,
        DestinationInterface, FSeid, FTeid, ForwardingParameters, GateStatus, NodeId,
        OuterHeaderCreation, OuterHeaderRemoval, Pdi, PfcpCause, SourceInterface, UeIpAddress,
        UpdateQer,
    };
}
