//! PFCP Header
//!
//! PFCP message header as specified in 3GPP TS 29.244 clause 7.2.2.

use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::error::{ensure_remaining, PfcpError, PfcpResult};
use crate::types::{PFCP_MAX_SEQUENCE_NUMBER, PFCP_VERSION};

/// PFCP Header length without SEID (8 bytes)
pub const PFCP_HEADER_LEN: usize = 8;

/// PFCP Header length with SEID (16 bytes)
pub const PFCP_HEADER_LEN_WITH_SEID: usize = 16;

/// Octets after the length field that still belong to the header.
const TRAILER_LEN: usize = 4;
const TRAILER_LEN_WITH_SEID: usize = 12;

/// PFCP message types exchanged on N4
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum PfcpMessageType {
    HeartbeatRequest = 1,
    HeartbeatResponse = 2,
    AssociationSetupRequest = 5,
    AssociationSetupResponse = 6,
    SessionEstablishmentRequest = 50,
    SessionEstablishmentResponse = 51,
    SessionModificationRequest = 52,
    SessionModificationResponse = 53,
    SessionDeletionRequest = 54,
    SessionDeletionResponse = 55,
}

impl TryFrom<u8> for PfcpMessageType {
    type Error = PfcpError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(Self::HeartbeatRequest),
            2 => Ok(Self::HeartbeatResponse),
            5 => Ok(Self::AssociationSetupRequest),
            6 => Ok(Self::AssociationSetupResponse),
            50 => Ok(Self::SessionEstablishmentRequest),
            51 => Ok(Self::SessionEstablishmentResponse),
            52 => Ok(Self::SessionModificationRequest),
            53 => Ok(Self::SessionModificationResponse),
            54 => Ok(Self::SessionDeletionRequest),
            55 => Ok(Self::SessionDeletionResponse),
            _ => Err(PfcpError::InvalidMessageType(value)),
        }
    }
}

impl PfcpMessageType {
    /// Session related messages carry a SEID in the header
    pub fn has_seid(&self) -> bool {
        matches!(
            self,
            Self::SessionEstablishmentRequest
                | Self::SessionEstablishmentResponse
                | Self::SessionModificationRequest
                | Self::SessionModificationResponse
                | Self::SessionDeletionRequest
                | Self::SessionDeletionResponse
        )
    }

    /// Whether this message answers a request
    pub fn is_response(&self) -> bool {
        matches!(
            self,
            Self::HeartbeatResponse
                | Self::AssociationSetupResponse
                | Self::SessionEstablishmentResponse
                | Self::SessionModificationResponse
                | Self::SessionDeletionResponse
        )
    }

    /// Get the name of the message type
    pub fn name(&self) -> &'static str {
        match self {
            Self::HeartbeatRequest => "Heartbeat Request",
            Self::HeartbeatResponse => "Heartbeat Response",
            Self::AssociationSetupRequest => "Association Setup Request",
            Self::AssociationSetupResponse => "Association Setup Response",
            Self::SessionEstablishmentRequest => "Session Establishment Request",
            Self::SessionEstablishmentResponse => "Session Establishment Response",
            Self::SessionModificationRequest => "Session Modification Request",
            Self::SessionModificationResponse => "Session Modification Response",
            Self::SessionDeletionRequest => "Session Deletion Request",
            Self::SessionDeletionResponse => "Session Deletion Response",
        }
    }
}

/// PFCP Header
///
/// ```text
/// octet 1     | Version(3) | Spare(2) | FO | MP | S |
/// octet 2     | Message Type                       |
/// octet 3-4   | Message Length                     |
/// octet 5-12  | SEID (only when S = 1)             |
/// +3 octets   | Sequence Number                    |
/// +1 octet    | Spare / Message Priority           |
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PfcpHeader {
    pub version: u8,
    pub message_type: PfcpMessageType,
    /// Octets following the length field, header trailer included
    pub length: u16,
    pub seid: Option<u64>,
    /// 24-bit transaction sequence number
    pub sequence_number: u32,
}

impl PfcpHeader {
    /// Node related header (no SEID)
    pub fn new(message_type: PfcpMessageType, sequence_number: u32) -> Self {
        Self {
            version: PFCP_VERSION,
            message_type,
            length: 0,
            seid: None,
            sequence_number: sequence_number & PFCP_MAX_SEQUENCE_NUMBER,
        }
    }

    /// Session related header
    pub fn new_with_seid(message_type: PfcpMessageType, seid: u64, sequence_number: u32) -> Self {
        Self {
            seid: Some(seid),
            ..Self::new(message_type, sequence_number)
        }
    }

    /// Header length on the wire
    pub fn header_len(&self) -> usize {
        if self.seid.is_some() {
            PFCP_HEADER_LEN_WITH_SEID
        } else {
            PFCP_HEADER_LEN
        }
    }

    /// Length of the message body announced by the length field
    pub fn body_len(&self) -> PfcpResult<usize> {
        let trailer = if self.seid.is_some() { TRAILER_LEN_WITH_SEID } else { TRAILER_LEN };
        (self.length as usize)
            .checked_sub(trailer)
            .ok_or(PfcpError::InvalidLength(self.length))
    }

    /// Set the length field for a body of `body_len` octets
    pub fn set_body_len(&mut self, body_len: usize) {
        let trailer = if self.seid.is_some() { TRAILER_LEN_WITH_SEID } else { TRAILER_LEN };
        self.length = (body_len + trailer) as u16;
    }

    pub fn encode(&self, buf: &mut BytesMut) {
        let s_flag = self.seid.is_some() as u8;
        buf.put_u8(((self.version & 0x07) << 5) | s_flag);
        buf.put_u8(self.message_type as u8);
        buf.put_u16(self.length);
        if let Some(seid) = self.seid {
            buf.put_u64(seid);
        }
        // 3-octet sequence number followed by a spare octet
        buf.put_u32((self.sequence_number & PFCP_MAX_SEQUENCE_NUMBER) << 8);
    }

    pub fn decode(buf: &mut Bytes) -> PfcpResult<Self> {
        ensure_remaining(buf.remaining(), 4)?;

        let flags = buf.get_u8();
        let version = (flags >> 5) & 0x07;
        if version != PFCP_VERSION {
            return Err(PfcpError::VersionNotSupported(version));
        }
        let has_seid = flags & 0x01 != 0;

        let message_type = PfcpMessageType::try_from(buf.get_u8())?;
        let length = buf.get_u16();

        let trailer = if has_seid { TRAILER_LEN_WITH_SEID } else { TRAILER_LEN };
        ensure_remaining(buf.remaining(), trailer)?;

        let seid = if has_seid { Some(buf.get_u64()) } else { None };
        let sequence_number = buf.get_u32() >> 8;

        Ok(Self {
            version,
            message_type,
            length,
            seid,
            sequence_number,
        })
    }
}
