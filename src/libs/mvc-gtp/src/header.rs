//! GTPv2 Header
//!
//! GTPv2-C header structure as specified in 3GPP TS 29.274 clause 5.1.

use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::error::{ensure_remaining, GtpError, GtpResult};

/// GTPv2-C header length (with TEID)
pub const GTPV2C_HEADER_LEN: usize = 12;

/// GTPv2-C header length (without TEID)
pub const GTPV2C_HEADER_LEN_NO_TEID: usize = 8;

const GTP2_VERSION: u8 = 2;

/// GTPv2-C message types handled by the session interface
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Gtp2MessageType {
    EchoRequest = 1,
    EchoResponse = 2,
    CreateSessionRequest = 32,
    CreateSessionResponse = 33,
    ModifyBearerRequest = 34,
    ModifyBearerResponse = 35,
    DeleteSessionRequest = 36,
    DeleteSessionResponse = 37,
}

impl TryFrom<u8> for Gtp2MessageType {
    type Error = GtpError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(Self::EchoRequest),
            2 => Ok(Self::EchoResponse),
            32 => Ok(Self::CreateSessionRequest),
            33 => Ok(Self::CreateSessionResponse),
            34 => Ok(Self::ModifyBearerRequest),
            35 => Ok(Self::ModifyBearerResponse),
            36 => Ok(Self::DeleteSessionRequest),
            37 => Ok(Self::DeleteSessionResponse),
            _ => Err(GtpError::InvalidMessageType(value)),
        }
    }
}

impl Gtp2MessageType {
    pub fn name(&self) -> &'static str {
        match self {
            Self::EchoRequest => "Echo Request",
            Self::EchoResponse => "Echo Response",
            Self::CreateSessionRequest => "Create Session Request",
            Self::CreateSessionResponse => "Create Session Response",
            Self::ModifyBearerRequest => "Modify Bearer Request",
            Self::ModifyBearerResponse => "Modify Bearer Response",
            Self::DeleteSessionRequest => "Delete Session Request",
            Self::DeleteSessionResponse => "Delete Session Response",
        }
    }
}

/// GTPv2-C Header
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Gtp2Header {
    pub message_type: Gtp2MessageType,
    /// Octets following the length field
    pub length: u16,
    /// Present on everything except echo
    pub teid: Option<u32>,
    /// 24-bit sequence number
    pub sequence_number: u32,
}

impl Gtp2Header {
    pub fn new(message_type: Gtp2MessageType, teid: u32, sequence_number: u32) -> Self {
        Self {
            message_type,
            length: 0,
            teid: Some(teid),
            sequence_number: sequence_number & 0x00FF_FFFF,
        }
    }

    pub fn new_no_teid(message_type: Gtp2MessageType, sequence_number: u32) -> Self {
        Self {
            teid: None,
            ..Self::new(message_type, 0, sequence_number)
        }
    }

    pub fn header_len(&self) -> usize {
        if self.teid.is_some() {
            GTPV2C_HEADER_LEN
        } else {
            GTPV2C_HEADER_LEN_NO_TEID
        }
    }

    /// Length of the IE payload announced by the length field
    pub fn payload_len(&self) -> GtpResult<usize> {
        (self.length as usize)
            .checked_sub(self.header_len() - 4)
            .ok_or_else(|| GtpError::InvalidHeader(format!("length {} too small", self.length)))
    }

    pub fn set_payload_len(&mut self, payload_len: usize) {
        self.length = (payload_len + self.header_len() - 4) as u16;
    }

    pub fn encode(&self, buf: &mut BytesMut) {
        let t_flag = if self.teid.is_some() { 0x08 } else { 0x00 };
        buf.put_u8((GTP2_VERSION << 5) | t_flag);
        buf.put_u8(self.message_type as u8);
        buf.put_u16(self.length);
        if let Some(teid) = self.teid {
            buf.put_u32(teid);
        }
        buf.put_u32(self.sequence_number << 8);
    }

    pub fn decode(buf: &mut Bytes) -> GtpResult<Self> {
        ensure_remaining(buf.remaining(), 4)?;

        let flags = buf.get_u8();
        let version = (flags >> 5) & 0x07;
        if version != GTP2_VERSION {
            return Err(GtpError::InvalidVersion(version));
        }
        if flags & 0x10 != 0 {
            return Err(GtpError::InvalidHeader("piggybacking not supported".to_string()));
        }
        let has_teid = flags & 0x08 != 0;

        let message_type = Gtp2MessageType::try_from(buf.get_u8())?;
        let length = buf.get_u16();

        ensure_remaining(buf.remaining(), if has_teid { 8 } else { 4 })?;
        let teid = if has_teid { Some(buf.get_u32()) } else { None };
        let sequence_number = buf.get_u32() >> 8;

        Ok(Self {
            message_type,
            length,
            teid,
            sequence_number,
        })
    }
}
