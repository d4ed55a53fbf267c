//! Registration message codec
//!
//! Frames are a 4-byte big-endian length, a 1-byte message type and a JSON
//! body. The length covers the type byte and the body.

use bytes::{BufMut, Bytes, BytesMut};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::CodecError;

pub const NGAP_FRAME_HEADER_LEN: usize = 4;
pub const MAX_NGAP_FRAME_LEN: usize = 64 * 1024;

pub const NG_SETUP_REQUEST: u8 = 1;
pub const NG_SETUP_RESPONSE: u8 = 2;
pub const INITIAL_UE_MESSAGE: u8 = 3;
pub const REGISTRATION_RESPONSE: u8 = 4;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NgSetupRequest {
    pub gnb_id: String,
    #[serde(default)]
    pub gnb_name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NgSetupResponse {
    pub amf_name: String,
    pub accepted: bool,
}

/// Registration request from the access node
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InitialUeMessage {
    pub transient_session_id: String,
    pub subscriber_identity: String,
    pub presented_secret: String,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegistrationResponse {
    pub success: bool,
    pub reason: String,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NgapMessage {
    NgSetupRequest(NgSetupRequest),
    NgSetupResponse(NgSetupResponse),
    InitialUeMessage(InitialUeMessage),
    RegistrationResponse(RegistrationResponse),
}

impl NgapMessage {
    pub fn message_type(&self) -> u8 {
        match self {
            NgapMessage::NgSetupRequest(_) => NG_SETUP_REQUEST,
            NgapMessage::NgSetupResponse(_) => NG_SETUP_RESPONSE,
            NgapMessage::InitialUeMessage(_) => INITIAL_UE_MESSAGE,
            NgapMessage::RegistrationResponse(_) => REGISTRATION_RESPONSE,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            NgapMessage::NgSetupRequest(_) => "NGSetupRequest",
            NgapMessage::NgSetupResponse(_) => "NGSetupResponse",
            NgapMessage::InitialUeMessage(_) => "InitialUEMessage",
            NgapMessage::RegistrationResponse(_) => "RegistrationResponse",
        }
    }

    /// Complete frame including the length prefix
    pub fn encode(&self) -> Result<BytesMut, CodecError> {
        let body = match self {
            NgapMessage::NgSetupRequest(m) => serde_json::to_vec(m)?,
            NgapMessage::NgSetupResponse(m) => serde_json::to_vec(m)?,
            NgapMessage::InitialUeMessage(m) => serde_json::to_vec(m)?,
            NgapMessage::RegistrationResponse(m) => serde_json::to_vec(m)?,
        };
        let frame_len = body.len() + 1;
        if frame_len > MAX_NGAP_FRAME_LEN {
            return Err(CodecError::Oversized(frame_len));
        }

        let mut buf = BytesMut::with_capacity(NGAP_FRAME_HEADER_LEN + frame_len);
        buf.put_u32(frame_len as u32);
        buf.put_u8(self.message_type());
        buf.put_slice(&body);
        Ok(buf)
    }

    /// Decode a frame body (type byte and JSON, without the length prefix)
    pub fn decode(frame: &Bytes) -> Result<Self, CodecError> {
        let Some((&message_type, body)) = frame.split_first() else {
            return Err(CodecError::Truncated { needed: 1, available: 0 });
        };
        let msg = match message_type {
            NG_SETUP_REQUEST => NgapMessage::NgSetupRequest(serde_json::from_slice(body)?),
            NG_SETUP_RESPONSE => NgapMessage::NgSetupResponse(serde_json::from_slice(body)?),
            INITIAL_UE_MESSAGE => NgapMessage::InitialUeMessage(serde_json::from_slice(body)?),
            REGISTRATION_RESPONSE => NgapMessage::RegistrationResponse(serde_json::from_slice(body)?),
            other => return Err(CodecError::UnknownMessageType(other)),
        };
        Ok(msg)
    }
}

pub fn build_registration_response(success: bool, reason: String) -> NgapMessage {
    NgapMessage::RegistrationResponse(RegistrationResponse {
        success,
        reason,
        timestamp: Utc::now(),
    })
}
