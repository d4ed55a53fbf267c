//! PFCP Messages
//!
//! N4 message bodies and whole-message framing.

use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::error::{ensure_remaining, PfcpError, PfcpResult};
use crate::header::{PfcpHeader, PfcpMessageType};
use crate::ie::{decode_ies, encode_ie_with, encode_u32_ie, encode_u8_ie, IeType, RawIe};
use crate::types::{
    CreateFar, CreatePdr, CreateQer, CreatedPdr, FSeid, NodeId, PfcpCause, UpdateQer,
};

fn decode_cause(ie: &RawIe) -> PfcpResult<PfcpCause> {
    let value = ie.first_octet().ok_or(PfcpError::MissingMandatoryIe("Cause"))?;
    PfcpCause::try_from(value)
}

fn encode_node_id(buf: &mut BytesMut, node_id: &NodeId) {
    encode_ie_with(buf, IeType::NodeId, |b| node_id.encode(b));
}

// ============================================================================
// Node related messages
// ============================================================================

/// Heartbeat Request (TS 29.244 clause 7.4.2.1)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeartbeatRequest {
    pub recovery_time_stamp: u32,
}

impl HeartbeatRequest {
    pub fn new(recovery_time_stamp: u32) -> Self {
        Self { recovery_time_stamp }
    }

    pub fn encode(&self, buf: &mut BytesMut) {
        encode_u32_ie(buf, IeType::RecoveryTimeStamp, self.recovery_time_stamp);
    }

    pub fn decode(buf: &mut Bytes) -> PfcpResult<Self> {
        let recovery_time_stamp = decode_ies(buf)?
            .iter()
            .find(|ie| IeType::RecoveryTimeStamp.matches(ie.ie_type))
            .and_then(RawIe::u32_value)
            .ok_or(PfcpError::MissingMandatoryIe("Recovery Time Stamp"))?;
        Ok(Self { recovery_time_stamp })
    }
}

/// Heartbeat Response (TS 29.244 clause 7.4.2.2)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeartbeatResponse {
    pub recovery_time_stamp: u32,
}

impl HeartbeatResponse {
    pub fn new(recovery_time_stamp: u32) -> Self {
        Self { recovery_time_stamp }
    }

    pub fn encode(&self, buf: &mut BytesMut) {
        encode_u32_ie(buf, IeType::RecoveryTimeStamp, self.recovery_time_stamp);
    }

    pub fn decode(buf: &mut Bytes) -> PfcpResult<Self> {
        let HeartbeatRequest { recovery_time_stamp } = HeartbeatRequest::decode(buf)?;
        Ok(Self { recovery_time_stamp })
    }
}

/// Association Setup Request (TS 29.244 clause 7.4.4.1)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssociationSetupRequest {
    pub node_id: NodeId,
    pub recovery_time_stamp: u32,
}

impl AssociationSetupRequest {
    pub fn new(node_id: NodeId, recovery_time_stamp: u32) -> Self {
        Self {
            node_id,
            recovery_time_stamp,
        }
    }

    pub fn encode(&self, buf: &mut BytesMut) {
        encode_node_id(buf, &self.node_id);
        encode_u32_ie(buf, IeType::RecoveryTimeStamp, self.recovery_time_stamp);
    }

    pub fn decode(buf: &mut Bytes) -> PfcpResult<Self> {
        let mut node_id = None;
        let mut recovery_time_stamp = None;
        for ie in decode_ies(buf)? {
            match ie.ie_type {
                t if IeType::NodeId.matches(t) => node_id = Some(NodeId::decode(&mut ie.data.clone())?),
                t if IeType::RecoveryTimeStamp.matches(t) => recovery_time_stamp = ie.u32_value(),
                _ => {}
            }
        }
        Ok(Self {
            node_id: node_id.ok_or(PfcpError::MissingMandatoryIe("Node ID"))?,
            recovery_time_stamp: recovery_time_stamp
                .ok_or(PfcpError::MissingMandatoryIe("Recovery Time Stamp"))?,
        })
    }
}

/// Association Setup Response (TS 29.244 clause 7.4.4.2)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssociationSetupResponse {
    pub node_id: NodeId,
    pub cause: PfcpCause,
    pub recovery_time_stamp: u32,
}

impl AssociationSetupResponse {
    pub fn new(node_id: NodeId, cause: PfcpCause, recovery_time_stamp: u32) -> Self {
        Self {
            node_id,
            cause,
            recovery_time_stamp,
        }
    }

    pub fn encode(&self, buf: &mut BytesMut) {
        encode_node_id(buf, &self.node_id);
        encode_u8_ie(buf, IeType::Cause, self.cause as u8);
        encode_u32_ie(buf, IeType::RecoveryTimeStamp, self.recovery_time_stamp);
    }

    pub fn decode(buf: &mut Bytes) -> PfcpResult<Self> {
        let mut node_id = None;
        let mut cause = None;
        let mut recovery_time_stamp = 0;
        for ie in decode_ies(buf)? {
            match ie.ie_type {
                t if IeType::NodeId.matches(t) => node_id = Some(NodeId::decode(&mut ie.data.clone())?),
                t if IeType::Cause.matches(t) => cause = Some(decode_cause(&ie)?),
                t if IeType::RecoveryTimeStamp.matches(t) => {
                    recovery_time_stamp = ie.u32_value().unwrap_or(0);
                }
                _ => {}
            }
        }
        Ok(Self {
            node_id: node_id.ok_or(PfcpError::MissingMandatoryIe("Node ID"))?,
            cause: cause.ok_or(PfcpError::MissingMandatoryIe("Cause"))?,
            recovery_time_stamp,
        })
    }
}

// ============================================================================
// Session related messages
// ============================================================================

/// Session Establishment Request (TS 29.244 clause 7.5.2)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionEstablishmentRequest {
    pub node_id: NodeId,
    pub cp_f_seid: FSeid,
    pub create_pdrs: Vec<CreatePdr>,
    pub create_fars: Vec<CreateFar>,
    pub create_qers: Vec<CreateQer>,
}

impl SessionEstablishmentRequest {
    pub fn new(node_id: NodeId, cp_f_seid: FSeid) -> Self {
        Self {
            node_id,
            cp_f_seid,
            create_pdrs: Vec::new(),
            create_fars: Vec::new(),
            create_qers: Vec::new(),
        }
    }

    pub fn encode(&self, buf: &mut BytesMut) {
        encode_node_id(buf, &self.node_id);
        encode_ie_with(buf, IeType::FSeid, |b| self.cp_f_seid.encode(b));
        for pdr in &self.create_pdrs {
            encode_ie_with(buf, IeType::CreatePdr, |b| pdr.encode(b));
        }
        for far in &self.create_fars {
            encode_ie_with(buf, IeType::CreateFar, |b| far.encode(b));
        }
        for qer in &self.create_qers {
            encode_ie_with(buf, IeType::CreateQer, |b| qer.encode(b));
        }
    }

    pub fn decode(buf: &mut Bytes) -> PfcpResult<Self> {
        let mut node_id = None;
        let mut cp_f_seid = None;
        let mut create_pdrs = Vec::new();
        let mut create_fars = Vec::new();
        let mut create_qers = Vec::new();

        for ie in decode_ies(buf)? {
            let mut data = ie.data;
            match ie.ie_type {
                t if IeType::NodeId.matches(t) => node_id = Some(NodeId::decode(&mut data)?),
                t if IeType::FSeid.matches(t) => cp_f_seid = Some(FSeid::decode(&mut data)?),
                t if IeType::CreatePdr.matches(t) => create_pdrs.push(CreatePdr::decode(&mut data)?),
                t if IeType::CreateFar.matches(t) => create_fars.push(CreateFar::decode(&mut data)?),
                t if IeType::CreateQer.matches(t) => create_qers.push(CreateQer::decode(&mut data)?),
                _ => {}
            }
        }

        Ok(Self {
            node_id: node_id.ok_or(PfcpError::MissingMandatoryIe("Node ID"))?,
            cp_f_seid: cp_f_seid.ok_or(PfcpError::MissingMandatoryIe("CP F-SEID"))?,
            create_pdrs,
            create_fars,
            create_qers,
        })
    }
}

/// Session Establishment Response (TS 29.244 clause 7.5.3)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionEstablishmentResponse {
    pub node_id: NodeId,
    pub cause: PfcpCause,
    pub up_f_seid: Option<FSeid>,
    pub created_pdrs: Vec<CreatedPdr>,
}

impl SessionEstablishmentResponse {
    pub fn new(node_id: NodeId, cause: PfcpCause) -> Self {
        Self {
            node_id,
            cause,
            up_f_seid: None,
            created_pdrs: Vec::new(),
        }
    }

    pub fn encode(&self, buf: &mut BytesMut) {
        encode_node_id(buf, &self.node_id);
        encode_u8_ie(buf, IeType::Cause, self.cause as u8);
        if let Some(fseid) = &self.up_f_seid {
            encode_ie_with(buf, IeType::FSeid, |b| fseid.encode(b));
        }
        for pdr in &self.created_pdrs {
            encode_ie_with(buf, IeType::CreatedPdr, |b| pdr.encode(b));
        }
    }

    pub fn decode(buf: &mut Bytes) -> PfcpResult<Self> {
        let mut node_id = None;
        let mut cause = None;
        let mut up_f_seid = None;
        let mut created_pdrs = Vec::new();

        for ie in decode_ies(buf)? {
            match ie.ie_type {
                t if IeType::NodeId.matches(t) => node_id = Some(NodeId::decode(&mut ie.data.clone())?),
                t if IeType::Cause.matches(t) => cause = Some(decode_cause(&ie)?),
                t if IeType::FSeid.matches(t) => up_f_seid = Some(FSeid::decode(&mut ie.data.clone())?),
                t if IeType::CreatedPdr.matches(t) => {
                    created_pdrs.push(CreatedPdr::decode(&mut ie.data.clone())?);
                }
                _ => {}
            }
        }

        Ok(Self {
            node_id: node_id.ok_or(PfcpError::MissingMandatoryIe("Node ID"))?,
            cause: cause.ok_or(PfcpError::MissingMandatoryIe("Cause"))?,
            up_f_seid,
            created_pdrs,
        })
    }
}

/// Session Modification Request (TS 29.244 clause 7.5.4); only the QER
/// updates used for bearer QoS changes are carried.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SessionModificationRequest {
    pub update_qers: Vec<UpdateQer>,
}

impl SessionModificationRequest {
    pub fn encode(&self, buf: &mut BytesMut) {
        for qer in &self.update_qers {
            encode_ie_with(buf, IeType::UpdateQer, |b| qer.encode(b));
        }
    }

    pub fn decode(buf: &mut Bytes) -> PfcpResult<Self> {
        let mut update_qers = Vec::new();
        for ie in decode_ies(buf)? {
            if IeType::UpdateQer.matches(ie.ie_type) {
                update_qers.push(UpdateQer::decode(&mut ie.data.clone())?);
            }
        }
        Ok(Self { update_qers })
    }
}

/// Session Modification Response (TS 29.244 clause 7.5.5)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionModificationResponse {
    pub cause: PfcpCause,
}

impl SessionModificationResponse {
    pub fn new(cause: PfcpCause) -> Self {
        Self { cause }
    }

    pub fn encode(&self, buf: &mut BytesMut) {
        encode_u8_ie(buf, IeType::Cause, self.cause as u8);
    }

    pub fn decode(buf: &mut Bytes) -> PfcpResult<Self> {
        let SessionDeletionResponse { cause } = SessionDeletionResponse::decode(buf)?;
        Ok(Self { cause })
    }
}

/// Session Deletion Request (TS 29.244 clause 7.5.6); the header SEID
/// identifies the session, the body is empty.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SessionDeletionRequest;

/// Session Deletion Response (TS 29.244 clause 7.5.7)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionDeletionResponse {
    pub cause: PfcpCause,
}

impl SessionDeletionResponse {
    pub fn new(cause: PfcpCause) -> Self {
        Self { cause }
    }

    pub fn encode(&self, buf: &mut BytesMut) {
        encode_u8_ie(buf, IeType::Cause, self.cause as u8);
    }

    pub fn decode(buf: &mut Bytes) -> PfcpResult<Self> {
        let cause = decode_ies(buf)?
            .iter()
            .find(|ie| IeType::Cause.matches(ie.ie_type))
            .ok_or(PfcpError::MissingMandatoryIe("Cause"))
            .and_then(decode_cause)?;
        Ok(Self { cause })
    }
}

// ============================================================================
// Message enum and framing
// ============================================================================

/// Every N4 message this crate understands
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PfcpMessage {
    HeartbeatRequest(HeartbeatRequest),
    HeartbeatResponse(HeartbeatResponse),
    AssociationSetupRequest(AssociationSetupRequest),
    AssociationSetupResponse(AssociationSetupResponse),
    SessionEstablishmentRequest(SessionEstablishmentRequest),
    SessionEstablishmentResponse(SessionEstablishmentResponse),
    SessionModificationRequest(SessionModificationRequest),
    SessionModificationResponse(SessionModificationResponse),
    SessionDeletionRequest(SessionDeletionRequest),
    SessionDeletionResponse(SessionDeletionResponse),
}

impl PfcpMessage {
    pub fn message_type(&self) -> PfcpMessageType {
        match self {
            Self::HeartbeatRequest(_) => PfcpMessageType::HeartbeatRequest,
            Self::HeartbeatResponse(_) => PfcpMessageType::HeartbeatResponse,
            Self::AssociationSetupRequest(_) => PfcpMessageType::AssociationSetupRequest,
            Self::AssociationSetupResponse(_) => PfcpMessageType::AssociationSetupResponse,
            Self::SessionEstablishmentRequest(_) => PfcpMessageType::SessionEstablishmentRequest,
            Self::SessionEstablishmentResponse(_) => PfcpMessageType::SessionEstablishmentResponse,
            Self::SessionModificationRequest(_) => PfcpMessageType::SessionModificationRequest,
            Self::SessionModificationResponse(_) => PfcpMessageType::SessionModificationResponse,
            Self::SessionDeletionRequest(_) => PfcpMessageType::SessionDeletionRequest,
            Self::SessionDeletionResponse(_) => PfcpMessageType::SessionDeletionResponse,
        }
    }

    /// Encode the message body (without header)
    pub fn encode_body(&self, buf: &mut BytesMut) {
        match self {
            Self::HeartbeatRequest(msg) => msg.encode(buf),
            Self::HeartbeatResponse(msg) => msg.encode(buf),
            Self::AssociationSetupRequest(msg) => msg.encode(buf),
            Self::AssociationSetupResponse(msg) => msg.encode(buf),
            Self::SessionEstablishmentRequest(msg) => msg.encode(buf),
            Self::SessionEstablishmentResponse(msg) => msg.encode(buf),
            Self::SessionModificationRequest(msg) => msg.encode(buf),
            Self::SessionModificationResponse(msg) => msg.encode(buf),
            Self::SessionDeletionRequest(_) => {}
            Self::SessionDeletionResponse(msg) => msg.encode(buf),
        }
    }

    /// Decode a message body of the given type
    pub fn decode_body(message_type: PfcpMessageType, buf: &mut Bytes) -> PfcpResult<Self> {
        Ok(match message_type {
            PfcpMessageType::HeartbeatRequest => Self::HeartbeatRequest(HeartbeatRequest::decode(buf)?),
            PfcpMessageType::HeartbeatResponse => Self::HeartbeatResponse(HeartbeatResponse::decode(buf)?),
            PfcpMessageType::AssociationSetupRequest => {
                Self::AssociationSetupRequest(AssociationSetupRequest::decode(buf)?)
            }
            PfcpMessageType::AssociationSetupResponse => {
                Self::AssociationSetupResponse(AssociationSetupResponse::decode(buf)?)
            }
            PfcpMessageType::SessionEstablishmentRequest => {
                Self::SessionEstablishmentRequest(SessionEstablishmentRequest::decode(buf)?)
            }
            PfcpMessageType::SessionEstablishmentResponse => {
                Self::SessionEstablishmentResponse(SessionEstablishmentResponse::decode(buf)?)
            }
            PfcpMessageType::SessionModificationRequest => {
                Self::SessionModificationRequest(SessionModificationRequest::decode(buf)?)
            }
            PfcpMessageType::SessionModificationResponse => {
                Self::SessionModificationResponse(SessionModificationResponse::decode(buf)?)
            }
            PfcpMessageType::SessionDeletionRequest => Self::SessionDeletionRequest(SessionDeletionRequest),
            PfcpMessageType::SessionDeletionResponse => {
                Self::SessionDeletionResponse(SessionDeletionResponse::decode(buf)?)
            }
        })
    }
}

/// Build a complete PFCP message. `seid` must be given for session messages.
pub fn build_message(message: &PfcpMessage, sequence_number: u32, seid: Option<u64>) -> BytesMut {
    let message_type = message.message_type();

    let mut body = BytesMut::new();
    message.encode_body(&mut body);

    let mut header = match seid {
        Some(seid) => PfcpHeader::new_with_seid(message_type, seid, sequence_number),
        None => PfcpHeader::new(message_type, sequence_number),
    };
    header.set_body_len(body.len());

    let mut buf = BytesMut::with_capacity(header.header_len() + body.len());
    header.encode(&mut buf);
    buf.put_slice(&body);
    buf
}

/// Parse a complete PFCP message
pub fn parse_message(buf: &mut Bytes) -> PfcpResult<(PfcpHeader, PfcpMessage)> {
    let header = PfcpHeader::decode(buf)?;
    if header.message_type.has_seid() && header.seid.is_none() {
        return Err(PfcpError::MissingMandatoryIe("SEID"));
    }

    let body_len = header.body_len()?;
    ensure_remaining(buf.remaining(), body_len)?;

    let mut body = buf.copy_to_bytes(body_len);
    let message = PfcpMessage::decode_body(header.message_type, &mut body)?;
    Ok((header, message))
}
