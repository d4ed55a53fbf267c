//! GTPv2 Messages
//!
//! Typed session messages and their framing over [`Gtp2Header`].

use std::net::Ipv4Addr;

use bytes::{Bytes, BytesMut};

use crate::error::{GtpError, GtpResult};
use crate::header::{Gtp2Header, Gtp2MessageType};
use crate::ie::{
    decode_cause, decode_ies, decode_imsi, decode_paa, encode_cause, encode_imsi, encode_paa,
    BearerQos, FTeid, Gtp2Cause, Gtp2Ie, Gtp2IeType,
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreateSessionRequest {
    pub imsi: String,
    /// Peer user-plane endpoint; an absent address means the datagram source
    pub sender_f_teid: FTeid,
    pub ebi: Option<u8>,
    pub bearer_qos: Option<BearerQos>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreateSessionResponse {
    pub cause: Gtp2Cause,
    /// Core-assigned tunnel endpoint
    pub sender_f_teid: Option<FTeid>,
    pub paa: Option<Ipv4Addr>,
    pub ebi: Option<u8>,
    pub bearer_qos: Option<BearerQos>,
}

impl CreateSessionResponse {
    pub fn rejected(cause: Gtp2Cause) -> Self {
        Self {
            cause,
            sender_f_teid: None,
            paa: None,
            ebi: None,
            bearer_qos: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModifyBearerRequest {
    pub imsi: String,
    pub bearer_qos: BearerQos,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModifyBearerResponse {
    pub cause: Gtp2Cause,
    pub bearer_qos: Option<BearerQos>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeleteSessionRequest {
    pub imsi: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeleteSessionResponse {
    pub cause: Gtp2Cause,
}

/// GTPv2-C session interface message
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Gtp2Message {
    EchoRequest { recovery: u8 },
    EchoResponse { recovery: u8 },
    CreateSessionRequest(CreateSessionRequest),
    CreateSessionResponse(CreateSessionResponse),
    ModifyBearerRequest(ModifyBearerRequest),
    ModifyBearerResponse(ModifyBearerResponse),
    DeleteSessionRequest(DeleteSessionRequest),
    DeleteSessionResponse(DeleteSessionResponse),
}

impl Gtp2Message {
    pub fn message_type(&self) -> Gtp2MessageType {
        match self {
            Self::EchoRequest { .. } => Gtp2MessageType::EchoRequest,
            Self::EchoResponse { .. } => Gtp2MessageType::EchoResponse,
            Self::CreateSessionRequest(_) => Gtp2MessageType::CreateSessionRequest,
            Self::CreateSessionResponse(_) => Gtp2MessageType::CreateSessionResponse,
            Self::ModifyBearerRequest(_) => Gtp2MessageType::ModifyBearerRequest,
            Self::ModifyBearerResponse(_) => Gtp2MessageType::ModifyBearerResponse,
            Self::DeleteSessionRequest(_) => Gtp2MessageType::DeleteSessionRequest,
            Self::DeleteSessionResponse(_) => Gtp2MessageType::DeleteSessionResponse,
        }
    }

    fn to_ies(&self) -> GtpResult<Vec<Gtp2Ie>> {
        let mut ies = Vec::new();
        match self {
            Self::EchoRequest { recovery } | Self::EchoResponse { recovery } => {
                ies.push(recovery_ie(*recovery));
            }
            Self::CreateSessionRequest(req) => {
                ies.push(Gtp2Ie::new(Gtp2IeType::Imsi, encode_imsi(&req.imsi)?));
                ies.push(req.sender_f_teid.to_ie());
                if let Some(ebi) = req.ebi {
                    ies.push(ebi_ie(ebi));
                }
                if let Some(qos) = &req.bearer_qos {
                    ies.push(qos.to_ie());
                }
            }
            Self::CreateSessionResponse(rsp) => {
                ies.push(encode_cause(rsp.cause));
                if let Some(fteid) = &rsp.sender_f_teid {
                    ies.push(fteid.to_ie());
                }
                if let Some(addr) = rsp.paa {
                    ies.push(encode_paa(addr));
                }
                if let Some(ebi) = rsp.ebi {
                    ies.push(ebi_ie(ebi));
                }
                if let Some(qos) = &rsp.bearer_qos {
                    ies.push(qos.to_ie());
                }
            }
            Self::ModifyBearerRequest(req) => {
                ies.push(Gtp2Ie::new(Gtp2IeType::Imsi, encode_imsi(&req.imsi)?));
                ies.push(req.bearer_qos.to_ie());
            }
            Self::ModifyBearerResponse(rsp) => {
                ies.push(encode_cause(rsp.cause));
                if let Some(qos) = &rsp.bearer_qos {
                    ies.push(qos.to_ie());
                }
            }
            Self::DeleteSessionRequest(req) => {
                ies.push(Gtp2Ie::new(Gtp2IeType::Imsi, encode_imsi(&req.imsi)?));
            }
            Self::DeleteSessionResponse(rsp) => {
                ies.push(encode_cause(rsp.cause));
            }
        }
        Ok(ies)
    }

    fn from_ies(message_type: Gtp2MessageType, ies: &[Gtp2Ie]) -> GtpResult<Self> {
        let find = |t: Gtp2IeType| ies.iter().find(|ie| ie.is(t));
        let require = |t: Gtp2IeType, name: &'static str| find(t).ok_or(GtpError::MissingMandatoryIe(name));
        let imsi = || -> GtpResult<String> { decode_imsi(&require(Gtp2IeType::Imsi, "IMSI")?.value) };
        let cause = || -> GtpResult<Gtp2Cause> { decode_cause(require(Gtp2IeType::Cause, "Cause")?) };
        let ebi = || -> GtpResult<Option<u8>> {
            find(Gtp2IeType::Ebi).map(|ie| ie.u8_value().map(|v| v & 0x0F)).transpose()
        };
        let qos = || -> GtpResult<Option<BearerQos>> {
            find(Gtp2IeType::BearerQos).map(BearerQos::from_ie).transpose()
        };
        let recovery = || -> GtpResult<u8> {
            find(Gtp2IeType::Recovery).map(|ie| ie.u8_value()).unwrap_or(Ok(0))
        };

        let msg = match message_type {
            Gtp2MessageType::EchoRequest => Self::EchoRequest { recovery: recovery()? },
            Gtp2MessageType::EchoResponse => Self::EchoResponse { recovery: recovery()? },
            Gtp2MessageType::CreateSessionRequest => Self::CreateSessionRequest(CreateSessionRequest {
                imsi: imsi()?,
                sender_f_teid: FTeid::from_ie(require(Gtp2IeType::FTeid, "Sender F-TEID")?)?,
                ebi: ebi()?,
                bearer_qos: qos()?,
            }),
            Gtp2MessageType::CreateSessionResponse => Self::CreateSessionResponse(CreateSessionResponse {
                cause: cause()?,
                sender_f_teid: find(Gtp2IeType::FTeid).map(FTeid::from_ie).transpose()?,
                paa: find(Gtp2IeType::Paa).map(decode_paa).transpose()?,
                ebi: ebi()?,
                bearer_qos: qos()?,
            }),
            Gtp2MessageType::ModifyBearerRequest => Self::ModifyBearerRequest(ModifyBearerRequest {
                imsi: imsi()?,
                bearer_qos: qos()?.ok_or(GtpError::MissingMandatoryIe("Bearer QoS"))?,
            }),
            Gtp2MessageType::ModifyBearerResponse => Self::ModifyBearerResponse(ModifyBearerResponse {
                cause: cause()?,
                bearer_qos: qos()?,
            }),
            Gtp2MessageType::DeleteSessionRequest => {
                Self::DeleteSessionRequest(DeleteSessionRequest { imsi: imsi()? })
            }
            Gtp2MessageType::DeleteSessionResponse => {
                Self::DeleteSessionResponse(DeleteSessionResponse { cause: cause()? })
            }
        };
        Ok(msg)
    }
}

fn recovery_ie(restart_counter: u8) -> Gtp2Ie {
    Gtp2Ie::new(Gtp2IeType::Recovery, Bytes::copy_from_slice(&[restart_counter]))
}

fn ebi_ie(ebi: u8) -> Gtp2Ie {
    Gtp2Ie::new(Gtp2IeType::Ebi, Bytes::copy_from_slice(&[ebi & 0x0F]))
}

/// Frame `msg`; echo messages never carry a TEID
pub fn build_message(msg: &Gtp2Message, teid: u32, sequence_number: u32) -> GtpResult<BytesMut> {
    let message_type = msg.message_type();
    let mut header = match message_type {
        Gtp2MessageType::EchoRequest | Gtp2MessageType::EchoResponse => {
            Gtp2Header::new_no_teid(message_type, sequence_number)
        }
        _ => Gtp2Header::new(message_type, teid, sequence_number),
    };

    let ies = msg.to_ies()?;
    header.set_payload_len(ies.iter().map(Gtp2Ie::encoded_len).sum());

    let mut buf = BytesMut::with_capacity(header.header_len() + header.payload_len()?);
    header.encode(&mut buf);
    for ie in &ies {
        ie.encode(&mut buf);
    }
    Ok(buf)
}

/// Parse one datagram into its header and typed message
pub fn parse_message(buf: &mut Bytes) -> GtpResult<(Gtp2Header, Gtp2Message)> {
    let header = Gtp2Header::decode(buf)?;
    let payload_len = header.payload_len()?;
    crate::error::ensure_remaining(buf.len(), payload_len)?;
    let mut payload = buf.split_to(payload_len);
    let ies = decode_ies(&mut payload)?;
    let msg = Gtp2Message::from_ies(header.message_type, &ies)?;
    Ok((header, msg))
}
