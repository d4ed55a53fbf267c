//! PFCP Types
//!
//! Value types and grouped IEs carried by the N4 messages.

use std::net::Ipv4Addr;

use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::error::{ensure_remaining, PfcpError, PfcpResult};
use crate::ie::{decode_ies, encode_ie_with, encode_u16_ie, encode_u32_ie, encode_u8_ie, IeType};

/// PFCP Version
pub const PFCP_VERSION: u8 = 1;

/// PFCP UDP port (8805)
pub const PFCP_UDP_PORT: u16 = 8805;

/// Sequence numbers are 24 bits wide
pub const PFCP_MAX_SEQUENCE_NUMBER: u32 = 0x00FF_FFFF;

/// PFCP bitrate length (5 bytes uplink + 5 bytes downlink)
pub const PFCP_BITRATE_LEN: usize = 10;

fn get_ipv4(buf: &mut Bytes) -> PfcpResult<Ipv4Addr> {
    ensure_remaining(buf.remaining(), 4)?;
    Ok(Ipv4Addr::from(buf.get_u32()))
}

// ============================================================================
// Cause and interfaces
// ============================================================================

/// PFCP Cause Values (TS 29.244 clause 8.2.1)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum PfcpCause {
    RequestAccepted = 1,
    RequestRejected = 64,
    SessionContextNotFound = 65,
    MandatoryIeMissing = 66,
    NoEstablishedPfcpAssociation = 72,
    RuleCreationModificationFailure = 73,
    NoResourcesAvailable = 75,
    SystemFailure = 77,
}

impl TryFrom<u8> for PfcpCause {
    type Error = PfcpError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(Self::RequestAccepted),
            64 => Ok(Self::RequestRejected),
            65 => Ok(Self::SessionContextNotFound),
            66 => Ok(Self::MandatoryIeMissing),
            72 => Ok(Self::NoEstablishedPfcpAssociation),
            73 => Ok(Self::RuleCreationModificationFailure),
            75 => Ok(Self::NoResourcesAvailable),
            77 => Ok(Self::SystemFailure),
            _ => Err(PfcpError::InvalidCause(value)),
        }
    }
}

impl PfcpCause {
    pub fn name(&self) -> &'static str {
        match self {
            Self::RequestAccepted => "Request Accepted",
            Self::RequestRejected => "Request Rejected",
            Self::SessionContextNotFound => "Session Context Not Found",
            Self::MandatoryIeMissing => "Mandatory IE Missing",
            Self::NoEstablishedPfcpAssociation => "No Established PFCP Association",
            Self::RuleCreationModificationFailure => "Rule Creation/Modification Failure",
            Self::NoResourcesAvailable => "No Resources Available",
            Self::SystemFailure => "System Failure",
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Self::RequestAccepted)
    }
}

/// Source Interface values (TS 29.244 clause 8.2.2)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(u8)]
pub enum SourceInterface {
    #[default]
    Access = 0,
    Core = 1,
    CpFunction = 3,
}

impl TryFrom<u8> for SourceInterface {
    type Error = PfcpError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value & 0x0F {
            0 => Ok(Self::Access),
            1 => Ok(Self::Core),
            3 => Ok(Self::CpFunction),
            other => Err(PfcpError::InvalidInterfaceType(other)),
        }
    }
}

/// Destination Interface values (TS 29.244 clause 8.2.24)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(u8)]
pub enum DestinationInterface {
    #[default]
    Access = 0,
    Core = 1,
    CpFunction = 3,
}

impl TryFrom<u8> for DestinationInterface {
    type Error = PfcpError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value & 0x0F {
            0 => Ok(Self::Access),
            1 => Ok(Self::Core),
            3 => Ok(Self::CpFunction),
            other => Err(PfcpError::InvalidInterfaceType(other)),
        }
    }
}

// ============================================================================
// Node ID, F-SEID, F-TEID, UE IP Address
// ============================================================================

/// Node ID (TS 29.244 clause 8.2.38)
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeId {
    Ipv4(Ipv4Addr),
    Fqdn(String),
}

impl NodeId {
    pub fn new_ipv4(addr: Ipv4Addr) -> Self {
        Self::Ipv4(addr)
    }

    pub fn encode(&self, buf: &mut BytesMut) {
        match self {
            Self::Ipv4(addr) => {
                buf.put_u8(0);
                buf.put_slice(&addr.octets());
            }
            Self::Fqdn(fqdn) => {
                buf.put_u8(2);
                for label in fqdn.split('.') {
                    buf.put_u8(label.len() as u8);
                    buf.put_slice(label.as_bytes());
                }
            }
        }
    }

    pub fn decode(buf: &mut Bytes) -> PfcpResult<Self> {
        ensure_remaining(buf.remaining(), 1)?;
        match buf.get_u8() & 0x0F {
            0 => Ok(Self::Ipv4(get_ipv4(buf)?)),
            2 => {
                let mut labels = Vec::new();
                while buf.has_remaining() {
                    let len = buf.get_u8() as usize;
                    if len == 0 {
                        break;
                    }
                    ensure_remaining(buf.remaining(), len)?;
                    labels.push(String::from_utf8_lossy(&buf.copy_to_bytes(len)).into_owned());
                }
                Ok(Self::Fqdn(labels.join(".")))
            }
            other => Err(PfcpError::InvalidNodeIdType(other)),
        }
    }
}

/// F-SEID (TS 29.244 clause 8.2.37), IPv4 only
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FSeid {
    pub seid: u64,
    pub ipv4_addr: Ipv4Addr,
}

impl FSeid {
    pub fn new_ipv4(seid: u64, ipv4_addr: Ipv4Addr) -> Self {
        Self { seid, ipv4_addr }
    }

    pub fn encode(&self, buf: &mut BytesMut) {
        buf.put_u8(0x02); // V4
        buf.put_u64(self.seid);
        buf.put_slice(&self.ipv4_addr.octets());
    }

    pub fn decode(buf: &mut Bytes) -> PfcpResult<Self> {
        ensure_remaining(buf.remaining(), 9)?;
        let flags = buf.get_u8();
        let seid = buf.get_u64();
        if flags & 0x02 == 0 {
            return Err(PfcpError::MissingMandatoryIe("F-SEID IPv4 address"));
        }
        Ok(Self {
            seid,
            ipv4_addr: get_ipv4(buf)?,
        })
    }
}

/// F-TEID (TS 29.244 clause 8.2.3), IPv4 only
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FTeid {
    pub teid: u32,
    pub ipv4_addr: Ipv4Addr,
}

impl FTeid {
    pub fn new_ipv4(teid: u32, ipv4_addr: Ipv4Addr) -> Self {
        Self { teid, ipv4_addr }
    }

    pub fn encode(&self, buf: &mut BytesMut) {
        buf.put_u8(0x01); // V4
        buf.put_u32(self.teid);
        buf.put_slice(&self.ipv4_addr.octets());
    }

    pub fn decode(buf: &mut Bytes) -> PfcpResult<Self> {
        ensure_remaining(buf.remaining(), 5)?;
        let flags = buf.get_u8();
        let teid = buf.get_u32();
        if flags & 0x01 == 0 {
            return Err(PfcpError::MissingMandatoryIe("F-TEID IPv4 address"));
        }
        Ok(Self {
            teid,
            ipv4_addr: get_ipv4(buf)?,
        })
    }
}

/// UE IP Address (TS 29.244 clause 8.2.62), IPv4 only
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UeIpAddress {
    pub addr: Ipv4Addr,
    /// S/D flag: set when the address is the destination (downlink PDR)
    pub is_destination: bool,
}

impl UeIpAddress {
    pub fn source(addr: Ipv4Addr) -> Self {
        Self {
            addr,
            is_destination: false,
        }
    }

    pub fn destination(addr: Ipv4Addr) -> Self {
        Self {
            addr,
            is_destination: true,
        }
    }

    pub fn encode(&self, buf: &mut BytesMut) {
        buf.put_u8(((self.is_destination as u8) << 2) | 0x02);
        buf.put_slice(&self.addr.octets());
    }

    pub fn decode(buf: &mut Bytes) -> PfcpResult<Self> {
        ensure_remaining(buf.remaining(), 1)?;
        let flags = buf.get_u8();
        if flags & 0x02 == 0 {
            return Err(PfcpError::MissingMandatoryIe("UE IPv4 address"));
        }
        Ok(Self {
            addr: get_ipv4(buf)?,
            is_destination: flags & 0x04 != 0,
        })
    }
}

// ============================================================================
// Actions and QoS
// ============================================================================

/// Apply Action flags (TS 29.244 clause 8.2.26)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ApplyAction {
    pub drop: bool,
    pub forw: bool,
    pub buff: bool,
    pub nocp: bool,
}

impl ApplyAction {
    pub fn forward() -> Self {
        Self {
            forw: true,
            ..Default::default()
        }
    }

    pub fn drop() -> Self {
        Self {
            drop: true,
            ..Default::default()
        }
    }

    pub fn encode(&self) -> u16 {
        ((self.nocp as u16) << 3)
            | ((self.buff as u16) << 2)
            | ((self.forw as u16) << 1)
            | (self.drop as u16)
    }

    pub fn decode(value: u16) -> Self {
        Self {
            drop: value & 0x01 != 0,
            forw: value & 0x02 != 0,
            buff: value & 0x04 != 0,
            nocp: value & 0x08 != 0,
        }
    }
}

/// Outer Header Removal; only GTP-U/UDP/IPv4 (description 0) is produced
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct OuterHeaderRemoval {
    pub description: u8,
}

impl OuterHeaderRemoval {
    pub fn gtpu_udp_ipv4() -> Self {
        Self { description: 0 }
    }
}

/// Outer Header Creation for GTP-U/UDP/IPv4 (TS 29.244 clause 8.2.56)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OuterHeaderCreation {
    pub teid: u32,
    pub ipv4_addr: Ipv4Addr,
}

impl OuterHeaderCreation {
    pub fn new_gtpu_ipv4(teid: u32, ipv4_addr: Ipv4Addr) -> Self {
        Self { teid, ipv4_addr }
    }

    pub fn encode(&self, buf: &mut BytesMut) {
        buf.put_u16(0x0100);
        buf.put_u32(self.teid);
        buf.put_slice(&self.ipv4_addr.octets());
    }

    pub fn decode(buf: &mut Bytes) -> PfcpResult<Self> {
        ensure_remaining(buf.remaining(), 2)?;
        let description = buf.get_u16();
        if description & 0x0100 == 0 {
            return Err(PfcpError::MissingMandatoryIe("GTP-U/UDP/IPv4 outer header"));
        }
        ensure_remaining(buf.remaining(), 4)?;
        let teid = buf.get_u32();
        Ok(Self {
            teid,
            ipv4_addr: get_ipv4(buf)?,
        })
    }
}

/// Gate Status
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GateStatus {
    pub ul_open: bool,
    pub dl_open: bool,
}

impl Default for GateStatus {
    fn default() -> Self {
        Self::both_open()
    }
}

impl GateStatus {
    pub fn both_open() -> Self {
        Self {
            ul_open: true,
            dl_open: true,
        }
    }

    pub fn encode(&self) -> u8 {
        let ul = if self.ul_open { 0 } else { 1 };
        let dl = if self.dl_open { 0 } else { 1 };
        (ul << 2) | dl
    }

    pub fn decode(value: u8) -> Self {
        Self {
            ul_open: (value >> 2) & 0x03 == 0,
            dl_open: value & 0x03 == 0,
        }
    }
}

/// MBR/GBR pair in kilobits per second
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Bitrate {
    pub uplink_kbps: u64,
    pub downlink_kbps: u64,
}

impl Bitrate {
    pub fn new(uplink_kbps: u64, downlink_kbps: u64) -> Self {
        Self {
            uplink_kbps,
            downlink_kbps,
        }
    }

    /// Two 40-bit big-endian fields
    pub fn encode(&self, buf: &mut BytesMut) {
        buf.put_slice(&self.uplink_kbps.to_be_bytes()[3..]);
        buf.put_slice(&self.downlink_kbps.to_be_bytes()[3..]);
    }

    pub fn decode(buf: &mut Bytes) -> PfcpResult<Self> {
        ensure_remaining(buf.remaining(), PFCP_BITRATE_LEN)?;
        let mut read_40 = || {
            let high = buf.get_u8() as u64;
            (high << 32) | buf.get_u32() as u64
        };
        let uplink_kbps = read_40();
        let downlink_kbps = read_40();
        Ok(Self {
            uplink_kbps,
            downlink_kbps,
        })
    }
}

// ============================================================================
// Grouped IEs
// ============================================================================

/// PDI (Packet Detection Information)
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Pdi {
    pub source_interface: SourceInterface,
    pub local_f_teid: Option<FTeid>,
    pub network_instance: Option<String>,
    pub ue_ip_address: Option<UeIpAddress>,
}

impl Pdi {
    pub fn new(source_interface: SourceInterface) -> Self {
        Self {
            source_interface,
            ..Default::default()
        }
    }

    pub fn encode(&self, buf: &mut BytesMut) {
        encode_u8_ie(buf, IeType::SourceInterface, self.source_interface as u8);
        if let Some(fteid) = &self.local_f_teid {
            encode_ie_with(buf, IeType::FTeid, |b| fteid.encode(b));
        }
        if let Some(ni) = &self.network_instance {
            encode_ie_with(buf, IeType::NetworkInstance, |b| b.put_slice(ni.as_bytes()));
        }
        if let Some(ue_ip) = &self.ue_ip_address {
            encode_ie_with(buf, IeType::UeIpAddress, |b| ue_ip.encode(b));
        }
    }

    pub fn decode(buf: &mut Bytes) -> PfcpResult<Self> {
        let mut pdi = Self::default();
        for ie in decode_ies(buf)? {
            let mut data = ie.data.clone();
            match ie.ie_type {
                t if IeType::SourceInterface.matches(t) => {
                    if let Some(v) = ie.first_octet() {
                        pdi.source_interface = SourceInterface::try_from(v)?;
                    }
                }
                t if IeType::FTeid.matches(t) => pdi.local_f_teid = Some(FTeid::decode(&mut data)?),
                t if IeType::NetworkInstance.matches(t) => {
                    pdi.network_instance = Some(String::from_utf8_lossy(&data).into_owned());
                }
                t if IeType::UeIpAddress.matches(t) => {
                    pdi.ue_ip_address = Some(UeIpAddress::decode(&mut data)?);
                }
                _ => {}
            }
        }
        Ok(pdi)
    }
}

/// Create PDR (TS 29.244 Table 7.5.2.2-1)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreatePdr {
    pub pdr_id: u16,
    pub precedence: u32,
    pub pdi: Pdi,
    pub outer_header_removal: Option<OuterHeaderRemoval>,
    pub far_id: Option<u32>,
    pub qer_id: Option<u32>,
}

impl CreatePdr {
    pub fn new(pdr_id: u16, precedence: u32, pdi: Pdi) -> Self {
        Self {
            pdr_id,
            precedence,
            pdi,
            outer_header_removal: None,
            far_id: None,
            qer_id: None,
        }
    }

    pub fn encode(&self, buf: &mut BytesMut) {
        encode_u16_ie(buf, IeType::PdrId, self.pdr_id);
        encode_u32_ie(buf, IeType::Precedence, self.precedence);
        encode_ie_with(buf, IeType::Pdi, |b| self.pdi.encode(b));
        if let Some(ohr) = &self.outer_header_removal {
            encode_u8_ie(buf, IeType::OuterHeaderRemoval, ohr.description);
        }
        if let Some(far_id) = self.far_id {
            encode_u32_ie(buf, IeType::FarId, far_id);
        }
        if let Some(qer_id) = self.qer_id {
            encode_u32_ie(buf, IeType::QerId, qer_id);
        }
    }

    pub fn decode(buf: &mut Bytes) -> PfcpResult<Self> {
        let mut pdr_id = None;
        let mut precedence = 0;
        let mut pdi = None;
        let mut outer_header_removal = None;
        let mut far_id = None;
        let mut qer_id = None;

        for ie in decode_ies(buf)? {
            match ie.ie_type {
                t if IeType::PdrId.matches(t) => pdr_id = ie.u16_value(),
                t if IeType::Precedence.matches(t) => precedence = ie.u32_value().unwrap_or(0),
                t if IeType::Pdi.matches(t) => pdi = Some(Pdi::decode(&mut ie.data.clone())?),
                t if IeType::OuterHeaderRemoval.matches(t) => {
                    outer_header_removal = ie
                        .first_octet()
                        .map(|description| OuterHeaderRemoval { description });
                }
                t if IeType::FarId.matches(t) => far_id = ie.u32_value(),
                t if IeType::QerId.matches(t) => qer_id = ie.u32_value(),
                _ => {}
            }
        }

        Ok(Self {
            pdr_id: pdr_id.ok_or(PfcpError::MissingMandatoryIe("PDR ID"))?,
            precedence,
            pdi: pdi.ok_or(PfcpError::MissingMandatoryIe("PDI"))?,
            outer_header_removal,
            far_id,
            qer_id,
        })
    }
}

/// Forwarding Parameters (grouped, inside Create FAR)
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ForwardingParameters {
    pub destination_interface: DestinationInterface,
    pub network_instance: Option<String>,
    pub outer_header_creation: Option<OuterHeaderCreation>,
}

impl ForwardingParameters {
    pub fn new(destination_interface: DestinationInterface) -> Self {
        Self {
            destination_interface,
            ..Default::default()
        }
    }

    pub fn encode(&self, buf: &mut BytesMut) {
        encode_u8_ie(buf, IeType::DestinationInterface, self.destination_interface as u8);
        if let Some(ni) = &self.network_instance {
            encode_ie_with(buf, IeType::NetworkInstance, |b| b.put_slice(ni.as_bytes()));
        }
        if let Some(ohc) = &self.outer_header_creation {
            encode_ie_with(buf, IeType::OuterHeaderCreation, |b| ohc.encode(b));
        }
    }

    pub fn decode(buf: &mut Bytes) -> PfcpResult<Self> {
        let mut params = Self::default();
        for ie in decode_ies(buf)? {
            let mut data = ie.data.clone();
            match ie.ie_type {
                t if IeType::DestinationInterface.matches(t) => {
                    if let Some(v) = ie.first_octet() {
                        params.destination_interface = DestinationInterface::try_from(v)?;
                    }
                }
                t if IeType::NetworkInstance.matches(t) => {
                    params.network_instance = Some(String::from_utf8_lossy(&data).into_owned());
                }
                t if IeType::OuterHeaderCreation.matches(t) => {
                    params.outer_header_creation = Some(OuterHeaderCreation::decode(&mut data)?);
                }
                _ => {}
            }
        }
        Ok(params)
    }
}

/// Create FAR (TS 29.244 Table 7.5.2.3-1)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreateFar {
    pub far_id: u32,
    pub apply_action: ApplyAction,
    pub forwarding_parameters: Option<ForwardingParameters>,
}

impl CreateFar {
    pub fn new(far_id: u32, apply_action: ApplyAction) -> Self {
        Self {
            far_id,
            apply_action,
            forwarding_parameters: None,
        }
    }

    pub fn encode(&self, buf: &mut BytesMut) {
        encode_u32_ie(buf, IeType::FarId, self.far_id);
        encode_u16_ie(buf, IeType::ApplyAction, self.apply_action.encode());
        if let Some(fp) = &self.forwarding_parameters {
            encode_ie_with(buf, IeType::ForwardingParameters, |b| fp.encode(b));
        }
    }

    pub fn decode(buf: &mut Bytes) -> PfcpResult<Self> {
        let mut far_id = None;
        let mut apply_action = ApplyAction::default();
        let mut forwarding_parameters = None;

        for ie in decode_ies(buf)? {
            match ie.ie_type {
                t if IeType::FarId.matches(t) => far_id = ie.u32_value(),
                t if IeType::ApplyAction.matches(t) => {
                    // Older peers send a single octet
                    let value = ie.u16_value().or_else(|| ie.first_octet().map(u16::from));
                    apply_action = ApplyAction::decode(value.unwrap_or(0));
                }
                t if IeType::ForwardingParameters.matches(t) => {
                    forwarding_parameters = Some(ForwardingParameters::decode(&mut ie.data.clone())?);
                }
                _ => {}
            }
        }

        Ok(Self {
            far_id: far_id.ok_or(PfcpError::MissingMandatoryIe("FAR ID"))?,
            apply_action,
            forwarding_parameters,
        })
    }
}

/// Create QER (TS 29.244 Table 7.5.2.5-1)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreateQer {
    pub qer_id: u32,
    pub gate_status: GateStatus,
    pub maximum_bitrate: Option<Bitrate>,
    pub guaranteed_bitrate: Option<Bitrate>,
    pub qfi: Option<u8>,
}

impl CreateQer {
    pub fn new(qer_id: u32, gate_status: GateStatus) -> Self {
        Self {
            qer_id,
            gate_status,
            maximum_bitrate: None,
            guaranteed_bitrate: None,
            qfi: None,
        }
    }

    pub fn encode(&self, buf: &mut BytesMut) {
        encode_u32_ie(buf, IeType::QerId, self.qer_id);
        encode_u8_ie(buf, IeType::GateStatus, self.gate_status.encode());
        if let Some(mbr) = &self.maximum_bitrate {
            encode_ie_with(buf, IeType::Mbr, |b| mbr.encode(b));
        }
        if let Some(gbr) = &self.guaranteed_bitrate {
            encode_ie_with(buf, IeType::Gbr, |b| gbr.encode(b));
        }
        if let Some(qfi) = self.qfi {
            encode_u8_ie(buf, IeType::Qfi, qfi & 0x3F);
        }
    }

    pub fn decode(buf: &mut Bytes) -> PfcpResult<Self> {
        let mut qer = Self::new(0, GateStatus::default());
        let mut qer_id = None;

        for ie in decode_ies(buf)? {
            let mut data = ie.data.clone();
            match ie.ie_type {
                t if IeType::QerId.matches(t) => qer_id = ie.u32_value(),
                t if IeType::GateStatus.matches(t) => {
                    qer.gate_status = GateStatus::decode(ie.first_octet().unwrap_or(0));
                }
                t if IeType::Mbr.matches(t) => qer.maximum_bitrate = Some(Bitrate::decode(&mut data)?),
                t if IeType::Gbr.matches(t) => qer.guaranteed_bitrate = Some(Bitrate::decode(&mut data)?),
                t if IeType::Qfi.matches(t) => qer.qfi = ie.first_octet().map(|v| v & 0x3F),
                _ => {}
            }
        }

        qer.qer_id = qer_id.ok_or(PfcpError::MissingMandatoryIe("QER ID"))?;
        Ok(qer)
    }
}

/// Update QER (TS 29.244 Table 7.5.4.6-1); absent fields are left as
/// installed on the UP function.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpdateQer {
    pub qer_id: u32,
    pub gate_status: Option<GateStatus>,
    pub maximum_bitrate: Option<Bitrate>,
    pub guaranteed_bitrate: Option<Bitrate>,
}

impl UpdateQer {
    pub fn new(qer_id: u32) -> Self {
        Self {
            qer_id,
            gate_status: None,
            maximum_bitrate: None,
            guaranteed_bitrate: None,
        }
    }

    pub fn encode(&self, buf: &mut BytesMut) {
        encode_u32_ie(buf, IeType::QerId, self.qer_id);
        if let Some(gate) = self.gate_status {
            encode_u8_ie(buf, IeType::GateStatus, gate.encode());
        }
        if let Some(mbr) = &self.maximum_bitrate {
            encode_ie_with(buf, IeType::Mbr, |b| mbr.encode(b));
        }
        if let Some(gbr) = &self.guaranteed_bitrate {
            encode_ie_with(buf, IeType::Gbr, |b| gbr.encode(b));
        }
    }

    pub fn decode(buf: &mut Bytes) -> PfcpResult<Self> {
        let mut qer = Self::new(0);
        let mut qer_id = None;

        for ie in decode_ies(buf)? {
            let mut data = ie.data.clone();
            match ie.ie_type {
                t if IeType::QerId.matches(t) => qer_id = ie.u32_value(),
                t if IeType::GateStatus.matches(t) => {
                    qer.gate_status = ie.first_octet().map(GateStatus::decode);
                }
                t if IeType::Mbr.matches(t) => qer.maximum_bitrate = Some(Bitrate::decode(&mut data)?),
                t if IeType::Gbr.matches(t) => qer.guaranteed_bitrate = Some(Bitrate::decode(&mut data)?),
                _ => {}
            }
        }

        qer.qer_id = qer_id.ok_or(PfcpError::MissingMandatoryIe("QER ID"))?;
        Ok(qer)
    }
}

/// Created PDR (TS 29.244 Table 7.5.3.2-1)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreatedPdr {
    pub pdr_id: u16,
    pub local_f_teid: Option<FTeid>,
}

impl CreatedPdr {
    pub fn encode(&self, buf: &mut BytesMut) {
        encode_u16_ie(buf, IeType::PdrId, self.pdr_id);
        if let Some(fteid) = &self.local_f_teid {
            encode_ie_with(buf, IeType::FTeid, |b| fteid.encode(b));
        }
    }

    pub fn decode(buf: &mut Bytes) -> PfcpResult<Self> {
        let mut pdr_id = None;
        let mut local_f_teid = None;
        for ie in decode_ies(buf)? {
            match ie.ie_type {
                t if IeType::PdrId.matches(t) => pdr_id = ie.u16_value(),
                t if IeType::FTeid.matches(t) => {
                    local_f_teid = Some(FTeid::decode(&mut ie.data.clone())?);
                }
                _ => {}
            }
        }
        Ok(Self {
            pdr_id: pdr_id.ok_or(PfcpError::MissingMandatoryIe("PDR ID"))?,
            local_f_teid,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cause_success() {
        assert!(PfcpCause::RequestAccepted.is_success());
        assert!(!PfcpCause::NoResourcesAvailable.is_success());
        assert_eq!(PfcpCause::try_from(65).unwrap(), PfcpCause::SessionContextNotFound);
        assert!(PfcpCause::try_from(2).is_err());
    }

    #[test]
    fn test_node_id_fqdn() {
        let node = NodeId::Fqdn("upf.mvc.local".to_string());
        let mut buf = BytesMut::new();
        node.encode(&mut buf);
        assert_eq!(NodeId::decode(&mut buf.freeze()).unwrap(), node);
    }

    #[test]
    fn test_ue_ip_address_direction_flag() {
        let addr = Ipv4Addr::new(10, 0, 0, 1);
        let mut buf = BytesMut::new();
        UeIpAddress::destination(addr).encode(&mut buf);
        assert_eq!(buf[0], 0x06);

        let decoded = UeIpAddress::decode(&mut buf.freeze()).unwrap();
        assert!(decoded.is_destination);
        assert_eq!(decoded.addr, addr);
    }

    #[test]
    fn test_bitrate_40_bit_fields() {
        let rate = Bitrate::new(0xFF_0000_0001, 100_000);
        let mut buf = BytesMut::new();
        rate.encode(&mut buf);
        assert_eq!(buf.len(), PFCP_BITRATE_LEN);
        assert_eq!(Bitrate::decode(&mut buf.freeze()).unwrap(), rate);
    }

    #[test]
    fn test_gate_status_closed_uplink() {
        let gate = GateStatus {
            ul_open: false,
            dl_open: true,
        };
        assert_eq!(gate.encode(), 0x04);
        assert_eq!(GateStatus::decode(0x04), gate);
    }

    #[test]
    fn test_create_pdr_requires_pdi() {
        let mut buf = BytesMut::new();
        encode_u16_ie(&mut buf, IeType::PdrId, 1);
        let err = CreatePdr::decode(&mut buf.freeze()).unwrap_err();
        assert_eq!(err, PfcpError::MissingMandatoryIe("PDI"));
    }

    #[test]
    fn test_create_far_with_outer_header_creation() {
        let mut far = CreateFar::new(2, ApplyAction::forward());
        let mut fp = ForwardingParameters::new(DestinationInterface::Access);
        fp.outer_header_creation = Some(OuterHeaderCreation::new_gtpu_ipv4(
            0x1234,
            Ipv4Addr::new(192, 168, 1, 10),
        ));
        far.forwarding_parameters = Some(fp);

        let mut buf = BytesMut::new();
        far.encode(&mut buf);
        let decoded = CreateFar::decode(&mut buf.freeze()).unwrap();
        assert_eq!(decoded, far);
        assert!(decoded.apply_action.forw);
    }
}
