//! GTPv2 Information Elements
//!
//! Generic TLIV element plus typed views for the elements carried by the
//! session messages.

use std::net::Ipv4Addr;

use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::error::{ensure_remaining, GtpError, GtpResult};

/// GTPv2 IE Types
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Gtp2IeType {
    Imsi = 1,
    Cause = 2,
    Recovery = 3,
    Ebi = 73,
    Paa = 79,
    BearerQos = 80,
    FTeid = 87,
}

/// GTPv2 cause values used on the session interface
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Gtp2Cause {
    RequestAccepted = 16,
    ContextNotFound = 64,
    InvalidMessageFormat = 65,
    MandatoryIeMissing = 70,
    SystemFailure = 72,
    NoResourcesAvailable = 73,
    AllDynamicAddressesAreOccupied = 84,
    RequestRejected = 94,
    RemotePeerNotResponding = 100,
}

impl TryFrom<u8> for Gtp2Cause {
    type Error = GtpError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            16 => Ok(Self::RequestAccepted),
            64 => Ok(Self::ContextNotFound),
            65 => Ok(Self::InvalidMessageFormat),
            70 => Ok(Self::MandatoryIeMissing),
            72 => Ok(Self::SystemFailure),
            73 => Ok(Self::NoResourcesAvailable),
            84 => Ok(Self::AllDynamicAddressesAreOccupied),
            94 => Ok(Self::RequestRejected),
            100 => Ok(Self::RemotePeerNotResponding),
            _ => Err(GtpError::InvalidCause(value)),
        }
    }
}

impl Gtp2Cause {
    pub fn is_accepted(&self) -> bool {
        *self == Self::RequestAccepted
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::RequestAccepted => "Request accepted",
            Self::ContextNotFound => "Context Not Found",
            Self::InvalidMessageFormat => "Invalid Message Format",
            Self::MandatoryIeMissing => "Mandatory IE missing",
            Self::SystemFailure => "System failure",
            Self::NoResourcesAvailable => "No resources available",
            Self::AllDynamicAddressesAreOccupied => "All dynamic addresses are occupied",
            Self::RequestRejected => "Request rejected",
            Self::RemotePeerNotResponding => "Remote peer not responding",
        }
    }
}

/// Generic GTPv2 Information Element
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Gtp2Ie {
    pub ie_type: u8,
    /// 4-bit instance
    pub instance: u8,
    pub value: Bytes,
}

impl Gtp2Ie {
    pub fn new(ie_type: Gtp2IeType, value: Bytes) -> Self {
        Self {
            ie_type: ie_type as u8,
            instance: 0,
            value,
        }
    }

    pub fn is(&self, ie_type: Gtp2IeType) -> bool {
        self.ie_type == ie_type as u8
    }

    pub fn encode(&self, buf: &mut BytesMut) {
        buf.put_u8(self.ie_type);
        buf.put_u16(self.value.len() as u16);
        buf.put_u8(self.instance & 0x0F);
        buf.put_slice(&self.value);
    }

    pub fn decode(buf: &mut Bytes) -> GtpResult<Self> {
        ensure_remaining(buf.remaining(), 4)?;

        let ie_type = buf.get_u8();
        let length = buf.get_u16() as usize;
        let instance = buf.get_u8() & 0x0F;

        ensure_remaining(buf.remaining(), length)?;
        let value = buf.copy_to_bytes(length);
        Ok(Self {
            ie_type,
            instance,
            value,
        })
    }

    pub fn encoded_len(&self) -> usize {
        4 + self.value.len()
    }

    pub fn u8_value(&self) -> GtpResult<u8> {
        ensure_remaining(self.value.len(), 1)?;
        Ok(self.value[0])
    }
}

/// Decode every IE in `buf`
pub fn decode_ies(buf: &mut Bytes) -> GtpResult<Vec<Gtp2Ie>> {
    let mut ies = Vec::new();
    while buf.has_remaining() {
        ies.push(Gtp2Ie::decode(buf)?);
    }
    Ok(ies)
}

// ============================================================================
// IMSI (TBCD)
// ============================================================================

/// Pack a digit string as TBCD, low nibble first, 0xF filler on odd length
pub fn encode_imsi(imsi: &str) -> GtpResult<Bytes> {
    if imsi.is_empty() || imsi.len() > 15 || !imsi.bytes().all(|b| b.is_ascii_digit()) {
        return Err(GtpError::InvalidImsi(imsi.to_string()));
    }
    let mut out = BytesMut::with_capacity(imsi.len().div_ceil(2));
    for pair in imsi.as_bytes().chunks(2) {
        let low = pair[0] - b'0';
        let high = pair.get(1).map(|d| d - b'0').unwrap_or(0x0F);
        out.put_u8((high << 4) | low);
    }
    Ok(out.freeze())
}

pub fn decode_imsi(value: &[u8]) -> GtpResult<String> {
    let mut imsi = String::with_capacity(value.len() * 2);
    for (i, octet) in value.iter().enumerate() {
        for (pos, nibble) in [octet & 0x0F, octet >> 4].into_iter().enumerate() {
            match nibble {
                0..=9 => imsi.push(char::from(b'0' + nibble)),
                0x0F if pos == 1 && i == value.len() - 1 => {}
                _ => return Err(GtpError::InvalidImsi(format!("{:02x?}", value))),
            }
        }
    }
    if imsi.is_empty() {
        return Err(GtpError::InvalidImsi(String::new()));
    }
    Ok(imsi)
}

// ============================================================================
// Cause
// ============================================================================

pub fn encode_cause(cause: Gtp2Cause) -> Gtp2Ie {
    // cause value followed by the PCE/BCE/CS flags octet
    Gtp2Ie::new(Gtp2IeType::Cause, Bytes::copy_from_slice(&[cause as u8, 0]))
}

pub fn decode_cause(ie: &Gtp2Ie) -> GtpResult<Gtp2Cause> {
    Gtp2Cause::try_from(ie.u8_value()?)
}

// ============================================================================
// F-TEID
// ============================================================================

/// Fully qualified TEID (IPv4 only)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FTeid {
    pub interface_type: u8,
    pub teid: u32,
    pub ipv4_addr: Option<Ipv4Addr>,
}

impl FTeid {
    pub fn new(interface_type: u8, teid: u32, ipv4_addr: Option<Ipv4Addr>) -> Self {
        Self {
            interface_type: interface_type & 0x3F,
            teid,
            ipv4_addr,
        }
    }

    pub fn to_ie(&self) -> Gtp2Ie {
        let mut value = BytesMut::with_capacity(9);
        let v4 = if self.ipv4_addr.is_some() { 0x80 } else { 0x00 };
        value.put_u8(v4 | (self.interface_type & 0x3F));
        value.put_u32(self.teid);
        if let Some(addr) = self.ipv4_addr {
            value.put_slice(&addr.octets());
        }
        Gtp2Ie::new(Gtp2IeType::FTeid, value.freeze())
    }

    pub fn from_ie(ie: &Gtp2Ie) -> GtpResult<Self> {
        let mut value = ie.value.clone();
        ensure_remaining(value.remaining(), 5)?;
        let flags = value.get_u8();
        let teid = value.get_u32();
        let ipv4_addr = if flags & 0x80 != 0 {
            ensure_remaining(value.remaining(), 4)?;
            Some(Ipv4Addr::from(value.get_u32()))
        } else {
            None
        };
        Ok(Self {
            interface_type: flags & 0x3F,
            teid,
            ipv4_addr,
        })
    }
}

// ============================================================================
// PAA
// ============================================================================

const PDN_TYPE_IPV4: u8 = 1;

pub fn encode_paa(addr: Ipv4Addr) -> Gtp2Ie {
    let mut value = BytesMut::with_capacity(5);
    value.put_u8(PDN_TYPE_IPV4);
    value.put_slice(&addr.octets());
    Gtp2Ie::new(Gtp2IeType::Paa, value.freeze())
}

pub fn decode_paa(ie: &Gtp2Ie) -> GtpResult<Ipv4Addr> {
    let mut value = ie.value.clone();
    ensure_remaining(value.remaining(), 5)?;
    let pdn_type = value.get_u8() & 0x07;
    if pdn_type != PDN_TYPE_IPV4 {
        return Err(GtpError::InvalidHeader(format!("unsupported PDN type {}", pdn_type)));
    }
    Ok(Ipv4Addr::from(value.get_u32()))
}

// ============================================================================
// Bearer QoS
// ============================================================================

const BEARER_QOS_LEN: usize = 22;

/// Bearer level QoS; bit rates in kbps
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BearerQos {
    /// Pre-emption capability disabled when set
    pub pci: bool,
    /// ARP priority level (1..=15)
    pub priority_level: u8,
    /// Pre-emption vulnerability disabled when set
    pub pvi: bool,
    pub qci: u8,
    pub mbr_ul: u64,
    pub mbr_dl: u64,
    pub gbr_ul: u64,
    pub gbr_dl: u64,
}

impl BearerQos {
    pub fn new(qci: u8, priority_level: u8) -> Self {
        Self {
            pci: false,
            priority_level,
            pvi: false,
            qci,
            mbr_ul: 0,
            mbr_dl: 0,
            gbr_ul: 0,
            gbr_dl: 0,
        }
    }

    pub fn to_ie(&self) -> Gtp2Ie {
        let mut value = BytesMut::with_capacity(BEARER_QOS_LEN);
        let mut arp = (self.priority_level & 0x0F) << 2;
        if self.pci {
            arp |= 0x40;
        }
        if self.pvi {
            arp |= 0x01;
        }
        value.put_u8(arp);
        value.put_u8(self.qci);
        for rate in [self.mbr_ul, self.mbr_dl, self.gbr_ul, self.gbr_dl] {
            value.put_slice(&rate.to_be_bytes()[3..8]);
        }
        Gtp2Ie::new(Gtp2IeType::BearerQos, value.freeze())
    }

    pub fn from_ie(ie: &Gtp2Ie) -> GtpResult<Self> {
        let mut value = ie.value.clone();
        ensure_remaining(value.remaining(), BEARER_QOS_LEN)?;
        let arp = value.get_u8();
        let qci = value.get_u8();
        let mut rates = [0u64; 4];
        for rate in rates.iter_mut() {
            *rate = (u64::from(value.get_u8()) << 32) | u64::from(value.get_u32());
        }
        Ok(Self {
            pci: arp & 0x40 != 0,
            priority_level: (arp >> 2) & 0x0F,
            pvi: arp & 0x01 != 0,
            qci,
            mbr_ul: rates[0],
            mbr_dl: rates[1],
            gbr_ul: rates[2],
            gbr_dl: rates[3],
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_imsi_tbcd() {
        let encoded = encode_imsi("001010123456789").unwrap();
        assert_eq!(encoded.len(), 8);
        assert_eq!(encoded[0], 0x00);
        assert_eq!(encoded[1], 0x01);
        assert_eq!(encoded[7], 0xF9);
        assert_eq!(decode_imsi(&encoded).unwrap(), "001010123456789");

        let even = encode_imsi("0010101234").unwrap();
        assert_eq!(decode_imsi(&even).unwrap(), "0010101234");
    }

    #[test]
    fn test_imsi_rejects_non_digits() {
        assert!(encode_imsi("00101abc").is_err());
        assert!(encode_imsi("").is_err());
        assert!(decode_imsi(&[0xAB]).is_err());
    }

    #[test]
    fn test_fteid_with_address() {
        let fteid = FTeid::new(0, 0x1000, Some(Ipv4Addr::new(192, 168, 1, 10)));
        let ie = fteid.to_ie();
        assert_eq!(ie.value.len(), 9);
        assert_eq!(ie.value[0], 0x80);
        assert_eq!(FTeid::from_ie(&ie).unwrap(), fteid);
    }

    #[test]
    fn test_fteid_without_address() {
        let fteid = FTeid::new(1, 7, None);
        let decoded = FTeid::from_ie(&fteid.to_ie()).unwrap();
        assert_eq!(decoded.ipv4_addr, None);
        assert_eq!(decoded.interface_type, 1);
    }

    #[test]
    fn test_bearer_qos_layout() {
        let mut qos = BearerQos::new(9, 1);
        qos.mbr_ul = 100_000;
        qos.mbr_dl = 200_000;
        let ie = qos.to_ie();
        assert_eq!(ie.value.len(), 22);
        assert_eq!(ie.value[0], 0x04);
        assert_eq!(ie.value[1], 9);
        assert_eq!(BearerQos::from_ie(&ie).unwrap(), qos);
    }

    #[test]
    fn test_cause_and_paa() {
        let ie = encode_cause(Gtp2Cause::AllDynamicAddressesAreOccupied);
        assert_eq!(decode_cause(&ie).unwrap(), Gtp2Cause::AllDynamicAddressesAreOccupied);

        let paa = encode_paa(Ipv4Addr::new(10, 0, 0, 1));
        assert_eq!(decode_paa(&paa).unwrap(), Ipv4Addr::new(10, 0, 0, 1));
    }

    #[test]
    fn test_truncated_ie() {
        let mut buf = Bytes::from_static(&[87, 0, 9, 0, 0x80]);
        assert!(matches!(
            Gtp2Ie::decode(&mut buf),
            Err(GtpError::BufferTooShort { .. })
        ));
    }
}
