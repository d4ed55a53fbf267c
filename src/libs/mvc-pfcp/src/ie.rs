//! PFCP Information Elements
//!
//! TLV framing shared by every PFCP IE (TS 29.244 clause 8.1.1).

use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::error::{ensure_remaining, PfcpResult};

/// IE type values used on N4 (TS 29.244 Table 8.1.2-1)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u16)]
pub enum IeType {
    CreatePdr = 1,
    Pdi = 2,
    CreateFar = 3,
    ForwardingParameters = 4,
    CreateQer = 7,
    CreatedPdr = 8,
    UpdateQer = 14,
    Cause = 19,
    SourceInterface = 20,
    FTeid = 21,
    NetworkInstance = 22,
    GateStatus = 25,
    Mbr = 26,
    Gbr = 27,
    Precedence = 29,
    DestinationInterface = 42,
    ApplyAction = 44,
    PdrId = 56,
    FSeid = 57,
    NodeId = 60,
    OuterHeaderCreation = 84,
    UeIpAddress = 93,
    OuterHeaderRemoval = 95,
    RecoveryTimeStamp = 96,
    FarId = 108,
    QerId = 109,
    Qfi = 124,
}

impl IeType {
    pub fn matches(self, raw: u16) -> bool {
        self as u16 == raw
    }
}

/// PFCP IE Header (4 bytes)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IeHeader {
    pub ie_type: u16,
    pub length: u16,
}

impl IeHeader {
    pub const LEN: usize = 4;

    pub fn new(ie_type: u16, length: u16) -> Self {
        Self { ie_type, length }
    }

    pub fn encode(&self, buf: &mut BytesMut) {
        buf.put_u16(self.ie_type);
        buf.put_u16(self.length);
    }

    pub fn decode(buf: &mut Bytes) -> PfcpResult<Self> {
        ensure_remaining(buf.remaining(), Self::LEN)?;
        Ok(Self {
            ie_type: buf.get_u16(),
            length: buf.get_u16(),
        })
    }
}

/// IE with undecoded value
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawIe {
    pub ie_type: u16,
    pub data: Bytes,
}

impl RawIe {
    pub fn decode(buf: &mut Bytes) -> PfcpResult<Self> {
        let header = IeHeader::decode(buf)?;
        ensure_remaining(buf.remaining(), header.length as usize)?;
        let data = buf.copy_to_bytes(header.length as usize);
        Ok(Self {
            ie_type: header.ie_type,
            data,
        })
    }

    /// First octet of the value, if any
    pub fn first_octet(&self) -> Option<u8> {
        self.data.first().copied()
    }

    pub fn u16_value(&self) -> Option<u16> {
        (self.data.len() >= 2).then(|| u16::from_be_bytes([self.data[0], self.data[1]]))
    }

    pub fn u32_value(&self) -> Option<u32> {
        (self.data.len() >= 4)
            .then(|| u32::from_be_bytes([self.data[0], self.data[1], self.data[2], self.data[3]]))
    }
}

/// Walk the IEs of a message body or grouped IE
pub fn decode_ies(buf: &mut Bytes) -> PfcpResult<Vec<RawIe>> {
    let mut ies = Vec::new();
    while buf.remaining() >= IeHeader::LEN {
        ies.push(RawIe::decode(buf)?);
    }
    Ok(ies)
}

pub fn encode_u8_ie(buf: &mut BytesMut, ie_type: IeType, value: u8) {
    IeHeader::new(ie_type as u16, 1).encode(buf);
    buf.put_u8(value);
}

pub fn encode_u16_ie(buf: &mut BytesMut, ie_type: IeType, value: u16) {
    IeHeader::new(ie_type as u16, 2).encode(buf);
    buf.put_u16(value);
}

pub fn encode_u32_ie(buf: &mut BytesMut, ie_type: IeType, value: u32) {
    IeHeader::new(ie_type as u16, 4).encode(buf);
    buf.put_u32(value);
}

/// Encode an IE whose value is produced by `f`; the length is back-filled.
pub fn encode_ie_with<F>(buf: &mut BytesMut, ie_type: IeType, f: F)
where
    F: FnOnce(&mut BytesMut),
{
    let mut value = BytesMut::new();
    f(&mut value);
    IeHeader::new(ie_type as u16, value.len() as u16).encode(buf);
    buf.put_slice(&value);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_grouped_ie_length_backfilled() {
        let mut buf = BytesMut::new();
        encode_ie_with(&mut buf, IeType::Pdi, |inner| {
            encode_u8_ie(inner, IeType::SourceInterface, 0);
        });
        // outer header (4) + inner header (4) + 1 octet
        assert_eq!(buf.len(), 9);
        assert_eq!(&buf[0..4], &[0, 2, 0, 5]);
    }

    #[test]
    fn test_decode_ies_stops_on_truncated_value() {
        let mut bytes = Bytes::from_static(&[0, 19, 0, 4, 1]);
        assert!(decode_ies(&mut bytes).is_err());
    }

    #[test]
    fn test_raw_ie_scalar_accessors() {
        let mut buf = BytesMut::new();
        encode_u32_ie(&mut buf, IeType::FarId, 0xDEAD_BEEF);
        let ie = RawIe::decode(&mut buf.freeze()).unwrap();
        assert!(IeType::FarId.matches(ie.ie_type));
        assert_eq!(ie.u32_value(), Some(0xDEAD_BEEF));
        assert_eq!(ie.u16_value(), Some(0xDEAD));
        assert_eq!(ie.first_octet(), Some(0xDE));
    }
}
