//! GTP Error types

use thiserror::Error;

/// GTP Error type
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GtpError {
    /// Buffer too short for operation
    #[error("Buffer too short: need {needed} bytes, have {available}")]
    BufferTooShort { needed: usize, available: usize },

    /// Invalid header
    #[error("Invalid header: {0}")]
    InvalidHeader(String),

    #[error("Invalid message type: {0}")]
    InvalidMessageType(u8),

    /// Missing mandatory IE
    #[error("Missing mandatory IE: {0}")]
    MissingMandatoryIe(&'static str),

    #[error("Invalid GTP version: {0}")]
    InvalidVersion(u8),

    #[error("Invalid cause value: {0}")]
    InvalidCause(u8),

    /// IMSI digits outside 0-9 or of invalid length
    #[error("Invalid IMSI: {0}")]
    InvalidImsi(String),
}

/// GTP Result type
pub type GtpResult<T> = Result<T, GtpError>;

pub(crate) fn ensure_remaining(available: usize, needed: usize) -> GtpResult<()> {
    if available < needed {
        return Err(GtpError::BufferTooShort { needed, available });
    }
    Ok(())
}
