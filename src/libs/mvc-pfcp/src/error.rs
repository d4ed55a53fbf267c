//! PFCP Error Types

use thiserror::Error;

/// PFCP codec error
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PfcpError {
    /// Buffer too short for operation
    #[error("Buffer too short: needed {needed} bytes, available {available}")]
    BufferTooShort { needed: usize, available: usize },

    /// Header length field disagrees with the header flags
    #[error("Invalid message length: {0}")]
    InvalidLength(u16),

    /// Message type not part of the supported set
    #[error("Invalid message type: {0}")]
    InvalidMessageType(u8),

    #[error("Invalid cause value: {0}")]
    InvalidCause(u8),

    #[error("Invalid node ID type: {0}")]
    InvalidNodeIdType(u8),

    #[error("Invalid interface type: {0}")]
    InvalidInterfaceType(u8),

    /// Missing mandatory IE
    #[error("Missing mandatory IE: {0}")]
    MissingMandatoryIe(&'static str),

    /// Version not supported
    #[error("PFCP version not supported: {0}")]
    VersionNotSupported(u8),
}

/// PFCP Result type
pub type PfcpResult<T> = Result<T, PfcpError>;

/// Fail with `BufferTooShort` unless `needed` bytes remain.
pub(crate) fn ensure_remaining(available: usize, needed: usize) -> PfcpResult<()> {
    if available < needed {
        return Err(PfcpError::BufferTooShort { needed, available });
    }
    Ok(())
}
