//! Control plane error types

use std::time::Duration;

use mvc_gtp::{Gtp2Cause, GtpError};
use mvc_pfcp::types::PfcpCause;
use mvc_pfcp::PfcpError;
use thiserror::Error;

/// Registration rejected by the authenticator
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthError {
    #[error("unknown identity")]
    UnknownIdentity,
    #[error("invalid credential")]
    InvalidCredential,
    #[error("malformed identity")]
    MalformedIdentity,
}

/// UE address pool errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PoolError {
    #[error("invalid pool range {first} - {last}")]
    InvalidRange {
        first: std::net::Ipv4Addr,
        last: std::net::Ipv4Addr,
    },
    #[error("address pool exhausted")]
    Exhausted,
}

/// Forwarding rule installation errors
#[derive(Error, Debug)]
pub enum InstallError {
    #[error("no response from user plane within {0:?}")]
    Timeout(Duration),
    #[error("protocol error: {0}")]
    Protocol(String),
    #[error("user plane rejected request: {}", .0.name())]
    Rejected(PfcpCause),
    #[error("PFCP codec error: {0}")]
    Codec(#[from] PfcpError),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Session manager errors
#[derive(Error, Debug)]
pub enum SessionError {
    #[error("resource exhausted")]
    ResourceExhausted,
    #[error("session not found")]
    SessionNotFound,
    #[error("invalid session state: {0}")]
    InvalidState(&'static str),
    #[error("forwarding installation failed: {0}")]
    Install(#[from] InstallError),
}

impl From<PoolError> for SessionError {
    fn from(err: PoolError) -> Self {
        match err {
            PoolError::Exhausted => SessionError::ResourceExhausted,
            PoolError::InvalidRange { .. } => SessionError::InvalidState("pool not initialized"),
        }
    }
}

impl SessionError {
    /// GTPv2 cause reported to the peer for this failure
    pub fn gtp_cause(&self) -> Gtp2Cause {
        match self {
            SessionError::ResourceExhausted => Gtp2Cause::AllDynamicAddressesAreOccupied,
            SessionError::SessionNotFound => Gtp2Cause::ContextNotFound,
            SessionError::InvalidState(_) => Gtp2Cause::RequestRejected,
            SessionError::Install(InstallError::Timeout(_)) => Gtp2Cause::RemotePeerNotResponding,
            SessionError::Install(_) => Gtp2Cause::SystemFailure,
        }
    }
}

/// Quota ledger errors
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuotaError {
    #[error("invalid amount")]
    InvalidAmount,
    #[error("subscriber not found")]
    SubscriberNotFound,
    #[error("insufficient balance")]
    InsufficientBalance,
}

/// Malformed inbound message on the registration or session transport
#[derive(Error, Debug)]
pub enum CodecError {
    #[error("frame too short: need {needed} bytes, have {available}")]
    Truncated { needed: usize, available: usize },
    #[error("frame of {0} bytes exceeds limit")]
    Oversized(usize),
    #[error("unknown message type: {0}")]
    UnknownMessageType(u8),
    #[error("invalid payload: {0}")]
    InvalidPayload(#[from] serde_json::Error),
    #[error("GTP decode error: {0}")]
    Gtp(#[from] GtpError),
}

impl CodecError {
    pub fn gtp_cause(&self) -> Gtp2Cause {
        match self {
            CodecError::Gtp(GtpError::MissingMandatoryIe(_)) => Gtp2Cause::MandatoryIeMissing,
            _ => Gtp2Cause::InvalidMessageFormat,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_auth_reasons() {
        assert_eq!(AuthError::UnknownIdentity.to_string(), "unknown identity");
        assert_eq!(AuthError::InvalidCredential.to_string(), "invalid credential");
        assert_eq!(AuthError::MalformedIdentity.to_string(), "malformed identity");
    }

    #[test]
    fn test_session_error_causes() {
        assert_eq!(
            SessionError::from(PoolError::Exhausted).gtp_cause(),
            Gtp2Cause::AllDynamicAddressesAreOccupied
        );
        assert_eq!(SessionError::SessionNotFound.gtp_cause(), Gtp2Cause::ContextNotFound);
        assert_eq!(
            SessionError::from(InstallError::Timeout(Duration::from_secs(5))).gtp_cause(),
            Gtp2Cause::RemotePeerNotResponding
        );
        assert_eq!(
            SessionError::from(InstallError::Protocol("bad".into())).gtp_cause(),
            Gtp2Cause::SystemFailure
        );
    }

    #[test]
    fn test_codec_error_causes() {
        let missing = CodecError::from(GtpError::MissingMandatoryIe("IMSI"));
        assert_eq!(missing.gtp_cause(), Gtp2Cause::MandatoryIeMissing);
        assert_eq!(
            CodecError::UnknownMessageType(9).gtp_cause(),
            Gtp2Cause::InvalidMessageFormat
        );
    }
}
