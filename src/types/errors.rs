//! Application error types.
//!
//! All errors use `thiserror` for automatic Error trait derivation and provide
//! clear error messages with context.

use thiserror::Error;

/// Application result type.
pub type Result<T> = std::result::Result<T, Error>;

/// Reasons a connection is rejected before any codec is agreed on.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum HandshakeError {
    /// The options frame was missing, truncated or not decodable.
    #[error("malformed options: {0}")]
    Malformed(String),

    /// The magic number did not match [`crate::rpc::MAGIC_NUMBER`].
    #[error("invalid magic number {0:#x}")]
    BadMagic(u32),

    /// The requested content type has no registered codec.
    #[error("invalid codec type {0}")]
    UnknownCodec(String),
}

/// Main error enum for the RPC transport.
#[derive(Error, Debug)]
pub enum Error {
    /// Connection rejected during the handshake (no error frame is sent).
    #[error("handshake rejected: {0}")]
    Handshake(#[from] HandshakeError),

    /// Unexpected frame on the wire (wrong kind, bad ordering).
    #[error("protocol error: {0}")]
    Protocol(String),

    /// A value could not be encoded by the negotiated codec.
    #[error("encode error: {0}")]
    Encode(String),

    /// A complete frame arrived but its payload did not decode.
    #[error("decode error: {0}")]
    Decode(String),

    /// Returned by a dispatcher; carried back in the response header.
    #[error("dispatch error: {0}")]
    Dispatch(String),

    /// Validation errors (configuration values).
    #[error("validation error: {0}")]
    Validation(String),

    /// Internal errors.
    #[error("internal error: {0}")]
    Internal(String),

    /// I/O errors.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Whether the connection loop can keep reading after this error.
    ///
    /// Only payload decode failures leave the stream aligned on a frame
    /// boundary; everything else ends the connection.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Error::Decode(_))
    }
}

// Convenience constructors
impl Error {
    pub fn protocol(msg: impl Into<String>) -> Self {
        Self::Protocol(msg.into())
    }

    pub fn encode(msg: impl Into<String>) -> Self {
        Self::Encode(msg.into())
    }

    pub fn decode(msg: impl Into<String>) -> Self {
        Self::Decode(msg.into())
    }

    pub fn dispatch(msg: impl Into<String>) -> Self {
        Self::Dispatch(msg.into())
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        if err.is_io() {
            Self::Io(err.into())
        } else if err.is_data() || err.is_syntax() || err.is_eof() {
            Self::Decode(err.to_string())
        } else {
            Self::Encode(err.to_string())
        }
    }
}

impl From<rmp_serde::encode::Error> for Error {
    fn from(err: rmp_serde::encode::Error) -> Self {
        Self::Encode(err.to_string())
    }
}

impl From<rmp_serde::decode::Error> for Error {
    fn from(err: rmp_serde::decode::Error) -> Self {
        Self::Decode(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_decode_errors_are_recoverable() {
        assert!(Error::decode("bad body").is_recoverable());
        assert!(!Error::protocol("unexpected frame").is_recoverable());
        assert!(!Error::from(HandshakeError::BadMagic(1)).is_recoverable());
        let io = std::io::Error::new(std::io::ErrorKind::BrokenPipe, "gone");
        assert!(!Error::from(io).is_recoverable());
    }

    #[test]
    fn test_json_syntax_error_maps_to_decode() {
        let err = serde_json::from_slice::<serde_json::Value>(b"{not json").unwrap_err();
        assert!(matches!(Error::from(err), Error::Decode(_)));
    }

    #[test]
    fn test_handshake_messages() {
        assert_eq!(
            HandshakeError::BadMagic(0x1234).to_string(),
            "invalid magic number 0x1234"
        );
        assert_eq!(
            Error::from(HandshakeError::UnknownCodec("text/plain".into())).to_string(),
            "handshake rejected: invalid codec type text/plain"
        );
    }
}
