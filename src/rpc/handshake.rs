//! Connection handshake.
//!
//! The first frame on every connection is a `FRAME_OPTIONS` frame holding a
//! JSON-encoded [`Options`]. It is read from the raw stream before any codec
//! exists, so it is always JSON regardless of the codec it selects. The server
//! never answers it: a rejected connection is simply closed.

use serde::{Deserialize, Serialize};
use tokio::io::{AsyncReadExt, AsyncWriteExt};

use crate::codec::frame::{kind_name, read_frame, write_frame, FRAME_OPTIONS};
use crate::codec::{BoxedStream, Codec, CodecRegistry, NewCodecFn};
use crate::types::{ContentType, HandshakeError, Result};

/// Protocol identifier every client must present.
pub const MAGIC_NUMBER: u32 = 0x3bef5c;

/// Handshake payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Options {
    pub magic_number: u32,
    pub codec_type: String,
}

impl Options {
    /// Options selecting `content_type` with the current magic number.
    pub fn new(content_type: impl Into<String>) -> Self {
        Self {
            magic_number: MAGIC_NUMBER,
            codec_type: content_type.into(),
        }
    }

    /// Check the magic number, then resolve the codec constructor.
    pub fn validate(&self, registry: &CodecRegistry) -> std::result::Result<NewCodecFn, HandshakeError> {
        if self.magic_number != MAGIC_NUMBER {
            return Err(HandshakeError::BadMagic(self.magic_number));
        }
        registry
            .get(&self.codec_type)
            .ok_or_else(|| HandshakeError::UnknownCodec(self.codec_type.clone()))
    }
}

impl Default for Options {
    fn default() -> Self {
        Self::new(ContentType::MSGPACK)
    }
}

/// Read the options frame off a raw stream.
pub async fn read_options<R: AsyncReadExt + Unpin>(
    reader: &mut R,
    max_frame_bytes: u32,
) -> std::result::Result<Options, HandshakeError> {
    let (kind, payload) = match read_frame(reader, max_frame_bytes).await {
        Ok(Some(frame)) => frame,
        Ok(None) => {
            return Err(HandshakeError::Malformed(
                "connection closed before handshake".to_string(),
            ))
        }
        Err(e) => return Err(HandshakeError::Malformed(e.to_string())),
    };

    if kind != FRAME_OPTIONS {
        return Err(HandshakeError::Malformed(format!(
            "expected options frame, got {}",
            kind_name(kind)
        )));
    }

    serde_json::from_slice(&payload).map_err(|e| HandshakeError::Malformed(e.to_string()))
}

/// Write the options frame; used by clients and tests.
pub async fn write_options<W: AsyncWriteExt + Unpin>(writer: &mut W, options: &Options) -> Result<()> {
    let payload = serde_json::to_vec(options)?;
    write_frame(writer, FRAME_OPTIONS, &payload).await?;
    Ok(())
}

/// Run the server side of the handshake and bind the negotiated codec to the
/// same stream. The stream is dropped (closed) on failure.
pub async fn negotiate(
    mut stream: BoxedStream,
    registry: &CodecRegistry,
    max_frame_bytes: u32,
) -> Result<Codec> {
    let options = read_options(&mut stream, max_frame_bytes).await?;
    let constructor = options.validate(registry)?;
    tracing::debug!("Handshake accepted: codec={}", options.codec_type);
    Ok(constructor(stream, max_frame_bytes))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Error;
    use proptest::prelude::*;

    #[test]
    fn test_default_options_wire_format() {
        let json = serde_json::to_value(Options::default()).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"MagicNumber": 0x3bef5c, "CodecType": "application/msgpack"})
        );
    }

    proptest! {
        #[test]
        fn prop_wrong_magic_always_rejected(magic in any::<u32>().prop_filter("not magic", |m| *m != MAGIC_NUMBER)) {
            let registry = CodecRegistry::default();
            let options = Options { magic_number: magic, codec_type: ContentType::MSGPACK.to_string() };
            prop_assert_eq!(options.validate(&registry).err(), Some(HandshakeError::BadMagic(magic)));
        }

        #[test]
        fn prop_unregistered_codec_always_rejected(codec in "[a-z]{1,12}/[a-z0-9.+-]{1,16}") {
            let registry = CodecRegistry::default();
            prop_assume!(!registry.contains(&codec));
            let options = Options::new(codec.clone());
            prop_assert_eq!(options.validate(&registry).err(), Some(HandshakeError::UnknownCodec(codec)));
        }
    }

    #[test]
    fn test_registered_codecs_accepted() {
        let registry = CodecRegistry::default();
        for ct in [ContentType::MSGPACK, ContentType::JSON] {
            assert!(Options::new(ct).validate(&registry).is_ok());
        }
    }

    #[tokio::test]
    async fn test_negotiate_binds_selected_codec() {
        let (mut client, server) = tokio::io::duplex(1024);
        write_options(&mut client, &Options::new(ContentType::JSON))
            .await
            .unwrap();

        let codec = negotiate(Box::new(server), &CodecRegistry::default(), 1024)
            .await
            .unwrap();
        assert_eq!(codec.content_type().as_str(), ContentType::JSON);
    }

    #[tokio::test]
    async fn test_garbage_options_are_malformed() {
        let (mut client, server) = tokio::io::duplex(1024);
        write_frame(&mut client, FRAME_OPTIONS, b"\x93\x01\x02")
            .await
            .unwrap();

        let err = negotiate(Box::new(server), &CodecRegistry::default(), 1024)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Handshake(HandshakeError::Malformed(_))));
    }

    #[tokio::test]
    async fn test_eof_before_handshake_is_malformed() {
        let (client, server) = tokio::io::duplex(1024);
        drop(client);

        let err = negotiate(Box::new(server), &CodecRegistry::default(), 1024)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Handshake(HandshakeError::Malformed(_))));
    }
}
