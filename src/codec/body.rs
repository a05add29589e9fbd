//! Undecoded message bodies.
//!
//! A codec only checks that a body frame holds one well-formed value of its
//! format; turning it into a concrete type is up to whoever consumes it.

use serde::de::{DeserializeOwned, IgnoredAny};
use std::fmt;

use super::{Format, Json, MsgPack};
use crate::types::{ContentType, Error, Result};

/// Raw body bytes tagged with the content type they were encoded in.
#[derive(Clone, PartialEq, Eq)]
pub struct Body {
    content_type: ContentType,
    bytes: Vec<u8>,
}

impl Body {
    pub fn new(content_type: ContentType, bytes: Vec<u8>) -> Self {
        Self {
            content_type,
            bytes,
        }
    }

    /// Accept `bytes` if they hold exactly one value of format `F`.
    ///
    /// Any value the format can express is accepted, including shapes a
    /// `serde_json::Value` cannot hold (MessagePack `bin`, `ext`, maps with
    /// non-string keys).
    pub fn parse<F: Format>(bytes: Vec<u8>) -> Result<Self> {
        F::decode::<IgnoredAny>(&bytes)?;
        Ok(Self::new(ContentType::from(F::CONTENT_TYPE), bytes))
    }

    pub fn content_type(&self) -> &ContentType {
        &self.content_type
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Decode with the format matching the body's content type.
    pub fn decode<T: DeserializeOwned>(&self) -> Result<T> {
        match self.content_type.as_str() {
            ContentType::MSGPACK => self.decode_as::<MsgPack, T>(),
            ContentType::JSON => self.decode_as::<Json, T>(),
            other => Err(Error::decode(format!("no decoder for content type {}", other))),
        }
    }

    /// Decode with an explicit format, for codecs registered under custom
    /// content types.
    pub fn decode_as<F: Format, T: DeserializeOwned>(&self) -> Result<T> {
        F::decode(&self.bytes)
    }
}

impl fmt::Debug for Body {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Body")
            .field("content_type", &self.content_type)
            .field("len", &self.bytes.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Value};

    #[test]
    fn test_msgpack_bin_and_int_keyed_map_are_accepted() {
        // bin8 [1, 2, 3]
        let bin = Body::parse::<MsgPack>(vec![0xc4, 3, 1, 2, 3]).unwrap();
        assert_eq!(bin.content_type().as_str(), ContentType::MSGPACK);
        assert_eq!(bin.len(), 5);

        // {1: "a"}
        let map = Body::parse::<MsgPack>(vec![0x81, 0x01, 0xa1, b'a']).unwrap();
        assert_eq!(map.as_bytes(), &[0x81, 0x01, 0xa1, b'a']);
    }

    #[test]
    fn test_malformed_bytes_are_a_decode_error() {
        let err = Body::parse::<MsgPack>(vec![0xc1]).unwrap_err();
        assert!(err.is_recoverable());

        let err = Body::parse::<Json>(b"{broken".to_vec()).unwrap_err();
        assert!(err.is_recoverable());
    }

    #[test]
    fn test_decode_follows_content_type() {
        let body = Body::parse::<Json>(br#"{"a": [1, 2]}"#.to_vec()).unwrap();
        assert_eq!(body.decode::<Value>().unwrap(), json!({"a": [1, 2]}));

        let body = Body::parse::<MsgPack>(MsgPack::encode("hi").unwrap()).unwrap();
        assert_eq!(body.decode::<String>().unwrap(), "hi");
    }

    #[test]
    fn test_unknown_content_type_needs_explicit_format() {
        let body = Body::new(ContentType::from("application/x-custom"), b"7".to_vec());
        assert!(matches!(body.decode::<u32>(), Err(Error::Decode(_))));
        assert_eq!(body.decode_as::<Json, u32>().unwrap(), 7);
    }
}
