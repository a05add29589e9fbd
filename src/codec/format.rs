//! Payload formats plugged into the framed codec.
//!
//! A [`Format`] only turns values into bytes and back; framing, ordering and
//! stream ownership live in [`super::framed`].

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::types::Result;

/// Serialization format for header and body payloads.
pub trait Format: Send + Sync + 'static {
    /// Content-type identifier the format is registered under.
    const CONTENT_TYPE: &'static str;

    fn encode<T: Serialize + ?Sized>(value: &T) -> Result<Vec<u8>>;

    fn decode<T: DeserializeOwned>(bytes: &[u8]) -> Result<T>;
}

/// MessagePack via `rmp-serde`.
///
/// Always `to_vec_named`: structs go out as maps keyed by field name, so the
/// header stays self-describing for peers that decode into dynamic values.
#[derive(Debug, Clone, Copy, Default)]
pub struct MsgPack;

impl Format for MsgPack {
    const CONTENT_TYPE: &'static str = crate::types::ContentType::MSGPACK;

    #[inline]
    fn encode<T: Serialize + ?Sized>(value: &T) -> Result<Vec<u8>> {
        Ok(rmp_serde::to_vec_named(value)?)
    }

    #[inline]
    fn decode<T: DeserializeOwned>(bytes: &[u8]) -> Result<T> {
        Ok(rmp_serde::from_slice(bytes)?)
    }
}

/// JSON via `serde_json`.
#[derive(Debug, Clone, Copy, Default)]
pub struct Json;

impl Format for Json {
    const CONTENT_TYPE: &'static str = crate::types::ContentType::JSON;

    #[inline]
    fn encode<T: Serialize + ?Sized>(value: &T) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec(value)?)
    }

    #[inline]
    fn decode<T: DeserializeOwned>(bytes: &[u8]) -> Result<T> {
        Ok(serde_json::from_slice(bytes)?)
    }
}
