//! Pluggable message encodings.
//!
//! A [`Codec`] owns one duplex byte stream and speaks header/body frames over
//! it in a negotiated [`Format`]. The connection loop splits it: the read half
//! stays with the loop, the write half sits behind the per-connection write
//! lock shared by request tasks.

pub mod body;
pub mod format;
pub mod frame;
pub mod framed;
pub mod registry;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use tokio::io::{AsyncRead, AsyncWrite};

use crate::types::{ContentType, Result};

pub use body::Body;
pub use format::{Format, Json, MsgPack};
pub use framed::{new_framed_codec, FramedReader, FramedWriter};
pub use registry::{CodecRegistry, NewCodecFn};

/// Per-frame metadata preceding every request and response body.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Header {
    /// Target method, `"Service.Method"`.
    pub service_method: String,
    /// Caller-assigned correlation id, echoed back unchanged.
    pub seq: u64,
    /// Empty on success.
    #[serde(default)]
    pub error: String,
}

impl Header {
    pub fn new(service_method: impl Into<String>, seq: u64) -> Self {
        Self {
            service_method: service_method.into(),
            seq,
            error: String::new(),
        }
    }

    /// Copy of this header carrying `error`.
    pub fn with_error(&self, error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            ..self.clone()
        }
    }

    pub fn is_error(&self) -> bool {
        !self.error.is_empty()
    }
}

impl fmt::Display for Header {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.service_method, self.seq)?;
        if self.is_error() {
            write!(f, " ({})", self.error)?;
        }
        Ok(())
    }
}

/// Any bidirectional byte stream a codec can own (TCP, in-memory pipes, ...).
pub trait DuplexStream: AsyncRead + AsyncWrite + Send + Unpin + 'static {}

impl<T> DuplexStream for T where T: AsyncRead + AsyncWrite + Send + Unpin + 'static {}

/// Type-erased stream handed to codec constructors.
pub type BoxedStream = Box<dyn DuplexStream>;

/// Read half of a codec.
///
/// `read_header` and `read_body` must be called in that order for one frame.
#[async_trait]
pub trait CodecReader: Send {
    /// Next request header, or `None` once the peer closed the stream cleanly.
    async fn read_header(&mut self) -> Result<Option<Header>>;

    /// Body following the last header, left undecoded.
    /// [`crate::Error::Decode`] means the frame was consumed but is not a
    /// well-formed value; the stream is still usable.
    async fn read_body(&mut self) -> Result<Body>;
}

/// Write half of a codec.
#[async_trait]
pub trait CodecWriter: Send {
    /// Write a header+body pair. Nothing reaches the stream if encoding fails.
    async fn write(&mut self, header: &Header, body: &Value) -> Result<()>;

    /// Shut down the write side of the stream.
    async fn close(&mut self) -> Result<()>;
}

/// An encoding bound to one stream.
pub struct Codec {
    content_type: ContentType,
    reader: Box<dyn CodecReader>,
    writer: Box<dyn CodecWriter>,
}

impl Codec {
    pub fn new(
        content_type: ContentType,
        reader: Box<dyn CodecReader>,
        writer: Box<dyn CodecWriter>,
    ) -> Self {
        Self {
            content_type,
            reader,
            writer,
        }
    }

    pub fn content_type(&self) -> &ContentType {
        &self.content_type
    }

    pub async fn read_header(&mut self) -> Result<Option<Header>> {
        self.reader.read_header().await
    }

    pub async fn read_body(&mut self) -> Result<Body> {
        self.reader.read_body().await
    }

    pub async fn write(&mut self, header: &Header, body: &Value) -> Result<()> {
        self.writer.write(header, body).await
    }

    pub async fn close(&mut self) -> Result<()> {
        self.writer.close().await
    }

    /// Separate the halves so reads and writes can proceed concurrently.
    pub fn into_split(self) -> (Box<dyn CodecReader>, Box<dyn CodecWriter>) {
        (self.reader, self.writer)
    }
}

impl fmt::Debug for Codec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Codec")
            .field("content_type", &self.content_type)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_header_wire_names() {
        let header = Header::new("Arith.Add", 3).with_error("boom");
        let value = serde_json::to_value(&header).unwrap();
        assert_eq!(
            value,
            serde_json::json!({"ServiceMethod": "Arith.Add", "Seq": 3, "Error": "boom"})
        );
    }

    #[test]
    fn test_missing_error_field_defaults_to_empty() {
        let header: Header =
            serde_json::from_str(r#"{"ServiceMethod": "Foo.Bar", "Seq": 1}"#).unwrap();
        assert!(!header.is_error());
        assert_eq!(header.to_string(), "Foo.Bar#1");
    }
}
