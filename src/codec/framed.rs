//! Generic length-prefixed codec parameterized by a [`Format`].

use async_trait::async_trait;
use serde_json::Value;
use std::fmt;
use std::marker::PhantomData;
use tokio::io::{AsyncWriteExt, ReadHalf, WriteHalf};

use super::frame::{encode_frame, kind_name, read_frame, FRAME_BODY, FRAME_HEADER};
use super::{Body, BoxedStream, Codec, CodecReader, CodecWriter, Format, Header};
use crate::types::{ContentType, Error, Result};

/// Wrap `stream` in a codec speaking format `F`.
///
/// Matches [`super::NewCodecFn`] so it can be registered directly, e.g.
/// `registry.register(ContentType::json(), new_framed_codec::<Json>)`.
pub fn new_framed_codec<F: Format>(stream: BoxedStream, max_frame_bytes: u32) -> Codec {
    let (read, write) = tokio::io::split(stream);
    Codec::new(
        ContentType::from(F::CONTENT_TYPE),
        Box::new(FramedReader::<F>::new(read, max_frame_bytes)),
        Box::new(FramedWriter::<F>::new(write)),
    )
}

/// Read half: pulls header and body frames off the stream.
pub struct FramedReader<F> {
    inner: ReadHalf<BoxedStream>,
    max_frame_bytes: u32,
    _format: PhantomData<fn() -> F>,
}

impl<F: Format> FramedReader<F> {
    pub fn new(inner: ReadHalf<BoxedStream>, max_frame_bytes: u32) -> Self {
        Self {
            inner,
            max_frame_bytes,
            _format: PhantomData,
        }
    }

    async fn expect_frame(&mut self, expected: u8) -> Result<Option<Vec<u8>>> {
        match read_frame(&mut self.inner, self.max_frame_bytes).await? {
            None => Ok(None),
            Some((kind, payload)) if kind == expected => Ok(Some(payload)),
            Some((kind, _)) => Err(Error::protocol(format!(
                "expected {} frame, got {} (0x{:02X})",
                kind_name(expected),
                kind_name(kind),
                kind
            ))),
        }
    }
}

impl<F: Format> fmt::Debug for FramedReader<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FramedReader")
            .field("format", &F::CONTENT_TYPE)
            .field("max_frame_bytes", &self.max_frame_bytes)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl<F: Format> CodecReader for FramedReader<F> {
    async fn read_header(&mut self) -> Result<Option<Header>> {
        match self.expect_frame(FRAME_HEADER).await? {
            Some(payload) => Ok(Some(F::decode(&payload)?)),
            None => Ok(None),
        }
    }

    async fn read_body(&mut self) -> Result<Body> {
        match self.expect_frame(FRAME_BODY).await? {
            Some(payload) => Body::parse::<F>(payload),
            None => Err(Error::Io(std::io::Error::new(
                std::io::ErrorKind::UnexpectedEof,
                "stream closed before body frame",
            ))),
        }
    }
}

/// Write half: emits one header frame and one body frame per call.
pub struct FramedWriter<F> {
    inner: WriteHalf<BoxedStream>,
    _format: PhantomData<fn() -> F>,
}

impl<F: Format> FramedWriter<F> {
    pub fn new(inner: WriteHalf<BoxedStream>) -> Self {
        Self {
            inner,
            _format: PhantomData,
        }
    }
}

impl<F: Format> fmt::Debug for FramedWriter<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FramedWriter")
            .field("format", &F::CONTENT_TYPE)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl<F: Format> CodecWriter for FramedWriter<F> {
    async fn write(&mut self, header: &Header, body: &Value) -> Result<()> {
        let header_bytes = F::encode(header)?;
        let body_bytes = F::encode(body)?;

        // Both frames go out in one buffer so a failed encode never leaves
        // half a response on the wire.
        let mut buf = Vec::with_capacity(header_bytes.len() + body_bytes.len() + 10);
        encode_frame(&mut buf, FRAME_HEADER, &header_bytes)?;
        encode_frame(&mut buf, FRAME_BODY, &body_bytes)?;

        self.inner.write_all(&buf).await?;
        self.inner.flush().await?;
        Ok(())
    }

    async fn close(&mut self) -> Result<()> {
        self.inner.shutdown().await?;
        Ok(())
    }
}
