//! Content-type → codec constructor registry.
//!
//! Built once at startup and shared read-only (behind an `Arc`) with the
//! acceptor and every connection.

use std::collections::HashMap;

use super::{new_framed_codec, BoxedStream, Codec, Json, MsgPack};
use crate::types::ContentType;

/// Constructor wrapping a raw stream into a codec. The second argument is the
/// maximum accepted frame size in bytes.
pub type NewCodecFn = fn(BoxedStream, u32) -> Codec;

#[derive(Debug, Clone)]
pub struct CodecRegistry {
    constructors: HashMap<ContentType, NewCodecFn>,
}

impl CodecRegistry {
    /// Empty registry. Most callers want [`CodecRegistry::default`].
    pub fn new() -> Self {
        Self {
            constructors: HashMap::new(),
        }
    }

    /// Register (or replace) the constructor for `content_type`.
    pub fn register(&mut self, content_type: ContentType, constructor: NewCodecFn) -> &mut Self {
        if self.constructors.insert(content_type.clone(), constructor).is_some() {
            tracing::debug!("Replaced codec registration for {}", content_type);
        }
        self
    }

    pub fn get(&self, content_type: &str) -> Option<NewCodecFn> {
        self.constructors.get(content_type).copied()
    }

    pub fn contains(&self, content_type: &str) -> bool {
        self.get(content_type).is_some()
    }

    /// Build a codec for `content_type` over `stream`, if one is registered.
    pub fn build(
        &self,
        content_type: &str,
        stream: BoxedStream,
        max_frame_bytes: u32,
    ) -> Option<Codec> {
        self.get(content_type)
            .map(|constructor| constructor(stream, max_frame_bytes))
    }

    /// Registered identifiers, sorted.
    pub fn content_types(&self) -> Vec<&ContentType> {
        let mut types: Vec<_> = self.constructors.keys().collect();
        types.sort_by(|a, b| a.as_str().cmp(b.as_str()));
        types
    }

    pub fn len(&self) -> usize {
        self.constructors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.constructors.is_empty()
    }
}

impl Default for CodecRegistry {
    /// MessagePack and JSON.
    fn default() -> Self {
        let mut registry = Self::new();
        registry
            .register(ContentType::msgpack(), new_framed_codec::<MsgPack>)
            .register(ContentType::json(), new_framed_codec::<Json>);
        registry
    }
}
