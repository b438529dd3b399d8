//! chunkstack-core: the chunk algebra packet content is built from.
//!
//! Packet content is a tree of chunks: raw bytes and bits, length-only byte
//! counts, typed protocol fields, slices of other chunks and sequences of
//! chunks. Protocol layers build chunks, freeze them with `into_shared`,
//! and query regions of them through the peek protocol, which converts
//! between representations on demand and caches serialized fields.

pub mod chunk;
pub mod config;
pub mod edit;
pub mod error;
pub mod flags;
pub mod iterator;
pub mod pack;
pub mod peek;
pub mod serializer;
pub mod stream;
pub mod units;

#[cfg(test)]
pub(crate) mod testing;

pub use chunk::{
    BitsChunk, ByteCountChunk, BytesChunk, Chunk, EmptyChunk, Fields, FieldsChunk, SequenceChunk, SharedChunk,
    SliceChunk,
};
pub use config::{ChunkConfig, ConfigError};
pub use error::{ChunkError, Result};
pub use flags::{ChunkFlags, ChunkType, PeekFlags};
pub use iterator::ChunkIterator;
pub use pack::{FieldsRegistry, PackError, PackedChunk};
pub use peek::{AnyChunk, ChunkKind, Extent, FieldsOf, PeekConverter, PeekPredicate};
pub use stream::{InputStream, OutputStream, SerializedBytes};
pub use units::Bits;
