//! Raw byte content.

use bytes::{Bytes, BytesMut};

use super::{Chunk, SharedChunk};
use crate::error::Result;
use crate::flags::ChunkFlags;
use crate::peek::{Extent, PeekRequest};
use crate::units::Bits;
use crate::check_usage;

/// Raw bytes. Sub-chunks share the underlying storage.
#[derive(Debug, Clone, Default)]
pub struct BytesChunk {
    pub(crate) flags: ChunkFlags,
    bytes: Bytes,
}

impl BytesChunk {
    pub fn new(bytes: impl Into<Bytes>) -> Self {
        Self {
            flags: ChunkFlags::empty(),
            bytes: bytes.into(),
        }
    }

    pub fn bytes(&self) -> &Bytes {
        &self.bytes
    }

    pub fn byte(&self, index: usize) -> Option<u8> {
        self.bytes.get(index).copied()
    }

    pub fn set_bytes(&mut self, bytes: impl Into<Bytes>) -> Result<()> {
        check_usage!(!self.flags.contains(ChunkFlags::IMMUTABLE), "bytes chunk is immutable");
        self.bytes = bytes.into();
        Ok(())
    }

    pub fn chunk_length(&self) -> Bits {
        Bits::from_bytes(self.bytes.len() as u64)
    }

    /// Byte-aligned region of this chunk, carrying its quality flags.
    pub(crate) fn sub_chunk(&self, offset: Bits, length: Bits) -> BytesChunk {
        let start = offset.bytes() as usize;
        let end = start + length.bytes() as usize;
        BytesChunk {
            flags: self.flags.quality(),
            bytes: self.bytes.slice(start..end),
        }
    }

    pub(crate) fn prepend(&mut self, other: &BytesChunk) {
        let mut buffer = BytesMut::with_capacity(self.bytes.len() + other.bytes.len());
        buffer.extend_from_slice(&other.bytes);
        buffer.extend_from_slice(&self.bytes);
        self.bytes = buffer.freeze();
    }

    pub(crate) fn append(&mut self, other: &BytesChunk) {
        let mut buffer = BytesMut::with_capacity(self.bytes.len() + other.bytes.len());
        buffer.extend_from_slice(&self.bytes);
        buffer.extend_from_slice(&other.bytes);
        self.bytes = buffer.freeze();
    }

    pub(crate) fn trim_front(&mut self, length: Bits) {
        self.bytes = self.bytes.slice(length.bytes() as usize..);
    }

    pub(crate) fn trim_back(&mut self, length: Bits) {
        let keep = self.bytes.len() - length.bytes() as usize;
        self.bytes.truncate(keep);
    }

    pub(crate) fn peek_region(
        &self,
        this: &SharedChunk,
        request: &PeekRequest<'_>,
        offset: Bits,
        extent: Extent,
    ) -> Result<Option<SharedChunk>> {
        let length = extent.limit();
        if offset.is_byte_aligned() && length.is_byte_aligned() {
            let candidate = Chunk::Bytes(self.sub_chunk(offset, length)).into_shared();
            if request.accepts(&candidate) {
                return Ok(Some(candidate));
            }
        }
        request.fallback(this, offset, extent)
    }
}
