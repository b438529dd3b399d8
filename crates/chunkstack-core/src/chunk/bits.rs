//! Raw bit content, for data that does not end on a byte boundary.

use super::{Chunk, SharedChunk};
use crate::error::Result;
use crate::flags::ChunkFlags;
use crate::peek::{Extent, PeekRequest};
use crate::stream::SerializedBytes;
use crate::units::Bits;
use crate::check_usage;

#[derive(Debug, Clone, Default)]
pub struct BitsChunk {
    pub(crate) flags: ChunkFlags,
    bits: Vec<bool>,
}

impl BitsChunk {
    pub fn new(bits: Vec<bool>) -> Self {
        Self {
            flags: ChunkFlags::empty(),
            bits,
        }
    }

    /// Every bit of a serialized buffer, most significant first.
    pub fn from_serialized(serialized: &SerializedBytes) -> Self {
        let count = serialized.length().get();
        Self::new((0..count).map(|i| serialized.bit(Bits::new(i))).collect())
    }

    pub fn bits(&self) -> &[bool] {
        &self.bits
    }

    pub fn bit(&self, index: usize) -> Option<bool> {
        self.bits.get(index).copied()
    }

    pub fn set_bits(&mut self, bits: Vec<bool>) -> Result<()> {
        check_usage!(!self.flags.contains(ChunkFlags::IMMUTABLE), "bits chunk is immutable");
        self.bits = bits;
        Ok(())
    }

    pub fn chunk_length(&self) -> Bits {
        Bits::new(self.bits.len() as u64)
    }

    pub(crate) fn sub_chunk(&self, offset: Bits, length: Bits) -> BitsChunk {
        let start = offset.as_usize();
        BitsChunk {
            flags: self.flags.quality(),
            bits: self.bits[start..start + length.as_usize()].to_vec(),
        }
    }

    pub(crate) fn prepend(&mut self, other: &BitsChunk) {
        self.bits.splice(0..0, other.bits.iter().copied());
    }

    pub(crate) fn append(&mut self, other: &BitsChunk) {
        self.bits.extend_from_slice(&other.bits);
    }

    pub(crate) fn trim_front(&mut self, length: Bits) {
        self.bits.drain(..length.as_usize());
    }

    pub(crate) fn trim_back(&mut self, length: Bits) {
        let keep = self.bits.len() - length.as_usize();
        self.bits.truncate(keep);
    }

    pub(crate) fn peek_region(
        &self,
        this: &SharedChunk,
        request: &PeekRequest<'_>,
        offset: Bits,
        extent: Extent,
    ) -> Result<Option<SharedChunk>> {
        let candidate = Chunk::Bits(self.sub_chunk(offset, extent.limit())).into_shared();
        if request.accepts(&candidate) {
            return Ok(Some(candidate));
        }
        request.fallback(this, offset, extent)
    }
}
