//! Length-only content.

use super::{Chunk, SharedChunk};
use crate::error::Result;
use crate::flags::ChunkFlags;
use crate::peek::{Extent, PeekRequest};
use crate::units::Bits;
use crate::check_usage;

/// A run of identical bytes described only by its length, for payloads
/// whose content does not matter to the simulation.
#[derive(Debug, Clone)]
pub struct ByteCountChunk {
    pub(crate) flags: ChunkFlags,
    length: Bits,
    data: u8,
}

impl ByteCountChunk {
    pub fn new(length: Bits, data: u8) -> Result<Self> {
        check_usage!(length.is_byte_aligned(), "byte count length {} is not whole bytes", length);
        Ok(Self {
            flags: ChunkFlags::empty(),
            length,
            data,
        })
    }

    pub fn chunk_length(&self) -> Bits {
        self.length
    }

    pub fn data(&self) -> u8 {
        self.data
    }

    pub fn set_length(&mut self, length: Bits) -> Result<()> {
        check_usage!(!self.flags.contains(ChunkFlags::IMMUTABLE), "byte count chunk is immutable");
        check_usage!(length.is_byte_aligned(), "byte count length {} is not whole bytes", length);
        self.length = length;
        Ok(())
    }

    pub fn set_data(&mut self, data: u8) -> Result<()> {
        check_usage!(!self.flags.contains(ChunkFlags::IMMUTABLE), "byte count chunk is immutable");
        self.data = data;
        Ok(())
    }

    pub(crate) fn grow(&mut self, length: Bits) {
        self.length += length;
    }

    pub(crate) fn shrink(&mut self, length: Bits) {
        self.length -= length;
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
            let candidate = Chunk::ByteCount(ByteCountChunk {
                flags: self.flags.quality(),
                length,
                data: self.data,
            })
            .into_shared();
            if request.accepts(&candidate) {
                return Ok(Some(candidate));
            }
        }
        request.fallback(this, offset, extent)
    }
}
