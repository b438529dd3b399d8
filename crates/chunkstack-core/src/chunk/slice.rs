//! Views over a bit range of another chunk.

use super::{Chunk, SharedChunk};
use crate::config;
use crate::error::Result;
use crate::flags::{ChunkFlags, ChunkType};
use crate::peek::{Extent, PeekRequest};
use crate::units::Bits;
use crate::{check_implementation, check_usage};

/// A view over `[offset, offset + length)` of a shared chunk.
///
/// The target is always immutable since only shared chunks can be
/// referenced, and the range always lies within it.
#[derive(Debug, Clone)]
pub struct SliceChunk {
    pub(crate) flags: ChunkFlags,
    chunk: SharedChunk,
    offset: Bits,
    length: Bits,
    depth: usize,
}

fn check_range(chunk: &SharedChunk, offset: Bits, length: Bits) -> Result<()> {
    let available = chunk.chunk_length();
    check_usage!(
        offset <= available && length <= available - offset,
        "slice {}+{} is out of range for a {} chunk of {}",
        offset,
        length,
        chunk.chunk_type(),
        available
    );
    Ok(())
}

fn check_depth(depth: usize) -> Result<()> {
    let limit = config::max_nesting_depth();
    check_implementation!(depth <= limit, "chunk nesting depth {} exceeds the limit of {}", depth, limit);
    Ok(())
}

impl SliceChunk {
    pub fn new(chunk: SharedChunk, offset: Bits, length: Bits) -> Result<Self> {
        check_range(&chunk, offset, length)?;
        let depth = chunk.nesting_depth() + 1;
        check_depth(depth)?;
        Ok(Self {
            flags: ChunkFlags::empty(),
            chunk,
            offset,
            length,
            depth,
        })
    }

    pub fn chunk(&self) -> &SharedChunk {
        &self.chunk
    }

    pub fn offset(&self) -> Bits {
        self.offset
    }

    pub fn length(&self) -> Bits {
        self.length
    }

    pub(crate) fn depth(&self) -> usize {
        self.depth
    }

    fn check_mutable(&self) -> Result<()> {
        check_usage!(!self.flags.contains(ChunkFlags::IMMUTABLE), "slice chunk is immutable");
        Ok(())
    }

    /// Points the slice at another target, keeping its range.
    pub fn set_chunk(&mut self, chunk: SharedChunk) -> Result<()> {
        self.check_mutable()?;
        check_range(&chunk, self.offset, self.length)?;
        let depth = chunk.nesting_depth() + 1;
        check_depth(depth)?;
        self.chunk = chunk;
        self.depth = depth;
        Ok(())
    }

    pub fn set_offset(&mut self, offset: Bits) -> Result<()> {
        self.check_mutable()?;
        check_range(&self.chunk, offset, self.length)?;
        self.offset = offset;
        Ok(())
    }

    pub fn set_length(&mut self, length: Bits) -> Result<()> {
        self.check_mutable()?;
        check_range(&self.chunk, self.offset, length)?;
        self.length = length;
        Ok(())
    }

    /// Represents `[offset, offset + length)` of `chunk` as a slice.
    ///
    /// When the range covers all of `chunk` and `chunk` already has the
    /// requested type (any type if `requested` is `None`), `chunk` itself is
    /// returned. Slices of slices are re-expressed over the innermost target
    /// so nesting does not grow.
    pub fn convert_chunk(
        requested: Option<ChunkType>,
        chunk: &SharedChunk,
        offset: Bits,
        length: Bits,
    ) -> Result<SharedChunk> {
        check_range(chunk, offset, length)?;
        let whole = offset.is_zero() && length == chunk.chunk_length();
        if whole && requested.map_or(true, |t| t == chunk.chunk_type()) {
            return Ok(chunk.clone());
        }
        let slice = match &**chunk {
            Chunk::Slice(inner) => {
                let mut slice = SliceChunk::new(inner.chunk.clone(), inner.offset + offset, length)?;
                slice.flags = inner.flags.quality();
                slice
            }
            _ => SliceChunk::new(chunk.clone(), offset, length)?,
        };
        tracing::trace!(
            target_type = %slice.chunk.chunk_type(),
            offset = %slice.offset,
            length = %slice.length,
            "converted region to slice"
        );
        Ok(Chunk::Slice(slice).into_shared())
    }

    pub(crate) fn peek_region(
        &self,
        this: &SharedChunk,
        request: &PeekRequest<'_>,
        offset: Bits,
        extent: Extent,
    ) -> Result<Option<SharedChunk>> {
        if !request.has_converter() {
            return request.fallback(this, offset, extent);
        }
        self.chunk.peek_extent(request, self.offset + offset, extent, None)
    }
}
