//! Ordered concatenations of chunks.
//!
//! A sequence is what a packet's content becomes once headers are pushed in
//! front of a payload that cannot grow by itself. Inserted chunks are merged
//! into their neighbour when the two representations allow it, inserted
//! sequences are spliced in element by element, and removals drop whole
//! elements before splitting the one element straddling the cut.

use std::collections::VecDeque;

use super::{Chunk, SharedChunk, SliceChunk};
use crate::config;
use crate::error::Result;
use crate::flags::ChunkFlags;
use crate::peek::{self, Extent, PeekRequest};
use crate::units::Bits;
use crate::{check_implementation, check_usage};

/// Iterator index translated to a forward element index. `at_end` anchors
/// the element at the end of the peeked region instead of its start.
#[derive(Debug, Clone, Copy)]
pub(crate) struct ElementHint {
    pub index: usize,
    pub at_end: bool,
}

#[derive(Debug, Clone)]
pub struct SequenceChunk {
    pub(crate) flags: ChunkFlags,
    chunks: VecDeque<SharedChunk>,
    length: Bits,
    depth: usize,
}

impl Default for SequenceChunk {
    fn default() -> Self {
        Self {
            flags: ChunkFlags::empty(),
            chunks: VecDeque::new(),
            length: Bits::ZERO,
            depth: 1,
        }
    }
}

impl SequenceChunk {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a sequence by inserting each chunk at the back in turn, so
    /// adjacent chunks merge and nested sequences are flattened.
    pub fn from_chunks(chunks: impl IntoIterator<Item = SharedChunk>) -> Result<Self> {
        let mut sequence = Self::new();
        for chunk in chunks {
            sequence.insert_at_back(chunk)?;
        }
        Ok(sequence)
    }

    /// Rebuilds a sequence element for element, without merging or
    /// dropping anything.
    pub(crate) fn from_parts(chunks: VecDeque<SharedChunk>, flags: ChunkFlags) -> Result<Self> {
        let mut sequence = Self {
            flags,
            length: chunks.iter().map(|c| c.chunk_length()).sum(),
            chunks,
            depth: 1,
        };
        sequence.recompute_depth();
        let limit = config::max_nesting_depth();
        check_implementation!(
            sequence.depth <= limit,
            "chunk nesting depth {} exceeds the limit of {}",
            sequence.depth,
            limit
        );
        Ok(sequence)
    }

    pub fn chunks(&self) -> &VecDeque<SharedChunk> {
        &self.chunks
    }

    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    pub fn chunk_length(&self) -> Bits {
        self.length
    }

    pub(crate) fn depth(&self) -> usize {
        self.depth
    }

    /// Start offset of each element, in order.
    pub fn element_offsets(&self) -> impl Iterator<Item = (Bits, &SharedChunk)> {
        self.chunks.iter().scan(Bits::ZERO, |position, chunk| {
            let start = *position;
            *position += chunk.chunk_length();
            Some((start, chunk))
        })
    }

    // ── Growth ────────────────────────────────────────────────────────────────

    pub(crate) fn insert_at_front(&mut self, chunk: SharedChunk) -> Result<()> {
        if let Chunk::Sequence(inner) = &*chunk {
            for element in inner.chunks.iter().rev() {
                self.insert_at_front(element.clone())?;
            }
            return Ok(());
        }
        if is_droppable(&chunk) {
            return Ok(());
        }
        let merged = match self.chunks.front() {
            Some(front) => merge(&chunk, front)?,
            None => None,
        };
        self.admit(merged.as_ref().unwrap_or(&chunk))?;
        self.length += chunk.chunk_length();
        match merged {
            Some(merged) => {
                self.chunks.pop_front();
                self.chunks.push_front(merged);
            }
            None => self.chunks.push_front(chunk),
        }
        Ok(())
    }

    pub(crate) fn insert_at_back(&mut self, chunk: SharedChunk) -> Result<()> {
        if let Chunk::Sequence(inner) = &*chunk {
            for element in inner.chunks.iter() {
                self.insert_at_back(element.clone())?;
            }
            return Ok(());
        }
        if is_droppable(&chunk) {
            return Ok(());
        }
        let merged = match self.chunks.back() {
            Some(back) => merge(back, &chunk)?,
            None => None,
        };
        self.admit(merged.as_ref().unwrap_or(&chunk))?;
        self.length += chunk.chunk_length();
        match merged {
            Some(merged) => {
                self.chunks.pop_back();
                self.chunks.push_back(merged);
            }
            None => self.chunks.push_back(chunk),
        }
        Ok(())
    }

    fn admit(&mut self, chunk: &SharedChunk) -> Result<()> {
        let depth = self.depth.max(chunk.nesting_depth() + 1);
        let limit = config::max_nesting_depth();
        check_implementation!(depth <= limit, "chunk nesting depth {} exceeds the limit of {}", depth, limit);
        self.depth = depth;
        Ok(())
    }

    // ── Shrinking ─────────────────────────────────────────────────────────────

    pub(crate) fn remove_at_front(&mut self, length: Bits) -> Result<()> {
        check_usage!(length <= self.length, "cannot remove {} from a sequence of {}", length, self.length);
        let (whole, split) = Self::removal_plan(length, self.chunks.iter())?;
        let rest = match split {
            Some((front, cut)) if front.can_remove_at_front(cut) => {
                let mut copy = front.dup();
                copy.remove_at_front(cut)?;
                Some(copy.into_shared())
            }
            Some((front, cut)) => Some(peek::peek_natural(front, cut, front.chunk_length() - cut)?),
            None => None,
        };
        self.chunks.drain(..whole);
        if let Some(rest) = rest {
            self.chunks[0] = rest;
        }
        self.length -= length;
        self.recompute_depth();
        Ok(())
    }

    pub(crate) fn remove_at_back(&mut self, length: Bits) -> Result<()> {
        check_usage!(length <= self.length, "cannot remove {} from a sequence of {}", length, self.length);
        let (whole, split) = Self::removal_plan(length, self.chunks.iter().rev())?;
        let rest = match split {
            Some((back, cut)) if back.can_remove_at_back(cut) => {
                let mut copy = back.dup();
                copy.remove_at_back(cut)?;
                Some(copy.into_shared())
            }
            Some((back, cut)) => Some(peek::peek_natural(back, Bits::ZERO, back.chunk_length() - cut)?),
            None => None,
        };
        self.chunks.truncate(self.chunks.len() - whole);
        if let Some(rest) = rest {
            let last = self.chunks.len() - 1;
            self.chunks[last] = rest;
        }
        self.length -= length;
        self.recompute_depth();
        Ok(())
    }

    /// How many whole elements removing `length` from one end drops, and the
    /// element after them that has to be cut by the remainder, if any.
    fn removal_plan<'a>(
        length: Bits,
        elements: impl Iterator<Item = &'a SharedChunk>,
    ) -> Result<(usize, Option<(&'a SharedChunk, Bits)>)> {
        let mut remaining = length;
        let mut whole = 0;
        for element in elements {
            if remaining.is_zero() {
                break;
            }
            let element_length = element.chunk_length();
            if element_length > remaining {
                return Ok((whole, Some((element, remaining))));
            }
            remaining -= element_length;
            whole += 1;
        }
        check_implementation!(
            remaining.is_zero(),
            "sequence ran out of elements with {} left to remove",
            remaining
        );
        Ok((whole, None))
    }

    fn recompute_depth(&mut self) {
        self.depth = self.chunks.iter().map(|c| c.nesting_depth()).max().unwrap_or(0) + 1;
    }

    // ── Peeking ───────────────────────────────────────────────────────────────

    pub(crate) fn peek_region(
        &self,
        this: &SharedChunk,
        request: &PeekRequest<'_>,
        offset: Bits,
        extent: Extent,
        hint: Option<ElementHint>,
    ) -> Result<Option<SharedChunk>> {
        let end = offset + extent.limit();

        if let Some(hint) = hint {
            if let Some((start, element)) = self.element_offsets().nth(hint.index) {
                let element_length = element.chunk_length();
                let anchored = if hint.at_end { start + element_length == end } else { start == offset };
                check_usage!(anchored, "iterator index {} does not match its position", hint.index);
                if start == offset
                    && !element_length.is_zero()
                    && extent.admits(element_length)
                    && request.accepts(element)
                {
                    return Ok(Some(element.clone()));
                }
            }
        }

        for (start, element) in self.element_offsets() {
            if start > offset {
                break;
            }
            let element_length = element.chunk_length();
            let element_end = start + element_length;
            if start == offset
                && !element_length.is_zero()
                && extent.admits(element_length)
                && request.accepts(element)
            {
                return Ok(Some(element.clone()));
            }
            if offset >= element_end {
                continue;
            }
            let inner_offset = offset - start;
            match extent {
                Extent::Exact(length) if end <= element_end => {
                    return element.peek_extent(request, inner_offset, Extent::Exact(length), None);
                }
                Extent::UpTo(limit) => {
                    let clipped = limit.min(element_end - offset);
                    if let Some(result) = element.peek_extent(request, inner_offset, Extent::UpTo(clipped), None)? {
                        if end <= element_end || result.is_complete() {
                            return Ok(Some(result));
                        }
                    }
                }
                Extent::Exact(_) => {}
            }
            break;
        }

        request.fallback(this, offset, extent)
    }
}

/// Zero-length chunks carry no content; they are kept only when they still
/// report a quality problem.
fn is_droppable(chunk: &SharedChunk) -> bool {
    chunk.chunk_length().is_zero() && chunk.flags().quality().is_empty()
}

/// Merges two adjacent elements into one, if their representations allow it.
fn merge(first: &SharedChunk, second: &SharedChunk) -> Result<Option<SharedChunk>> {
    if let (Chunk::Slice(a), Chunk::Slice(b)) = (&**first, &**second) {
        let contiguous = a.chunk().ptr_eq(b.chunk()) && a.offset() + a.length() == b.offset();
        if contiguous && a.flags.quality() == b.flags.quality() {
            let mut slice = SliceChunk::new(a.chunk().clone(), a.offset(), a.length() + b.length())?;
            slice.flags = a.flags.quality();
            tracing::debug!(
                offset = %slice.offset(),
                length = %slice.length(),
                "merged contiguous slices"
            );
            return Ok(Some(Chunk::Slice(slice).into_shared().simplify()));
        }
        return Ok(None);
    }
    if first.can_insert_at_back(second) {
        let mut merged = first.dup();
        merged.insert_at_back(second.clone())?;
        return Ok(Some(merged.into_shared()));
    }
    Ok(None)
}
