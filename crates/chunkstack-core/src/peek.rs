//! The peek/convert protocol.
//!
//! Every query for a region of a chunk goes through one primitive,
//! `SharedChunk::peek_unchecked`. It takes a predicate deciding which chunk
//! is an acceptable answer and an optional converter that can manufacture an
//! acceptable chunk when the chunk tree's natural decomposition does not
//! contain one. Resolution, at every level of the tree:
//!
//!   1. an empty region has no representation;
//!   2. the whole chunk, if acceptable, is returned as is;
//!   3. a natural sub-representation is tried (a byte range of raw bytes, an
//!      element of a sequence, the target region of a slice);
//!   4. otherwise the region is wrapped in a slice when there is no
//!      converter, or handed to the converter.
//!
//! The checked peeks (`peek`, `peek_as`, `peek_bytes`, `peek_bits`,
//! `peek_fields`) add the caller's tolerance for empty, incomplete,
//! incorrect and improperly represented results on top.

use std::marker::PhantomData;

use crate::chunk::{BitsChunk, BytesChunk, Chunk, Fields, FieldsChunk, SharedChunk, SliceChunk};
use crate::chunk::ElementHint;
use crate::config;
use crate::error::{ChunkError, Result};
use crate::flags::{ChunkFlags, ChunkType, PeekFlags};
use crate::iterator::ChunkIterator;
use crate::serializer;
use crate::stream::{InputStream, OutputStream, SerializedBytes};
use crate::units::Bits;
use crate::{check_implementation, check_usage};

// ── Extent ────────────────────────────────────────────────────────────────────

/// How long the answer to a peek may be.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Extent {
    /// Exactly this many bits.
    Exact(Bits),
    /// Whatever length the representation naturally has, at most this many
    /// bits. Self-delimiting fields use this to decide their own length.
    UpTo(Bits),
}

impl Extent {
    pub fn limit(self) -> Bits {
        match self {
            Extent::Exact(length) | Extent::UpTo(length) => length,
        }
    }

    pub fn admits(self, length: Bits) -> bool {
        match self {
            Extent::Exact(exact) => length == exact,
            Extent::UpTo(limit) => length <= limit,
        }
    }
}

// ── Predicate & Converter ─────────────────────────────────────────────────────

/// Decides whether a candidate chunk answers the peek.
pub type PeekPredicate = dyn Fn(&SharedChunk) -> bool;

/// Manufactures an answer for `[offset, offset + extent)` of a chunk.
pub type PeekConverter = dyn Fn(&SharedChunk, Bits, Extent, PeekFlags) -> Result<SharedChunk>;

pub(crate) struct PeekRequest<'a> {
    predicate: &'a PeekPredicate,
    converter: Option<&'a PeekConverter>,
    flags: PeekFlags,
}

impl<'a> PeekRequest<'a> {
    pub(crate) fn accepts(&self, chunk: &SharedChunk) -> bool {
        (self.predicate)(chunk)
    }

    pub(crate) fn has_converter(&self) -> bool {
        self.converter.is_some()
    }

    /// Last resort for a region without an acceptable natural representation.
    pub(crate) fn fallback(
        &self,
        chunk: &SharedChunk,
        offset: Bits,
        extent: Extent,
    ) -> Result<Option<SharedChunk>> {
        match self.converter {
            None => SliceChunk::convert_chunk(None, chunk, offset, extent.limit()).map(Some),
            Some(convert) => convert(chunk, offset, extent, self.flags).map(Some),
        }
    }
}

// ── Resolution ────────────────────────────────────────────────────────────────

impl SharedChunk {
    /// Resolves a region of this chunk without checking the result against
    /// any tolerance. `None` length means the rest of the chunk in the
    /// iterator's direction; forward, the representation may then choose a
    /// shorter natural length.
    pub fn peek_unchecked(
        &self,
        predicate: &PeekPredicate,
        converter: Option<&PeekConverter>,
        iterator: &ChunkIterator,
        length: Option<Bits>,
        flags: PeekFlags,
    ) -> Result<Option<SharedChunk>> {
        let chunk_length = self.chunk_length();
        let available = chunk_length.checked_sub(iterator.position()).ok_or_else(|| {
            ChunkError::Usage(format!(
                "iterator position {} is beyond the end of a {} chunk",
                iterator.position(),
                chunk_length
            ))
        })?;
        if let Some(length) = length {
            check_usage!(
                length <= available,
                "cannot peek {} with only {} available after position {}",
                length,
                available,
                iterator.position()
            );
        }

        let (offset, extent) = if iterator.is_forward() {
            (iterator.position(), length.map_or(Extent::UpTo(available), Extent::Exact))
        } else {
            let length = length.unwrap_or(available);
            (available - length, Extent::Exact(length))
        };
        let hint = match (self.as_sequence(), iterator.index()) {
            (Some(_), Some(index)) if iterator.is_forward() => Some(ElementHint { index, at_end: false }),
            (Some(sequence), Some(index)) => sequence
                .len()
                .checked_sub(index + 1)
                .map(|index| ElementHint { index, at_end: true }),
            _ => None,
        };

        let request = PeekRequest {
            predicate,
            converter,
            flags,
        };
        self.peek_extent(&request, offset, extent, hint)
    }

    pub(crate) fn peek_extent(
        &self,
        request: &PeekRequest<'_>,
        offset: Bits,
        extent: Extent,
        hint: Option<ElementHint>,
    ) -> Result<Option<SharedChunk>> {
        let chunk_length = self.chunk_length();
        check_implementation!(
            offset + extent.limit() <= chunk_length,
            "peek region {}+{} exceeds a {} chunk of {}",
            offset,
            extent.limit(),
            self.chunk_type(),
            chunk_length
        );
        if extent.limit().is_zero() {
            return Ok(None);
        }
        if offset.is_zero() && extent.admits(chunk_length) && request.accepts(self) {
            return Ok(Some(self.clone()));
        }
        let found = match &**self {
            Chunk::Bytes(c) => c.peek_region(self, request, offset, extent),
            Chunk::Bits(c) => c.peek_region(self, request, offset, extent),
            Chunk::ByteCount(c) => c.peek_region(self, request, offset, extent),
            Chunk::Slice(c) => c.peek_region(self, request, offset, extent),
            Chunk::Sequence(c) => c.peek_region(self, request, offset, extent, hint),
            Chunk::Empty(_) | Chunk::Fields(_) => request.fallback(self, offset, extent),
        }?;
        // A composite's own quality marks apply to every part handed out.
        let inherited = match &**self {
            Chunk::Slice(_) | Chunk::Sequence(_) => self.stored_flags().quality(),
            _ => ChunkFlags::empty(),
        };
        Ok(found.map(|chunk| chunk.with_quality(inherited)))
    }
}

/// The natural representation of a region: a sub-chunk where the chunk
/// offers one, a slice otherwise. Never runs a converter.
pub(crate) fn peek_natural(chunk: &SharedChunk, offset: Bits, length: Bits) -> Result<SharedChunk> {
    let request = PeekRequest {
        predicate: &|_: &SharedChunk| true,
        converter: None,
        flags: PeekFlags::empty(),
    };
    Ok(chunk
        .peek_extent(&request, offset, Extent::Exact(length), None)?
        .unwrap_or_else(|| Chunk::empty().into_shared()))
}

// ── Checked peeks ─────────────────────────────────────────────────────────────

/// Rejects results the peek flags do not tolerate. An absent result becomes
/// an empty chunk when empty results are allowed.
pub fn check_peek_result(result: Option<SharedChunk>, flags: PeekFlags) -> Result<SharedChunk> {
    let Some(chunk) = result else {
        check_usage!(
            flags.contains(PeekFlags::ALLOW_EMPTY),
            "peek found no data and empty results are not allowed"
        );
        return Ok(Chunk::empty().into_shared());
    };
    check_usage!(
        chunk.is_complete() || flags.contains(PeekFlags::ALLOW_INCOMPLETE),
        "peek returned an incomplete {} chunk",
        chunk.chunk_type()
    );
    check_usage!(
        chunk.is_correct() || flags.contains(PeekFlags::ALLOW_INCORRECT),
        "peek returned an incorrect {} chunk",
        chunk.chunk_type()
    );
    check_usage!(
        chunk.is_properly_represented() || flags.contains(PeekFlags::ALLOW_IMPROPERLY_REPRESENTED),
        "peek returned an improperly represented {} chunk",
        chunk.chunk_type()
    );
    Ok(chunk)
}

impl SharedChunk {
    /// The region in whatever representation it naturally has.
    pub fn peek(&self, iterator: &ChunkIterator, length: Option<Bits>, flags: PeekFlags) -> Result<SharedChunk> {
        let result = self.peek_unchecked(&|_: &SharedChunk| true, None, iterator, length, flags)?;
        check_peek_result(result, flags)
    }

    /// The region as a chunk of kind `K`, converting if necessary. Without a
    /// length, self-delimiting kinds decide their own length and all other
    /// kinds take the rest of the chunk.
    pub fn peek_as<K: ChunkKind>(
        &self,
        iterator: &ChunkIterator,
        length: Option<Bits>,
        flags: PeekFlags,
    ) -> Result<SharedChunk> {
        let length = match length {
            None if !K::SELF_DELIMITING => Some(self.chunk_length().saturating_sub(iterator.position())),
            length => length,
        };
        let result = self.peek_unchecked(&K::accepts, Some(&K::convert), iterator, length, flags)?;
        check_peek_result(result, flags)
    }

    pub fn peek_bytes(&self, iterator: &ChunkIterator, length: Option<Bits>, flags: PeekFlags) -> Result<SharedChunk> {
        self.peek_as::<BytesChunk>(iterator, length, flags)
    }

    pub fn peek_bits(&self, iterator: &ChunkIterator, length: Option<Bits>, flags: PeekFlags) -> Result<SharedChunk> {
        self.peek_as::<BitsChunk>(iterator, length, flags)
    }

    pub fn peek_fields<T: Fields>(
        &self,
        iterator: &ChunkIterator,
        length: Option<Bits>,
        flags: PeekFlags,
    ) -> Result<SharedChunk> {
        self.peek_as::<FieldsOf<T>>(iterator, length, flags)
    }

    /// Whether a region can be peeked as `K` under `flags` without error.
    pub fn has<K: ChunkKind>(&self, iterator: &ChunkIterator, length: Option<Bits>, flags: PeekFlags) -> bool {
        self.peek_as::<K>(iterator, length, flags).is_ok()
    }
}

// ── Chunk kinds ───────────────────────────────────────────────────────────────

/// A representation a peek can ask for: how to recognize it and how to
/// produce it from any other representation.
pub trait ChunkKind: 'static {
    /// Decides its own length when peeked without one.
    const SELF_DELIMITING: bool = false;

    fn accepts(chunk: &SharedChunk) -> bool;

    fn convert(chunk: &SharedChunk, offset: Bits, extent: Extent, flags: PeekFlags) -> Result<SharedChunk>;
}

/// Any representation. Regions without a natural sub-chunk become slices.
pub struct AnyChunk;

impl ChunkKind for AnyChunk {
    fn accepts(_: &SharedChunk) -> bool {
        true
    }

    fn convert(chunk: &SharedChunk, offset: Bits, extent: Extent, _: PeekFlags) -> Result<SharedChunk> {
        SliceChunk::convert_chunk(None, chunk, offset, extent.limit())
    }
}

impl ChunkKind for SliceChunk {
    fn accepts(chunk: &SharedChunk) -> bool {
        chunk.chunk_type() == ChunkType::Slice
    }

    fn convert(chunk: &SharedChunk, offset: Bits, extent: Extent, _: PeekFlags) -> Result<SharedChunk> {
        SliceChunk::convert_chunk(Some(ChunkType::Slice), chunk, offset, extent.limit())
    }
}

impl ChunkKind for BytesChunk {
    fn accepts(chunk: &SharedChunk) -> bool {
        chunk.chunk_type() == ChunkType::Bytes
    }

    fn convert(chunk: &SharedChunk, offset: Bits, extent: Extent, flags: PeekFlags) -> Result<SharedChunk> {
        let length = extent.limit();
        check_usage!(length.is_byte_aligned(), "a region of {} cannot be represented as bytes", length);
        let serialized = serialize_region(chunk, offset, length, flags)?;
        let mut bytes = BytesChunk::new(serialized.data().clone());
        bytes.flags = chunk.flags().quality();
        tracing::trace!(source = %chunk.chunk_type(), %offset, %length, "converted region to bytes");
        Ok(Chunk::Bytes(bytes).into_shared())
    }
}

impl ChunkKind for BitsChunk {
    fn accepts(chunk: &SharedChunk) -> bool {
        chunk.chunk_type() == ChunkType::Bits
    }

    fn convert(chunk: &SharedChunk, offset: Bits, extent: Extent, flags: PeekFlags) -> Result<SharedChunk> {
        let length = extent.limit();
        let serialized = serialize_region(chunk, offset, length, flags)?;
        let mut bits = BitsChunk::from_serialized(&serialized);
        bits.flags = chunk.flags().quality();
        tracing::trace!(source = %chunk.chunk_type(), %offset, %length, "converted region to bits");
        Ok(Chunk::Bits(bits).into_shared())
    }
}

/// Fields of one protocol type `T`.
pub struct FieldsOf<T>(PhantomData<T>);

impl<T: Fields> ChunkKind for FieldsOf<T> {
    const SELF_DELIMITING: bool = true;

    fn accepts(chunk: &SharedChunk) -> bool {
        chunk.as_fields_chunk().is_some_and(FieldsChunk::is::<T>)
    }

    fn convert(chunk: &SharedChunk, offset: Bits, extent: Extent, flags: PeekFlags) -> Result<SharedChunk> {
        let serialized = serialize_region(chunk, offset, extent.limit(), flags)?;
        Ok(Chunk::Fields(deserialize_fields::<T>(serialized, chunk.flags(), extent)?).into_shared())
    }
}

/// Decodes `T` from the start of `serialized`.
///
/// Decoding never fails: running out of data yields fields marked
/// incomplete and improperly represented whose length is what was actually
/// available. Fields that do not fill an exactly sized region are marked
/// improperly represented and keep the whole region as their wire form.
pub(crate) fn deserialize_fields<T: Fields>(
    serialized: SerializedBytes,
    source_flags: ChunkFlags,
    extent: Extent,
) -> Result<FieldsChunk> {
    let mut stream = InputStream::new(serialized.clone());
    let fields = T::deserialize(&mut stream);
    let mut flags = source_flags.quality() | stream.decode_flags();

    let wire = if stream.is_read_beyond_end() {
        flags |= ChunkFlags::INCOMPLETE | ChunkFlags::IMPROPERLY_REPRESENTED;
        tracing::debug!(fields = T::TYPE_NAME, available = %stream.length(), "fields truncated by end of data");
        stream.consumed()
    } else if matches!(extent, Extent::Exact(_)) {
        if stream.position() != serialized.length() {
            flags |= ChunkFlags::IMPROPERLY_REPRESENTED;
            tracing::debug!(
                fields = T::TYPE_NAME,
                decoded = %stream.position(),
                region = %serialized.length(),
                "fields do not fill the requested region"
            );
        }
        serialized
    } else {
        stream.consumed()
    };

    let mut chunk = FieldsChunk::new(fields);
    chunk.set_chunk_length(wire.length())?;
    chunk.set_serialized_bytes(wire)?;
    chunk.flags = flags;
    Ok(chunk)
}

// ── Serialization guard ───────────────────────────────────────────────────────

/// Converting non-raw content means running field encoders; that needs
/// either implicit serialization or an explicit allowance.
pub(crate) fn ensure_serializable(source: ChunkType, implicit: bool, flags: PeekFlags) -> Result<()> {
    check_usage!(
        implicit || source.is_raw() || flags.contains(PeekFlags::ALLOW_SERIALIZATION),
        "implicit serialization of a {} chunk is disabled",
        source
    );
    Ok(())
}

fn serialize_region(chunk: &SharedChunk, offset: Bits, length: Bits, flags: PeekFlags) -> Result<SerializedBytes> {
    let implicit = config::implicit_serialization();
    ensure_serializable(chunk.chunk_type(), implicit, flags)?;
    if !chunk.chunk_type().is_raw() {
        tracing::debug!(source = %chunk.chunk_type(), %offset, %length, "serializing region for conversion");
    }
    let mut stream = OutputStream::with_capacity(length);
    serializer::serialize(chunk, &mut stream, offset, length)?;
    Ok(stream.into_serialized())
}
