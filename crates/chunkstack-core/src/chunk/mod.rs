//! Chunks, the composable unit of packet content.
//!
//! A chunk is one of a closed set of representations: raw bytes, raw bits,
//! a byte count, typed fields, a slice of another chunk, or a sequence of
//! chunks. Slices and sequences compose recursively.
//!
//! Ownership follows the packet's life cycle. A chunk under construction is
//! a plain owned `Chunk` value with exactly one owner. `into_shared` freezes
//! it: the chunk is marked immutable and moved behind a reference-counted
//! `SharedChunk` handle that any number of packets may hold. Slices and
//! sequences only ever reference shared chunks, so every sub-tree is
//! immutable and the structure cannot contain cycles.

mod bits;
mod byte_count;
mod bytes;
mod empty;
mod fields;
mod sequence;
mod slice;

use std::ops::Deref;
use std::sync::Arc;

pub use self::bits::BitsChunk;
pub use self::byte_count::ByteCountChunk;
pub use self::bytes::BytesChunk;
pub use self::empty::EmptyChunk;
pub use self::fields::{Fields, FieldsChunk};
pub use self::sequence::SequenceChunk;
pub use self::slice::SliceChunk;

pub(crate) use self::fields::ErasedFields;
pub(crate) use self::sequence::ElementHint;

use crate::error::{ChunkError, Result};
use crate::flags::{ChunkFlags, ChunkType};
use crate::serializer;
use crate::stream::{OutputStream, SerializedBytes};
use crate::units::Bits;
use crate::check_usage;

// ── Chunk ─────────────────────────────────────────────────────────────────────

/// One piece of packet content in one of the supported representations.
#[derive(Debug, Clone)]
pub enum Chunk {
    Empty(EmptyChunk),
    Bytes(BytesChunk),
    Bits(BitsChunk),
    ByteCount(ByteCountChunk),
    Fields(FieldsChunk),
    Slice(SliceChunk),
    Sequence(SequenceChunk),
}

macro_rules! impl_from_representation {
    ($($variant:ident => $ty:ty),+ $(,)?) => {
        $(
            impl From<$ty> for Chunk {
                fn from(chunk: $ty) -> Chunk {
                    Chunk::$variant(chunk)
                }
            }
        )+
    };
}

impl_from_representation! {
    Empty => EmptyChunk,
    Bytes => BytesChunk,
    Bits => BitsChunk,
    ByteCount => ByteCountChunk,
    Fields => FieldsChunk,
    Slice => SliceChunk,
    Sequence => SequenceChunk,
}

// ── Shared Chunk ──────────────────────────────────────────────────────────────

/// Reference-counted handle to an immutable chunk.
///
/// Cloning the handle shares the chunk; the chunk lives as long as its
/// longest holder. The only way to obtain one is `Chunk::into_shared`, which
/// marks the chunk immutable first.
#[derive(Debug, Clone)]
pub struct SharedChunk(Arc<Chunk>);

impl Deref for SharedChunk {
    type Target = Chunk;

    fn deref(&self) -> &Chunk {
        &self.0
    }
}

impl SharedChunk {
    /// Whether both handles point at the very same chunk.
    pub fn ptr_eq(&self, other: &SharedChunk) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }

    /// Number of handles currently sharing this chunk.
    pub fn holders(&self) -> usize {
        Arc::strong_count(&self.0)
    }

    /// This chunk, or a copy of it that also carries the `quality` marks.
    /// The copy keeps the content, including any cached wire form.
    pub(crate) fn with_quality(self, quality: ChunkFlags) -> SharedChunk {
        let quality = quality.quality();
        if self.flags().contains(quality) {
            return self;
        }
        let mut copy = self.dup();
        copy.own_flags_mut().insert(quality);
        copy.into_shared()
    }

    /// Replaces trivial wrappers by what they wrap: an empty sequence by the
    /// empty chunk, a single-element sequence by its element, and a slice
    /// covering its whole target by the target. Wrappers carrying their own
    /// quality flags are kept.
    pub fn simplify(self) -> SharedChunk {
        let replacement = match &*self {
            Chunk::Sequence(sequence) if sequence.flags.quality().is_empty() => {
                match sequence.len() {
                    0 => Some(Chunk::empty().into_shared()),
                    1 => sequence.chunks().front().cloned(),
                    _ => None,
                }
            }
            Chunk::Slice(slice)
                if slice.flags.quality().is_empty()
                    && slice.offset().is_zero()
                    && slice.length() == slice.chunk().chunk_length() =>
            {
                Some(slice.chunk().clone())
            }
            _ => None,
        };
        replacement.unwrap_or(self)
    }
}

// ── Construction ──────────────────────────────────────────────────────────────

impl Chunk {
    pub fn empty() -> Chunk {
        Chunk::Empty(EmptyChunk::new())
    }

    pub fn bytes(data: impl Into<::bytes::Bytes>) -> Chunk {
        Chunk::Bytes(BytesChunk::new(data))
    }

    pub fn bits(bits: Vec<bool>) -> Chunk {
        Chunk::Bits(BitsChunk::new(bits))
    }

    pub fn byte_count(length: Bits, data: u8) -> Result<Chunk> {
        ByteCountChunk::new(length, data).map(Chunk::ByteCount)
    }

    pub fn from_fields<T: Fields>(fields: T) -> Chunk {
        Chunk::Fields(FieldsChunk::new(fields))
    }

    pub fn slice(chunk: SharedChunk, offset: Bits, length: Bits) -> Result<Chunk> {
        SliceChunk::new(chunk, offset, length).map(Chunk::Slice)
    }

    pub fn sequence(chunks: impl IntoIterator<Item = SharedChunk>) -> Result<Chunk> {
        SequenceChunk::from_chunks(chunks).map(Chunk::Sequence)
    }

    /// Freezes this chunk and hands it over to shared ownership.
    pub fn into_shared(mut self) -> SharedChunk {
        self.mark_immutable();
        SharedChunk(Arc::new(self))
    }

    /// An independent, mutable copy. Immutable children and byte storage are
    /// shared with the original since neither can change.
    pub fn dup(&self) -> Chunk {
        let mut copy = self.clone();
        copy.own_flags_mut().remove(ChunkFlags::IMMUTABLE);
        copy
    }

    /// An independent copy handed out through a new shared handle.
    pub fn dup_shared(&self) -> SharedChunk {
        self.dup().into_shared()
    }
}

// ── Properties ────────────────────────────────────────────────────────────────

impl Chunk {
    pub fn chunk_type(&self) -> ChunkType {
        match self {
            Chunk::Empty(_) => ChunkType::Empty,
            Chunk::Bytes(_) => ChunkType::Bytes,
            Chunk::Bits(_) => ChunkType::Bits,
            Chunk::ByteCount(_) => ChunkType::ByteCount,
            Chunk::Fields(_) => ChunkType::Fields,
            Chunk::Slice(_) => ChunkType::Slice,
            Chunk::Sequence(_) => ChunkType::Sequence,
        }
    }

    pub fn chunk_length(&self) -> Bits {
        match self {
            Chunk::Empty(_) => Bits::ZERO,
            Chunk::Bytes(c) => c.chunk_length(),
            Chunk::Bits(c) => c.chunk_length(),
            Chunk::ByteCount(c) => c.chunk_length(),
            Chunk::Fields(c) => c.chunk_length(),
            Chunk::Slice(c) => c.length(),
            Chunk::Sequence(c) => c.chunk_length(),
        }
    }

    fn own_flags(&self) -> ChunkFlags {
        match self {
            Chunk::Empty(c) => c.flags,
            Chunk::Bytes(c) => c.flags,
            Chunk::Bits(c) => c.flags,
            Chunk::ByteCount(c) => c.flags,
            Chunk::Fields(c) => c.flags,
            Chunk::Slice(c) => c.flags,
            Chunk::Sequence(c) => c.flags,
        }
    }

    fn own_flags_mut(&mut self) -> &mut ChunkFlags {
        match self {
            Chunk::Empty(c) => &mut c.flags,
            Chunk::Bytes(c) => &mut c.flags,
            Chunk::Bits(c) => &mut c.flags,
            Chunk::ByteCount(c) => &mut c.flags,
            Chunk::Fields(c) => &mut c.flags,
            Chunk::Slice(c) => &mut c.flags,
            Chunk::Sequence(c) => &mut c.flags,
        }
    }

    /// Flags stored on this chunk itself, ignoring any children.
    pub fn stored_flags(&self) -> ChunkFlags {
        self.own_flags()
    }

    /// Effective flags. Slices and sequences compute theirs from their own
    /// flags and their children's, so they can never disagree.
    pub fn flags(&self) -> ChunkFlags {
        match self {
            Chunk::Slice(c) => c.flags.combine(c.chunk().flags()),
            Chunk::Sequence(c) => c
                .chunks()
                .iter()
                .fold(c.flags, |flags, child| flags.combine(child.flags())),
            _ => self.own_flags(),
        }
    }

    pub fn is_mutable(&self) -> bool {
        !self.is_immutable()
    }

    pub fn is_immutable(&self) -> bool {
        self.flags().contains(ChunkFlags::IMMUTABLE)
    }

    pub fn is_complete(&self) -> bool {
        !self.is_incomplete()
    }

    pub fn is_incomplete(&self) -> bool {
        self.flags().contains(ChunkFlags::INCOMPLETE)
    }

    pub fn is_correct(&self) -> bool {
        !self.is_incorrect()
    }

    pub fn is_incorrect(&self) -> bool {
        self.flags().contains(ChunkFlags::INCORRECT)
    }

    pub fn is_properly_represented(&self) -> bool {
        !self.is_improperly_represented()
    }

    pub fn is_improperly_represented(&self) -> bool {
        self.flags().contains(ChunkFlags::IMPROPERLY_REPRESENTED)
    }

    /// How many slice/sequence levels sit above the deepest leaf.
    pub fn nesting_depth(&self) -> usize {
        match self {
            Chunk::Slice(c) => c.depth(),
            Chunk::Sequence(c) => c.depth(),
            _ => 0,
        }
    }
}

// ── Flag transitions ──────────────────────────────────────────────────────────

impl Chunk {
    /// One-way transition; an immutable chunk is never edited in place again.
    pub fn mark_immutable(&mut self) {
        self.own_flags_mut().insert(ChunkFlags::IMMUTABLE);
    }

    pub fn mark_incomplete(&mut self) -> Result<()> {
        self.handle_change()?;
        self.own_flags_mut().insert(ChunkFlags::INCOMPLETE);
        Ok(())
    }

    pub fn mark_incorrect(&mut self) -> Result<()> {
        self.handle_change()?;
        self.own_flags_mut().insert(ChunkFlags::INCORRECT);
        Ok(())
    }

    pub fn mark_improperly_represented(&mut self) -> Result<()> {
        self.handle_change()?;
        self.own_flags_mut().insert(ChunkFlags::IMPROPERLY_REPRESENTED);
        Ok(())
    }

    /// Gate for every in-place edit: rejects immutable chunks and drops
    /// derived state that the edit would make stale.
    pub(crate) fn handle_change(&mut self) -> Result<()> {
        check_usage!(self.is_mutable(), "{} chunk is immutable", self.chunk_type());
        if let Chunk::Fields(fields) = self {
            fields.invalidate_serialized_bytes();
        }
        Ok(())
    }
}

// ── Edges ─────────────────────────────────────────────────────────────────────

impl Chunk {
    pub fn can_insert_at_front(&self, chunk: &SharedChunk) -> bool {
        self.can_insert(chunk)
    }

    pub fn can_insert_at_back(&self, chunk: &SharedChunk) -> bool {
        self.can_insert(chunk)
    }

    fn can_insert(&self, chunk: &SharedChunk) -> bool {
        match (self, &**chunk) {
            (Chunk::Bytes(_), Chunk::Bytes(_)) => true,
            (Chunk::Bits(_), Chunk::Bits(_)) => true,
            (Chunk::ByteCount(c), Chunk::ByteCount(other)) => c.data() == other.data(),
            (Chunk::Sequence(_), _) => true,
            _ => false,
        }
    }

    pub fn can_remove_at_front(&self, length: Bits) -> bool {
        self.can_remove(length)
    }

    pub fn can_remove_at_back(&self, length: Bits) -> bool {
        self.can_remove(length)
    }

    fn can_remove(&self, length: Bits) -> bool {
        let fits = length <= self.chunk_length();
        match self {
            Chunk::Empty(_) => length.is_zero(),
            Chunk::Bytes(_) | Chunk::ByteCount(_) => fits && length.is_byte_aligned(),
            Chunk::Bits(_) | Chunk::Sequence(_) => fits,
            Chunk::Fields(_) | Chunk::Slice(_) => false,
        }
    }

    pub fn insert_at_front(&mut self, chunk: SharedChunk) -> Result<()> {
        check_usage!(
            self.can_insert_at_front(&chunk),
            "a {} chunk cannot be inserted at the front of a {} chunk",
            chunk.chunk_type(),
            self.chunk_type()
        );
        self.handle_change()?;
        let quality = chunk.flags().quality();
        match (&mut *self, &*chunk) {
            (Chunk::Bytes(c), Chunk::Bytes(other)) => c.prepend(other),
            (Chunk::Bits(c), Chunk::Bits(other)) => c.prepend(other),
            (Chunk::ByteCount(c), Chunk::ByteCount(other)) => c.grow(other.chunk_length()),
            (Chunk::Sequence(c), _) => return c.insert_at_front(chunk.clone()),
            (this, other) => return Err(unsupported_edge("insert", this, other)),
        }
        self.own_flags_mut().insert(quality);
        Ok(())
    }

    pub fn insert_at_back(&mut self, chunk: SharedChunk) -> Result<()> {
        check_usage!(
            self.can_insert_at_back(&chunk),
            "a {} chunk cannot be inserted at the back of a {} chunk",
            chunk.chunk_type(),
            self.chunk_type()
        );
        self.handle_change()?;
        let quality = chunk.flags().quality();
        match (&mut *self, &*chunk) {
            (Chunk::Bytes(c), Chunk::Bytes(other)) => c.append(other),
            (Chunk::Bits(c), Chunk::Bits(other)) => c.append(other),
            (Chunk::ByteCount(c), Chunk::ByteCount(other)) => c.grow(other.chunk_length()),
            (Chunk::Sequence(c), _) => return c.insert_at_back(chunk.clone()),
            (this, other) => return Err(unsupported_edge("insert", this, other)),
        }
        self.own_flags_mut().insert(quality);
        Ok(())
    }

    pub fn remove_at_front(&mut self, length: Bits) -> Result<()> {
        check_usage!(
            self.can_remove_at_front(length),
            "cannot remove {} from the front of a {} chunk of {}",
            length,
            self.chunk_type(),
            self.chunk_length()
        );
        self.handle_change()?;
        match self {
            Chunk::Empty(_) => {}
            Chunk::Bytes(c) => c.trim_front(length),
            Chunk::Bits(c) => c.trim_front(length),
            Chunk::ByteCount(c) => c.shrink(length),
            Chunk::Sequence(c) => c.remove_at_front(length)?,
            Chunk::Fields(_) | Chunk::Slice(_) => {
                return Err(ChunkError::Implementation(format!(
                    "{} chunk accepted a removal it cannot perform",
                    self.chunk_type()
                )))
            }
        }
        Ok(())
    }

    pub fn remove_at_back(&mut self, length: Bits) -> Result<()> {
        check_usage!(
            self.can_remove_at_back(length),
            "cannot remove {} from the back of a {} chunk of {}",
            length,
            self.chunk_type(),
            self.chunk_length()
        );
        self.handle_change()?;
        match self {
            Chunk::Empty(_) => {}
            Chunk::Bytes(c) => c.trim_back(length),
            Chunk::Bits(c) => c.trim_back(length),
            Chunk::ByteCount(c) => c.shrink(length),
            Chunk::Sequence(c) => c.remove_at_back(length)?,
            Chunk::Fields(_) | Chunk::Slice(_) => {
                return Err(ChunkError::Implementation(format!(
                    "{} chunk accepted a removal it cannot perform",
                    self.chunk_type()
                )))
            }
        }
        Ok(())
    }
}

fn unsupported_edge(operation: &str, this: &Chunk, other: &Chunk) -> ChunkError {
    ChunkError::Implementation(format!(
        "{} chunk accepted an {} of a {} chunk it cannot perform",
        this.chunk_type(),
        operation,
        other.chunk_type()
    ))
}

// ── Content ───────────────────────────────────────────────────────────────────

impl Chunk {
    /// The chunk's content as bits, running field encoders (and filling
    /// their caches) where needed.
    pub fn serialize_bits(&self) -> Result<SerializedBytes> {
        let length = self.chunk_length();
        let mut stream = OutputStream::with_capacity(length);
        serializer::serialize(self, &mut stream, Bits::ZERO, length)?;
        Ok(stream.into_serialized())
    }

    /// The chunk's content as whole bytes.
    pub fn to_bytes(&self) -> Result<::bytes::Bytes> {
        check_usage!(
            self.chunk_length().is_byte_aligned(),
            "a chunk of {} cannot be represented as bytes",
            self.chunk_length()
        );
        Ok(self.serialize_bits()?.data().clone())
    }

    /// Deep content equality, independent of representation: two chunks
    /// contain the same data when they serialize to the same bits.
    pub fn contains_same_data(&self, other: &Chunk) -> bool {
        if std::ptr::eq(self, other) {
            return true;
        }
        if self.chunk_length() != other.chunk_length() {
            return false;
        }
        match (self, other) {
            (Chunk::Empty(_), Chunk::Empty(_)) => true,
            (Chunk::Bytes(a), Chunk::Bytes(b)) => a.bytes() == b.bytes(),
            (Chunk::Bits(a), Chunk::Bits(b)) => a.bits() == b.bits(),
            (Chunk::ByteCount(a), Chunk::ByteCount(b)) => a.data() == b.data(),
            _ => match (self.serialize_bits(), other.serialize_bits()) {
                (Ok(a), Ok(b)) => a == b,
                (Err(e), _) | (_, Err(e)) => {
                    tracing::warn!(error = %e, "content comparison failed to serialize");
                    false
                }
            },
        }
    }
}

// ── Accessors ─────────────────────────────────────────────────────────────────

impl Chunk {
    pub fn as_bytes(&self) -> Option<&BytesChunk> {
        match self {
            Chunk::Bytes(c) => Some(c),
            _ => None,
        }
    }

    pub fn as_bytes_mut(&mut self) -> Option<&mut BytesChunk> {
        match self {
            Chunk::Bytes(c) => Some(c),
            _ => None,
        }
    }

    pub fn as_bits(&self) -> Option<&BitsChunk> {
        match self {
            Chunk::Bits(c) => Some(c),
            _ => None,
        }
    }

    pub fn as_byte_count(&self) -> Option<&ByteCountChunk> {
        match self {
            Chunk::ByteCount(c) => Some(c),
            _ => None,
        }
    }

    pub fn as_byte_count_mut(&mut self) -> Option<&mut ByteCountChunk> {
        match self {
            Chunk::ByteCount(c) => Some(c),
            _ => None,
        }
    }

    pub fn as_fields_chunk(&self) -> Option<&FieldsChunk> {
        match self {
            Chunk::Fields(c) => Some(c),
            _ => None,
        }
    }

    pub fn as_fields_chunk_mut(&mut self) -> Option<&mut FieldsChunk> {
        match self {
            Chunk::Fields(c) => Some(c),
            _ => None,
        }
    }

    pub fn as_slice(&self) -> Option<&SliceChunk> {
        match self {
            Chunk::Slice(c) => Some(c),
            _ => None,
        }
    }

    pub fn as_slice_mut(&mut self) -> Option<&mut SliceChunk> {
        match self {
            Chunk::Slice(c) => Some(c),
            _ => None,
        }
    }

    pub fn as_sequence(&self) -> Option<&SequenceChunk> {
        match self {
            Chunk::Sequence(c) => Some(c),
            _ => None,
        }
    }

    /// Typed fields of a fields chunk, if it holds a `T`.
    pub fn fields<T: Fields>(&self) -> Option<&T> {
        self.as_fields_chunk().and_then(|c| c.fields::<T>())
    }
}
