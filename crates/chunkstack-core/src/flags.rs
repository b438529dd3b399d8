//! Representation tags and the flag sets carried by chunks and peeks.
//!
//! `ChunkFlags` only stores the "bad half" of each property pair, so the
//! empty set is the default state of a freshly built chunk: mutable,
//! complete, correct and properly represented.

use std::fmt;
use std::ops::{BitOr, BitOrAssign};

use serde::{Deserialize, Serialize};
use static_assertions::assert_eq_size;

// ── Chunk Type ────────────────────────────────────────────────────────────────

/// The closed set of chunk representations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum ChunkType {
    /// Zero-length content.
    Empty = 0x01,
    /// Raw bytes.
    Bytes = 0x02,
    /// Raw bit sequence, for content that is not byte aligned.
    Bits = 0x03,
    /// Length-only content filled with one repeated byte value.
    ByteCount = 0x04,
    /// Typed fields supplied by a protocol definition.
    Fields = 0x05,
    /// A view over a bit range of another chunk.
    Slice = 0x06,
    /// An ordered concatenation of other chunks.
    Sequence = 0x07,
}

impl ChunkType {
    pub fn name(self) -> &'static str {
        match self {
            ChunkType::Empty => "empty",
            ChunkType::Bytes => "bytes",
            ChunkType::Bits => "bits",
            ChunkType::ByteCount => "byte-count",
            ChunkType::Fields => "fields",
            ChunkType::Slice => "slice",
            ChunkType::Sequence => "sequence",
        }
    }

    /// Raw representations can always be reinterpreted without running a
    /// field-level encoder.
    pub fn is_raw(self) -> bool {
        matches!(self, ChunkType::Bytes | ChunkType::Bits)
    }
}

impl fmt::Display for ChunkType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

// ── Chunk Flags ───────────────────────────────────────────────────────────────

/// Per-chunk property bits.
///
/// Bit layout:
///   bit 0: immutable
///   bit 1: incomplete
///   bit 2: incorrect
///   bit 3: improperly represented
///   bits 4-7: reserved, must be zero
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ChunkFlags(u8);

assert_eq_size!(ChunkFlags, u8);

impl ChunkFlags {
    pub const IMMUTABLE: ChunkFlags = ChunkFlags(0x01);
    pub const INCOMPLETE: ChunkFlags = ChunkFlags(0x02);
    pub const INCORRECT: ChunkFlags = ChunkFlags(0x04);
    pub const IMPROPERLY_REPRESENTED: ChunkFlags = ChunkFlags(0x08);

    /// The three flags that describe content quality, as opposed to
    /// mutability.
    pub const QUALITY: ChunkFlags = ChunkFlags(0x02 | 0x04 | 0x08);

    const ALL: u8 = 0x0f;

    pub const fn empty() -> Self {
        ChunkFlags(0)
    }

    pub const fn bits(self) -> u8 {
        self.0
    }

    pub const fn from_bits_truncate(bits: u8) -> Self {
        ChunkFlags(bits & Self::ALL)
    }

    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    pub const fn contains(self, other: ChunkFlags) -> bool {
        self.0 & other.0 == other.0
    }

    pub const fn intersects(self, other: ChunkFlags) -> bool {
        self.0 & other.0 != 0
    }

    pub fn insert(&mut self, other: ChunkFlags) {
        self.0 |= other.0;
    }

    pub fn remove(&mut self, other: ChunkFlags) {
        self.0 &= !other.0;
    }

    /// Only the content-quality bits of this set.
    pub const fn quality(self) -> ChunkFlags {
        ChunkFlags(self.0 & Self::QUALITY.0)
    }

    /// Combines the flags of a composite with the flags of one of its parts:
    /// quality problems propagate upwards, while the composite is immutable
    /// only if both itself and the part are.
    pub const fn combine(self, part: ChunkFlags) -> ChunkFlags {
        let quality = (self.0 | part.0) & Self::QUALITY.0;
        let immutable = self.0 & part.0 & Self::IMMUTABLE.0;
        ChunkFlags(quality | immutable)
    }
}

impl BitOr for ChunkFlags {
    type Output = ChunkFlags;

    fn bitor(self, rhs: ChunkFlags) -> ChunkFlags {
        ChunkFlags(self.0 | rhs.0)
    }
}

impl BitOrAssign for ChunkFlags {
    fn bitor_assign(&mut self, rhs: ChunkFlags) {
        self.0 |= rhs.0;
    }
}

// ── Peek Flags ────────────────────────────────────────────────────────────────

/// Strictness modifiers for checked peeks.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct PeekFlags(u8);

impl PeekFlags {
    /// An empty region yields an `EmptyChunk` instead of a usage error.
    pub const ALLOW_EMPTY: PeekFlags = PeekFlags(0x01);
    /// Truncated results are accepted.
    pub const ALLOW_INCOMPLETE: PeekFlags = PeekFlags(0x02);
    /// Results marked incorrect (e.g. failed checksums) are accepted.
    pub const ALLOW_INCORRECT: PeekFlags = PeekFlags(0x04);
    /// Best-effort stand-ins for undecodable data are accepted.
    pub const ALLOW_IMPROPERLY_REPRESENTED: PeekFlags = PeekFlags(0x08);
    /// Conversions may serialize non-raw content even when implicit
    /// serialization is disabled in the configuration.
    pub const ALLOW_SERIALIZATION: PeekFlags = PeekFlags(0x10);
    pub const ALLOW_ALL: PeekFlags = PeekFlags(0x1f);

    pub const fn empty() -> Self {
        PeekFlags(0)
    }

    pub const fn contains(self, other: PeekFlags) -> bool {
        self.0 & other.0 == other.0
    }
}

impl BitOr for PeekFlags {
    type Output = PeekFlags;

    fn bitor(self, rhs: PeekFlags) -> PeekFlags {
        PeekFlags(self.0 | rhs.0)
    }
}
