//! Checkpoint support: packing chunk trees into opaque buffers and back.
//!
//! A packed chunk keeps every representation detail: element boundaries,
//! slice ranges, stored flags and the cached wire form of fields, so a
//! restored tree serializes bit for bit like the original. Fields are packed
//! through their own encoder and restored through a decoder looked up by
//! `Fields::TYPE_NAME` in a [`FieldsRegistry`].
//!
//! Buffers are bincode-encoded `PackedChunk` trees.

use std::collections::{HashMap, VecDeque};

use serde::{Deserialize, Serialize};

use crate::chunk::{
    BitsChunk, BytesChunk, ByteCountChunk, Chunk, EmptyChunk, ErasedFields, Fields, FieldsChunk, SequenceChunk,
    SliceChunk,
};
use crate::error::ChunkError;
use crate::flags::ChunkFlags;
use crate::stream::{InputStream, OutputStream, SerializedBytes};
use crate::units::Bits;

// ── Errors ────────────────────────────────────────────────────────────────────

#[derive(Debug, thiserror::Error)]
pub enum PackError {
    #[error("packed chunk encoding failed: {0}")]
    Encode(#[from] bincode::Error),

    #[error("no fields type registered under {0:?}")]
    UnknownFieldsType(String),

    #[error("packed chunk is inconsistent: {0}")]
    Inconsistent(#[from] ChunkError),
}

// ── Registry ──────────────────────────────────────────────────────────────────

type FieldsDecoder = fn(&mut InputStream) -> Box<dyn ErasedFields>;

fn decode_boxed<T: Fields>(stream: &mut InputStream) -> Box<dyn ErasedFields> {
    Box::new(T::deserialize(stream))
}

/// Maps field type names to their decoders.
#[derive(Default)]
pub struct FieldsRegistry {
    decoders: HashMap<&'static str, FieldsDecoder>,
}

impl FieldsRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<T: Fields>(&mut self) -> &mut Self {
        if self.decoders.insert(T::TYPE_NAME, decode_boxed::<T>).is_some() {
            tracing::warn!(fields = T::TYPE_NAME, "fields type registered twice");
        }
        self
    }

    pub fn contains(&self, type_name: &str) -> bool {
        self.decoders.contains_key(type_name)
    }

    fn decode(&self, type_name: &str, encoded: SerializedBytes) -> Result<Box<dyn ErasedFields>, PackError> {
        let decoder = self.decoders.get(type_name).ok_or_else(|| {
            tracing::warn!(fields = type_name, "cannot restore unregistered fields type");
            PackError::UnknownFieldsType(type_name.to_string())
        })?;
        Ok(decoder(&mut InputStream::new(encoded)))
    }
}

// ── Packed form ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackedBits {
    data: Vec<u8>,
    length: Bits,
}

impl From<&SerializedBytes> for PackedBits {
    fn from(serialized: &SerializedBytes) -> Self {
        Self {
            data: serialized.data().to_vec(),
            length: serialized.length(),
        }
    }
}

impl From<&PackedBits> for SerializedBytes {
    fn from(packed: &PackedBits) -> Self {
        SerializedBytes::from_bits(packed.data.clone(), packed.length)
    }
}

/// One node of a packed chunk tree. Flags are the node's stored flags.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum PackedChunk {
    Empty {
        flags: ChunkFlags,
    },
    Bytes {
        flags: ChunkFlags,
        data: Vec<u8>,
    },
    Bits {
        flags: ChunkFlags,
        bits: PackedBits,
    },
    ByteCount {
        flags: ChunkFlags,
        length: Bits,
        data: u8,
    },
    Fields {
        flags: ChunkFlags,
        type_name: String,
        field_length: Bits,
        encoded: PackedBits,
        cached: Option<PackedBits>,
    },
    Slice {
        flags: ChunkFlags,
        chunk: Box<PackedChunk>,
        offset: Bits,
        length: Bits,
    },
    Sequence {
        flags: ChunkFlags,
        chunks: Vec<PackedChunk>,
    },
}

impl PackedChunk {
    pub fn from_chunk(chunk: &Chunk) -> Result<Self, PackError> {
        let flags = chunk.stored_flags();
        let packed = match chunk {
            Chunk::Empty(_) => PackedChunk::Empty { flags },
            Chunk::Bytes(c) => PackedChunk::Bytes {
                flags,
                data: c.bytes().to_vec(),
            },
            Chunk::Bits(_) => PackedChunk::Bits {
                flags,
                bits: PackedBits::from(&chunk.serialize_bits()?),
            },
            Chunk::ByteCount(c) => PackedChunk::ByteCount {
                flags,
                length: c.chunk_length(),
                data: c.data(),
            },
            Chunk::Fields(c) => {
                let fields = c.erased();
                let mut stream = OutputStream::with_capacity(fields.natural_length());
                fields.encode(&mut stream);
                PackedChunk::Fields {
                    flags,
                    type_name: fields.type_name().to_string(),
                    field_length: c.chunk_length(),
                    encoded: PackedBits::from(&stream.into_serialized()),
                    cached: c.serialized_bytes().map(PackedBits::from),
                }
            }
            Chunk::Slice(c) => PackedChunk::Slice {
                flags,
                chunk: Box::new(PackedChunk::from_chunk(c.chunk())?),
                offset: c.offset(),
                length: c.length(),
            },
            Chunk::Sequence(c) => PackedChunk::Sequence {
                flags,
                chunks: c
                    .chunks()
                    .iter()
                    .map(|element| PackedChunk::from_chunk(element))
                    .collect::<Result<_, _>>()?,
            },
        };
        Ok(packed)
    }

    pub fn restore(&self, registry: &FieldsRegistry) -> Result<Chunk, PackError> {
        let chunk = match self {
            PackedChunk::Empty { flags } => Chunk::Empty(EmptyChunk { flags: *flags }),
            PackedChunk::Bytes { flags, data } => {
                let mut bytes = BytesChunk::new(data.clone());
                bytes.flags = *flags;
                Chunk::Bytes(bytes)
            }
            PackedChunk::Bits { flags, bits } => {
                let mut restored = BitsChunk::from_serialized(&SerializedBytes::from(bits));
                restored.flags = *flags;
                Chunk::Bits(restored)
            }
            PackedChunk::ByteCount { flags, length, data } => {
                let mut restored = ByteCountChunk::new(*length, *data)?;
                restored.flags = *flags;
                Chunk::ByteCount(restored)
            }
            PackedChunk::Fields {
                flags,
                type_name,
                field_length,
                encoded,
                cached,
            } => {
                let fields = registry.decode(type_name, SerializedBytes::from(encoded))?;
                let restored = FieldsChunk::from_erased(fields, *field_length, *flags);
                if let Some(cached) = cached {
                    restored.set_serialized_bytes(SerializedBytes::from(cached))?;
                }
                Chunk::Fields(restored)
            }
            PackedChunk::Slice {
                flags,
                chunk,
                offset,
                length,
            } => {
                let target = chunk.restore(registry)?.into_shared();
                let mut slice = SliceChunk::new(target, *offset, *length)?;
                slice.flags = *flags;
                Chunk::Slice(slice)
            }
            PackedChunk::Sequence { flags, chunks } => {
                let elements = chunks
                    .iter()
                    .map(|element| element.restore(registry).map(Chunk::into_shared))
                    .collect::<Result<VecDeque<_>, _>>()?;
                Chunk::Sequence(SequenceChunk::from_parts(elements, *flags)?)
            }
        };
        Ok(chunk)
    }
}

impl Chunk {
    /// Packs this chunk tree into an opaque buffer.
    pub fn pack(&self) -> Result<Vec<u8>, PackError> {
        let packed = PackedChunk::from_chunk(self)?;
        let buffer = bincode::serialize(&packed)?;
        tracing::debug!(
            chunk_type = %self.chunk_type(),
            length = %self.chunk_length(),
            packed_bytes = buffer.len(),
            "chunk packed"
        );
        Ok(buffer)
    }

    /// Restores a chunk tree packed by [`Chunk::pack`].
    pub fn unpack(buffer: &[u8], registry: &FieldsRegistry) -> Result<Chunk, PackError> {
        let packed: PackedChunk = bincode::deserialize(buffer)?;
        packed.restore(registry)
    }
}
