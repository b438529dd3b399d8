//! Typed protocol fields.
//!
//! A protocol defines its header (or trailer, or payload) as a plain Rust
//! type implementing [`Fields`]. `FieldsChunk` erases that type so headers of
//! different protocols can live side by side in one sequence, and caches the
//! serialized form so a header is encoded at most once per change.

use std::any::Any;
use std::fmt;
use std::sync::OnceLock;

use crate::error::{ChunkError, Result};
use crate::flags::ChunkFlags;
use crate::stream::{InputStream, OutputStream, SerializedBytes};
use crate::units::Bits;
use crate::{check_implementation, check_usage};

// ── Fields ────────────────────────────────────────────────────────────────────

/// A protocol-defined field layout.
///
/// `serialize` must write exactly `chunk_length()` bits. `deserialize` reads
/// as much as the layout needs; running out of data is recorded by the
/// stream, and content that violates the protocol should be reported with
/// `InputStream::mark_incorrect` or `mark_improperly_represented`.
pub trait Fields: fmt::Debug + Clone + Send + Sync + 'static {
    /// Stable name used to restore packed chunks.
    const TYPE_NAME: &'static str;

    fn chunk_length(&self) -> Bits;

    fn serialize(&self, stream: &mut OutputStream);

    fn deserialize(stream: &mut InputStream) -> Self;
}

/// Object-safe view of a [`Fields`] implementation.
pub(crate) trait ErasedFields: fmt::Debug + Send + Sync {
    fn type_name(&self) -> &'static str;
    fn natural_length(&self) -> Bits;
    fn encode(&self, stream: &mut OutputStream);
    fn clone_box(&self) -> Box<dyn ErasedFields>;
    fn as_any(&self) -> &dyn Any;
    fn as_any_mut(&mut self) -> &mut dyn Any;
}

impl<T: Fields> ErasedFields for T {
    fn type_name(&self) -> &'static str {
        T::TYPE_NAME
    }

    fn natural_length(&self) -> Bits {
        self.chunk_length()
    }

    fn encode(&self, stream: &mut OutputStream) {
        self.serialize(stream)
    }

    fn clone_box(&self) -> Box<dyn ErasedFields> {
        Box::new(self.clone())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

// ── Fields Chunk ──────────────────────────────────────────────────────────────

#[derive(Debug)]
pub struct FieldsChunk {
    pub(crate) flags: ChunkFlags,
    fields: Box<dyn ErasedFields>,
    field_length: Bits,
    serialized: OnceLock<SerializedBytes>,
}

impl Clone for FieldsChunk {
    fn clone(&self) -> Self {
        let serialized = OnceLock::new();
        if let Some(cached) = self.serialized.get() {
            let _ = serialized.set(cached.clone());
        }
        Self {
            flags: self.flags,
            fields: self.fields.clone_box(),
            field_length: self.field_length,
            serialized,
        }
    }
}

impl FieldsChunk {
    pub fn new<T: Fields>(fields: T) -> Self {
        let field_length = fields.chunk_length();
        Self::from_erased(Box::new(fields), field_length, ChunkFlags::empty())
    }

    pub(crate) fn from_erased(
        fields: Box<dyn ErasedFields>,
        field_length: Bits,
        flags: ChunkFlags,
    ) -> Self {
        Self {
            flags,
            fields,
            field_length,
            serialized: OnceLock::new(),
        }
    }

    pub(crate) fn erased(&self) -> &dyn ErasedFields {
        self.fields.as_ref()
    }

    pub fn type_name(&self) -> &'static str {
        self.fields.type_name()
    }

    pub fn chunk_length(&self) -> Bits {
        self.field_length
    }

    pub fn is<T: Fields>(&self) -> bool {
        self.fields.as_any().is::<T>()
    }

    pub fn fields<T: Fields>(&self) -> Option<&T> {
        self.fields.as_any().downcast_ref::<T>()
    }

    /// Edits the fields in place and recomputes the chunk length from them.
    pub fn with_fields_mut<T: Fields, R>(&mut self, edit: impl FnOnce(&mut T) -> R) -> Result<R> {
        check_usage!(!self.flags.contains(ChunkFlags::IMMUTABLE), "{} fields chunk is immutable", self.type_name());
        let type_name = self.fields.type_name();
        let fields = self.fields.as_any_mut().downcast_mut::<T>().ok_or_else(|| {
            ChunkError::Usage(format!("fields chunk holds {type_name}, not {}", T::TYPE_NAME))
        })?;
        self.serialized.take();
        let result = edit(fields);
        self.field_length = fields.chunk_length();
        Ok(result)
    }

    /// Overrides the length the fields occupy on the wire.
    pub fn set_chunk_length(&mut self, length: Bits) -> Result<()> {
        check_usage!(!self.flags.contains(ChunkFlags::IMMUTABLE), "{} fields chunk is immutable", self.type_name());
        self.serialized.take();
        self.field_length = length;
        Ok(())
    }

    pub fn add_chunk_length(&mut self, length: Bits) -> Result<()> {
        self.set_chunk_length(self.field_length + length)
    }

    pub fn serialized_bytes(&self) -> Option<&SerializedBytes> {
        self.serialized.get()
    }

    /// Installs the wire form of these fields. Only the first installation
    /// after a change takes effect.
    pub fn set_serialized_bytes(&self, serialized: SerializedBytes) -> Result<()> {
        check_implementation!(
            serialized.length() == self.field_length,
            "serialized {} fields are {} but the chunk is {}",
            self.type_name(),
            serialized.length(),
            self.field_length
        );
        let _ = self.serialized.set(serialized);
        Ok(())
    }

    pub(crate) fn invalidate_serialized_bytes(&mut self) {
        self.serialized.take();
    }

    /// The cached wire form, encoding the fields first if there is none.
    pub(crate) fn serialized_or_encode(&self) -> Result<SerializedBytes> {
        if let Some(cached) = self.serialized.get() {
            tracing::trace!(fields = self.type_name(), length = %cached.length(), "serialized fields cache hit");
            return Ok(cached.clone());
        }
        let mut stream = OutputStream::with_capacity(self.field_length);
        self.fields.encode(&mut stream);
        check_implementation!(
            stream.length() == self.field_length,
            "{} fields encoded {} but the chunk is {}",
            self.type_name(),
            stream.length(),
            self.field_length
        );
        let serialized = stream.into_serialized();
        tracing::trace!(fields = self.type_name(), length = %serialized.length(), "serialized fields cached");
        Ok(self.serialized.get_or_init(|| serialized).clone())
    }
}
