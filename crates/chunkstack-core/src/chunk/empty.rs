use crate::flags::ChunkFlags;

/// Zero-length content. Peeks that cover no bits return one of these when
/// the caller allows empty results.
#[derive(Debug, Clone, Default)]
pub struct EmptyChunk {
    pub(crate) flags: ChunkFlags,
}

impl EmptyChunk {
    pub fn new() -> Self {
        Self::default()
    }
}
