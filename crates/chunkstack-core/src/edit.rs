//! Edits on shared content.
//!
//! Shared chunks are immutable, so growing or shrinking packet content
//! yields a new shared chunk. Where the representation can take the edit, a
//! private copy is edited in place; otherwise the content is wrapped in a
//! sequence (to grow) or re-expressed as a region of itself (to shrink).
//! Either way nothing the original references is copied or changed.

use crate::chunk::{Chunk, SharedChunk};
use crate::error::Result;
use crate::peek;
use crate::units::Bits;
use crate::check_usage;

impl SharedChunk {
    pub fn with_inserted_at_front(&self, chunk: SharedChunk) -> Result<SharedChunk> {
        let result = if self.can_insert_at_front(&chunk) {
            let mut copy = self.dup();
            copy.insert_at_front(chunk)?;
            copy.into_shared()
        } else {
            Chunk::sequence([chunk, self.clone()])?.into_shared()
        };
        Ok(result.simplify())
    }

    pub fn with_inserted_at_back(&self, chunk: SharedChunk) -> Result<SharedChunk> {
        let result = if self.can_insert_at_back(&chunk) {
            let mut copy = self.dup();
            copy.insert_at_back(chunk)?;
            copy.into_shared()
        } else {
            Chunk::sequence([self.clone(), chunk])?.into_shared()
        };
        Ok(result.simplify())
    }

    pub fn with_removed_at_front(&self, length: Bits) -> Result<SharedChunk> {
        let chunk_length = self.chunk_length();
        check_usage!(length <= chunk_length, "cannot remove {} from a chunk of {}", length, chunk_length);
        let result = if self.can_remove_at_front(length) {
            let mut copy = self.dup();
            copy.remove_at_front(length)?;
            copy.into_shared()
        } else {
            peek::peek_natural(self, length, chunk_length - length)?
        };
        Ok(result.simplify())
    }

    pub fn with_removed_at_back(&self, length: Bits) -> Result<SharedChunk> {
        let chunk_length = self.chunk_length();
        check_usage!(length <= chunk_length, "cannot remove {} from a chunk of {}", length, chunk_length);
        let result = if self.can_remove_at_back(length) {
            let mut copy = self.dup();
            copy.remove_at_back(length)?;
            copy.into_shared()
        } else {
            peek::peek_natural(self, Bits::ZERO, chunk_length - length)?
        };
        Ok(result.simplify())
    }
}
