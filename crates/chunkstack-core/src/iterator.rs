//! Cursors into chunks.
//!
//! A forward iterator's position counts bits from the front of the chunk; a
//! backward iterator's position counts bits from the back. When the chunk is
//! a sequence the iterator can also track which element it stands at, which
//! lets peeks return that element without walking the sequence.

use crate::chunk::Chunk;
use crate::units::Bits;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkIterator {
    forward: bool,
    position: Bits,
    index: Option<usize>,
}

impl ChunkIterator {
    /// Iterator at `position` bits from the front. At the very front it
    /// stands at the first element.
    pub fn forward(position: Bits) -> Self {
        Self {
            forward: true,
            position,
            index: position.is_zero().then_some(0),
        }
    }

    /// Iterator at `position` bits from the back. At the very back it
    /// stands at the last element.
    pub fn backward(position: Bits) -> Self {
        Self {
            forward: false,
            position,
            index: position.is_zero().then_some(0),
        }
    }

    /// Same iterator, claiming to stand at element `index` (counted from the
    /// iterator's own end).
    pub fn with_index(self, index: usize) -> Self {
        Self {
            index: Some(index),
            ..self
        }
    }

    pub fn is_forward(&self) -> bool {
        self.forward
    }

    pub fn is_backward(&self) -> bool {
        !self.forward
    }

    pub fn position(&self) -> Bits {
        self.position
    }

    pub fn index(&self) -> Option<usize> {
        self.index
    }

    /// Advances by `length`. Stepping over exactly the current element keeps
    /// the element index; any other move drops it.
    pub fn move_by(&mut self, chunk: &Chunk, length: Bits) {
        let stepped_element = match (chunk.as_sequence(), self.index) {
            (Some(sequence), Some(index)) => {
                let element = if self.forward {
                    sequence.chunks().get(index)
                } else {
                    sequence.len().checked_sub(index + 1).and_then(|i| sequence.chunks().get(i))
                };
                element.is_some_and(|e| e.chunk_length() == length)
            }
            _ => false,
        };
        self.position += length;
        self.index = match self.index {
            Some(index) if stepped_element => Some(index + 1),
            _ => None,
        };
    }

    /// Jumps to `position`, recovering the element index when an element
    /// boundary falls exactly there.
    pub fn seek(&mut self, chunk: &Chunk, position: Bits) {
        self.position = position;
        self.index = match chunk.as_sequence() {
            Some(sequence) => {
                let mut boundary = Bits::ZERO;
                let mut found = None;
                let elements: Box<dyn Iterator<Item = _>> = if self.forward {
                    Box::new(sequence.chunks().iter())
                } else {
                    Box::new(sequence.chunks().iter().rev())
                };
                for (index, element) in elements.enumerate() {
                    if boundary == position {
                        found = Some(index);
                        break;
                    }
                    if boundary > position {
                        break;
                    }
                    boundary += element.chunk_length();
                }
                found
            }
            None => position.is_zero().then_some(0),
        };
    }
}
