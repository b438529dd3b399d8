//! Writes any chunk, or any bit range of it, to an output stream.
//!
//! Raw representations are copied. Fields go through their cached wire form,
//! which is encoded and cached on first use. Slices and sequences forward
//! the overlapping part of the range to what they reference.

use crate::chunk::Chunk;
use crate::error::Result;
use crate::stream::OutputStream;
use crate::units::Bits;
use crate::check_implementation;

pub fn serialize(chunk: &Chunk, stream: &mut OutputStream, offset: Bits, length: Bits) -> Result<()> {
    let end = offset + length;
    check_implementation!(
        end <= chunk.chunk_length(),
        "cannot serialize {}+{} of a {} chunk of {}",
        offset,
        length,
        chunk.chunk_type(),
        chunk.chunk_length()
    );
    if length.is_zero() {
        return Ok(());
    }
    match chunk {
        Chunk::Empty(_) => {}
        Chunk::Bytes(c) => stream.write_bit_range(c.bytes(), offset, length),
        Chunk::Bits(c) => {
            for &bit in &c.bits()[offset.as_usize()..end.as_usize()] {
                stream.write_bit(bit);
            }
        }
        Chunk::ByteCount(c) => {
            if offset.is_byte_aligned() && length.is_byte_aligned() {
                stream.write_byte_repeatedly(c.data(), length.bytes());
            } else {
                for position in offset.get()..end.get() {
                    stream.write_bit(c.data() & (0x80 >> (position % 8)) != 0);
                }
            }
        }
        Chunk::Fields(c) => {
            let serialized = c.serialized_or_encode()?;
            stream.write_bit_range(serialized.data(), offset, length);
        }
        Chunk::Slice(c) => serialize(c.chunk(), stream, c.offset() + offset, length)?,
        Chunk::Sequence(c) => {
            for (start, element) in c.element_offsets() {
                let element_end = start + element.chunk_length();
                if element_end <= offset {
                    continue;
                }
                if start >= end {
                    break;
                }
                let from = offset.max(start);
                let to = end.min(element_end);
                serialize(element, stream, from - start, to - from)?;
            }
        }
    }
    Ok(())
}
