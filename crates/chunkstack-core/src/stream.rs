//! Bit-level memory streams used by serializers and deserializers.
//!
//! Bits are written and read most-significant first. Padding bits after the
//! last valid bit of a buffer are always zero, so two buffers holding the
//! same bits compare equal byte for byte.

use bytes::Bytes;

use crate::flags::ChunkFlags;
use crate::units::Bits;

// ── Serialized Bytes ──────────────────────────────────────────────────────────

/// An immutable bit buffer: byte storage plus the exact number of valid bits.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SerializedBytes {
    data: Bytes,
    length: Bits,
}

impl SerializedBytes {
    /// Wraps whole bytes; the length is `8 * data.len()`.
    pub fn from_bytes(data: impl Into<Bytes>) -> Self {
        let data = data.into();
        let length = Bits::from_bytes(data.len() as u64);
        Self { data, length }
    }

    /// Wraps `length` bits of `data`. Bytes beyond the length are dropped
    /// and padding bits in the last byte are cleared.
    pub fn from_bits(data: impl Into<Bytes>, length: Bits) -> Self {
        let data = data.into();
        let mut output = OutputStream::with_capacity(length);
        output.write_bit_range(&data, Bits::ZERO, length.min(Bits::from_bytes(data.len() as u64)));
        output.into_serialized()
    }

    pub fn data(&self) -> &Bytes {
        &self.data
    }

    pub fn length(&self) -> Bits {
        self.length
    }

    pub fn bit(&self, index: Bits) -> bool {
        read_bit_at(&self.data, index)
    }

    /// The first `length` bits as a new buffer, sharing storage when the cut
    /// is byte aligned.
    pub fn prefix(&self, length: Bits) -> SerializedBytes {
        let length = length.min(self.length);
        if length.is_byte_aligned() {
            SerializedBytes {
                data: self.data.slice(..length.byte_len()),
                length,
            }
        } else {
            SerializedBytes::from_bits(self.data.clone(), length)
        }
    }
}

fn read_bit_at(data: &[u8], index: Bits) -> bool {
    let position = index.get();
    let byte = data[(position / 8) as usize];
    byte & (0x80 >> (position % 8)) != 0
}

// ── Output Stream ─────────────────────────────────────────────────────────────

/// Growable bit writer.
#[derive(Debug, Clone, Default)]
pub struct OutputStream {
    data: Vec<u8>,
    length: Bits,
}

impl OutputStream {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(length: Bits) -> Self {
        Self {
            data: Vec::with_capacity(length.byte_len()),
            length: Bits::ZERO,
        }
    }

    pub fn length(&self) -> Bits {
        self.length
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn write_bit(&mut self, bit: bool) {
        let position = self.length.get();
        if position % 8 == 0 {
            self.data.push(0);
        }
        if bit {
            let last = self.data.len() - 1;
            self.data[last] |= 0x80 >> (position % 8);
        }
        self.length += Bits::new(1);
    }

    /// Writes the low `width` bits of `value`, most significant first.
    pub fn write_bits(&mut self, value: u64, width: u8) {
        debug_assert!(width <= 64);
        for shift in (0..width).rev() {
            self.write_bit((value >> shift) & 1 == 1);
        }
    }

    pub fn write_byte(&mut self, value: u8) {
        if self.length.is_byte_aligned() {
            self.data.push(value);
            self.length += Bits::from_bytes(1);
        } else {
            self.write_bits(u64::from(value), 8);
        }
    }

    pub fn write_bytes(&mut self, bytes: &[u8]) {
        if self.length.is_byte_aligned() {
            self.data.extend_from_slice(bytes);
            self.length += Bits::from_bytes(bytes.len() as u64);
        } else {
            for &byte in bytes {
                self.write_byte(byte);
            }
        }
    }

    pub fn write_byte_repeatedly(&mut self, value: u8, count: u64) {
        if self.length.is_byte_aligned() {
            self.data.resize(self.data.len() + count as usize, value);
            self.length += Bits::from_bytes(count);
        } else {
            for _ in 0..count {
                self.write_byte(value);
            }
        }
    }

    pub fn write_u16_be(&mut self, value: u16) {
        self.write_bytes(&value.to_be_bytes());
    }

    pub fn write_u32_be(&mut self, value: u32) {
        self.write_bytes(&value.to_be_bytes());
    }

    pub fn write_u64_be(&mut self, value: u64) {
        self.write_bytes(&value.to_be_bytes());
    }

    /// Copies bits `[offset, offset + length)` of `data`.
    pub fn write_bit_range(&mut self, data: &[u8], offset: Bits, length: Bits) {
        if offset.is_byte_aligned() && length.is_byte_aligned() {
            let start = offset.bytes() as usize;
            let end = start + length.bytes() as usize;
            self.write_bytes(&data[start..end]);
        } else {
            let mut index = offset;
            let end = offset + length;
            while index < end {
                self.write_bit(read_bit_at(data, index));
                index += Bits::new(1);
            }
        }
    }

    pub fn into_serialized(self) -> SerializedBytes {
        SerializedBytes {
            data: Bytes::from(self.data),
            length: self.length,
        }
    }
}

// ── Input Stream ──────────────────────────────────────────────────────────────

/// Bit reader over a serialized buffer.
///
/// Reading past the end never fails: it yields zero bits, leaves the
/// position at the end of the data and records that the read went beyond
/// the end. Deserializers can also record that what they decoded is
/// incorrect or only a best-effort stand-in.
#[derive(Debug, Clone)]
pub struct InputStream {
    data: Bytes,
    length: Bits,
    position: Bits,
    read_beyond_end: bool,
    decode_flags: ChunkFlags,
}

impl InputStream {
    pub fn new(serialized: SerializedBytes) -> Self {
        Self {
            data: serialized.data,
            length: serialized.length,
            position: Bits::ZERO,
            read_beyond_end: false,
            decode_flags: ChunkFlags::empty(),
        }
    }

    pub fn from_bytes(data: impl Into<Bytes>) -> Self {
        Self::new(SerializedBytes::from_bytes(data))
    }

    pub fn length(&self) -> Bits {
        self.length
    }

    pub fn position(&self) -> Bits {
        self.position
    }

    pub fn remaining(&self) -> Bits {
        self.length - self.position
    }

    pub fn is_read_beyond_end(&self) -> bool {
        self.read_beyond_end
    }

    /// The decoded content violates the protocol (bad checksum, reserved
    /// value, ...).
    pub fn mark_incorrect(&mut self) {
        self.decode_flags.insert(ChunkFlags::INCORRECT);
    }

    /// The decoded content is only a stand-in for data that could not be
    /// interpreted with the requested layout.
    pub fn mark_improperly_represented(&mut self) {
        self.decode_flags.insert(ChunkFlags::IMPROPERLY_REPRESENTED);
    }

    pub fn decode_flags(&self) -> ChunkFlags {
        self.decode_flags
    }

    pub fn read_bit(&mut self) -> bool {
        if self.position >= self.length {
            self.read_beyond_end = true;
            return false;
        }
        let bit = read_bit_at(&self.data, self.position);
        self.position += Bits::new(1);
        bit
    }

    pub fn read_bits(&mut self, width: u8) -> u64 {
        debug_assert!(width <= 64);
        let mut value = 0u64;
        for _ in 0..width {
            value = (value << 1) | u64::from(self.read_bit());
        }
        value
    }

    pub fn read_byte(&mut self) -> u8 {
        if self.position.is_byte_aligned() && self.remaining() >= Bits::from_bytes(1) {
            let byte = self.data[self.position.bytes() as usize];
            self.position += Bits::from_bytes(1);
            byte
        } else {
            self.read_bits(8) as u8
        }
    }

    pub fn read_bytes(&mut self, count: usize) -> Vec<u8> {
        (0..count).map(|_| self.read_byte()).collect()
    }

    pub fn read_u16_be(&mut self) -> u16 {
        self.read_bits(16) as u16
    }

    pub fn read_u32_be(&mut self) -> u32 {
        self.read_bits(32) as u32
    }

    pub fn read_u64_be(&mut self) -> u64 {
        self.read_bits(64)
    }

    /// The bits consumed so far, as a buffer sharing this stream's storage.
    pub fn consumed(&self) -> SerializedBytes {
        SerializedBytes {
            data: self.data.clone(),
            length: self.length,
        }
        .prefix(self.position)
    }
}
