//! Sample protocol headers for unit tests.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use crate::chunk::Fields;
use crate::stream::{InputStream, OutputStream};
use crate::units::Bits;

pub(crate) fn sample_bytes(count: usize) -> Vec<u8> {
    (0..count).map(|i| i as u8).collect()
}

/// 64-bit header: two 16-bit addresses and a 32-bit sequence number.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct TestHeader {
    pub source: u16,
    pub destination: u16,
    pub sequence: u32,
}

impl TestHeader {
    pub fn new(source: u16, destination: u16, sequence: u32) -> Self {
        Self {
            source,
            destination,
            sequence,
        }
    }
}

impl Fields for TestHeader {
    const TYPE_NAME: &'static str = "test-header";

    fn chunk_length(&self) -> Bits {
        Bits::new(64)
    }

    fn serialize(&self, stream: &mut OutputStream) {
        stream.write_u16_be(self.source);
        stream.write_u16_be(self.destination);
        stream.write_u32_be(self.sequence);
    }

    fn deserialize(stream: &mut InputStream) -> Self {
        Self {
            source: stream.read_u16_be(),
            destination: stream.read_u16_be(),
            sequence: stream.read_u32_be(),
        }
    }
}

/// 5-bit header: 3-bit version and 2-bit code.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct TinyHeader {
    pub version: u8,
    pub code: u8,
}

impl TinyHeader {
    pub fn new(version: u8, code: u8) -> Self {
        Self { version, code }
    }
}

impl Fields for TinyHeader {
    const TYPE_NAME: &'static str = "tiny-header";

    fn chunk_length(&self) -> Bits {
        Bits::new(5)
    }

    fn serialize(&self, stream: &mut OutputStream) {
        stream.write_bits(u64::from(self.version), 3);
        stream.write_bits(u64::from(self.code), 2);
    }

    fn deserialize(stream: &mut InputStream) -> Self {
        Self {
            version: stream.read_bits(3) as u8,
            code: stream.read_bits(2) as u8,
        }
    }
}

/// 32-bit header that counts how often it is encoded.
#[derive(Debug, Clone)]
pub(crate) struct CountingHeader {
    pub value: u32,
    encodes: Arc<AtomicUsize>,
}

impl CountingHeader {
    pub fn new(value: u32) -> Self {
        Self {
            value,
            encodes: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn encodes(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.encodes)
    }
}

impl Fields for CountingHeader {
    const TYPE_NAME: &'static str = "counting-header";

    fn chunk_length(&self) -> Bits {
        Bits::new(32)
    }

    fn serialize(&self, stream: &mut OutputStream) {
        self.encodes.fetch_add(1, Ordering::SeqCst);
        stream.write_u32_be(self.value);
    }

    fn deserialize(stream: &mut InputStream) -> Self {
        Self::new(stream.read_u32_be())
    }
}

/// 24-bit header whose last byte must be the XOR of the first two.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct ChecksummedHeader {
    pub payload: u16,
    pub checksum: u8,
}

impl Fields for ChecksummedHeader {
    const TYPE_NAME: &'static str = "checksummed-header";

    fn chunk_length(&self) -> Bits {
        Bits::new(24)
    }

    fn serialize(&self, stream: &mut OutputStream) {
        stream.write_u16_be(self.payload);
        stream.write_byte(self.checksum);
    }

    fn deserialize(stream: &mut InputStream) -> Self {
        let payload = stream.read_u16_be();
        let checksum = stream.read_byte();
        let [high, low] = payload.to_be_bytes();
        if checksum != high ^ low {
            stream.mark_incorrect();
        }
        Self { payload, checksum }
    }
}
