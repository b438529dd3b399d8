//! chunkstack integration test harness.
//!
//! Tests here drive the chunk model the way protocol layers do: a sender
//! encapsulates a payload layer by layer, a receiver peels headers off a
//! frame, routers forward content without copying it, and a checkpoint
//! packs frames in transit and restores them.
//!
//!   cargo test --test integration
//!
//! Set RUST_LOG=chunkstack_core=trace to see conversions and cache activity.

mod checkpoint;
mod corruption;
mod layering;
mod properties;

use std::sync::Once;

use chunkstack_core::{
    Bits, Chunk, ChunkIterator, Fields, InputStream, OutputStream, PeekFlags, SharedChunk,
};

// ── Harness ───────────────────────────────────────────────────────────────────

static TRACING: Once = Once::new();

/// Route chunk-model logs to the test output. Safe to call from every test.
pub fn init_tracing() {
    TRACING.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    });
}

pub fn payload(len: usize) -> SharedChunk {
    Chunk::bytes((0..len).map(|i| (i % 251) as u8).collect::<Vec<u8>>()).into_shared()
}

pub fn front() -> ChunkIterator {
    ChunkIterator::forward(Bits::ZERO)
}

pub fn strict() -> PeekFlags {
    PeekFlags::empty()
}

// ── Sample protocol ───────────────────────────────────────────────────────────

/// Link-layer header: 32-bit destination, 32-bit source, 16-bit type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkHeader {
    pub destination: u32,
    pub source: u32,
    pub ether_type: u16,
}

impl Fields for LinkHeader {
    const TYPE_NAME: &'static str = "link-header";

    fn chunk_length(&self) -> Bits {
        Bits::from_bytes(10)
    }

    fn serialize(&self, stream: &mut OutputStream) {
        stream.write_u32_be(self.destination);
        stream.write_u32_be(self.source);
        stream.write_u16_be(self.ether_type);
    }

    fn deserialize(stream: &mut InputStream) -> Self {
        Self {
            destination: stream.read_u32_be(),
            source: stream.read_u32_be(),
            ether_type: stream.read_u16_be(),
        }
    }
}

/// Frame check trailer: XOR of every byte it protects, stored as one byte.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FcsTrailer {
    pub fcs: u8,
}

impl FcsTrailer {
    pub fn over(content: &[u8]) -> Self {
        Self {
            fcs: content.iter().fold(0, |acc, b| acc ^ b),
        }
    }
}

impl Fields for FcsTrailer {
    const TYPE_NAME: &'static str = "fcs-trailer";

    fn chunk_length(&self) -> Bits {
        Bits::from_bytes(1)
    }

    fn serialize(&self, stream: &mut OutputStream) {
        stream.write_byte(self.fcs);
    }

    fn deserialize(stream: &mut InputStream) -> Self {
        Self {
            fcs: stream.read_byte(),
        }
    }
}

/// Network header with a variable-length option area.
///
/// Layout: 4-bit version, 4-bit header length in 32-bit words, 8-bit ttl,
/// 8-bit protocol, 8-bit checksum (XOR of the preceding three bytes), then
/// `4 * (words - 1)` option bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NetworkHeader {
    pub version: u8,
    pub ttl: u8,
    pub protocol: u8,
    pub options: Vec<u8>,
}

impl NetworkHeader {
    pub fn new(ttl: u8, protocol: u8) -> Self {
        Self {
            version: 4,
            ttl,
            protocol,
            options: Vec::new(),
        }
    }

    fn words(&self) -> u8 {
        1 + self.options.len().div_ceil(4) as u8
    }

    fn checksum(first: u8, ttl: u8, protocol: u8) -> u8 {
        first ^ ttl ^ protocol
    }
}

impl Fields for NetworkHeader {
    const TYPE_NAME: &'static str = "network-header";

    fn chunk_length(&self) -> Bits {
        Bits::from_bytes(4 * u64::from(self.words()))
    }

    fn serialize(&self, stream: &mut OutputStream) {
        let first = (self.version << 4) | self.words();
        stream.write_byte(first);
        stream.write_byte(self.ttl);
        stream.write_byte(self.protocol);
        stream.write_byte(Self::checksum(first, self.ttl, self.protocol));
        stream.write_bytes(&self.options);
        let padding = (4 - self.options.len() % 4) % 4;
        stream.write_byte_repeatedly(0, padding as u64);
    }

    fn deserialize(stream: &mut InputStream) -> Self {
        let first = stream.read_byte();
        let ttl = stream.read_byte();
        let protocol = stream.read_byte();
        let checksum = stream.read_byte();
        if checksum != Self::checksum(first, ttl, protocol) {
            stream.mark_incorrect();
        }
        let words = first & 0x0f;
        if words == 0 {
            stream.mark_improperly_represented();
        }
        let options = stream.read_bytes(4 * usize::from(words.saturating_sub(1)));
        Self {
            version: first >> 4,
            ttl,
            protocol,
            options,
        }
    }
}

/// Sender side: payload → network header → link header + trailer.
pub fn encapsulate(payload: &SharedChunk, network: NetworkHeader, link: LinkHeader) -> anyhow::Result<SharedChunk> {
    let datagram = payload.with_inserted_at_front(Chunk::from_fields(network).into_shared())?;
    let framed = datagram.with_inserted_at_front(Chunk::from_fields(link).into_shared())?;
    let trailer = FcsTrailer::over(&framed.to_bytes()?);
    Ok(framed.with_inserted_at_back(Chunk::from_fields(trailer).into_shared())?)
}
