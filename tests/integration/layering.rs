use anyhow::Result;
use chunkstack_core::{Bits, Chunk, ChunkIterator, ChunkType, SharedChunk, SliceChunk};

use crate::*;

fn link() -> LinkHeader {
    LinkHeader {
        destination: 0x0a00_0002,
        source: 0x0a00_0001,
        ether_type: 0x0800,
    }
}

fn network_with_options() -> NetworkHeader {
    NetworkHeader {
        options: vec![0xde, 0xad, 0xbe, 0xef],
        ..NetworkHeader::new(64, 17)
    }
}

/// Build a frame, then take it apart again the way a receiving stack does.
#[test]
fn receiver_peels_what_the_sender_built() {
    init_tracing();
    let result = (|| -> Result<()> {
        let data = payload(100);
        let frame = encapsulate(&data, NetworkHeader::new(64, 17), link())?;
        assert_eq!(frame.chunk_length(), Bits::from_bytes(10 + 4 + 100 + 1));

        let link_header = frame.peek_fields::<LinkHeader>(&front(), None, strict())?;
        assert_eq!(link_header.fields::<LinkHeader>(), Some(&link()));

        let trailer = frame.peek_fields::<FcsTrailer>(
            &ChunkIterator::backward(Bits::ZERO),
            Some(Bits::from_bytes(1)),
            strict(),
        )?;
        let protected = frame.with_removed_at_back(trailer.chunk_length())?;
        assert_eq!(
            trailer.fields::<FcsTrailer>(),
            Some(&FcsTrailer::over(&protected.to_bytes()?))
        );

        let datagram = protected.with_removed_at_front(link_header.chunk_length())?;
        let network = datagram.peek_fields::<NetworkHeader>(&front(), None, strict())?;
        assert_eq!(network.fields::<NetworkHeader>().map(|h| h.ttl), Some(64));

        let body = datagram.with_removed_at_front(network.chunk_length())?;
        assert!(body.ptr_eq(&data), "payload should come back unchanged and uncopied");
        Ok(())
    })();
    result.unwrap();
}

/// A frame received as raw bytes is decoded header by header.
#[test]
fn raw_frame_is_decoded_in_place() {
    init_tracing();
    let result = (|| -> Result<()> {
        let data = payload(64);
        let frame = encapsulate(&data, network_with_options(), link())?;
        let received = Chunk::bytes(frame.to_bytes()?).into_shared();

        let mut iterator = front();
        let link_header = received.peek_fields::<LinkHeader>(&iterator, None, strict())?;
        assert_eq!(link_header.fields::<LinkHeader>(), Some(&link()));
        iterator.move_by(&received, link_header.chunk_length());

        let network = received.peek_fields::<NetworkHeader>(&iterator, None, strict())?;
        assert_eq!(network.chunk_length(), Bits::from_bytes(8));
        assert_eq!(network.fields::<NetworkHeader>(), Some(&network_with_options()));
        iterator.move_by(&received, network.chunk_length());

        let body = received.peek_bytes(&iterator, Some(Bits::from_bytes(64)), strict())?;
        assert!(body.contains_same_data(&data));
        assert_eq!(body.chunk_type(), ChunkType::Bytes);
        Ok(())
    })();
    result.unwrap();
}

/// A router rewrites one header field and forwards the payload by reference.
#[test]
fn router_forwards_payload_without_copying() {
    init_tracing();
    let result = (|| -> Result<()> {
        let data = payload(1500);
        let frame = encapsulate(&data, NetworkHeader::new(64, 6), link())?;
        let datagram = frame
            .with_removed_at_front(Bits::from_bytes(10))?
            .with_removed_at_back(Bits::from_bytes(1))?;

        let header = datagram.peek_fields::<NetworkHeader>(&front(), None, strict())?;
        assert!(header.as_fields_chunk().and_then(|c| c.serialized_bytes()).is_some());

        let mut next_hop = header.dup();
        next_hop
            .as_fields_chunk_mut()
            .expect("network header is a fields chunk")
            .with_fields_mut(|h: &mut NetworkHeader| h.ttl -= 1)?;
        assert!(next_hop.as_fields_chunk().and_then(|c| c.serialized_bytes()).is_none());

        let body = datagram.with_removed_at_front(header.chunk_length())?;
        let forwarded = body.with_inserted_at_front(next_hop.into_shared())?;

        let elements = forwarded.as_sequence().expect("header and payload").chunks();
        assert!(elements[1].ptr_eq(&data));
        assert_eq!(front_ttl(&forwarded), Some(63));
        assert_eq!(header.fields::<NetworkHeader>().map(|h| h.ttl), Some(64));
        Ok(())
    })();
    result.unwrap();
}

fn front_ttl(chunk: &SharedChunk) -> Option<u8> {
    chunk
        .peek_fields::<NetworkHeader>(&front(), None, strict())
        .ok()
        .and_then(|h| h.fields::<NetworkHeader>().map(|h| h.ttl))
}

/// Fragments taken as slices reassemble into the very chunk they came from.
#[test]
fn fragments_reassemble_into_the_original_payload() {
    init_tracing();
    let result = (|| -> Result<()> {
        let data = payload(300);
        let fragments = (0..3)
            .map(|i| {
                data.peek_as::<SliceChunk>(
                    &ChunkIterator::forward(Bits::from_bytes(100 * i)),
                    Some(Bits::from_bytes(100)),
                    strict(),
                )
            })
            .collect::<Result<Vec<_>, _>>()?;
        assert!(fragments.iter().all(|f| f.chunk_type() == ChunkType::Slice));

        let reassembled = Chunk::sequence(fragments)?.into_shared().simplify();
        assert!(reassembled.ptr_eq(&data));
        Ok(())
    })();
    result.unwrap();
}

/// Growing a chunk never changes what other holders see.
#[test]
fn edits_leave_other_holders_untouched() {
    init_tracing();
    let result = (|| -> Result<()> {
        let data = payload(16);
        let holder = data.clone();
        let grown = data.with_inserted_at_back(payload(4))?;
        let shrunk = data.with_removed_at_front(Bits::from_bytes(8))?;

        assert_eq!(grown.chunk_length(), Bits::from_bytes(20));
        assert_eq!(shrunk.chunk_length(), Bits::from_bytes(8));
        assert_eq!(holder.chunk_length(), Bits::from_bytes(16));
        assert!(holder.contains_same_data(&payload(16)));
        Ok(())
    })();
    result.unwrap();
}
