//! Receiving damaged frames: truncation, bit errors, undecodable headers.

use anyhow::Result;
use chunkstack_core::{Bits, Chunk, ChunkIterator, PeekFlags};

use crate::*;

fn wire_frame() -> Result<Vec<u8>> {
    let link = LinkHeader {
        destination: 2,
        source: 1,
        ether_type: 0x0800,
    };
    let frame = encapsulate(&payload(32), NetworkHeader::new(32, 17), link)?;
    Ok(frame.to_bytes()?.to_vec())
}

fn after_link_header() -> ChunkIterator {
    ChunkIterator::forward(Bits::from_bytes(10))
}

/// A frame cut off inside the network header still yields a header, marked
/// as the truncated stand-in it is.
#[test]
fn truncated_header_is_flagged_not_fatal() {
    init_tracing();
    let result = (|| -> Result<()> {
        let wire = wire_frame()?;
        let received = Chunk::bytes(wire[..12].to_vec()).into_shared();

        assert!(received.peek_fields::<LinkHeader>(&front(), None, strict()).is_ok());

        let strict_peek = received.peek_fields::<NetworkHeader>(&after_link_header(), None, strict());
        assert!(strict_peek.unwrap_err().is_usage());

        let header = received.peek_fields::<NetworkHeader>(&after_link_header(), None, PeekFlags::ALLOW_ALL)?;
        assert!(header.is_incomplete());
        assert!(header.is_improperly_represented());
        assert_eq!(header.chunk_length(), Bits::from_bytes(2));
        assert_eq!(header.fields::<NetworkHeader>().map(|h| h.ttl), Some(32));
        Ok(())
    })();
    result.unwrap();
}

/// A corrupted checksum surfaces as an incorrect header.
#[test]
fn bad_checksum_marks_header_incorrect() {
    init_tracing();
    let result = (|| -> Result<()> {
        let mut wire = wire_frame()?;
        wire[11] ^= 0x01;
        let received = Chunk::bytes(wire).into_shared();

        let strict_peek = received.peek_fields::<NetworkHeader>(&after_link_header(), None, strict());
        assert!(strict_peek.unwrap_err().is_usage());

        let header = received.peek_fields::<NetworkHeader>(&after_link_header(), None, PeekFlags::ALLOW_INCORRECT)?;
        assert!(header.is_incorrect());
        assert!(header.is_complete());
        assert!(header.is_properly_represented());
        Ok(())
    })();
    result.unwrap();
}

/// The physical layer marks a whole reception as incorrect; every view of
/// it inherits the mark.
#[test]
fn reception_errors_propagate_to_every_view() {
    init_tracing();
    let result = (|| -> Result<()> {
        let mut received = Chunk::bytes(wire_frame()?);
        received.mark_incorrect()?;
        let received = received.into_shared();

        assert!(received.peek_fields::<LinkHeader>(&front(), None, strict()).is_err());
        let link = received.peek_fields::<LinkHeader>(&front(), None, PeekFlags::ALLOW_INCORRECT)?;
        assert!(link.is_incorrect());

        let body = received.with_removed_at_front(Bits::from_bytes(14))?;
        assert!(body.is_incorrect());

        let slice = Chunk::slice(received.clone(), Bits::new(3), Bits::new(17))?;
        assert!(slice.is_incorrect());
        Ok(())
    })();
    result.unwrap();
}

/// A header whose length field is zero cannot be represented faithfully.
#[test]
fn undecodable_length_is_improperly_represented() {
    init_tracing();
    let result = (|| -> Result<()> {
        let (first, ttl, protocol) = (0x40u8, 9u8, 6u8);
        let received = Chunk::bytes(vec![first, ttl, protocol, first ^ ttl ^ protocol]).into_shared();

        assert!(received.peek_fields::<NetworkHeader>(&front(), None, strict()).is_err());
        let header = received.peek_fields::<NetworkHeader>(&front(), None, PeekFlags::ALLOW_IMPROPERLY_REPRESENTED)?;
        assert!(header.is_improperly_represented());
        assert!(header.is_complete());
        assert!(header.contains_same_data(&received));
        Ok(())
    })();
    result.unwrap();
}

/// A fixed-size peek that the header does not fill keeps the whole region.
#[test]
fn oversized_region_keeps_its_wire_form() {
    init_tracing();
    let result = (|| -> Result<()> {
        let wire = wire_frame()?;
        let received = Chunk::bytes(wire).into_shared();
        let header = received.peek_fields::<NetworkHeader>(
            &after_link_header(),
            Some(Bits::from_bytes(6)),
            PeekFlags::ALLOW_IMPROPERLY_REPRESENTED,
        )?;
        assert!(header.is_improperly_represented());
        assert_eq!(header.chunk_length(), Bits::from_bytes(6));

        let region = received.peek_bytes(&after_link_header(), Some(Bits::from_bytes(6)), strict())?;
        assert!(header.contains_same_data(&region));
        Ok(())
    })();
    result.unwrap();
}
