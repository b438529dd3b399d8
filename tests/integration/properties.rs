//! Representation-independence properties over random content.

use chunkstack_core::{Bits, BitsChunk, Chunk, ChunkIterator, PeekFlags, SerializedBytes, SliceChunk};
use proptest::prelude::*;

/// Random bytes with a random bit region inside them.
fn region() -> impl Strategy<Value = (Vec<u8>, u64, u64)> {
    prop::collection::vec(any::<u8>(), 1..48).prop_flat_map(|data| {
        let bits = data.len() as u64 * 8;
        (Just(data), 0..=bits).prop_flat_map(move |(data, offset)| (Just(data), Just(offset), 0..=bits - offset))
    })
}

fn as_bits(data: &[u8]) -> Chunk {
    Chunk::Bits(BitsChunk::from_serialized(&SerializedBytes::from_bytes(data.to_vec())))
}

proptest! {
    #[test]
    fn slice_reads_its_target_region((data, offset, length) in region()) {
        let target = Chunk::bytes(data).into_shared();
        let slice = Chunk::slice(target.clone(), Bits::new(offset), Bits::new(length)).unwrap();
        let direct = target
            .peek_bits(&ChunkIterator::forward(Bits::new(offset)), Some(Bits::new(length)), PeekFlags::ALLOW_EMPTY)
            .unwrap();
        prop_assert_eq!(slice.serialize_bits().unwrap(), direct.serialize_bits().unwrap());
    }

    #[test]
    fn slicing_is_associative((data, offset, length) in region(), inner in 0u64..=1024, inner_length in 0u64..=1024) {
        let inner_offset = inner % (length + 1);
        let inner_length = inner_length % (length - inner_offset + 1);
        let target = Chunk::bytes(data).into_shared();

        let outer = Chunk::slice(target.clone(), Bits::new(offset), Bits::new(length)).unwrap().into_shared();
        let nested = SliceChunk::convert_chunk(None, &outer, Bits::new(inner_offset), Bits::new(inner_length)).unwrap();
        let direct = Chunk::slice(target, Bits::new(offset + inner_offset), Bits::new(inner_length)).unwrap();

        prop_assert!(nested.contains_same_data(&direct));
        prop_assert!(nested.nesting_depth() <= 1);
    }

    #[test]
    fn same_data_ignores_representation(data in prop::collection::vec(any::<u8>(), 1..48), split in 0usize..48) {
        let split = split % (data.len() + 1);
        let bytes = Chunk::bytes(data.clone());
        let bits = as_bits(&data);
        let mixed = Chunk::sequence([
            as_bits(&data[..split]).into_shared(),
            Chunk::bytes(data[split..].to_vec()).into_shared(),
        ])
        .unwrap();

        for (a, b) in [(&bytes, &bits), (&bytes, &mixed), (&bits, &mixed)] {
            prop_assert!(a.contains_same_data(b));
            prop_assert!(b.contains_same_data(a));
        }
        prop_assert!(mixed.contains_same_data(&mixed));
    }

    #[test]
    fn removing_from_a_sequence_matches_peeking_the_rest((data, offset, _length) in region(), split in 0usize..48) {
        let split = split % (data.len() + 1);
        let sequence = Chunk::sequence([
            as_bits(&data[..split]).into_shared(),
            Chunk::bytes(data[split..].to_vec()).into_shared(),
        ])
        .unwrap()
        .into_shared();

        let trimmed = sequence.with_removed_at_front(Bits::new(offset)).unwrap();
        let rest = sequence
            .peek_bits(&ChunkIterator::forward(Bits::new(offset)), None, PeekFlags::ALLOW_EMPTY)
            .unwrap();
        prop_assert_eq!(trimmed.serialize_bits().unwrap(), rest.serialize_bits().unwrap());
    }
}
