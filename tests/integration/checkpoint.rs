//! Packing frames in transit and restoring them, plus config files.

use anyhow::Result;
use chunkstack_core::{Bits, Chunk, ChunkConfig, ChunkType, FieldsRegistry, PackError, PeekFlags};

use crate::*;

fn registry() -> FieldsRegistry {
    let mut registry = FieldsRegistry::new();
    registry
        .register::<LinkHeader>()
        .register::<NetworkHeader>()
        .register::<FcsTrailer>();
    registry
}

#[test]
fn frame_in_transit_restores_bit_for_bit() {
    init_tracing();
    let result = (|| -> Result<()> {
        let link = LinkHeader {
            destination: 7,
            source: 8,
            ether_type: 0x86dd,
        };
        let frame = encapsulate(&payload(48), NetworkHeader::new(5, 58), link)?;
        let buffer = frame.pack()?;

        let restored = Chunk::unpack(&buffer, &registry())?;
        assert_eq!(restored.serialize_bits()?, frame.serialize_bits()?);
        assert_eq!(restored.flags(), frame.flags());

        let original_types: Vec<ChunkType> =
            frame.as_sequence().unwrap().chunks().iter().map(|c| c.chunk_type()).collect();
        let restored_elements = restored.as_sequence().expect("frame is a sequence").chunks();
        let restored_types: Vec<ChunkType> = restored_elements.iter().map(|c| c.chunk_type()).collect();
        assert_eq!(restored_types, original_types);

        let header = &restored_elements[0];
        assert!(header.as_fields_chunk().and_then(|c| c.serialized_bytes()).is_some());
        assert_eq!(header.fields::<LinkHeader>().map(|h| h.ether_type), Some(0x86dd));
        Ok(())
    })();
    result.unwrap();
}

#[test]
fn truncated_reception_restores_with_its_flags() {
    init_tracing();
    let result = (|| -> Result<()> {
        let received = Chunk::bytes(vec![0x45, 0x01]).into_shared();
        let header = received.peek_fields::<NetworkHeader>(&front(), None, PeekFlags::ALLOW_ALL)?;

        let restored = Chunk::unpack(&header.pack()?, &registry())?;
        assert!(restored.is_incomplete());
        assert!(restored.is_improperly_represented());
        assert_eq!(restored.chunk_length(), Bits::from_bytes(2));
        assert!(restored.contains_same_data(&received));
        Ok(())
    })();
    result.unwrap();
}

#[test]
fn restoring_needs_every_fields_type() {
    init_tracing();
    let frame = encapsulate(
        &payload(8),
        NetworkHeader::new(1, 1),
        LinkHeader {
            destination: 0,
            source: 0,
            ether_type: 0,
        },
    )
    .unwrap();
    let mut partial = FieldsRegistry::new();
    partial.register::<LinkHeader>();

    let err = Chunk::unpack(&frame.pack().unwrap(), &partial).unwrap_err();
    assert!(matches!(err, PackError::UnknownFieldsType(_)));
    assert!(err.to_string().contains("network-header"));
}

#[test]
fn config_file_round_trips() {
    let dir = std::env::temp_dir().join(format!("chunkstack-integration-{}", std::process::id()));
    std::fs::create_dir_all(&dir).unwrap();
    let path = dir.join("config.toml");

    std::fs::write(&path, "implicit_serialization = false\nmax_nesting_depth = 8\n").unwrap();
    let config = ChunkConfig::load_from(&path).unwrap();
    assert!(!config.implicit_serialization);
    assert_eq!(config.max_nesting_depth, 8);

    let copy = dir.join("copy").join("config.toml");
    config.save_to(&copy).unwrap();
    assert_eq!(ChunkConfig::load_from(&copy).unwrap(), config);
    assert!(config.to_toml().unwrap().contains("max_nesting_depth = 8"));

    let _ = std::fs::remove_dir_all(&dir);
}
