use flate2::write::GzEncoder;
use flate2::Compression;
use std::io::Write;

use quartz_nbt::NbtTag;
use voxelbridge::{
    decode_subchunk, encode_subchunk, encode_subchunk_network, BlockEntity, Chunk, Registry,
    SerializedChunk, SubChunk, Translator, AIR_RTID,
};

const CATALOG: &str = r#"
minecraft:air 0
minecraft:bedrock 0
minecraft:stone 0
minecraft:dirt 0
minecraft:grass 0
minecraft:water[liquid_depth=0] 0
minecraft:oak_log[axis="y"] 0
minecraft:oak_log[axis="x"] 1
minecraft:chest[facing=2] 0
"#;

fn seeded() -> (Registry, Translator) {
    let registry = Registry::from_catalog(CATALOG).unwrap();
    let translator = Translator::new();
    registry.seed_translator(&translator);
    (registry, translator)
}

fn rtid(registry: &Registry, text: &str) -> u32 {
    let state = voxelbridge::BlockState::parse_strict(text).unwrap();
    registry.state_to_rtid(&state.name, &state.props).unwrap()
}

#[test]
fn uniform_air_sub_chunk_has_minimal_shape() {
    let (registry, translator) = seeded();
    let sub = SubChunk::empty(0);

    let bytes = encode_subchunk(&sub, &registry).unwrap();
    // Version 8, one storage, header 0 (width 0, disk), then one NBT entry.
    assert_eq!(&bytes[..3], &[8, 1, 0]);
    assert_eq!(bytes[3], 0x0A);

    let decoded = decode_subchunk(&bytes, &translator).unwrap();
    assert_eq!(decoded.layer(0).unwrap().palette().bits(), 0);
    assert_eq!(decoded.layer(0).unwrap().palette().len(), 1);
    for (x, y, z) in [(0, 0, 0), (15, 15, 15), (7, 3, 12)] {
        assert_eq!(decoded.block(x, y, z, 0), AIR_RTID);
    }
}

#[test]
fn two_distinct_ids_pick_one_bit_and_128_words() {
    let (registry, translator) = seeded();
    let dirt = rtid(&registry, "dirt");

    let mut minimal = SubChunk::empty(0);
    let layer = minimal.layer_mut(0).unwrap();
    for i in 0..4096 {
        layer.set(i, if i < 2048 { AIR_RTID } else { dirt });
    }
    assert_eq!(layer.palette().len(), 2);
    assert_eq!(layer.palette().bits(), 1);
    assert_eq!(layer.words().len(), 128);

    let bytes = encode_subchunk(&minimal, &registry).unwrap();
    assert_eq!(bytes[2], 1 << 1);
    assert_eq!(
        u32::from_le_bytes([bytes[3], bytes[4], bytes[5], bytes[6]]),
        2
    );
    // 128 packed words follow the count.
    let nbt_start = 7 + 128 * 4;
    assert_eq!(bytes[nbt_start], 0x0A);

    let decoded = decode_subchunk(&bytes, &translator).unwrap();
    assert_eq!(decoded, minimal);
}

#[test]
fn sub_chunk_round_trip_is_stable_under_reencode() {
    let (registry, translator) = seeded();
    let ids = [
        rtid(&registry, "bedrock"),
        rtid(&registry, "stone"),
        rtid(&registry, "dirt"),
        rtid(&registry, "grass"),
        rtid(&registry, r#"oak_log[axis="y"]"#),
        rtid(&registry, r#"oak_log[axis="x"]"#),
    ];

    let mut sub = SubChunk::empty(2);
    for x in 0..16u8 {
        for z in 0..16u8 {
            for y in 0..16u8 {
                let id = ids[(x as usize + z as usize * 3 + y as usize * 7) % ids.len()];
                sub.set_block(x, y, z, 0, id);
            }
        }
    }

    let first = encode_subchunk(&sub, &registry).unwrap();
    let decoded = decode_subchunk(&first, &translator).unwrap();
    let second = encode_subchunk(&decoded, &registry).unwrap();
    assert_eq!(first, second);
    assert_eq!(decoded.storages(), sub.storages());
}

#[test]
fn waterlogged_layer_survives_the_disk_format() {
    let (registry, translator) = seeded();
    let log = rtid(&registry, r#"oak_log[axis="y"]"#);
    let water = rtid(&registry, "water[liquid_depth=0]");

    let mut sub = SubChunk::empty(0);
    for y in 0..4u8 {
        sub.set_block(8, y, 8, 0, log);
        sub.set_block(8, y, 8, 1, water);
    }

    let bytes = encode_subchunk(&sub, &registry).unwrap();
    assert_eq!(bytes[1], 2);

    let decoded = decode_subchunk(&bytes, &translator).unwrap();
    assert_eq!(decoded.block(8, 2, 8, 0), log);
    assert_eq!(decoded.block(8, 2, 8, 1), water);
    assert_eq!(decoded.block(8, 9, 8, 1), AIR_RTID);
}

#[test]
fn chunk_level_round_trip_with_sidecar() {
    let (registry, translator) = seeded();
    let bedrock = rtid(&registry, "bedrock");
    let chest = rtid(&registry, "chest[facing=2]");

    let mut chunk = Chunk::new(6);
    for x in 0..16u8 {
        for z in 0..16u8 {
            chunk.sub_chunk_mut(0).set_block(x, 0, z, 0, bedrock);
        }
    }
    chunk.sub_chunk_mut(2).set_block(4, 1, 9, 0, chest);
    chunk.add_block_entity(
        BlockEntity::new("Chest", (4, 33, 9))
            .with_field("CustomName", NbtTag::String("supplies".to_string())),
    );

    let serialized = chunk.encode(&registry).unwrap();
    assert_eq!(serialized.sub_chunks.len(), 6);
    assert!(serialized.sub_chunks[1].is_empty());
    assert!(serialized.sub_chunks[5].is_empty());

    let decoded = Chunk::decode(&serialized, &translator).unwrap();
    assert_eq!(decoded.sub_chunk(0).unwrap().block(3, 0, 3, 0), bedrock);
    assert_eq!(decoded.sub_chunk(2).unwrap().block(4, 1, 9, 0), chest);
    assert!(decoded.sub_chunk(1).is_none());

    let entities = decoded.block_entities();
    assert_eq!(entities.len(), 1);
    assert_eq!(entities[0].id, "Chest");
    assert_eq!(
        entities[0].nbt.get::<_, &str>("CustomName").unwrap(),
        "supplies"
    );

    assert_eq!(decoded.encode(&registry).unwrap(), serialized);
}

#[test]
fn decoding_foreign_palette_entries_degrades_to_air() {
    let (registry, _) = seeded();
    let stone = rtid(&registry, "stone");
    let mut sub = SubChunk::empty(0);
    sub.layer_mut(0).unwrap().set(0, stone);
    let bytes = encode_subchunk(&sub, &registry).unwrap();

    // A translator from a different (smaller) catalog knows none of these
    // states; the sub-chunk still decodes, every entry as air.
    let foreign = Translator::new();
    let decoded = decode_subchunk(&bytes, &foreign).unwrap();
    assert_eq!(decoded.layer(0).unwrap().get(0), AIR_RTID);
}

#[test]
fn network_and_disk_encodings_carry_the_same_volume() {
    let (registry, translator) = seeded();
    let stone = rtid(&registry, "stone");
    let grass = rtid(&registry, "grass");

    let mut sub = SubChunk::empty(0);
    for i in 0..4096 {
        sub.layer_mut(0)
            .unwrap()
            .set(i, if i % 3 == 0 { stone } else { grass });
    }

    let disk = encode_subchunk(&sub, &registry).unwrap();
    let network = encode_subchunk_network(&sub);
    assert_ne!(disk, network);

    let from_disk = decode_subchunk(&disk, &translator).unwrap();
    let from_network = decode_subchunk(&network, &translator).unwrap();
    assert_eq!(from_disk, from_network);
}

#[test]
fn startup_flow_from_gzip_catalog() {
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(CATALOG.as_bytes()).unwrap();
    let compressed = encoder.finish().unwrap();

    let registry = Registry::from_catalog_gz(&compressed).unwrap();
    let translator = Translator::new();
    registry.seed_translator(&translator);

    let stone = rtid(&registry, "stone");
    let mut chunk = Chunk::new(1);
    chunk.sub_chunk_mut(0).set_block(1, 2, 3, 0, stone);

    let serialized = chunk.encode(&registry).unwrap();
    let decoded = Chunk::decode(&serialized, &translator).unwrap();
    assert_eq!(decoded.sub_chunk(0).unwrap().block(1, 2, 3, 0), stone);
}

#[test]
fn empty_serialized_chunk_decodes_empty() {
    let translator = Translator::new();
    let decoded = Chunk::decode(&SerializedChunk::default(), &translator).unwrap();
    assert_eq!(decoded.sub_chunk_count(), 0);
    assert!(decoded.block_entities().is_empty());
}
