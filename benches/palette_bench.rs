use criterion::{black_box, criterion_group, criterion_main, Criterion};
use voxelbridge::{decode_subchunk, encode_subchunk, Registry, SubChunk, Translator};

// ── Helpers ──────────────────────────────────────────────────────────────────

const CATALOG: &str = r#"
minecraft:air 0
minecraft:stone 0
minecraft:dirt 0
minecraft:grass 0
minecraft:gravel 0
minecraft:sand 0
minecraft:sandstone 0
minecraft:oak_log[axis="y"] 0
"#;

fn seeded() -> (Registry, Translator) {
    let registry = Registry::from_catalog(CATALOG).unwrap();
    let translator = Translator::new();
    registry.seed_translator(&translator);
    (registry, translator)
}

fn make_sub_chunk(registry: &Registry, distinct: usize) -> SubChunk {
    let ids: Vec<u32> = registry.iter().map(|(rtid, _)| rtid).collect();
    let mut sub = SubChunk::empty(0);
    let layer = sub.layer_mut(0).unwrap();
    for i in 0..4096 {
        layer.set(i, ids[i % distinct.min(ids.len())]);
    }
    sub
}

// ── Benchmarks ───────────────────────────────────────────────────────────────

fn bench_storage_fill(c: &mut Criterion) {
    let (registry, _) = seeded();
    c.bench_function("storage_fill_8_ids", |b| {
        b.iter(|| black_box(make_sub_chunk(&registry, 8)))
    });
}

fn bench_encode(c: &mut Criterion) {
    let (registry, _) = seeded();
    let sub = make_sub_chunk(&registry, 8);
    c.bench_function("encode_subchunk_disk", |b| {
        b.iter(|| black_box(encode_subchunk(&sub, &registry).unwrap()))
    });
}

fn bench_decode(c: &mut Criterion) {
    let (registry, translator) = seeded();
    let bytes = encode_subchunk(&make_sub_chunk(&registry, 8), &registry).unwrap();
    c.bench_function("decode_subchunk_disk", |b| {
        b.iter(|| black_box(decode_subchunk(&bytes, &translator).unwrap()))
    });
}

fn bench_fuzzy_lookup(c: &mut Criterion) {
    let (_, translator) = seeded();
    let query = voxelbridge::PropsForSearch::parse(r#"axis="w""#).unwrap();
    c.bench_function("try_best_by_state_miss", |b| {
        b.iter(|| black_box(translator.try_best_by_state("oak_log", &query)))
    });
}

criterion_group!(
    benches,
    bench_storage_fill,
    bench_encode,
    bench_decode,
    bench_fuzzy_lookup
);
criterion_main!(benches);
