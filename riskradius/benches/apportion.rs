//! Benchmarks pour la répartition surfacique et le clip planaire

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use geo::{polygon, Geometry, MultiPolygon};
use riskradius::{
    ApportionmentEngine, ClipRecord, ExtensiveAttributes, GeometryProvider, LinearUnit,
    LiteProjector, PlanarProvider, RingDistance, RiskRing, SourceFeature, Zone, ZoneSource,
};

fn records(count: usize) -> Vec<ClipRecord> {
    (0..count)
        .map(|i| ClipRecord {
            zone: Zone {
                id: format!("420410{i:09}"),
                original_area: 10_000.0 + i as f64,
                attributes: [
                    ("POP10".to_string(), (i % 97) as f64),
                    ("HOUSING10".to_string(), (i % 41) as f64),
                ]
                .into_iter()
                .collect(),
            },
            clipped_area: (i % 100) as f64 * 100.0,
        })
        .collect()
}

fn ring() -> RiskRing {
    RiskRing {
        facility_id: "1234".into(),
        ring_index: 0,
        distance: RingDistance::new(1.0, LinearUnit::Miles),
        geometry: MultiPolygon::new(vec![]),
    }
}

fn bench_apportion(c: &mut Criterion) {
    let engine =
        ApportionmentEngine::new(ExtensiveAttributes::new(["POP10", "HOUSING10"]).unwrap());
    let ring = ring();

    let mut group = c.benchmark_group("apportion");
    for count in [100usize, 1_000, 10_000] {
        let records = records(count);
        group.throughput(Throughput::Elements(count as u64));
        group.bench_with_input(BenchmarkId::from_parameter(count), &records, |b, records| {
            b.iter(|| black_box(engine.apportion(&ring, black_box(records))))
        });
    }
    group.finish();
}

fn bench_planar_clip(c: &mut Criterion) {
    // Grille de blocs de 500 ft autour de Carlisle
    let (cx, cy) = (2_124_895.3, 316_756.6);
    let size = 500.0;
    let mut blocks = Vec::new();
    for i in -30..30 {
        for j in -30..30 {
            let (x0, y0) = (cx + i as f64 * size, cy + j as f64 * size);
            blocks.push(
                SourceFeature::new(
                    format!("{i}_{j}"),
                    Geometry::Polygon(polygon![
                        (x: x0, y: y0),
                        (x: x0 + size, y: y0),
                        (x: x0 + size, y: y0 + size),
                        (x: x0, y: y0 + size),
                        (x: x0, y: y0),
                    ]),
                )
                .with_attribute("POP10", 25.0),
            );
        }
    }

    let mut provider = PlanarProvider::new(Box::new(LiteProjector::new(2272).unwrap()));
    provider.add_layer("census_blocks", blocks);
    let zones = ZoneSource::new("census_blocks");
    let buffers = provider
        .multi_ring_buffer(
            geo::Point::new(cx, cy),
            &[
                RingDistance::new(1.0, LinearUnit::Miles),
                RingDistance::new(2.0, LinearUnit::Miles),
            ],
        )
        .unwrap();

    let mut group = c.benchmark_group("planar_clip");
    for (index, buffer) in buffers.iter().enumerate() {
        group.bench_with_input(BenchmarkId::from_parameter(index + 1), buffer, |b, buffer| {
            b.iter(|| black_box(provider.clip(&zones, black_box(buffer)).unwrap()))
        });
    }
    group.finish();
}

criterion_group!(benches, bench_apportion, bench_planar_clip);
criterion_main!(benches);
