use criterion::{Criterion, black_box, criterion_group, criterion_main};
use geojson::{Feature, FeatureCollection, Geometry, Value};
use vtslice::{Options, TileIndex};

/// A dense spiral polyline winding over a quarter of the world.
fn spiral(points: usize) -> FeatureCollection {
    let coords = (0..points)
        .map(|i| {
            let t = i as f64 / points as f64;
            let angle = t * 40.;
            vec![t * 120. * angle.cos(), t * 60. * angle.sin()]
        })
        .collect::<Vec<_>>();
    FeatureCollection {
        bbox: None,
        features: vec![Feature {
            bbox: None,
            geometry: Some(Geometry::new(Value::LineString(coords))),
            id: None,
            properties: None,
            foreign_members: None,
        }],
        foreign_members: None,
    }
}

fn bench_build(c: &mut Criterion) {
    let fc = spiral(10_000);
    c.bench_function("build_index_10k", |b| {
        b.iter(|| TileIndex::new(black_box(fc.clone()), Options::default()));
    });
}

fn bench_drill(c: &mut Criterion) {
    let fc = spiral(10_000);
    c.bench_function("drill_to_z10", |b| {
        b.iter(|| {
            let mut index = TileIndex::new(fc.clone(), Options::default());
            black_box(index.get_tile(10, 512, 512).unwrap().features.len())
        });
    });
}

criterion_group!(benches, bench_build, bench_drill);
criterion_main!(benches);
