use geojson::{Feature, FeatureCollection, GeoJson, Geometry, JsonObject, Value};
use vtslice::{Options, TileIndex, TileOptions, geojson_to_tile};

const BUFFER: f64 = 64. / 4096.;

fn line_collection() -> FeatureCollection {
    // Horizontal line crossing the z1 tile seam at lon 0.
    FeatureCollection {
        bbox: None,
        features: vec![Feature {
            bbox: None,
            geometry: Some(Geometry::new(Value::LineString(vec![
                vec![-40., 30.],
                vec![20., 30.],
            ]))),
            id: None,
            properties: None,
            foreign_members: None,
        }],
        foreign_members: None,
    }
}

fn clip_value(properties: &Option<JsonObject>, key: &str) -> f64 {
    properties
        .as_ref()
        .and_then(|map| map.get(key))
        .and_then(|value| value.as_f64())
        .unwrap_or_else(|| panic!("missing {key}"))
}

#[test]
fn one_shot_slices_report_their_position_along_the_line() {
    let geojson = GeoJson::FeatureCollection(line_collection());
    let options = TileOptions {
        line_metrics: true,
        ..TileOptions::default()
    };
    let tile = geojson_to_tile(&geojson, 1, 0, 0, &options, false, false);
    assert_eq!(tile.features.len(), 1);

    let start_x = -40. / 360. + 0.5;
    let exit_x = (1. + BUFFER) / 2.;
    let dist = 60. / 360.;

    let props = &tile.features[0].properties;
    assert_eq!(clip_value(props, "mapbox_clip_start"), 0.);
    let end = clip_value(props, "mapbox_clip_end");
    assert!((end - (exit_x - start_x) / dist).abs() < 1e-9);
    assert!(end > 0. && end < 1.);
}

#[test]
fn indexed_slices_cover_the_line_between_them() {
    let mut index = TileIndex::new(
        line_collection(),
        Options {
            tile: TileOptions {
                line_metrics: true,
                ..TileOptions::default()
            },
            ..Options::default()
        },
    );

    let start_x = -40. / 360. + 0.5;
    let dist = 60. / 360.;
    let p = 0.5 * BUFFER;

    let west = index.get_tile_shared(1, 0, 0).unwrap();
    assert_eq!(west.features.len(), 1);
    let props = &west.features[0].properties;
    assert_eq!(clip_value(props, "mapbox_clip_start"), 0.);
    let west_end = clip_value(props, "mapbox_clip_end");
    assert!((west_end - (0.5 + p - start_x) / dist).abs() < 1e-9);

    let east = index.get_tile_shared(1, 1, 0).unwrap();
    assert_eq!(east.features.len(), 1);
    let props = &east.features[0].properties;
    let east_start = clip_value(props, "mapbox_clip_start");
    assert!((east_start - (0.5 - p - start_x) / dist).abs() < 1e-9);
    // The line ends inside this tile, so the slice runs to its end.
    assert_eq!(clip_value(props, "mapbox_clip_end"), 1.);

    // Together the buffered slices cover the seam with overlap.
    assert!(east_start < west_end);
}

#[test]
fn untouched_lines_carry_no_metric_properties() {
    // Entirely inside one z1 tile: never clipped, so no metrics emitted.
    let fc = FeatureCollection {
        bbox: None,
        features: vec![Feature {
            bbox: None,
            geometry: Some(Geometry::new(Value::LineString(vec![
                vec![-40., 30.],
                vec![-35., 31.],
            ]))),
            id: None,
            properties: None,
            foreign_members: None,
        }],
        foreign_members: None,
    };
    let geojson = GeoJson::FeatureCollection(fc);
    let options = TileOptions {
        line_metrics: true,
        ..TileOptions::default()
    };
    let tile = geojson_to_tile(&geojson, 1, 0, 0, &options, false, false);
    assert_eq!(tile.features.len(), 1);
    assert!(tile.features[0].properties.is_none());
}
