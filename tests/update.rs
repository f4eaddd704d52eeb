use geojson::{Feature, FeatureCollection, Geometry, Value, feature::Id};
use serde_json::Number;
use vtslice::{Options, TileIndex, Update};

fn point_feature(lon: f64, lat: f64, id: Option<u64>) -> Feature {
    Feature {
        bbox: None,
        geometry: Some(Geometry::new(Value::Point(vec![lon, lat]))),
        id: id.map(|n| Id::Number(Number::from(n))),
        properties: None,
        foreign_members: None,
    }
}

fn collection(features: Vec<Feature>) -> FeatureCollection {
    FeatureCollection {
        bbox: None,
        features,
        foreign_members: None,
    }
}

fn id_of(n: u64) -> Id {
    Id::Number(Number::from(n))
}

/// True if any materialized tile still carries a feature with `id`.
fn cache_has_id(index: &TileIndex, id: &Id) -> bool {
    index
        .internal_tiles()
        .values()
        .flat_map(|t| t.tile().features.iter())
        .any(|f| f.id.as_ref() == Some(id))
}

fn two_point_index() -> TileIndex {
    TileIndex::new(
        collection(vec![
            point_feature(-72., 40., Some(1)),
            point_feature(30., -20., Some(2)),
        ]),
        Options {
            index_max_zoom: 2,
            index_max_points: 0,
            ..Options::default()
        },
    )
}

#[test]
fn removal_clears_every_cached_tile() {
    let mut index = two_point_index();
    assert!(cache_has_id(&index, &id_of(1)));
    assert!(cache_has_id(&index, &id_of(2)));

    let update: Update = vec![(id_of(1), vec![None])];
    index.update_features(&update);

    assert!(!cache_has_id(&index, &id_of(1)));
    assert!(cache_has_id(&index, &id_of(2)), "other ids are untouched");
}

#[test]
fn removal_does_not_resurrect_through_drill_down() {
    let mut index = two_point_index();
    index.update_features(&vec![(id_of(1), vec![None])]);

    // The removed point lived in this branch; drilling past the index depth
    // re-materializes from retained geometry, which must be purged too.
    let tile = index.get_tile(4, 4, 6).unwrap();
    assert!(tile.features.is_empty());
    assert!(!cache_has_id(&index, &id_of(1)));
}

#[test]
fn insertion_lands_in_every_intersecting_tile() {
    let mut index = two_point_index();
    let update: Update = vec![(id_of(3), vec![Some(point_feature(-72.2, 40.1, Some(3)))])];
    index.update_features(&update);

    // The new point shares feature 1's branch down to the index depth.
    let tile = index.get_tile(2, 1, 1).unwrap();
    let matching = tile
        .features
        .iter()
        .filter(|f| f.id.as_ref() == Some(&id_of(3)))
        .count();
    assert_eq!(matching, 1);

    // The root tile intersects everything.
    let root = index.get_tile(0, 0, 0).unwrap();
    assert!(root.features.iter().any(|f| f.id.as_ref() == Some(&id_of(3))));
}

#[test]
fn replacement_moves_a_feature() {
    let mut index = two_point_index();
    // Move feature 2 from the south-east quadrant into feature 1's tile.
    let update: Update = vec![(id_of(2), vec![Some(point_feature(-71.8, 39.9, Some(2)))])];
    index.update_features(&update);

    let north_west = index.get_tile(2, 1, 1).unwrap();
    assert!(
        north_west
            .features
            .iter()
            .any(|f| f.id.as_ref() == Some(&id_of(2)))
    );

    // The old location no longer holds it.
    let south_east = index.get_tile(2, 2, 2).unwrap();
    assert!(
        !south_east
            .features
            .iter()
            .any(|f| f.id.as_ref() == Some(&id_of(2)))
    );
}

#[test]
fn update_with_only_removals_projects_nothing() {
    let mut index = two_point_index();
    let before = index.total();
    index.update_features(&vec![(id_of(1), vec![None]), (id_of(2), vec![None])]);
    assert_eq!(index.total(), before, "updates never create or drop tiles");
    assert!(!cache_has_id(&index, &id_of(1)));
    assert!(!cache_has_id(&index, &id_of(2)));
}

#[test]
fn generated_ids_continue_after_updates() {
    let mut index = TileIndex::new(
        collection(vec![
            point_feature(-72., 40., None),
            point_feature(30., -20., None),
        ]),
        Options {
            generate_id: true,
            index_max_zoom: 0,
            ..Options::default()
        },
    );
    // Ids 0 and 1 were handed out during the build; a new anonymous feature
    // continues the sequence.
    index.update_features(&vec![(
        id_of(99),
        vec![Some(point_feature(10., 10., None))],
    )]);
    let root = index.get_tile(0, 0, 0).unwrap();
    assert!(root.features.iter().any(|f| f.id == Some(id_of(2))));
}
