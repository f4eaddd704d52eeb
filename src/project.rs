use crate::simplify::simplify;
use crate::types::{
    ProjFeature, ProjGeometry, ProjLineString, ProjPoint, ProjRing,
};
use geojson::{Feature, FeatureCollection, Geometry, Value, feature::Id};
use serde_json::Number;
use std::rc::Rc;

/// Projects a GeoJSON feature collection into unit-square space.
///
/// Longitude/latitude coordinates become Web Mercator positions in
/// `[0, 1] x [0, 1]`, polylines get their Manhattan length and
/// Douglas-Peucker importance tags, rings get their area. Features without
/// geometry (or with empty geometry) are dropped.
///
/// When `generate_id` is set, each feature lacking an id is assigned the
/// next value of `gen_id`; the counter lives in the caller so ids stay
/// monotonic across later incremental updates.
pub fn project_collection(
    fc: FeatureCollection,
    tolerance: f64,
    generate_id: bool,
    gen_id: &mut u64,
) -> Vec<ProjFeature> {
    let mut projected = Vec::with_capacity(fc.features.len());
    for feature in fc.features {
        if let Some(feature) = project_feature(feature, tolerance, generate_id, gen_id) {
            projected.push(feature);
        }
    }
    projected
}

pub fn project_feature(
    feature: Feature,
    tolerance: f64,
    generate_id: bool,
    gen_id: &mut u64,
) -> Option<ProjFeature> {
    let geometry = project_geometry(feature.geometry.as_ref()?, tolerance)?;
    let id = match feature.id {
        Some(id) => Some(id),
        None if generate_id => {
            let id = Id::Number(Number::from(*gen_id));
            *gen_id += 1;
            Some(id)
        }
        None => None,
    };
    ProjFeature::new(geometry, Rc::new(feature.properties), id)
}

fn project_geometry(geometry: &Geometry, tolerance: f64) -> Option<ProjGeometry> {
    match &geometry.value {
        Value::Point(coords) => {
            if coords.len() < 2 {
                None
            } else {
                Some(ProjGeometry::Point(project_position(coords)))
            }
        }
        Value::MultiPoint(coords) => {
            if coords.is_empty() {
                None
            } else {
                Some(ProjGeometry::MultiPoint(
                    coords.iter().map(|p| project_position(p)).collect(),
                ))
            }
        }
        Value::LineString(coords) => {
            if coords.is_empty() {
                None
            } else {
                Some(ProjGeometry::LineString(project_line(coords, tolerance)))
            }
        }
        Value::MultiLineString(lines) => {
            if lines.is_empty() {
                None
            } else {
                Some(ProjGeometry::MultiLineString(
                    lines.iter().map(|l| project_line(l, tolerance)).collect(),
                ))
            }
        }
        Value::Polygon(rings) => {
            if rings.is_empty() {
                None
            } else {
                Some(ProjGeometry::Polygon(
                    rings.iter().map(|r| project_ring(r, tolerance)).collect(),
                ))
            }
        }
        Value::MultiPolygon(polygons) => {
            if polygons.is_empty() {
                None
            } else {
                Some(ProjGeometry::MultiPolygon(
                    polygons
                        .iter()
                        .map(|rings| {
                            rings.iter().map(|r| project_ring(r, tolerance)).collect()
                        })
                        .collect(),
                ))
            }
        }
        Value::GeometryCollection(members) => {
            let members = members
                .iter()
                .filter_map(|g| project_geometry(g, tolerance))
                .collect::<Vec<_>>();
            if members.is_empty() {
                None
            } else {
                Some(ProjGeometry::Collection(members))
            }
        }
    }
}

fn project_line(coords: &[Vec<f64>], tolerance: f64) -> ProjLineString {
    let mut points = coords
        .iter()
        .map(|c| project_position(c))
        .collect::<Vec<_>>();
    // Manhattan length; cheaper than Euclidean and only compared against
    // the per-zoom tolerance threshold.
    let mut dist = 0.;
    for w in points.windows(2) {
        dist += (w[1].x - w[0].x).abs() + (w[1].y - w[0].y).abs();
    }
    simplify(&mut points, tolerance);
    ProjLineString {
        points,
        dist,
        seg_start: 0.,
        seg_end: 0.,
    }
}

fn project_ring(coords: &[Vec<f64>], tolerance: f64) -> ProjRing {
    let mut points = coords
        .iter()
        .map(|c| project_position(c))
        .collect::<Vec<_>>();
    let mut area = 0.;
    for w in points.windows(2) {
        area += w[0].x * w[1].y - w[1].x * w[0].y;
    }
    simplify(&mut points, tolerance);
    ProjRing {
        points,
        area: (area / 2.).abs(),
    }
}

fn project_position(coords: &[f64]) -> ProjPoint {
    ProjPoint::from_xy(lng_to_unit_x(coords[0]), lat_to_unit_y(coords[1]))
}

#[inline]
fn lng_to_unit_x(lng: f64) -> f64 {
    lng / 360. + 0.5
}

#[inline]
fn lat_to_unit_y(lat: f64) -> f64 {
    let sin = lat.to_radians().sin();
    let y = 0.5 - 0.25 * ((1. + sin) / (1. - sin)).ln() / std::f64::consts::PI;
    y.clamp(0., 1.)
}
