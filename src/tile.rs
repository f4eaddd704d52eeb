use std::collections::{HashMap, HashSet};
use std::rc::Rc;

use geojson::{JsonObject, JsonValue, feature::Id};
use serde_json::Number;

use crate::types::{
    BBox, ProjFeature, ProjGeometry, ProjLineString, ProjPoint, ProjPolygon, ProjRing,
};

/// A point in tile-local integer coordinates. With the default extent and
/// buffer, coordinates stay within `[-64, 4160]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TilePoint {
    pub x: i16,
    pub y: i16,
}

impl TilePoint {
    pub fn new(x: i16, y: i16) -> Self {
        Self { x, y }
    }
}

pub type TileMultiPoint = Vec<TilePoint>;
pub type TileLineString = Vec<TilePoint>;
pub type TileMultiLineString = Vec<TileLineString>;
pub type TileRing = Vec<TilePoint>;
pub type TilePolygon = Vec<TileRing>;
pub type TileMultiPolygon = Vec<TilePolygon>;

/// Materialized tile-space geometry. Geometry collections do not appear
/// here; the materializer flattens them into sibling features.
#[derive(Debug, Clone, PartialEq)]
pub enum TileGeometry {
    Point(TilePoint),
    MultiPoint(TileMultiPoint),
    LineString(TileLineString),
    MultiLineString(TileMultiLineString),
    Polygon(TilePolygon),
    MultiPolygon(TileMultiPolygon),
}

impl TileGeometry {
    fn num_points(&self) -> u32 {
        match self {
            TileGeometry::Point(_) => 1,
            TileGeometry::MultiPoint(ps) => ps.len() as u32,
            TileGeometry::LineString(line) => line.len() as u32,
            TileGeometry::MultiLineString(lines) => {
                lines.iter().map(|l| l.len() as u32).sum()
            }
            TileGeometry::Polygon(rings) => rings.iter().map(|r| r.len() as u32).sum(),
            TileGeometry::MultiPolygon(polygons) => polygons
                .iter()
                .flat_map(|rings| rings.iter())
                .map(|r| r.len() as u32)
                .sum(),
        }
    }
}

/// A feature in a materialized tile. The property map is the same `Rc` the
/// source feature carries unless line metrics forced a copy.
#[derive(Debug, Clone, PartialEq)]
pub struct TileFeature {
    pub id: Option<Id>,
    pub geometry: TileGeometry,
    pub properties: Rc<Option<JsonObject>>,
}

/// A materialized tile: the renderable output of the engine.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Tile {
    pub features: Vec<TileFeature>,
    pub num_points: u32,
    pub num_simplified: u32,
}

/// A tile slot in the pyramid: the materialized snapshot plus whatever the
/// split scheduler needs to refine it later (retained source features, the
/// unit-square bbox, per-zoom tolerances and a feature-id lookup table).
#[derive(Debug)]
pub struct InternalTile {
    pub z: u8,
    pub x: u32,
    pub y: u32,
    extent: u16,
    z2: f64,
    tolerance: f64,
    sq_tolerance: f64,
    line_metrics: bool,
    /// Projected features kept around for drill-down; cleared once the tile
    /// has been split into children or max zoom is reached.
    pub source_features: Vec<Rc<ProjFeature>>,
    /// Extent of the source features in unit-square coordinates.
    pub bbox: BBox,
    tile: Rc<Tile>,
    /// Feature id -> positions in `tile.features`.
    id_index: HashMap<String, Vec<usize>>,
}

impl InternalTile {
    pub fn new(
        source: &[Rc<ProjFeature>],
        z: u8,
        x: u32,
        y: u32,
        extent: u16,
        tolerance: f64,
        line_metrics: bool,
    ) -> Self {
        let mut tile = Self {
            z,
            x,
            y,
            extent,
            z2: (1u32 << z) as f64,
            tolerance,
            sq_tolerance: tolerance * tolerance,
            line_metrics,
            source_features: Vec::new(),
            bbox: BBox::collapsed(),
            tile: Rc::new(Tile::default()),
            id_index: HashMap::new(),
        };
        for feature in source {
            tile.add_feature(feature);
        }
        tile
    }

    /// The materialized snapshot.
    pub fn tile(&self) -> &Tile {
        &self.tile
    }

    /// A shared handle to the snapshot. Later mutation of this slot
    /// replaces the snapshot copy-on-write, so the handle stays valid.
    pub fn shared(&self) -> Rc<Tile> {
        self.tile.clone()
    }

    /// Consumes the slot, yielding the bare tile.
    pub fn into_tile(self) -> Tile {
        Rc::try_unwrap(self.tile).unwrap_or_else(|rc| (*rc).clone())
    }

    /// Materializes additional features into this tile, extending the id
    /// index and bbox. Used by incremental updates.
    pub fn insert_features(&mut self, features: &[Rc<ProjFeature>]) {
        for feature in features {
            self.add_feature(feature);
        }
    }

    /// Removes every materialized feature carrying `id`, along with any
    /// retained source feature with that id so a later drill-down cannot
    /// resurrect it. Surviving features keep their relative order; the id
    /// index is rebuilt to account for the shifted positions.
    pub fn remove_feature(&mut self, id: &Id) {
        let key = id_key(id);
        self.source_features
            .retain(|f| f.id.as_ref().map(id_key).as_deref() != Some(key.as_str()));
        let Some(positions) = self.id_index.remove(&key) else {
            return;
        };
        let drop: HashSet<usize> = positions.into_iter().collect();
        let tile = Rc::make_mut(&mut self.tile);
        let mut pos = 0usize;
        tile.features.retain(|_| {
            let keep = !drop.contains(&pos);
            pos += 1;
            keep
        });
        self.id_index.clear();
        for (pos, feature) in tile.features.iter().enumerate() {
            if let Some(id) = &feature.id {
                self.id_index.entry(id_key(id)).or_default().push(pos);
            }
        }
    }

    fn add_feature(&mut self, feature: &ProjFeature) {
        Rc::make_mut(&mut self.tile).num_points += feature.num_points;
        self.bbox.merge(&feature.bbox);
        self.add_geometry(&feature.geometry, &feature.properties, &feature.id);
    }

    fn add_geometry(
        &mut self,
        geometry: &ProjGeometry,
        properties: &Rc<Option<JsonObject>>,
        id: &Option<Id>,
    ) {
        match geometry {
            ProjGeometry::Point(p) => {
                let point = self.transform_point(p);
                self.push(TileGeometry::Point(point), properties.clone(), id);
            }
            ProjGeometry::MultiPoint(points) => {
                let mut transformed = points
                    .iter()
                    .map(|p| self.transform_point(p))
                    .collect::<TileMultiPoint>();
                match transformed.len() {
                    0 => {}
                    1 => self.push(
                        TileGeometry::Point(transformed.pop().unwrap()),
                        properties.clone(),
                        id,
                    ),
                    _ => self.push(TileGeometry::MultiPoint(transformed), properties.clone(), id),
                }
            }
            ProjGeometry::LineString(line) => {
                let transformed = self.transform_line(line);
                if transformed.is_empty() {
                    return;
                }
                let properties = if self.line_metrics && line.seg_end > 0. {
                    Rc::new(Some(metric_properties(properties, line)))
                } else {
                    properties.clone()
                };
                self.push(TileGeometry::LineString(transformed), properties, id);
            }
            ProjGeometry::MultiLineString(lines) => {
                let mut transformed = lines
                    .iter()
                    .map(|line| self.transform_line(line))
                    .filter(|line| !line.is_empty())
                    .collect::<TileMultiLineString>();
                match transformed.len() {
                    0 => {}
                    1 => self.push(
                        TileGeometry::LineString(transformed.pop().unwrap()),
                        properties.clone(),
                        id,
                    ),
                    _ => self.push(
                        TileGeometry::MultiLineString(transformed),
                        properties.clone(),
                        id,
                    ),
                }
            }
            ProjGeometry::Polygon(rings) => {
                let transformed = self.transform_polygon(rings);
                if !transformed.is_empty() {
                    self.push(TileGeometry::Polygon(transformed), properties.clone(), id);
                }
            }
            ProjGeometry::MultiPolygon(polygons) => {
                let mut transformed = polygons
                    .iter()
                    .map(|rings| self.transform_polygon(rings))
                    .filter(|polygon| !polygon.is_empty())
                    .collect::<TileMultiPolygon>();
                match transformed.len() {
                    0 => {}
                    1 => self.push(
                        TileGeometry::Polygon(transformed.pop().unwrap()),
                        properties.clone(),
                        id,
                    ),
                    _ => self.push(
                        TileGeometry::MultiPolygon(transformed),
                        properties.clone(),
                        id,
                    ),
                }
            }
            ProjGeometry::Collection(members) => {
                for member in members {
                    self.add_geometry(member, properties, id);
                }
            }
        }
    }

    fn push(&mut self, geometry: TileGeometry, properties: Rc<Option<JsonObject>>, id: &Option<Id>) {
        let tile = Rc::make_mut(&mut self.tile);
        tile.num_simplified += geometry.num_points();
        if let Some(id) = id {
            self.id_index
                .entry(id_key(id))
                .or_default()
                .push(tile.features.len());
        }
        tile.features.push(TileFeature {
            id: id.clone(),
            geometry,
            properties,
        });
    }

    fn transform_point(&self, p: &ProjPoint) -> TilePoint {
        TilePoint {
            x: ((p.x * self.z2 - self.x as f64) * self.extent as f64).round() as i16,
            y: ((p.y * self.z2 - self.y as f64) * self.extent as f64).round() as i16,
        }
    }

    /// Drops the whole line when its length is within tolerance, otherwise
    /// keeps the vertices whose importance clears the squared threshold.
    fn transform_line(&self, line: &ProjLineString) -> TileLineString {
        if line.dist <= self.tolerance {
            return Vec::new();
        }
        line.points
            .iter()
            .filter(|p| p.z > self.sq_tolerance)
            .map(|p| self.transform_point(p))
            .collect()
    }

    fn transform_ring(&self, ring: &ProjRing) -> TileRing {
        if ring.area <= self.sq_tolerance {
            return Vec::new();
        }
        ring.points
            .iter()
            .filter(|p| p.z > self.sq_tolerance)
            .map(|p| self.transform_point(p))
            .collect()
    }

    fn transform_polygon(&self, rings: &ProjPolygon) -> TilePolygon {
        rings
            .iter()
            .map(|ring| self.transform_ring(ring))
            .filter(|ring| !ring.is_empty())
            .collect()
    }
}

/// Canonical map key for a feature id; numbers and strings live in
/// disjoint namespaces.
fn id_key(id: &Id) -> String {
    match id {
        Id::String(s) => format!("s:{s}"),
        Id::Number(n) => format!("n:{n}"),
    }
}

/// Copies the property map and attaches the slice's relative position along
/// the original line.
fn metric_properties(properties: &Rc<Option<JsonObject>>, line: &ProjLineString) -> JsonObject {
    let mut map = (**properties).clone().unwrap_or_default();
    map.insert(
        "mapbox_clip_start".to_string(),
        json_number(line.seg_start / line.dist),
    );
    map.insert(
        "mapbox_clip_end".to_string(),
        json_number(line.seg_end / line.dist),
    );
    map
}

fn json_number(value: f64) -> JsonValue {
    if value.fract() == 0. {
        JsonValue::Number(Number::from(value as i64))
    } else {
        // Finite non-integer, so from_f64 cannot fail.
        JsonValue::Number(Number::from_f64(value).unwrap())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn feature_of(geometry: ProjGeometry, id: Option<Id>) -> Rc<ProjFeature> {
        Rc::new(ProjFeature::new(geometry, Rc::new(None), id).unwrap())
    }

    fn unit_square_ring() -> ProjRing {
        ProjRing {
            points: vec![
                ProjPoint::new(0., 0., 1.),
                ProjPoint::new(1., 0., 1.),
                ProjPoint::new(1., 1., 1.),
                ProjPoint::new(0., 1., 1.),
                ProjPoint::new(0., 0., 1.),
            ],
            area: 1.,
        }
    }

    #[test]
    fn transforms_to_extent_coordinates() {
        let feature = feature_of(ProjGeometry::Polygon(vec![unit_square_ring()]), None);
        let tile = InternalTile::new(&[feature], 0, 0, 0, 4096, 0., false);
        assert_eq!(tile.tile().features.len(), 1);
        let TileGeometry::Polygon(rings) = &tile.tile().features[0].geometry else {
            panic!("expected a polygon");
        };
        assert_eq!(
            rings[0],
            vec![
                TilePoint::new(0, 0),
                TilePoint::new(4096, 0),
                TilePoint::new(4096, 4096),
                TilePoint::new(0, 4096),
                TilePoint::new(0, 0),
            ]
        );
        assert_eq!(tile.tile().num_points, 5);
        assert_eq!(tile.tile().num_simplified, 5);
    }

    #[test]
    fn offsets_by_tile_origin_at_depth() {
        let point = feature_of(ProjGeometry::Point(ProjPoint::from_xy(0.53125, 0.5)), None);
        let tile = InternalTile::new(&[point], 4, 8, 8, 4096, 0., false);
        let TileGeometry::Point(p) = &tile.tile().features[0].geometry else {
            panic!("expected a point");
        };
        // 0.53125 * 16 - 8 = 0.5 tiles -> half the extent.
        assert_eq!(*p, TilePoint::new(2048, 0));
    }

    #[test]
    fn drops_short_lines_and_keeps_important_vertices() {
        let line = ProjLineString {
            points: vec![
                ProjPoint::new(0., 0., 1.),
                ProjPoint::new(0.3, 0., 0.0001),
                ProjPoint::new(0.6, 0., 0.5),
                ProjPoint::new(1., 0., 1.),
            ],
            dist: 1.,
            seg_start: 0.,
            seg_end: 0.,
        };
        let feature = feature_of(ProjGeometry::LineString(line.clone()), None);
        let tile = InternalTile::new(&[feature], 0, 0, 0, 4096, 0.01, false);
        let TileGeometry::LineString(kept) = &tile.tile().features[0].geometry else {
            panic!("expected a line string");
        };
        // sq_tolerance 0.0001 filters the second vertex.
        assert_eq!(kept.len(), 3);
        assert_eq!(tile.tile().num_simplified, 3);

        let short = ProjLineString { dist: 0.005, ..line };
        let feature = feature_of(ProjGeometry::LineString(short), None);
        let tile = InternalTile::new(&[feature], 0, 0, 0, 4096, 0.01, false);
        assert!(tile.tile().features.is_empty());
        assert_eq!(tile.tile().num_points, 4);
    }

    #[test]
    fn degrades_singleton_containers() {
        let multi = ProjGeometry::MultiPolygon(vec![
            vec![unit_square_ring()],
            vec![ProjRing {
                // area below sq_tolerance: elided entirely
                points: vec![
                    ProjPoint::new(0.5, 0.5, 1.),
                    ProjPoint::new(0.5001, 0.5, 1.),
                    ProjPoint::new(0.5, 0.5001, 1.),
                    ProjPoint::new(0.5, 0.5, 1.),
                ],
                area: 5e-9,
            }],
        ]);
        let feature = feature_of(multi, None);
        let tile = InternalTile::new(&[feature], 0, 0, 0, 4096, 0.01, false);
        assert!(matches!(
            tile.tile().features[0].geometry,
            TileGeometry::Polygon(_)
        ));
    }

    #[test]
    fn collections_flatten_into_sibling_features() {
        let id = Id::Number(Number::from(9u64));
        let collection = ProjGeometry::Collection(vec![
            ProjGeometry::Point(ProjPoint::from_xy(0.25, 0.25)),
            ProjGeometry::Point(ProjPoint::from_xy(0.75, 0.75)),
        ]);
        let feature = feature_of(collection, Some(id.clone()));
        let mut tile = InternalTile::new(&[feature], 0, 0, 0, 4096, 0., false);
        assert_eq!(tile.tile().features.len(), 2);
        assert_eq!(tile.tile().features[0].id, Some(id.clone()));

        tile.remove_feature(&id);
        assert!(tile.tile().features.is_empty());
    }

    #[test]
    fn removal_keeps_other_positions_valid() {
        let a = Id::Number(Number::from(1u64));
        let b = Id::Number(Number::from(2u64));
        let c = Id::String("c".to_string());
        let features = [
            feature_of(ProjGeometry::Point(ProjPoint::from_xy(0.1, 0.1)), Some(a.clone())),
            feature_of(ProjGeometry::Point(ProjPoint::from_xy(0.2, 0.2)), Some(b.clone())),
            feature_of(ProjGeometry::Point(ProjPoint::from_xy(0.3, 0.3)), Some(c.clone())),
        ];
        let mut tile = InternalTile::new(&features, 0, 0, 0, 4096, 0., false);
        tile.remove_feature(&a);
        assert_eq!(tile.tile().features.len(), 2);
        assert_eq!(tile.tile().features[0].id, Some(b.clone()));

        // The rebuilt index must find the shifted survivors.
        tile.remove_feature(&c);
        assert_eq!(tile.tile().features.len(), 1);
        assert_eq!(tile.tile().features[0].id, Some(b));
    }

    #[test]
    fn snapshots_are_copy_on_write() {
        let a = Id::Number(Number::from(1u64));
        let feature = feature_of(ProjGeometry::Point(ProjPoint::from_xy(0.1, 0.1)), Some(a.clone()));
        let mut tile = InternalTile::new(&[feature], 0, 0, 0, 4096, 0., false);
        let snapshot = tile.shared();
        tile.remove_feature(&a);
        assert_eq!(snapshot.features.len(), 1);
        assert!(tile.tile().features.is_empty());
    }
}
