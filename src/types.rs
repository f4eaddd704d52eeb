use geojson::{JsonObject, feature::Id};
use std::rc::Rc;

/// A point in the Web Mercator unit square.
///
/// `z` is the vertex importance: the squared perpendicular distance to the
/// chord this vertex would collapse into under Douglas-Peucker, `1.0` for
/// endpoints and clip intersections, `0.0` for untagged interior vertices.
#[derive(Default, Debug, Clone, Copy, PartialEq)]
pub struct ProjPoint {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl ProjPoint {
    pub fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    pub fn from_xy(x: f64, y: f64) -> Self {
        Self { x, y, z: 0. }
    }
}

/// A projected polyline. `dist` is the Manhattan length of the unclipped
/// line in unit-square units. `seg_start`/`seg_end` are distances along the
/// original line, populated by the clipper in line-metrics mode.
#[derive(Default, Debug, Clone, PartialEq)]
pub struct ProjLineString {
    pub points: Vec<ProjPoint>,
    pub dist: f64,
    pub seg_start: f64,
    pub seg_end: f64,
}

impl ProjLineString {
    pub fn from_points(points: Vec<ProjPoint>) -> Self {
        Self {
            points,
            dist: 0.,
            seg_start: 0.,
            seg_end: 0.,
        }
    }
}

/// A projected linear ring. `area` is the absolute signed area halved.
/// Closure (first == last) is the source's responsibility; the clipper
/// re-closes rings it cuts open.
#[derive(Default, Debug, Clone, PartialEq)]
pub struct ProjRing {
    pub points: Vec<ProjPoint>,
    pub area: f64,
}

impl ProjRing {
    pub fn from_points(points: Vec<ProjPoint>) -> Self {
        Self { points, area: 0. }
    }
}

pub type ProjMultiPoint = Vec<ProjPoint>;
pub type ProjMultiLineString = Vec<ProjLineString>;
pub type ProjPolygon = Vec<ProjRing>;
pub type ProjMultiPolygon = Vec<ProjPolygon>;
pub type ProjGeometryCollection = Vec<ProjGeometry>;

#[derive(Debug, Clone, PartialEq)]
pub enum ProjGeometry {
    Point(ProjPoint),
    MultiPoint(ProjMultiPoint),
    LineString(ProjLineString),
    MultiLineString(ProjMultiLineString),
    Polygon(ProjPolygon),
    MultiPolygon(ProjMultiPolygon),
    Collection(ProjGeometryCollection),
}

impl ProjGeometry {
    /// Visits every vertex of the geometry, recursing through collections.
    pub fn each_point(&self, f: &mut impl FnMut(&ProjPoint)) {
        self.each_point_dyn(&mut |p| f(p));
    }

    fn each_point_dyn(&self, f: &mut dyn FnMut(&ProjPoint)) {
        match self {
            ProjGeometry::Point(p) => f(p),
            ProjGeometry::MultiPoint(ps) => ps.iter().for_each(|p| f(p)),
            ProjGeometry::LineString(line) => line.points.iter().for_each(|p| f(p)),
            ProjGeometry::MultiLineString(lines) => lines
                .iter()
                .flat_map(|line| line.points.iter())
                .for_each(|p| f(p)),
            ProjGeometry::Polygon(rings) => rings
                .iter()
                .flat_map(|ring| ring.points.iter())
                .for_each(|p| f(p)),
            ProjGeometry::MultiPolygon(polygons) => polygons
                .iter()
                .flat_map(|rings| rings.iter().flat_map(|ring| ring.points.iter()))
                .for_each(|p| f(p)),
            ProjGeometry::Collection(members) => {
                for member in members {
                    member.each_point_dyn(&mut *f);
                }
            }
        }
    }

    pub fn each_point_mut(&mut self, f: &mut impl FnMut(&mut ProjPoint)) {
        self.each_point_mut_dyn(&mut |p| f(p));
    }

    fn each_point_mut_dyn(&mut self, f: &mut dyn FnMut(&mut ProjPoint)) {
        match self {
            ProjGeometry::Point(p) => f(p),
            ProjGeometry::MultiPoint(ps) => ps.iter_mut().for_each(|p| f(p)),
            ProjGeometry::LineString(line) => line.points.iter_mut().for_each(|p| f(p)),
            ProjGeometry::MultiLineString(lines) => lines
                .iter_mut()
                .flat_map(|line| line.points.iter_mut())
                .for_each(|p| f(p)),
            ProjGeometry::Polygon(rings) => rings
                .iter_mut()
                .flat_map(|ring| ring.points.iter_mut())
                .for_each(|p| f(p)),
            ProjGeometry::MultiPolygon(polygons) => polygons
                .iter_mut()
                .flat_map(|rings| rings.iter_mut().flat_map(|ring| ring.points.iter_mut()))
                .for_each(|p| f(p)),
            ProjGeometry::Collection(members) => {
                for member in members {
                    member.each_point_mut_dyn(&mut *f);
                }
            }
        }
    }
}

/// Bounding box in unit-square coordinates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BBox {
    pub min_x: f64,
    pub min_y: f64,
    pub max_x: f64,
    pub max_y: f64,
}

impl BBox {
    /// The inverted box used as a merge seed: any real point extends it.
    pub fn collapsed() -> Self {
        Self {
            min_x: 2.,
            min_y: 1.,
            max_x: -1.,
            max_y: 0.,
        }
    }

    pub fn extend(&mut self, p: &ProjPoint) {
        self.min_x = self.min_x.min(p.x);
        self.min_y = self.min_y.min(p.y);
        self.max_x = self.max_x.max(p.x);
        self.max_y = self.max_y.max(p.y);
    }

    pub fn merge(&mut self, other: &Self) {
        self.min_x = self.min_x.min(other.min_x);
        self.min_y = self.min_y.min(other.min_y);
        self.max_x = self.max_x.max(other.max_x);
        self.max_y = self.max_y.max(other.max_y);
    }
}

/// A projected feature. The property map is behind `Rc` because a feature
/// can be split across many tiles; clipped copies alias it, never clone it.
#[derive(Debug, Clone)]
pub struct ProjFeature {
    pub id: Option<Id>,
    pub geometry: ProjGeometry,
    pub properties: Rc<Option<JsonObject>>,
    pub bbox: BBox,
    pub num_points: u32,
}

impl ProjFeature {
    /// Builds a feature, caching its bbox and vertex count. Returns `None`
    /// for geometry without a single vertex, so downstream code can rely on
    /// every feature having a meaningful bbox.
    pub fn new(
        geometry: ProjGeometry,
        properties: Rc<Option<JsonObject>>,
        id: Option<Id>,
    ) -> Option<Self> {
        let mut bbox = BBox::collapsed();
        let mut num_points = 0u32;
        geometry.each_point(&mut |p| {
            bbox.extend(p);
            num_points += 1;
        });
        if num_points == 0 {
            return None;
        }
        Some(Self {
            id,
            geometry,
            properties,
            bbox,
            num_points,
        })
    }
}

/// Coordinate of `p` along axis `I` (0 = x, 1 = y).
#[inline]
pub fn get_coordinate<const I: usize>(p: &ProjPoint) -> f64 {
    match I {
        0 => p.x,
        1 => p.y,
        _ => unreachable!("axis must be 0 or 1"),
    }
}

/// Range of `bbox` along axis `I`.
#[inline]
pub fn get_range<const I: usize>(bbox: &BBox) -> (f64, f64) {
    match I {
        0 => (bbox.min_x, bbox.max_x),
        1 => (bbox.min_y, bbox.max_y),
        _ => unreachable!("axis must be 0 or 1"),
    }
}

/// Interpolation ratio at which segment `(a, b)` reaches `v` on axis `I`.
#[inline]
pub fn calc_progress<const I: usize>(a: &ProjPoint, b: &ProjPoint, v: f64) -> f64 {
    match I {
        0 => (v - a.x) / (b.x - a.x),
        1 => (v - a.y) / (b.y - a.y),
        _ => unreachable!("axis must be 0 or 1"),
    }
}

/// Intersection of segment `(a, b)` with the line `axis I = v`. The axis
/// coordinate is set to `v` exactly and the vertex is marked important
/// (`z = 1`) so simplification can never drop it.
#[inline]
pub fn intersect<const I: usize>(a: &ProjPoint, b: &ProjPoint, v: f64, t: f64) -> ProjPoint {
    match I {
        0 => ProjPoint::new(v, a.y + t * (b.y - a.y), 1.),
        1 => ProjPoint::new(a.x + t * (b.x - a.x), v, 1.),
        _ => unreachable!("axis must be 0 or 1"),
    }
}
