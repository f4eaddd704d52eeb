use std::collections::HashMap;
use std::rc::Rc;

use geojson::{Feature, FeatureCollection, GeoJson, feature::Id};
use tracing::debug;

use crate::clip::clip;
use crate::error::{Error, Result};
use crate::project::project_collection;
use crate::tile::{InternalTile, Tile};
use crate::types::{BBox, ProjFeature};
use crate::wrap::wrap;

/// Options governing how a single tile is cut and materialized.
#[derive(Debug, Copy, Clone)]
pub struct TileOptions {
    /// Douglas-Peucker tolerance at max zoom, in tile-pixel units. The
    /// per-zoom threshold is `tolerance / (2^z * extent)`.
    pub tolerance: f64,
    /// Resolution of the tile-local integer coordinate system.
    pub extent: u16,
    /// Overlap kept on each tile side, in tile-pixel units.
    pub buffer: u16,
    /// Emit `mapbox_clip_start`/`mapbox_clip_end` on clipped line slices.
    pub line_metrics: bool,
}

impl Default for TileOptions {
    fn default() -> Self {
        Self {
            tolerance: 3.,
            extent: 4096,
            buffer: 64,
            line_metrics: false,
        }
    }
}

/// Options governing the whole pyramid.
#[derive(Debug, Copy, Clone)]
pub struct Options {
    /// Deepest zoom reachable through drill-down.
    pub max_zoom: u8,
    /// Deepest zoom pre-built during construction.
    pub index_max_zoom: u8,
    /// Pre-building stops once a tile holds at most this many points.
    pub index_max_points: u32,
    /// Assign monotonic ids to features lacking one.
    pub generate_id: bool,
    pub tile: TileOptions,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            max_zoom: 18,
            index_max_zoom: 5,
            index_max_points: 100000,
            generate_id: false,
            tile: TileOptions::default(),
        }
    }
}

/// Payload for [`TileIndex::update_features`]: per feature id, the list of
/// replacements. `None` entries remove; `Some` entries are projected and
/// inserted into every cached tile they intersect.
pub type Update = Vec<(Id, Vec<Option<Feature>>)>;

/// A pre-built pyramid of vector tiles over one feature collection.
///
/// Construction projects, wraps, and recursively splits the input down to
/// the configured index depth. [`TileIndex::get_tile`] serves cached tiles
/// and lazily drills down to deeper coordinates from the nearest ancestor
/// that still holds source geometry.
#[derive(Debug)]
pub struct TileIndex {
    options: Options,
    gen_id: u64,
    tiles: HashMap<u64, InternalTile>,
    stats: HashMap<u8, u32>,
    total: u32,
    empty_tile: Rc<Tile>,
}

impl TileIndex {
    pub fn from_geojson(geojson: &GeoJson, options: Options) -> Self {
        Self::new(to_feature_collection(geojson), options)
    }

    pub fn new(features: FeatureCollection, options: Options) -> Self {
        assert!(
            options.max_zoom > 0 && options.max_zoom <= 24,
            "max_zoom must be within 1..=24"
        );
        let buffer = options.tile.buffer as f64 / options.tile.extent as f64;
        let z2 = (1u32 << options.max_zoom) as f64;
        let tolerance = (options.tile.tolerance / options.tile.extent as f64) / z2;

        let mut index = Self {
            options,
            gen_id: 0,
            tiles: HashMap::new(),
            stats: HashMap::new(),
            total: 0,
            empty_tile: Rc::new(Tile::default()),
        };
        let projected =
            project_collection(features, tolerance, options.generate_id, &mut index.gen_id);
        let wrapped = wrap(projected, buffer, options.tile.line_metrics);
        index.split_tile(&wrapped, 0, 0, 0, 0, 0, 0);
        index
    }

    /// The tile at `(z, x, y)`. `x` wraps around the world in either
    /// direction; a `y` outside `[0, 2^z)` yields the empty tile. Requesting
    /// `z > max_zoom` is an error, distinct from "nothing here".
    pub fn get_tile(&mut self, z: u8, x: i64, y: u32) -> Result<&Tile> {
        match self.materialize(z, x, y)? {
            Some(id) => Ok(self.tiles[&id].tile()),
            None => Ok(&*self.empty_tile),
        }
    }

    /// Like [`TileIndex::get_tile`], but hands out a shared snapshot that
    /// stays valid across later lookups and updates.
    pub fn get_tile_shared(&mut self, z: u8, x: i64, y: u32) -> Result<Rc<Tile>> {
        Ok(match self.materialize(z, x, y)? {
            Some(id) => self.tiles[&id].shared(),
            None => self.empty_tile.clone(),
        })
    }

    /// Surgically replaces features in the already-materialized cache.
    ///
    /// For every id in `update`, all materialized features with that id are
    /// removed from every cached tile, and retained source geometry with
    /// that id is purged so a later drill-down cannot resurrect it. The
    /// non-`None` replacement features are then projected, wrapped, and
    /// clipped into each cached tile they touch. Additions are visible in
    /// cached tiles only; tiles drilled after the update start from the
    /// original retained geometry minus the removals.
    pub fn update_features(&mut self, update: &Update) {
        for tile in self.tiles.values_mut() {
            for (id, _) in update {
                tile.remove_feature(id);
            }
        }

        let replacements = update
            .iter()
            .flat_map(|(_, features)| features.iter().flatten().cloned())
            .collect::<Vec<_>>();
        let added = replacements.len();
        let fc = FeatureCollection {
            bbox: None,
            features: replacements,
            foreign_members: None,
        };
        let z2 = (1u32 << self.options.max_zoom) as f64;
        let tolerance = (self.options.tile.tolerance / self.options.tile.extent as f64) / z2;
        let projected =
            project_collection(fc, tolerance, self.options.generate_id, &mut self.gen_id);
        let buffer = self.options.tile.buffer as f64 / self.options.tile.extent as f64;
        let wrapped = wrap(projected, buffer, self.options.tile.line_metrics);
        debug!(removed_ids = update.len(), added, "applying feature update");
        if wrapped.is_empty() {
            return;
        }

        let mut bbox = BBox::collapsed();
        for feature in &wrapped {
            bbox.merge(&feature.bbox);
        }

        let p = 0.5 * self.options.tile.buffer as f64 / self.options.tile.extent as f64;
        let line_metrics = self.options.tile.line_metrics;
        for (key, tile) in self.tiles.iter_mut() {
            let (x, y, z) = from_id(*key);
            let z2 = (1u64 << z) as f64;
            let clipped_x = clip::<0>(
                &wrapped,
                (x as f64 - p) / z2,
                (x as f64 + 1. + p) / z2,
                bbox.min_x,
                bbox.max_x,
                line_metrics,
            );
            let clipped = clip::<1>(
                &clipped_x,
                (y as f64 - p) / z2,
                (y as f64 + 1. + p) / z2,
                bbox.min_y,
                bbox.max_y,
                line_metrics,
            );
            if !clipped.is_empty() {
                tile.insert_features(&clipped);
            }
        }
    }

    pub fn total(&self) -> u32 {
        self.total
    }

    /// Tiles created so far, per zoom level.
    pub fn stats(&self) -> &HashMap<u8, u32> {
        &self.stats
    }

    pub fn internal_tiles(&self) -> &HashMap<u64, InternalTile> {
        &self.tiles
    }

    pub fn options(&self) -> &Options {
        &self.options
    }

    /// Resolves `(z, x, y)` to a cached tile id, drilling down from the
    /// nearest ancestor with retained geometry when needed. `Ok(None)`
    /// means the coordinate holds no data.
    fn materialize(&mut self, z: u8, x: i64, y: u32) -> Result<Option<u64>> {
        if z > self.options.max_zoom {
            return Err(Error::ZoomOutOfRange {
                requested: z,
                max_zoom: self.options.max_zoom,
            });
        }
        let z2 = 1i64 << z;
        let x = (((x % z2) + z2) % z2) as u32;
        if y as u64 >= 1u64 << z {
            return Ok(None);
        }
        let id = to_id(z, x, y);
        if self.tiles.contains_key(&id) {
            return Ok(Some(id));
        }

        debug!(z, x, y, "tile cache miss, drilling down");
        let (source, pz, px, py) = {
            let parent = self.find_parent(z, x, y).ok_or(Error::ParentNotFound)?;
            (
                parent.source_features.clone(),
                parent.z,
                parent.x,
                parent.y,
            )
        };
        self.split_tile(&source, pz, px, py, z, x, y);
        Ok(self.tiles.contains_key(&id).then_some(id))
    }

    /// Deepest cached ancestor of `(z, x, y)`, excluding the tile itself.
    fn find_parent(&self, z: u8, x: u32, y: u32) -> Option<&InternalTile> {
        let (mut z0, mut x0, mut y0) = (z, x, y);
        while z0 != 0 {
            z0 -= 1;
            x0 /= 2;
            y0 /= 2;
            if let Some(parent) = self.tiles.get(&to_id(z0, x0, y0)) {
                return Some(parent);
            }
        }
        None
    }

    /// Splits `features` from tile `(z, x, y)` into sub-tiles.
    ///
    /// With no target (`cz == 0`) this is the build pass: it stops at the
    /// index depth or once a tile is simple enough, retaining source
    /// geometry for later drill-down. With a target it descends only the
    /// ancestor chain of `(cz, cx, cy)`, stopping at the target or at max
    /// zoom. A tile's retained geometry is cleared as soon as its four
    /// children have been cut from it.
    fn split_tile(
        &mut self,
        features: &[Rc<ProjFeature>],
        z: u8,
        x: u32,
        y: u32,
        cz: u8,
        cx: u32,
        cy: u32,
    ) {
        let z2 = (1u32 << z) as f64;
        let id = to_id(z, x, y);

        if !self.tiles.contains_key(&id) {
            let tolerance = if z == self.options.max_zoom {
                0.
            } else {
                self.options.tile.tolerance / (z2 * self.options.tile.extent as f64)
            };
            debug!(z, x, y, features = features.len(), "materializing tile");
            self.tiles.insert(
                id,
                InternalTile::new(
                    features,
                    z,
                    x,
                    y,
                    self.options.tile.extent,
                    tolerance,
                    self.options.tile.line_metrics,
                ),
            );
            *self.stats.entry(z).or_insert(0) += 1;
            self.total += 1;
        }
        let tile = self.tiles.get_mut(&id).expect("tile was just inserted");

        if features.is_empty() {
            return;
        }

        if cz == 0 {
            // Build pass: stop at the index depth or when the tile is simple.
            if z == self.options.index_max_zoom
                || tile.tile().num_points <= self.options.index_max_points
            {
                tile.source_features = features.to_vec();
                return;
            }
        } else {
            if z == self.options.max_zoom {
                // Nothing deeper can ever be requested.
                tile.source_features.clear();
                return;
            }
            if z == cz {
                // Target reached; keep geometry for drilling deeper later.
                tile.source_features = features.to_vec();
                return;
            }
            let m = 1u32 << (cz - z);
            if x != cx / m || y != cy / m {
                // Off the target's ancestor chain.
                tile.source_features = features.to_vec();
                return;
            }
        }

        tile.source_features.clear();
        let bbox = tile.bbox;

        let p = 0.5 * self.options.tile.buffer as f64 / self.options.tile.extent as f64;
        let line_metrics = self.options.tile.line_metrics;
        let (xf, yf) = (x as f64, y as f64);

        let left = clip::<0>(
            features,
            (xf - p) / z2,
            (xf + 0.5 + p) / z2,
            bbox.min_x,
            bbox.max_x,
            line_metrics,
        );
        let right = clip::<0>(
            features,
            (xf + 0.5 - p) / z2,
            (xf + 1. + p) / z2,
            bbox.min_x,
            bbox.max_x,
            line_metrics,
        );

        let quadrant = |half: &[Rc<ProjFeature>], k1: f64, k2: f64| {
            clip::<1>(half, k1, k2, bbox.min_y, bbox.max_y, line_metrics)
        };
        let top = ((yf - p) / z2, (yf + 0.5 + p) / z2);
        let bottom = ((yf + 0.5 - p) / z2, (yf + 1. + p) / z2);

        let quads = [
            (quadrant(&left, top.0, top.1), x * 2, y * 2),
            (quadrant(&left, bottom.0, bottom.1), x * 2, y * 2 + 1),
            (quadrant(&right, top.0, top.1), x * 2 + 1, y * 2),
            (quadrant(&right, bottom.0, bottom.1), x * 2 + 1, y * 2 + 1),
        ];
        for (quad, qx, qy) in quads {
            if !quad.is_empty() {
                self.split_tile(&quad, z + 1, qx, qy, cz, cx, cy);
            }
        }
    }
}

/// One-shot slicer: cuts a single tile out of a GeoJSON value without
/// building an index. `wrap_input` applies antimeridian handling;
/// `clip_input` (forced on by line metrics) clips to the buffered tile
/// square. Feature ids are passed through untouched.
pub fn geojson_to_tile(
    geojson: &GeoJson,
    z: u8,
    x: u32,
    y: u32,
    options: &TileOptions,
    wrap_input: bool,
    clip_input: bool,
) -> Tile {
    let fc = to_feature_collection(geojson);
    let z2 = (1u32 << z) as f64;
    let tolerance = (options.tolerance / options.extent as f64) / z2;
    let buffer = options.buffer as f64 / options.extent as f64;

    let mut gen_id = 0u64;
    let projected = project_collection(fc, tolerance, false, &mut gen_id);
    let mut features = if wrap_input {
        wrap(projected, buffer, options.line_metrics)
    } else {
        projected.into_iter().map(Rc::new).collect()
    };

    if clip_input || options.line_metrics {
        let (xf, yf) = (x as f64, y as f64);
        let clipped_x = clip::<0>(
            &features,
            (xf - buffer) / z2,
            (xf + 1. + buffer) / z2,
            -1.,
            2.,
            options.line_metrics,
        );
        features = clip::<1>(
            &clipped_x,
            (yf - buffer) / z2,
            (yf + 1. + buffer) / z2,
            -1.,
            2.,
            options.line_metrics,
        );
    }

    InternalTile::new(
        &features,
        z,
        x,
        y,
        options.extent,
        tolerance,
        options.line_metrics,
    )
    .into_tile()
}

/// Packs a tile coordinate into one `u64`: `((2^z * y + x) * 32) + z`.
#[inline]
pub fn to_id(z: u8, x: u32, y: u32) -> u64 {
    ((1u64 << z) * y as u64 + x as u64) * 32 + z as u64
}

/// Exact inverse of [`to_id`]; returns `(x, y, z)`.
#[inline]
pub fn from_id(id: u64) -> (u32, u32, u8) {
    let z = (id & 31) as u8;
    let pos = id >> 5;
    let z2 = 1u64 << z;
    ((pos % z2) as u32, (pos / z2) as u32, z)
}

fn to_feature_collection(geojson: &GeoJson) -> FeatureCollection {
    match geojson {
        GeoJson::Geometry(geometry) => FeatureCollection {
            bbox: None,
            features: vec![Feature {
                bbox: None,
                geometry: Some(geometry.clone()),
                id: None,
                properties: None,
                foreign_members: None,
            }],
            foreign_members: None,
        },
        GeoJson::Feature(feature) => FeatureCollection {
            bbox: None,
            features: vec![feature.clone()],
            foreign_members: None,
        },
        GeoJson::FeatureCollection(fc) => fc.clone(),
    }
}
