//! Slices GeoJSON into vector tiles on the fly.
//!
//! Feed [`TileIndex`] an in-memory feature collection and it pre-builds a
//! pyramid of tiles up to a configured index depth, keeping enough source
//! geometry around to drill down to any deeper `(z, x, y)` on demand. Tiles
//! come back as feature collections in tile-local integer coordinates,
//! ready for encoding or rendering. [`geojson_to_tile`] cuts a single tile
//! without an index, and [`TileIndex::update_features`] patches features
//! in and out of an existing cache.

mod clip;
mod error;
mod index;
mod project;
mod simplify;
mod tile;
mod types;
mod wrap;

pub use error::{Error, Result};
pub use index::{Options, TileIndex, TileOptions, Update, geojson_to_tile};
pub use tile::{
    InternalTile, Tile, TileFeature, TileGeometry, TileLineString, TileMultiLineString,
    TileMultiPoint, TileMultiPolygon, TilePoint, TilePolygon, TileRing,
};
pub use types::{
    BBox, ProjFeature, ProjGeometry, ProjLineString, ProjMultiLineString, ProjMultiPoint,
    ProjMultiPolygon, ProjPoint, ProjPolygon, ProjRing,
};
