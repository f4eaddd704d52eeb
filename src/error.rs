use thiserror::Error;

/// Failures surfaced by the tiling engine.
///
/// Only [`Error::ZoomOutOfRange`] can be triggered through correct use of
/// the public API; the remaining kinds exist for parsing collaborators and
/// for structural bugs that should never occur in a well-formed pyramid.
#[derive(Debug, Error, PartialEq)]
pub enum Error {
    /// The input value is not a geometry, feature, or feature collection.
    /// Raised by parsing collaborators; typed `geojson` input cannot hit it.
    #[error("root of the input must be a geometry, feature, or feature collection")]
    InvalidGeoJsonRoot,

    /// A coordinate pair is not a two-element numeric vector. Raised by
    /// parsing collaborators, never by the core.
    #[error("coordinates must be two-element numeric arrays")]
    InvalidCoordinate,

    /// The materializer met a geometry variant outside the supported set.
    #[error("unsupported geometry variant")]
    UnsupportedGeometry,

    /// `get_tile` was called with a zoom deeper than `max_zoom`.
    #[error("requested zoom {requested} higher than max_zoom {max_zoom}")]
    ZoomOutOfRange { requested: u8, max_zoom: u8 },

    /// Drill-down could not locate any cached ancestor. The root tile is
    /// always allocated, so this indicates a corrupted index.
    #[error("no cached ancestor tile found")]
    ParentNotFound,
}

pub type Result<T> = std::result::Result<T, Error>;
