use std::rc::Rc;

use crate::clip::clip;
use crate::types::ProjFeature;

/// Replicates antimeridian-crossing geometry across world copies.
///
/// `buffer` is the tile buffer in unit-square units. Geometry within
/// `buffer` of either side of the antimeridian is clipped out, shifted by a
/// whole world, and merged back so that tiles at the date line see both
/// halves. Input that never strays near the seam is returned untouched.
pub fn wrap(features: Vec<ProjFeature>, buffer: f64, line_metrics: bool) -> Vec<Rc<ProjFeature>> {
    let features = features.into_iter().map(Rc::new).collect::<Vec<_>>();

    // Bands beyond each edge of the unit square, in world copies.
    let left = clip::<0>(&features, -1. - buffer, buffer, -1., 2., line_metrics);
    let right = clip::<0>(&features, 1. - buffer, 2. + buffer, -1., 2., line_metrics);

    if left.is_empty() && right.is_empty() {
        return features;
    }

    let mut merged = clip::<0>(&features, -buffer, 1. + buffer, -1., 2., line_metrics);
    merged.splice(0..0, left.into_iter().map(|f| shift_feature(&f, 1.)));
    merged.extend(right.into_iter().map(|f| shift_feature(&f, -1.)));
    merged
}

/// Copies a feature with every x coordinate moved by `offset` worlds.
fn shift_feature(feature: &ProjFeature, offset: f64) -> Rc<ProjFeature> {
    let mut shifted = (*feature).clone();
    shifted.geometry.each_point_mut(&mut |p| p.x += offset);
    shifted.bbox.min_x += offset;
    shifted.bbox.max_x += offset;
    Rc::new(shifted)
}
