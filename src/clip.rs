use std::rc::Rc;

use crate::types::{
    ProjFeature, ProjGeometry, ProjGeometryCollection, ProjLineString, ProjMultiPolygon,
    ProjPoint, ProjPolygon, ProjRing, calc_progress, get_coordinate, get_range, intersect,
};

/// Clips a feature list against the axis-parallel strip `[k1, k2]`.
///
/// `I` selects the axis (0 cuts by x, 1 by y). `min_all`/`max_all` span the
/// whole input along that axis and drive the trivial gates: accept is
/// `min_all >= k1 && max_all < k2` (half-open on the upper edge so a vertex
/// sitting exactly on `k2` is not claimed by two adjacent strips), reject is
/// `max_all < k1 || min_all >= k2`. Per-feature bbox gates mirror both.
///
/// Features that survive untouched are aliased (`Rc` clone), never copied;
/// clipped features share the original property map. With `line_metrics`
/// set, every line slice is emitted as its own feature so each can carry its
/// own distance range along the source line.
pub fn clip<const I: usize>(
    features: &[Rc<ProjFeature>],
    k1: f64,
    k2: f64,
    min_all: f64,
    max_all: f64,
    line_metrics: bool,
) -> Vec<Rc<ProjFeature>> {
    if min_all >= k1 && max_all < k2 {
        return features.to_vec();
    }
    if max_all < k1 || min_all >= k2 {
        return Vec::new();
    }

    let mut clipped = Vec::with_capacity(features.len());
    for feature in features {
        let (min, max) = get_range::<I>(&feature.bbox);
        if min >= k1 && max < k2 {
            clipped.push(feature.clone());
            continue;
        }
        if max < k1 || min >= k2 {
            continue;
        }

        let clipper = Clipper::<I>::new(k1, k2, line_metrics);
        let Some(geometry) = clipper.clip_geometry(&feature.geometry) else {
            continue;
        };

        if line_metrics {
            if let ProjGeometry::MultiLineString(slices) = &geometry {
                for slice in slices {
                    if let Some(f) = ProjFeature::new(
                        ProjGeometry::LineString(slice.clone()),
                        feature.properties.clone(),
                        feature.id.clone(),
                    ) {
                        clipped.push(Rc::new(f));
                    }
                }
                continue;
            }
        }
        if let Some(f) =
            ProjFeature::new(geometry, feature.properties.clone(), feature.id.clone())
        {
            clipped.push(Rc::new(f));
        }
    }
    clipped
}

struct Clipper<const I: usize> {
    k1: f64,
    k2: f64,
    line_metrics: bool,
}

impl<const I: usize> Clipper<I> {
    fn new(k1: f64, k2: f64, line_metrics: bool) -> Self {
        Self {
            k1,
            k2,
            line_metrics,
        }
    }

    fn clip_geometry(&self, geometry: &ProjGeometry) -> Option<ProjGeometry> {
        match geometry {
            ProjGeometry::Point(point) => self.clip_point(point),
            ProjGeometry::MultiPoint(points) => self.clip_points(points),
            ProjGeometry::LineString(line) => {
                let mut slices = Vec::new();
                self.clip_line(line, &mut slices);
                Self::collect_lines(slices)
            }
            ProjGeometry::MultiLineString(lines) => {
                let mut slices = Vec::new();
                for line in lines {
                    self.clip_line(line, &mut slices);
                }
                Self::collect_lines(slices)
            }
            ProjGeometry::Polygon(polygon) => {
                let rings = self.clip_rings(polygon);
                if rings.is_empty() {
                    None
                } else {
                    Some(ProjGeometry::Polygon(rings))
                }
            }
            ProjGeometry::MultiPolygon(polygons) => {
                let mut parts: ProjMultiPolygon = Vec::new();
                for polygon in polygons {
                    let rings = self.clip_rings(polygon);
                    if !rings.is_empty() {
                        parts.push(rings);
                    }
                }
                if parts.is_empty() {
                    None
                } else {
                    Some(ProjGeometry::MultiPolygon(parts))
                }
            }
            ProjGeometry::Collection(members) => {
                let parts = members
                    .iter()
                    .filter_map(|g| self.clip_geometry(g))
                    .collect::<ProjGeometryCollection>();
                if parts.is_empty() {
                    None
                } else {
                    Some(ProjGeometry::Collection(parts))
                }
            }
        }
    }

    fn clip_point(&self, point: &ProjPoint) -> Option<ProjGeometry> {
        let v = get_coordinate::<I>(point);
        if v < self.k1 || v > self.k2 {
            None
        } else {
            Some(ProjGeometry::Point(*point))
        }
    }

    fn clip_points(&self, points: &[ProjPoint]) -> Option<ProjGeometry> {
        let kept = points
            .iter()
            .filter(|p| {
                let v = get_coordinate::<I>(p);
                v >= self.k1 && v <= self.k2
            })
            .copied()
            .collect::<Vec<_>>();
        if kept.is_empty() {
            None
        } else {
            Some(ProjGeometry::MultiPoint(kept))
        }
    }

    fn collect_lines(mut slices: Vec<ProjLineString>) -> Option<ProjGeometry> {
        match slices.len() {
            0 => None,
            1 => Some(ProjGeometry::LineString(slices.pop().unwrap())),
            _ => Some(ProjGeometry::MultiLineString(slices)),
        }
    }

    /// Cuts one polyline into slices inside the strip.
    ///
    /// Interior vertices keep their original importance; only generated
    /// intersection vertices are forced to `z = 1`. In metrics mode the
    /// running unclipped length is tracked so each slice learns where along
    /// the source line it starts and ends.
    fn clip_line(&self, line: &ProjLineString, slices: &mut Vec<ProjLineString>) {
        let len = line.points.len();
        if len < 2 {
            return;
        }
        let (k1, k2) = (self.k1, self.k2);
        let mut line_len = line.seg_start;
        let mut slice = self.new_slice(line);

        for i in 0..len - 1 {
            let a = line.points[i];
            let b = line.points[i + 1];
            let ak = get_coordinate::<I>(&a);
            let bk = get_coordinate::<I>(&b);
            let last_seg = i == len - 2;
            // Manhattan, matching how the projector measures `dist`.
            let seg_len = if self.line_metrics {
                (b.x - a.x).abs() + (b.y - a.y).abs()
            } else {
                0.
            };

            if ak < k1 {
                if bk > k2 {
                    // spans the whole strip
                    let t1 = calc_progress::<I>(&a, &b, k1);
                    slice.points.push(intersect::<I>(&a, &b, k1, t1));
                    let t2 = calc_progress::<I>(&a, &b, k2);
                    slice.points.push(intersect::<I>(&a, &b, k2, t2));
                    if self.line_metrics {
                        slice.seg_start = line_len + seg_len * t1;
                        slice.seg_end = line_len + seg_len * t2;
                    }
                    self.flush(&mut slice, line, slices);
                } else if bk >= k1 {
                    // enters the strip
                    let t = calc_progress::<I>(&a, &b, k1);
                    slice.points.push(intersect::<I>(&a, &b, k1, t));
                    if self.line_metrics {
                        slice.seg_start = line_len + seg_len * t;
                    }
                    if last_seg {
                        if self.line_metrics {
                            slice.seg_end = line_len + seg_len;
                        }
                        slice.points.push(b);
                    }
                }
            } else if ak > k2 {
                if bk < k1 {
                    // spans the whole strip, right to left
                    let t2 = calc_progress::<I>(&a, &b, k2);
                    slice.points.push(intersect::<I>(&a, &b, k2, t2));
                    let t1 = calc_progress::<I>(&a, &b, k1);
                    slice.points.push(intersect::<I>(&a, &b, k1, t1));
                    if self.line_metrics {
                        slice.seg_start = line_len + seg_len * t2;
                        slice.seg_end = line_len + seg_len * t1;
                    }
                    self.flush(&mut slice, line, slices);
                } else if bk <= k2 {
                    // enters the strip from above
                    let t = calc_progress::<I>(&a, &b, k2);
                    slice.points.push(intersect::<I>(&a, &b, k2, t));
                    if self.line_metrics {
                        slice.seg_start = line_len + seg_len * t;
                    }
                    if last_seg {
                        if self.line_metrics {
                            slice.seg_end = line_len + seg_len;
                        }
                        slice.points.push(b);
                    }
                }
            } else {
                slice.points.push(a);
                if bk < k1 {
                    // leaves the strip
                    let t = calc_progress::<I>(&a, &b, k1);
                    slice.points.push(intersect::<I>(&a, &b, k1, t));
                    if self.line_metrics {
                        slice.seg_end = line_len + seg_len * t;
                    }
                    self.flush(&mut slice, line, slices);
                } else if bk > k2 {
                    let t = calc_progress::<I>(&a, &b, k2);
                    slice.points.push(intersect::<I>(&a, &b, k2, t));
                    if self.line_metrics {
                        slice.seg_end = line_len + seg_len * t;
                    }
                    self.flush(&mut slice, line, slices);
                } else if last_seg {
                    if self.line_metrics {
                        slice.seg_end = line_len + seg_len;
                    }
                    slice.points.push(b);
                }
            }

            if self.line_metrics {
                line_len += seg_len;
            }
        }

        self.flush(&mut slice, line, slices);
    }

    fn clip_rings(&self, rings: &ProjPolygon) -> ProjPolygon {
        rings
            .iter()
            .filter_map(|ring| self.clip_ring(ring))
            .collect()
    }

    /// Same walk as the line clipper, but accumulating a single ring: exits
    /// do not start a new slice, and the result is re-closed if the cut
    /// opened it.
    fn clip_ring(&self, ring: &ProjRing) -> Option<ProjRing> {
        let len = ring.points.len();
        if len < 2 {
            return None;
        }
        let (k1, k2) = (self.k1, self.k2);
        let mut slice = ProjRing {
            points: Vec::new(),
            area: ring.area,
        };

        for i in 0..len - 1 {
            let a = ring.points[i];
            let b = ring.points[i + 1];
            let ak = get_coordinate::<I>(&a);
            let bk = get_coordinate::<I>(&b);
            let last_seg = i == len - 2;

            if ak < k1 {
                if bk >= k1 {
                    slice
                        .points
                        .push(intersect::<I>(&a, &b, k1, calc_progress::<I>(&a, &b, k1)));
                    if bk > k2 {
                        slice
                            .points
                            .push(intersect::<I>(&a, &b, k2, calc_progress::<I>(&a, &b, k2)));
                    } else if last_seg {
                        slice.points.push(b);
                    }
                }
            } else if ak > k2 {
                if bk <= k2 {
                    slice
                        .points
                        .push(intersect::<I>(&a, &b, k2, calc_progress::<I>(&a, &b, k2)));
                    if bk < k1 {
                        slice
                            .points
                            .push(intersect::<I>(&a, &b, k1, calc_progress::<I>(&a, &b, k1)));
                    } else if last_seg {
                        slice.points.push(b);
                    }
                }
            } else {
                slice.points.push(a);
                if bk < k1 {
                    slice
                        .points
                        .push(intersect::<I>(&a, &b, k1, calc_progress::<I>(&a, &b, k1)));
                } else if bk > k2 {
                    slice
                        .points
                        .push(intersect::<I>(&a, &b, k2, calc_progress::<I>(&a, &b, k2)));
                }
            }
        }

        if let (Some(first), Some(last)) = (slice.points.first(), slice.points.last()) {
            if first != last {
                let first = *first;
                slice.points.push(first);
            }
        }
        if slice.points.len() < 3 {
            None
        } else {
            Some(slice)
        }
    }

    fn new_slice(&self, line: &ProjLineString) -> ProjLineString {
        let mut slice = ProjLineString {
            dist: line.dist,
            ..Default::default()
        };
        if self.line_metrics {
            slice.seg_start = line.seg_start;
            slice.seg_end = line.seg_end;
        }
        slice
    }

    fn flush(
        &self,
        slice: &mut ProjLineString,
        line: &ProjLineString,
        slices: &mut Vec<ProjLineString>,
    ) {
        if !slice.points.is_empty() {
            slices.push(std::mem::replace(slice, self.new_slice(line)));
        }
    }
}
