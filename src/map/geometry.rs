use crate::map::globe;
use crate::map::projection::Projection;
use crate::scene::fmt_num;
use geo::{BoundingRect, Centroid, LineString, MultiLineString, MultiPoint, MultiPolygon, Point, Polygon};
use geojson::{Geometry, Value};

/// Radius of the circle drawn for point geometries
pub const POINT_RADIUS: f64 = 4.5;

const EPSILON: f64 = 1e-6;

/// Projected outline of one geometry, ready for the scene
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Shape {
    /// SVG path data; empty when nothing survived projection
    pub d: String,
    /// Planar centroid of the projected geometry
    pub centroid: Option<[f64; 2]>,
    /// `[[x0, y0], [x1, y1]]` of the projected geometry
    pub bounds: Option<[[f64; 2]; 2]>,
}

/// Turns GeoJSON geometries into SVG path data through one projection.
///
/// Every layer of a map draws through the same `GeoPath`, so all of them
/// agree on where a coordinate lands.
#[derive(Clone, Debug, PartialEq)]
pub struct GeoPath {
    projection: Projection,
}

impl GeoPath {
    pub fn new(projection: Projection) -> Self {
        Self { projection }
    }

    pub fn projection(&self) -> &Projection {
        &self.projection
    }

    /// Project a single `(lon, lat)` pair
    pub fn point(&self, lon: f64, lat: f64) -> Option<[f64; 2]> {
        self.projection.project(lon, lat)
    }

    /// Path data, centroid and bounds of a geometry
    pub fn shape(&self, geometry: &Geometry) -> Shape {
        let mut acc = ShapeBuilder::default();
        self.collect(&geometry.value, &mut acc);
        acc.finish()
    }

    fn collect(&self, value: &Value, acc: &mut ShapeBuilder) {
        match value {
            Value::Point(pos) => {
                if let Some(p) = position(pos).and_then(|(lon, lat)| self.point(lon, lat)) {
                    acc.point(p);
                }
            }
            Value::MultiPoint(points) => {
                for p in points.iter().filter_map(|pos| position(pos)) {
                    if let Some(p) = self.point(p.0, p.1) {
                        acc.point(p);
                    }
                }
            }
            Value::LineString(coords) => {
                acc.line(self.runs(coords.iter().filter_map(|c| position(c))));
            }
            Value::MultiLineString(lines) => {
                for coords in lines {
                    acc.line(self.runs(coords.iter().filter_map(|c| position(c))));
                }
            }
            Value::Polygon(rings) => acc.polygon(self.rings(rings)),
            Value::MultiPolygon(polygons) => {
                for rings in polygons {
                    acc.polygon(self.rings(rings));
                }
            }
            Value::GeometryCollection(geometries) => {
                for g in geometries {
                    self.collect(&g.value, acc);
                }
            }
        }
    }

    fn rings(&self, rings: &[Vec<Vec<f64>>]) -> Vec<Vec<Vec<[f64; 2]>>> {
        rings
            .iter()
            .map(|ring| self.runs(ring.iter().filter_map(|c| position(c))))
            .collect()
    }

    /// Project a coordinate sequence, splitting it wherever a point is clipped
    fn runs(&self, coords: impl Iterator<Item = (f64, f64)>) -> Vec<Vec<[f64; 2]>> {
        let mut runs = Vec::new();
        let mut current: Vec<[f64; 2]> = Vec::new();
        for (lon, lat) in coords {
            match self.point(lon, lat) {
                Some(p) => current.push(p),
                None => {
                    if current.len() > 1 {
                        runs.push(std::mem::take(&mut current));
                    }
                    current.clear();
                }
            }
        }
        if current.len() > 1 {
            runs.push(current);
        }
        runs
    }

    /// Path data of an unclosed line through `coords` (`(lon, lat)` pairs)
    pub fn line(&self, coords: &[(f64, f64)]) -> String {
        self.line_with_length(coords).0
    }

    /// Path data of a line and its on-screen length
    pub fn line_with_length(&self, coords: &[(f64, f64)]) -> (String, f64) {
        let runs = self.runs(coords.iter().copied());
        let mut d = String::new();
        let mut length = 0.0;
        for run in &runs {
            write_run(&mut d, run, false);
            length += polyline_length(run);
        }
        (d, length)
    }

    /// Path data of several lines in one path
    pub fn lines(&self, lines: &[Vec<(f64, f64)>]) -> String {
        lines.iter().map(|l| self.line(l)).collect()
    }

    /// Great-circle path between two `(lon, lat)` points and its on-screen length
    pub fn great_arc(&self, from: (f64, f64), to: (f64, f64)) -> (String, f64) {
        self.line_with_length(&globe::great_arc(from, to))
    }

    /// Outline of the whole sphere: the clip circle for clipped projections,
    /// otherwise the projected edge of the lon/lat rectangle
    pub fn sphere(&self) -> String {
        if self.projection.clip_angle().is_some() {
            let [cx, cy] = self.projection.translate();
            let r = self.projection.scale();
            return format!(
                "M{},{}A{r},{r} 0 1,1 {},{}A{r},{r} 0 1,1 {},{}Z",
                fmt_num(cx),
                fmt_num(cy - r),
                fmt_num(cx),
                fmt_num(cy + r),
                fmt_num(cx),
                fmt_num(cy - r),
                r = fmt_num(r)
            );
        }

        let mut outline = Vec::new();
        let mut lon = -180.0;
        while lon < 180.0 {
            outline.push((lon, 90.0 - EPSILON));
            lon += 2.5;
        }
        let mut lon = 180.0;
        while lon > -180.0 {
            outline.push((lon, -90.0 + EPSILON));
            lon -= 2.5;
        }
        outline.push((-180.0, 90.0 - EPSILON));
        let mut d = self.line(&outline);
        d.push('Z');
        d
    }
}

fn position(pos: &[f64]) -> Option<(f64, f64)> {
    match pos {
        [lon, lat, ..] => Some((*lon, *lat)),
        _ => None,
    }
}

fn write_run(d: &mut String, run: &[[f64; 2]], close: bool) {
    for (i, [x, y]) in run.iter().enumerate() {
        d.push(if i == 0 { 'M' } else { 'L' });
        d.push_str(&fmt_num(*x));
        d.push(',');
        d.push_str(&fmt_num(*y));
    }
    if close {
        d.push('Z');
    }
}

fn circle(d: &mut String, [x, y]: [f64; 2], r: f64) {
    d.push_str(&format!(
        "M{},{}m0,{r}a{r},{r} 0 1,1 0,{}a{r},{r} 0 1,1 0,{}z",
        fmt_num(x),
        fmt_num(y),
        fmt_num(-2.0 * r),
        fmt_num(2.0 * r),
        r = fmt_num(r)
    ));
}

/// Accumulates path data plus the planar pieces needed for centroid and bounds
#[derive(Default)]
struct ShapeBuilder {
    d: String,
    points: Vec<[f64; 2]>,
    lines: Vec<LineString>,
    polygons: Vec<Polygon>,
    all: Vec<(f64, f64)>,
}

impl ShapeBuilder {
    fn point(&mut self, p: [f64; 2]) {
        circle(&mut self.d, p, POINT_RADIUS);
        self.points.push(p);
        self.all.push((p[0], p[1]));
    }

    fn line(&mut self, runs: Vec<Vec<[f64; 2]>>) {
        for run in runs {
            write_run(&mut self.d, &run, false);
            self.all.extend(run.iter().map(|p| (p[0], p[1])));
            self.lines.push(to_linestring(&run));
        }
    }

    fn polygon(&mut self, rings: Vec<Vec<Vec<[f64; 2]>>>) {
        let mut rings = rings.into_iter();
        let Some(exterior) = rings.next() else {
            return;
        };
        // An exterior that survived in one piece keeps its holes; a split one
        // contributes each piece as its own outline.
        let whole = exterior.len() == 1;
        let mut outer: Vec<LineString> = Vec::new();
        for run in &exterior {
            write_run(&mut self.d, run, whole);
            self.all.extend(run.iter().map(|p| (p[0], p[1])));
            if run.len() > 2 {
                outer.push(to_linestring(run));
            }
        }
        let mut holes = Vec::new();
        for ring in rings {
            let whole_hole = ring.len() == 1;
            for run in &ring {
                write_run(&mut self.d, run, whole_hole);
                if whole_hole && run.len() > 2 {
                    holes.push(to_linestring(run));
                }
            }
        }
        if whole {
            if let Some(ext) = outer.pop() {
                self.polygons.push(Polygon::new(ext, holes));
            }
        } else {
            self.polygons
                .extend(outer.into_iter().map(|ext| Polygon::new(ext, Vec::new())));
        }
    }

    fn finish(self) -> Shape {
        let centroid = if !self.polygons.is_empty() {
            MultiPolygon::new(self.polygons).centroid()
        } else if !self.lines.is_empty() {
            MultiLineString::new(self.lines).centroid()
        } else {
            MultiPoint::from(self.points.iter().map(|p| Point::new(p[0], p[1])).collect::<Vec<_>>()).centroid()
        };
        let bounds = MultiPoint::from(self.all).bounding_rect().map(|rect| {
            let (min, max) = (rect.min(), rect.max());
            [[min.x, min.y], [max.x, max.y]]
        });
        Shape {
            d: self.d,
            centroid: centroid.map(|p| [p.x(), p.y()]),
            bounds,
        }
    }
}

fn to_linestring(run: &[[f64; 2]]) -> LineString {
    LineString::from(run.iter().map(|p| (p[0], p[1])).collect::<Vec<_>>())
}

/// Total length of a polyline
pub fn polyline_length(points: &[[f64; 2]]) -> f64 {
    points
        .windows(2)
        .map(|w| (w[1][0] - w[0][0]).hypot(w[1][1] - w[0][1]))
        .sum()
}

/// Approximate length of a cubic Bézier by sampling it into a polyline
pub fn cubic_length(p0: [f64; 2], p1: [f64; 2], p2: [f64; 2], p3: [f64; 2]) -> f64 {
    const SAMPLES: usize = 64;
    let at = |t: f64| {
        let u = 1.0 - t;
        let (a, b, c, d) = (u * u * u, 3.0 * u * u * t, 3.0 * u * t * t, t * t * t);
        [
            a * p0[0] + b * p1[0] + c * p2[0] + d * p3[0],
            a * p0[1] + b * p1[1] + c * p2[1] + d * p3[1],
        ]
    };
    let points: Vec<[f64; 2]> = (0..=SAMPLES).map(|i| at(i as f64 / SAMPLES as f64)).collect();
    polyline_length(&points)
}

/// Meridians and parallels every `step` degrees, sampled every `precision`
/// degrees. Minor lines stop at ±80° latitude; the major meridians every 90°
/// and the equator run the full extent.
pub fn graticule_lines(step: f64, precision: f64) -> Vec<Vec<(f64, f64)>> {
    const MAJOR_X: f64 = 90.0;
    const MAJOR_Y: f64 = 360.0;
    let (x0, x1, y0, y1) = (-180.0, 180.0, -80.0 - EPSILON, 80.0 + EPSILON);
    let (mx0, mx1, my0, my1) = (-180.0, 180.0, -90.0 + EPSILON, 90.0 - EPSILON);

    let meridian = |x: f64, lo: f64, hi: f64| -> Vec<(f64, f64)> {
        samples(lo, hi, precision).into_iter().map(|y| (x, y)).collect()
    };
    let parallel = |y: f64, lo: f64, hi: f64| -> Vec<(f64, f64)> {
        samples(lo, hi, precision).into_iter().map(|x| (x, y)).collect()
    };

    let mut lines = Vec::new();
    lines.extend(range((mx0 / MAJOR_X).ceil() * MAJOR_X, mx1, MAJOR_X).into_iter().map(|x| meridian(x, my0, my1)));
    lines.extend(range((my0 / MAJOR_Y).ceil() * MAJOR_Y, my1, MAJOR_Y).into_iter().map(|y| parallel(y, mx0, mx1)));
    lines.extend(
        range((x0 / step).ceil() * step, x1, step)
            .into_iter()
            .filter(|x| (x % MAJOR_X).abs() > EPSILON)
            .map(|x| meridian(x, y0, y1)),
    );
    lines.extend(
        range((y0 / step).ceil() * step, y1, step)
            .into_iter()
            .filter(|y| (y % MAJOR_Y).abs() > EPSILON)
            .map(|y| parallel(y, x0, x1)),
    );
    lines
}

fn range(start: f64, stop: f64, step: f64) -> Vec<f64> {
    if step <= 0.0 || stop <= start {
        return Vec::new();
    }
    let n = ((stop - start) / step).ceil() as usize;
    (0..n).map(|i| start + i as f64 * step).collect()
}

fn samples(lo: f64, hi: f64, precision: f64) -> Vec<f64> {
    let mut values = range(lo, hi - EPSILON, precision);
    values.push(hi);
    values
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::map::projection::ProjectionKind;

    fn identity_path() -> GeoPath {
        // Equirectangular at 180/pi maps one degree to one pixel
        GeoPath::new(Projection::new(
            ProjectionKind::Equirectangular,
            180.0 / std::f64::consts::PI,
            [0.0, 0.0],
        ))
    }

    fn square(x: f64, y: f64, size: f64) -> Geometry {
        Geometry::new(Value::Polygon(vec![vec![
            vec![x, y],
            vec![x + size, y],
            vec![x + size, y + size],
            vec![x, y + size],
            vec![x, y],
        ]]))
    }

    #[test]
    fn test_polygon_path_and_centroid() {
        let shape = identity_path().shape(&square(0.0, 0.0, 10.0));
        assert!(shape.d.starts_with("M0,0L10,0L10,-10"));
        assert!(shape.d.ends_with('Z'));
        let [cx, cy] = shape.centroid.unwrap();
        assert!((cx - 5.0).abs() < 1e-9);
        assert!((cy + 5.0).abs() < 1e-9);
        let [[x0, y0], [x1, y1]] = shape.bounds.unwrap();
        assert!(x0.abs() < 1e-9 && (y0 + 10.0).abs() < 1e-9);
        assert!((x1 - 10.0).abs() < 1e-9 && y1.abs() < 1e-9);
    }

    #[test]
    fn test_point_draws_circle() {
        let shape = identity_path().shape(&Geometry::new(Value::Point(vec![3.0, 4.0])));
        assert_eq!(shape.d, "M3,-4m0,4.5a4.5,4.5 0 1,1 0,-9a4.5,4.5 0 1,1 0,9z");
        let [cx, cy] = shape.centroid.unwrap();
        assert!((cx - 3.0).abs() < 1e-9 && (cy + 4.0).abs() < 1e-9);
    }

    #[test]
    fn test_clipped_points_break_the_line() {
        let globe = GeoPath::new(Projection::new(ProjectionKind::Orthographic, 100.0, [0.0, 0.0]).into_globe(
            100.0,
            90.0,
            [0.0, 0.0],
        ));
        let d = globe.line(&[(0.0, 0.0), (10.0, 0.0), (180.0, 0.0), (20.0, 0.0), (30.0, 0.0)]);
        assert_eq!(d.matches('M').count(), 2);
    }

    #[test]
    fn test_sphere_outline_for_globe() {
        let globe = GeoPath::new(Projection::new(ProjectionKind::Orthographic, 250.0, [480.0, 300.0]).into_globe(
            250.0,
            90.0,
            [97.0, 0.0],
        ));
        assert_eq!(globe.sphere(), "M480,50A250,250 0 1,1 480,550A250,250 0 1,1 480,50Z");
    }

    #[test]
    fn test_line_length() {
        let (d, length) = identity_path().line_with_length(&[(0.0, 0.0), (3.0, 4.0)]);
        assert_eq!(d, "M0,0L3,-4");
        assert!((length - 5.0).abs() < 1e-9);
    }

    #[test]
    fn test_cubic_length_of_straight_curve() {
        let length = cubic_length([0.0, 0.0], [0.0, 0.0], [10.0, 0.0], [10.0, 0.0]);
        assert!((length - 10.0).abs() < 1e-6);
    }

    #[test]
    fn test_graticule_line_count() {
        let lines = graticule_lines(10.0, 2.5);
        // 4 major meridians, the equator, 32 minor meridians, 16 minor parallels
        assert_eq!(lines.len(), 53);
        assert!(lines.iter().all(|l| l.len() > 2));
    }
}
