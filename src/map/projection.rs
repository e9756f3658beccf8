//! Cartographic projections and the factory that fits them to a canvas.

use crate::error::{MapError, Result};
use crate::map::globe::Rotation;
use crate::options::ProjectionConfig;
use std::f64::consts::PI;
use std::str::FromStr;

/// Latitude beyond which Mercator is clamped (the square Web Mercator extent)
const MERCATOR_MAX_LAT: f64 = 85.051_128_779_806_6;

/// Projections a map can be configured with by name
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ProjectionKind {
    Equirectangular,
    Mercator,
    Orthographic,
    Albers,
    ConicEqualArea,
    /// Lower 48 states with Alaska and Hawaii inset
    AlbersUsa,
}

impl FromStr for ProjectionKind {
    type Err = MapError;

    /// Names are matched case-insensitively
    fn from_str(name: &str) -> Result<Self> {
        match name.to_ascii_lowercase().as_str() {
            "equirectangular" => Ok(Self::Equirectangular),
            "mercator" => Ok(Self::Mercator),
            "orthographic" => Ok(Self::Orthographic),
            "albers" => Ok(Self::Albers),
            "conicequalarea" => Ok(Self::ConicEqualArea),
            "albersusa" => Ok(Self::AlbersUsa),
            _ => Err(MapError::UnknownProjection(name.to_string())),
        }
    }
}

/// Conic equal-area constants for a pair of standard parallels
#[derive(Clone, Copy, Debug, PartialEq)]
struct Conic {
    n: f64,
    c: f64,
    rho0: f64,
}

impl Conic {
    fn new(phi0: f64, phi1: f64) -> Self {
        let s0 = phi0.to_radians().sin();
        let s1 = phi1.to_radians().sin();
        let n = (s0 + s1) / 2.0;
        let c = 1.0 + s0 * (2.0 * n - s0);
        Self {
            n,
            c,
            rho0: c.sqrt() / n,
        }
    }

    fn project(&self, lambda: f64, phi: f64) -> [f64; 2] {
        let rho = (self.c - 2.0 * self.n * phi.sin()).max(0.0).sqrt() / self.n;
        let theta = lambda * self.n;
        [rho * theta.sin(), self.rho0 - rho * theta.cos()]
    }
}

/// Unscaled projection formula, working in radians
#[derive(Clone, Copy, Debug, PartialEq)]
enum Raw {
    Equirectangular,
    Mercator,
    Orthographic,
    Conic(Conic),
}

impl Raw {
    fn project(&self, lambda: f64, phi: f64) -> [f64; 2] {
        match self {
            Raw::Equirectangular => [lambda, phi],
            Raw::Mercator => {
                let max = MERCATOR_MAX_LAT.to_radians();
                let phi = phi.clamp(-max, max);
                [lambda, (PI / 4.0 + phi / 2.0).tan().ln()]
            }
            Raw::Orthographic => [phi.cos() * lambda.sin(), phi.sin()],
            Raw::Conic(conic) => conic.project(lambda, phi),
        }
    }
}

/// One rotated, scaled and translated projection
#[derive(Clone, Debug, PartialEq)]
struct Single {
    raw: Raw,
    rotation: Rotation,
    scale: f64,
    translate: [f64; 2],
    center: [f64; 2],
    /// Small-circle clip radius in degrees around the rotated origin
    clip_angle: Option<f64>,
    /// Screen rectangle outside which points are rejected
    clip_extent: Option<[[f64; 2]; 2]>,
    dx: f64,
    dy: f64,
}

impl Single {
    fn new(raw: Raw) -> Self {
        Self {
            raw,
            rotation: Rotation::identity(),
            scale: 150.0,
            translate: [480.0, 250.0],
            center: [0.0, 0.0],
            clip_angle: None,
            clip_extent: None,
            dx: 0.0,
            dy: 0.0,
        }
        .reset()
    }

    fn conic(phi0: f64, phi1: f64) -> Self {
        Self::new(Raw::Conic(Conic::new(phi0, phi1)))
    }

    /// The center is projected unrotated; the offsets place it on `translate`.
    fn reset(mut self) -> Self {
        let [cx, cy] = self
            .raw
            .project(self.center[0].to_radians(), self.center[1].to_radians());
        self.dx = self.translate[0] - cx * self.scale;
        self.dy = self.translate[1] + cy * self.scale;
        self
    }

    fn rotate(mut self, angles: [f64; 3]) -> Self {
        self.rotation = Rotation::new(angles[0], angles[1], angles[2]);
        self
    }

    fn scale(mut self, k: f64) -> Self {
        self.scale = k;
        self.reset()
    }

    fn translate(mut self, t: [f64; 2]) -> Self {
        self.translate = t;
        self.reset()
    }

    fn center(mut self, c: [f64; 2]) -> Self {
        self.center = c;
        self.reset()
    }

    fn clip_angle(mut self, degrees: f64) -> Self {
        self.clip_angle = Some(degrees);
        self
    }

    fn clip_extent(mut self, extent: [[f64; 2]; 2]) -> Self {
        self.clip_extent = Some(extent);
        self
    }

    fn project(&self, lon: f64, lat: f64) -> Option<[f64; 2]> {
        let (lon, lat) = self.rotation.rotate(lon, lat);
        let (lambda, phi) = (lon.to_radians(), lat.to_radians());

        if let Some(angle) = self.clip_angle {
            if lambda.cos() * phi.cos() <= angle.to_radians().cos() {
                return None;
            }
        }

        let [x, y] = self.raw.project(lambda, phi);
        let point = [self.dx + x * self.scale, self.dy - y * self.scale];
        if !point[0].is_finite() || !point[1].is_finite() {
            return None;
        }
        if let Some([[x0, y0], [x1, y1]]) = self.clip_extent {
            if point[0] < x0 || point[0] > x1 || point[1] < y0 || point[1] > y1 {
                return None;
            }
        }
        Some(point)
    }
}

/// Composite of the lower 48, Alaska and Hawaii, each clipped to its own
/// screen rectangle
#[derive(Clone, Debug, PartialEq)]
struct AlbersUsa {
    lower48: Single,
    alaska: Single,
    hawaii: Single,
}

impl AlbersUsa {
    fn new(k: f64, [x, y]: [f64; 2]) -> Self {
        const EPS: f64 = 1e-6;
        let lower48 = albers()
            .scale(k)
            .translate([x, y])
            .clip_extent([[x - 0.455 * k, y - 0.238 * k], [x + 0.455 * k, y + 0.238 * k]]);
        let alaska = Single::conic(55.0, 65.0)
            .rotate([154.0, 0.0, 0.0])
            .center([-2.0, 58.5])
            .scale(k * 0.35)
            .translate([x - 0.307 * k, y + 0.201 * k])
            .clip_extent([
                [x - 0.425 * k + EPS, y + 0.120 * k + EPS],
                [x - 0.214 * k - EPS, y + 0.234 * k - EPS],
            ]);
        let hawaii = Single::conic(8.0, 18.0)
            .rotate([157.0, 0.0, 0.0])
            .center([-3.0, 19.9])
            .scale(k)
            .translate([x - 0.205 * k, y + 0.212 * k])
            .clip_extent([
                [x - 0.214 * k + EPS, y + 0.166 * k + EPS],
                [x - 0.115 * k - EPS, y + 0.234 * k - EPS],
            ]);
        Self {
            lower48,
            alaska,
            hawaii,
        }
    }

    fn project(&self, lon: f64, lat: f64) -> Option<[f64; 2]> {
        self.lower48
            .project(lon, lat)
            .or_else(|| self.alaska.project(lon, lat))
            .or_else(|| self.hawaii.project(lon, lat))
    }
}

fn albers() -> Single {
    Single::conic(29.5, 45.5)
        .rotate([96.0, 0.0, 0.0])
        .center([-0.6, 38.7])
}

#[derive(Clone, Debug, PartialEq)]
enum Inner {
    Single(Single),
    Composite(Box<AlbersUsa>),
}

/// A configured map projection from lon/lat degrees to canvas pixels
#[derive(Clone, Debug, PartialEq)]
pub struct Projection {
    kind: ProjectionKind,
    scale: f64,
    translate: [f64; 2],
    inner: Inner,
}

impl Projection {
    /// Build a projection with the given scale and translation and the
    /// kind's standard rotation, center and parallels
    pub fn new(kind: ProjectionKind, scale: f64, translate: [f64; 2]) -> Self {
        let inner = match kind {
            ProjectionKind::AlbersUsa => Inner::Composite(Box::new(AlbersUsa::new(scale, translate))),
            _ => {
                let single = match kind {
                    ProjectionKind::Mercator => Single::new(Raw::Mercator),
                    ProjectionKind::Orthographic => Single::new(Raw::Orthographic),
                    ProjectionKind::Albers => albers(),
                    ProjectionKind::ConicEqualArea => Single::conic(0.0, 60.0),
                    _ => Single::new(Raw::Equirectangular),
                };
                Inner::Single(single.scale(scale).translate(translate))
            }
        };
        Self {
            kind,
            scale,
            translate,
            inner,
        }
    }

    /// Clip to a small circle of `degrees` around the rotated origin and
    /// rotate by `[lambda, phi]`; only meaningful for single projections
    pub fn into_globe(mut self, scale: f64, clip_angle: f64, rotation: [f64; 2]) -> Self {
        self.inner = match self.inner {
            Inner::Single(single) => {
                self.scale = scale;
                Inner::Single(
                    single
                        .scale(scale)
                        .clip_angle(clip_angle)
                        .rotate([rotation[0], rotation[1], 0.0]),
                )
            }
            composite => composite,
        };
        self
    }

    pub fn kind(&self) -> ProjectionKind {
        self.kind
    }

    pub fn scale(&self) -> f64 {
        self.scale
    }

    pub fn translate(&self) -> [f64; 2] {
        self.translate
    }

    pub fn clip_angle(&self) -> Option<f64> {
        match &self.inner {
            Inner::Single(single) => single.clip_angle,
            Inner::Composite(_) => None,
        }
    }

    /// Project `(lon, lat)` in degrees. `None` when the point is clipped away.
    #[inline]
    pub fn project(&self, lon: f64, lat: f64) -> Option<[f64; 2]> {
        match &self.inner {
            Inner::Single(single) => single.project(lon, lat),
            Inner::Composite(usa) => usa.project(lon, lat),
        }
    }
}

/// Build the projection a map of `scope` uses on a `width` x `height` canvas.
///
/// `"usa"` always gets the composite Albers projection fitted to the canvas.
/// Every other scope uses `name`, scaled so the world spans the canvas width.
/// Orthographic becomes a clipped globe rotated by the configured rotation.
pub fn build_projection(
    scope: &str,
    name: &str,
    width: f64,
    height: f64,
    config: &ProjectionConfig,
) -> Result<Projection> {
    if !(width.is_finite() && height.is_finite() && width > 0.0 && height > 0.0) {
        return Err(MapError::InvalidDimensions { width, height });
    }
    let kind: ProjectionKind = name.parse()?;

    if scope == "usa" {
        return Ok(Projection::new(
            ProjectionKind::AlbersUsa,
            width,
            [width / 2.0, height / 2.0],
        ));
    }

    let divisor = if kind == ProjectionKind::Mercator { 1.45 } else { 1.8 };
    let projection = Projection::new(kind, (width + 1.0) / 2.0 / PI, [width / 2.0, height / divisor]);
    if kind == ProjectionKind::Orthographic {
        let rotation = config.rotation.unwrap_or([97.0, 0.0]);
        return Ok(projection.into_globe(250.0, 90.0, rotation));
    }
    Ok(projection)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn world(name: &str) -> Projection {
        build_projection("world", name, 960.0, 540.0, &ProjectionConfig::default()).unwrap()
    }

    #[test]
    fn test_equirectangular_origin_at_translate() {
        let p = world("equirectangular");
        let [x, y] = p.project(0.0, 0.0).unwrap();
        assert!((x - 480.0).abs() < 1e-9);
        assert!((y - 300.0).abs() < 1e-9);
        assert!((p.scale() - 961.0 / 2.0 / PI).abs() < 1e-12);
    }

    #[test]
    fn test_mercator_translate() {
        let p = world("Mercator");
        assert_eq!(p.kind(), ProjectionKind::Mercator);
        let [_, y] = p.project(0.0, 0.0).unwrap();
        assert!((y - 540.0 / 1.45).abs() < 1e-9);
        // Poles are clamped instead of running off to infinity
        assert!(p.project(0.0, -90.0).is_some());
    }

    #[test]
    fn test_unknown_projection_is_error() {
        let err = build_projection("world", "peirce", 960.0, 540.0, &ProjectionConfig::default());
        assert!(matches!(err, Err(MapError::UnknownProjection(name)) if name == "peirce"));
    }

    #[test]
    fn test_invalid_dimensions() {
        let err = build_projection("world", "mercator", 0.0, 540.0, &ProjectionConfig::default());
        assert!(matches!(err, Err(MapError::InvalidDimensions { .. })));
    }

    #[test]
    fn test_unknown_scope_uses_world_rules() {
        let a = world("equirectangular");
        let b = build_projection("bra", "equirectangular", 960.0, 540.0, &ProjectionConfig::default()).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_orthographic_clips_far_side() {
        let config = ProjectionConfig {
            rotation: Some([0.0, 0.0]),
        };
        let p = build_projection("world", "orthographic", 960.0, 540.0, &config).unwrap();
        assert_eq!(p.clip_angle(), Some(90.0));
        assert_eq!(p.scale(), 250.0);
        let [x, y] = p.project(0.0, 0.0).unwrap();
        assert!((x - 480.0).abs() < 1e-9 && (y - 300.0).abs() < 1e-9);
        assert!(p.project(180.0, 0.0).is_none());
    }

    #[test]
    fn test_orthographic_rotation_centers_longitude() {
        let config = ProjectionConfig {
            rotation: Some([97.0, 0.0]),
        };
        let p = build_projection("world", "orthographic", 960.0, 540.0, &config).unwrap();
        let [x, _] = p.project(-97.0, 0.0).unwrap();
        assert!((x - 480.0).abs() < 1e-6);
    }

    #[test]
    fn test_albers_usa_lower48_near_center() {
        let p = build_projection("usa", "equirectangular", 1000.0, 600.0, &ProjectionConfig::default()).unwrap();
        assert_eq!(p.kind(), ProjectionKind::AlbersUsa);
        let [x, y] = p.project(-98.58333, 39.83333).unwrap();
        assert!((x - 500.0).abs() < 40.0, "x = {x}");
        assert!((y - 300.0).abs() < 40.0, "y = {y}");
    }

    #[test]
    fn test_albers_usa_hawaii_inset() {
        let p = build_projection("usa", "equirectangular", 1000.0, 600.0, &ProjectionConfig::default()).unwrap();
        let [x, y] = p.project(-157.86, 21.31).unwrap();
        assert!((286.0..=385.0).contains(&x), "x = {x}");
        assert!((466.0..=534.0).contains(&y), "y = {y}");
    }

    #[test]
    fn test_albers_usa_rejects_far_points() {
        let p = build_projection("usa", "equirectangular", 1000.0, 600.0, &ProjectionConfig::default()).unwrap();
        assert!(p.project(2.35, 48.85).is_none());
    }
}
