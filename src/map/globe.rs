use glam::{DMat3, DVec3};

/// Spherical rotation by Euler angles `[lambda, phi, gamma]` in degrees.
///
/// Applied as a yaw around the polar axis followed by pitch and roll, the
/// same convention web mapping projections use for `rotate([..])`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Rotation {
    angles: [f64; 3],
    matrix: DMat3,
}

impl Rotation {
    pub fn new(lambda: f64, phi: f64, gamma: f64) -> Self {
        let matrix = DMat3::from_rotation_x(gamma.to_radians())
            * DMat3::from_rotation_y(-phi.to_radians())
            * DMat3::from_rotation_z(lambda.to_radians());
        Self {
            angles: [lambda, phi, gamma],
            matrix,
        }
    }

    pub fn identity() -> Self {
        Self::new(0.0, 0.0, 0.0)
    }

    pub fn is_identity(&self) -> bool {
        self.angles == [0.0, 0.0, 0.0]
    }

    /// Rotate a lon/lat pair (degrees). Output longitude is wrapped to [-180, 180].
    #[inline]
    pub fn rotate(&self, lon: f64, lat: f64) -> (f64, f64) {
        if self.is_identity() {
            return (lon, lat);
        }
        vec3_to_lonlat(self.matrix * lonlat_to_vec3(lon, lat))
    }
}

impl Default for Rotation {
    fn default() -> Self {
        Self::identity()
    }
}

/// Convert lon/lat (degrees) to a unit sphere vector.
#[inline(always)]
pub fn lonlat_to_vec3(lon: f64, lat: f64) -> DVec3 {
    let lon_rad = lon.to_radians();
    let lat_rad = lat.to_radians();
    DVec3::new(
        lat_rad.cos() * lon_rad.cos(),
        lat_rad.cos() * lon_rad.sin(),
        lat_rad.sin(),
    )
}

#[inline(always)]
fn vec3_to_lonlat(p: DVec3) -> (f64, f64) {
    let lat = p.z.clamp(-1.0, 1.0).asin().to_degrees();
    let lon = p.y.atan2(p.x).to_degrees();
    (lon, lat)
}

/// Angular distance between two lon/lat points, in degrees
#[cfg(test)]
fn angular_distance(lon0: f64, lat0: f64, lon1: f64, lat1: f64) -> f64 {
    let a = lonlat_to_vec3(lon0, lat0);
    let b = lonlat_to_vec3(lon1, lat1);
    a.dot(b).clamp(-1.0, 1.0).acos().to_degrees()
}

/// Interpolate along a great circle arc and call a visitor for each subdivision point.
/// The start point is not visited; the end point always is. Subdivides into ~2°
/// segments, which is smooth at any canvas size the map is drawn at.
#[inline]
pub fn walk_great_circle(
    lon0: f64, lat0: f64,
    lon1: f64, lat1: f64,
    mut visitor: impl FnMut(f64, f64),
) {
    let a = lonlat_to_vec3(lon0, lat0);
    let b = lonlat_to_vec3(lon1, lat1);

    let dot = a.dot(b).clamp(-1.0, 1.0);
    let angle = dot.acos();

    let steps = ((angle.to_degrees() / 2.0).ceil() as usize).max(1);
    if steps == 1 {
        visitor(lon1, lat1);
        return;
    }

    let sin_angle = angle.sin();
    if sin_angle.abs() < 1e-10 {
        // Antipodal: no unique great circle
        visitor(lon1, lat1);
        return;
    }

    for i in 1..steps {
        let t = i as f64 / steps as f64;
        let sa = ((1.0 - t) * angle).sin() / sin_angle;
        let sb = (t * angle).sin() / sin_angle;
        let (lon, lat) = vec3_to_lonlat(a * sa + b * sb);
        visitor(lon, lat);
    }
    visitor(lon1, lat1);
}

/// Points of the great arc from `from` to `to` (both `(lon, lat)`), endpoints included
pub fn great_arc(from: (f64, f64), to: (f64, f64)) -> Vec<(f64, f64)> {
    let mut points = vec![from];
    walk_great_circle(from.0, from.1, to.0, to.1, |lon, lat| points.push((lon, lat)));
    points
}
