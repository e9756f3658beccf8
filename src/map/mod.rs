pub mod geometry;
pub mod globe;
pub mod projection;

pub use geometry::{graticule_lines, GeoPath, Shape};
pub use projection::{build_projection, Projection, ProjectionKind};
