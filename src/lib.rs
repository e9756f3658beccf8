//! Thematic maps drawn into a retained SVG scene.
//!
//! A [`Datamap`] owns one scene and one projection. `draw` paints the regions
//! of the configured scope; layers ([`layers::Bubbles`], [`layers::Arcs`],
//! [`layers::Labels`], [`layers::Graticule`] and host [`layers::Plugin`]s)
//! reconcile their data against what is already on screen, so calling them
//! again updates in place. [`Datamap::legend`] writes an HTML legend next to
//! the SVG.
//!
//! ```no_run
//! use datamap::{Container, Datamap, EmbeddedTopologies, Options};
//! use serde_json::json;
//!
//! # fn main() -> anyhow::Result<()> {
//! let source = EmbeddedTopologies::new().with_topology("world", std::fs::read_to_string("world.json")?);
//! let mut map = Datamap::new(Container::new(960.0, 540.0), Options::default(), source)?;
//! map.draw()?;
//! map.bubbles(&json!([{"latitude": 48.85, "longitude": 2.35, "radius": 10}]), None)?;
//! println!("{}", map.to_svg());
//! # Ok(())
//! # }
//! ```

pub mod data;
pub mod datamap;
pub mod error;
pub mod hover;
pub mod join;
pub mod layers;
pub mod map;
pub mod options;
pub mod scene;

pub use data::{EmbeddedTopologies, Feature, Fetch, GeometrySource, TopologySource};
pub use datamap::{Container, Datamap, DrawStatus, FetchTicket, UpdateOptions, ZoomTransform};
pub use error::{MapError, Result};
pub use hover::{HoverConfig, Popup};
pub use layers::{Layer, Plugin};
pub use options::{
    ArcConfig, BubblesConfig, DataType, DoneCallback, GeographyConfig, GraticuleConfig, KeyFn, LabelsConfig,
    LegendConfig, Options, PopupTemplate, ProjectionConfig, Resolvable,
};
pub use scene::{NodeId, Scene};
