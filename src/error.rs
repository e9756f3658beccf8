use thiserror::Error;

/// Result alias used by every fallible map operation
pub type Result<T> = std::result::Result<T, MapError>;

/// Errors surfaced by the map lifecycle and its renderers
#[derive(Debug, Error)]
pub enum MapError {
    /// A keyed renderer was handed something other than an array of records
    #[error("{layer} must be given an array of records")]
    NotArray { layer: &'static str },

    #[error("unknown projection '{0}'")]
    UnknownProjection(String),

    #[error("no topology available for scope '{scope}'")]
    MissingTopology { scope: String },

    #[error("topology has no object named '{scope}'")]
    MissingObject { scope: String },

    #[error("failed to decode topology: {0}")]
    Topology(#[from] topojson::Error),

    #[error("failed to parse JSON payload: {0}")]
    Json(#[from] simd_json::Error),

    #[error("failed to parse CSV payload: {0}")]
    Csv(#[from] csv::Error),

    #[error("failed to fetch {url}: {source}")]
    Fetch {
        url: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("invalid canvas size {width}x{height}")]
    InvalidDimensions { width: f64, height: f64 },

    /// An operation needed the projection, but `draw()` has not run yet
    #[error("map has not been drawn yet")]
    NotDrawn,

    #[error("no plugin registered under '{0}'")]
    UnknownPlugin(String),

    #[error("plugin '{name}' failed: {source}")]
    Plugin {
        name: String,
        #[source]
        source: anyhow::Error,
    },
}
