//! Geometry and choropleth data loading.
//!
//! Topologies are opaque documents keyed by scope. A [`GeometrySource`] says
//! where the document for a scope lives (inline or behind a URL); decoding
//! turns it into [`Feature`]s the renderers bind to.

use crate::error::{MapError, Result};
use geojson::feature::Id;
use geojson::Geometry;
use serde_json::{Map, Value};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use topojson::{to_geojson, TopoJson};
use tracing::debug;

/// One region of a scope
#[derive(Clone, Debug, PartialEq)]
pub struct Feature {
    pub id: String,
    pub properties: Map<String, Value>,
    pub geometry: Option<Geometry>,
}

impl Feature {
    /// JSON view handed to callbacks and popup templates
    pub fn to_value(&self) -> Value {
        let mut obj = Map::new();
        obj.insert("id".to_string(), Value::String(self.id.clone()));
        obj.insert("properties".to_string(), Value::Object(self.properties.clone()));
        Value::Object(obj)
    }
}

/// Where the topology document for a scope comes from
#[derive(Clone, Debug, PartialEq)]
pub enum TopologySource {
    /// Document available right away
    Inline(Arc<str>),
    /// Document that has to be fetched first
    Remote(String),
}

/// Per-scope store of topology documents
pub trait GeometrySource: Send + Sync {
    fn locate(&self, scope: &str) -> Option<TopologySource>;
}

/// A [`GeometrySource`] built from documents and URLs registered up front
#[derive(Clone, Debug, Default)]
pub struct EmbeddedTopologies {
    documents: HashMap<String, Arc<str>>,
    urls: HashMap<String, String>,
}

impl EmbeddedTopologies {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the topology document for `scope`
    pub fn with_topology(mut self, scope: impl Into<String>, document: impl Into<Arc<str>>) -> Self {
        self.documents.insert(scope.into(), document.into());
        self
    }

    /// Register a remote location for `scope`; an inline document wins over it
    pub fn with_url(mut self, scope: impl Into<String>, url: impl Into<String>) -> Self {
        self.urls.insert(scope.into(), url.into());
        self
    }
}

impl GeometrySource for EmbeddedTopologies {
    fn locate(&self, scope: &str) -> Option<TopologySource> {
        if let Some(doc) = self.documents.get(scope) {
            return Some(TopologySource::Inline(Arc::clone(doc)));
        }
        self.urls.get(scope).cloned().map(TopologySource::Remote)
    }
}

/// Decode the object named `scope` of a topology document into features
pub fn decode_features(document: &str, scope: &str) -> Result<Vec<Feature>> {
    let TopoJson::Topology(topology) = document.parse::<TopoJson>()? else {
        return Err(MapError::MissingObject {
            scope: scope.to_string(),
        });
    };
    if !topology.objects.iter().any(|o| o.name == scope) {
        return Err(MapError::MissingObject {
            scope: scope.to_string(),
        });
    }

    let collection = to_geojson(&topology, scope)?;
    let features: Vec<Feature> = collection
        .features
        .into_iter()
        .map(|f| Feature {
            id: match f.id {
                Some(Id::String(s)) => s,
                Some(Id::Number(n)) => n.to_string(),
                None => String::new(),
            },
            properties: f.properties.unwrap_or_default(),
            geometry: f.geometry,
        })
        .collect();
    debug!(scope, count = features.len(), "decoded topology");
    Ok(features)
}

/// Drop the regions a geography config asks to hide
pub fn apply_filters(features: Vec<Feature>, hide_antarctica: bool, hide_hawaii_and_alaska: bool) -> Vec<Feature> {
    features
        .into_iter()
        .filter(|f| !(hide_antarctica && f.id == "ATA"))
        .filter(|f| !(hide_hawaii_and_alaska && (f.id == "HI" || f.id == "AK")))
        .collect()
}

/// Parse a JSON choropleth payload: an object keyed by region id
pub fn parse_json_data(mut bytes: Vec<u8>) -> Result<BTreeMap<String, Value>> {
    let data: BTreeMap<String, Value> = simd_json::serde::from_slice(&mut bytes)?;
    Ok(data)
}

/// Parse a CSV choropleth payload, one row per region, pivoted by its `id`
/// column. Rows without an id are skipped.
pub fn parse_csv_data(bytes: &[u8]) -> Result<BTreeMap<String, Value>> {
    let mut reader = csv::Reader::from_reader(bytes);
    let headers = reader.headers()?.clone();
    let mut data = BTreeMap::new();
    for record in reader.records() {
        let record = record?;
        let row: Map<String, Value> = headers
            .iter()
            .zip(record.iter())
            .map(|(h, v)| (h.to_string(), Value::String(v.to_string())))
            .collect();
        match row.get("id").and_then(Value::as_str) {
            Some(id) if !id.is_empty() => {
                data.insert(id.to_string(), Value::Object(row));
            }
            _ => debug!("skipping CSV row without id"),
        }
    }
    Ok(data)
}

/// Host-provided loader for remote documents
pub trait Fetch {
    fn fetch(&self, url: &str) -> anyhow::Result<Vec<u8>>;
}

impl<F> Fetch for F
where
    F: Fn(&str) -> anyhow::Result<Vec<u8>>,
{
    fn fetch(&self, url: &str) -> anyhow::Result<Vec<u8>> {
        self(url)
    }
}
