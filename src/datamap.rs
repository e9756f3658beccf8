//! The map façade: construction, drawing, fetch continuations and output.

use crate::data::{
    apply_filters, decode_features, parse_csv_data, parse_json_data, Feature, Fetch, GeometrySource, TopologySource,
};
use crate::error::{MapError, Result};
use crate::hover::{HoverState, Popup};
use crate::layers::{LayerRegistry, Plugin};
use crate::map::{build_projection, GeoPath, ProjectionKind, Shape};
use crate::options::{DataType, Options};
use crate::scene::{escape, fmt_num, NodeId, Scene};
use std::collections::{BTreeMap, HashMap};
use std::fmt::Write;
use std::sync::Arc;
use tracing::{debug, info, warn};

const DEFAULT_STYLES: &str = ".datamap path.datamaps-graticule { fill: none; stroke: #777; stroke-width: 0.5px; stroke-opacity: .5; pointer-events: none; } \
.datamap .labels { pointer-events: none; } \
.datamap path:not(.datamaps-arc), .datamap circle, .datamap line { stroke: #FFFFFF; vector-effect: non-scaling-stroke; stroke-width: 1px; } \
.datamaps-legend dt, .datamaps-legend dd { float: left; margin: 0 3px 0 0; } \
.datamaps-legend dd { width: 20px; margin-right: 6px; border-radius: 3px; } \
.datamaps-legend { padding-bottom: 20px; z-index: 1001; position: absolute; left: 4px; font-size: 12px; font-family: \"Helvetica Neue\", Helvetica, Arial, sans-serif; } \
.datamaps-hoverover { display: none; font-family: \"Helvetica Neue\", Helvetica, Arial, sans-serif; } \
.hoverinfo { padding: 4px; border-radius: 1px; background-color: #FFF; box-shadow: 1px 1px 5px #CCC; font-size: 12px; border: 1px solid #CCC; } \
.hoverinfo hr { border: 1px dotted #CCC; }";

/// The host element a map is drawn into
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Container {
    pub width: f64,
    pub height: f64,
    styles: BTreeMap<String, String>,
    overlays: Vec<String>,
    pub(crate) popup: Option<Popup>,
}

impl Container {
    pub fn new(width: f64, height: f64) -> Self {
        Self {
            width,
            height,
            ..Default::default()
        }
    }

    pub fn style(&self, name: &str) -> Option<&str> {
        self.styles.get(name).map(String::as_str)
    }

    /// HTML fragments appended to the container, such as legends
    pub fn overlays(&self) -> &[String] {
        &self.overlays
    }

    pub fn popup(&self) -> Option<&Popup> {
        self.popup.as_ref()
    }

    pub(crate) fn set_style(&mut self, name: &str, value: impl Into<String>) {
        self.styles.insert(name.to_string(), value.into());
    }

    pub(crate) fn overlays_mut(&mut self) -> &mut Vec<String> {
        &mut self.overlays
    }
}

/// Identifies one outstanding fetch. Only tickets from the latest `draw`
/// are honoured.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FetchTicket {
    generation: u64,
    url: String,
}

impl FetchTicket {
    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }
}

/// Where a draw stands after a call into the lifecycle
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DrawStatus {
    /// Everything is on screen
    Complete,
    /// Regions wait for this topology; pass it to [`Datamap::resume_topology`]
    AwaitingTopology(FetchTicket),
    /// Regions are drawn; pass this payload to [`Datamap::resume_data`]
    AwaitingData(FetchTicket),
    /// The continuation belonged to a superseded draw and was dropped
    Discarded,
}

/// Pan/zoom state applied to the region group
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ZoomTransform {
    pub translate: [f64; 2],
    pub scale: f64,
}

impl Default for ZoomTransform {
    fn default() -> Self {
        Self {
            translate: [0.0, 0.0],
            scale: 1.0,
        }
    }
}

/// Options for [`Datamap::update_choropleth`]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct UpdateOptions {
    /// Return every region to the default fill and forget its datum first
    pub reset: bool,
}

/// Regions of a draw, either decoded or still to be fetched
enum Regions {
    Ready(Vec<Feature>),
    Remote(String),
}

/// A thematic map bound to one container
pub struct Datamap {
    pub(crate) options: Options,
    source: Arc<dyn GeometrySource>,
    pub(crate) scene: Scene,
    pub(crate) container: Container,
    pub(crate) path: Option<GeoPath>,
    pub(crate) features: Vec<Feature>,
    pub(crate) shapes: HashMap<String, Shape>,
    pub(crate) layers: LayerRegistry,
    pub(crate) plugins: HashMap<String, Plugin>,
    pub(crate) hover: HoverState,
    generation: u64,
    custom_topology: Option<Arc<str>>,
    zoom: Option<ZoomTransform>,
}

impl std::fmt::Debug for Datamap {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Datamap")
            .field("scope", &self.options.scope())
            .field("generation", &self.generation)
            .field("features", &self.features.len())
            .finish_non_exhaustive()
    }
}

impl Datamap {
    /// Create a map in `container`. Options are resolved against
    /// [`Options::defaults`]; nothing is drawn until [`Datamap::draw`].
    pub fn new(container: Container, options: Options, source: impl GeometrySource + 'static) -> Result<Self> {
        let options = options.resolved();
        let responsive = options.responsive.unwrap_or(false);
        let width = options.width.unwrap_or(container.width);
        let height = if responsive {
            width * options.aspect_ratio.unwrap_or(0.5625)
        } else {
            options.height.unwrap_or(container.height)
        };
        if !(width.is_finite() && height.is_finite() && width > 0.0 && height > 0.0) {
            return Err(MapError::InvalidDimensions { width, height });
        }

        let mut scene = Scene::new("svg");
        let root = scene.root();
        scene.set_attr(root, "xmlns", "http://www.w3.org/2000/svg");
        scene.set_attr(root, "xmlns:xlink", "http://www.w3.org/1999/xlink");
        scene.set_attr(root, "class", "datamap");
        scene.set_style(root, "overflow", Some("hidden".to_string()));

        if !options.disable_default_styles.unwrap_or(false) {
            let style = scene.append(root, "style");
            scene.set_text(style, DEFAULT_STYLES);
        }

        let custom_topology = options
            .geography_config
            .as_ref()
            .and_then(|g| g.data_json.clone())
            .map(Arc::<str>::from);

        let mut map = Self {
            options,
            source: Arc::new(source),
            scene,
            container,
            path: None,
            features: Vec::new(),
            shapes: HashMap::new(),
            layers: LayerRegistry::default(),
            plugins: HashMap::new(),
            hover: HoverState::default(),
            generation: 0,
            custom_topology,
            zoom: None,
        };
        map.set_size(width, height);
        map.apply_responsive_styles();
        Ok(map)
    }

    fn set_size(&mut self, width: f64, height: f64) {
        let root = self.scene.root();
        self.scene.set_attr(root, "width", fmt_num(width));
        self.scene.set_attr(root, "height", fmt_num(height));
        self.scene.set_attr(root, "data-width", fmt_num(width));
        self.container.width = width;
        self.container.height = height;
        self.options.width = Some(width);
        self.options.height = Some(height);
    }

    pub fn options(&self) -> &Options {
        &self.options
    }

    pub fn scene(&self) -> &Scene {
        &self.scene
    }

    /// Direct access to the element tree, for plugins
    pub fn scene_mut(&mut self) -> &mut Scene {
        &mut self.scene
    }

    pub fn container(&self) -> &Container {
        &self.container
    }

    /// Path generator of the current draw, shared by every layer
    pub fn path(&self) -> Option<&GeoPath> {
        self.path.as_ref()
    }

    /// Regions of the current draw, after filtering
    pub fn features(&self) -> &[Feature] {
        &self.features
    }

    /// Projected outline of region `id`
    pub fn shape(&self, id: &str) -> Option<&Shape> {
        self.shapes.get(id)
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn zoom(&self) -> Option<ZoomTransform> {
        self.zoom
    }

    /// Group holding the region paths
    pub fn subunits_group(&self) -> Option<NodeId> {
        self.scene.child_with_class(self.scene.root(), "datamaps-subunits")
    }

    fn build_path(&self) -> Result<GeoPath> {
        let projection = build_projection(
            self.options.scope(),
            self.options.projection.as_deref().unwrap_or("equirectangular"),
            self.container.width,
            self.container.height,
            &self.options.projection_config.clone().unwrap_or_default(),
        )?;
        Ok(GeoPath::new(projection))
    }

    fn ticket(&self, url: String) -> FetchTicket {
        debug!(generation = self.generation, %url, "fetch requested");
        FetchTicket {
            generation: self.generation,
            url,
        }
    }

    fn is_stale(&self, ticket: &FetchTicket) -> bool {
        if ticket.generation != self.generation {
            warn!(
                ticket = ticket.generation,
                current = self.generation,
                url = %ticket.url,
                "discarding result of superseded fetch"
            );
            return true;
        }
        false
    }

    /// Build the projection and draw the regions of the configured scope.
    ///
    /// When the topology or the choropleth data has to be fetched, the
    /// returned status carries a ticket for the matching `resume_*` call.
    /// Every successful call supersedes tickets handed out by earlier calls.
    /// A failing call leaves the scene as it was.
    pub fn draw(&mut self) -> Result<DrawStatus> {
        let path = self.build_path()?;
        let regions = match self.custom_topology.clone() {
            Some(document) => Regions::Ready(self.load_features(&document)?),
            None => match self.options.geography_config.as_ref().and_then(|g| g.data_url.clone()) {
                Some(url) => Regions::Remote(url),
                None => match self.source.locate(self.options.scope()) {
                    Some(TopologySource::Inline(document)) => Regions::Ready(self.load_features(&document)?),
                    Some(TopologySource::Remote(url)) => Regions::Remote(url),
                    None => {
                        return Err(MapError::MissingTopology {
                            scope: self.options.scope().to_string(),
                        })
                    }
                },
            },
        };

        self.generation += 1;
        info!(
            scope = self.options.scope(),
            projection = ?path.projection().kind(),
            generation = self.generation,
            "drawing map"
        );
        self.path = Some(path);

        let subunits = match self.subunits_group() {
            Some(group) => group,
            None => self.add_layer("datamaps-subunits", None, true),
        };
        if self.path.as_ref().is_some_and(|p| p.projection().kind() == ProjectionKind::Orthographic) {
            self.insert_sphere(subunits);
        }

        match regions {
            Regions::Ready(features) => self.paint(features),
            Regions::Remote(url) => Ok(DrawStatus::AwaitingTopology(self.ticket(url))),
        }
    }

    /// Run [`Datamap::draw`] to completion, loading remote documents with `fetch`
    pub fn draw_with(&mut self, fetch: &dyn Fetch) -> Result<DrawStatus> {
        let mut status = self.draw()?;
        loop {
            status = match status {
                DrawStatus::AwaitingTopology(ticket) => {
                    let payload = fetch.fetch(ticket.url());
                    self.resume_topology(&ticket, payload)?
                }
                DrawStatus::AwaitingData(ticket) => {
                    let payload = fetch.fetch(ticket.url());
                    self.resume_data(&ticket, payload)?
                }
                done => return Ok(done),
            };
        }
    }

    /// Continue a draw with the fetched topology document
    pub fn resume_topology(&mut self, ticket: &FetchTicket, payload: anyhow::Result<Vec<u8>>) -> Result<DrawStatus> {
        if self.is_stale(ticket) {
            return Ok(DrawStatus::Discarded);
        }
        let fetch_error = |source: anyhow::Error| MapError::Fetch {
            url: ticket.url.clone(),
            source,
        };
        let bytes = payload.map_err(fetch_error)?;
        let document = String::from_utf8(bytes).map_err(|e| fetch_error(e.into()))?;
        let features = self.load_features(&document)?;
        self.paint(features)
    }

    /// Apply the fetched choropleth payload
    pub fn resume_data(&mut self, ticket: &FetchTicket, payload: anyhow::Result<Vec<u8>>) -> Result<DrawStatus> {
        if self.is_stale(ticket) {
            return Ok(DrawStatus::Discarded);
        }
        let bytes = payload.map_err(|source| MapError::Fetch {
            url: ticket.url.clone(),
            source,
        })?;
        let data = match self.options.data_type.unwrap_or_default() {
            DataType::Json => parse_json_data(bytes)?,
            DataType::Csv => parse_csv_data(&bytes)?,
        };
        debug!(regions = data.len(), "applying fetched data");
        self.update_choropleth(&data, None);
        Ok(DrawStatus::Complete)
    }

    /// Decode and filter the regions of the configured scope
    fn load_features(&self, document: &str) -> Result<Vec<Feature>> {
        let geography = self.options.geography();
        let features = decode_features(document, self.options.scope())?;
        Ok(apply_filters(
            features,
            geography.hide_antarctica.unwrap_or(true),
            geography.hide_hawaii_and_alaska.unwrap_or(false),
        ))
    }

    fn paint(&mut self, features: Vec<Feature>) -> Result<DrawStatus> {
        let geography = self.options.geography();
        self.features = features;
        self.draw_subunits()?;
        self.apply_responsive_styles();

        let bubbles_popup = self
            .options
            .bubbles_config
            .as_ref()
            .and_then(|b| b.popup_on_hover)
            .unwrap_or(false);
        if geography.popup_on_hover.unwrap_or(false) || bubbles_popup {
            self.container.popup.get_or_insert_with(Popup::default);
        }

        if let Some(done) = self.options.done.clone() {
            done.call(self);
        }
        info!(regions = self.features.len(), "map drawn");

        match self.options.data_url.clone() {
            Some(url) => Ok(DrawStatus::AwaitingData(self.ticket(url))),
            None => Ok(DrawStatus::Complete),
        }
    }

    fn insert_sphere(&mut self, before: NodeId) {
        let root = self.scene.root();
        let exists = self
            .scene
            .children(root)
            .iter()
            .any(|&c| self.scene.element(c).is_some_and(|e| e.tag() == "defs"));
        if exists {
            return;
        }
        let Some(d) = self.path.as_ref().map(GeoPath::sphere) else {
            return;
        };
        let defs = self.scene.insert_before(root, "defs", Some(before));
        let sphere = self.scene.append(defs, "path");
        self.scene.set_attr(sphere, "id", "sphere");
        self.scene.set_attr(sphere, "d", d);
        for class in ["stroke", "fill"] {
            let node = self.scene.insert_before(root, "use", Some(before));
            self.scene.set_attr(node, "class", class);
            self.scene.set_attr(node, "xlink:href", "#sphere");
        }
    }

    fn apply_responsive_styles(&mut self) {
        if !self.options.responsive.unwrap_or(false) {
            return;
        }
        let aspect = self.options.aspect_ratio.unwrap_or(0.5625);
        self.container.set_style("position", "relative");
        self.container
            .set_style("padding-bottom", format!("{}%", fmt_num(aspect * 100.0)));

        let root = self.scene.root();
        self.scene.set_style(root, "position", Some("absolute".to_string()));
        self.scene.set_style(root, "width", Some("100%".to_string()));
        self.scene.set_style(root, "height", Some("100%".to_string()));
        if let Some(group) = self.subunits_group() {
            for path in self.scene.live_children(group) {
                self.scene
                    .set_style(path, "vector-effect", Some("non-scaling-stroke".to_string()));
            }
        }
    }

    /// Refit a responsive map to a new container width. Regions are redrawn
    /// at the new size and the zoom translation is scaled with them. Does
    /// nothing for fixed-size maps.
    pub fn resize(&mut self, container_width: f64) -> Result<()> {
        if !self.options.responsive.unwrap_or(false) {
            return Ok(());
        }
        if self.path.is_none() {
            return Err(MapError::NotDrawn);
        }
        let width = container_width;
        let height = width * self.options.aspect_ratio.unwrap_or(0.5625);
        if !(width.is_finite() && height.is_finite() && width > 0.0 && height > 0.0) {
            return Err(MapError::InvalidDimensions { width, height });
        }

        let before = self.content_bounds();
        self.set_size(width, height);
        if let Some(group) = self.subunits_group() {
            let removed = self.scene.clear_children(group);
            self.hover.forget(&removed);
        }
        self.path = Some(self.build_path()?);
        self.draw_subunits()?;
        self.apply_responsive_styles();

        if let (Some(old), Some(new)) = (before, self.content_bounds()) {
            let old_width = old[1][0] - old[0][0];
            let new_width = new[1][0] - new[0][0];
            let ratio = new_width / old_width;
            if ratio.is_finite() && ratio > 0.0 {
                if let Some(zoom) = self.zoom.as_mut() {
                    zoom.translate = [zoom.translate[0] * ratio, zoom.translate[1] * ratio];
                }
                self.apply_zoom();
            }
            debug!(ratio, "rescaled zoom after resize");
        }
        info!(width, height, "map resized");
        Ok(())
    }

    /// Union of the projected bounds of every region
    fn content_bounds(&self) -> Option<[[f64; 2]; 2]> {
        self.shapes
            .values()
            .filter_map(|s| s.bounds)
            .reduce(|a, b| {
                [
                    [a[0][0].min(b[0][0]), a[0][1].min(b[0][1])],
                    [a[1][0].max(b[1][0]), a[1][1].max(b[1][1])],
                ]
            })
    }

    /// Apply a pan/zoom transform to the regions. The scale is clamped to
    /// the configured zoom extent.
    pub fn zoomed(&mut self, transform: ZoomTransform) {
        let [a, b] = self.options.zoom_scale.unwrap_or([1.0, 8.0]);
        let scale = transform.scale.clamp(a.min(b), a.max(b));
        self.zoom = Some(ZoomTransform {
            translate: transform.translate,
            scale,
        });
        self.apply_zoom();
    }

    fn apply_zoom(&mut self) {
        let (Some(zoom), Some(group)) = (self.zoom, self.subunits_group()) else {
            return;
        };
        self.scene.set_attr(
            group,
            "transform",
            format!(
                "translate({},{})scale({})",
                fmt_num(zoom.translate[0]),
                fmt_num(zoom.translate[1]),
                fmt_num(zoom.scale)
            ),
        );
    }

    /// Screen position of a coordinate, if drawn and not clipped
    pub fn lat_lng_to_xy(&self, lat: f64, lng: f64) -> Option<[f64; 2]> {
        self.path.as_ref()?.point(lng, lat)
    }

    /// Add a group to the SVG root, as its first child when `first` is set
    pub fn add_layer(&mut self, class_name: &str, id: Option<&str>, first: bool) -> NodeId {
        let root = self.scene.root();
        let group = if first {
            let first_child = self.scene.children(root).first().copied();
            self.scene.insert_before(root, "g", first_child)
        } else {
            self.scene.append(root, "g")
        };
        self.scene.set_attr(group, "id", id.unwrap_or(""));
        self.scene.set_attr(group, "class", class_name);
        group
    }

    /// Serialize the map as a standalone SVG document
    pub fn to_svg(&self) -> String {
        self.scene.to_markup(self.scene.root())
    }

    /// Serialize the container: the SVG followed by legends and the popup
    pub fn to_html(&self) -> String {
        let mut out = String::from("<div class=\"datamap-container\"");
        if !self.container.styles.is_empty() {
            let style = self
                .container
                .styles
                .iter()
                .map(|(k, v)| format!("{}: {}", escape(k), escape(v)))
                .collect::<Vec<_>>()
                .join("; ");
            let _ = write!(out, " style=\"{}\"", style);
        }
        out.push('>');
        out.push_str(&self.to_svg());
        for overlay in &self.container.overlays {
            out.push_str(overlay);
        }
        if let Some(popup) = &self.container.popup {
            out.push_str(&popup.to_html());
        }
        out.push_str("</div>");
        out
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::data::EmbeddedTopologies;
    use crate::options::{DoneCallback, GeographyConfig, ProjectionConfig};
    use std::sync::atomic::{AtomicUsize, Ordering};

    pub(crate) const WORLD: &str = include_str!("../tests/fixtures/world.topo.json");

    pub(crate) fn world_map(options: Options) -> Datamap {
        let source = EmbeddedTopologies::new().with_topology("world", WORLD);
        Datamap::new(Container::new(960.0, 540.0), options, source).unwrap()
    }

    pub(crate) fn drawn_world() -> Datamap {
        let mut map = world_map(Options::default());
        assert_eq!(map.draw().unwrap(), DrawStatus::Complete);
        map
    }

    fn ids(map: &Datamap) -> Vec<String> {
        map.features().iter().map(|f| f.id.clone()).collect()
    }

    #[test]
    fn test_draw_hides_antarctica() {
        let map = drawn_world();
        assert!(!ids(&map).contains(&"ATA".to_string()));
        let group = map.subunits_group().unwrap();
        assert_eq!(map.scene().children(group).len(), 4);
        assert!(map.scene().select_class(group, "ATA").is_empty());
    }

    #[test]
    fn test_unknown_projection_fails_before_drawing() {
        let mut map = world_map(Options {
            projection: Some("peirce".to_string()),
            ..Default::default()
        });
        let before = map.scene().len();
        assert!(matches!(map.draw(), Err(MapError::UnknownProjection(_))));
        assert_eq!(map.scene().len(), before);
    }

    #[test]
    fn test_missing_topology() {
        let mut map = world_map(Options {
            scope: Some("bra".to_string()),
            ..Default::default()
        });
        let before = map.scene().len();
        assert!(matches!(map.draw(), Err(MapError::MissingTopology { scope }) if scope == "bra"));
        assert_eq!(map.scene().len(), before);
        assert_eq!(map.subunits_group(), None);
        assert_eq!(map.generation(), 0);
        assert!(map.path().is_none());
    }

    #[test]
    fn test_undecodable_topology_leaves_scene_alone() {
        let source = EmbeddedTopologies::new().with_topology("world", "{}");
        let mut map = Datamap::new(
            Container::new(960.0, 540.0),
            Options {
                projection: Some("orthographic".to_string()),
                ..Default::default()
            },
            source,
        )
        .unwrap();
        let before = map.scene().to_markup(map.scene().root());
        assert!(map.draw().is_err());
        assert_eq!(map.scene().to_markup(map.scene().root()), before);
        assert_eq!(map.subunits_group(), None);
    }

    #[test]
    fn test_size_falls_back_to_container() {
        let map = world_map(Options::default());
        assert_eq!(map.scene().attr(map.scene().root(), "width"), Some("960"));
        assert_eq!(map.scene().attr(map.scene().root(), "height"), Some("540"));
    }

    #[test]
    fn test_invalid_dimensions() {
        let source = EmbeddedTopologies::new();
        let err = Datamap::new(Container::new(0.0, 0.0), Options::default(), source);
        assert!(matches!(err, Err(MapError::InvalidDimensions { .. })));
    }

    #[test]
    fn test_done_runs_after_regions() {
        let calls = Arc::new(AtomicUsize::new(0));
        let seen = Arc::clone(&calls);
        let mut map = world_map(Options {
            done: Some(DoneCallback::new(move |map| {
                assert_eq!(map.features().len(), 4);
                seen.fetch_add(1, Ordering::SeqCst);
            })),
            ..Default::default()
        });
        map.draw().unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_remote_topology_and_stale_tickets() {
        let mut map = world_map(Options {
            geography_config: Some(GeographyConfig {
                data_url: Some("https://example.com/world.json".to_string()),
                ..Default::default()
            }),
            ..Default::default()
        });
        let DrawStatus::AwaitingTopology(first) = map.draw().unwrap() else {
            panic!("expected a topology fetch");
        };
        let DrawStatus::AwaitingTopology(second) = map.draw().unwrap() else {
            panic!("expected a topology fetch");
        };
        assert_eq!(first.url(), "https://example.com/world.json");

        let stale = map.resume_topology(&first, Ok(WORLD.as_bytes().to_vec())).unwrap();
        assert_eq!(stale, DrawStatus::Discarded);
        assert!(map.features().is_empty());

        let done = map.resume_topology(&second, Ok(WORLD.as_bytes().to_vec())).unwrap();
        assert_eq!(done, DrawStatus::Complete);
        assert_eq!(map.features().len(), 4);
    }

    #[test]
    fn test_fetch_failure_is_reported() {
        let mut map = world_map(Options {
            data_url: Some("https://example.com/data.json".to_string()),
            ..Default::default()
        });
        let DrawStatus::AwaitingData(ticket) = map.draw().unwrap() else {
            panic!("expected a data fetch");
        };
        let err = map.resume_data(&ticket, Err(anyhow::anyhow!("offline")));
        assert!(matches!(err, Err(MapError::Fetch { url, .. }) if url == "https://example.com/data.json"));
    }

    #[test]
    fn test_draw_with_fetches_csv_data() {
        let mut map = world_map(Options {
            data_url: Some("data.csv".to_string()),
            data_type: Some(DataType::Csv),
            fills: Some(BTreeMap::from([("A".to_string(), "#ff0000".to_string())])),
            ..Default::default()
        });
        let fetch = |url: &str| -> anyhow::Result<Vec<u8>> {
            assert_eq!(url, "data.csv");
            Ok(b"id,fillKey\nCAN,A\n".to_vec())
        };
        assert_eq!(map.draw_with(&fetch).unwrap(), DrawStatus::Complete);

        let group = map.subunits_group().unwrap();
        let can = map.scene().select_class(group, "CAN")[0];
        assert_eq!(map.scene().style(can, "fill"), Some("#ff0000"));
        assert_eq!(map.scene().element(can).unwrap().info()["id"], "CAN");
    }

    #[test]
    fn test_inline_topology_overrides_source() {
        let source = EmbeddedTopologies::new();
        let mut map = Datamap::new(
            Container::new(960.0, 540.0),
            Options {
                geography_config: Some(GeographyConfig {
                    data_json: Some(WORLD.to_string()),
                    ..Default::default()
                }),
                ..Default::default()
            },
            source,
        )
        .unwrap();
        assert_eq!(map.draw().unwrap(), DrawStatus::Complete);
        assert_eq!(map.features().len(), 4);
    }

    #[test]
    fn test_zoom_is_clamped() {
        let mut map = drawn_world();
        map.zoomed(ZoomTransform {
            translate: [10.0, 20.0],
            scale: 50.0,
        });
        let group = map.subunits_group().unwrap();
        assert_eq!(map.scene().attr(group, "transform"), Some("translate(10,20)scale(8)"));
    }

    #[test]
    fn test_resize_is_noop_unless_responsive() {
        let mut map = drawn_world();
        map.resize(480.0).unwrap();
        assert_eq!(map.container().width, 960.0);
    }

    #[test]
    fn test_resize_rescales_regions_and_zoom() {
        let mut map = world_map(Options {
            responsive: Some(true),
            ..Default::default()
        });
        assert_eq!(map.container().height, 540.0);
        assert_eq!(map.container().style("padding-bottom"), Some("56.25%"));
        map.draw().unwrap();
        map.zoomed(ZoomTransform {
            translate: [100.0, 50.0],
            scale: 2.0,
        });

        map.resize(480.0).unwrap();
        assert_eq!(map.container().height, 270.0);
        let zoom = map.zoom().unwrap();
        assert!((zoom.translate[0] - 50.0).abs() < 0.5, "{:?}", zoom);
        assert_eq!(zoom.scale, 2.0);

        let group = map.subunits_group().unwrap();
        let paths = map.scene().children(group).to_vec();
        assert_eq!(paths.len(), 4);
        assert_eq!(map.scene().style(paths[0], "vector-effect"), Some("non-scaling-stroke"));
    }

    #[test]
    fn test_resize_before_draw() {
        let mut map = world_map(Options {
            responsive: Some(true),
            ..Default::default()
        });
        assert!(matches!(map.resize(480.0), Err(MapError::NotDrawn)));
    }

    #[test]
    fn test_orthographic_inserts_sphere_once() {
        let mut map = world_map(Options {
            projection: Some("orthographic".to_string()),
            projection_config: Some(ProjectionConfig {
                rotation: Some([0.0, 0.0]),
            }),
            ..Default::default()
        });
        map.draw().unwrap();
        map.draw().unwrap();
        let root = map.scene().root();
        let tags: Vec<&str> = map
            .scene()
            .children(root)
            .iter()
            .map(|&c| map.scene().element(c).unwrap().tag())
            .collect();
        assert_eq!(tags.iter().filter(|&&t| t == "defs").count(), 1);
        assert_eq!(&tags[..4], &["defs", "use", "use", "g"]);
    }

    #[test]
    fn test_lat_lng_to_xy() {
        let mut map = world_map(Options::default());
        assert_eq!(map.lat_lng_to_xy(0.0, 0.0), None);
        map.draw().unwrap();
        let [x, y] = map.lat_lng_to_xy(0.0, 0.0).unwrap();
        assert!((x - 480.0).abs() < 1e-9);
        assert!((y - 300.0).abs() < 1e-9);
    }

    #[test]
    fn test_add_layer_first() {
        let mut map = drawn_world();
        let root = map.scene().root();
        let g = map.add_layer("custom", Some("mine"), true);
        assert_eq!(map.scene().children(root)[0], g);
        assert_eq!(map.scene().attr(g, "id"), Some("mine"));
    }

    #[test]
    fn test_html_includes_popup_and_styles() {
        let map = drawn_world();
        let html = map.to_html();
        assert!(html.starts_with("<div class=\"datamap-container\"><svg"));
        assert!(html.contains("datamaps-hoverover"));
        assert!(html.contains("<style>"));

        let plain = world_map(Options {
            disable_default_styles: Some(true),
            ..Default::default()
        });
        assert!(!plain.to_svg().contains("<style>"));
    }

    #[test]
    fn test_container_styles_are_escaped() {
        let mut map = world_map(Options::default());
        map.container.set_style("font-family", "\"Fira\" <Sans>");
        let html = map.to_html();
        assert!(html.starts_with("<div class=\"datamap-container\" style=\"font-family: &quot;Fira&quot; &lt;Sans&gt;\">"));
    }
}
