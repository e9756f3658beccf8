//! Map configuration and the defaults every map starts from.
//!
//! Everything is `Option`-shaped: a user supplies the fields they care about
//! and [`Resolve`] fills the rest from [`Options::defaults`]. After resolution
//! every field a renderer reads is set, except those whose default is "no
//! value" (for example a bubble radius), which renderers treat as "omit".

mod resolve;

pub use resolve::{resolve, Resolve};
pub(crate) use resolve::{fill, fill_nested};

use crate::datamap::Datamap;
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

type CallbackFn<T> = dyn Fn(&Value, &Value) -> Option<T> + Send + Sync;

/// A visual value that is either fixed or computed per element.
///
/// Callbacks receive `(subject, datum)`: for regions the subject is the
/// geography feature and the datum its entry in `Options::data`; for bubbles
/// and arcs both are the record itself.
#[derive(Clone)]
pub enum Resolvable<T> {
    Literal(T),
    Callback(Arc<CallbackFn<T>>),
}

impl<T: Clone> Resolvable<T> {
    pub fn callback(f: impl Fn(&Value, &Value) -> Option<T> + Send + Sync + 'static) -> Self {
        Resolvable::Callback(Arc::new(f))
    }

    pub fn resolve(&self, subject: &Value, datum: &Value) -> Option<T> {
        match self {
            Resolvable::Literal(value) => Some(value.clone()),
            Resolvable::Callback(f) => f(subject, datum),
        }
    }
}

impl<T: PartialEq> PartialEq for Resolvable<T> {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Resolvable::Literal(a), Resolvable::Literal(b)) => a == b,
            (Resolvable::Callback(a), Resolvable::Callback(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl<T: fmt::Debug> fmt::Debug for Resolvable<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Resolvable::Literal(value) => f.debug_tuple("Literal").field(value).finish(),
            Resolvable::Callback(_) => f.write_str("Callback(..)"),
        }
    }
}

impl From<&str> for Resolvable<String> {
    fn from(value: &str) -> Self {
        Resolvable::Literal(value.to_string())
    }
}

impl From<String> for Resolvable<String> {
    fn from(value: String) -> Self {
        Resolvable::Literal(value)
    }
}

impl From<f64> for Resolvable<f64> {
    fn from(value: f64) -> Self {
        Resolvable::Literal(value)
    }
}

/// Values that can be read straight out of a JSON datum
pub trait FromDatum: Sized {
    fn from_datum(value: &Value) -> Option<Self>;
}

impl FromDatum for String {
    fn from_datum(value: &Value) -> Option<Self> {
        match value {
            Value::String(s) => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        }
    }
}

impl FromDatum for f64 {
    fn from_datum(value: &Value) -> Option<Self> {
        match value {
            Value::Number(n) => n.as_f64(),
            Value::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }
}

impl FromDatum for bool {
    fn from_datum(value: &Value) -> Option<Self> {
        value.as_bool()
    }
}

/// Pick a visual value: the datum's own `field` first, then the option
/// (literal or callback), else nothing.
pub fn val<T: FromDatum + Clone>(
    datum: &Value,
    field: &str,
    option: Option<&Resolvable<T>>,
    subject: &Value,
) -> Option<T> {
    datum
        .get(field)
        .and_then(T::from_datum)
        .or_else(|| option.and_then(|o| o.resolve(subject, datum)))
}

/// Renders the popup body for `(subject, info)`
#[derive(Clone)]
pub struct PopupTemplate(Arc<dyn Fn(&Value, &Value) -> anyhow::Result<String> + Send + Sync>);

impl PopupTemplate {
    pub fn new(f: impl Fn(&Value, &Value) -> anyhow::Result<String> + Send + Sync + 'static) -> Self {
        Self(Arc::new(f))
    }

    pub fn render(&self, subject: &Value, info: &Value) -> anyhow::Result<String> {
        (self.0)(subject, info)
    }
}

impl PartialEq for PopupTemplate {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl fmt::Debug for PopupTemplate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("PopupTemplate(..)")
    }
}

/// Derives the identity of a record for keyed reconciliation
#[derive(Clone)]
pub struct KeyFn(Arc<dyn Fn(&Value, usize) -> String + Send + Sync>);

impl KeyFn {
    pub fn new(f: impl Fn(&Value, usize) -> String + Send + Sync + 'static) -> Self {
        Self(Arc::new(f))
    }

    /// Whole-record identity: structurally equal records are the same entity
    pub fn json() -> Self {
        Self::new(|datum, _| datum.to_string())
    }

    pub fn key(&self, datum: &Value, index: usize) -> String {
        (self.0)(datum, index)
    }
}

impl PartialEq for KeyFn {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl fmt::Debug for KeyFn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("KeyFn(..)")
    }
}

/// Invoked once a draw has painted its regions
#[derive(Clone)]
pub struct DoneCallback(Arc<dyn Fn(&Datamap) + Send + Sync>);

impl DoneCallback {
    pub fn new(f: impl Fn(&Datamap) + Send + Sync + 'static) -> Self {
        Self(Arc::new(f))
    }

    pub(crate) fn call(&self, map: &Datamap) {
        (self.0)(map)
    }
}

impl PartialEq for DoneCallback {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl fmt::Debug for DoneCallback {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("DoneCallback(..)")
    }
}

/// Format of the choropleth payload behind `Options::data_url`
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum DataType {
    #[default]
    Json,
    Csv,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct ProjectionConfig {
    /// `[lambda, phi]` rotation in degrees, used by the orthographic globe
    pub rotation: Option<[f64; 2]>,
}

impl Resolve for ProjectionConfig {
    fn resolve_from(&mut self, defaults: &Self) {
        fill(&mut self.rotation, &defaults.rotation);
    }
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct GeographyConfig {
    /// Remote topology replacing the geometry source for this map
    pub data_url: Option<String>,
    /// Inline topology document replacing the geometry source for this map
    pub data_json: Option<String>,
    pub hide_antarctica: Option<bool>,
    pub hide_hawaii_and_alaska: Option<bool>,
    pub border_width: Option<f64>,
    pub border_opacity: Option<f64>,
    pub border_color: Option<String>,
    /// Fill key for regions whose datum carries none
    pub fill_key: Option<Resolvable<String>>,
    pub popup_template: Option<PopupTemplate>,
    pub popup_on_hover: Option<bool>,
    pub highlight_on_hover: Option<bool>,
    pub highlight_fill_color: Option<Resolvable<String>>,
    pub highlight_border_color: Option<Resolvable<String>>,
    pub highlight_border_width: Option<Resolvable<f64>>,
    pub highlight_border_opacity: Option<Resolvable<f64>>,
    pub highlight_fill_opacity: Option<Resolvable<f64>>,
}

impl Resolve for GeographyConfig {
    fn resolve_from(&mut self, d: &Self) {
        fill(&mut self.data_url, &d.data_url);
        fill(&mut self.data_json, &d.data_json);
        fill(&mut self.hide_antarctica, &d.hide_antarctica);
        fill(&mut self.hide_hawaii_and_alaska, &d.hide_hawaii_and_alaska);
        fill(&mut self.border_width, &d.border_width);
        fill(&mut self.border_opacity, &d.border_opacity);
        fill(&mut self.border_color, &d.border_color);
        fill(&mut self.fill_key, &d.fill_key);
        fill(&mut self.popup_template, &d.popup_template);
        fill(&mut self.popup_on_hover, &d.popup_on_hover);
        fill(&mut self.highlight_on_hover, &d.highlight_on_hover);
        fill(&mut self.highlight_fill_color, &d.highlight_fill_color);
        fill(&mut self.highlight_border_color, &d.highlight_border_color);
        fill(&mut self.highlight_border_width, &d.highlight_border_width);
        fill(&mut self.highlight_border_opacity, &d.highlight_border_opacity);
        fill(&mut self.highlight_fill_opacity, &d.highlight_fill_opacity);
    }
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct BubblesConfig {
    pub border_width: Option<Resolvable<f64>>,
    pub border_opacity: Option<Resolvable<f64>>,
    pub border_color: Option<Resolvable<String>>,
    pub popup_on_hover: Option<bool>,
    pub radius: Option<Resolvable<f64>>,
    pub popup_template: Option<PopupTemplate>,
    pub fill_opacity: Option<Resolvable<f64>>,
    pub fill_key: Option<Resolvable<String>>,
    pub filter_key: Option<Resolvable<String>>,
    /// Grow entering bubbles from radius 0
    pub animate: Option<bool>,
    pub highlight_on_hover: Option<bool>,
    pub highlight_fill_color: Option<Resolvable<String>>,
    pub highlight_border_color: Option<Resolvable<String>>,
    pub highlight_border_width: Option<Resolvable<f64>>,
    pub highlight_border_opacity: Option<Resolvable<f64>>,
    pub highlight_fill_opacity: Option<Resolvable<f64>>,
    pub exit_delay: Option<u32>,
    pub key: Option<KeyFn>,
}

impl Resolve for BubblesConfig {
    fn resolve_from(&mut self, d: &Self) {
        fill(&mut self.border_width, &d.border_width);
        fill(&mut self.border_opacity, &d.border_opacity);
        fill(&mut self.border_color, &d.border_color);
        fill(&mut self.popup_on_hover, &d.popup_on_hover);
        fill(&mut self.radius, &d.radius);
        fill(&mut self.popup_template, &d.popup_template);
        fill(&mut self.fill_opacity, &d.fill_opacity);
        fill(&mut self.fill_key, &d.fill_key);
        fill(&mut self.filter_key, &d.filter_key);
        fill(&mut self.animate, &d.animate);
        fill(&mut self.highlight_on_hover, &d.highlight_on_hover);
        fill(&mut self.highlight_fill_color, &d.highlight_fill_color);
        fill(&mut self.highlight_border_color, &d.highlight_border_color);
        fill(&mut self.highlight_border_width, &d.highlight_border_width);
        fill(&mut self.highlight_border_opacity, &d.highlight_border_opacity);
        fill(&mut self.highlight_fill_opacity, &d.highlight_fill_opacity);
        fill(&mut self.exit_delay, &d.exit_delay);
        fill(&mut self.key, &d.key);
    }
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct ArcConfig {
    pub stroke_color: Option<Resolvable<String>>,
    pub stroke_width: Option<Resolvable<f64>>,
    pub arc_sharpness: Option<Resolvable<f64>>,
    /// Duration of the line-drawing animation, in milliseconds
    pub animation_speed: Option<Resolvable<f64>>,
    pub popup_on_hover: Option<bool>,
    pub popup_template: Option<PopupTemplate>,
    /// Follow the geodesic instead of the offset-midpoint curve
    pub great_arc: Option<bool>,
    pub key: Option<KeyFn>,
}

impl Resolve for ArcConfig {
    fn resolve_from(&mut self, d: &Self) {
        fill(&mut self.stroke_color, &d.stroke_color);
        fill(&mut self.stroke_width, &d.stroke_width);
        fill(&mut self.arc_sharpness, &d.arc_sharpness);
        fill(&mut self.animation_speed, &d.animation_speed);
        fill(&mut self.popup_on_hover, &d.popup_on_hover);
        fill(&mut self.popup_template, &d.popup_template);
        fill(&mut self.great_arc, &d.great_arc);
        fill(&mut self.key, &d.key);
    }
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct LabelsConfig {
    pub label_color: Option<String>,
    pub line_width: Option<f64>,
    pub font_size: Option<f64>,
    pub font_family: Option<String>,
    /// Text to show instead of the region id
    pub custom_label_text: Option<BTreeMap<String, String>>,
}

impl Resolve for LabelsConfig {
    fn resolve_from(&mut self, d: &Self) {
        fill(&mut self.label_color, &d.label_color);
        fill(&mut self.line_width, &d.line_width);
        fill(&mut self.font_size, &d.font_size);
        fill(&mut self.font_family, &d.font_family);
        fill_nested(&mut self.custom_label_text, &d.custom_label_text);
    }
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct LegendConfig {
    pub legend_title: Option<String>,
    /// Shown for `defaultFill`; without it the default fill is left out
    pub default_fill_name: Option<String>,
    /// Display text per fill key
    pub labels: Option<BTreeMap<String, String>>,
}

impl Resolve for LegendConfig {
    fn resolve_from(&mut self, d: &Self) {
        fill(&mut self.legend_title, &d.legend_title);
        fill(&mut self.default_fill_name, &d.default_fill_name);
        fill_nested(&mut self.labels, &d.labels);
    }
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct GraticuleConfig {
    /// Degrees between grid lines
    pub step: Option<f64>,
    /// Sampling interval along each line, in degrees
    pub precision: Option<f64>,
}

impl Resolve for GraticuleConfig {
    fn resolve_from(&mut self, d: &Self) {
        fill(&mut self.step, &d.step);
        fill(&mut self.precision, &d.precision);
    }
}

/// Top-level map configuration
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Options {
    /// `"world"`, `"usa"` or the name of any topology object the geometry
    /// source provides
    pub scope: Option<String>,
    pub responsive: Option<bool>,
    pub aspect_ratio: Option<f64>,
    /// Canvas width; the container's width when unset
    pub width: Option<f64>,
    /// Canvas height; the container's height when unset
    pub height: Option<f64>,
    pub projection: Option<String>,
    pub projection_config: Option<ProjectionConfig>,
    /// Per-region datum, keyed by feature id
    pub data: Option<BTreeMap<String, Value>>,
    /// Named colors; always resolved to contain `defaultFill`
    pub fills: Option<BTreeMap<String, String>>,
    /// Named SVG filter references for bubbles
    pub filters: Option<BTreeMap<String, String>>,
    pub geography_config: Option<GeographyConfig>,
    pub bubbles_config: Option<BubblesConfig>,
    pub arc_config: Option<ArcConfig>,
    pub labels_config: Option<LabelsConfig>,
    /// Choropleth payload fetched after the first paint
    pub data_url: Option<String>,
    pub data_type: Option<DataType>,
    pub done: Option<DoneCallback>,
    pub disable_default_styles: Option<bool>,
    /// `[min, max]` scale accepted by `zoomed`
    pub zoom_scale: Option<[f64; 2]>,
    /// Host user agent; legacy engines skip raising hovered regions
    pub user_agent: Option<String>,
}

impl Resolve for Options {
    fn resolve_from(&mut self, d: &Self) {
        fill(&mut self.scope, &d.scope);
        fill(&mut self.responsive, &d.responsive);
        fill(&mut self.aspect_ratio, &d.aspect_ratio);
        fill(&mut self.width, &d.width);
        fill(&mut self.height, &d.height);
        fill(&mut self.projection, &d.projection);
        fill_nested(&mut self.projection_config, &d.projection_config);
        fill_nested(&mut self.data, &d.data);
        fill_nested(&mut self.fills, &d.fills);
        fill_nested(&mut self.filters, &d.filters);
        fill_nested(&mut self.geography_config, &d.geography_config);
        fill_nested(&mut self.bubbles_config, &d.bubbles_config);
        fill_nested(&mut self.arc_config, &d.arc_config);
        fill_nested(&mut self.labels_config, &d.labels_config);
        fill(&mut self.data_url, &d.data_url);
        fill(&mut self.data_type, &d.data_type);
        fill(&mut self.done, &d.done);
        fill(&mut self.disable_default_styles, &d.disable_default_styles);
        fill(&mut self.zoom_scale, &d.zoom_scale);
        fill(&mut self.user_agent, &d.user_agent);
    }
}

const HIGHLIGHT_FILL: &str = "#FC8D59";
const HIGHLIGHT_BORDER: &str = "rgba(250, 15, 160, 0.2)";
pub const DEFAULT_FILL: &str = "#ABDDA4";

impl Options {
    /// The library defaults every map is resolved against
    pub fn defaults() -> Self {
        Self {
            scope: Some("world".to_string()),
            responsive: Some(false),
            aspect_ratio: Some(0.5625),
            width: None,
            height: None,
            projection: Some("equirectangular".to_string()),
            projection_config: Some(ProjectionConfig {
                rotation: Some([97.0, 0.0]),
            }),
            data: Some(BTreeMap::new()),
            fills: Some(BTreeMap::from([("defaultFill".to_string(), DEFAULT_FILL.to_string())])),
            filters: Some(BTreeMap::new()),
            geography_config: Some(GeographyConfig::defaults()),
            bubbles_config: Some(BubblesConfig::defaults()),
            arc_config: Some(ArcConfig::defaults()),
            labels_config: Some(LabelsConfig::defaults()),
            data_url: None,
            data_type: Some(DataType::Json),
            done: None,
            disable_default_styles: Some(false),
            zoom_scale: Some([1.0, 8.0]),
            user_agent: None,
        }
    }

    /// Merge user options with [`Options::defaults`]
    pub fn resolved(self) -> Self {
        resolve(Some(self), &Self::defaults())
    }

    pub fn scope(&self) -> &str {
        self.scope.as_deref().unwrap_or("world")
    }

    pub fn fills(&self) -> &BTreeMap<String, String> {
        static EMPTY: BTreeMap<String, String> = BTreeMap::new();
        self.fills.as_ref().unwrap_or(&EMPTY)
    }

    pub fn default_fill(&self) -> &str {
        self.fills().get("defaultFill").map(String::as_str).unwrap_or(DEFAULT_FILL)
    }

    pub fn geography(&self) -> GeographyConfig {
        self.geography_config.clone().unwrap_or_default()
    }
}

impl GeographyConfig {
    pub fn defaults() -> Self {
        Self {
            data_url: None,
            data_json: None,
            hide_antarctica: Some(true),
            hide_hawaii_and_alaska: Some(false),
            border_width: Some(1.0),
            border_opacity: Some(1.0),
            border_color: Some("#FDFDFD".to_string()),
            fill_key: None,
            popup_template: Some(PopupTemplate::new(|geography, _| {
                let name = geography
                    .pointer("/properties/name")
                    .and_then(Value::as_str)
                    .ok_or_else(|| anyhow::anyhow!("geography has no name"))?;
                Ok(format!("<div class=\"hoverinfo\"><strong>{}</strong></div>", name))
            })),
            popup_on_hover: Some(true),
            highlight_on_hover: Some(true),
            highlight_fill_color: Some(HIGHLIGHT_FILL.into()),
            highlight_border_color: Some(HIGHLIGHT_BORDER.into()),
            highlight_border_width: Some(2.0.into()),
            highlight_border_opacity: Some(1.0.into()),
            highlight_fill_opacity: None,
        }
    }
}

impl BubblesConfig {
    pub fn defaults() -> Self {
        Self {
            border_width: Some(2.0.into()),
            border_opacity: Some(1.0.into()),
            border_color: Some("#FFFFFF".into()),
            popup_on_hover: Some(true),
            radius: None,
            popup_template: Some(PopupTemplate::new(|_, data| {
                let name = data
                    .get("name")
                    .and_then(Value::as_str)
                    .ok_or_else(|| anyhow::anyhow!("bubble has no name"))?;
                Ok(format!("<div class=\"hoverinfo\"><strong>{}</strong></div>", name))
            })),
            fill_opacity: Some(0.75.into()),
            fill_key: None,
            filter_key: None,
            animate: Some(true),
            highlight_on_hover: Some(true),
            highlight_fill_color: Some(HIGHLIGHT_FILL.into()),
            highlight_border_color: Some(HIGHLIGHT_BORDER.into()),
            highlight_border_width: Some(2.0.into()),
            highlight_border_opacity: Some(1.0.into()),
            highlight_fill_opacity: Some(0.85.into()),
            exit_delay: Some(100),
            key: Some(KeyFn::json()),
        }
    }
}

impl ArcConfig {
    pub fn defaults() -> Self {
        Self {
            stroke_color: Some("#DD1C77".into()),
            stroke_width: Some(1.0.into()),
            arc_sharpness: Some(1.0.into()),
            animation_speed: Some(600.0.into()),
            popup_on_hover: Some(false),
            popup_template: Some(PopupTemplate::new(|_, data| Ok(arc_popup(data)))),
            great_arc: Some(false),
            key: Some(KeyFn::json()),
        }
    }
}

fn arc_popup(data: &Value) -> String {
    let (Some(origin), Some(destination)) = (data.get("origin"), data.get("destination")) else {
        return String::new();
    };
    if origin.is_object() && destination.is_object() {
        format!(
            "<div class=\"hoverinfo\"><strong>Arc</strong><br>Origin: {}<br>Destination: {}</div>",
            origin, destination
        )
    } else {
        let show = |v: &Value| v.as_str().map(str::to_string).unwrap_or_else(|| v.to_string());
        format!(
            "<div class=\"hoverinfo\"><strong>Arc</strong><br>{} -> {}</div>",
            show(origin),
            show(destination)
        )
    }
}

impl LabelsConfig {
    pub fn defaults() -> Self {
        Self {
            label_color: Some("#000".to_string()),
            line_width: Some(1.0),
            font_size: Some(10.0),
            font_family: Some("Verdana".to_string()),
            custom_label_text: Some(BTreeMap::new()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_resolution_is_idempotent() {
        let user = Options {
            scope: Some("usa".to_string()),
            geography_config: Some(GeographyConfig {
                border_color: Some("#000".to_string()),
                ..Default::default()
            }),
            ..Default::default()
        };
        let once = user.resolved();
        let twice = once.clone().resolved();
        assert_eq!(once, twice);
    }

    #[test]
    fn test_present_keys_win() {
        let user = Options {
            aspect_ratio: Some(0.75),
            fills: Some(BTreeMap::from([("defaultFill".to_string(), "#111".to_string())])),
            ..Default::default()
        };
        let resolved = user.resolved();
        assert_eq!(resolved.aspect_ratio, Some(0.75));
        assert_eq!(resolved.default_fill(), "#111");
        assert_eq!(resolved.projection.as_deref(), Some("equirectangular"));
    }

    #[test]
    fn test_nested_configs_are_completed() {
        let user = Options {
            geography_config: Some(GeographyConfig {
                hide_antarctica: Some(false),
                ..Default::default()
            }),
            fills: Some(BTreeMap::from([("A".to_string(), "#f00".to_string())])),
            ..Default::default()
        };
        let resolved = user.resolved();
        let geo = resolved.geography();
        assert_eq!(geo.hide_antarctica, Some(false));
        assert_eq!(geo.border_width, Some(1.0));
        assert_eq!(resolved.fills()["A"], "#f00");
        assert_eq!(resolved.default_fill(), DEFAULT_FILL);
    }

    #[test]
    fn test_trees_do_not_share_plain_values() {
        let mut a = Options::default().resolved();
        let b = Options::default().resolved();
        a.fills.as_mut().unwrap().insert("B".to_string(), "#00f".to_string());
        a.geography_config.as_mut().unwrap().border_color = Some("#123".to_string());

        assert!(!b.fills().contains_key("B"));
        assert_eq!(b.geography().border_color.as_deref(), Some("#FDFDFD"));
    }

    #[test]
    fn test_callbacks_are_shared() {
        let a = Options::default().resolved();
        let b = Options::default().resolved();
        // Each call to defaults() builds fresh templates, but one tree's copies are shared.
        let c = a.clone();
        assert_eq!(a.geography().popup_template, c.geography().popup_template);
        assert_ne!(a.geography().popup_template, b.geography().popup_template);
    }

    #[test]
    fn test_val_precedence() {
        let option: Resolvable<f64> = 3.0.into();
        let datum = json!({"radius": 7});
        assert_eq!(val(&datum, "radius", Some(&option), &datum), Some(7.0));
        assert_eq!(val(&json!({}), "radius", Some(&option), &datum), Some(3.0));
        assert_eq!(val::<f64>(&json!({}), "radius", None, &datum), None);
    }

    #[test]
    fn test_val_callback_sees_subject_and_datum() {
        let option = Resolvable::callback(|subject: &Value, datum: &Value| {
            Some(format!("{}-{}", subject["id"].as_str()?, datum["v"]))
        });
        let got = val(&json!({"v": 2}), "missing", Some(&option), &json!({"id": "NY"}));
        assert_eq!(got.as_deref(), Some("NY-2"));
    }

    #[test]
    fn test_default_popup_templates() {
        let geo = GeographyConfig::defaults().popup_template.unwrap();
        let html = geo.render(&json!({"properties": {"name": "Norway"}}), &json!({})).unwrap();
        assert_eq!(html, "<div class=\"hoverinfo\"><strong>Norway</strong></div>");
        assert!(geo.render(&json!({}), &json!({})).is_err());

        let arcs = ArcConfig::defaults().popup_template.unwrap();
        let html = arcs.render(&json!({}), &json!({"origin": "CAN", "destination": "JPN"})).unwrap();
        assert!(html.contains("CAN -> JPN"));
        assert_eq!(arcs.render(&json!({}), &json!({})).unwrap(), "");
    }
}
