//! Hover highlighting and the floating popup.
//!
//! Elements opt in by being bound to a [`HoverConfig`]. Hovering snapshots the
//! element's paint styles into a side table, applies the highlight, and
//! unhovering restores the snapshot. The popup follows the pointer while an
//! element is hovered.

use crate::datamap::Datamap;
use crate::options::{val, ArcConfig, BubblesConfig, GeographyConfig, PopupTemplate, Resolvable};
use crate::scene::{fmt_num, NodeId};
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::fmt::Write;
use std::sync::Arc;
use tracing::{debug, warn};

/// Styles captured before highlighting and put back afterwards
const SNAPSHOT_STYLES: [&str; 5] = ["fill", "stroke", "stroke-width", "stroke-opacity", "fill-opacity"];

/// Popup offset below the pointer, in pixels
const POPUP_OFFSET: f64 = 30.0;

/// Hover behaviour of one kind of element
#[derive(Clone, Debug, Default, PartialEq)]
pub struct HoverConfig {
    pub popup_on_hover: bool,
    pub highlight_on_hover: bool,
    pub popup_template: Option<PopupTemplate>,
    pub highlight_fill_color: Option<Resolvable<String>>,
    pub highlight_border_color: Option<Resolvable<String>>,
    pub highlight_border_width: Option<Resolvable<f64>>,
    pub highlight_border_opacity: Option<Resolvable<f64>>,
    pub highlight_fill_opacity: Option<Resolvable<f64>>,
}

impl From<&GeographyConfig> for HoverConfig {
    fn from(c: &GeographyConfig) -> Self {
        Self {
            popup_on_hover: c.popup_on_hover.unwrap_or(false),
            highlight_on_hover: c.highlight_on_hover.unwrap_or(false),
            popup_template: c.popup_template.clone(),
            highlight_fill_color: c.highlight_fill_color.clone(),
            highlight_border_color: c.highlight_border_color.clone(),
            highlight_border_width: c.highlight_border_width.clone(),
            highlight_border_opacity: c.highlight_border_opacity.clone(),
            highlight_fill_opacity: c.highlight_fill_opacity.clone(),
        }
    }
}

impl From<&BubblesConfig> for HoverConfig {
    fn from(c: &BubblesConfig) -> Self {
        Self {
            popup_on_hover: c.popup_on_hover.unwrap_or(false),
            highlight_on_hover: c.highlight_on_hover.unwrap_or(false),
            popup_template: c.popup_template.clone(),
            highlight_fill_color: c.highlight_fill_color.clone(),
            highlight_border_color: c.highlight_border_color.clone(),
            highlight_border_width: c.highlight_border_width.clone(),
            highlight_border_opacity: c.highlight_border_opacity.clone(),
            highlight_fill_opacity: c.highlight_fill_opacity.clone(),
        }
    }
}

impl From<&ArcConfig> for HoverConfig {
    /// Arcs only ever show a popup
    fn from(c: &ArcConfig) -> Self {
        Self {
            popup_on_hover: c.popup_on_hover.unwrap_or(false),
            popup_template: c.popup_template.clone(),
            ..Default::default()
        }
    }
}

/// The floating popup shown next to the pointer
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Popup {
    visible: bool,
    left: f64,
    top: f64,
    html: String,
}

impl Popup {
    pub fn is_visible(&self) -> bool {
        self.visible
    }

    pub fn left(&self) -> f64 {
        self.left
    }

    pub fn top(&self) -> f64 {
        self.top
    }

    pub fn html(&self) -> &str {
        &self.html
    }

    pub(crate) fn to_html(&self) -> String {
        let mut out = String::from("<div class=\"datamaps-hoverover\" style=\"z-index: 10001; position: absolute; ");
        if self.visible {
            let _ = write!(out, "display: block; left: {}px; top: {}px", fmt_num(self.left), fmt_num(self.top));
        } else {
            out.push_str("display: none");
        }
        let _ = write!(out, "\">{}</div>", self.html);
        out
    }
}

#[derive(Clone, Debug)]
struct Snapshot(Vec<(&'static str, Option<String>)>);

#[derive(Clone, Debug)]
struct Tracking {
    element: NodeId,
    subject: Value,
    template: PopupTemplate,
}

/// Side tables for hover: which elements react, and what to restore
#[derive(Debug, Default)]
pub(crate) struct HoverState {
    bindings: HashMap<NodeId, Arc<HoverConfig>>,
    snapshots: HashMap<NodeId, Snapshot>,
    tracking: Option<Tracking>,
}

impl HoverState {
    pub(crate) fn bind(&mut self, element: NodeId, config: Arc<HoverConfig>) {
        self.bindings.insert(element, config);
    }

    /// Drop everything held for elements that left the scene
    pub(crate) fn forget(&mut self, removed: &[NodeId]) {
        for id in removed {
            self.bindings.remove(id);
            self.snapshots.remove(id);
        }
        if self.tracking.as_ref().is_some_and(|t| removed.contains(&t.element)) {
            self.tracking = None;
        }
    }

    #[cfg(test)]
    pub(crate) fn is_bound(&self, element: NodeId) -> bool {
        self.bindings.contains_key(&element)
    }

    #[cfg(test)]
    pub(crate) fn has_snapshot(&self, element: NodeId) -> bool {
        self.snapshots.contains_key(&element)
    }
}

impl Datamap {
    /// Pointer entered `element` at `pointer` (container coordinates)
    pub fn hover(&mut self, element: NodeId, pointer: [f64; 2]) {
        let Some(config) = self.hover.bindings.get(&element).cloned() else {
            debug!(?element, "hover on element without hover binding");
            return;
        };
        let Some(el) = self.scene.element(element) else {
            return;
        };
        let subject = el.datum().clone();
        let info = match el.info() {
            Value::Null => Value::Object(Map::new()),
            other => other.clone(),
        };

        if config.highlight_on_hover {
            if !self.hover.snapshots.contains_key(&element) {
                let captured = SNAPSHOT_STYLES
                    .iter()
                    .map(|&name| (name, self.scene.style(element, name).map(str::to_string)))
                    .collect();
                self.hover.snapshots.insert(element, Snapshot(captured));
            }

            let fill = val(&info, "highlightFillColor", config.highlight_fill_color.as_ref(), &subject);
            let stroke = val(&info, "highlightBorderColor", config.highlight_border_color.as_ref(), &subject);
            let width = val(&info, "highlightBorderWidth", config.highlight_border_width.as_ref(), &subject);
            let stroke_opacity = val(&info, "highlightBorderOpacity", config.highlight_border_opacity.as_ref(), &subject);
            let fill_opacity = val(&info, "highlightFillOpacity", config.highlight_fill_opacity.as_ref(), &subject);

            self.scene.set_style(element, "fill", fill);
            self.scene.set_style(element, "stroke", stroke);
            self.scene.set_style(element, "stroke-width", width.map(fmt_num));
            self.scene.set_style(element, "stroke-opacity", stroke_opacity.map(fmt_num));
            self.scene.set_style(element, "fill-opacity", fill_opacity.map(fmt_num));

            if !self.is_legacy_engine() {
                self.scene.raise(element);
            }
        }

        if config.popup_on_hover {
            if let Some(template) = config.popup_template.clone() {
                self.update_popup(element, &subject, &template, pointer);
            }
        }
    }

    /// Pointer left `element`: restore its styles and hide the popup
    pub fn unhover(&mut self, element: NodeId) {
        if let Some(Snapshot(styles)) = self.hover.snapshots.remove(&element) {
            for (name, value) in styles {
                self.scene.set_style(element, name, value);
            }
        }
        if self.hover.tracking.as_ref().is_some_and(|t| t.element == element) {
            self.hover.tracking = None;
        }
        if let Some(popup) = self.container.popup.as_mut() {
            popup.visible = false;
        }
    }

    /// Pointer moved while an element is hovered
    pub fn pointer_moved(&mut self, pointer: [f64; 2]) {
        if self.hover.tracking.is_some() {
            self.render_popup(pointer);
        }
    }

    /// Show the popup for `element`, rendering `template` with `subject` and
    /// the element's stored datum, and keep it following the pointer
    pub fn update_popup(&mut self, element: NodeId, subject: &Value, template: &PopupTemplate, pointer: [f64; 2]) {
        self.hover.tracking = Some(Tracking {
            element,
            subject: subject.clone(),
            template: template.clone(),
        });
        self.render_popup(pointer);
        if let Some(popup) = self.container.popup.as_mut() {
            popup.visible = true;
        }
    }

    fn render_popup(&mut self, pointer: [f64; 2]) {
        let Some(tracking) = &self.hover.tracking else {
            return;
        };
        let info = self
            .scene
            .element(tracking.element)
            .map(|e| e.info().clone())
            .unwrap_or(Value::Null);
        let html = match tracking.template.render(&tracking.subject, &info) {
            Ok(html) => html,
            Err(err) => {
                warn!(error = %err, "popup template failed, showing empty popup");
                String::new()
            }
        };
        let popup = self.container.popup.get_or_insert_with(Popup::default);
        popup.left = pointer[0];
        popup.top = pointer[1] + POPUP_OFFSET;
        popup.html = html;
    }

    /// Engines that lose hover state when an element is re-inserted
    fn is_legacy_engine(&self) -> bool {
        self.options
            .user_agent
            .as_deref()
            .is_some_and(|ua| ua.contains("MSIE") || ua.contains("Trident"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::datamap::tests::{drawn_world, world_map};
    use crate::options::Options;
    use serde_json::json;
    use std::collections::BTreeMap;

    fn region(map: &Datamap, id: &str) -> NodeId {
        let group = map.subunits_group().unwrap();
        map.scene().select_class(group, id)[0]
    }

    #[test]
    fn test_region_highlight_and_restore() {
        let mut map = drawn_world();
        let usa = region(&map, "USA");
        map.hover(usa, [120.0, 40.0]);

        assert_eq!(map.scene().style(usa, "fill"), Some("#FC8D59"));
        assert_eq!(map.scene().style(usa, "stroke"), Some("rgba(250, 15, 160, 0.2)"));
        assert_eq!(map.scene().style(usa, "stroke-width"), Some("2"));
        let group = map.subunits_group().unwrap();
        assert_eq!(map.scene().children(group).last(), Some(&usa));

        let popup = map.container().popup().unwrap();
        assert!(popup.is_visible());
        assert_eq!(popup.html(), "<div class=\"hoverinfo\"><strong>United States of America</strong></div>");
        assert_eq!((popup.left(), popup.top()), (120.0, 70.0));

        map.unhover(usa);
        assert_eq!(map.scene().style(usa, "fill"), Some("#ABDDA4"));
        assert_eq!(map.scene().style(usa, "stroke"), Some("#FDFDFD"));
        assert_eq!(map.scene().style(usa, "stroke-width"), Some("1"));
        assert!(!map.hover.has_snapshot(usa));
        assert!(!map.container().popup().unwrap().is_visible());
    }

    #[test]
    fn test_repeated_hover_keeps_first_snapshot() {
        let mut map = drawn_world();
        let usa = region(&map, "USA");
        map.hover(usa, [0.0, 0.0]);
        map.hover(usa, [1.0, 1.0]);
        map.unhover(usa);
        assert_eq!(map.scene().style(usa, "fill"), Some("#ABDDA4"));
    }

    #[test]
    fn test_datum_overrides_highlight() {
        let mut map = world_map(Options {
            data: Some(BTreeMap::from([("CAN".to_string(), json!({"highlightFillColor": "#000"}))])),
            ..Default::default()
        });
        map.draw().unwrap();
        let can = region(&map, "CAN");
        map.hover(can, [0.0, 0.0]);
        assert_eq!(map.scene().style(can, "fill"), Some("#000"));
    }

    #[test]
    fn test_legacy_engines_are_not_raised() {
        let mut map = world_map(Options {
            user_agent: Some("Mozilla/5.0 (Windows NT 6.1; Trident/7.0; rv:11.0)".to_string()),
            ..Default::default()
        });
        map.draw().unwrap();
        let group = map.subunits_group().unwrap();
        let before = map.scene().children(group).to_vec();
        map.hover(before[0], [0.0, 0.0]);
        assert_eq!(map.scene().children(group), before.as_slice());
        assert_eq!(map.scene().style(before[0], "fill"), Some("#FC8D59"));
    }

    #[test]
    fn test_failing_template_shows_empty_popup() {
        let mut map = world_map(Options {
            geography_config: Some(GeographyConfig {
                popup_template: Some(PopupTemplate::new(|_, _| anyhow::bail!("no name"))),
                ..Default::default()
            }),
            ..Default::default()
        });
        map.draw().unwrap();
        let jpn = region(&map, "JPN");
        map.hover(jpn, [5.0, 5.0]);
        let popup = map.container().popup().unwrap();
        assert!(popup.is_visible());
        assert_eq!(popup.html(), "");
    }

    #[test]
    fn test_pointer_moves_popup() {
        let mut map = drawn_world();
        let jpn = region(&map, "JPN");
        map.pointer_moved([9.0, 9.0]);
        assert!(!map.container().popup().unwrap().is_visible());

        map.hover(jpn, [5.0, 5.0]);
        map.pointer_moved([50.0, 60.0]);
        let popup = map.container().popup().unwrap();
        assert_eq!((popup.left(), popup.top()), (50.0, 90.0));
        assert!(popup.to_html().contains("left: 50px; top: 90px"));
    }

    #[test]
    fn test_unbound_elements_ignore_hover() {
        let mut map = drawn_world();
        let layer = map.add_layer("custom", None, false);
        let dot = map.scene_mut().append(layer, "circle");
        map.hover(dot, [0.0, 0.0]);
        assert!(!map.hover.is_bound(dot));
        assert!(!map.container().popup().unwrap().is_visible());
    }

    #[test]
    fn test_forget_drops_tracking() {
        let mut map = drawn_world();
        let jpn = region(&map, "JPN");
        map.hover(jpn, [0.0, 0.0]);
        map.hover.forget(&[jpn]);
        assert!(!map.hover.is_bound(jpn));
        assert!(!map.hover.has_snapshot(jpn));
        assert!(map.hover.tracking.is_none());
    }
}
