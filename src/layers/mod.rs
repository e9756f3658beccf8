//! Layer plugins.
//!
//! A layer is a named SVG group plus the options it was last drawn with.
//! [`Datamap::render_layer`] resolves options, reuses or creates the group and
//! hands both to the layer's draw function. Calling a layer again without new
//! options redraws into the same group with the same options, so renderers
//! reconcile against what is already there instead of stacking copies.

pub mod arcs;
pub mod bubbles;
pub mod labels;
pub mod legend;
pub mod subunits;

pub use arcs::Arcs;
pub use bubbles::Bubbles;
pub use labels::Labels;
pub use legend::Graticule;

use crate::datamap::Datamap;
use crate::error::{MapError, Result};
use crate::options::{resolve, Options, Resolve};
use crate::scene::NodeId;
use serde_json::Value;
use std::any::Any;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

/// A renderer that can be installed on a map
pub trait Layer {
    /// Layer name, also used as the class of its group
    const NAME: &'static str;

    type Data: ?Sized;
    type Config: Resolve + Clone + Send + Sync + 'static;

    /// Defaults for this layer taken from the map's resolved options
    fn defaults(options: &Options) -> Self::Config;

    /// Reject unusable data before the layer's group is touched
    fn check(_data: &Self::Data) -> Result<()> {
        Ok(())
    }

    fn draw(map: &mut Datamap, layer: NodeId, data: &Self::Data, config: &Self::Config) -> Result<()>;
}

/// Group and cached options of one layer
#[derive(Clone)]
pub struct LayerSlot {
    pub group: NodeId,
    options: Arc<dyn Any + Send + Sync>,
}

impl std::fmt::Debug for LayerSlot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LayerSlot").field("group", &self.group).finish_non_exhaustive()
    }
}

/// Per-map table of installed layers
#[derive(Debug, Default)]
pub struct LayerRegistry {
    slots: HashMap<String, LayerSlot>,
}

impl LayerRegistry {
    pub fn get(&self, name: &str) -> Option<&LayerSlot> {
        self.slots.get(name)
    }

    fn insert(&mut self, name: &str, group: NodeId, options: Arc<dyn Any + Send + Sync>) {
        self.slots.insert(name.to_string(), LayerSlot { group, options });
    }

    fn options<T: Any + Send + Sync>(&self, name: &str) -> Option<Arc<T>> {
        let slot = self.slots.get(name)?;
        Arc::clone(&slot.options).downcast::<T>().ok()
    }
}

type PluginFn = dyn Fn(&mut Datamap, NodeId, &Value, &Value) -> anyhow::Result<()> + Send + Sync;

/// A host-defined layer configured with JSON options
#[derive(Clone)]
pub struct Plugin {
    defaults: Value,
    draw: Arc<PluginFn>,
}

impl Plugin {
    pub fn new(
        defaults: Value,
        draw: impl Fn(&mut Datamap, NodeId, &Value, &Value) -> anyhow::Result<()> + Send + Sync + 'static,
    ) -> Self {
        Self {
            defaults,
            draw: Arc::new(draw),
        }
    }
}

impl std::fmt::Debug for Plugin {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Plugin").field("defaults", &self.defaults).finish_non_exhaustive()
    }
}

impl Datamap {
    /// Reuse the cached group and options of `name`, or create both.
    /// `resolved` replaces the cached options when given.
    fn layer_slot<C: Any + Send + Sync>(
        &mut self,
        name: &str,
        resolved: Option<C>,
        force_new_layer: bool,
        defaults: impl FnOnce() -> C,
    ) -> (NodeId, Arc<C>) {
        let existing = self
            .layers
            .get(name)
            .map(|slot| slot.group)
            .filter(|&group| !force_new_layer && self.scene.contains(group));

        match existing {
            Some(group) => {
                let options = match resolved {
                    Some(options) => {
                        let options = Arc::new(options);
                        self.layers.insert(name, group, options.clone());
                        options
                    }
                    None => match self.layers.options::<C>(name) {
                        Some(cached) => cached,
                        None => {
                            let options = Arc::new(defaults());
                            self.layers.insert(name, group, options.clone());
                            options
                        }
                    },
                };
                debug!(layer = name, "reusing layer");
                (group, options)
            }
            None => {
                let group = self.add_layer(name, None, false);
                let options = Arc::new(resolved.unwrap_or_else(defaults));
                self.layers.insert(name, group, options.clone());
                debug!(layer = name, "created layer");
                (group, options)
            }
        }
    }

    /// Draw layer `L`. `options` are resolved against the layer's defaults;
    /// `None` on a reused layer keeps the options it was last drawn with.
    /// Returns the layer's group.
    pub fn render_layer<L: Layer>(
        &mut self,
        data: &L::Data,
        options: Option<L::Config>,
        force_new_layer: bool,
    ) -> Result<NodeId> {
        self.render_layer_with::<L>(data, options, force_new_layer, |_, _| {})
    }

    /// [`Datamap::render_layer`], then hand the layer's group to `callback`
    pub fn render_layer_with<L: Layer>(
        &mut self,
        data: &L::Data,
        options: Option<L::Config>,
        force_new_layer: bool,
        callback: impl FnOnce(&mut Datamap, NodeId),
    ) -> Result<NodeId> {
        L::check(data)?;
        let defaults = L::defaults(&self.options);
        let resolved = options.map(|o| resolve(Some(o), &defaults));
        let (group, config) = self.layer_slot(L::NAME, resolved, force_new_layer, || defaults);
        L::draw(self, group, data, &*config)?;
        callback(self, group);
        Ok(group)
    }

    /// Options layer `L` was last drawn with
    pub fn layer_options<L: Layer>(&self) -> Option<Arc<L::Config>> {
        self.layers.options::<L::Config>(L::NAME)
    }

    /// Group of the layer called `name`
    pub fn layer_group(&self, name: &str) -> Option<NodeId> {
        self.layers.get(name).map(|slot| slot.group)
    }

    /// Install a host-defined layer on this map only
    pub fn add_plugin(&mut self, name: impl Into<String>, plugin: Plugin) {
        self.plugins.insert(name.into(), plugin);
    }

    /// Draw the plugin `name`, following the same reuse rule as built-in layers
    pub fn plugin(
        &mut self,
        name: &str,
        data: &Value,
        options: Option<Value>,
        force_new_layer: bool,
    ) -> Result<NodeId> {
        let plugin = self
            .plugins
            .get(name)
            .cloned()
            .ok_or_else(|| MapError::UnknownPlugin(name.to_string()))?;
        let resolved = options.map(|o| resolve(Some(o), &plugin.defaults));
        let (group, config) = self.layer_slot(name, resolved, force_new_layer, || plugin.defaults.clone());
        (plugin.draw)(self, group, data, &*config).map_err(|source| MapError::Plugin {
            name: name.to_string(),
            source,
        })?;
        Ok(group)
    }

    /// Draw bubbles; see [`Bubbles`]
    pub fn bubbles(&mut self, data: &Value, options: Option<crate::options::BubblesConfig>) -> Result<NodeId> {
        self.render_layer::<Bubbles>(data, options, false)
    }

    /// Draw arcs; see [`Arcs`]
    pub fn arc(&mut self, data: &Value, options: Option<crate::options::ArcConfig>) -> Result<NodeId> {
        self.render_layer::<Arcs>(data, options, false)
    }

    /// Label every region; see [`Labels`]
    pub fn labels(&mut self, options: Option<crate::options::LabelsConfig>) -> Result<NodeId> {
        self.render_layer::<Labels>(&(), options, false)
    }

    /// Draw the meridian/parallel grid; see [`Graticule`]
    pub fn graticule(&mut self, options: Option<crate::options::GraticuleConfig>) -> Result<NodeId> {
        self.render_layer::<Graticule>(&(), options, false)
    }
}

/// Records of a keyed layer, which must be an array
pub(crate) fn records<'a>(data: &'a Value, layer: &'static str) -> Result<&'a [Value]> {
    data.as_array()
        .map(Vec::as_slice)
        .ok_or(MapError::NotArray { layer })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::datamap::tests::drawn_world;
    use crate::options::BubblesConfig;
    use serde_json::json;

    #[test]
    fn test_reuse_keeps_group_and_options() {
        let mut map = drawn_world();
        let options = BubblesConfig {
            exit_delay: Some(0),
            ..Default::default()
        };
        let first = map.bubbles(&json!([]), Some(options)).unwrap();
        let cached = map.layer_options::<Bubbles>().unwrap();
        let second = map.bubbles(&json!([]), None).unwrap();

        assert_eq!(first, second);
        assert!(Arc::ptr_eq(&cached, &map.layer_options::<Bubbles>().unwrap()));
        assert_eq!(cached.exit_delay, Some(0));
        assert_eq!(map.scene().select_class(map.scene().root(), "bubbles").len(), 1);
    }

    #[test]
    fn test_new_options_replace_cache() {
        let mut map = drawn_world();
        map.bubbles(&json!([]), None).unwrap();
        map.bubbles(
            &json!([]),
            Some(BubblesConfig {
                animate: Some(false),
                ..Default::default()
            }),
        )
        .unwrap();
        let cached = map.layer_options::<Bubbles>().unwrap();
        assert_eq!(cached.animate, Some(false));
        // Resolved against the map's bubble defaults
        assert_eq!(cached.exit_delay, Some(100));
    }

    #[test]
    fn test_force_new_layer() {
        let mut map = drawn_world();
        let a = map.render_layer::<Bubbles>(&json!([]), None, false).unwrap();
        let b = map.render_layer::<Bubbles>(&json!([]), None, true).unwrap();
        assert_ne!(a, b);
        assert_eq!(map.layer_group("bubbles"), Some(b));
    }

    #[test]
    fn test_callback_receives_group() {
        let mut map = drawn_world();
        let mut seen = None;
        let group = map
            .render_layer_with::<Bubbles>(&json!([]), None, false, |_, g| seen = Some(g))
            .unwrap();
        assert_eq!(seen, Some(group));
    }

    #[test]
    fn test_plugin_reuse_and_options() {
        let mut map = drawn_world();
        map.add_plugin(
            "dots",
            Plugin::new(json!({"color": "#000", "size": 2}), |map, layer, data, options| {
                let scene = map.scene_mut();
                scene.clear_children(layer);
                for _ in data.as_array().into_iter().flatten() {
                    let c = scene.append(layer, "circle");
                    scene.set_style(c, "fill", options["color"].as_str().map(str::to_string));
                }
                Ok(())
            }),
        );

        let g1 = map.plugin("dots", &json!([1, 2]), Some(json!({"color": "#f00"})), false).unwrap();
        let g2 = map.plugin("dots", &json!([1]), None, false).unwrap();
        assert_eq!(g1, g2);
        let circles = map.scene().children(g2).to_vec();
        assert_eq!(circles.len(), 1);
        assert_eq!(map.scene().style(circles[0], "fill"), Some("#f00"));
    }

    #[test]
    fn test_unknown_plugin() {
        let mut map = drawn_world();
        let err = map.plugin("nope", &json!(null), None, false);
        assert!(matches!(err, Err(MapError::UnknownPlugin(name)) if name == "nope"));
    }

    #[test]
    fn test_plugin_errors_are_wrapped() {
        let mut map = drawn_world();
        map.add_plugin("broken", Plugin::new(json!({}), |_, _, _, _| anyhow::bail!("boom")));
        let err = map.plugin("broken", &json!([]), None, false);
        assert!(matches!(err, Err(MapError::Plugin { name, .. }) if name == "broken"));
    }

    #[test]
    fn test_records_requires_array() {
        assert!(records(&json!([1]), "bubbles").is_ok());
        assert!(matches!(records(&json!({"a": 1}), "arcs"), Err(MapError::NotArray { layer: "arcs" })));
    }
}
