//! Region paths and choropleth updates.

use crate::datamap::{Datamap, UpdateOptions};
use crate::error::{MapError, Result};
use crate::hover::HoverConfig;
use crate::join::diff;
use crate::map::Shape;
use crate::options::{val, Resolve};
use crate::scene::{fmt_num, NodeId, Property};
use rayon::prelude::*;
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, warn};

/// Duration of fill transitions started by choropleth updates
const FILL_TRANSITION_MS: u32 = 250;

impl Datamap {
    /// Reconcile the region group against the cached features
    pub(crate) fn draw_subunits(&mut self) -> Result<()> {
        let path = self.path.clone().ok_or(MapError::NotDrawn)?;
        let group = self.subunits_group().ok_or(MapError::NotDrawn)?;

        let shapes: Vec<Shape> = self
            .features
            .par_iter()
            .map(|f| f.geometry.as_ref().map(|g| path.shape(g)).unwrap_or_default())
            .collect();
        self.shapes = self
            .features
            .iter()
            .zip(&shapes)
            .map(|(f, s)| (f.id.clone(), s.clone()))
            .collect();

        let geography = self.options.geography();
        let hover = Arc::new(HoverConfig::from(&geography));
        let keys: Vec<String> = self.features.iter().map(|f| f.id.clone()).collect();
        let join = diff(&self.scene.keyed_children(group, "path"), &keys);

        for node in &join.exit {
            let removed = self.scene.remove(*node);
            self.hover.forget(&removed);
        }

        let mut placed: Vec<(usize, NodeId)> = join.update.clone();
        for &i in &join.enter {
            let node = self.scene.append(group, "path");
            self.scene.set_key(node, keys[i].clone());
            self.hover.bind(node, Arc::clone(&hover));
            placed.push((i, node));
        }

        for (i, node) in placed {
            let feature = &self.features[i];
            let subject = feature.to_value();
            let datum = self
                .options
                .data
                .as_ref()
                .and_then(|d| d.get(&feature.id))
                .cloned()
                .unwrap_or(Value::Null);

            let fill = val(&datum, "fillKey", geography.fill_key.as_ref(), &subject)
                .and_then(|key| self.options.fills().get(&key).cloned())
                .or_else(|| datum.get("fillColor").and_then(Value::as_str).map(str::to_string))
                .unwrap_or_else(|| self.options.default_fill().to_string());

            let scene = &mut self.scene;
            scene.set_attr(node, "d", shapes[i].d.clone());
            scene.set_attr(node, "class", format!("datamaps-subunit {}", feature.id));
            if datum.is_null() {
                scene.set_attr(node, "data-info", "");
            } else {
                scene.set_attr(node, "data-info", datum.to_string());
            }
            scene.set_style(node, "fill", Some(fill));
            scene.set_style(node, "stroke-width", geography.border_width.map(fmt_num));
            scene.set_style(node, "stroke-opacity", geography.border_opacity.map(fmt_num));
            scene.set_style(node, "stroke", geography.border_color.clone());
            scene.set_datum(node, subject);
            scene.set_info(node, datum);
        }

        debug!(
            entered = join.enter.len(),
            updated = join.update.len(),
            exited = join.exit.len(),
            "subunits reconciled"
        );
        Ok(())
    }

    /// Recolor regions after the first paint.
    ///
    /// Each entry is either a color string or an object carrying `fillKey`,
    /// `fillColor` or `color`, tried in that order. Object entries are merged over the region's
    /// stored datum and become what its popup shows.
    pub fn update_choropleth(&mut self, data: &BTreeMap<String, Value>, options: Option<UpdateOptions>) {
        let Some(group) = self.subunits_group() else {
            warn!("choropleth update before the map was drawn");
            return;
        };

        if options.unwrap_or_default().reset {
            let default_fill = self.options.default_fill().to_string();
            for node in self.scene.live_children(group) {
                self.scene.set_info(node, Value::Object(Map::new()));
                self.scene.set_attr(node, "data-info", "{}");
                self.scene
                    .transition(node, Property::Style("fill".to_string()), default_fill.clone(), 0, FILL_TRANSITION_MS);
            }
            if let Some(stored) = self.options.data.as_mut() {
                stored.clear();
            }
        }

        for (id, incoming) in data {
            if id.is_empty() {
                continue;
            }
            let color = match incoming {
                Value::String(color) => Some(color.clone()),
                _ => incoming
                    .get("fillKey")
                    .and_then(Value::as_str)
                    .and_then(|key| self.options.fills().get(key).cloned())
                    .or_else(|| {
                        ["fillColor", "color"]
                            .iter()
                            .find_map(|field| incoming.get(*field).and_then(Value::as_str))
                            .map(str::to_string)
                    }),
            };
            let nodes = self.scene.select_class(group, id);

            if incoming.is_object() {
                let stored = self.options.data.get_or_insert_with(BTreeMap::new);
                let mut merged = incoming.clone();
                if let Some(existing) = stored.get(id) {
                    merged.resolve_from(existing);
                }
                stored.insert(id.clone(), merged.clone());
                for &node in &nodes {
                    self.scene.set_attr(node, "data-info", merged.to_string());
                    self.scene.set_info(node, merged.clone());
                }
            }

            let Some(color) = color else {
                debug!(region = %id, "no color in update");
                continue;
            };
            for &node in &nodes {
                self.scene
                    .transition(node, Property::Style("fill".to_string()), color.clone(), 0, FILL_TRANSITION_MS);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::datamap::tests::{drawn_world, world_map};
    use crate::datamap::UpdateOptions;
    use crate::options::{GeographyConfig, Options, Resolvable};
    use serde_json::{json, Value};
    use std::collections::BTreeMap;

    fn region(map: &crate::Datamap, id: &str) -> crate::scene::NodeId {
        let group = map.subunits_group().unwrap();
        map.scene().select_class(group, id)[0]
    }

    fn fills() -> BTreeMap<String, String> {
        BTreeMap::from([
            ("A".to_string(), "#ff0000".to_string()),
            ("B".to_string(), "#00ff00".to_string()),
        ])
    }

    #[test]
    fn test_initial_fills() {
        let mut map = world_map(Options {
            fills: Some(fills()),
            data: Some(BTreeMap::from([
                ("USA".to_string(), json!({"fillKey": "A"})),
                ("CAN".to_string(), json!({"fillColor": "#123456"})),
            ])),
            ..Default::default()
        });
        map.draw().unwrap();

        assert_eq!(map.scene().style(region(&map, "USA"), "fill"), Some("#ff0000"));
        assert_eq!(map.scene().style(region(&map, "CAN"), "fill"), Some("#123456"));
        assert_eq!(map.scene().style(region(&map, "JPN"), "fill"), Some("#ABDDA4"));
        assert_eq!(map.scene().style(region(&map, "JPN"), "stroke"), Some("#FDFDFD"));
        assert_eq!(map.scene().attr(region(&map, "USA"), "data-info"), Some("{\"fillKey\":\"A\"}"));
    }

    #[test]
    fn test_fill_key_callback() {
        let mut map = world_map(Options {
            fills: Some(fills()),
            geography_config: Some(GeographyConfig {
                fill_key: Some(Resolvable::callback(|geography: &Value, _: &Value| {
                    (geography["id"] == "JPN").then(|| "B".to_string())
                })),
                ..Default::default()
            }),
            ..Default::default()
        });
        map.draw().unwrap();
        assert_eq!(map.scene().style(region(&map, "JPN"), "fill"), Some("#00ff00"));
        assert_eq!(map.scene().style(region(&map, "USA"), "fill"), Some("#ABDDA4"));
    }

    #[test]
    fn test_redraw_keeps_one_path_per_region() {
        let mut map = drawn_world();
        let usa = region(&map, "USA");
        map.draw().unwrap();
        let group = map.subunits_group().unwrap();
        assert_eq!(map.scene().children(group).len(), 4);
        assert_eq!(region(&map, "USA"), usa);
    }

    #[test]
    fn test_update_choropleth_forms() {
        let mut map = world_map(Options {
            fills: Some(fills()),
            ..Default::default()
        });
        map.draw().unwrap();
        map.update_choropleth(
            &BTreeMap::from([
                ("USA".to_string(), json!("#0000ff")),
                ("CAN".to_string(), json!({"fillKey": "B", "population": 38})),
                ("JPN".to_string(), json!({"note": "no color"})),
            ]),
            None,
        );

        let usa = region(&map, "USA");
        assert_eq!(map.scene().style(usa, "fill"), Some("#0000ff"));
        let t = &map.scene().element(usa).unwrap().transitions()[0];
        assert_eq!(t.from.as_deref(), Some("#ABDDA4"));
        assert_eq!(t.duration_ms, 250);

        let can = region(&map, "CAN");
        assert_eq!(map.scene().style(can, "fill"), Some("#00ff00"));
        assert_eq!(map.scene().element(can).unwrap().info()["population"], 38);

        let jpn = region(&map, "JPN");
        assert_eq!(map.scene().style(jpn, "fill"), Some("#ABDDA4"));
        assert_eq!(map.options().data.as_ref().unwrap()["JPN"]["note"], "no color");
    }

    #[test]
    fn test_update_fill_key_beats_fill_color() {
        let mut map = world_map(Options {
            fills: Some(fills()),
            ..Default::default()
        });
        map.draw().unwrap();
        map.update_choropleth(
            &BTreeMap::from([
                ("JPN".to_string(), json!({"fillKey": "A", "fillColor": "#123456"})),
                ("CAN".to_string(), json!({"fillKey": "missing", "fillColor": "#123456", "color": "#654321"})),
                ("USA".to_string(), json!({"color": "#654321"})),
            ]),
            None,
        );

        assert_eq!(map.scene().style(region(&map, "JPN"), "fill"), Some("#ff0000"));
        assert_eq!(map.scene().style(region(&map, "CAN"), "fill"), Some("#123456"));
        assert_eq!(map.scene().style(region(&map, "USA"), "fill"), Some("#654321"));
    }

    #[test]
    fn test_update_merges_over_existing_datum() {
        let mut map = world_map(Options {
            fills: Some(fills()),
            data: Some(BTreeMap::from([("USA".to_string(), json!({"fillKey": "A", "votes": 10}))])),
            ..Default::default()
        });
        map.draw().unwrap();
        map.update_choropleth(&BTreeMap::from([("USA".to_string(), json!({"fillKey": "B"}))]), None);

        let stored = &map.options().data.as_ref().unwrap()["USA"];
        assert_eq!(stored, &json!({"fillKey": "B", "votes": 10}));
        assert_eq!(map.scene().style(region(&map, "USA"), "fill"), Some("#00ff00"));
    }

    #[test]
    fn test_reset_returns_to_default() {
        let mut map = world_map(Options {
            fills: Some(fills()),
            data: Some(BTreeMap::from([("USA".to_string(), json!({"fillKey": "A"}))])),
            ..Default::default()
        });
        map.draw().unwrap();
        map.update_choropleth(
            &BTreeMap::from([("CAN".to_string(), json!({"fillKey": "B"}))]),
            Some(UpdateOptions { reset: true }),
        );

        assert_eq!(map.scene().style(region(&map, "USA"), "fill"), Some("#ABDDA4"));
        assert_eq!(map.scene().element(region(&map, "USA")).unwrap().info(), &json!({}));
        assert_eq!(map.scene().style(region(&map, "CAN"), "fill"), Some("#00ff00"));
        let stored = map.options().data.as_ref().unwrap();
        assert_eq!(stored.keys().collect::<Vec<_>>(), vec!["CAN"]);
    }

    #[test]
    fn test_update_before_draw_is_ignored() {
        let mut map = world_map(Options::default());
        map.update_choropleth(&BTreeMap::from([("USA".to_string(), json!("#000"))]), None);
        assert!(map.features().is_empty());
    }
}
