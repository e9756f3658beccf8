//! Proportional-symbol circles.

use crate::datamap::Datamap;
use crate::error::Result;
use crate::hover::HoverConfig;
use crate::join::diff;
use crate::layers::{records, Layer};
use crate::options::{val, BubblesConfig, FromDatum, KeyFn, Options};
use crate::scene::{fmt_num, NodeId, Property};
use serde_json::Value;
use std::sync::Arc;
use tracing::debug;

const GROW_MS: u32 = 400;
const SHRINK_MS: u32 = 250;

/// Geographic center used for bubbles centered on the whole United States
pub(crate) const USA_CENTER: (f64, f64) = (-98.58333, 39.83333);

/// Circles placed at a coordinate or at a region's centroid.
///
/// Records are keyed by [`BubblesConfig::key`], whole-record identity by
/// default. Entering circles grow from zero, existing ones animate to their
/// new radius, and circles whose record disappeared shrink away after
/// `exit_delay` and are retired.
pub struct Bubbles;

impl Layer for Bubbles {
    const NAME: &'static str = "bubbles";
    type Data = Value;
    type Config = BubblesConfig;

    fn defaults(options: &Options) -> BubblesConfig {
        options.bubbles_config.clone().unwrap_or_else(BubblesConfig::defaults)
    }

    fn check(data: &Value) -> Result<()> {
        records(data, "bubbles").map(|_| ())
    }

    fn draw(map: &mut Datamap, layer: NodeId, data: &Value, config: &BubblesConfig) -> Result<()> {
        let records = records(data, "bubbles")?;
        let removed = map.scene.sweep(layer);
        map.hover.forget(&removed);

        let placed: Vec<(&Value, [f64; 2])> = records
            .iter()
            .filter_map(|record| match bubble_position(map, record) {
                Some(position) => Some((record, position)),
                None => {
                    debug!(%record, "bubble position unresolved, skipping");
                    None
                }
            })
            .collect();

        let key_fn = config.key.clone().unwrap_or_else(KeyFn::json);
        let keys: Vec<String> = placed.iter().enumerate().map(|(i, (r, _))| key_fn.key(r, i)).collect();
        let join = diff(&map.scene.keyed_children(layer, "circle"), &keys);

        let hover = Arc::new(HoverConfig::from(config));
        let animate = config.animate.unwrap_or(true);

        let mut live = join.update.clone();
        for &i in &join.enter {
            let (record, _) = placed[i];
            let node = map.scene.append(layer, "circle");
            map.scene.set_key(node, keys[i].clone());

            let radius = val(record, "radius", config.radius.as_ref(), record);
            let initial = if animate { Some(0.0) } else { radius };
            if let Some(r) = initial {
                map.scene.set_attr(node, "r", fmt_num(r));
            }

            let filter = val(record, "filterKey", config.filter_key.as_ref(), record)
                .and_then(|key| map.options.filters.as_ref()?.get(&key).cloned());
            if let Some(filter) = filter {
                map.scene.set_attr(node, "filter", filter);
            }

            let fill = fill_key(record, config)
                .and_then(|key| map.options.fills().get(&key).cloned())
                .unwrap_or_else(|| map.options.default_fill().to_string());
            let stroke = val(record, "borderColor", config.border_color.as_ref(), record);
            let width = val(record, "borderWidth", config.border_width.as_ref(), record);
            let opacity = val(record, "borderOpacity", config.border_opacity.as_ref(), record);
            let fill_opacity = val(record, "fillOpacity", config.fill_opacity.as_ref(), record);

            let scene = &mut map.scene;
            scene.set_style(node, "fill", Some(fill));
            scene.set_style(node, "stroke", stroke);
            scene.set_style(node, "stroke-width", width.map(fmt_num));
            scene.set_style(node, "stroke-opacity", opacity.map(fmt_num));
            scene.set_style(node, "fill-opacity", fill_opacity.map(fmt_num));
            map.hover.bind(node, Arc::clone(&hover));
            live.push((i, node));
        }

        for (i, node) in live {
            let (record, [cx, cy]) = placed[i];
            let scene = &mut map.scene;
            scene.set_attr(node, "cx", fmt_num(cx));
            scene.set_attr(node, "cy", fmt_num(cy));
            scene.set_attr(node, "data-info", record.to_string());
            scene.set_datum(node, record.clone());
            scene.set_info(node, record.clone());

            if let Some(r) = val(record, "radius", config.radius.as_ref(), record) {
                scene.transition(node, Property::Attr("r".to_string()), fmt_num(r), 0, GROW_MS);
            }
            let class = match fill_key(record, config) {
                Some(key) => format!("datamaps-bubble {}", key),
                None => "datamaps-bubble".to_string(),
            };
            scene.set_attr(node, "class", class);
        }

        let delay = config.exit_delay.unwrap_or(0);
        for &node in &join.exit {
            map.scene.transition(node, Property::Attr("r".to_string()), "0", delay, SHRINK_MS);
            map.scene.retire(node);
        }

        debug!(
            entered = join.enter.len(),
            updated = join.update.len(),
            exited = join.exit.len(),
            "bubbles reconciled"
        );
        Ok(())
    }
}

fn fill_key(record: &Value, config: &BubblesConfig) -> Option<String> {
    val(record, "fillKey", config.fill_key.as_ref(), record)
}

/// Screen position of a bubble: explicit coordinates, or the centroid of
/// the region named by `centered`
fn bubble_position(map: &Datamap, record: &Value) -> Option<[f64; 2]> {
    if let Some(centered) = record.get("centered").and_then(String::from_datum) {
        if centered == "USA" {
            return map.path.as_ref()?.point(USA_CENTER.0, USA_CENTER.1);
        }
        return map.shape(&centered)?.centroid;
    }
    let lat = record.get("latitude").and_then(f64::from_datum)?;
    let lng = record.get("longitude").and_then(f64::from_datum)?;
    map.lat_lng_to_xy(lat, lng)
}
