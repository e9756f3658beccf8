//! Text labels at region centroids.

use crate::datamap::Datamap;
use crate::error::{MapError, Result};
use crate::layers::bubbles::USA_CENTER;
use crate::layers::Layer;
use crate::options::{LabelsConfig, Options};
use crate::scene::{fmt_num, NodeId};
use tracing::debug;

/// Regions too small to carry their own label, stacked in this order
const LADDER: [&str; 9] = ["VT", "NH", "MA", "RI", "CT", "NJ", "DE", "MD", "DC"];

/// Top of the small-region ladder, `(lon, lat)`
const LADDER_START: (f64, f64) = (-67.707617, 42.722131);

/// Distance the label is moved left of and below the centroid
fn offsets(id: &str) -> (f64, f64) {
    let x = match id {
        "FL" | "KY" | "MI" => -2.5,
        "NY" => -1.0,
        "LA" => 13.0,
        _ => 7.5,
    };
    let y = if id == "MI" { 18.0 } else { 5.0 };
    (x, y)
}

/// One label per region, redrawn from scratch on every call
pub struct Labels;

impl Layer for Labels {
    const NAME: &'static str = "labels";
    type Data = ();
    type Config = LabelsConfig;

    fn defaults(options: &Options) -> LabelsConfig {
        options.labels_config.clone().unwrap_or_else(LabelsConfig::defaults)
    }

    fn draw(map: &mut Datamap, layer: NodeId, _: &(), config: &LabelsConfig) -> Result<()> {
        let path = map.path.clone().ok_or(MapError::NotDrawn)?;
        let removed = map.scene.clear_children(layer);
        map.hover.forget(&removed);

        let font_size = config.font_size.unwrap_or(10.0);
        let color = config.label_color.clone().unwrap_or_else(|| "#000".to_string());
        let line_width = config.line_width.unwrap_or(1.0);
        let font_family = config.font_family.clone().unwrap_or_else(|| "Verdana".to_string());
        let ladder_start = path.point(LADDER_START.0, LADDER_START.1);

        let anchors: Vec<(String, [f64; 2])> = map
            .features
            .iter()
            .filter_map(|f| {
                let center = if f.id == "USA" {
                    path.point(USA_CENTER.0, USA_CENTER.1)
                } else {
                    map.shapes.get(&f.id)?.centroid
                };
                Some((f.id.clone(), center?))
            })
            .collect();

        for (id, center) in &anchors {
            let (dx, dy) = offsets(id);
            let mut x = center[0] - dx;
            let mut y = center[1] + dy;

            let rung = LADDER.iter().position(|r| r == id);
            if let (Some(rung), Some(start)) = (rung, ladder_start) {
                x = start[0];
                y = start[1] + rung as f64 * (2.0 + font_size);

                let line = map.scene.append(layer, "line");
                map.scene.set_attr(line, "x1", fmt_num(x - 3.0));
                map.scene.set_attr(line, "y1", fmt_num(y - 5.0));
                map.scene.set_attr(line, "x2", fmt_num(center[0]));
                map.scene.set_attr(line, "y2", fmt_num(center[1]));
                map.scene.set_style(line, "stroke", Some(color.clone()));
                map.scene.set_style(line, "stroke-width", Some(fmt_num(line_width)));
            }

            let text = config
                .custom_label_text
                .as_ref()
                .and_then(|custom| custom.get(id))
                .cloned()
                .unwrap_or_else(|| id.clone());

            let node = map.scene.append(layer, "text");
            map.scene.set_attr(node, "x", fmt_num(x));
            map.scene.set_attr(node, "y", fmt_num(y));
            map.scene.set_style(node, "font-size", Some(format!("{}px", fmt_num(font_size))));
            map.scene.set_style(node, "font-family", Some(font_family.clone()));
            map.scene.set_style(node, "fill", Some(color.clone()));
            map.scene.set_text(node, text);
        }

        debug!(labels = anchors.len(), "labels drawn");
        Ok(())
    }
}
