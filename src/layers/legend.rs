//! Static decorations: the fill legend and the graticule.

use crate::datamap::Datamap;
use crate::error::{MapError, Result};
use crate::layers::Layer;
use crate::map::graticule_lines;
use crate::options::{GraticuleConfig, LegendConfig, Options};
use crate::scene::{escape, NodeId};
use std::fmt::Write;
use tracing::debug;

const LEGEND_CLASS: &str = "datamaps-legend";

impl Datamap {
    /// Place a definition list of every fill in the container next to the
    /// SVG. Drawing it again replaces the previous legend. The legend lives
    /// outside the scene, so no layer group is created for it.
    pub fn legend(&mut self, data: Option<LegendConfig>) {
        let html = legend_html(self.options.fills(), &data.unwrap_or_default());
        let overlays = self.container.overlays_mut();
        let marker = format!("<div class=\"{}\">", LEGEND_CLASS);
        match overlays.iter_mut().find(|o| o.starts_with(&marker)) {
            Some(existing) => *existing = html,
            None => overlays.push(html),
        }
        debug!("legend drawn");
    }
}

fn legend_html(fills: &std::collections::BTreeMap<String, String>, data: &LegendConfig) -> String {
    let mut html = format!("<div class=\"{}\">", LEGEND_CLASS);
    if let Some(title) = &data.legend_title {
        let _ = write!(html, "<h2>{}</h2>", escape(title));
    }
    html.push_str("<dl>");
    for (key, color) in fills {
        let label = if key == "defaultFill" {
            match &data.default_fill_name {
                Some(name) => name.clone(),
                None => continue,
            }
        } else {
            data.labels
                .as_ref()
                .and_then(|labels| labels.get(key))
                .cloned()
                .unwrap_or_else(|| format!("{}: ", key))
        };
        let _ = write!(
            html,
            "<dt>{}</dt><dd style=\"background-color:{}\">&nbsp;</dd>",
            escape(&label),
            escape(color)
        );
    }
    html.push_str("</dl></div>");
    html
}

/// Meridians and parallels, drawn beneath the regions
pub struct Graticule;

impl Layer for Graticule {
    const NAME: &'static str = "graticule";
    type Data = ();
    type Config = GraticuleConfig;

    fn defaults(_: &Options) -> GraticuleConfig {
        GraticuleConfig {
            step: Some(10.0),
            precision: Some(2.5),
        }
    }

    fn draw(map: &mut Datamap, layer: NodeId, _: &(), config: &GraticuleConfig) -> Result<()> {
        let path = map.path.as_ref().ok_or(MapError::NotDrawn)?;
        let lines = graticule_lines(config.step.unwrap_or(10.0), config.precision.unwrap_or(2.5));
        let d = path.lines(&lines);

        map.scene.clear_children(layer);
        let node = map.scene.append(layer, "path");
        map.scene.set_attr(node, "class", "datamaps-graticule");
        map.scene.set_attr(node, "d", d);

        let subunits = map.subunits_group();
        map.scene.move_before(layer, subunits);
        debug!(lines = lines.len(), "graticule drawn");
        Ok(())
    }
}
