//! Animated connections between two places.

use crate::datamap::Datamap;
use crate::error::Result;
use crate::hover::HoverConfig;
use crate::join::diff;
use crate::layers::{records, Layer};
use crate::map::geometry::cubic_length;
use crate::options::{val, ArcConfig, FromDatum, KeyFn, Options, Resolve};
use crate::scene::{fmt_num, NodeId, Property};
use serde_json::Value;
use std::sync::Arc;
use tracing::debug;

const DRAW_DELAY_MS: u32 = 100;
const FADE_MS: u32 = 250;

/// Fixed `(lat, lng)` anchors for arc endpoints given as these codes
const ANCHORS: [(&str, f64, f64); 9] = [
    ("CAN", 45.4215296, -75.6971931),
    ("CHL", -33.4691199, -70.641997),
    ("HRV", 45.8150108, 15.9819189),
    ("IDN", -6.211544, 106.845172),
    ("JPN", 35.689487, 139.691706),
    ("MYS", 3.139003, 101.686855),
    ("NOR", 59.9138688, 10.7522454),
    ("USA", 38.895112, -77.036366),
    ("VNM", 21.0277644, 105.8341598),
];

/// A resolved arc endpoint
#[derive(Clone, Copy, Debug, PartialEq)]
enum Endpoint {
    /// A coordinate, kept so geodesic arcs can be walked
    Geo { lon: f64, lat: f64, xy: [f64; 2] },
    /// A region centroid, only known on screen
    Screen([f64; 2]),
}

impl Endpoint {
    fn xy(&self) -> [f64; 2] {
        match *self {
            Endpoint::Geo { xy, .. } | Endpoint::Screen(xy) => xy,
        }
    }

    fn lon_lat(&self) -> Option<(f64, f64)> {
        match *self {
            Endpoint::Geo { lon, lat, .. } => Some((lon, lat)),
            Endpoint::Screen(_) => None,
        }
    }
}

/// Arcs from `origin` to `destination`.
///
/// Endpoints are anchor codes, region ids (resolved to the region's
/// centroid) or `{latitude, longitude}` objects. A record may carry an
/// `options` object whose entries apply to that record only.
pub struct Arcs;

impl Layer for Arcs {
    const NAME: &'static str = "arc";
    type Data = Value;
    type Config = ArcConfig;

    fn defaults(options: &Options) -> ArcConfig {
        options.arc_config.clone().unwrap_or_else(ArcConfig::defaults)
    }

    fn check(data: &Value) -> Result<()> {
        records(data, "arcs").map(|_| ())
    }

    fn draw(map: &mut Datamap, layer: NodeId, data: &Value, config: &ArcConfig) -> Result<()> {
        let records = records(data, "arcs")?;
        let removed = map.scene.sweep(layer);
        map.hover.forget(&removed);

        let mut placed = Vec::with_capacity(records.len());
        let mut keys = Vec::with_capacity(records.len());
        let key_fn = config.key.clone().unwrap_or_else(KeyFn::json);
        for record in records {
            let folded = fold_options(record);
            let ends = folded
                .get("origin")
                .and_then(|o| endpoint(map, o))
                .zip(folded.get("destination").and_then(|d| endpoint(map, d)));
            match ends {
                Some((origin, destination)) => {
                    keys.push(key_fn.key(record, placed.len()));
                    placed.push((folded, origin, destination));
                }
                None => debug!(%record, "arc endpoint unresolved, skipping"),
            }
        }

        let join = diff(&map.scene.keyed_children(layer, "path"), &keys);
        let hover = Arc::new(HoverConfig::from(config));

        for &i in &join.enter {
            let (record, origin, destination) = &placed[i];
            let (d, length) = arc_path(map, record, *origin, *destination, config);
            let stroke = val(record, "strokeColor", config.stroke_color.as_ref(), record);
            let width = val(record, "strokeWidth", config.stroke_width.as_ref(), record);
            let speed = val(record, "animationSpeed", config.animation_speed.as_ref(), record).unwrap_or(600.0);
            let length = fmt_num(length);

            let scene = &mut map.scene;
            let node = scene.append(layer, "path");
            scene.set_key(node, keys[i].clone());
            scene.set_attr(node, "class", "datamaps-arc");
            scene.set_attr(node, "d", d);
            scene.set_style(node, "stroke-linecap", Some("round".to_string()));
            scene.set_style(node, "stroke", stroke);
            scene.set_style(node, "fill", Some("none".to_string()));
            scene.set_style(node, "stroke-width", width.map(fmt_num));
            scene.set_attr(node, "stroke-dasharray", format!("{} {}", length, length));
            scene.set_attr(node, "stroke-dashoffset", length);
            scene.transition(
                node,
                Property::Attr("stroke-dashoffset".to_string()),
                "0",
                DRAW_DELAY_MS,
                speed.max(0.0).round() as u32,
            );
            scene.set_datum(node, record.clone());
            scene.set_info(node, record.clone());
            map.hover.bind(node, Arc::clone(&hover));
        }

        for &(i, node) in &join.update {
            let (record, origin, destination) = &placed[i];
            let (d, length) = arc_path(map, record, *origin, *destination, config);
            let length = fmt_num(length);
            let scene = &mut map.scene;
            scene.set_attr(node, "d", d);
            scene.set_attr(node, "stroke-dasharray", format!("{} {}", length, length));
            scene.set_datum(node, record.clone());
            scene.set_info(node, record.clone());
        }

        for &node in &join.exit {
            map.scene
                .transition(node, Property::Style("opacity".to_string()), "0", 0, FADE_MS);
            map.scene.retire(node);
        }

        debug!(
            entered = join.enter.len(),
            updated = join.update.len(),
            exited = join.exit.len(),
            "arcs reconciled"
        );
        Ok(())
    }
}

/// Merge a record's own `options` object into it; the record's keys win
fn fold_options(record: &Value) -> Value {
    let mut folded = record.clone();
    if let Some(options @ Value::Object(_)) = record.get("options") {
        folded.resolve_from(options);
    }
    folded
}

fn endpoint(map: &Datamap, value: &Value) -> Option<Endpoint> {
    if let Some(code) = value.as_str() {
        if let Some(&(_, lat, lon)) = ANCHORS.iter().find(|(c, _, _)| *c == code) {
            let xy = map.lat_lng_to_xy(lat, lon)?;
            return Some(Endpoint::Geo { lon, lat, xy });
        }
        return map.shape(code)?.centroid.map(Endpoint::Screen);
    }
    let lat = value.get("latitude").and_then(f64::from_datum)?;
    let lon = value.get("longitude").and_then(f64::from_datum)?;
    let xy = map.lat_lng_to_xy(lat, lon)?;
    Some(Endpoint::Geo { lon, lat, xy })
}

/// Path data and on-screen length of one arc
fn arc_path(map: &Datamap, record: &Value, origin: Endpoint, destination: Endpoint, config: &ArcConfig) -> (String, f64) {
    if config.great_arc.unwrap_or(false) {
        match (origin.lon_lat(), destination.lon_lat(), map.path.as_ref()) {
            (Some(from), Some(to), Some(path)) => return path.great_arc(from, to),
            _ => debug!("great arc needs coordinates at both ends, drawing a curve"),
        }
    }

    let sharpness = val(record, "arcSharpness", config.arc_sharpness.as_ref(), record).unwrap_or(1.0);
    let o = origin.xy();
    let d = destination.xy();
    let mid = [(o[0] + d[0]) / 2.0, (o[1] + d[1]) / 2.0];
    let control = [mid[0] + 50.0 * sharpness, mid[1] - 75.0 * sharpness];
    let path = format!(
        "M{},{}S{},{},{},{}",
        fmt_num(o[0]),
        fmt_num(o[1]),
        fmt_num(control[0]),
        fmt_num(control[1]),
        fmt_num(d[0]),
        fmt_num(d[1])
    );
    (path, cubic_length(o, o, control, d))
}
