//! Operational map: a lat/lon projection onto a 0-100 canvas for the SVG
//! view, and a GeoJSON export for real-map overlays.

use client_core::{read_models::layer_warnings, store::Tone};
use serde_json::{json, Value};
use shared::protocol::{OperationalMap, OperationalPanel};

use crate::{
    components::{pill, pretty_json},
    html::{el, fragment, Element, Markup},
};

pub const PALETTE: [&str; 6] = ["#4fc9dd", "#52d39c", "#f4b740", "#ef6d62", "#9ebdff", "#f5b5df"];
pub const NO_DEPOT: &str = "Sem coordenadas de deposito para montar o mapa.";
pub const NO_ROUTES: &str = "Nenhuma rota com coordenadas disponiveis para hoje.";

const PADDING_RATIO: f64 = 0.14;
const MIN_PADDING: f64 = 0.0002;
const MIN_SPAN: f64 = 0.0001;

pub fn color_for_route(index: usize) -> &'static str {
    PALETTE[index % PALETTE.len()]
}

pub fn tone_for_delivery_status(status: &str) -> Tone {
    match status.to_uppercase().as_str() {
        "ENTREGUE" => Tone::Ok,
        "PENDENTE" => Tone::Warn,
        "CANCELADA" | "FALHOU" => Tone::Danger,
        _ => Tone::Info,
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Point {
    pub lat: f64,
    pub lon: f64,
}

fn point(lat: Option<f64>, lon: Option<f64>) -> Option<Point> {
    match (lat, lon) {
        (Some(lat), Some(lon)) if lat.is_finite() && lon.is_finite() => Some(Point { lat, lon }),
        _ => None,
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bounds {
    pub min_lat: f64,
    pub min_lon: f64,
    pub span_lat: f64,
    pub span_lon: f64,
}

impl Bounds {
    /// Padded box around `points`; `None` when there are none.
    pub fn around(points: &[Point]) -> Option<Self> {
        let first = points.first()?;
        let (mut min_lat, mut max_lat, mut min_lon, mut max_lon) =
            (first.lat, first.lat, first.lon, first.lon);
        for p in points {
            min_lat = min_lat.min(p.lat);
            max_lat = max_lat.max(p.lat);
            min_lon = min_lon.min(p.lon);
            max_lon = max_lon.max(p.lon);
        }
        let lat_pad = ((max_lat - min_lat) * PADDING_RATIO).max(MIN_PADDING);
        let lon_pad = ((max_lon - min_lon) * PADDING_RATIO).max(MIN_PADDING);
        min_lat -= lat_pad;
        max_lat += lat_pad;
        min_lon -= lon_pad;
        max_lon += lon_pad;
        Some(Self {
            min_lat,
            min_lon,
            span_lat: (max_lat - min_lat).max(MIN_SPAN),
            span_lon: (max_lon - min_lon).max(MIN_SPAN),
        })
    }

    /// Percent coordinates, y growing downwards, clamped to [3, 97].
    pub fn project(&self, p: Point) -> (f64, f64) {
        let x = (p.lon - self.min_lon) / self.span_lon * 100.0;
        let y = 100.0 - (p.lat - self.min_lat) / self.span_lat * 100.0;
        (x.clamp(3.0, 97.0), y.clamp(3.0, 97.0))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PlottedStop {
    pub pedido_id: i64,
    pub entrega_id: i64,
    pub ordem_na_rota: i64,
    pub status_entrega: String,
    pub at: Point,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PlottedRoute {
    pub rota_id: i64,
    pub entregador_id: i64,
    pub status_rota: String,
    pub camada: String,
    pub paradas: Vec<PlottedStop>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum MapLayout {
    NoDepot,
    NoRoutes { deposito: Point },
    Ready {
        deposito: Point,
        rotas: Vec<PlottedRoute>,
        bounds: Bounds,
    },
}

/// Keeps stops with usable coordinates, ordered within their route, and
/// drops routes left with none.
pub fn layout(mapa: &OperationalMap) -> MapLayout {
    let Some(deposito) = mapa.deposito.and_then(|d| point(d.lat, d.lon)) else {
        return MapLayout::NoDepot;
    };

    let rotas: Vec<PlottedRoute> = mapa
        .rotas
        .iter()
        .filter_map(|rota| {
            let mut paradas: Vec<PlottedStop> = rota
                .paradas
                .iter()
                .filter_map(|parada| {
                    Some(PlottedStop {
                        pedido_id: parada.pedido_id,
                        entrega_id: parada.entrega_id,
                        ordem_na_rota: parada.ordem_na_rota,
                        status_entrega: parada.status_entrega.clone().unwrap_or_default(),
                        at: point(parada.lat, parada.lon)?,
                    })
                })
                .collect();
            if paradas.is_empty() {
                return None;
            }
            paradas.sort_by_key(|parada| parada.ordem_na_rota);
            Some(PlottedRoute {
                rota_id: rota.rota_id,
                entregador_id: rota.entregador_id,
                status_rota: rota.status_rota.clone().unwrap_or_default(),
                camada: rota.camada.clone().unwrap_or_default(),
                paradas,
            })
        })
        .collect();

    if rotas.is_empty() {
        return MapLayout::NoRoutes { deposito };
    }

    let mut points = vec![deposito];
    points.extend(rotas.iter().flat_map(|rota| rota.paradas.iter().map(|p| p.at)));
    match Bounds::around(&points) {
        Some(bounds) => MapLayout::Ready {
            deposito,
            rotas,
            bounds,
        },
        None => MapLayout::NoRoutes { deposito },
    }
}

fn notice(message: &str) -> Markup {
    el("section").class("notice").child(el("p").text(message)).render()
}

fn marker_style((x, y): (f64, f64)) -> String {
    format!("left:{x:.2}%;top:{y:.2}%;")
}

pub fn render_map(mapa: &OperationalMap) -> Markup {
    let (deposito, rotas, bounds) = match layout(mapa) {
        MapLayout::NoDepot => return notice(NO_DEPOT),
        MapLayout::NoRoutes { .. } => return notice(NO_ROUTES),
        MapLayout::Ready {
            deposito,
            rotas,
            bounds,
        } => (deposito, rotas, bounds),
    };

    let depot_xy = bounds.project(deposito);
    let mut polylines = Vec::new();
    let mut markers = Vec::new();
    let mut legend = Vec::new();

    for (index, rota) in rotas.iter().enumerate() {
        let mut coords = vec![format!("{:.2},{:.2}", depot_xy.0, depot_xy.1)];
        for parada in &rota.paradas {
            let (x, y) = bounds.project(parada.at);
            coords.push(format!("{x:.2},{y:.2}"));
            markers.push(
                el("div")
                    .class(format!(
                        "stop {}",
                        tone_for_delivery_status(&parada.status_entrega).as_str()
                    ))
                    .attr("style", marker_style((x, y)))
                    .attr(
                        "title",
                        format!(
                            "Pedido {} · Entrega {} · {}",
                            parada.pedido_id, parada.entrega_id, parada.status_entrega
                        ),
                    )
                    .text(format!("P{}", parada.ordem_na_rota)),
            );
        }
        polylines.push(
            el("polyline")
                .attr("points", coords.join(" "))
                .attr("fill", "none")
                .attr("stroke", color_for_route(index))
                .attr("stroke-width", "2.8")
                .attr("opacity", "0.92")
                .attr("stroke-linecap", "round")
                .attr("stroke-linejoin", "round"),
        );
        let tone = if rota.status_rota == "EM_ANDAMENTO" { Tone::Info } else { Tone::Warn };
        legend.push(
            el("span")
                .class(format!("pill {} mono", tone.as_str()))
                .text(format!("R{} · E{} · {}", rota.rota_id, rota.entregador_id, rota.camada)),
        );
    }

    let board = el("div")
        .class("map-box")
        .child(el("div").class("map-grid"))
        .child(
            el("svg")
                .class("map-route")
                .attr("viewBox", "0 0 100 100")
                .attr("preserveAspectRatio", "none")
                .attr("aria-label", "rotas operacionais")
                .children(polylines),
        )
        .child(
            el("div")
                .class("stop info dep")
                .attr("style", marker_style(depot_xy))
                .attr("title", "Deposito")
                .text("DEP"),
        )
        .children(markers);

    fragment([board, el("div").class("map-legend").children(legend)])
}

/// Layer summary from the panel, shown under the map.
pub fn layer_summary(painel: &OperationalPanel) -> Element {
    let rotas = serde_json::to_value(&painel.rotas).unwrap_or(Value::Null);
    el("div")
        .class("result-box")
        .attr("style", "margin-top: 0.75rem;")
        .child(el("p").child(el("strong").text("Resumo de camadas (painel)")))
        .child(el("pre").class("mono").text(pretty_json(&rotas)))
}

/// One danger pill per courier holding more than one route in a layer.
pub fn layer_warnings_box(mapa: &OperationalMap) -> Option<Element> {
    let warnings = layer_warnings(mapa);
    if warnings.is_empty() {
        return None;
    }
    Some(
        el("div")
            .class("notice error")
            .child(el("p").child(el("strong").text("Invariante de camadas violada")))
            .children(
                warnings
                    .iter()
                    .map(|warning| el("p").child(pill(&warning.message(), Tone::Danger))),
            ),
    )
}

/// GeoJSON `FeatureCollection`: the depot, every plotted stop and one line
/// per route starting at the depot. Coordinates are `[lon, lat]`.
pub fn geojson(mapa: &OperationalMap) -> Value {
    let (deposito, rotas) = match layout(mapa) {
        MapLayout::NoDepot => return json!({"type": "FeatureCollection", "features": []}),
        MapLayout::NoRoutes { deposito } => (deposito, Vec::new()),
        MapLayout::Ready { deposito, rotas, .. } => (deposito, rotas),
    };

    let mut features = vec![json!({
        "type": "Feature",
        "geometry": {"type": "Point", "coordinates": [deposito.lon, deposito.lat]},
        "properties": {"kind": "deposito"}
    })];

    for (index, rota) in rotas.iter().enumerate() {
        let mut line = vec![json!([deposito.lon, deposito.lat])];
        for parada in &rota.paradas {
            line.push(json!([parada.at.lon, parada.at.lat]));
            features.push(json!({
                "type": "Feature",
                "geometry": {"type": "Point", "coordinates": [parada.at.lon, parada.at.lat]},
                "properties": {
                    "kind": "parada",
                    "rotaId": rota.rota_id,
                    "pedidoId": parada.pedido_id,
                    "entregaId": parada.entrega_id,
                    "ordemNaRota": parada.ordem_na_rota,
                    "statusEntrega": parada.status_entrega,
                    "tone": tone_for_delivery_status(&parada.status_entrega).as_str()
                }
            }));
        }
        features.push(json!({
            "type": "Feature",
            "geometry": {"type": "LineString", "coordinates": line},
            "properties": {
                "kind": "rota",
                "rotaId": rota.rota_id,
                "entregadorId": rota.entregador_id,
                "camada": rota.camada,
                "statusRota": rota.status_rota,
                "color": color_for_route(index)
            }
        }));
    }

    json!({"type": "FeatureCollection", "features": features})
}

#[cfg(test)]
#[path = "tests/map_tests.rs"]
mod tests;
