use std::fmt;

use chrono::{DateTime, Local, NaiveDate, NaiveDateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::domain::OrderId;

const ORDER_ID_KEYS: &[&str] = &["pedidoId", "pedido_id"];
const STATUS_KEYS: &[&str] = &["statusAtual", "status_atual", "status"];
const TIMESTAMP_KEYS: &[&str] = &["timestamp", "data"];
const FROM_KEYS: &[&str] = &["deStatus", "de_status", "de"];
const TO_KEYS: &[&str] = &["paraStatus", "para_status", "para"];

pub const UNKNOWN_HOUR: &str = "--:--";
pub const DEFAULT_ORIGIN: &str = "Sistema";

const NAIVE_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
];

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TimelineError {
    #[error("pedidoId invalido")]
    InvalidOrderId,
    #[error("pedidoId divergente")]
    DivergentOrderId,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimelineEntry {
    pub hora: String,
    pub de: String,
    pub para: String,
    pub origem: String,
    #[serde(default)]
    pub observacao: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Timeline {
    pub pedido_id: OrderId,
    pub status: String,
    pub eventos: Vec<TimelineEntry>,
}

impl Timeline {
    pub fn status_label(&self) -> String {
        let status = self.status.trim().to_uppercase();
        if status.is_empty() {
            "INDEFINIDO".to_string()
        } else {
            status
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderRow {
    pub pedido_id: OrderId,
    pub cliente: String,
    pub status: String,
    pub idempotente: bool,
    pub eventos: Vec<TimelineEntry>,
}

/// First alias holding a truthy value: null, `""`, `false` and `0` fall
/// through to the next key.
fn first_present<'a>(payload: &'a Value, keys: &[&str]) -> Option<&'a Value> {
    keys.iter()
        .filter_map(|key| payload.get(*key))
        .find(|value| !is_blank(value))
}

fn is_blank(value: &Value) -> bool {
    match value {
        Value::Null | Value::Bool(false) => true,
        Value::String(text) => text.is_empty(),
        Value::Number(number) => number.as_f64() == Some(0.0),
        _ => false,
    }
}

fn text_of(value: Option<&Value>) -> String {
    match value {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(text)) => text.trim().to_string(),
        Some(other) => other.to_string(),
    }
}

pub fn require_order_id(value: Option<&Value>) -> Result<OrderId, TimelineError> {
    let parsed = match value {
        Some(Value::Number(number)) => number
            .as_i64()
            .or_else(|| number.as_f64().filter(|f| f.fract() == 0.0).map(|f| f as i64)),
        Some(Value::String(text)) => crate::form::parse_integer(text),
        _ => None,
    };
    parsed.and_then(OrderId::positive).ok_or(TimelineError::InvalidOrderId)
}

fn parse_instant<Tz: TimeZone>(value: Option<&Value>, tz: &Tz) -> Option<DateTime<Tz>> {
    let raw = match value? {
        Value::String(text) => text.trim(),
        Value::Number(number) => {
            return number
                .as_i64()
                .or_else(|| number.as_f64().filter(|f| f.is_finite()).map(|f| f.trunc() as i64))
                .and_then(|millis| Utc.timestamp_millis_opt(millis).single())
                .map(|instant| instant.with_timezone(tz));
        }
        _ => return None,
    };
    if raw.is_empty() {
        return None;
    }
    if let Ok(instant) = DateTime::parse_from_rfc3339(raw) {
        return Some(instant.with_timezone(tz));
    }
    // Backend LocalDateTime values carry no offset: read them as local time.
    if let Some(naive) = NAIVE_FORMATS
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(raw, format).ok())
    {
        return tz.from_local_datetime(&naive).earliest();
    }
    let date = NaiveDate::parse_from_str(raw, "%Y-%m-%d").ok()?;
    let midnight = date.and_hms_opt(0, 0, 0)?;
    Some(Utc.from_utc_datetime(&midnight).with_timezone(tz))
}

pub fn normalize_timeline(payload: &Value) -> Result<Timeline, TimelineError> {
    normalize_timeline_in(payload, &Local)
}

pub fn normalize_timeline_in<Tz>(payload: &Value, tz: &Tz) -> Result<Timeline, TimelineError>
where
    Tz: TimeZone,
    Tz::Offset: fmt::Display,
{
    let pedido_id = require_order_id(first_present(payload, ORDER_ID_KEYS))?;
    let status = text_of(first_present(payload, STATUS_KEYS));

    let raw_events = payload
        .get("eventos")
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or_default();

    let mut keyed: Vec<(Option<i64>, TimelineEntry)> = raw_events
        .iter()
        .map(|event| {
            let instant = parse_instant(first_present(event, TIMESTAMP_KEYS), tz);
            let hora = instant
                .as_ref()
                .map(|at| at.format("%H:%M").to_string())
                .unwrap_or_else(|| UNKNOWN_HOUR.to_string());
            let origem = text_of(event.get("origem"));
            let entry = TimelineEntry {
                hora,
                de: text_of(first_present(event, FROM_KEYS)),
                para: text_of(first_present(event, TO_KEYS)),
                origem: if origem.is_empty() {
                    DEFAULT_ORIGIN.to_string()
                } else {
                    origem
                },
                observacao: text_of(event.get("observacao")),
            };
            (instant.map(|at| at.timestamp_millis()), entry)
        })
        .collect();

    // Stable: ties keep input order, missing timestamps go last.
    keyed.sort_by_key(|(millis, _)| (millis.is_none(), *millis));

    Ok(Timeline {
        pedido_id,
        status,
        eventos: keyed.into_iter().map(|(_, entry)| entry).collect(),
    })
}

/// Applies a fresh timeline to a cached row. An empty timeline status keeps
/// the row's status.
pub fn merge_timeline_into_row(row: &OrderRow, timeline: &Timeline) -> Result<OrderRow, TimelineError> {
    if row.pedido_id != timeline.pedido_id {
        return Err(TimelineError::DivergentOrderId);
    }
    let status = if timeline.status.is_empty() {
        row.status.clone()
    } else {
        timeline.status.clone()
    };
    Ok(OrderRow {
        status,
        eventos: timeline.eventos.clone(),
        ..row.clone()
    })
}

pub fn fallback_timeline_payload(pedido_id: OrderId) -> Value {
    serde_json::json!({
        "pedidoId": pedido_id.0,
        "statusAtual": "PENDENTE",
        "eventos": [{
            "timestamp": null,
            "deStatus": "NOVO",
            "paraStatus": "PENDENTE",
            "origem": "Offline",
            "observacao": "timeline indisponivel; exibindo estado local"
        }]
    })
}

#[cfg(test)]
#[path = "tests/timeline_tests.rs"]
mod tests;
