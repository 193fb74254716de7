use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::domain::{CourierId, DeliveryId, EventType, RouteId};
use crate::form::{loose_text, non_empty, parse_integer, parse_positive};
use crate::protocol::{EventPayload, ReplanRequest};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EventFormError {
    #[error("eventType invalido")]
    InvalidEventType,
    #[error("entregaId invalido")]
    InvalidDeliveryId,
    #[error("rotaId invalido")]
    InvalidRouteId,
    #[error("{0} invalido")]
    InvalidNumber(&'static str),
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct EventForm {
    #[serde(deserialize_with = "loose_text")]
    pub external_event_id: String,
    #[serde(deserialize_with = "loose_text")]
    pub event_type: String,
    #[serde(deserialize_with = "loose_text")]
    pub rota_id: String,
    #[serde(deserialize_with = "loose_text")]
    pub entrega_id: String,
    #[serde(deserialize_with = "loose_text")]
    pub actor_entregador_id: String,
    #[serde(deserialize_with = "loose_text")]
    pub motivo: String,
    #[serde(deserialize_with = "loose_text")]
    pub cobranca_cancelamento_centavos: String,
}

impl EventForm {
    pub fn set(&mut self, field: &str, value: impl Into<String>) -> bool {
        let slot = match field {
            "externalEventId" => &mut self.external_event_id,
            "eventType" => &mut self.event_type,
            "rotaId" => &mut self.rota_id,
            "entregaId" => &mut self.entrega_id,
            "actorEntregadorId" => &mut self.actor_entregador_id,
            "motivo" => &mut self.motivo,
            "cobrancaCancelamentoCentavos" => &mut self.cobranca_cancelamento_centavos,
            _ => return false,
        };
        *slot = value.into();
        true
    }
}

fn parse_event_type(raw: &str) -> Result<EventType, EventFormError> {
    EventType::from_wire(raw.trim()).ok_or(EventFormError::InvalidEventType)
}

fn cancellation_fee(event_type: EventType, raw: &str) -> Option<i64> {
    if event_type != EventType::PedidoCancelado {
        return None;
    }
    parse_integer(raw).filter(|cents| *cents >= 0)
}

pub fn build_event_payload(form: &EventForm) -> Result<EventPayload, EventFormError> {
    let event_type = parse_event_type(&form.event_type)?;
    let mut payload = EventPayload::new(event_type);
    payload.external_event_id = non_empty(&form.external_event_id);
    if event_type.targets_route() {
        payload.rota_id = parse_positive(&form.rota_id).map(RouteId);
    } else {
        payload.entrega_id = parse_positive(&form.entrega_id).map(DeliveryId);
    }
    payload.actor_entregador_id = parse_positive(&form.actor_entregador_id).map(CourierId);
    payload.motivo = non_empty(&form.motivo);
    payload.cobranca_cancelamento_centavos =
        cancellation_fee(event_type, &form.cobranca_cancelamento_centavos);
    Ok(payload)
}

pub fn build_courier_event_payload(
    form: &EventForm,
    courier: CourierId,
) -> Result<EventPayload, EventFormError> {
    let event_type = parse_event_type(&form.event_type)?;
    if event_type.targets_route() {
        return Err(EventFormError::InvalidEventType);
    }
    let entrega_id = parse_positive(&form.entrega_id)
        .map(DeliveryId)
        .ok_or(EventFormError::InvalidDeliveryId)?;

    let mut payload = EventPayload::new(event_type);
    payload.entrega_id = Some(entrega_id);
    payload.actor_entregador_id = Some(courier);
    payload.external_event_id = non_empty(&form.external_event_id);
    payload.motivo = non_empty(&form.motivo);
    payload.cobranca_cancelamento_centavos =
        cancellation_fee(event_type, &form.cobranca_cancelamento_centavos);
    Ok(payload)
}

pub fn build_route_start_payload(rota_id: RouteId, courier: CourierId) -> EventPayload {
    EventPayload {
        actor_entregador_id: Some(courier),
        ..EventPayload::route_started(rota_id)
    }
}

/// Fills `externalEventId` with a fresh UUID when the operator left it empty,
/// so a retried submission is deduplicated server-side.
pub fn ensure_external_event_id(payload: &mut EventPayload) -> &str {
    payload
        .external_event_id
        .get_or_insert_with(|| Uuid::new_v4().to_string())
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ReplanForm {
    #[serde(deserialize_with = "loose_text")]
    pub debounce_segundos: String,
    #[serde(deserialize_with = "loose_text")]
    pub limite_eventos: String,
}

pub fn build_replan_request(form: &ReplanForm) -> Result<ReplanRequest, EventFormError> {
    let defaults = ReplanRequest::default();
    let debounce_segundos = match form.debounce_segundos.trim() {
        "" => defaults.debounce_segundos,
        raw => parse_integer(raw)
            .filter(|value| *value >= 0)
            .ok_or(EventFormError::InvalidNumber("debounceSegundos"))?,
    };
    let limite_eventos = match form.limite_eventos.trim() {
        "" => defaults.limite_eventos,
        raw => parse_positive(raw).ok_or(EventFormError::InvalidNumber("limiteEventos"))?,
    };
    Ok(ReplanRequest {
        debounce_segundos,
        limite_eventos,
    })
}
