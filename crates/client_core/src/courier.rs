use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use shared::{
    domain::CourierId,
    events::{build_courier_event_payload, build_route_start_payload, EventForm},
    form::parse_positive,
    paths::PathError,
    protocol::{CourierRoster, EventResult},
};
use tracing::{info, warn};

use crate::{store::ApiConnection, DispatchApi};

pub const NO_ACTIVE_ROUTE: &str = "Rota ativa nao encontrada para iniciar";
pub const AWAITING_ACTION: &str = "Aguardando acao operacional.";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventOutcome {
    pub ok: bool,
    pub payload: Option<Value>,
    pub message: String,
}

impl EventOutcome {
    fn failed(message: impl Into<String>) -> Self {
        Self {
            ok: false,
            payload: None,
            message: message.into(),
        }
    }
}

fn confirmed(result: &EventResult, idempotent: &str, fresh: &str) -> EventOutcome {
    EventOutcome {
        ok: true,
        payload: serde_json::to_value(result).ok(),
        message: if result.idempotente { idempotent } else { fresh }.to_string(),
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CourierState {
    pub entregador_id: CourierId,
    pub roteiro: Option<CourierRoster>,
    pub last_evento: Option<EventOutcome>,
    pub api: ApiConnection,
}

impl CourierState {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            entregador_id: CourierId(1),
            roteiro: None,
            last_evento: None,
            api: ApiConnection::new(base_url),
        }
    }

    /// Switches courier. A non-positive id is reported on the connection and
    /// leaves the current selection alone.
    pub fn select_courier(&mut self, raw: &str) -> Result<CourierId, PathError> {
        match parse_positive(raw).map(CourierId) {
            Some(id) => {
                self.entregador_id = id;
                Ok(id)
            }
            None => {
                self.api.last_error = Some(PathError::InvalidCourierId.to_string());
                Err(PathError::InvalidCourierId)
            }
        }
    }

    pub async fn load_roteiro(&mut self, api: &dyn DispatchApi) {
        match api.roteiro(self.entregador_id).await {
            Ok(roteiro) => {
                self.api.record_success(Utc::now());
                self.roteiro = Some(roteiro);
            }
            Err(err) => {
                warn!(entregador_id = self.entregador_id.0, error = %err, "roteiro unavailable");
                self.api.record_failure(err.to_string(), Utc::now());
                self.roteiro = None;
            }
        }
    }

    pub async fn submit_event(&mut self, api: &dyn DispatchApi, form: &EventForm) -> &EventOutcome {
        let outcome = match build_courier_event_payload(form, self.entregador_id) {
            Err(err) => EventOutcome::failed(err.to_string()),
            Ok(payload) => match api.post_event(&payload).await {
                Ok(result) => {
                    info!(
                        entregador_id = self.entregador_id.0,
                        event_type = %payload.event_type,
                        idempotente = result.idempotente,
                        "courier event posted"
                    );
                    confirmed(
                        &result,
                        "Evento idempotente/ignorado (sem efeito duplicado).",
                        "Evento confirmado com sucesso.",
                    )
                }
                Err(err) => {
                    self.api.record_failure(err.to_string(), Utc::now());
                    EventOutcome::failed(err.to_string())
                }
            },
        };
        self.finish(api, outcome).await
    }

    pub async fn start_route(&mut self, api: &dyn DispatchApi) -> &EventOutcome {
        let Some(rota_id) = self.roteiro.as_ref().and_then(CourierRoster::route_id) else {
            return self.last_evento.insert(EventOutcome::failed(NO_ACTIVE_ROUTE));
        };
        let payload = build_route_start_payload(rota_id, self.entregador_id);
        let outcome = match api.post_event(&payload).await {
            Ok(result) => {
                info!(entregador_id = self.entregador_id.0, rota_id = rota_id.0, "route started");
                confirmed(&result, "ROTA_INICIADA idempotente/ignorado.", "ROTA_INICIADA confirmada.")
            }
            Err(err) => {
                self.api.record_failure(err.to_string(), Utc::now());
                EventOutcome::failed(err.to_string())
            }
        };
        self.finish(api, outcome).await
    }

    async fn finish(&mut self, api: &dyn DispatchApi, outcome: EventOutcome) -> &EventOutcome {
        if outcome.ok {
            self.load_roteiro(api).await;
        }
        self.last_evento.insert(outcome)
    }
}
