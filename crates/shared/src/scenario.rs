use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::{DeliveryId, EventType, OrderStatus};
use crate::protocol::EventPayload;

pub const DEFAULT_FAILURE_REASON: &str = "cliente ausente";
pub const DEFAULT_CANCEL_REASON: &str = "cliente cancelou";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ScenarioError {
    #[error("cenario invalido")]
    InvalidScenario,
    #[error("entregaId invalido")]
    InvalidDeliveryId,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Scenario {
    Feliz,
    Falha,
    Cancelamento,
}

impl Scenario {
    pub const ALL: [Scenario; 3] = [Scenario::Feliz, Scenario::Falha, Scenario::Cancelamento];

    pub fn as_str(self) -> &'static str {
        match self {
            Scenario::Feliz => "feliz",
            Scenario::Falha => "falha",
            Scenario::Cancelamento => "cancelamento",
        }
    }

    pub fn terminal_event(self) -> EventType {
        match self {
            Scenario::Feliz => EventType::PedidoEntregue,
            Scenario::Falha => EventType::PedidoFalhou,
            Scenario::Cancelamento => EventType::PedidoCancelado,
        }
    }

    pub fn expected_status(self) -> OrderStatus {
        match self {
            Scenario::Feliz => OrderStatus::Entregue,
            Scenario::Falha | Scenario::Cancelamento => OrderStatus::Cancelado,
        }
    }
}

impl fmt::Display for Scenario {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Scenario {
    type Err = ScenarioError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.trim().to_lowercase().as_str() {
            "feliz" => Ok(Scenario::Feliz),
            "falha" => Ok(Scenario::Falha),
            "cancelamento" => Ok(Scenario::Cancelamento),
            _ => Err(ScenarioError::InvalidScenario),
        }
    }
}

pub fn expected_status_for_scenario(raw: &str) -> Result<OrderStatus, ScenarioError> {
    raw.parse::<Scenario>().map(Scenario::expected_status)
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TerminalOptions {
    pub motivo_falha: String,
    pub motivo_cancelamento: String,
    pub cobranca_cancelamento_centavos: Option<i64>,
}

fn reason_or(raw: &str, default: &str) -> String {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        default.to_string()
    } else {
        trimmed.to_string()
    }
}

pub fn build_terminal_event_payload(
    scenario: Scenario,
    entrega_id: i64,
    options: &TerminalOptions,
) -> Result<EventPayload, ScenarioError> {
    let entrega_id = DeliveryId::positive(entrega_id).ok_or(ScenarioError::InvalidDeliveryId)?;
    let mut payload = EventPayload::new(scenario.terminal_event());
    payload.entrega_id = Some(entrega_id);
    match scenario {
        Scenario::Feliz => {}
        Scenario::Falha => {
            payload.motivo = Some(reason_or(&options.motivo_falha, DEFAULT_FAILURE_REASON));
        }
        Scenario::Cancelamento => {
            payload.motivo = Some(reason_or(&options.motivo_cancelamento, DEFAULT_CANCEL_REASON));
            payload.cobranca_cancelamento_centavos =
                options.cobranca_cancelamento_centavos.filter(|cents| *cents >= 0);
        }
    }
    Ok(payload)
}
