use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use shared::{
    domain::{OrderId, OrderStatus, RouteLayer},
    protocol::{EventFeed, OperationalMap, OperationalPanel},
    timeline::{OrderRow, TimelineEntry, UNKNOWN_HOUR},
};
use tracing::{info, warn};

use crate::{ApiRequestError, DispatchApi};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReadModelSource {
    Painel,
    Eventos,
    Mapa,
}

impl ReadModelSource {
    pub fn as_str(self) -> &'static str {
        match self {
            ReadModelSource::Painel => "painel",
            ReadModelSource::Eventos => "eventos",
            ReadModelSource::Mapa => "mapa",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReadModelFailure {
    pub source: ReadModelSource,
    pub message: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReadModels {
    pub painel: Option<OperationalPanel>,
    pub eventos: Option<EventFeed>,
    pub mapa: Option<OperationalMap>,
    pub failures: Vec<ReadModelFailure>,
}

impl ReadModels {
    pub fn is_degraded(&self) -> bool {
        !self.failures.is_empty()
    }
}

/// Fetches the three read models concurrently. Succeeds when at least one of
/// them arrives; the others are listed in `failures`.
pub async fn fetch_read_models(
    api: &dyn DispatchApi,
    event_limit: u32,
) -> Result<ReadModels, ApiRequestError> {
    let (painel, eventos, mapa) =
        futures::join!(api.panel(), api.event_feed(event_limit), api.map());

    let mut models = ReadModels::default();
    let mut first_error = None;
    let mut note = |source: ReadModelSource, err: ApiRequestError, models: &mut ReadModels| {
        warn!(source = source.as_str(), error = %err, "read model fetch failed");
        models.failures.push(ReadModelFailure {
            source,
            message: err.to_string(),
        });
        if first_error.is_none() {
            first_error = Some(err);
        }
    };

    match painel {
        Ok(value) => models.painel = Some(value),
        Err(err) => note(ReadModelSource::Painel, err, &mut models),
    }
    match eventos {
        Ok(value) => models.eventos = Some(value),
        Err(err) => note(ReadModelSource::Eventos, err, &mut models),
    }
    match mapa {
        Ok(value) => models.mapa = Some(value),
        Err(err) => note(ReadModelSource::Mapa, err, &mut models),
    }

    if models.failures.len() == 3 {
        if let Some(err) = first_error {
            return Err(err);
        }
    }
    info!(degraded = models.is_degraded(), "read models refreshed");
    Ok(models)
}

fn single_event(hora: String, de: &str, para: String, origem: String) -> Vec<TimelineEntry> {
    vec![TimelineEntry {
        hora,
        de: de.to_string(),
        para,
        origem,
        observacao: String::new(),
    }]
}

pub fn build_order_rows(painel: &OperationalPanel) -> Vec<OrderRow> {
    let mut rows = Vec::new();

    for item in &painel.filas.em_rota_primaria {
        rows.push(OrderRow {
            pedido_id: OrderId(item.pedido_id),
            cliente: "-".to_string(),
            status: OrderStatus::EmRota.as_str().to_string(),
            idempotente: false,
            eventos: single_event(
                UNKNOWN_HOUR.to_string(),
                OrderStatus::Confirmado.as_str(),
                item.status_entrega
                    .clone()
                    .filter(|status| !status.is_empty())
                    .unwrap_or_else(|| "EM_EXECUCAO".to_string()),
                format!("Rota {} / Entregador {}", item.rota_id, item.entregador_id),
            ),
        });
    }

    for item in &painel.filas.confirmados_secundaria {
        rows.push(OrderRow {
            pedido_id: OrderId(item.pedido_id),
            cliente: "-".to_string(),
            status: OrderStatus::Confirmado.as_str().to_string(),
            idempotente: false,
            eventos: single_event(
                UNKNOWN_HOUR.to_string(),
                OrderStatus::Pendente.as_str(),
                OrderStatus::Confirmado.as_str().to_string(),
                format!("Secundaria rota {} / ordem {}", item.rota_id, item.ordem_na_rota),
            ),
        });
    }

    for item in &painel.filas.pendentes_elegiveis {
        let hora = item
            .criado_em
            .as_deref()
            .and_then(|created| created.get(11..16))
            .filter(|hora| !hora.is_empty())
            .unwrap_or(UNKNOWN_HOUR)
            .to_string();
        let janela = item
            .janela_tipo
            .as_deref()
            .filter(|janela| !janela.is_empty())
            .unwrap_or("ASAP");
        rows.push(OrderRow {
            pedido_id: OrderId(item.pedido_id),
            cliente: "-".to_string(),
            status: OrderStatus::Pendente.as_str().to_string(),
            idempotente: false,
            eventos: single_event(
                hora,
                "NOVO",
                OrderStatus::Pendente.as_str().to_string(),
                format!("Fila {janela}"),
            ),
        });
    }

    rows.sort_by_key(|row| row.pedido_id);
    rows
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LayerWarning {
    pub entregador_id: i64,
    pub camada: RouteLayer,
    pub rota_ids: Vec<i64>,
}

impl LayerWarning {
    pub fn message(&self) -> String {
        let rotas = self
            .rota_ids
            .iter()
            .map(|id| format!("R{id}"))
            .collect::<Vec<_>>()
            .join(", ");
        format!(
            "Entregador {} com {} rotas {} ({rotas})",
            self.entregador_id,
            self.rota_ids.len(),
            self.camada
        )
    }
}

pub fn layer_warnings(mapa: &OperationalMap) -> Vec<LayerWarning> {
    let mut by_courier: BTreeMap<(i64, &'static str), (RouteLayer, Vec<i64>)> = BTreeMap::new();
    for rota in &mapa.rotas {
        let Some(camada) = rota.camada.as_deref().and_then(RouteLayer::from_wire) else {
            continue;
        };
        by_courier
            .entry((rota.entregador_id, camada.as_str()))
            .or_insert_with(|| (camada, Vec::new()))
            .1
            .push(rota.rota_id);
    }

    by_courier
        .into_iter()
        .filter(|(_, (_, rotas))| rotas.len() > 1)
        .map(|((entregador_id, _), (camada, mut rota_ids))| {
            rota_ids.sort_unstable();
            LayerWarning {
                entregador_id,
                camada,
                rota_ids,
            }
        })
        .collect()
}

#[cfg(test)]
#[path = "tests/read_models_tests.rs"]
mod tests;
