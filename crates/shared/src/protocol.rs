use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::domain::{
    AttendantId, Channel, CourierId, DeliveryId, EventType, ExecutionLayer, OrderId, PaymentMethod,
    RouteId, WindowType,
};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AtendimentoPayload {
    pub telefone: String,
    pub quantidade_galoes: i64,
    pub atendente_id: AttendantId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub origem_canal: Option<Channel>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metodo_pagamento: Option<PaymentMethod>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub janela_tipo: Option<WindowType>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_event_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub manual_request_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub external_call_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub janela_inicio: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub janela_fim: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nome_cliente: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub endereco: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub latitude: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub longitude: Option<f64>,
}

impl AtendimentoPayload {
    pub fn new(telefone: impl Into<String>, quantidade_galoes: i64, atendente_id: AttendantId) -> Self {
        Self {
            telefone: telefone.into(),
            quantidade_galoes,
            atendente_id,
            origem_canal: None,
            metodo_pagamento: None,
            janela_tipo: None,
            source_event_id: None,
            manual_request_id: None,
            external_call_id: None,
            janela_inicio: None,
            janela_fim: None,
            nome_cliente: None,
            endereco: None,
            latitude: None,
            longitude: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventPayload {
    pub event_type: EventType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub external_event_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rota_id: Option<RouteId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entrega_id: Option<DeliveryId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub actor_entregador_id: Option<CourierId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub motivo: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cobranca_cancelamento_centavos: Option<i64>,
}

impl EventPayload {
    pub fn new(event_type: EventType) -> Self {
        Self {
            event_type,
            external_event_id: None,
            rota_id: None,
            entrega_id: None,
            actor_entregador_id: None,
            motivo: None,
            cobranca_cancelamento_centavos: None,
        }
    }

    pub fn route_started(rota_id: RouteId) -> Self {
        Self {
            rota_id: Some(rota_id),
            ..Self::new(EventType::RotaIniciada)
        }
    }

    pub fn delivered(entrega_id: DeliveryId) -> Self {
        Self {
            entrega_id: Some(entrega_id),
            ..Self::new(EventType::PedidoEntregue)
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ReplanRequest {
    pub debounce_segundos: i64,
    pub limite_eventos: i64,
}

impl Default for ReplanRequest {
    fn default() -> Self {
        Self {
            debounce_segundos: 0,
            limite_eventos: 100,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StartReadyRouteRequest {
    pub entregador_id: CourierId,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct HealthStatus {
    pub status: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AtendimentoResponse {
    pub pedido_id: Option<i64>,
    pub cliente_id: Option<i64>,
    pub telefone_normalizado: Option<String>,
    pub idempotente: bool,
}

impl AtendimentoResponse {
    pub fn order_id(&self) -> Option<OrderId> {
        self.pedido_id.and_then(OrderId::positive)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ExecutionState {
    pub pedido_id: Option<i64>,
    pub rota_primaria_id: Option<i64>,
    pub entrega_ativa_id: Option<i64>,
    pub status_pedido: Option<String>,
    pub camada: Option<String>,
    pub rota_id: Option<i64>,
    pub entrega_id: Option<i64>,
}

impl ExecutionState {
    pub fn route_id(&self) -> Option<RouteId> {
        self.rota_id
            .and_then(RouteId::positive)
            .or_else(|| self.rota_primaria_id.and_then(RouteId::positive))
    }

    pub fn active_delivery_id(&self) -> Option<DeliveryId> {
        self.entrega_ativa_id
            .and_then(DeliveryId::positive)
            .or_else(|| self.entrega_id.and_then(DeliveryId::positive))
    }

    pub fn layer(&self) -> Option<ExecutionLayer> {
        self.camada.as_deref().and_then(ExecutionLayer::from_wire)
    }

    pub fn camada_label(&self) -> &str {
        self.camada.as_deref().filter(|c| !c.is_empty()).unwrap_or("-")
    }

    pub fn is_target_in_execution(&self) -> bool {
        self.layer() == Some(ExecutionLayer::PrimariaEmExecucao) && self.active_delivery_id().is_some()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct EventResult {
    pub evento: Option<String>,
    pub rota_id: Option<i64>,
    pub entrega_id: Option<i64>,
    pub pedido_id: Option<i64>,
    pub idempotente: bool,
}

impl EventResult {
    pub fn order_id(&self) -> Option<OrderId> {
        self.pedido_id.and_then(OrderId::positive)
    }

    pub fn delivery_id(&self) -> Option<DeliveryId> {
        self.entrega_id.and_then(DeliveryId::positive)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ReplanResult {
    pub eventos_processados: Option<i64>,
    pub replanejou: bool,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, Value>,
}

impl ReplanResult {
    pub fn summary(&self) -> String {
        let eventos = self
            .eventos_processados
            .map(|n| n.to_string())
            .unwrap_or_else(|| "-".to_string());
        format!("eventos={eventos} · replanejou={}", self.replanejou)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct StatusCounts {
    pub pendente: i64,
    pub confirmado: i64,
    pub em_rota: i64,
    pub entregue: i64,
    pub cancelado: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RouteInProgress {
    pub rota_id: i64,
    pub entregador_id: i64,
    pub pendentes: i64,
    pub em_execucao: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PlannedRoute {
    pub rota_id: i64,
    pub entregador_id: i64,
    pub pendentes: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RouteSummary {
    pub em_andamento: Vec<RouteInProgress>,
    pub planejadas: Vec<PlannedRoute>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct EligiblePending {
    pub pedido_id: i64,
    pub criado_em: Option<String>,
    pub quantidade_galoes: i64,
    pub janela_tipo: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ConfirmedSecondary {
    pub pedido_id: i64,
    pub rota_id: i64,
    pub ordem_na_rota: i64,
    pub entregador_id: i64,
    pub quantidade_galoes: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct InRoutePrimary {
    pub pedido_id: i64,
    pub rota_id: i64,
    pub entrega_id: i64,
    pub entregador_id: i64,
    pub quantidade_galoes: i64,
    pub status_entrega: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Queues {
    pub pendentes_elegiveis: Vec<EligiblePending>,
    pub confirmados_secundaria: Vec<ConfirmedSecondary>,
    pub em_rota_primaria: Vec<InRoutePrimary>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct OperationalPanel {
    pub atualizado_em: Option<String>,
    pub ambiente: String,
    pub pedidos_por_status: StatusCounts,
    pub rotas: RouteSummary,
    pub filas: Queues,
}

impl Default for OperationalPanel {
    fn default() -> Self {
        Self {
            atualizado_em: None,
            ambiente: "-".to_string(),
            pedidos_por_status: StatusCounts::default(),
            rotas: RouteSummary::default(),
            filas: Queues::default(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct OperationalEvent {
    pub id: i64,
    pub event_type: Option<String>,
    pub status: Option<String>,
    pub aggregate_type: Option<String>,
    pub aggregate_id: Option<i64>,
    pub payload: Value,
    pub created_em: Option<String>,
    pub processed_em: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct EventFeed {
    pub eventos: Vec<OperationalEvent>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Depot {
    pub lat: Option<f64>,
    pub lon: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct MapStop {
    pub pedido_id: i64,
    pub entrega_id: i64,
    pub ordem_na_rota: i64,
    pub status_entrega: Option<String>,
    pub quantidade_galoes: i64,
    pub lat: Option<f64>,
    pub lon: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct MapRoute {
    pub rota_id: i64,
    pub entregador_id: i64,
    pub status_rota: Option<String>,
    pub camada: Option<String>,
    pub paradas: Vec<MapStop>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct OperationalMap {
    pub atualizado_em: Option<String>,
    pub ambiente: String,
    pub deposito: Option<Depot>,
    pub rotas: Vec<MapRoute>,
}

impl Default for OperationalMap {
    fn default() -> Self {
        Self {
            atualizado_em: None,
            ambiente: "-".to_string(),
            deposito: None,
            rotas: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RosterRoute {
    pub rota_id: i64,
    pub status: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RosterStop {
    pub entrega_id: i64,
    pub pedido_id: i64,
    pub ordem_na_rota: i64,
    pub status: Option<String>,
    pub quantidade_galoes: i64,
    pub cliente_nome: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CourierRoster {
    pub entregador_id: i64,
    pub rota: Option<RosterRoute>,
    pub carga_remanescente: i64,
    pub paradas_pendentes_execucao: Vec<RosterStop>,
    pub paradas_concluidas: Vec<RosterStop>,
}

impl CourierRoster {
    pub fn route_id(&self) -> Option<RouteId> {
        self.rota.as_ref().and_then(|rota| RouteId::positive(rota.rota_id))
    }
}
