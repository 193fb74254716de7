use std::{
    collections::VecDeque,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Mutex,
    },
};

use async_trait::async_trait;
use serde_json::{json, Value};
use shared::{
    domain::{CourierId, OrderId},
    error::ApiError,
    protocol::{
        AtendimentoPayload, AtendimentoResponse, CourierRoster, EventFeed, EventPayload,
        EventResult, ExecutionState, HealthStatus, OperationalMap, OperationalPanel, ReplanRequest,
        ReplanResult,
    },
};

use crate::{ApiRequestError, DispatchApi};

pub(crate) type Scripted<T> = Result<T, String>;

pub(crate) fn http_error(status: u16, message: &str) -> ApiRequestError {
    ApiRequestError::Http(ApiError::from_response(status, json!({ "erro": message })))
}

fn take<T>(queue: &Mutex<VecDeque<Scripted<T>>>, what: &str) -> Result<T, ApiRequestError> {
    match queue.lock().expect("script lock").pop_front() {
        Some(Ok(value)) => Ok(value),
        Some(Err(message)) => Err(http_error(500, &message)),
        None => Err(http_error(599, &format!("sem resposta roteirizada para {what}"))),
    }
}

fn repeat<T: Clone>(slot: &Mutex<Option<Scripted<T>>>, what: &str) -> Result<T, ApiRequestError> {
    match slot.lock().expect("script lock").clone() {
        Some(Ok(value)) => Ok(value),
        Some(Err(message)) => Err(http_error(500, &message)),
        None => Err(http_error(599, &format!("sem resposta roteirizada para {what}"))),
    }
}

#[derive(Default)]
pub(crate) struct FakeDispatchApi {
    pub health: Mutex<Option<Scripted<HealthStatus>>>,
    pub atendimentos: Mutex<VecDeque<Scripted<AtendimentoResponse>>>,
    pub executions: Mutex<VecDeque<Scripted<ExecutionState>>>,
    pub timelines: Mutex<VecDeque<Scripted<Value>>>,
    pub event_results: Mutex<VecDeque<Scripted<EventResult>>>,
    pub replans: Mutex<VecDeque<Scripted<ReplanResult>>>,
    pub panel: Mutex<Option<Scripted<OperationalPanel>>>,
    pub feed: Mutex<Option<Scripted<EventFeed>>>,
    pub map: Mutex<Option<Scripted<OperationalMap>>>,
    pub roteiro: Mutex<Option<Scripted<CourierRoster>>>,
    pub ready_route: Mutex<Option<Scripted<Value>>>,

    pub created: Mutex<Vec<(AtendimentoPayload, Option<String>)>>,
    pub posted_events: Mutex<Vec<EventPayload>>,
    pub replan_requests: Mutex<Vec<ReplanRequest>>,
    pub roteiro_requests: Mutex<Vec<CourierId>>,
    pub panel_calls: AtomicUsize,
}

impl FakeDispatchApi {
    pub fn push_execution(&self, value: Value) {
        let state = serde_json::from_value(value).expect("execution fixture");
        self.executions.lock().expect("script lock").push_back(Ok(state));
    }

    pub fn push_event_result(&self, value: Value) {
        let result = serde_json::from_value(value).expect("event fixture");
        self.event_results.lock().expect("script lock").push_back(Ok(result));
    }

    pub fn push_replan(&self, value: Value) {
        let result = serde_json::from_value(value).expect("replan fixture");
        self.replans.lock().expect("script lock").push_back(Ok(result));
    }

    pub fn posted_events(&self) -> Vec<EventPayload> {
        self.posted_events.lock().expect("script lock").clone()
    }
}

#[async_trait]
impl DispatchApi for FakeDispatchApi {
    async fn health(&self) -> Result<HealthStatus, ApiRequestError> {
        repeat(&self.health, "health")
    }

    async fn create_atendimento(
        &self,
        payload: &AtendimentoPayload,
        idempotency_key: Option<&str>,
    ) -> Result<AtendimentoResponse, ApiRequestError> {
        self.created
            .lock()
            .expect("script lock")
            .push((payload.clone(), idempotency_key.map(str::to_string)));
        take(&self.atendimentos, "atendimento")
    }

    async fn execution(&self, _pedido_id: OrderId) -> Result<ExecutionState, ApiRequestError> {
        take(&self.executions, "execucao")
    }

    async fn timeline(&self, _pedido_id: OrderId) -> Result<Value, ApiRequestError> {
        take(&self.timelines, "timeline")
    }

    async fn post_event(&self, payload: &EventPayload) -> Result<EventResult, ApiRequestError> {
        self.posted_events.lock().expect("script lock").push(payload.clone());
        take(&self.event_results, "evento")
    }

    async fn replan(&self, request: &ReplanRequest) -> Result<ReplanResult, ApiRequestError> {
        self.replan_requests.lock().expect("script lock").push(*request);
        take(&self.replans, "replanejamento")
    }

    async fn panel(&self) -> Result<OperationalPanel, ApiRequestError> {
        self.panel_calls.fetch_add(1, Ordering::SeqCst);
        repeat(&self.panel, "painel")
    }

    async fn event_feed(&self, _limite: u32) -> Result<EventFeed, ApiRequestError> {
        repeat(&self.feed, "eventos")
    }

    async fn map(&self) -> Result<OperationalMap, ApiRequestError> {
        repeat(&self.map, "mapa")
    }

    async fn roteiro(&self, entregador_id: CourierId) -> Result<CourierRoster, ApiRequestError> {
        self.roteiro_requests.lock().expect("script lock").push(entregador_id);
        repeat(&self.roteiro, "roteiro")
    }

    async fn start_ready_route(&self, _entregador_id: CourierId) -> Result<Value, ApiRequestError> {
        repeat(&self.ready_route, "rotas prontas")
    }
}
