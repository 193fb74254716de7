use std::{collections::BTreeMap, fs, path::Path, time::Duration};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use shared::{
    events::{EventForm, ReplanForm},
    intake::AtendimentoForm,
    protocol::{
        AtendimentoPayload, AtendimentoResponse, EventFeed, OperationalEvent, OperationalMap,
        OperationalPanel,
    },
    timeline::{merge_timeline_into_row, OrderRow},
};
use thiserror::Error;
use tracing::{debug, info};

use crate::{
    orchestrator::{GuidedRun, GuidedRunForm},
    read_models::{build_order_rows, ReadModelFailure, ReadModels},
    session::{HandoffEntry, HandoffQueue, PhoneTrail},
    settings::DEFAULT_API_BASE,
    TimelineFetch,
};

pub const RESULT_SOURCE: &str = "api real";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum View {
    #[default]
    Pedidos,
    Despacho,
    Entregador,
}

impl View {
    pub fn as_str(self) -> &'static str {
        match self {
            View::Pedidos => "pedidos",
            View::Despacho => "despacho",
            View::Entregador => "entregador",
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    #[default]
    Success,
    Empty,
    Error,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tone {
    Ok,
    Warn,
    Danger,
    Info,
}

impl Tone {
    pub fn as_str(self) -> &'static str {
        match self {
            Tone::Ok => "ok",
            Tone::Warn => "warn",
            Tone::Danger => "danger",
            Tone::Info => "info",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiStatus {
    pub label: String,
    pub tone: Tone,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiConnection {
    pub base_url: String,
    pub connected: bool,
    pub last_error: Option<String>,
    pub last_sync_at: Option<DateTime<Utc>>,
}

impl ApiConnection {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            connected: false,
            last_error: None,
            last_sync_at: None,
        }
    }

    pub fn record_success(&mut self, at: DateTime<Utc>) {
        self.connected = true;
        self.last_error = None;
        self.last_sync_at = Some(at);
    }

    pub fn record_failure(&mut self, message: impl Into<String>, at: DateTime<Utc>) {
        self.connected = false;
        self.last_error = Some(message.into());
        self.last_sync_at = Some(at);
    }

    pub fn status(&self, refresh: Duration) -> ApiStatus {
        if self.connected {
            ApiStatus {
                label: format!("API: conectada · auto {}s", refresh.as_secs()),
                tone: Tone::Ok,
            }
        } else if self.last_error.is_some() {
            ApiStatus {
                label: "API: offline".to_string(),
                tone: Tone::Danger,
            }
        } else {
            ApiStatus {
                label: "API: pendente".to_string(),
                tone: Tone::Warn,
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultBox {
    pub source: String,
    pub ok: bool,
    pub payload: Value,
}

impl ResultBox {
    pub fn success(payload: Value) -> Self {
        Self {
            source: RESULT_SOURCE.to_string(),
            ok: true,
            payload,
        }
    }

    pub fn failure(message: &str) -> Self {
        Self {
            source: RESULT_SOURCE.to_string(),
            ok: false,
            payload: json!({ "erro": message }),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ResultSlot {
    Atendimento,
    Timeline,
    Evento,
    Replanejamento,
    IniciarRotaPronta,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ApiResults {
    pub atendimento: Option<ResultBox>,
    pub timeline: Option<ResultBox>,
    pub evento: Option<ResultBox>,
    pub replanejamento: Option<ResultBox>,
    pub iniciar_rota_pronta: Option<ResultBox>,
}

impl ApiResults {
    pub fn slot_mut(&mut self, slot: ResultSlot) -> &mut Option<ResultBox> {
        match slot {
            ResultSlot::Atendimento => &mut self.atendimento,
            ResultSlot::Timeline => &mut self.timeline,
            ResultSlot::Evento => &mut self.evento,
            ResultSlot::Replanejamento => &mut self.replanejamento,
            ResultSlot::IniciarRotaPronta => &mut self.iniciar_rota_pronta,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TimelineRequest {
    #[serde(deserialize_with = "shared::form::loose_text")]
    pub pedido_id: String,
}

impl Default for TimelineRequest {
    fn default() -> Self {
        Self {
            pedido_id: "1".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Examples {
    pub atendimento_request: AtendimentoForm,
    pub evento_request: EventForm,
    pub timeline_request: TimelineRequest,
    pub replanejamento_request: ReplanForm,
}

impl Default for Examples {
    fn default() -> Self {
        let call_id = "call-20260213-0001";
        Self {
            atendimento_request: AtendimentoForm {
                external_call_id: call_id.to_string(),
                manual_request_id: call_id.to_string(),
                origem_canal: "MANUAL".to_string(),
                telefone: "(38) 99876-1234".to_string(),
                quantidade_galoes: "2".to_string(),
                atendente_id: "1".to_string(),
                metodo_pagamento: "PIX".to_string(),
                janela_tipo: "ASAP".to_string(),
                ..AtendimentoForm::default()
            },
            evento_request: EventForm {
                event_type: "PEDIDO_ENTREGUE".to_string(),
                ..EventForm::default()
            },
            timeline_request: TimelineRequest::default(),
            replanejamento_request: ReplanForm {
                debounce_segundos: "0".to_string(),
                limite_eventos: "100".to_string(),
            },
        }
    }
}

#[derive(Debug, Error)]
pub enum ExamplesError {
    #[error("falha ao ler exemplos {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },
    #[error("exemplos invalidos em {path}: {source}")]
    Json {
        path: String,
        source: serde_json::Error,
    },
}

fn merge_json(base: &mut Value, overlay: Value) {
    match (base, overlay) {
        (Value::Object(base), Value::Object(overlay)) => {
            for (key, value) in overlay {
                merge_json(base.entry(key).or_insert(Value::Null), value);
            }
        }
        (slot, value) => *slot = value,
    }
}

impl Examples {
    /// Applies a partial JSON document on top of the defaults; fields it
    /// does not mention keep their default value.
    pub fn with_overrides(overrides: Value) -> Result<Self, serde_json::Error> {
        let mut merged = serde_json::to_value(Self::default())?;
        merge_json(&mut merged, overrides);
        serde_json::from_value(merged)
    }

    pub fn load(path: &Path) -> Result<Self, ExamplesError> {
        let path_display = path.display().to_string();
        let raw = fs::read_to_string(path).map_err(|source| ExamplesError::Io {
            path: path_display.clone(),
            source,
        })?;
        let overrides: Value = serde_json::from_str(&raw).map_err(|source| ExamplesError::Json {
            path: path_display.clone(),
            source,
        })?;
        let examples = Self::with_overrides(overrides).map_err(|source| ExamplesError::Json {
            path: path_display.clone(),
            source,
        })?;
        info!(path = %path_display, "form examples loaded");
        Ok(examples)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct E2eState {
    pub form: GuidedRunForm,
    pub running: bool,
    pub last_run: Option<GuidedRun>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppState {
    pub view: View,
    pub mode: Mode,
    pub error_detail: Option<String>,
    pub api: ApiConnection,
    pub painel: Option<OperationalPanel>,
    pub eventos_operacionais: Vec<OperationalEvent>,
    pub mapa_operacional: Option<OperationalMap>,
    pub degraded: Vec<ReadModelFailure>,
    pub pedidos: Vec<OrderRow>,
    pub api_results: ApiResults,
    pub handoff: HandoffQueue,
    pub atendente: PhoneTrail,
    pub examples: Examples,
    pub e2e: E2eState,
}

impl AppState {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            view: View::default(),
            mode: Mode::default(),
            error_detail: None,
            api: ApiConnection::new(base_url),
            painel: None,
            eventos_operacionais: Vec::new(),
            mapa_operacional: None,
            degraded: Vec::new(),
            pedidos: Vec::new(),
            api_results: ApiResults::default(),
            handoff: HandoffQueue::default(),
            atendente: PhoneTrail::default(),
            examples: Examples::default(),
            e2e: E2eState::default(),
        }
    }
}

impl Default for AppState {
    fn default() -> Self {
        Self::new(DEFAULT_API_BASE)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandoffAction {
    MoveUp(shared::domain::OrderId),
    MoveDown(shared::domain::OrderId),
    Focus(shared::domain::OrderId),
    Remove(shared::domain::OrderId),
    RememberCourier(shared::domain::CourierId),
}

#[derive(Debug, Clone)]
pub enum Action {
    SetView(View),
    SetMode(Mode),
    Retry,
    SetBaseUrl(String),
    HealthChecked { at: DateTime<Utc> },
    ApiFailed { message: String, at: DateTime<Utc> },
    ReadModelsLoaded { models: ReadModels, at: DateTime<Utc> },
    AtendimentoCreated {
        payload: AtendimentoPayload,
        response: AtendimentoResponse,
        at: DateTime<Utc>,
    },
    TimelineLoaded(TimelineFetch),
    ResultReceived { slot: ResultSlot, payload: Value },
    RequestFailed { slot: ResultSlot, message: String },
    PhoneSearched { raw: String, at: DateTime<Utc> },
    Handoff(HandoffAction),
    ExamplesLoaded(Examples),
    E2eStarted(GuidedRunForm),
    E2eFinished(GuidedRun),
}

fn apply_feed(state: &mut AppState, feed: EventFeed) {
    state.eventos_operacionais = feed.eventos;
}

pub fn reduce(state: &mut AppState, action: Action) {
    match action {
        Action::SetView(view) => state.view = view,
        Action::SetMode(mode) => {
            state.mode = mode;
            if mode != Mode::Error {
                state.error_detail = None;
            }
        }
        Action::Retry => {
            state.mode = Mode::Success;
            state.error_detail = None;
        }
        Action::SetBaseUrl(raw) => {
            let sanitized = crate::sanitize_base_url(&raw);
            if !sanitized.is_empty() {
                state.api = ApiConnection::new(sanitized);
            }
        }
        Action::HealthChecked { at } => state.api.record_success(at),
        Action::ApiFailed { message, at } => {
            if state.painel.is_none() && state.mode == Mode::Success {
                state.mode = Mode::Error;
                state.error_detail = Some(message.clone());
            }
            state.api.record_failure(message, at);
        }
        Action::ReadModelsLoaded { models, at } => {
            let ReadModels {
                painel,
                eventos,
                mapa,
                failures,
            } = models;
            if let Some(painel) = painel {
                let mut rows = build_order_rows(&painel);
                for row in &mut rows {
                    if let Some(cached) = state.pedidos.iter().find(|old| old.pedido_id == row.pedido_id) {
                        if cached.eventos.len() > row.eventos.len() {
                            row.eventos = cached.eventos.clone();
                        }
                    }
                }
                state.pedidos = rows;
                state.painel = Some(painel);
            }
            if let Some(feed) = eventos {
                apply_feed(state, feed);
            }
            if let Some(mapa) = mapa {
                state.mapa_operacional = Some(mapa);
            }
            debug!(degraded = failures.len(), "read models applied");
            state.degraded = failures;
            state.api.record_success(at);
            if state.mode == Mode::Error {
                state.mode = Mode::Success;
                state.error_detail = None;
            }
        }
        Action::AtendimentoCreated {
            payload,
            response,
            at,
        } => {
            state.api_results.atendimento =
                Some(ResultBox::success(serde_json::to_value(&response).unwrap_or(Value::Null)));
            if let Some(entry) = HandoffEntry::from_response(&payload, &response, at) {
                state.examples.timeline_request.pedido_id = entry.pedido_id.to_string();
                state.handoff.record(entry);
            }
        }
        Action::TimelineLoaded(fetch) => {
            let timeline = fetch.timeline;
            state.examples.timeline_request.pedido_id = timeline.pedido_id.to_string();
            if !fetch.fallback {
                for row in state.pedidos.iter_mut().filter(|row| row.pedido_id == timeline.pedido_id) {
                    if let Ok(merged) = merge_timeline_into_row(row, &timeline) {
                        *row = merged;
                    }
                }
            }
            let mut payload = serde_json::to_value(&timeline).unwrap_or(Value::Null);
            if let (Some(error), Value::Object(map)) = (fetch.error, &mut payload) {
                map.insert("erro".to_string(), Value::String(error));
            }
            state.api_results.timeline = Some(ResultBox {
                source: RESULT_SOURCE.to_string(),
                ok: !fetch.fallback,
                payload,
            });
        }
        Action::ResultReceived { slot, payload } => {
            *state.api_results.slot_mut(slot) = Some(ResultBox::success(payload));
        }
        Action::RequestFailed { slot, message } => {
            *state.api_results.slot_mut(slot) = Some(ResultBox::failure(&message));
        }
        Action::PhoneSearched { raw, at } => {
            state.atendente.search(&raw, at);
        }
        Action::Handoff(action) => {
            let handoff = &mut state.handoff;
            match action {
                HandoffAction::MoveUp(id) => {
                    handoff.move_up(id);
                }
                HandoffAction::MoveDown(id) => {
                    handoff.move_down(id);
                }
                HandoffAction::Focus(id) => {
                    if handoff.focus(id) {
                        state.examples.timeline_request.pedido_id = id.to_string();
                    }
                }
                HandoffAction::Remove(id) => {
                    handoff.remove(id);
                }
                HandoffAction::RememberCourier(id) => handoff.remember_courier(id),
            }
        }
        Action::ExamplesLoaded(examples) => state.examples = examples,
        Action::E2eStarted(form) => {
            state.e2e.form = form;
            state.e2e.running = true;
        }
        Action::E2eFinished(run) => {
            state.e2e.running = false;
            record_run_results(&mut state.api_results, &run);
            state.e2e.last_run = Some(run);
        }
    }
}

fn record_run_results(results: &mut ApiResults, run: &GuidedRun) {
    use crate::orchestrator::{
        STEP_ATENDIMENTO, STEP_EVENTO_TERMINAL, STEP_LIBERAR_FILA, STEP_REPLAN_FINAL,
        STEP_REPLAN_INICIAL, STEP_ROTA_INICIADA, STEP_TIMELINE_FINAL,
    };

    let slots: BTreeMap<&str, ResultSlot> = [
        (STEP_ATENDIMENTO, ResultSlot::Atendimento),
        (STEP_REPLAN_INICIAL, ResultSlot::Replanejamento),
        (STEP_ROTA_INICIADA, ResultSlot::Evento),
        (STEP_LIBERAR_FILA, ResultSlot::Evento),
        (STEP_EVENTO_TERMINAL, ResultSlot::Evento),
        (STEP_REPLAN_FINAL, ResultSlot::Replanejamento),
        (STEP_TIMELINE_FINAL, ResultSlot::Timeline),
    ]
    .into_iter()
    .collect();

    for step in &run.steps {
        if let (Some(slot), Some(payload)) = (slots.get(step.title.as_str()), &step.payload) {
            *results.slot_mut(*slot) = Some(ResultBox::success(payload.clone()));
        }
    }
}

#[cfg(test)]
#[path = "tests/store_tests.rs"]
mod tests;
