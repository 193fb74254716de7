//! Waiting for the target delivery assumes the route serves its queue in
//! order and that completing whatever delivery started first eventually
//! reaches ours. Nothing in the API guarantees that, so the wait is bounded
//! by [`MAX_ROUTE_ATTEMPTS`] and may give up on a busy route.

use anyhow::{anyhow, bail, Result};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use shared::{
    domain::{DeliveryId, OrderId, OrderStatus, PaymentMethod, RouteId},
    intake::{build_atendimento_payload, AtendimentoForm},
    protocol::{EventPayload, ReplanRequest},
    scenario::{build_terminal_event_payload, Scenario, TerminalOptions, DEFAULT_CANCEL_REASON, DEFAULT_FAILURE_REASON},
    timeline::Timeline,
};
use tokio::sync::mpsc::UnboundedSender;
use tracing::{info, warn};

use crate::{fetch_timeline, DispatchApi};

pub const MAX_ROUTE_ATTEMPTS: usize = 12;

pub const STEP_ATENDIMENTO: &str = "Atendimento";
pub const STEP_REPLAN_INICIAL: &str = "Replanejamento inicial";
pub const STEP_RESOLVER_EXECUCAO: &str = "Resolver execucao do pedido";
pub const STEP_ROTA_INICIADA: &str = "Rota iniciada";
pub const STEP_LIBERAR_FILA: &str = "Liberar fila da rota";
pub const STEP_ENTREGA_ATIVA: &str = "Resolver entrega ativa";
pub const STEP_EVENTO_TERMINAL: &str = "Evento terminal";
pub const STEP_REPLAN_FINAL: &str = "Replanejamento final";
pub const STEP_TIMELINE_FINAL: &str = "Timeline final";
pub const STEP_FALHA: &str = "Falha de execucao";

pub const TIMELINE_MISMATCH: &str = "Timeline final diferente do esperado para o cenario.";
pub const ATTEMPTS_EXHAUSTED: &str =
    "Pedido alvo nao entrou em execucao na rota dentro do limite de tentativas.";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct GuidedRunForm {
    pub scenario: Scenario,
    pub telefone: String,
    pub quantidade_galoes: i64,
    pub atendente_id: i64,
    pub metodo_pagamento: PaymentMethod,
    #[serde(flatten)]
    pub replan: ReplanRequest,
    pub motivo_falha: String,
    pub motivo_cancelamento: String,
    pub cobranca_cancelamento_centavos: Option<i64>,
}

impl Default for GuidedRunForm {
    fn default() -> Self {
        Self {
            scenario: Scenario::Feliz,
            telefone: "(38) 99876-9901".to_string(),
            quantidade_galoes: 1,
            atendente_id: 1,
            metodo_pagamento: PaymentMethod::Pix,
            replan: ReplanRequest::default(),
            motivo_falha: DEFAULT_FAILURE_REASON.to_string(),
            motivo_cancelamento: DEFAULT_CANCEL_REASON.to_string(),
            cobranca_cancelamento_centavos: Some(2500),
        }
    }
}

impl GuidedRunForm {
    fn terminal_options(&self) -> TerminalOptions {
        TerminalOptions {
            motivo_falha: self.motivo_falha.clone(),
            motivo_cancelamento: self.motivo_cancelamento.clone(),
            cobranca_cancelamento_centavos: self.cobranca_cancelamento_centavos,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunState {
    Executando,
    Sucesso,
    Erro,
}

impl RunState {
    pub fn as_str(self) -> &'static str {
        match self {
            RunState::Executando => "executando",
            RunState::Sucesso => "sucesso",
            RunState::Erro => "erro",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunStep {
    pub title: String,
    pub ok: bool,
    pub detail: String,
    pub payload: Option<Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GuidedRun {
    pub state: RunState,
    pub scenario: Scenario,
    pub pedido_id: Option<OrderId>,
    pub rota_id: Option<RouteId>,
    pub entrega_id: Option<DeliveryId>,
    pub expected_status: Option<OrderStatus>,
    pub timeline_status: Option<String>,
    pub timeline: Option<Timeline>,
    pub steps: Vec<RunStep>,
    pub error: Option<String>,
}

impl GuidedRun {
    pub fn started(scenario: Scenario) -> Self {
        Self {
            state: RunState::Executando,
            scenario,
            pedido_id: None,
            rota_id: None,
            entrega_id: None,
            expected_status: None,
            timeline_status: None,
            timeline: None,
            steps: Vec::new(),
            error: None,
        }
    }

    pub fn summary(&self) -> String {
        let mut parts = Vec::new();
        if let Some(id) = self.pedido_id {
            parts.push(format!("pedidoId={id}"));
        }
        if let Some(id) = self.rota_id {
            parts.push(format!("rotaId={id}"));
        }
        if let Some(id) = self.entrega_id {
            parts.push(format!("entregaId={id}"));
        }
        if let Some(status) = &self.timeline_status {
            parts.push(format!("timeline={status}"));
        }
        if let Some(status) = self.expected_status {
            parts.push(format!("esperado={status}"));
        }
        parts.join(" · ")
    }

    pub fn step_titles(&self) -> Vec<&str> {
        self.steps.iter().map(|step| step.title.as_str()).collect()
    }
}

struct Recorder<'a> {
    run: GuidedRun,
    progress: Option<&'a UnboundedSender<RunStep>>,
}

impl Recorder<'_> {
    fn push(&mut self, title: &str, ok: bool, detail: String, payload: Option<Value>) {
        let step = RunStep {
            title: title.to_string(),
            ok,
            detail,
            payload,
        };
        info!(step = title, ok, detail = %step.detail, "guided run step");
        if let Some(progress) = self.progress {
            let _ = progress.send(step.clone());
        }
        self.run.steps.push(step);
    }
}

fn to_payload<T: Serialize>(value: &T) -> Option<Value> {
    serde_json::to_value(value).ok()
}

fn or_dash<T: ToString>(value: Option<T>) -> String {
    value.map(|v| v.to_string()).unwrap_or_else(|| "-".to_string())
}

pub async fn run_guided_flow(api: &dyn DispatchApi, form: &GuidedRunForm) -> GuidedRun {
    run_guided_flow_with_progress(api, form, None).await
}

/// Runs the flow; every recorded step is also sent to `progress` as it happens.
pub async fn run_guided_flow_with_progress(
    api: &dyn DispatchApi,
    form: &GuidedRunForm,
    progress: Option<&UnboundedSender<RunStep>>,
) -> GuidedRun {
    let mut recorder = Recorder {
        run: GuidedRun::started(form.scenario),
        progress,
    };
    info!(scenario = %form.scenario, "guided run started");

    if let Err(err) = drive(api, form, &mut recorder).await {
        let message = err.to_string();
        warn!(scenario = %form.scenario, error = %message, "guided run failed");
        recorder.push(STEP_FALHA, false, message.clone(), None);
        recorder.run.state = RunState::Erro;
        recorder.run.error = Some(message);
    }
    recorder.run
}

async fn drive(api: &dyn DispatchApi, form: &GuidedRunForm, rec: &mut Recorder<'_>) -> Result<()> {
    let scenario = form.scenario;
    let external_call_id = format!("ui-e2e-{}-{}", scenario, Utc::now().timestamp_millis());
    let intake = AtendimentoForm {
        telefone: form.telefone.clone(),
        quantidade_galoes: form.quantidade_galoes.to_string(),
        atendente_id: form.atendente_id.to_string(),
        metodo_pagamento: form.metodo_pagamento.as_str().to_string(),
        external_call_id,
        ..AtendimentoForm::default()
    };
    let payload = build_atendimento_payload(&intake)?;

    let atendimento = api.create_atendimento(&payload, None).await?;
    let pedido_id = atendimento.order_id();
    rec.push(
        STEP_ATENDIMENTO,
        pedido_id.is_some(),
        match pedido_id {
            Some(id) => format!("pedidoId={id}"),
            None => "API nao retornou pedidoId".to_string(),
        },
        to_payload(&atendimento),
    );
    let pedido_id = pedido_id.ok_or_else(|| anyhow!("API nao retornou pedidoId para o atendimento"))?;
    rec.run.pedido_id = Some(pedido_id);

    let replan = api.replan(&form.replan).await?;
    rec.push(STEP_REPLAN_INICIAL, true, replan.summary(), to_payload(&replan));

    let execution = api.execution(pedido_id).await?;
    let rota_id = execution.route_id();
    rec.push(
        STEP_RESOLVER_EXECUCAO,
        rota_id.is_some(),
        format!("camada={} · rotaId={}", execution.camada_label(), or_dash(rota_id)),
        to_payload(&execution),
    );
    let rota_id = rota_id.ok_or_else(|| anyhow!("Execucao do pedido nao retornou rotaId valido"))?;
    rec.run.rota_id = Some(rota_id);

    let mut target = None;
    for attempt in 1..=MAX_ROUTE_ATTEMPTS {
        let started = api.post_event(&EventPayload::route_started(rota_id)).await?;
        let started_order = started.order_id();
        rec.push(
            STEP_ROTA_INICIADA,
            true,
            format!(
                "tentativa={attempt} · rotaId={rota_id} · pedidoId={}",
                or_dash(started_order)
            ),
            to_payload(&started),
        );

        if let (Some(other), Some(entrega)) = (started_order, started.delivery_id()) {
            if other != pedido_id {
                let released = api.post_event(&EventPayload::delivered(entrega)).await?;
                rec.push(
                    STEP_LIBERAR_FILA,
                    true,
                    format!("pedidoId={other} concluido para liberar pedido alvo {pedido_id}"),
                    to_payload(&released),
                );
            }
        }

        let execution = api.execution(pedido_id).await?;
        let entrega = execution.active_delivery_id();
        let in_execution = execution.is_target_in_execution();
        rec.push(
            STEP_ENTREGA_ATIVA,
            true,
            format!(
                "tentativa={attempt} · camada={} · entregaId={}{}",
                execution.camada_label(),
                or_dash(entrega),
                if in_execution { "" } else { " · aguardando vez na rota" }
            ),
            to_payload(&execution),
        );
        if in_execution {
            target = entrega;
            break;
        }
    }
    let Some(entrega_id) = target else {
        bail!(ATTEMPTS_EXHAUSTED);
    };
    rec.run.entrega_id = Some(entrega_id);

    let terminal = build_terminal_event_payload(scenario, entrega_id.0, &form.terminal_options())?;
    let applied = api.post_event(&terminal).await?;
    rec.push(
        STEP_EVENTO_TERMINAL,
        true,
        format!("{} aplicado", terminal.event_type),
        to_payload(&applied),
    );

    let replan = api.replan(&form.replan).await?;
    rec.push(STEP_REPLAN_FINAL, true, replan.summary(), to_payload(&replan));

    let timeline = fetch_timeline(api, pedido_id).await?;
    let timeline_status = timeline.status_label();
    let expected = scenario.expected_status();
    let matches = timeline_status == expected.as_str();
    rec.push(
        STEP_TIMELINE_FINAL,
        matches,
        format!("status={timeline_status} · esperado={expected}"),
        to_payload(&timeline),
    );

    rec.run.expected_status = Some(expected);
    rec.run.timeline_status = Some(timeline_status);
    rec.run.timeline = Some(timeline);
    if matches {
        rec.run.state = RunState::Sucesso;
    } else {
        rec.run.state = RunState::Erro;
        rec.run.error = Some(TIMELINE_MISMATCH.to_string());
    }
    Ok(())
}

#[cfg(test)]
#[path = "tests/orchestrator_tests.rs"]
mod tests;
