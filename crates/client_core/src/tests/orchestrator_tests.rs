use super::*;
use crate::fake_api::FakeDispatchApi;
use serde_json::json;
use shared::domain::EventType;

fn scripted_api(pedido_id: i64) -> FakeDispatchApi {
    let api = FakeDispatchApi::default();
    api.atendimentos
        .lock()
        .expect("lock")
        .push_back(Ok(serde_json::from_value(json!({"pedidoId": pedido_id})).expect("atendimento")));
    api.push_replan(json!({"eventosProcessados": 3, "replanejou": true}));
    api.push_execution(json!({"pedidoId": pedido_id, "camada": "PRIMARIA_PENDENTE", "rotaId": 3}));
    api
}

fn finish_script(api: &FakeDispatchApi, pedido_id: i64, status: &str) {
    api.push_event_result(json!({"evento": "terminal", "idempotente": false}));
    api.push_replan(json!({"eventosProcessados": 1, "replanejou": false}));
    api.timelines.lock().expect("lock").push_back(Ok(json!({
        "pedidoId": pedido_id,
        "statusAtual": status,
        "eventos": []
    })));
}

#[tokio::test]
async fn happy_path_delivers_and_matches_timeline() {
    let api = scripted_api(41);
    api.push_event_result(json!({"rotaId": 3, "pedidoId": 41, "entregaId": 9}));
    api.push_execution(json!({"camada": "PRIMARIA_EM_EXECUCAO", "rotaId": 3, "entregaAtivaId": 9}));
    finish_script(&api, 41, "ENTREGUE");

    let run = run_guided_flow(&api, &GuidedRunForm::default()).await;

    assert_eq!(run.state, RunState::Sucesso, "{:?}", run.error);
    assert_eq!(run.pedido_id, Some(OrderId(41)));
    assert_eq!(run.rota_id, Some(RouteId(3)));
    assert_eq!(run.entrega_id, Some(DeliveryId(9)));
    assert_eq!(run.timeline_status.as_deref(), Some("ENTREGUE"));
    assert_eq!(run.expected_status, Some(OrderStatus::Entregue));
    assert_eq!(
        run.step_titles(),
        [
            STEP_ATENDIMENTO,
            STEP_REPLAN_INICIAL,
            STEP_RESOLVER_EXECUCAO,
            STEP_ROTA_INICIADA,
            STEP_ENTREGA_ATIVA,
            STEP_EVENTO_TERMINAL,
            STEP_REPLAN_FINAL,
            STEP_TIMELINE_FINAL,
        ]
    );
    assert_eq!(run.steps[0].detail, "pedidoId=41");
    assert_eq!(run.steps[1].detail, "eventos=3 · replanejou=true");
    assert_eq!(run.steps[2].detail, "camada=PRIMARIA_PENDENTE · rotaId=3");
    assert_eq!(run.steps[3].detail, "tentativa=1 · rotaId=3 · pedidoId=41");
    assert_eq!(run.steps[4].detail, "tentativa=1 · camada=PRIMARIA_EM_EXECUCAO · entregaId=9");
    assert_eq!(run.steps[5].detail, "PEDIDO_ENTREGUE aplicado");
    assert_eq!(run.steps[7].detail, "status=ENTREGUE · esperado=ENTREGUE");
    assert!(run.steps.iter().all(|step| step.ok));

    let created = api.created.lock().expect("lock").clone();
    assert_eq!(created.len(), 1);
    let (payload, key) = &created[0];
    assert!(key.is_none());
    assert_eq!(payload.telefone, "(38) 99876-9901");
    assert_eq!(payload.quantidade_galoes, 1);
    assert_eq!(payload.metodo_pagamento, Some(PaymentMethod::Pix));
    assert!(payload
        .external_call_id
        .as_deref()
        .is_some_and(|id| id.starts_with("ui-e2e-feliz-")));

    let posted = api.posted_events();
    assert_eq!(posted.len(), 2);
    assert_eq!(posted[0].event_type, EventType::RotaIniciada);
    assert_eq!(posted[0].rota_id, Some(RouteId(3)));
    assert_eq!(posted[1].event_type, EventType::PedidoEntregue);
    assert_eq!(posted[1].entrega_id, Some(DeliveryId(9)));
}

#[tokio::test]
async fn drains_earlier_deliveries_before_the_target() {
    let api = scripted_api(41);
    api.push_event_result(json!({"rotaId": 3, "pedidoId": 40, "entregaId": 8}));
    api.push_event_result(json!({"pedidoId": 40, "entregaId": 8}));
    api.push_execution(json!({"camada": "PRIMARIA_PENDENTE", "rotaId": 3}));
    api.push_event_result(json!({"rotaId": 3, "pedidoId": 41, "entregaId": 9}));
    api.push_execution(json!({"camada": "PRIMARIA_EM_EXECUCAO", "rotaId": 3, "entregaId": 9}));
    finish_script(&api, 41, "CANCELADO");

    let form = GuidedRunForm {
        scenario: Scenario::Cancelamento,
        motivo_cancelamento: "  ".to_string(),
        ..GuidedRunForm::default()
    };
    let run = run_guided_flow(&api, &form).await;

    assert_eq!(run.state, RunState::Sucesso, "{:?}", run.error);
    let liberar = run
        .steps
        .iter()
        .find(|step| step.title == STEP_LIBERAR_FILA)
        .expect("queue drained");
    assert_eq!(liberar.detail, "pedidoId=40 concluido para liberar pedido alvo 41");
    assert_eq!(
        run.steps[4].detail,
        "tentativa=1 · camada=PRIMARIA_PENDENTE · entregaId=- · aguardando vez na rota"
    );

    let posted = api.posted_events();
    let types: Vec<EventType> = posted.iter().map(|event| event.event_type).collect();
    assert_eq!(
        types,
        [
            EventType::RotaIniciada,
            EventType::PedidoEntregue,
            EventType::RotaIniciada,
            EventType::PedidoCancelado,
        ]
    );
    assert_eq!(posted[1].entrega_id, Some(DeliveryId(8)));
    assert_eq!(posted[3].entrega_id, Some(DeliveryId(9)));
    assert_eq!(posted[3].motivo.as_deref(), Some("cliente cancelou"));
    assert_eq!(posted[3].cobranca_cancelamento_centavos, Some(2500));
}

#[tokio::test]
async fn gives_up_after_the_attempt_limit() {
    let api = scripted_api(41);
    for _ in 0..MAX_ROUTE_ATTEMPTS {
        api.push_event_result(json!({"rotaId": 3}));
        api.push_execution(json!({"camada": "PRIMARIA_PENDENTE", "rotaId": 3}));
    }

    let run = run_guided_flow(&api, &GuidedRunForm::default()).await;

    assert_eq!(run.state, RunState::Erro);
    assert_eq!(run.error.as_deref(), Some(ATTEMPTS_EXHAUSTED));
    let last = run.steps.last().expect("failure step");
    assert_eq!(last.title, STEP_FALHA);
    assert!(!last.ok);
    assert_eq!(api.posted_events().len(), MAX_ROUTE_ATTEMPTS);
    assert!(run.entrega_id.is_none());
}

#[tokio::test]
async fn missing_order_id_fails_at_intake() {
    let api = FakeDispatchApi::default();
    api.atendimentos
        .lock()
        .expect("lock")
        .push_back(Ok(serde_json::from_value(json!({"pedidoId": 0})).expect("atendimento")));

    let run = run_guided_flow(&api, &GuidedRunForm::default()).await;

    assert_eq!(run.state, RunState::Erro);
    assert_eq!(run.step_titles(), [STEP_ATENDIMENTO, STEP_FALHA]);
    assert!(!run.steps[0].ok);
    assert_eq!(run.steps[0].detail, "API nao retornou pedidoId");
    assert_eq!(run.error.as_deref(), Some("API nao retornou pedidoId para o atendimento"));
    assert!(api.replan_requests.lock().expect("lock").is_empty());
}

#[tokio::test]
async fn execution_without_route_stops_the_run() {
    let api = FakeDispatchApi::default();
    api.atendimentos
        .lock()
        .expect("lock")
        .push_back(Ok(serde_json::from_value(json!({"pedidoId": 5})).expect("atendimento")));
    api.push_replan(json!({"replanejou": false}));
    api.push_execution(json!({"camada": "PENDENTE"}));

    let run = run_guided_flow(&api, &GuidedRunForm::default()).await;

    assert_eq!(run.state, RunState::Erro);
    assert_eq!(run.steps[2].detail, "camada=PENDENTE · rotaId=-");
    assert!(!run.steps[2].ok);
    assert_eq!(run.error.as_deref(), Some("Execucao do pedido nao retornou rotaId valido"));
}

#[tokio::test]
async fn timeline_mismatch_is_an_error_without_failure_step() {
    let api = scripted_api(41);
    api.push_event_result(json!({"pedidoId": 41, "entregaId": 9}));
    api.push_execution(json!({"camada": "PRIMARIA_EM_EXECUCAO", "entregaAtivaId": 9}));
    finish_script(&api, 41, "EM_ROTA");

    let form = GuidedRunForm {
        scenario: Scenario::Falha,
        ..GuidedRunForm::default()
    };
    let run = run_guided_flow(&api, &form).await;

    assert_eq!(run.state, RunState::Erro);
    assert_eq!(run.error.as_deref(), Some(TIMELINE_MISMATCH));
    let last = run.steps.last().expect("timeline step");
    assert_eq!(last.title, STEP_TIMELINE_FINAL);
    assert!(!last.ok);
    assert_eq!(last.detail, "status=EM_ROTA · esperado=FALHOU");
    assert_eq!(api.posted_events()[1].motivo.as_deref(), Some("cliente ausente"));
}

#[tokio::test]
async fn api_error_message_becomes_the_run_error() {
    let api = FakeDispatchApi::default();
    api.atendimentos
        .lock()
        .expect("lock")
        .push_back(Err("telefone bloqueado".to_string()));

    let run = run_guided_flow(&api, &GuidedRunForm::default()).await;

    assert_eq!(run.state, RunState::Erro);
    assert_eq!(run.error.as_deref(), Some("telefone bloqueado"));
    assert_eq!(run.step_titles(), [STEP_FALHA]);
}

#[tokio::test]
async fn invalid_form_fails_before_any_request() {
    let api = FakeDispatchApi::default();
    let form = GuidedRunForm {
        telefone: "   ".to_string(),
        ..GuidedRunForm::default()
    };

    let run = run_guided_flow(&api, &form).await;

    assert_eq!(run.state, RunState::Erro);
    assert_eq!(run.error.as_deref(), Some("telefone obrigatorio"));
    assert!(api.created.lock().expect("lock").is_empty());
}

#[tokio::test]
async fn progress_channel_sees_every_step() {
    let api = scripted_api(41);
    api.push_event_result(json!({"pedidoId": 41, "entregaId": 9}));
    api.push_execution(json!({"camada": "PRIMARIA_EM_EXECUCAO", "entregaAtivaId": 9}));
    finish_script(&api, 41, "ENTREGUE");

    let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
    let run = run_guided_flow_with_progress(&api, &GuidedRunForm::default(), Some(&tx)).await;
    drop(tx);

    let mut streamed = Vec::new();
    while let Some(step) = rx.recv().await {
        streamed.push(step);
    }
    assert_eq!(streamed, run.steps);
    assert_eq!(
        run.summary(),
        "pedidoId=41 · rotaId=3 · entregaId=9 · timeline=ENTREGUE · esperado=ENTREGUE"
    );
}

#[test]
fn form_defaults_match_the_operator_screen() {
    let form = GuidedRunForm::default();
    assert_eq!(form.scenario, Scenario::Feliz);
    assert_eq!(form.replan, ReplanRequest { debounce_segundos: 0, limite_eventos: 100 });
    assert_eq!(form.cobranca_cancelamento_centavos, Some(2500));

    let parsed: GuidedRunForm =
        serde_json::from_value(json!({"scenario": "falha", "limiteEventos": 10})).expect("form");
    assert_eq!(parsed.scenario, Scenario::Falha);
    assert_eq!(parsed.replan.limite_eventos, 10);
    assert_eq!(parsed.telefone, "(38) 99876-9901");
}
