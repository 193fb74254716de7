use super::*;
use crate::orchestrator::{RunState, RunStep};
use crate::read_models::ReadModelSource;
use chrono::TimeZone;
use shared::domain::{AttendantId, OrderId};
use shared::scenario::Scenario;
use shared::timeline::{normalize_timeline, Timeline};

fn at(second: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 2, 13, 10, 0, second).single().expect("valid time")
}

fn panel_with_pending(pedido_id: i64) -> OperationalPanel {
    serde_json::from_value(json!({
        "ambiente": "homolog",
        "filas": {"pendentesElegiveis": [{"pedidoId": pedido_id}]}
    }))
    .expect("panel")
}

#[test]
fn initial_state_matches_the_console_defaults() {
    let state = AppState::new("http://localhost:8082");
    assert_eq!(state.api.base_url, "http://localhost:8082");
    assert_eq!(state.view, View::Pedidos);
    assert_eq!(state.mode, Mode::Success);
    assert_eq!(state.examples.atendimento_request.origem_canal, "MANUAL");
    assert_eq!(state.examples.atendimento_request.janela_tipo, "ASAP");
    assert_eq!(state.examples.atendimento_request.manual_request_id, "call-20260213-0001");
    assert_eq!(state.examples.evento_request.event_type, "PEDIDO_ENTREGUE");
    assert_eq!(state.examples.timeline_request.pedido_id, "1");
    assert!(state.handoff.atendimentos_sessao.is_empty());
    assert_eq!(state.handoff.foco_pedido_id, None);
}

#[test]
fn api_status_walks_pending_connected_offline() {
    let mut api = ApiConnection::new(DEFAULT_API_BASE);
    let pending = api.status(Duration::from_secs(5));
    assert_eq!(pending.label, "API: pendente");
    assert_eq!(pending.tone, Tone::Warn);

    api.record_success(at(1));
    let connected = api.status(Duration::from_secs(5));
    assert_eq!(connected.label, "API: conectada · auto 5s");
    assert_eq!(connected.tone, Tone::Ok);

    api.record_failure("HTTP 503", at(2));
    let offline = api.status(Duration::from_secs(5));
    assert_eq!(offline.label, "API: offline");
    assert_eq!(offline.tone, Tone::Danger);
    assert_eq!(api.last_sync_at, Some(at(2)));
}

#[test]
fn examples_override_only_what_the_file_names() {
    let examples = Examples::with_overrides(json!({
        "atendimentoRequest": {"telefone": "(38) 90000-0000", "quantidadeGaloes": 5},
        "timelineRequest": {"pedidoId": 44}
    }))
    .expect("merged examples");

    assert_eq!(examples.atendimento_request.telefone, "(38) 90000-0000");
    assert_eq!(examples.atendimento_request.quantidade_galoes, "5");
    assert_eq!(examples.atendimento_request.metodo_pagamento, "PIX");
    assert_eq!(examples.timeline_request.pedido_id, "44");
    assert_eq!(examples.evento_request.event_type, "PEDIDO_ENTREGUE");
}

#[test]
fn examples_load_from_disk_and_report_bad_json() {
    let dir = tempfile::tempdir().expect("tempdir");
    let good = dir.path().join("examples.json");
    std::fs::write(&good, r#"{"eventoRequest": {"eventType": "PEDIDO_FALHOU"}}"#).expect("write");
    let examples = Examples::load(&good).expect("load");
    assert_eq!(examples.evento_request.event_type, "PEDIDO_FALHOU");

    let bad = dir.path().join("broken.json");
    std::fs::write(&bad, "{nope").expect("write");
    assert!(matches!(Examples::load(&bad), Err(ExamplesError::Json { .. })));
    assert!(matches!(
        Examples::load(&dir.path().join("missing.json")),
        Err(ExamplesError::Io { .. })
    ));
}

#[test]
fn failure_without_data_switches_to_error_shell_and_retry_restores() {
    let mut state = AppState::default();
    reduce(
        &mut state,
        Action::ApiFailed {
            message: "falha de rede".into(),
            at: at(1),
        },
    );
    assert_eq!(state.mode, Mode::Error);
    assert_eq!(state.error_detail.as_deref(), Some("falha de rede"));
    assert!(!state.api.connected);

    reduce(&mut state, Action::Retry);
    assert_eq!(state.mode, Mode::Success);
    assert_eq!(state.error_detail, None);
}

#[test]
fn failure_with_cached_panel_keeps_rendering_it() {
    let mut state = AppState::default();
    reduce(
        &mut state,
        Action::ReadModelsLoaded {
            models: ReadModels {
                painel: Some(panel_with_pending(3)),
                ..ReadModels::default()
            },
            at: at(1),
        },
    );
    reduce(
        &mut state,
        Action::ApiFailed {
            message: "HTTP 500".into(),
            at: at(2),
        },
    );
    assert_eq!(state.mode, Mode::Success);
    assert!(state.painel.is_some());
    assert_eq!(state.api.last_error.as_deref(), Some("HTTP 500"));
}

#[test]
fn read_models_fill_rows_and_record_degradation() {
    let mut state = AppState::default();
    let failure = ReadModelFailure {
        source: ReadModelSource::Mapa,
        message: "mapa fora".into(),
    };
    reduce(
        &mut state,
        Action::ReadModelsLoaded {
            models: ReadModels {
                painel: Some(panel_with_pending(3)),
                eventos: Some(EventFeed::default()),
                mapa: None,
                failures: vec![failure.clone()],
            },
            at: at(1),
        },
    );
    assert_eq!(state.pedidos.len(), 1);
    assert_eq!(state.pedidos[0].pedido_id, OrderId(3));
    assert_eq!(state.degraded, [failure]);
    assert!(state.api.connected);
}

#[test]
fn atendimento_feeds_handoff_and_timeline_form() {
    let mut state = AppState::default();
    let payload = AtendimentoPayload::new("(38) 99876-1234", 2, AttendantId(1));
    let response: AtendimentoResponse =
        serde_json::from_value(json!({"pedidoId": 77, "idempotente": false})).expect("response");

    reduce(
        &mut state,
        Action::AtendimentoCreated {
            payload,
            response,
            at: at(3),
        },
    );

    let result = state.api_results.atendimento.as_ref().expect("result box");
    assert!(result.ok);
    assert_eq!(result.source, "api real");
    assert_eq!(result.payload["pedidoId"], 77);
    assert_eq!(state.handoff.atendimentos_sessao[0].pedido_id, OrderId(77));
    assert_eq!(state.examples.timeline_request.pedido_id, "77");
}

#[test]
fn timeline_merges_into_cached_row() {
    let mut state = AppState::default();
    reduce(
        &mut state,
        Action::ReadModelsLoaded {
            models: ReadModels {
                painel: Some(panel_with_pending(3)),
                ..ReadModels::default()
            },
            at: at(1),
        },
    );
    let timeline: Timeline = normalize_timeline(&json!({
        "pedidoId": 3,
        "statusAtual": "CONFIRMADO",
        "eventos": [
            {"timestamp": "2026-02-13T10:00:00Z", "deStatus": "PENDENTE", "paraStatus": "CONFIRMADO"},
            {"timestamp": "2026-02-13T09:00:00Z", "paraStatus": "PENDENTE"}
        ]
    }))
    .expect("timeline");

    reduce(
        &mut state,
        Action::TimelineLoaded(TimelineFetch {
            timeline,
            fallback: false,
            error: None,
        }),
    );

    assert_eq!(state.pedidos[0].status, "CONFIRMADO");
    assert_eq!(state.pedidos[0].eventos.len(), 2);
    assert_eq!(state.examples.timeline_request.pedido_id, "3");
    assert!(state.api_results.timeline.as_ref().is_some_and(|r| r.ok));

    // A refresh that only synthesizes one event keeps the richer cached history.
    reduce(
        &mut state,
        Action::ReadModelsLoaded {
            models: ReadModels {
                painel: Some(panel_with_pending(3)),
                ..ReadModels::default()
            },
            at: at(2),
        },
    );
    assert_eq!(state.pedidos[0].eventos.len(), 2);
}

#[test]
fn fallback_timeline_is_flagged_with_the_error() {
    let mut state = AppState::default();
    let timeline = normalize_timeline(&shared::timeline::fallback_timeline_payload(OrderId(9)))
        .expect("fallback");
    reduce(
        &mut state,
        Action::TimelineLoaded(TimelineFetch {
            timeline,
            fallback: true,
            error: Some("HTTP 404".into()),
        }),
    );
    let result = state.api_results.timeline.as_ref().expect("timeline box");
    assert!(!result.ok);
    assert_eq!(result.payload["erro"], "HTTP 404");
    assert_eq!(result.payload["pedidoId"], 9);
}

#[test]
fn failed_request_writes_erro_payload() {
    let mut state = AppState::default();
    reduce(
        &mut state,
        Action::RequestFailed {
            slot: ResultSlot::Replanejamento,
            message: "limiteEventos invalido".into(),
        },
    );
    let result = state.api_results.replanejamento.as_ref().expect("box");
    assert!(!result.ok);
    assert_eq!(result.payload, json!({"erro": "limiteEventos invalido"}));
}

#[test]
fn base_url_is_sanitized_and_blank_is_ignored() {
    let mut state = AppState::default();
    reduce(&mut state, Action::HealthChecked { at: at(1) });
    reduce(&mut state, Action::SetBaseUrl("  http://api.local:9000//  ".into()));
    assert_eq!(state.api.base_url, "http://api.local:9000");
    assert!(!state.api.connected);

    reduce(&mut state, Action::SetBaseUrl("   ".into()));
    assert_eq!(state.api.base_url, "http://api.local:9000");
}

#[test]
fn focusing_a_handoff_entry_prefills_the_timeline_form() {
    let mut state = AppState::default();
    for id in [5, 6] {
        reduce(
            &mut state,
            Action::AtendimentoCreated {
                payload: AtendimentoPayload::new("38999990000", 1, AttendantId(1)),
                response: serde_json::from_value(json!({"pedidoId": id})).expect("response"),
                at: at(1),
            },
        );
    }
    reduce(&mut state, Action::Handoff(HandoffAction::Focus(OrderId(5))));
    assert_eq!(state.handoff.foco_pedido_id, Some(OrderId(5)));
    assert_eq!(state.examples.timeline_request.pedido_id, "5");

    reduce(&mut state, Action::Handoff(HandoffAction::MoveUp(OrderId(5))));
    assert_eq!(state.handoff.atendimentos_sessao[0].pedido_id, OrderId(5));
}

#[test]
fn finished_run_fills_result_boxes() {
    let mut state = AppState::default();
    reduce(&mut state, Action::E2eStarted(GuidedRunForm::default()));
    assert!(state.e2e.running);

    let mut run = GuidedRun::started(Scenario::Feliz);
    run.state = RunState::Sucesso;
    run.steps = vec![
        RunStep {
            title: "Atendimento".into(),
            ok: true,
            detail: "pedidoId=1".into(),
            payload: Some(json!({"pedidoId": 1})),
        },
        RunStep {
            title: "Evento terminal".into(),
            ok: true,
            detail: "PEDIDO_ENTREGUE aplicado".into(),
            payload: Some(json!({"evento": "PEDIDO_ENTREGUE"})),
        },
    ];
    reduce(&mut state, Action::E2eFinished(run));

    assert!(!state.e2e.running);
    assert_eq!(state.e2e.last_run.as_ref().map(|r| r.state), Some(RunState::Sucesso));
    assert_eq!(
        state.api_results.atendimento.as_ref().map(|r| r.payload.clone()),
        Some(json!({"pedidoId": 1}))
    );
    assert_eq!(
        state.api_results.evento.as_ref().map(|r| r.payload.clone()),
        Some(json!({"evento": "PEDIDO_ENTREGUE"}))
    );
}

#[test]
fn state_round_trips_through_json() {
    let mut state = AppState::default();
    reduce(&mut state, Action::SetView(View::Despacho));
    let encoded = serde_json::to_value(&state).expect("encode");
    assert_eq!(encoded["view"], "despacho");
    let decoded: AppState = serde_json::from_value(encoded).expect("decode");
    assert_eq!(decoded, state);
}
