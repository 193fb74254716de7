use super::*;
use chrono::FixedOffset;
use serde_json::json;

fn row(id: i64, status: &str) -> OrderRow {
    OrderRow {
        pedido_id: OrderId(id),
        cliente: "Condominio Horizonte".into(),
        status: status.into(),
        idempotente: false,
        eventos: Vec::new(),
    }
}

#[test]
fn normalizes_and_sorts_events_by_timestamp() {
    let payload = json!({
        "pedidoId": 8421,
        "statusAtual": " EM_ROTA ",
        "eventos": [
            {"timestamp": "2026-02-13T09:02:00Z", "deStatus": "CONFIRMADO", "paraStatus": "EM_ROTA", "origem": "Despacho"},
            {"timestamp": "2026-02-13T07:58:00Z", "deStatus": "PENDENTE", "paraStatus": "CONFIRMADO", "origem": "Atendimento"}
        ]
    });

    let timeline = normalize_timeline_in(&payload, &Utc).expect("valid timeline");
    assert_eq!(timeline.pedido_id, OrderId(8421));
    assert_eq!(timeline.status, "EM_ROTA");
    assert_eq!(timeline.eventos.len(), 2);
    assert_eq!(timeline.eventos[0].de, "PENDENTE");
    assert_eq!(timeline.eventos[0].hora, "07:58");
    assert_eq!(timeline.eventos[1].para, "EM_ROTA");
    assert_eq!(timeline.eventos[1].hora, "09:02");
}

#[test]
fn earlier_timestamp_wins_regardless_of_input_order() {
    let first = json!({"timestamp": "2026-02-13T08:00:00Z", "para": "A"});
    let second = json!({"timestamp": "2026-02-13T08:00:01Z", "para": "B"});
    for eventos in [json!([first.clone(), second.clone()]), json!([second, first])] {
        let payload = json!({"pedidoId": 1, "eventos": eventos});
        let timeline = normalize_timeline_in(&payload, &Utc).expect("valid");
        let order: Vec<_> = timeline.eventos.iter().map(|e| e.para.as_str()).collect();
        assert_eq!(order, ["A", "B"]);
    }
}

#[test]
fn unparsable_timestamps_sort_last_and_show_placeholder() {
    let payload = json!({
        "pedido_id": "12",
        "status_atual": "PENDENTE",
        "eventos": [
            {"timestamp": "ontem", "para": "X"},
            {"data": "2026-02-13T10:00:00", "para": "Y"},
            {"para": "Z"}
        ]
    });
    let timeline = normalize_timeline_in(&payload, &Utc).expect("valid");
    let order: Vec<_> = timeline.eventos.iter().map(|e| e.para.as_str()).collect();
    assert_eq!(order, ["Y", "X", "Z"]);
    assert_eq!(timeline.eventos[0].hora, "10:00");
    assert_eq!(timeline.eventos[1].hora, UNKNOWN_HOUR);
    assert_eq!(timeline.eventos[2].hora, UNKNOWN_HOUR);
}

#[test]
fn float_epoch_millis_are_valid_timestamps() {
    let payload = json!({
        "pedidoId": 5,
        "eventos": [
            {"para": "SEM_HORA"},
            {"timestamp": 1700000000000.0, "para": "FLOAT"},
            {"timestamp": 1699999940000_i64, "para": "INT"}
        ]
    });
    let timeline = normalize_timeline_in(&payload, &Utc).expect("valid");
    let order: Vec<_> = timeline.eventos.iter().map(|e| e.para.as_str()).collect();
    assert_eq!(order, ["INT", "FLOAT", "SEM_HORA"]);
    assert_eq!(timeline.eventos[1].hora, "22:13");
}

#[test]
fn empty_timestamp_falls_back_to_data() {
    let payload = json!({
        "pedidoId": 6,
        "eventos": [{"timestamp": "", "data": "2026-02-13T07:45:00Z", "para": "CONFIRMADO"}]
    });
    let timeline = normalize_timeline_in(&payload, &Utc).expect("valid");
    assert_eq!(timeline.eventos[0].hora, "07:45");
}

#[test]
fn offsets_are_converted_to_the_display_zone() {
    let brt = FixedOffset::west_opt(3 * 3600).expect("offset");
    let payload = json!({
        "pedidoId": 3,
        "eventos": [{"timestamp": "2026-02-13T12:30:00Z"}]
    });
    let timeline = normalize_timeline_in(&payload, &brt).expect("valid");
    assert_eq!(timeline.eventos[0].hora, "09:30");
}

#[test]
fn rejects_missing_or_non_positive_order_id() {
    for payload in [
        json!({}),
        json!({"pedidoId": 0}),
        json!({"pedidoId": -5}),
        json!({"pedidoId": ""}),
        json!({"pedidoId": "abc"}),
        json!({"pedidoId": 1.5}),
        json!({"pedidoId": null}),
    ] {
        assert_eq!(
            normalize_timeline_in(&payload, &Utc),
            Err(TimelineError::InvalidOrderId),
            "payload {payload}"
        );
    }
}

#[test]
fn fills_default_origin_and_field_aliases() {
    let payload = json!({
        "pedidoId": 4,
        "status": "ENTREGUE",
        "eventos": [{"timestamp": "2026-02-13T08:00:00Z", "de_status": "EM_ROTA", "para_status": "ENTREGUE", "origem": "  ", "observacao": " ok "}]
    });
    let timeline = normalize_timeline_in(&payload, &Utc).expect("valid");
    let entry = &timeline.eventos[0];
    assert_eq!(timeline.status, "ENTREGUE");
    assert_eq!(entry.de, "EM_ROTA");
    assert_eq!(entry.para, "ENTREGUE");
    assert_eq!(entry.origem, DEFAULT_ORIGIN);
    assert_eq!(entry.observacao, "ok");
}

#[test]
fn status_label_defaults_when_blank() {
    let timeline = normalize_timeline_in(&json!({"pedidoId": 9}), &Utc).expect("valid");
    assert_eq!(timeline.status, "");
    assert_eq!(timeline.status_label(), "INDEFINIDO");
}

#[test]
fn merge_keeps_row_fields_and_replaces_events() {
    let timeline = Timeline {
        pedido_id: OrderId(8421),
        status: "EM_ROTA".into(),
        eventos: vec![TimelineEntry {
            hora: "07:58".into(),
            de: "PENDENTE".into(),
            para: "CONFIRMADO".into(),
            origem: "Atendimento".into(),
            observacao: String::new(),
        }],
    };
    let merged = merge_timeline_into_row(&row(8421, "PENDENTE"), &timeline).expect("same id");
    assert_eq!(merged.status, "EM_ROTA");
    assert_eq!(merged.eventos.len(), 1);
    assert_eq!(merged.cliente, "Condominio Horizonte");
}

#[test]
fn merge_with_empty_status_keeps_row_status() {
    let timeline = Timeline {
        pedido_id: OrderId(5),
        status: String::new(),
        eventos: Vec::new(),
    };
    let merged = merge_timeline_into_row(&row(5, "CONFIRMADO"), &timeline).expect("same id");
    assert_eq!(merged.status, "CONFIRMADO");
}

#[test]
fn merge_rejects_divergent_ids() {
    let timeline = Timeline {
        pedido_id: OrderId(6),
        status: "ENTREGUE".into(),
        eventos: Vec::new(),
    };
    assert_eq!(
        merge_timeline_into_row(&row(5, "PENDENTE"), &timeline),
        Err(TimelineError::DivergentOrderId)
    );
}

#[test]
fn fallback_payload_normalizes() {
    let timeline = normalize_timeline_in(&fallback_timeline_payload(OrderId(77)), &Utc).expect("valid");
    assert_eq!(timeline.pedido_id, OrderId(77));
    assert_eq!(timeline.status, "PENDENTE");
    assert_eq!(timeline.eventos[0].hora, UNKNOWN_HOUR);
}
