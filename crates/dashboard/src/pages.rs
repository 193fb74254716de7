//! Attendant (pedidos) and dispatch (despacho) pages.

use client_core::{
    orchestrator::GuidedRun,
    session::{HandoffQueue, PhoneTrail},
    store::{ApiStatus, AppState, Tone, View},
};
use shared::{
    domain::{EventType, PaymentMethod},
    protocol::OperationalEvent,
    scenario::Scenario,
    timeline::OrderRow,
};

use crate::{
    components::{
        guided_run_box, metrics, number_input, panel_header, panel_or_default, pill, result_box,
        select, state_shell, status_pill, text_input, two_columns,
    },
    html::{document, el, fragment, Element, Markup},
    map::{layer_summary, layer_warnings_box, render_map},
};

const UNKNOWN_CLOCK: &str = "--:--:--";

fn payment_options() -> Vec<&'static str> {
    PaymentMethod::ALL.iter().map(|method| method.as_str()).collect()
}

fn separator() -> Element {
    el("hr").attr("style", "border-color: rgba(73, 104, 121, 0.4); margin: 1rem 0;")
}

fn order_row(row: &OrderRow) -> Element {
    let eventos = row.eventos.iter().map(|ev| {
        el("li")
            .class("mono")
            .text(format!("{} · {} -> {} ({})", ev.hora, ev.de, ev.para, ev.origem))
    });
    let idempotencia = if row.idempotente {
        el("td").child(status_pill("IDEMPOTENTE"))
    } else {
        el("td").text("-")
    };
    el("tr")
        .child(el("td").class("mono").text(format!("#{}", row.pedido_id)))
        .child(el("td").text(if row.cliente.is_empty() { "-" } else { row.cliente.as_str() }))
        .child(el("td").child(status_pill(&row.status)))
        .child(idempotencia)
        .child(el("td").child(el("ul").children(eventos)))
}

fn orders_table(rows: &[OrderRow]) -> Element {
    let head = el("thead").child(
        el("tr").children(
            ["Pedido", "Cliente", "Status", "Idempotencia", "Eventos"]
                .into_iter()
                .map(|h| el("th").text(h)),
        ),
    );
    let body = if rows.is_empty() {
        el("tbody").child(
            el("tr").child(
                el("td")
                    .attr("colspan", "5")
                    .text("Sem pedidos operacionais visiveis."),
            ),
        )
    } else {
        el("tbody").children(rows.iter().map(order_row))
    };
    el("table").child(head).child(body)
}

fn atendimento_form(state: &AppState) -> Element {
    let example = &state.examples.atendimento_request;
    el("form")
        .id("atendimento-form")
        .class("form-grid")
        .child(text_input("telefone", "telefone", "Telefone", &example.telefone))
        .child(two_columns(
            number_input(
                "quantidadeGaloes",
                "quantidadeGaloes",
                "Quantidade de galoes",
                &example.quantidade_galoes,
                1,
            ),
            number_input("atendenteId", "atendenteId", "Atendente ID", &example.atendente_id, 1),
        ))
        .child(text_input(
            "externalCallId",
            "externalCallId",
            "External call id (opcional, manual se vazio)",
            &example.external_call_id,
        ))
        .child(select(
            "metodoPagamento",
            "metodoPagamento",
            "Metodo de pagamento",
            &payment_options(),
            &example.metodo_pagamento,
        ))
        .child(el("button").class("btn").attr("type", "submit").text("Registrar pedido"))
}

fn timeline_form(state: &AppState) -> Element {
    el("form")
        .id("timeline-form")
        .class("form-grid")
        .child(number_input(
            "timelinePedidoId",
            "pedidoId",
            "Consultar timeline (pedidoId)",
            &state.examples.timeline_request.pedido_id,
            1,
        ))
        .child(el("button").class("btn").attr("type", "submit").text("Carregar timeline"))
}

fn e2e_form(state: &AppState) -> Element {
    let form = &state.e2e.form;
    let scenarios: Vec<&str> = Scenario::ALL.iter().map(|s| s.as_str()).collect();
    let fee = form
        .cobranca_cancelamento_centavos
        .map(|cents| cents.to_string())
        .unwrap_or_default();
    let button = el("button")
        .class("btn")
        .attr("type", "submit")
        .flag("disabled", state.e2e.running)
        .text(if state.e2e.running { "Executando..." } else { "Executar fluxo guiado" });

    el("form")
        .id("e2e-form")
        .class("form-grid")
        .child(two_columns(
            select("e2eScenario", "scenario", "Cenario", &scenarios, form.scenario.as_str()),
            select(
                "e2eMetodoPagamento",
                "metodoPagamento",
                "Metodo de pagamento",
                &payment_options(),
                form.metodo_pagamento.as_str(),
            ),
        ))
        .child(two_columns(
            text_input("e2eTelefone", "telefone", "Telefone", &form.telefone),
            number_input(
                "e2eQuantidadeGaloes",
                "quantidadeGaloes",
                "Quantidade de galoes",
                &form.quantidade_galoes.to_string(),
                1,
            ),
        ))
        .child(number_input(
            "e2eAtendenteId",
            "atendenteId",
            "Atendente ID",
            &form.atendente_id.to_string(),
            1,
        ))
        .child(two_columns(
            number_input(
                "e2eDebounceSegundos",
                "debounceSegundos",
                "Debounce (s)",
                &form.replan.debounce_segundos.to_string(),
                0,
            ),
            number_input(
                "e2eLimiteEventos",
                "limiteEventos",
                "Limite de eventos",
                &form.replan.limite_eventos.to_string(),
                1,
            ),
        ))
        .child(text_input(
            "e2eMotivoFalha",
            "motivoFalha",
            "Motivo para falha (cenario falha)",
            &form.motivo_falha,
        ))
        .child(two_columns(
            text_input(
                "e2eMotivoCancelamento",
                "motivoCancelamento",
                "Motivo para cancelamento",
                &form.motivo_cancelamento,
            ),
            number_input(
                "e2eCobrancaCancelamento",
                "cobrancaCancelamentoCentavos",
                "Cobranca cancelamento (centavos)",
                &fee,
                0,
            ),
        ))
        .child(button)
}

/// Orders taken this session, newest first, with the focused one marked.
pub fn handoff_panel(handoff: &HandoffQueue) -> Element {
    let header = panel_header("Atendimentos da sessao", "handoff");
    if handoff.atendimentos_sessao.is_empty() {
        return el("div")
            .class("result-box")
            .child(header)
            .child(el("p").text("Nenhum atendimento registrado nesta sessao."));
    }
    let items = handoff.atendimentos_sessao.iter().map(|entry| {
        let focused = handoff.foco_pedido_id == Some(entry.pedido_id);
        let mut item = el("li")
            .class(if focused { "handoff-item focus" } else { "handoff-item" })
            .attr("data-pedido-id", entry.pedido_id.to_string())
            .child(el("strong").text(format!("#{}", entry.pedido_id)))
            .text(format!(" · {} · {} galao(oes)", entry.telefone, entry.quantidade_galoes));
        if entry.idempotente {
            item = item.text(" ").child(pill("idempotente", Tone::Info));
        }
        if focused {
            item = item.text(" ").child(pill("foco", Tone::Ok));
        }
        item
    });
    let courier = handoff
        .ultimo_entregador_id
        .map(|id| el("p").class("mono").text(format!("ultimo entregador: {id}")));
    el("div")
        .class("result-box")
        .child(header)
        .child(el("ol").class("handoff").children(items))
        .child_if(courier)
}

pub fn phone_trail_panel(trail: &PhoneTrail) -> Element {
    let current = &trail.busca_telefone;
    let summary = if current.telefone_normalizado.is_empty() {
        el("p").text("Nenhuma busca por telefone nesta sessao.")
    } else {
        el("p")
            .class("mono")
            .text(format!("{} -> {}", current.telefone, current.telefone_normalizado))
    };
    el("div")
        .class("result-box")
        .child(el("p").child(el("strong").text("Busca por telefone")))
        .child(summary)
        .child(el("ul").class("mono").children(
            trail
                .trilha_sessao
                .iter()
                .map(|search| el("li").text(search.telefone_normalizado.as_str())),
        ))
}

fn guided_section(state: &AppState, run: Option<&GuidedRun>) -> Vec<Element> {
    let mut section = vec![
        panel_header("Fluxo guiado E2E (usuario)", "PoC M1"),
        el("p").text(
            "Roda o ciclo operacional no backend real: atendimento -> replanejamento -> rota iniciada -> evento terminal -> replanejamento -> timeline.",
        ),
        e2e_form(state),
    ];
    if let Some(run_box) = guided_run_box(run) {
        section.push(run_box);
    }
    section
}

pub fn render_pedidos(state: &AppState) -> Markup {
    let mut side = el("section")
        .class("panel")
        .child(panel_header("Novo pedido (API real)", "/api/atendimento/pedidos"))
        .child(atendimento_form(state))
        .child_if(result_box("Resposta atendimento", state.api_results.atendimento.as_ref()))
        .child(separator())
        .child(timeline_form(state))
        .child_if(result_box("Resposta timeline", state.api_results.timeline.as_ref()))
        .child(separator());
    side = side.children(guided_section(state, state.e2e.last_run.as_ref()));

    let content = el("div")
        .class("panel-grid")
        .child(
            el("section")
                .class("panel")
                .child(panel_header("Timeline de pedidos (read model real)", "/api/operacao/painel"))
                .child(orders_table(&state.pedidos))
                .child(handoff_panel(&state.handoff))
                .child(phone_trail_panel(&state.atendente)),
        )
        .child(side)
        .render();
    state_shell(state, content)
}

pub fn tone_for_event_type(event_type: &str) -> Tone {
    if event_type.contains("CANCELADO") {
        Tone::Danger
    } else if event_type.contains("ENTREGUE") {
        Tone::Ok
    } else {
        Tone::Info
    }
}

/// `HH:MM:SS` cut from an ISO timestamp.
pub fn clock_of(created_em: Option<&str>) -> String {
    created_em
        .and_then(|raw| raw.get(11..19))
        .filter(|clock| !clock.is_empty())
        .unwrap_or(UNKNOWN_CLOCK)
        .to_string()
}

fn event_row(event: &OperationalEvent) -> Element {
    let event_type = event.event_type.as_deref().unwrap_or("-");
    let aggregate_id = event
        .aggregate_id
        .map(|id| id.to_string())
        .unwrap_or_else(|| "-".to_string());
    let descricao = format!(
        "{} {} · {}",
        event.aggregate_type.as_deref().unwrap_or("-"),
        aggregate_id,
        event.status.as_deref().unwrap_or("-")
    );
    el("div")
        .class("event-row")
        .child(
            el("p")
                .class("meta mono")
                .text(format!("{} · {}", clock_of(event.created_em.as_deref()), event_type)),
        )
        .child(
            el("p")
                .class("title")
                .child(pill(event_type, tone_for_event_type(event_type)))
                .text(format!(" {descricao}")),
        )
}

fn event_feed(events: &[OperationalEvent]) -> Element {
    let feed = el("div").class("event-feed");
    if events.is_empty() {
        feed.child(el("p").text("Nenhum evento operacional encontrado."))
    } else {
        feed.children(events.iter().map(event_row))
    }
}

fn evento_form(state: &AppState) -> Element {
    let example = &state.examples.evento_request;
    let event_types: Vec<&str> = EventType::ALL.iter().map(|t| t.as_str()).collect();
    el("form")
        .id("evento-form")
        .class("form-grid")
        .child(select("eventType", "eventType", "Tipo de evento", &event_types, &example.event_type))
        .child(
            el("div")
                .class("form-row two")
                .child(text_input(
                    "externalEventId",
                    "externalEventId",
                    "External event id (opcional)",
                    &example.external_event_id,
                ))
                .child(number_input("rotaId", "rotaId", "Rota ID (para ROTA_INICIADA)", &example.rota_id, 1))
                .child(number_input(
                    "entregaId",
                    "entregaId",
                    "Entrega ID (demais eventos)",
                    &example.entrega_id,
                    1,
                )),
        )
        .child(number_input(
            "actorEntregadorId",
            "actorEntregadorId",
            "Actor entregador ID (opcional)",
            &example.actor_entregador_id,
            1,
        ))
        .child(text_input("motivo", "motivo", "Motivo (falha/cancelamento)", &example.motivo))
        .child(number_input(
            "cobrancaCancelamentoCentavos",
            "cobrancaCancelamentoCentavos",
            "Cobranca cancelamento (centavos)",
            &example.cobranca_cancelamento_centavos,
            0,
        ))
        .child(el("button").class("btn").attr("type", "submit").text("Enviar evento"))
}

fn replan_form(state: &AppState) -> Element {
    let example = &state.examples.replanejamento_request;
    el("form")
        .id("replanejamento-form")
        .class("form-grid")
        .child(two_columns(
            number_input(
                "debounceSegundos",
                "debounceSegundos",
                "Debounce (s)",
                &example.debounce_segundos,
                0,
            ),
            number_input("limiteEventos", "limiteEventos", "Limite eventos", &example.limite_eventos, 1),
        ))
        .child(el("button").class("btn").attr("type", "submit").text("Executar replanejamento"))
}

fn degraded_notice(state: &AppState) -> Option<Element> {
    if state.degraded.is_empty() {
        return None;
    }
    Some(
        el("section").class("notice").children(state.degraded.iter().map(|failure| {
            el("p")
                .child(pill(failure.source.as_str(), Tone::Warn))
                .text(format!(" {}", failure.message))
        })),
    )
}

pub fn render_despacho(state: &AppState) -> Markup {
    let painel = panel_or_default(state);
    let mapa = state.mapa_operacional.clone().unwrap_or_default();

    let mut map_panel = el("section")
        .class("panel")
        .child(panel_header("Mapa operacional (DB real)", "/api/operacao/mapa"))
        .child(render_map(&mapa))
        .child(layer_summary(&painel));
    if let Some(warnings) = layer_warnings_box(&mapa) {
        map_panel = map_panel.child(warnings);
    }

    let grid = el("div")
        .class("panel-grid")
        .child(
            el("section")
                .class("panel")
                .child(panel_header("Eventos operacionais (DB real)", "/api/operacao/eventos"))
                .child(event_feed(&state.eventos_operacionais)),
        )
        .child(map_panel);

    let actions = el("section")
        .class("panel")
        .attr("style", "margin-top: 1rem;")
        .child(panel_header(
            "Acoes operacionais (API real)",
            "/api/eventos + /api/replanejamento/run",
        ))
        .child(
            el("div")
                .class("panel-grid")
                .child(
                    el("div")
                        .child(evento_form(state))
                        .child_if(result_box("Resposta evento", state.api_results.evento.as_ref())),
                )
                .child(
                    el("div")
                        .child(replan_form(state))
                        .child_if(result_box(
                            "Resposta replanejamento",
                            state.api_results.replanejamento.as_ref(),
                        ))
                        .child_if(result_box(
                            "Resposta rotas prontas",
                            state.api_results.iniciar_rota_pronta.as_ref(),
                        )),
                ),
        );

    let mut parts = Vec::new();
    if let Some(notice) = degraded_notice(state) {
        parts.push(notice);
    }
    parts.push(grid);
    parts.push(actions);
    state_shell(state, fragment(parts))
}

pub fn view_title(view: View) -> &'static str {
    match view {
        View::Pedidos => "Pedidos",
        View::Despacho => "Despacho",
        View::Entregador => "Entregador",
    }
}

/// Full document for the current operator view: title, API status pill,
/// metric cards and the view body.
pub fn render_document(state: &AppState, body: Markup, api_status: &ApiStatus) -> Markup {
    let title = view_title(state.view);
    let page = el("html")
        .attr("lang", "pt-BR")
        .child(
            el("head")
                .child(el("meta").attr("charset", "utf-8"))
                .child(el("title").text(format!("Agua Viva · {title}"))),
        )
        .child(
            el("body")
                .child(
                    el("header")
                        .child(el("h1").id("view-title").text(title))
                        .child(pill(&api_status.label, api_status.tone).id("api-status")),
                )
                .child(el("section").id("metrics").class("metrics").child(metrics(state)))
                .child(el("main").id("view-root").child(body)),
        );
    document(&page)
}

pub fn render_view(state: &AppState) -> Markup {
    match state.view {
        View::Despacho => render_despacho(state),
        _ => render_pedidos(state),
    }
}

#[cfg(test)]
#[path = "tests/pages_tests.rs"]
mod tests;
