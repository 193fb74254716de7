//! Courier (entregador) view: roteiro summary, stop tables and the outcome
//! of the last event sent from this screen.

use client_core::{
    courier::{CourierState, EventOutcome, AWAITING_ACTION},
    store::Tone,
};
use shared::{
    domain::EventType,
    protocol::{CourierRoster, RosterStop},
};

use crate::{
    components::{number_input, panel_header, pill, pretty_json, select, text_input},
    html::{el, fragment, Element, Markup},
};

const COURIER_EVENTS: [EventType; 3] = [
    EventType::PedidoEntregue,
    EventType::PedidoFalhou,
    EventType::PedidoCancelado,
];

pub fn roteiro_badge(roteiro: Option<&CourierRoster>) -> Element {
    let Some(roteiro) = roteiro else {
        return pill("sem dados", Tone::Warn).id("roteiro-badge");
    };
    let Some(rota) = roteiro.rota.as_ref() else {
        return pill("sem rota", Tone::Warn).id("roteiro-badge");
    };
    let status = rota.status.as_deref().unwrap_or_default().to_uppercase();
    let tone = if status == "EM_ANDAMENTO" { Tone::Ok } else { Tone::Info };
    pill(&format!("rota {}", status.to_lowercase()), tone).id("roteiro-badge")
}

fn labelled(label: &str, value: impl Into<String>) -> Element {
    el("p")
        .child(el("strong").text(format!("{label}:")))
        .text(format!(" {}", value.into()))
}

fn roteiro_summary(roteiro: Option<&CourierRoster>) -> Markup {
    let Some(roteiro) = roteiro else {
        return el("p").text("Nenhum roteiro carregado.").render();
    };
    let middle = match roteiro.rota.as_ref() {
        None => el("p").text("Sem rota ativa/planejada para hoje."),
        Some(rota) => labelled(
            "Rota",
            format!(
                "#{} ({})",
                rota.rota_id,
                rota.status.as_deref().unwrap_or_default().to_uppercase()
            ),
        ),
    };
    fragment([
        labelled("Entregador", roteiro.entregador_id.to_string()),
        middle,
        labelled("Carga remanescente", roteiro.carga_remanescente.to_string()),
    ])
}

pub fn stops_table(title: &str, paradas: &[RosterStop]) -> Element {
    let heading = el("p").child(el("strong").text(title));
    if paradas.is_empty() {
        return el("div")
            .class("result-box")
            .child(heading)
            .child(el("p").text("Nenhuma parada."));
    }
    let rows = paradas.iter().map(|parada| {
        el("tr")
            .child(el("td").class("mono").text(parada.entrega_id.to_string()))
            .child(el("td").class("mono").text(parada.pedido_id.to_string()))
            .child(el("td").text(parada.cliente_nome.as_deref().unwrap_or_default()))
            .child(el("td").text(parada.status.as_deref().unwrap_or_default()))
            .child(el("td").text(parada.quantidade_galoes.to_string()))
    });
    el("div").class("result-box").child(heading).child(
        el("table")
            .child(
                el("thead").child(
                    el("tr").children(
                        ["Entrega", "Pedido", "Cliente", "Status", "Galoes"]
                            .into_iter()
                            .map(|h| el("th").text(h)),
                    ),
                ),
            )
            .child(el("tbody").children(rows)),
    )
}

pub fn event_result(outcome: Option<&EventOutcome>) -> Markup {
    let Some(outcome) = outcome else {
        return el("p").text(AWAITING_ACTION).render();
    };
    let (label, tone) = if outcome.ok { ("ok", Tone::Ok) } else { ("erro", Tone::Danger) };
    let payload = outcome
        .payload
        .as_ref()
        .map(|payload| el("pre").class("mono").text(pretty_json(payload)));
    let mut parts = vec![
        el("p").child(pill(label, tone)),
        el("p").text(outcome.message.as_str()),
    ];
    parts.extend(payload);
    fragment(parts)
}

fn courier_forms(state: &CourierState) -> Element {
    let event_types: Vec<&str> = COURIER_EVENTS.iter().map(|t| t.as_str()).collect();
    let has_route = state.roteiro.as_ref().and_then(CourierRoster::route_id).is_some();
    el("div")
        .child(
            el("form")
                .id("entregador-form")
                .class("form-grid")
                .child(number_input(
                    "entregadorId",
                    "entregadorId",
                    "Entregador ID",
                    &state.entregador_id.to_string(),
                    1,
                ))
                .child(el("button").class("btn").attr("type", "submit").text("Carregar roteiro")),
        )
        .child(
            el("button")
                .id("iniciar-rota")
                .class("btn")
                .attr("type", "button")
                .flag("disabled", !has_route)
                .text("Iniciar rota"),
        )
        .child(
            el("form")
                .id("evento-entregador-form")
                .class("form-grid")
                .child(select(
                    "eventoTipo",
                    "eventType",
                    "Evento",
                    &event_types,
                    EventType::PedidoEntregue.as_str(),
                ))
                .child(number_input("eventoEntregaId", "entregaId", "Entrega ID", "", 1))
                .child(text_input("eventoMotivo", "motivo", "Motivo (falha/cancelamento)", ""))
                .child(number_input(
                    "eventoCobranca",
                    "cobrancaCancelamentoCentavos",
                    "Cobranca cancelamento (centavos)",
                    "",
                    0,
                ))
                .child(el("button").class("btn").attr("type", "submit").text("Enviar evento")),
        )
}

pub fn render_courier(state: &CourierState) -> Markup {
    let roteiro = state.roteiro.as_ref();
    let (pendentes, concluidas) = match roteiro {
        Some(roteiro) if roteiro.rota.is_some() => (
            Some(stops_table("Paradas pendentes/em execucao", &roteiro.paradas_pendentes_execucao)),
            Some(stops_table("Paradas concluidas", &roteiro.paradas_concluidas)),
        ),
        _ => (None, None),
    };
    let status = state.api.status(client_core::refresh::COURIER_REFRESH);

    fragment([
        el("header")
            .class("panel-header")
            .child(el("h1").text("Entregador"))
            .child(pill(&status.label, status.tone).id("api-status")),
        el("div")
            .class("panel-grid")
            .child(
                el("section")
                    .class("panel")
                    .child(
                        el("div")
                            .class("panel-header")
                            .child(el("h3").text("Roteiro do dia"))
                            .child(roteiro_badge(roteiro)),
                    )
                    .child(el("div").id("roteiro-summary").child(roteiro_summary(roteiro)))
                    .child(el("div").id("roteiro-pendentes").child_if(pendentes))
                    .child(el("div").id("roteiro-concluidas").child_if(concluidas)),
            )
            .child(
                el("section")
                    .class("panel")
                    .child(panel_header("Acoes do entregador", "/api/eventos"))
                    .child(courier_forms(state))
                    .child(
                        el("div")
                            .id("evento-result")
                            .class("result-box")
                            .child(event_result(state.last_evento.as_ref())),
                    ),
            ),
    ])
}

#[cfg(test)]
#[path = "tests/courier_tests.rs"]
mod tests;
