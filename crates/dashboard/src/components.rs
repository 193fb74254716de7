//! Building blocks shared by every page.

use client_core::{
    orchestrator::{GuidedRun, RunState},
    store::{AppState, Mode, ResultBox, Tone},
};
use serde_json::Value;
use shared::protocol::OperationalPanel;

use crate::html::{el, Element, Markup};

pub fn tone_for_order_status(status: &str) -> Tone {
    match status.to_uppercase().as_str() {
        "ENTREGUE" => Tone::Ok,
        "CANCELADO" | "FALHOU" => Tone::Danger,
        "EM_ROTA" | "PENDENTE" | "CONFIRMADO" => Tone::Warn,
        _ => Tone::Info,
    }
}

pub fn tone_for_run(state: RunState) -> Tone {
    match state {
        RunState::Sucesso => Tone::Ok,
        RunState::Executando => Tone::Info,
        RunState::Erro => Tone::Danger,
    }
}

pub fn pill(label: &str, tone: Tone) -> Element {
    el("span").class(format!("pill {}", tone.as_str())).text(label)
}

/// Upper-cased status with its tone; blank renders as `-`.
pub fn status_pill(status: &str) -> Element {
    let normalized = status.trim().to_uppercase();
    let tone = tone_for_order_status(&normalized);
    let label = if normalized.is_empty() { "-" } else { normalized.as_str() };
    pill(label, tone)
}

pub fn pretty_json(value: &Value) -> String {
    serde_json::to_string_pretty(value).unwrap_or_else(|_| value.to_string())
}

/// Nothing is rendered before the first call.
pub fn result_box(title: &str, result: Option<&ResultBox>) -> Option<Element> {
    let result = result?;
    Some(
        el("div")
            .class("result-box")
            .child(
                el("p")
                    .child(el("strong").text(title))
                    .text(" · ")
                    .child(pill(&result.source, Tone::Ok)),
            )
            .child(el("pre").class("mono").text(pretty_json(&result.payload))),
    )
}

pub fn guided_run_box(run: Option<&GuidedRun>) -> Option<Element> {
    let run = run?;
    let steps = run.steps.iter().map(|step| {
        let tone = if step.ok { Tone::Ok } else { Tone::Danger };
        let detail = (!step.detail.is_empty())
            .then(|| el("p").class("mono e2e-detail").text(step.detail.as_str()));
        el("li")
            .class("e2e-step")
            .child(pill(if step.ok { "OK" } else { "FALHA" }, tone))
            .text(" ")
            .child(el("strong").text(step.title.as_str()))
            .child_if(detail)
    });

    let summary = run.summary();
    Some(
        el("div")
            .class("result-box")
            .child(
                el("p")
                    .child(el("strong").text("Fluxo guiado E2E"))
                    .text(" · ")
                    .child(pill(run.state.as_str(), tone_for_run(run.state))),
            )
            .child_if((!summary.is_empty()).then(|| el("p").class("mono").text(summary)))
            .child_if(run.error.as_deref().map(|error| el("p").class("mono").text(error)))
            .child(el("ul").class("e2e-steps").children(steps)),
    )
}

pub fn panel_or_default(state: &AppState) -> OperationalPanel {
    state.painel.clone().unwrap_or_default()
}

pub fn metrics(state: &AppState) -> Markup {
    let painel = panel_or_default(state);
    let counts = &painel.pedidos_por_status;
    let cards = [
        ("Pendentes", counts.pendente.to_string()),
        ("Confirmados", counts.confirmado.to_string()),
        ("Em rota", counts.em_rota.to_string()),
        ("API", if state.api.connected { "online" } else { "offline" }.to_string()),
        (
            "Ambiente",
            if painel.ambiente.is_empty() { "-".to_string() } else { painel.ambiente.clone() },
        ),
    ];
    crate::html::fragment(cards.into_iter().enumerate().map(|(idx, (label, value))| {
        el("article")
            .class("metric-card")
            .attr("style", format!("animation-delay:{}ms", idx * 70))
            .child(el("p").class("metric-label").text(label))
            .child(el("p").class("metric-value").text(value))
    }))
}

/// Wraps page content: the empty and error modes replace it with a notice
/// carrying a restore action.
pub fn state_shell(state: &AppState, content: Markup) -> Markup {
    match state.mode {
        Mode::Success => content,
        Mode::Empty => el("section")
            .class("empty-state")
            .child(el("h3").text("Sem dados no momento"))
            .child(el("p").text("Nenhum registro foi encontrado para os filtros ativos."))
            .child(restore_button("Voltar para success"))
            .render(),
        Mode::Error => {
            let detail = state
                .error_detail
                .as_deref()
                .or(state.api.last_error.as_deref())
                .map(|detail| el("p").class("mono").text(detail));
            el("section")
                .class("notice error")
                .child(el("h3").text("Falha ao carregar dados reais"))
                .child(el("p").text("O painel operacional usa somente dados da API. Nao ha fallback/mock."))
                .child_if(detail)
                .child(restore_button("Tentar novamente"))
                .render()
        }
    }
}

fn restore_button(label: &str) -> Element {
    el("button").class("btn").flag("data-mode-restore", true).text(label)
}

pub fn panel_header(title: &str, endpoint: &str) -> Element {
    el("div")
        .class("panel-header")
        .child(el("h3").text(title))
        .child(pill(endpoint, Tone::Info))
}

pub fn text_input(id: &str, name: &str, label: &str, value: &str) -> Element {
    el("div")
        .class("form-row")
        .child(el("label").attr("for", id).text(label))
        .child(el("input").id(id).attr("name", name).attr("value", value))
}

pub fn number_input(id: &str, name: &str, label: &str, value: &str, min: i64) -> Element {
    el("div")
        .class("form-row")
        .child(el("label").attr("for", id).text(label))
        .child(
            el("input")
                .id(id)
                .attr("name", name)
                .attr("type", "number")
                .attr("min", min.to_string())
                .attr("value", value),
        )
}

pub fn select(id: &str, name: &str, label: &str, options: &[&str], selected: &str) -> Element {
    el("div")
        .class("form-row")
        .child(el("label").attr("for", id).text(label))
        .child(el("select").id(id).attr("name", name).children(options.iter().map(|option| {
            el("option")
                .attr("value", *option)
                .flag("selected", *option == selected)
                .text(*option)
        })))
}

pub fn two_columns(left: Element, right: Element) -> Element {
    el("div").class("form-row two").child(left).child(right)
}
