use std::{
    fs,
    io,
    path::{Path, PathBuf},
    sync::Arc,
    time::Duration,
};

use anyhow::{anyhow, bail, Context, Result};
use chrono::Utc;
use client_core::{
    courier::CourierState,
    fetch_timeline, fetch_timeline_with_fallback,
    orchestrator::{run_guided_flow_with_progress, GuidedRunForm, RunState, RunStep},
    read_models::fetch_read_models,
    refresh::RefreshScheduler,
    store::{reduce, Action, AppState, Examples},
    DispatchApi, DispatchClient,
};
use serde::Serialize;
use shared::{
    domain::{CourierId, OrderId},
    events::{build_event_payload, build_replan_request, ensure_external_event_id},
    form::parse_positive,
    intake::build_atendimento_payload,
    paths::PathError,
    scenario::Scenario,
};
use tokio::{
    io::BufReader,
    sync::{mpsc, watch, Mutex},
};
use tracing::{info, warn};

use crate::{
    session::{AttendantSession, HELP},
    Command, ConfigCommand, ConsoleContext, ViewArg,
};

pub async fn run(ctx: ConsoleContext, command: Command) -> Result<()> {
    match command {
        Command::Health => {
            let health = client(&ctx)?.health().await?;
            println!("{} -> {}", ctx.base_url, health.status);
            Ok(())
        }
        Command::Atendimento {
            campos,
            idempotency_key,
        } => atendimento(&ctx, campos, idempotency_key).await,
        Command::Timeline { pedido_id, fallback } => timeline(&ctx, &pedido_id, fallback).await,
        Command::Evento { campos, gerar_id } => evento(&ctx, campos, gerar_id).await,
        Command::Replanejar {
            debounce_segundos,
            limite_eventos,
        } => replanejar(&ctx, debounce_segundos, limite_eventos).await,
        Command::Painel { view, out, geojson } => painel(&ctx, view, out, geojson).await,
        Command::Roteiro { entregador_id, out } => roteiro(&ctx, &entregador_id, out).await,
        Command::IniciarRota { entregador_id } => iniciar_rota(&ctx, &entregador_id).await,
        Command::RotaPronta { entregador_id } => {
            let id = courier_id(&entregador_id)?;
            let payload = client(&ctx)?.start_ready_route(id).await?;
            print_json(&payload)
        }
        Command::Watch {
            view,
            out,
            entregador_id,
        } => match entregador_id {
            Some(raw) => watch_courier(&ctx, &raw, out).await,
            None => watch_operations(&ctx, view, out).await,
        },
        Command::E2e { scenario, form } => e2e(&ctx, scenario, form).await,
        Command::Telefone { numero } => telefone(&numero),
        Command::Sessao => sessao(&ctx).await,
        Command::Config { action } => config(&ctx, action),
    }
}

fn client(ctx: &ConsoleContext) -> Result<DispatchClient> {
    DispatchClient::new(&ctx.base_url).with_context(|| format!("invalid API base {}", ctx.base_url))
}

fn examples(ctx: &ConsoleContext) -> Result<Examples> {
    match ctx.settings.examples_path.as_deref() {
        Some(path) => Ok(Examples::load(path)?),
        None => Ok(Examples::default()),
    }
}

fn print_json(value: &impl Serialize) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn emit(out: Option<&Path>, content: &str) -> Result<()> {
    match out {
        Some(path) => {
            fs::write(path, content).with_context(|| format!("failed to write {}", path.display()))?;
            info!(path = %path.display(), bytes = content.len(), "page written");
            Ok(())
        }
        None => {
            println!("{content}");
            Ok(())
        }
    }
}

fn order_id(raw: &str) -> Result<OrderId> {
    Ok(parse_positive(raw).map(OrderId).ok_or(PathError::InvalidOrderId)?)
}

fn courier_id(raw: &str) -> Result<CourierId> {
    Ok(parse_positive(raw)
        .map(CourierId)
        .ok_or(PathError::InvalidCourierId)?)
}

fn apply_fields(
    fields: Vec<(String, String)>,
    mut set: impl FnMut(&str, String) -> bool,
) -> Result<()> {
    for (name, value) in fields {
        if !set(&name, value) {
            bail!("campo desconhecido: {name}");
        }
    }
    Ok(())
}

async fn atendimento(
    ctx: &ConsoleContext,
    campos: Vec<(String, String)>,
    idempotency_key: Option<String>,
) -> Result<()> {
    let mut form = examples(ctx)?.atendimento_request;
    apply_fields(campos, |name, value| form.set(name, value))?;
    let payload = build_atendimento_payload(&form)?;
    let response = client(ctx)?
        .create_atendimento(&payload, idempotency_key.as_deref())
        .await?;
    info!(pedido_id = ?response.pedido_id, idempotente = response.idempotente, "order registered");
    print_json(&response)
}

async fn timeline(ctx: &ConsoleContext, raw: &str, fallback: bool) -> Result<()> {
    let pedido_id = order_id(raw)?;
    let api = client(ctx)?;
    if fallback {
        let fetch = fetch_timeline_with_fallback(&api, pedido_id).await?;
        if let Some(error) = fetch.error.as_deref() {
            eprintln!("timeline indisponivel, exibindo fallback: {error}");
        }
        print_json(&fetch.timeline)
    } else {
        let timeline = fetch_timeline(&api, pedido_id).await?;
        println!("status: {}", timeline.status_label());
        print_json(&timeline)
    }
}

async fn evento(ctx: &ConsoleContext, campos: Vec<(String, String)>, gerar_id: bool) -> Result<()> {
    let mut form = examples(ctx)?.evento_request;
    apply_fields(campos, |name, value| form.set(name, value))?;
    let mut payload = build_event_payload(&form)?;
    if gerar_id {
        let id = ensure_external_event_id(&mut payload);
        info!(external_event_id = id, "external event id set");
    }
    let result = client(ctx)?.post_event(&payload).await?;
    print_json(&result)
}

async fn replanejar(
    ctx: &ConsoleContext,
    debounce_segundos: Option<String>,
    limite_eventos: Option<String>,
) -> Result<()> {
    let mut form = examples(ctx)?.replanejamento_request;
    if let Some(debounce) = debounce_segundos {
        form.debounce_segundos = debounce;
    }
    if let Some(limite) = limite_eventos {
        form.limite_eventos = limite;
    }
    let request = build_replan_request(&form)?;
    let result = client(ctx)?.replan(&request).await?;
    print_json(&result)
}

pub(crate) async fn refresh_state(api: &dyn DispatchApi, state: &mut AppState, limit: u32) {
    match fetch_read_models(api, limit).await {
        Ok(models) => reduce(state, Action::ReadModelsLoaded { models, at: Utc::now() }),
        Err(err) => reduce(
            state,
            Action::ApiFailed {
                message: err.to_string(),
                at: Utc::now(),
            },
        ),
    }
}

pub(crate) fn render_page(state: &AppState, period: Duration) -> String {
    let status = state.api.status(period);
    dashboard::render_document(state, dashboard::render_view(state), &status).into_string()
}

fn operations_state(ctx: &ConsoleContext, view: ViewArg) -> Result<AppState> {
    let mut state = AppState::new(ctx.base_url.clone());
    reduce(&mut state, Action::ExamplesLoaded(examples(ctx)?));
    reduce(&mut state, Action::SetView(view.into()));
    Ok(state)
}

async fn painel(
    ctx: &ConsoleContext,
    view: ViewArg,
    out: Option<PathBuf>,
    geojson: Option<PathBuf>,
) -> Result<()> {
    let api = client(ctx)?;
    let mut state = operations_state(ctx, view)?;
    refresh_state(&api, &mut state, ctx.settings.event_feed_limit).await;
    emit(out.as_deref(), &render_page(&state, ctx.settings.refresh_period()))?;

    if let Some(path) = geojson {
        let mapa = state.mapa_operacional.clone().unwrap_or_default();
        let collection = serde_json::to_string_pretty(&dashboard::map::geojson(&mapa))?;
        fs::write(&path, collection).with_context(|| format!("failed to write {}", path.display()))?;
    }
    if let Some(error) = state.api.last_error.as_deref() {
        bail!("API indisponivel: {error}");
    }
    Ok(())
}

async fn roteiro(ctx: &ConsoleContext, raw: &str, out: Option<PathBuf>) -> Result<()> {
    let api = client(ctx)?;
    let mut courier = CourierState::new(ctx.base_url.clone());
    courier.select_courier(raw)?;
    courier.load_roteiro(&api).await;
    if let Some(path) = out.as_deref() {
        emit(Some(path), &dashboard::render_courier(&courier).into_string())?;
    }
    match courier.roteiro.as_ref() {
        Some(roteiro) => print_json(roteiro),
        None => Err(anyhow!(courier
            .api
            .last_error
            .clone()
            .unwrap_or_else(|| "roteiro indisponivel".to_string()))),
    }
}

async fn iniciar_rota(ctx: &ConsoleContext, raw: &str) -> Result<()> {
    let api = client(ctx)?;
    let mut courier = CourierState::new(ctx.base_url.clone());
    courier.select_courier(raw)?;
    courier.load_roteiro(&api).await;
    let outcome = courier.start_route(&api).await.clone();
    println!("{}", outcome.message);
    if let Some(payload) = outcome.payload.as_ref() {
        print_json(payload)?;
    }
    if !outcome.ok {
        bail!(outcome.message);
    }
    Ok(())
}

async fn wait_for_shutdown(visible: watch::Sender<bool>) {
    if let Err(err) = tokio::signal::ctrl_c().await {
        warn!(error = %err, "ctrl-c handler unavailable");
    }
    let _ = visible.send(false);
}

async fn watch_operations(ctx: &ConsoleContext, view: ViewArg, out: PathBuf) -> Result<()> {
    let api = Arc::new(client(ctx)?);
    let state = Arc::new(Mutex::new(operations_state(ctx, view)?));
    let period = ctx.settings.refresh_period();
    let limit = ctx.settings.event_feed_limit;
    let scheduler = RefreshScheduler::new(period);

    let refresh = {
        let api = Arc::clone(&api);
        let state = Arc::clone(&state);
        let out = out.clone();
        move || {
            let api = Arc::clone(&api);
            let state = Arc::clone(&state);
            let out = out.clone();
            async move {
                let mut state = state.lock().await;
                refresh_state(api.as_ref(), &mut state, limit).await;
                if let Err(err) = emit(Some(&out), &render_page(&state, period)) {
                    warn!(error = %err, "page not written");
                }
            }
        }
    };

    scheduler.guard().run(refresh()).await;
    let (visible_tx, visible_rx) = watch::channel(true);
    let handle = scheduler.start(visible_rx, refresh);
    info!(path = %out.display(), period_s = period.as_secs(), "watching operations");
    wait_for_shutdown(visible_tx).await;
    handle.stop().await;
    Ok(())
}

async fn watch_courier(ctx: &ConsoleContext, raw: &str, out: PathBuf) -> Result<()> {
    let api = Arc::new(client(ctx)?);
    let mut courier = CourierState::new(ctx.base_url.clone());
    courier.select_courier(raw)?;
    let courier = Arc::new(Mutex::new(courier));
    let period = ctx.settings.courier_refresh_period();
    let scheduler = RefreshScheduler::new(period);

    let refresh = {
        let api = Arc::clone(&api);
        let courier = Arc::clone(&courier);
        let out = out.clone();
        move || {
            let api = Arc::clone(&api);
            let courier = Arc::clone(&courier);
            let out = out.clone();
            async move {
                let mut courier = courier.lock().await;
                courier.load_roteiro(api.as_ref()).await;
                if let Err(err) = emit(Some(&out), &dashboard::render_courier(&courier).into_string()) {
                    warn!(error = %err, "page not written");
                }
            }
        }
    };

    scheduler.guard().run(refresh()).await;
    let (visible_tx, visible_rx) = watch::channel(true);
    let handle = scheduler.start(visible_rx, refresh);
    info!(path = %out.display(), period_s = period.as_secs(), "watching courier");
    wait_for_shutdown(visible_tx).await;
    handle.stop().await;
    Ok(())
}

fn print_step(step: &RunStep) {
    let mark = if step.ok { "OK" } else { "FALHA" };
    if step.detail.is_empty() {
        println!("[{mark}] {}", step.title);
    } else {
        println!("[{mark}] {} · {}", step.title, step.detail);
    }
}

async fn e2e(ctx: &ConsoleContext, scenario: Option<Scenario>, form_path: Option<PathBuf>) -> Result<()> {
    let mut form = match form_path.as_deref() {
        Some(path) => {
            let raw = fs::read_to_string(path)
                .with_context(|| format!("failed to read {}", path.display()))?;
            serde_json::from_str::<GuidedRunForm>(&raw)
                .with_context(|| format!("invalid run form {}", path.display()))?
        }
        None => GuidedRunForm::default(),
    };
    if let Some(scenario) = scenario {
        form.scenario = scenario;
    }

    let api = client(ctx)?;
    let (tx, mut rx) = mpsc::unbounded_channel::<RunStep>();
    let printer = tokio::spawn(async move {
        while let Some(step) = rx.recv().await {
            print_step(&step);
        }
    });
    let run = run_guided_flow_with_progress(&api, &form, Some(&tx)).await;
    drop(tx);
    printer.await?;

    println!("{}", run.summary());
    match run.state {
        RunState::Sucesso => Ok(()),
        _ => Err(anyhow!(run.error.unwrap_or_else(|| "fluxo guiado falhou".to_string()))),
    }
}

fn telefone(numero: &str) -> Result<()> {
    let mut state = AppState::default();
    reduce(
        &mut state,
        Action::PhoneSearched {
            raw: numero.to_string(),
            at: Utc::now(),
        },
    );
    if state.atendente.busca_telefone.telefone_normalizado.is_empty() {
        bail!("telefone sem digitos");
    }
    print_json(&state.atendente.busca_telefone)
}

async fn sessao(ctx: &ConsoleContext) -> Result<()> {
    let api = client(ctx)?;
    let state = operations_state(ctx, ViewArg::Pedidos)?;
    let mut session = AttendantSession::new(
        &api,
        state,
        ctx.settings.event_feed_limit,
        ctx.settings.refresh_period(),
    );
    eprintln!("{HELP}");
    session
        .run(BufReader::new(tokio::io::stdin()), &mut io::stdout())
        .await?;
    info!(
        atendimentos = session.state().handoff.atendimentos_sessao.len(),
        "session closed"
    );
    Ok(())
}

fn config(ctx: &ConsoleContext, action: ConfigCommand) -> Result<()> {
    let store = ctx
        .store
        .as_ref()
        .ok_or_else(|| anyhow!("no config directory for the base URL store"))?;
    match action {
        ConfigCommand::Show => {
            println!("api base: {}", ctx.base_url);
            println!("armazenado em: {}", store.path().display());
            print_json(&ctx.settings)
        }
        ConfigCommand::Set { url } => {
            if !store.persist(&url)? {
                bail!("URL da API vazia");
            }
            println!("api base: {}", store.read());
            Ok(())
        }
        ConfigCommand::Reset => {
            store.clear()?;
            println!("api base: {}", store.read());
            Ok(())
        }
    }
}
