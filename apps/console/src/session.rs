//! Interactive attendant session on stdin. The handoff queue and phone trail
//! live in this loop's `AppState` and are gone when it ends.

use std::{fs, io::Write, path::PathBuf, time::Duration};

use anyhow::{bail, Context, Result};
use chrono::Utc;
use clap::ValueEnum;
use client_core::{
    session::{normalize_phone, HandoffQueue},
    store::{reduce, Action, AppState, HandoffAction},
    DispatchApi,
};
use serde::Serialize;
use shared::{domain::OrderId, form::parse_positive, intake::build_atendimento_payload};
use tokio::io::{AsyncBufRead, AsyncBufReadExt};

use crate::{
    commands::{refresh_state, render_page},
    parse_field, ViewArg,
};

pub const HELP: &str = "comandos: atendimento nome=valor..., telefone <numero>, \
subir|descer|focar|remover <pedidoId>, fila, limpar, painel <pedidos|despacho> <arquivo>, sair";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionLine {
    Atendimento(Vec<(String, String)>),
    Telefone(String),
    Handoff(HandoffAction),
    Fila,
    Limpar,
    Painel { view: ViewArg, out: PathBuf },
    Ajuda,
    Sair,
}

/// `Ok(None)` for a blank line.
pub fn parse_line(line: &str) -> Result<Option<SessionLine>, String> {
    let mut words = line.split_whitespace();
    let Some(command) = words.next() else {
        return Ok(None);
    };
    let rest: Vec<&str> = words.collect();
    let pedido = || {
        rest.first()
            .and_then(|raw| parse_positive(raw))
            .map(OrderId)
            .ok_or_else(|| format!("{command}: informe um pedidoId positivo"))
    };

    let parsed = match command {
        "atendimento" => SessionLine::Atendimento(
            rest.iter()
                .map(|field| parse_field(field))
                .collect::<Result<_, _>>()?,
        ),
        "telefone" => {
            if rest.is_empty() {
                return Err("telefone: informe o numero".to_string());
            }
            SessionLine::Telefone(rest.join(" "))
        }
        "subir" => SessionLine::Handoff(HandoffAction::MoveUp(pedido()?)),
        "descer" => SessionLine::Handoff(HandoffAction::MoveDown(pedido()?)),
        "focar" => SessionLine::Handoff(HandoffAction::Focus(pedido()?)),
        "remover" => SessionLine::Handoff(HandoffAction::Remove(pedido()?)),
        "fila" => SessionLine::Fila,
        "limpar" => SessionLine::Limpar,
        "painel" => match rest.as_slice() {
            [view, out] => SessionLine::Painel {
                view: ViewArg::from_str(view, true)?,
                out: PathBuf::from(out),
            },
            _ => return Err("uso: painel <pedidos|despacho> <arquivo>".to_string()),
        },
        "ajuda" | "?" => SessionLine::Ajuda,
        "sair" | "exit" => SessionLine::Sair,
        other => return Err(format!("comando desconhecido: {other}")),
    };
    Ok(Some(parsed))
}

fn write_json(out: &mut impl Write, value: &impl Serialize) -> Result<()> {
    writeln!(out, "{}", serde_json::to_string_pretty(value)?)?;
    Ok(())
}

pub struct AttendantSession<'a> {
    api: &'a dyn DispatchApi,
    state: AppState,
    feed_limit: u32,
    refresh: Duration,
}

impl<'a> AttendantSession<'a> {
    pub fn new(api: &'a dyn DispatchApi, state: AppState, feed_limit: u32, refresh: Duration) -> Self {
        Self {
            api,
            state,
            feed_limit,
            refresh,
        }
    }

    pub fn state(&self) -> &AppState {
        &self.state
    }

    /// Returns `false` once the session should end.
    pub async fn apply(&mut self, line: SessionLine, out: &mut impl Write) -> Result<bool> {
        match line {
            SessionLine::Atendimento(fields) => {
                let mut form = self.state.examples.atendimento_request.clone();
                for (name, value) in fields {
                    if !form.set(&name, value) {
                        bail!("campo desconhecido: {name}");
                    }
                }
                let payload = build_atendimento_payload(&form)?;
                let response = self.api.create_atendimento(&payload, None).await?;
                match response.order_id() {
                    Some(id) => writeln!(out, "pedido #{id} registrado")?,
                    None => writeln!(out, "atendimento sem pedidoId na resposta")?,
                }
                reduce(
                    &mut self.state,
                    Action::AtendimentoCreated {
                        payload,
                        response,
                        at: Utc::now(),
                    },
                );
                write_json(out, &self.state.handoff)?;
            }
            SessionLine::Telefone(raw) => {
                if normalize_phone(&raw).is_empty() {
                    bail!("telefone sem digitos");
                }
                reduce(&mut self.state, Action::PhoneSearched { raw, at: Utc::now() });
                write_json(out, &self.state.atendente)?;
            }
            SessionLine::Handoff(action) => {
                reduce(&mut self.state, Action::Handoff(action));
                write_json(out, &self.state.handoff)?;
            }
            SessionLine::Fila => write_json(out, &self.state.handoff)?,
            SessionLine::Limpar => {
                self.state.handoff = HandoffQueue::default();
                self.state.atendente.clear();
                writeln!(out, "sessao limpa")?;
            }
            SessionLine::Painel { view, out: path } => {
                reduce(&mut self.state, Action::SetView(view.into()));
                refresh_state(self.api, &mut self.state, self.feed_limit).await;
                fs::write(&path, render_page(&self.state, self.refresh))
                    .with_context(|| format!("failed to write {}", path.display()))?;
                writeln!(out, "painel gravado em {}", path.display())?;
            }
            SessionLine::Ajuda => writeln!(out, "{HELP}")?,
            SessionLine::Sair => return Ok(false),
        }
        Ok(true)
    }

    /// Reads commands until `sair` or end of input. A bad line is reported
    /// and the loop goes on.
    pub async fn run<R>(&mut self, input: R, out: &mut impl Write) -> Result<()>
    where
        R: AsyncBufRead + Unpin,
    {
        let mut lines = input.lines();
        while let Some(line) = lines.next_line().await? {
            let command = match parse_line(&line) {
                Ok(Some(command)) => command,
                Ok(None) => continue,
                Err(message) => {
                    writeln!(out, "erro: {message}")?;
                    continue;
                }
            };
            match self.apply(command, out).await {
                Ok(true) => {}
                Ok(false) => break,
                Err(err) => writeln!(out, "erro: {err:#}")?,
            }
        }
        Ok(())
    }
}
