use std::path::PathBuf;

use anyhow::{bail, Result};
use clap::{Parser, Subcommand, ValueEnum};
use client_core::{
    sanitize_base_url,
    settings::{load_settings, BaseUrlStore, Settings, SETTINGS_FILE},
    store::View,
};
use shared::scenario::Scenario;
use tracing_subscriber::EnvFilter;

mod commands;
mod session;

#[derive(Parser, Debug)]
#[command(name = "agua-viva", about = "Operator console for the Agua Viva dispatch backend")]
struct Cli {
    /// API base URL for this run; overrides the persisted one.
    #[arg(long, global = true)]
    api_base: Option<String>,
    /// Settings file (defaults to console.toml in the working directory).
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum ViewArg {
    Pedidos,
    Despacho,
}

impl From<ViewArg> for View {
    fn from(view: ViewArg) -> Self {
        match view {
            ViewArg::Pedidos => View::Pedidos,
            ViewArg::Despacho => View::Despacho,
        }
    }
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// GET /health
    Health,
    /// Registers an order from the example form plus `--campo nome=valor` overrides.
    Atendimento {
        #[arg(long = "campo", value_parser = parse_field)]
        campos: Vec<(String, String)>,
        #[arg(long)]
        idempotency_key: Option<String>,
    },
    /// Loads and normalizes an order timeline.
    Timeline {
        pedido_id: String,
        /// Degrade to the offline stand-in when the call fails.
        #[arg(long)]
        fallback: bool,
    },
    /// Posts an operational event built from `--campo` fields.
    Evento {
        #[arg(long = "campo", value_parser = parse_field)]
        campos: Vec<(String, String)>,
        /// Generate an externalEventId when none was given.
        #[arg(long)]
        gerar_id: bool,
    },
    /// POST /api/replanejamento/run
    Replanejar {
        #[arg(long)]
        debounce_segundos: Option<String>,
        #[arg(long)]
        limite_eventos: Option<String>,
    },
    /// Renders the attendant or dispatch page as HTML.
    Painel {
        #[arg(long, value_enum, default_value = "pedidos")]
        view: ViewArg,
        #[arg(long)]
        out: Option<PathBuf>,
        /// Also export the operational map as GeoJSON.
        #[arg(long)]
        geojson: Option<PathBuf>,
    },
    /// Shows a courier's roteiro, optionally rendered as HTML.
    Roteiro {
        entregador_id: String,
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// Starts the courier's active or planned route.
    IniciarRota { entregador_id: String },
    /// Starts the next ready route for a courier.
    RotaPronta { entregador_id: String },
    /// Re-renders a page on the refresh timer until Ctrl-C.
    Watch {
        #[arg(long, value_enum, default_value = "despacho")]
        view: ViewArg,
        #[arg(long)]
        out: PathBuf,
        /// Follow a courier's page instead.
        #[arg(long)]
        entregador_id: Option<String>,
    },
    /// Runs the guided end-to-end flow for one scenario.
    E2e {
        /// feliz, falha or cancelamento; overrides the form's scenario.
        #[arg(long)]
        scenario: Option<Scenario>,
        /// JSON form with the remaining run parameters.
        #[arg(long)]
        form: Option<PathBuf>,
    },
    /// Normalizes a phone number for lookup.
    Telefone { numero: String },
    /// Interactive attendant session on stdin: orders, phone trail and the
    /// handoff queue. Nothing is kept after it ends.
    Sessao,
    /// Persisted API base URL.
    Config {
        #[command(subcommand)]
        action: ConfigCommand,
    },
}

#[derive(Subcommand, Debug)]
pub enum ConfigCommand {
    Show,
    Set { url: String },
    Reset,
}

fn parse_field(raw: &str) -> Result<(String, String), String> {
    let (name, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("esperado nome=valor, recebido `{raw}`"))?;
    Ok((name.trim().to_string(), value.to_string()))
}

pub struct ConsoleContext {
    pub settings: Settings,
    /// `None` when the platform has no config directory.
    pub store: Option<BaseUrlStore>,
    pub base_url: String,
}

/// Settings load before the log filter is known; their warnings go through
/// a scoped stderr subscriber.
fn bootstrap_settings(cli: &Cli) -> Settings {
    let config_path = cli
        .config
        .clone()
        .unwrap_or_else(|| PathBuf::from(SETTINGS_FILE));
    let early = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new("warn"))
        .with_writer(std::io::stderr)
        .finish();
    let mut settings = tracing::subscriber::with_default(early, || load_settings(&config_path));
    if let Some(api_base) = cli.api_base.as_ref() {
        settings.api_base_url = Some(api_base.clone());
    }
    settings
}

fn build_context(settings: Settings, store: Option<BaseUrlStore>) -> Result<ConsoleContext> {
    let base_url = match store.as_ref() {
        Some(store) => settings.resolve_base_url(store),
        None => {
            let explicit = settings
                .api_base_url
                .as_deref()
                .map(sanitize_base_url)
                .filter(|url| !url.is_empty());
            match explicit {
                Some(url) => url,
                None => bail!("no config directory for the base URL store; pass --api-base"),
            }
        }
    };
    Ok(ConsoleContext {
        settings,
        store,
        base_url,
    })
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let settings = bootstrap_settings(&cli);

    let filter = EnvFilter::try_new(&settings.log_filter).unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let store = match BaseUrlStore::open_default() {
        Ok(store) => Some(store),
        Err(err) => {
            tracing::warn!(error = %err, "base URL store unavailable");
            None
        }
    };
    let ctx = build_context(settings, store)?;
    commands::run(ctx, cli.command).await
}
