use async_trait::async_trait;
use reqwest::{
    header::{HeaderMap, HeaderName, HeaderValue, CONTENT_TYPE},
    Client, Method,
};
use serde::{de::DeserializeOwned, Serialize};
use serde_json::{json, Value};
use shared::{
    domain::{CourierId, OrderId},
    error::ApiError,
    paths::{self, PathError},
    protocol::{
        AtendimentoPayload, AtendimentoResponse, CourierRoster, EventFeed, EventPayload,
        EventResult, ExecutionState, HealthStatus, OperationalMap, OperationalPanel, ReplanRequest,
        ReplanResult, StartReadyRouteRequest,
    },
    timeline::{fallback_timeline_payload, normalize_timeline, Timeline, TimelineError},
};
use thiserror::Error;
use tracing::{debug, warn};
use url::Url;

pub mod courier;
#[cfg(test)]
pub(crate) mod fake_api;
pub mod orchestrator;
pub mod read_models;
pub mod refresh;
pub mod session;
pub mod settings;
pub mod store;

pub const IDEMPOTENCY_KEY_HEADER: &str = "Idempotency-Key";

#[derive(Debug, Error)]
pub enum ApiRequestError {
    #[error(transparent)]
    Http(#[from] ApiError),
    #[error("falha de rede: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("resposta inesperada em {path}: {source}")]
    Decode {
        path: String,
        source: serde_json::Error,
    },
    #[error("corpo da requisicao invalido: {0}")]
    Encode(serde_json::Error),
    #[error("cabecalho invalido: {0}")]
    InvalidHeader(String),
    #[error("url base invalida: {0}")]
    InvalidBaseUrl(String),
    #[error(transparent)]
    Path(#[from] PathError),
    #[error(transparent)]
    Timeline(#[from] TimelineError),
}

impl ApiRequestError {
    pub fn status(&self) -> Option<u16> {
        match self {
            ApiRequestError::Http(err) => Some(err.status),
            ApiRequestError::Transport(err) => err.status().map(|status| status.as_u16()),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct RequestOptions {
    pub body: Option<Value>,
    pub headers: Vec<(String, String)>,
}

impl RequestOptions {
    pub fn json(body: impl Serialize) -> Result<Self, ApiRequestError> {
        Ok(Self {
            body: Some(serde_json::to_value(body).map_err(ApiRequestError::Encode)?),
            headers: Vec::new(),
        })
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ApiResponse {
    pub status: u16,
    pub payload: Value,
}

pub fn sanitize_base_url(raw: &str) -> String {
    raw.trim().trim_end_matches('/').to_string()
}

#[derive(Debug, Clone)]
pub struct DispatchClient {
    http: Client,
    base_url: String,
}

impl DispatchClient {
    pub fn new(base_url: &str) -> Result<Self, ApiRequestError> {
        Self::with_http(Client::new(), base_url)
    }

    pub fn with_http(http: Client, base_url: &str) -> Result<Self, ApiRequestError> {
        let base_url = sanitize_base_url(base_url);
        Url::parse(&base_url).map_err(|_| ApiRequestError::InvalidBaseUrl(base_url.clone()))?;
        Ok(Self { http, base_url })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Sends one request. Caller headers replace the JSON defaults. A body
    /// that is empty or not JSON reads as `{}`; a non-2xx status becomes
    /// [`ApiRequestError::Http`].
    pub async fn request_json(
        &self,
        method: Method,
        path: &str,
        options: RequestOptions,
    ) -> Result<ApiResponse, ApiRequestError> {
        let url = format!("{}{}", self.base_url, path);
        let mut request = self
            .http
            .request(method.clone(), &url)
            .headers(request_headers(&options.headers)?);
        if let Some(body) = &options.body {
            request = request.body(body.to_string());
        }

        let response = request.send().await?;
        let status = response.status().as_u16();
        let bytes = response.bytes().await?;
        let payload = serde_json::from_slice::<Value>(&bytes).unwrap_or_else(|_| json!({}));
        debug!(%method, path, status, "dispatch api call");

        if !(200..300).contains(&status) {
            let err = ApiError::from_response(status, payload);
            warn!(%method, path, status, error = %err.message, "dispatch api call failed");
            return Err(err.into());
        }
        Ok(ApiResponse { status, payload })
    }

    async fn get_typed<T: DeserializeOwned>(&self, path: &str) -> Result<T, ApiRequestError> {
        let response = self.request_json(Method::GET, path, RequestOptions::default()).await?;
        decode(path, response.payload)
    }

    async fn post_typed<B: Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, ApiRequestError> {
        let response = self
            .request_json(Method::POST, path, RequestOptions::json(body)?)
            .await?;
        decode(path, response.payload)
    }
}

fn request_headers(extra: &[(String, String)]) -> Result<HeaderMap, ApiRequestError> {
    let mut headers = HeaderMap::new();
    headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    for (name, value) in extra {
        let name = HeaderName::from_bytes(name.as_bytes())
            .map_err(|_| ApiRequestError::InvalidHeader(name.clone()))?;
        let value = HeaderValue::from_str(value)
            .map_err(|_| ApiRequestError::InvalidHeader(name.to_string()))?;
        headers.insert(name, value);
    }
    Ok(headers)
}

pub fn decode<T: DeserializeOwned>(path: &str, payload: Value) -> Result<T, ApiRequestError> {
    serde_json::from_value(payload).map_err(|source| ApiRequestError::Decode {
        path: path.to_string(),
        source,
    })
}

#[async_trait]
pub trait DispatchApi: Send + Sync {
    async fn health(&self) -> Result<HealthStatus, ApiRequestError>;
    async fn create_atendimento(
        &self,
        payload: &AtendimentoPayload,
        idempotency_key: Option<&str>,
    ) -> Result<AtendimentoResponse, ApiRequestError>;
    async fn execution(&self, pedido_id: OrderId) -> Result<ExecutionState, ApiRequestError>;
    async fn timeline(&self, pedido_id: OrderId) -> Result<Value, ApiRequestError>;
    async fn post_event(&self, payload: &EventPayload) -> Result<EventResult, ApiRequestError>;
    async fn replan(&self, request: &ReplanRequest) -> Result<ReplanResult, ApiRequestError>;
    async fn panel(&self) -> Result<OperationalPanel, ApiRequestError>;
    async fn event_feed(&self, limite: u32) -> Result<EventFeed, ApiRequestError>;
    async fn map(&self) -> Result<OperationalMap, ApiRequestError>;
    async fn roteiro(&self, entregador_id: CourierId) -> Result<CourierRoster, ApiRequestError>;
    async fn start_ready_route(&self, entregador_id: CourierId) -> Result<Value, ApiRequestError>;
}

#[async_trait]
impl DispatchApi for DispatchClient {
    async fn health(&self) -> Result<HealthStatus, ApiRequestError> {
        self.get_typed(paths::HEALTH).await
    }

    async fn create_atendimento(
        &self,
        payload: &AtendimentoPayload,
        idempotency_key: Option<&str>,
    ) -> Result<AtendimentoResponse, ApiRequestError> {
        let mut options = RequestOptions::json(payload)?;
        if let Some(key) = idempotency_key.map(str::trim).filter(|key| !key.is_empty()) {
            options = options.header(IDEMPOTENCY_KEY_HEADER, key);
        }
        let response = self
            .request_json(Method::POST, paths::ATENDIMENTO_PEDIDOS, options)
            .await?;
        decode(paths::ATENDIMENTO_PEDIDOS, response.payload)
    }

    async fn execution(&self, pedido_id: OrderId) -> Result<ExecutionState, ApiRequestError> {
        let path = paths::execucao_path(pedido_id.0)?;
        self.get_typed(&path).await
    }

    async fn timeline(&self, pedido_id: OrderId) -> Result<Value, ApiRequestError> {
        let path = paths::timeline_path(pedido_id.0)?;
        let response = self.request_json(Method::GET, &path, RequestOptions::default()).await?;
        Ok(response.payload)
    }

    async fn post_event(&self, payload: &EventPayload) -> Result<EventResult, ApiRequestError> {
        self.post_typed(paths::EVENTOS, payload).await
    }

    async fn replan(&self, request: &ReplanRequest) -> Result<ReplanResult, ApiRequestError> {
        self.post_typed(paths::REPLANEJAMENTO_RUN, request).await
    }

    async fn panel(&self) -> Result<OperationalPanel, ApiRequestError> {
        self.get_typed(paths::OPERACAO_PAINEL).await
    }

    async fn event_feed(&self, limite: u32) -> Result<EventFeed, ApiRequestError> {
        self.get_typed(&paths::operacao_eventos_path(limite)).await
    }

    async fn map(&self) -> Result<OperationalMap, ApiRequestError> {
        self.get_typed(paths::OPERACAO_MAPA).await
    }

    async fn roteiro(&self, entregador_id: CourierId) -> Result<CourierRoster, ApiRequestError> {
        let path = paths::roteiro_path(entregador_id.0)?;
        self.get_typed(&path).await
    }

    async fn start_ready_route(&self, entregador_id: CourierId) -> Result<Value, ApiRequestError> {
        let response = self
            .request_json(
                Method::POST,
                paths::ROTAS_PRONTAS_INICIAR,
                RequestOptions::json(StartReadyRouteRequest { entregador_id })?,
            )
            .await?;
        Ok(response.payload)
    }
}

pub async fn fetch_timeline(
    api: &dyn DispatchApi,
    pedido_id: OrderId,
) -> Result<Timeline, ApiRequestError> {
    let payload = api.timeline(pedido_id).await?;
    Ok(normalize_timeline(&payload)?)
}

#[derive(Debug, Clone, PartialEq)]
pub struct TimelineFetch {
    pub timeline: Timeline,
    pub fallback: bool,
    pub error: Option<String>,
}

/// Like [`fetch_timeline`], but a failed call degrades to the offline
/// stand-in payload instead of an error.
pub async fn fetch_timeline_with_fallback(
    api: &dyn DispatchApi,
    pedido_id: OrderId,
) -> Result<TimelineFetch, TimelineError> {
    match api.timeline(pedido_id).await {
        Ok(payload) => Ok(TimelineFetch {
            timeline: normalize_timeline(&payload)?,
            fallback: false,
            error: None,
        }),
        Err(err) => {
            warn!(pedido_id = pedido_id.0, error = %err, "timeline unavailable, using fallback");
            Ok(TimelineFetch {
                timeline: normalize_timeline(&fallback_timeline_payload(pedido_id))?,
                fallback: true,
                error: Some(err.to_string()),
            })
        }
    }
}

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;
