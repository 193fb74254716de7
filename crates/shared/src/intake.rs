use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::{AttendantId, Channel, PaymentMethod, WindowType};
use crate::form::{loose_text, non_empty, parse_decimal, parse_positive};
use crate::protocol::AtendimentoPayload;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IntakeError {
    #[error("{0} invalido")]
    InvalidField(&'static str),
    #[error("{0} invalida")]
    InvalidCoordinate(&'static str),
    #[error("sourceEventId nao pode ser usado com origemCanal=MANUAL")]
    SourceEventOnManual,
    #[error("sourceEventId obrigatorio para origemCanal={0}")]
    SourceEventRequired(Channel),
    #[error("manualRequestId so pode ser usado com origemCanal=MANUAL")]
    ManualRequestOnAutomatic,
    #[error("manualRequestId nao pode ser combinado com sourceEventId quando origemCanal estiver vazio")]
    AmbiguousRequestIds,
    #[error("sourceEventId diverge de externalCallId")]
    SourceEventMismatch,
    #[error("manualRequestId diverge de externalCallId")]
    ManualRequestMismatch,
    #[error("janelaTipo=HARD exige janelaInicio e janelaFim")]
    HardWindowIncomplete,
    #[error("janelaInicio/janelaFim so podem ser enviados com janelaTipo=HARD")]
    WindowBoundsWithoutHard,
    #[error("latitude e longitude devem ser informadas juntas")]
    UnpairedCoordinates,
    #[error("telefone obrigatorio")]
    MissingPhone,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AtendimentoForm {
    #[serde(deserialize_with = "loose_text")]
    pub telefone: String,
    #[serde(deserialize_with = "loose_text")]
    pub quantidade_galoes: String,
    #[serde(deserialize_with = "loose_text")]
    pub atendente_id: String,
    #[serde(deserialize_with = "loose_text")]
    pub origem_canal: String,
    #[serde(deserialize_with = "loose_text")]
    pub source_event_id: String,
    #[serde(deserialize_with = "loose_text")]
    pub manual_request_id: String,
    #[serde(deserialize_with = "loose_text")]
    pub external_call_id: String,
    #[serde(deserialize_with = "loose_text")]
    pub metodo_pagamento: String,
    #[serde(deserialize_with = "loose_text")]
    pub janela_tipo: String,
    #[serde(deserialize_with = "loose_text")]
    pub janela_inicio: String,
    #[serde(deserialize_with = "loose_text")]
    pub janela_fim: String,
    #[serde(deserialize_with = "loose_text")]
    pub nome_cliente: String,
    #[serde(deserialize_with = "loose_text")]
    pub endereco: String,
    #[serde(deserialize_with = "loose_text")]
    pub latitude: String,
    #[serde(deserialize_with = "loose_text")]
    pub longitude: String,
}

impl AtendimentoForm {
    pub fn set(&mut self, field: &str, value: impl Into<String>) -> bool {
        let slot = match field {
            "telefone" => &mut self.telefone,
            "quantidadeGaloes" => &mut self.quantidade_galoes,
            "atendenteId" => &mut self.atendente_id,
            "origemCanal" => &mut self.origem_canal,
            "sourceEventId" => &mut self.source_event_id,
            "manualRequestId" => &mut self.manual_request_id,
            "externalCallId" => &mut self.external_call_id,
            "metodoPagamento" => &mut self.metodo_pagamento,
            "janelaTipo" => &mut self.janela_tipo,
            "janelaInicio" => &mut self.janela_inicio,
            "janelaFim" => &mut self.janela_fim,
            "nomeCliente" => &mut self.nome_cliente,
            "endereco" => &mut self.endereco,
            "latitude" => &mut self.latitude,
            "longitude" => &mut self.longitude,
            _ => return false,
        };
        *slot = value.into();
        true
    }
}

pub fn build_atendimento_payload(form: &AtendimentoForm) -> Result<AtendimentoPayload, IntakeError> {
    let quantidade_galoes = parse_positive(&form.quantidade_galoes)
        .ok_or(IntakeError::InvalidField("quantidadeGaloes"))?;
    let atendente_id = parse_positive(&form.atendente_id)
        .map(AttendantId)
        .ok_or(IntakeError::InvalidField("atendenteId"))?;

    let mut payload = AtendimentoPayload::new(form.telefone.trim(), quantidade_galoes, atendente_id);
    payload.origem_canal = parse_channel(&form.origem_canal)?;
    payload.metodo_pagamento = parse_payment_method(&form.metodo_pagamento)?;
    payload.janela_tipo = parse_window_type(&form.janela_tipo)?;
    payload.source_event_id = non_empty(&form.source_event_id);
    payload.manual_request_id = non_empty(&form.manual_request_id);
    payload.external_call_id = non_empty(&form.external_call_id);
    payload.janela_inicio = non_empty(&form.janela_inicio);
    payload.janela_fim = non_empty(&form.janela_fim);
    payload.nome_cliente = non_empty(&form.nome_cliente);
    payload.endereco = non_empty(&form.endereco);

    validate_omnichannel(&payload)?;
    validate_window(&payload)?;

    let latitude = non_empty(&form.latitude);
    let longitude = non_empty(&form.longitude);
    match (latitude, longitude) {
        (None, None) => {}
        (Some(lat), Some(lon)) => {
            payload.latitude =
                Some(parse_decimal(&lat).ok_or(IntakeError::InvalidCoordinate("latitude"))?);
            payload.longitude =
                Some(parse_decimal(&lon).ok_or(IntakeError::InvalidCoordinate("longitude"))?);
        }
        _ => return Err(IntakeError::UnpairedCoordinates),
    }

    if payload.telefone.is_empty() {
        return Err(IntakeError::MissingPhone);
    }
    Ok(payload)
}

fn upper(raw: &str) -> String {
    raw.trim().to_uppercase()
}

pub fn parse_channel(raw: &str) -> Result<Option<Channel>, IntakeError> {
    let value = upper(raw);
    if value.is_empty() {
        return Ok(None);
    }
    Channel::from_wire(&value)
        .map(Some)
        .ok_or(IntakeError::InvalidField("origemCanal"))
}

pub fn parse_payment_method(raw: &str) -> Result<Option<PaymentMethod>, IntakeError> {
    let value = upper(raw);
    if value.is_empty() {
        return Ok(None);
    }
    PaymentMethod::from_wire(&value)
        .map(Some)
        .ok_or(IntakeError::InvalidField("metodoPagamento"))
}

pub fn parse_window_type(raw: &str) -> Result<Option<WindowType>, IntakeError> {
    let value = upper(raw);
    match value.as_str() {
        "" => Ok(None),
        "FLEX" => Ok(Some(WindowType::Flexivel)),
        other => WindowType::from_wire(other)
            .map(Some)
            .ok_or(IntakeError::InvalidField("janelaTipo")),
    }
}

fn validate_omnichannel(payload: &AtendimentoPayload) -> Result<(), IntakeError> {
    let source = payload.source_event_id.as_deref();
    let manual = payload.manual_request_id.as_deref();
    match payload.origem_canal {
        Some(Channel::Manual) if source.is_some() => return Err(IntakeError::SourceEventOnManual),
        Some(channel) if channel.is_automatic() && source.is_none() => {
            return Err(IntakeError::SourceEventRequired(channel))
        }
        Some(channel) if channel.is_automatic() && manual.is_some() => {
            return Err(IntakeError::ManualRequestOnAutomatic)
        }
        None if source.is_some() && manual.is_some() => return Err(IntakeError::AmbiguousRequestIds),
        _ => {}
    }

    if let Some(external) = payload.external_call_id.as_deref() {
        if source.is_some_and(|id| id != external) {
            return Err(IntakeError::SourceEventMismatch);
        }
        if manual.is_some_and(|id| id != external) {
            return Err(IntakeError::ManualRequestMismatch);
        }
    }
    Ok(())
}

fn validate_window(payload: &AtendimentoPayload) -> Result<(), IntakeError> {
    let has_start = payload.janela_inicio.is_some();
    let has_end = payload.janela_fim.is_some();
    if payload.janela_tipo == Some(WindowType::Hard) {
        if !has_start || !has_end {
            return Err(IntakeError::HardWindowIncomplete);
        }
        return Ok(());
    }
    if has_start || has_end {
        return Err(IntakeError::WindowBoundsWithoutHard);
    }
    Ok(())
}

#[cfg(test)]
#[path = "tests/intake_tests.rs"]
mod tests;
