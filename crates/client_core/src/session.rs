use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use shared::{
    domain::{CourierId, OrderId},
    protocol::{AtendimentoPayload, AtendimentoResponse},
};

pub const HANDOFF_CAPACITY: usize = 20;
pub const PHONE_TRAIL_CAPACITY: usize = 12;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HandoffEntry {
    pub pedido_id: OrderId,
    pub telefone: String,
    pub quantidade_galoes: i64,
    pub idempotente: bool,
    pub registrado_em: DateTime<Utc>,
}

impl HandoffEntry {
    pub fn from_response(
        payload: &AtendimentoPayload,
        response: &AtendimentoResponse,
        at: DateTime<Utc>,
    ) -> Option<Self> {
        Some(Self {
            pedido_id: response.order_id()?,
            telefone: response
                .telefone_normalizado
                .clone()
                .filter(|phone| !phone.is_empty())
                .unwrap_or_else(|| payload.telefone.clone()),
            quantidade_galoes: payload.quantidade_galoes,
            idempotente: response.idempotente,
            registrado_em: at,
        })
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct HandoffQueue {
    pub atendimentos_sessao: Vec<HandoffEntry>,
    pub foco_pedido_id: Option<OrderId>,
    pub ultimo_entregador_id: Option<CourierId>,
}

impl HandoffQueue {
    /// Puts `entry` at the front, replacing an older entry for the same
    /// order, and drops the oldest past capacity.
    pub fn record(&mut self, entry: HandoffEntry) {
        self.atendimentos_sessao
            .retain(|existing| existing.pedido_id != entry.pedido_id);
        self.atendimentos_sessao.insert(0, entry);
        self.atendimentos_sessao.truncate(HANDOFF_CAPACITY);
        self.drop_stale_focus();
    }

    fn position(&self, pedido_id: OrderId) -> Option<usize> {
        self.atendimentos_sessao
            .iter()
            .position(|entry| entry.pedido_id == pedido_id)
    }

    pub fn move_up(&mut self, pedido_id: OrderId) -> bool {
        match self.position(pedido_id) {
            Some(index) if index > 0 => {
                self.atendimentos_sessao.swap(index, index - 1);
                true
            }
            _ => false,
        }
    }

    pub fn move_down(&mut self, pedido_id: OrderId) -> bool {
        match self.position(pedido_id) {
            Some(index) if index + 1 < self.atendimentos_sessao.len() => {
                self.atendimentos_sessao.swap(index, index + 1);
                true
            }
            _ => false,
        }
    }

    pub fn focus(&mut self, pedido_id: OrderId) -> bool {
        if self.position(pedido_id).is_some() {
            self.foco_pedido_id = Some(pedido_id);
            true
        } else {
            false
        }
    }

    pub fn remove(&mut self, pedido_id: OrderId) -> Option<HandoffEntry> {
        let index = self.position(pedido_id)?;
        let removed = self.atendimentos_sessao.remove(index);
        self.drop_stale_focus();
        Some(removed)
    }

    pub fn remember_courier(&mut self, entregador_id: CourierId) {
        self.ultimo_entregador_id = Some(entregador_id);
    }

    pub fn focused(&self) -> Option<&HandoffEntry> {
        let pedido_id = self.foco_pedido_id?;
        self.atendimentos_sessao
            .iter()
            .find(|entry| entry.pedido_id == pedido_id)
    }

    fn drop_stale_focus(&mut self) {
        if let Some(focus) = self.foco_pedido_id {
            if self.position(focus).is_none() {
                self.foco_pedido_id = None;
            }
        }
    }
}

pub fn normalize_phone(raw: &str) -> String {
    raw.chars().filter(char::is_ascii_digit).collect()
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PhoneSearch {
    pub telefone: String,
    pub telefone_normalizado: String,
    pub atualizada_em: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PhoneTrail {
    pub busca_telefone: PhoneSearch,
    pub trilha_sessao: Vec<PhoneSearch>,
}

impl PhoneTrail {
    pub fn search(&mut self, raw: &str, at: DateTime<Utc>) -> Option<&PhoneSearch> {
        let normalized = normalize_phone(raw);
        if normalized.is_empty() {
            return None;
        }
        let search = PhoneSearch {
            telefone: raw.trim().to_string(),
            telefone_normalizado: normalized,
            atualizada_em: Some(at),
        };
        self.trilha_sessao
            .retain(|previous| previous.telefone_normalizado != search.telefone_normalizado);
        self.trilha_sessao.insert(0, search.clone());
        self.trilha_sessao.truncate(PHONE_TRAIL_CAPACITY);
        self.busca_telefone = search;
        Some(&self.busca_telefone)
    }

    pub fn clear(&mut self) {
        *self = Self::default();
    }
}
