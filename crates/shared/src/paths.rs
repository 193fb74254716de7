use thiserror::Error;

use crate::domain::{CourierId, OrderId};

pub const HEALTH: &str = "/health";
pub const ATENDIMENTO_PEDIDOS: &str = "/api/atendimento/pedidos";
pub const EVENTOS: &str = "/api/eventos";
pub const REPLANEJAMENTO_RUN: &str = "/api/replanejamento/run";
pub const OPERACAO_PAINEL: &str = "/api/operacao/painel";
pub const OPERACAO_EVENTOS: &str = "/api/operacao/eventos";
pub const OPERACAO_MAPA: &str = "/api/operacao/mapa";
pub const ROTAS_PRONTAS_INICIAR: &str = "/api/operacao/rotas/prontas/iniciar";

pub const DEFAULT_EVENT_FEED_LIMIT: u32 = 50;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PathError {
    #[error("pedidoId invalido")]
    InvalidOrderId,
    #[error("entregadorId invalido")]
    InvalidCourierId,
}

fn order(id: i64) -> Result<OrderId, PathError> {
    OrderId::positive(id).ok_or(PathError::InvalidOrderId)
}

pub fn timeline_path(pedido_id: i64) -> Result<String, PathError> {
    Ok(format!("/api/pedidos/{}/timeline", order(pedido_id)?))
}

pub fn execucao_path(pedido_id: i64) -> Result<String, PathError> {
    Ok(format!("/api/pedidos/{}/execucao", order(pedido_id)?))
}

pub fn roteiro_path(entregador_id: i64) -> Result<String, PathError> {
    let courier = CourierId::positive(entregador_id).ok_or(PathError::InvalidCourierId)?;
    Ok(format!("/api/entregadores/{courier}/roteiro"))
}

pub fn operacao_eventos_path(limite: u32) -> String {
    format!("{OPERACAO_EVENTOS}?limite={limite}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builds_order_paths() {
        assert_eq!(timeline_path(8421).as_deref(), Ok("/api/pedidos/8421/timeline"));
        assert_eq!(execucao_path(7).as_deref(), Ok("/api/pedidos/7/execucao"));
    }

    #[test]
    fn rejects_non_positive_ids() {
        assert_eq!(timeline_path(0), Err(PathError::InvalidOrderId));
        assert_eq!(execucao_path(-1), Err(PathError::InvalidOrderId));
        assert_eq!(
            roteiro_path(0).map_err(|err| err.to_string()),
            Err("entregadorId invalido".to_string())
        );
    }

    #[test]
    fn event_feed_carries_limit() {
        assert_eq!(
            operacao_eventos_path(DEFAULT_EVENT_FEED_LIMIT),
            "/api/operacao/eventos?limite=50"
        );
        assert_eq!(roteiro_path(3).as_deref(), Ok("/api/entregadores/3/roteiro"));
    }
}
