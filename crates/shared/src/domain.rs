use std::fmt;

use serde::{Deserialize, Serialize};

macro_rules! id_newtype {
    ($name:ident) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub i64);

        impl $name {
            pub fn positive(value: i64) -> Option<Self> {
                (value > 0).then_some(Self(value))
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

id_newtype!(OrderId);
id_newtype!(RouteId);
id_newtype!(DeliveryId);
id_newtype!(CourierId);
id_newtype!(AttendantId);
id_newtype!(CustomerId);

macro_rules! wire_enum {
    ($name:ident { $($variant:ident => $wire:literal),+ $(,)? }) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub enum $name {
            $(
                #[serde(rename = $wire)]
                $variant,
            )+
        }

        impl $name {
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            pub fn as_str(self) -> &'static str {
                match self {
                    $($name::$variant => $wire,)+
                }
            }

            pub fn from_wire(value: &str) -> Option<Self> {
                match value {
                    $($wire => Some($name::$variant),)+
                    _ => None,
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }
    };
}

wire_enum!(OrderStatus {
    Pendente => "PENDENTE",
    Confirmado => "CONFIRMADO",
    EmRota => "EM_ROTA",
    Entregue => "ENTREGUE",
    Cancelado => "CANCELADO",
});

wire_enum!(RouteStatus {
    Planejada => "PLANEJADA",
    EmAndamento => "EM_ANDAMENTO",
    Concluida => "CONCLUIDA",
});

wire_enum!(RouteLayer {
    Primaria => "PRIMARIA",
    Secundaria => "SECUNDARIA",
});

wire_enum!(ExecutionLayer {
    PrimariaEmExecucao => "PRIMARIA_EM_EXECUCAO",
    PrimariaPendente => "PRIMARIA_PENDENTE",
    SecundariaConfirmada => "SECUNDARIA_CONFIRMADA",
    Finalizada => "FINALIZADA",
});

wire_enum!(EventType {
    RotaIniciada => "ROTA_INICIADA",
    PedidoEntregue => "PEDIDO_ENTREGUE",
    PedidoFalhou => "PEDIDO_FALHOU",
    PedidoCancelado => "PEDIDO_CANCELADO",
});

wire_enum!(Channel {
    Manual => "MANUAL",
    Whatsapp => "WHATSAPP",
    BinaFixo => "BINA_FIXO",
    TelefoniaFixo => "TELEFONIA_FIXO",
});

wire_enum!(PaymentMethod {
    NaoInformado => "NAO_INFORMADO",
    Dinheiro => "DINHEIRO",
    Pix => "PIX",
    Cartao => "CARTAO",
    Vale => "VALE",
});

wire_enum!(WindowType {
    Asap => "ASAP",
    Hard => "HARD",
    Flexivel => "FLEXIVEL",
});

impl Channel {
    pub fn is_automatic(self) -> bool {
        self != Channel::Manual
    }
}

impl EventType {
    pub fn targets_route(self) -> bool {
        self == EventType::RotaIniciada
    }
}
