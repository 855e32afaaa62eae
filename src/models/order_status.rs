use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Lifecycle of a PIX order as stored in `pedidos.status`.
#[derive(
    Clone,
    Copy,
    Debug,
    Default,
    PartialEq,
    Eq,
    Hash,
    EnumIter,
    DeriveActiveEnum,
    Serialize,
    Deserialize,
    ToSchema,
    strum::Display,
    strum::AsRefStr,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(20))")]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum OrderStatus {
    #[default]
    #[sea_orm(string_value = "pending")]
    Pending,
    #[sea_orm(string_value = "paid")]
    Paid,
    #[sea_orm(string_value = "cancelled")]
    Cancelled,
    #[sea_orm(string_value = "expired")]
    Expired,
    #[sea_orm(string_value = "failed")]
    Failed,
}

impl OrderStatus {
    /// Maps a raw gateway status onto the internal set.
    ///
    /// Matching is case-insensitive and ignores surrounding whitespace. Values
    /// no gateway is known to send map to `Pending`; [`Self::recognizes`]
    /// tells callers whether that fallback was taken.
    pub fn from_gateway(raw: &str) -> Self {
        Self::parse_gateway(raw).unwrap_or(Self::Pending)
    }

    /// Whether `raw` is one of the gateway values with an explicit mapping.
    pub fn recognizes(raw: &str) -> bool {
        Self::parse_gateway(raw).is_some()
    }

    fn parse_gateway(raw: &str) -> Option<Self> {
        let status = match raw.trim().to_ascii_uppercase().as_str() {
            "PAID" | "CONFIRMED" | "OK" | "COMPLETED" | "APPROVED" => Self::Paid,
            "PENDING" | "WAITING" | "WAITING_PAYMENT" => Self::Pending,
            "CANCELLED" | "CANCELED" => Self::Cancelled,
            "EXPIRED" => Self::Expired,
            "FAILED" | "ERROR" | "REFUSED" => Self::Failed,
            _ => return None,
        };
        Some(status)
    }

    pub fn is_paid(self) -> bool {
        self == Self::Paid
    }

    /// No further gateway update is expected once an order reaches one of these.
    pub fn is_final(self) -> bool {
        !matches!(self, Self::Pending)
    }
}
