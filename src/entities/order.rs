use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

use crate::models::OrderStatus;

/// One row per gateway transaction. Column names follow the storefront's
/// existing `pedidos` table so the two can share a database.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "pedidos")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub transaction_id: String,

    pub status: OrderStatus,

    /// Amount in centavos
    #[sea_orm(column_name = "valor")]
    pub amount_cents: i64,

    #[sea_orm(column_name = "nome")]
    pub customer_name: Option<String>,

    pub email: Option<String>,

    /// Digits-only CPF/CNPJ as sent to the gateway
    #[sea_orm(column_name = "cpf")]
    pub document: Option<String>,

    #[sea_orm(column_name = "telefone")]
    pub phone: Option<String>,

    /// JSON object of tracking parameters
    #[sea_orm(column_type = "Text", nullable)]
    pub utm_params: Option<String>,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
