//! `SeaORM` Entity for sales table
//!
//! Tracking columns are owned by the 17TRACK sync; everything else is
//! written by the sales CRUD layer.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "sales")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub user_id: Option<i32>,
    pub client_name: String,
    pub client_phone: Option<String>,
    pub product_name: String,
    pub quantity: i32,
    pub cost_price: Decimal,
    pub cost_currency: String,
    pub sale_price: Decimal,
    pub margin: Decimal,
    pub status: String,
    pub tracking_number: Option<String>,
    pub tracking_provider: Option<String>,
    pub tracking_status: Option<String>,
    pub tracking_substatus: Option<String>,
    pub tracking_last_event: Option<String>,
    pub tracking_raw: Option<Json>,
    pub tracking_synced_at: Option<DateTimeUtc>,
    pub tracking_registered_at: Option<DateTimeUtc>,
    pub tracking_next_check_at: Option<DateTimeUtc>,
    pub tracking_arrived_at: Option<DateTimeUtc>,
    pub tracking_last_changed_at: Option<DateTimeUtc>,
    pub created_at: DateTimeUtc,
    pub updated_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
