//! `SeaORM` Entity for tracking_check_logs table

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "tracking_check_logs")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub tracking_number: String,
    pub status: Option<String>,
    pub substatus: Option<String>,
    pub last_event: Option<String>,
    pub arrived: bool,
    pub success: bool,
    pub raw_response: Option<Json>,
    pub error: Option<String>,
    pub checked_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
