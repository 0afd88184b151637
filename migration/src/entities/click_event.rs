//! 原始点击事件实体

use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq)]
#[sea_orm(table_name = "click_events")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub event_id: i64,
    pub short_code: String,
    pub ts: DateTimeUtc,
    pub geo: Option<String>,
    pub device: Option<String>,
    pub referrer: Option<String>,
    /// resolved / expired / not_found / blocked
    pub outcome: String,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
