use sea_orm::entity::prelude::*;
use serde::Serialize;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize)]
#[sea_orm(table_name = "generations")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    #[sea_orm(unique)]
    pub prediction_id: Option<String>,
    pub image_url: String,
    pub video_url: String,
    pub prompt: String,
    pub model: Option<String>,
    pub duration: Option<i32>,
    pub resolution: Option<String>,
    /// RFC 3339, UTC, millisecond precision so it sorts as text.
    pub created_at: String,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
