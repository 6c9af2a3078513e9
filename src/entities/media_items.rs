use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "media_items")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    pub disk: String,
    pub path: String,
    pub original_name: String,
    pub mime_type: String,
    pub size: i64,
    pub width: Option<i32>,
    pub height: Option<i32>,
    pub alt: Option<String>,
    pub title: Option<String>,
    #[sea_orm(column_type = "Text", nullable)]
    pub caption: Option<String>,
    pub meta: Option<Json>,
    pub created_by: Option<String>,
    pub created_at: DateTimeUtc,
    pub updated_at: DateTimeUtc,
    pub deleted_at: Option<DateTimeUtc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::media_usages::Entity")]
    MediaUsages,
    #[sea_orm(has_many = "super::media_conversions::Entity")]
    MediaConversions,
}

impl Related<super::media_usages::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::MediaUsages.def()
    }
}

impl Related<super::media_conversions::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::MediaConversions.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
