//! News entity

use crate::news::{Label, News};
use chrono::Utc;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "news")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,

    #[sea_orm(column_type = "Text")]
    pub title: String,

    #[sea_orm(column_type = "Text")]
    pub content: String,

    #[sea_orm(column_type = "Text")]
    pub category: String,

    pub fake_probability: f64,

    pub real_probability: f64,

    pub predicted_label: Label,

    /// Words that pushed the prediction towards fake, as a JSON array
    #[sea_orm(column_type = "JsonBinary")]
    pub top_fake_words: serde_json::Value,

    #[sea_orm(column_type = "Text")]
    pub detected_language: String,

    #[sea_orm(column_type = "Text", indexed)]
    pub user_id: String,

    #[sea_orm(indexed)]
    pub created_at: DateTimeWithTimeZone,

    pub updated_at: DateTimeWithTimeZone,
}

// Reports reference news by id without a foreign key so they outlive
// a deleted article.
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

impl From<Model> for News {
    fn from(model: Model) -> Self {
        News {
            id: model.id,
            title: model.title,
            content: model.content,
            category: model.category,
            fake_probability: model.fake_probability,
            real_probability: model.real_probability,
            predicted_label: model.predicted_label,
            top_fake_words: serde_json::from_value(model.top_fake_words).unwrap_or_default(),
            detected_language: model.detected_language,
            user_id: model.user_id,
            created_at: model.created_at.with_timezone(&Utc),
            updated_at: model.updated_at.with_timezone(&Utc),
        }
    }
}
