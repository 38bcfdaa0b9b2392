//! Report entity

use crate::moderation::{Report, ReportStatus};
use crate::news::Label;
use chrono::Utc;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "reports")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,

    #[sea_orm(indexed)]
    pub news_id: Uuid,

    #[sea_orm(column_type = "Text")]
    pub reporter_user_id: String,

    pub system_prediction: Label,

    pub user_correction: Label,

    #[sea_orm(column_type = "Text")]
    pub source_url: String,

    #[sea_orm(column_type = "Text", nullable)]
    pub comments: Option<String>,

    #[sea_orm(indexed)]
    pub status: ReportStatus,

    pub verified_at: Option<DateTimeWithTimeZone>,

    #[sea_orm(column_type = "Text", nullable)]
    pub verifier_user_id: Option<String>,

    pub created_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

impl From<Model> for Report {
    fn from(model: Model) -> Self {
        Report {
            id: model.id,
            news_id: model.news_id,
            reporter_user_id: model.reporter_user_id,
            system_prediction: model.system_prediction,
            user_correction: model.user_correction,
            source_url: model.source_url,
            comments: model.comments,
            status: model.status,
            verified_at: model.verified_at.map(|t| t.with_timezone(&Utc)),
            verifier_user_id: model.verifier_user_id,
            created_at: model.created_at.with_timezone(&Utc),
        }
    }
}
