//! Repository pattern for database operations
//!
//! Implements the store traits on Postgres with proper error handling
//! and transaction support.

use crate::auth::{Identity, Role};
use crate::db::models::*;
use crate::db::DbPool;
use crate::errors::{AppError, Result};
use crate::ids::new_id;
use crate::moderation::{NewReport, Report, ReportCounts, ReportStatus, Verdict};
use crate::news::{NewNews, News, NewsPatch, NewsSuggestion};
use crate::paging::page_offset;
use crate::users::{duplicate_user, last_admin, NewUser, User, UserPatch, UserSuggestion};
use crate::store::{NewsStore, ReportStore, Store, UserStore};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sea_orm::sea_query::{Condition, Expr, Func, LikeExpr, SimpleExpr};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, DatabaseTransaction, DbErr, EntityTrait,
    PaginatorTrait, QueryFilter, QueryOrder, QuerySelect, Set, SqlErr, TransactionTrait,
};
use std::collections::HashMap;
use uuid::Uuid;

/// Repository for data access operations
#[derive(Clone)]
pub struct Repository {
    pool: DbPool,
}

impl Repository {
    /// Create a new repository with the given connection pool
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    /// Get the read connection
    fn read_conn(&self) -> &DatabaseConnection {
        self.pool.read()
    }

    /// Get the write connection
    fn write_conn(&self) -> &DatabaseConnection {
        self.pool.write()
    }
}

/// Case-insensitive substring match on a text column
fn contains_ci<C: ColumnTrait + 'static>(column: C, needle: &str) -> SimpleExpr {
    Expr::expr(Func::lower(Expr::col(column))).like(LikeExpr::new(like_pattern(needle)).escape('\\'))
}

/// `%needle%`, lowercased, with LIKE wildcards in the needle escaped
fn like_pattern(needle: &str) -> String {
    let mut pattern = String::with_capacity(needle.len() + 2);
    pattern.push('%');
    for c in needle.to_lowercase().chars() {
        if matches!(c, '\\' | '%' | '_') {
            pattern.push('\\');
        }
        pattern.push(c);
    }
    pattern.push('%');
    pattern
}

// ============================================================================
// News Operations
// ============================================================================

#[async_trait]
impl NewsStore for Repository {
    async fn insert_news(&self, news: NewNews) -> Result<News> {
        let now = Utc::now();

        let model = NewsActiveModel {
            id: Set(new_id()),
            title: Set(news.title),
            content: Set(news.content),
            category: Set(news.category),
            fake_probability: Set(news.fake_probability),
            real_probability: Set(news.real_probability),
            predicted_label: Set(news.predicted_label),
            top_fake_words: Set(serde_json::json!(news.top_fake_words)),
            detected_language: Set(news.detected_language),
            user_id: Set(news.user_id),
            created_at: Set(now.into()),
            updated_at: Set(now.into()),
        };

        let inserted = model.insert(self.write_conn()).await?;
        Ok(inserted.into())
    }

    async fn find_news(&self, id: Uuid) -> Result<Option<News>> {
        let model = NewsEntity::find_by_id(id).one(self.read_conn()).await?;
        Ok(model.map(Into::into))
    }

    async fn list_news(
        &self,
        search: Option<&str>,
        page: u64,
        per_page: u64,
    ) -> Result<(Vec<News>, u64)> {
        let mut query = NewsEntity::find()
            .order_by_desc(NewsColumn::CreatedAt)
            .order_by_desc(NewsColumn::Id);

        if let Some(term) = search {
            query = query.filter(
                Condition::any()
                    .add(contains_ci(NewsColumn::Title, term))
                    .add(contains_ci(NewsColumn::Content, term)),
            );
        }

        page_offset(page, per_page)?;
        let paginator = query.paginate(self.read_conn(), per_page);
        let total = paginator.num_items().await?;
        let models = paginator.fetch_page(page - 1).await?;

        Ok((models.into_iter().map(Into::into).collect(), total))
    }

    async fn suggest_titles(&self, query: &str, limit: u64) -> Result<Vec<NewsSuggestion>> {
        let rows: Vec<(Uuid, String)> = NewsEntity::find()
            .select_only()
            .column(NewsColumn::Id)
            .column(NewsColumn::Title)
            .filter(contains_ci(NewsColumn::Title, query))
            .order_by_desc(NewsColumn::CreatedAt)
            .order_by_desc(NewsColumn::Id)
            .limit(limit)
            .into_tuple()
            .all(self.read_conn())
            .await?;

        Ok(rows
            .into_iter()
            .map(|(id, title)| NewsSuggestion { id, title })
            .collect())
    }

    async fn news_by_owner(&self, user_id: &str) -> Result<Vec<News>> {
        let models = NewsEntity::find()
            .filter(NewsColumn::UserId.eq(user_id))
            .order_by_desc(NewsColumn::CreatedAt)
            .order_by_desc(NewsColumn::Id)
            .all(self.read_conn())
            .await?;

        Ok(models.into_iter().map(Into::into).collect())
    }

    async fn update_news(&self, id: Uuid, patch: NewsPatch) -> Result<Option<News>> {
        let Some(model) = NewsEntity::find_by_id(id).one(self.write_conn()).await? else {
            return Ok(None);
        };

        let mut active: NewsActiveModel = model.into();
        if let Some(title) = patch.title {
            active.title = Set(title);
        }
        if let Some(content) = patch.content {
            active.content = Set(content);
        }
        if let Some(category) = patch.category {
            active.category = Set(category);
        }
        if let Some(p) = patch.fake_probability {
            active.fake_probability = Set(p);
        }
        if let Some(p) = patch.real_probability {
            active.real_probability = Set(p);
        }
        if let Some(label) = patch.predicted_label {
            active.predicted_label = Set(label);
        }
        if let Some(words) = patch.top_fake_words {
            active.top_fake_words = Set(serde_json::json!(words));
        }
        if let Some(language) = patch.detected_language {
            active.detected_language = Set(language);
        }
        active.updated_at = Set(Utc::now().into());

        let updated = active.update(self.write_conn()).await?;
        Ok(Some(updated.into()))
    }

    async fn delete_news(&self, id: Uuid) -> Result<bool> {
        let result = NewsEntity::delete_by_id(id).exec(self.write_conn()).await?;
        Ok(result.rows_affected > 0)
    }
}

// ============================================================================
// Report Operations
// ============================================================================

#[async_trait]
impl ReportStore for Repository {
    async fn insert_report(&self, report: NewReport) -> Result<Report> {
        let txn = self.write_conn().begin().await?;

        // Share-lock the article so a concurrent delete waits for this insert
        let news = NewsEntity::find_by_id(report.news_id)
            .lock_shared()
            .one(&txn)
            .await?;
        if news.is_none() {
            return Err(AppError::NewsNotFound {
                id: report.news_id.to_string(),
            });
        }

        let model = ReportActiveModel {
            id: Set(new_id()),
            news_id: Set(report.news_id),
            reporter_user_id: Set(report.reporter_user_id),
            system_prediction: Set(report.system_prediction),
            user_correction: Set(report.user_correction),
            source_url: Set(report.source_url),
            comments: Set(report.comments),
            status: Set(ReportStatus::Pending),
            verified_at: Set(None),
            verifier_user_id: Set(None),
            created_at: Set(Utc::now().into()),
        }
        .insert(&txn)
        .await?;

        txn.commit().await?;
        Ok(model.into())
    }

    async fn find_report(&self, id: Uuid) -> Result<Option<Report>> {
        let model = ReportEntity::find_by_id(id).one(self.read_conn()).await?;
        Ok(model.map(Into::into))
    }

    async fn apply_verdict(
        &self,
        id: Uuid,
        verdict: Verdict,
        verifier_user_id: &str,
        at: DateTime<Utc>,
    ) -> Result<Option<Report>> {
        let active = ReportActiveModel {
            id: Set(id),
            status: Set(verdict.status()),
            verified_at: Set(Some(at.into())),
            verifier_user_id: Set(Some(verifier_user_id.to_string())),
            ..Default::default()
        };

        match active.update(self.write_conn()).await {
            Ok(model) => Ok(Some(model.into())),
            Err(DbErr::RecordNotUpdated) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn reports_for_news(
        &self,
        news_id: Uuid,
        status: Option<ReportStatus>,
    ) -> Result<Vec<Report>> {
        let mut query = ReportEntity::find().filter(ReportColumn::NewsId.eq(news_id));
        if let Some(status) = status {
            query = query.filter(ReportColumn::Status.eq(status));
        }

        let models = query
            .order_by_desc(ReportColumn::CreatedAt)
            .order_by_desc(ReportColumn::Id)
            .all(self.read_conn())
            .await?;

        Ok(models.into_iter().map(Into::into).collect())
    }

    async fn latest_report_for_news(&self, news_id: Uuid) -> Result<Option<Report>> {
        let model = ReportEntity::find()
            .filter(ReportColumn::NewsId.eq(news_id))
            .order_by_desc(ReportColumn::CreatedAt)
            .order_by_desc(ReportColumn::Id)
            .one(self.read_conn())
            .await?;

        Ok(model.map(Into::into))
    }

    async fn report_counts(&self, news_ids: &[Uuid]) -> Result<HashMap<Uuid, ReportCounts>> {
        if news_ids.is_empty() {
            return Ok(HashMap::new());
        }

        // One grouped query for the whole page
        let rows: Vec<(Uuid, ReportStatus, i64)> = ReportEntity::find()
            .select_only()
            .column(ReportColumn::NewsId)
            .column(ReportColumn::Status)
            .column_as(Expr::col(ReportColumn::Id).count(), "report_count")
            .filter(ReportColumn::NewsId.is_in(news_ids.iter().copied()))
            .group_by(ReportColumn::NewsId)
            .group_by(ReportColumn::Status)
            .into_tuple()
            .all(self.read_conn())
            .await?;

        Ok(ReportCounts::tally(
            rows.into_iter()
                .map(|(news_id, status, count)| (news_id, status, count.max(0) as u64)),
        ))
    }
}

// ============================================================================
// User Operations
// ============================================================================

/// Map unique-key violations on the users table to a validation error
fn user_write_error(err: DbErr) -> AppError {
    match err.sql_err() {
        Some(SqlErr::UniqueConstraintViolation(_)) => duplicate_user(),
        _ => err.into(),
    }
}

/// Ids of all admins, row-locked until the transaction ends
async fn locked_admin_ids(txn: &DatabaseTransaction) -> Result<Vec<String>> {
    Ok(UserEntity::find()
        .select_only()
        .column(UserColumn::Id)
        .filter(UserColumn::Role.eq(Role::Admin))
        .lock_exclusive()
        .into_tuple()
        .all(txn)
        .await?)
}

#[async_trait]
impl UserStore for Repository {
    async fn find_identity(&self, user_id: &str) -> Result<Option<Identity>> {
        let model = UserEntity::find_by_id(user_id.to_string())
            .one(self.read_conn())
            .await?;
        Ok(model.map(Into::into))
    }

    async fn find_user(&self, user_id: &str) -> Result<Option<User>> {
        let model = UserEntity::find_by_id(user_id.to_string())
            .one(self.read_conn())
            .await?;
        Ok(model.map(Into::into))
    }

    async fn users_by_ids(&self, user_ids: &[String]) -> Result<Vec<User>> {
        if user_ids.is_empty() {
            return Ok(Vec::new());
        }
        let models = UserEntity::find()
            .filter(UserColumn::Id.is_in(user_ids.iter().cloned()))
            .all(self.read_conn())
            .await?;
        Ok(models.into_iter().map(Into::into).collect())
    }

    async fn insert_user(&self, user: NewUser) -> Result<User> {
        let model = UserActiveModel {
            id: Set(new_id().to_string()),
            username: Set(user.username),
            email: Set(user.email),
            role: Set(user.role),
            created_at: Set(Utc::now().into()),
        }
        .insert(self.write_conn())
        .await
        .map_err(user_write_error)?;

        Ok(model.into())
    }

    async fn list_users(
        &self,
        search: Option<&str>,
        page: u64,
        per_page: u64,
    ) -> Result<(Vec<User>, u64)> {
        let mut query = UserEntity::find()
            .order_by_desc(UserColumn::CreatedAt)
            .order_by_desc(UserColumn::Id);

        if let Some(term) = search {
            query = query.filter(
                Condition::any()
                    .add(contains_ci(UserColumn::Username, term))
                    .add(contains_ci(UserColumn::Email, term)),
            );
        }

        page_offset(page, per_page)?;
        let paginator = query.paginate(self.read_conn(), per_page);
        let total = paginator.num_items().await?;
        let models = paginator.fetch_page(page - 1).await?;

        Ok((models.into_iter().map(Into::into).collect(), total))
    }

    async fn suggest_users(&self, query: &str, limit: u64) -> Result<Vec<UserSuggestion>> {
        let rows: Vec<(String, String, String)> = UserEntity::find()
            .select_only()
            .column(UserColumn::Id)
            .column(UserColumn::Username)
            .column(UserColumn::Email)
            .filter(
                Condition::any()
                    .add(contains_ci(UserColumn::Username, query))
                    .add(contains_ci(UserColumn::Email, query)),
            )
            .order_by_asc(UserColumn::Username)
            .limit(limit)
            .into_tuple()
            .all(self.read_conn())
            .await?;

        Ok(rows
            .into_iter()
            .map(|(id, username, email)| UserSuggestion { id, username, email })
            .collect())
    }

    async fn update_user(&self, user_id: &str, patch: UserPatch) -> Result<Option<User>> {
        let txn = self.write_conn().begin().await?;

        let Some(model) = UserEntity::find_by_id(user_id.to_string())
            .lock_exclusive()
            .one(&txn)
            .await?
        else {
            return Ok(None);
        };

        let current: User = model.clone().into();
        if patch.demotes(&current) && locked_admin_ids(&txn).await?.len() <= 1 {
            return Err(last_admin());
        }

        let mut active: UserActiveModel = model.into();
        if let Some(username) = patch.username {
            active.username = Set(username);
        }
        if let Some(email) = patch.email {
            active.email = Set(email);
        }
        if let Some(role) = patch.role {
            active.role = Set(role);
        }

        let updated = active.update(&txn).await.map_err(user_write_error)?;
        txn.commit().await?;
        Ok(Some(updated.into()))
    }

    async fn delete_user(&self, user_id: &str) -> Result<bool> {
        let txn = self.write_conn().begin().await?;

        let admins = locked_admin_ids(&txn).await?;
        if admins.len() <= 1 && admins.iter().any(|id| id == user_id) {
            return Err(last_admin());
        }

        let result = UserEntity::delete_by_id(user_id.to_string())
            .exec(&txn)
            .await?;
        txn.commit().await?;
        Ok(result.rows_affected > 0)
    }
}

#[async_trait]
impl Store for Repository {
    async fn ping(&self) -> Result<()> {
        self.pool.ping().await
    }
}
