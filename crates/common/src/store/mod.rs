//! Persistence seams
//!
//! Services only talk to these traits. [`crate::db::Repository`] implements
//! them on Postgres; [`MemoryStore`] implements them in process for tests and
//! local runs.

mod memory;

pub use memory::MemoryStore;

use crate::auth::Identity;
use crate::errors::Result;
use crate::moderation::{NewReport, Report, ReportCounts, ReportStatus, Verdict};
use crate::news::{NewNews, News, NewsPatch, NewsSuggestion};
use crate::users::{NewUser, User, UserPatch, UserSuggestion};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use uuid::Uuid;

/// Storage of classified news articles
#[async_trait]
pub trait NewsStore: Send + Sync {
    /// Insert a new article, assigning id and timestamps
    async fn insert_news(&self, news: NewNews) -> Result<News>;

    async fn find_news(&self, id: Uuid) -> Result<Option<News>>;

    /// One page of articles, newest first, optionally filtered by a
    /// case-insensitive substring of title or content. Returns the page and
    /// the total number of matches.
    async fn list_news(
        &self,
        search: Option<&str>,
        page: u64,
        per_page: u64,
    ) -> Result<(Vec<News>, u64)>;

    /// Titles containing `query` (case-insensitive), newest first
    async fn suggest_titles(&self, query: &str, limit: u64) -> Result<Vec<NewsSuggestion>>;

    /// All articles owned by a user, newest first
    async fn news_by_owner(&self, user_id: &str) -> Result<Vec<News>>;

    /// Apply a validated patch; `None` if the article doesn't exist
    async fn update_news(&self, id: Uuid, patch: NewsPatch) -> Result<Option<News>>;

    /// Delete an article; `false` if it didn't exist
    async fn delete_news(&self, id: Uuid) -> Result<bool>;
}

/// Storage of user reports
#[async_trait]
pub trait ReportStore: Send + Sync {
    /// Insert a pending report. Fails with `NewsNotFound` unless the
    /// referenced article exists at insertion time.
    async fn insert_report(&self, report: NewReport) -> Result<Report>;

    async fn find_report(&self, id: Uuid) -> Result<Option<Report>>;

    /// Record a verdict; `None` if the report doesn't exist
    async fn apply_verdict(
        &self,
        id: Uuid,
        verdict: Verdict,
        verifier_user_id: &str,
        at: DateTime<Utc>,
    ) -> Result<Option<Report>>;

    /// Reports for an article, newest first, optionally filtered by status
    async fn reports_for_news(
        &self,
        news_id: Uuid,
        status: Option<ReportStatus>,
    ) -> Result<Vec<Report>>;

    /// Most recently created report for an article
    async fn latest_report_for_news(&self, news_id: Uuid) -> Result<Option<Report>>;

    /// Pending and total report counts for a batch of articles. Articles
    /// without reports are absent from the map.
    async fn report_counts(&self, news_ids: &[Uuid]) -> Result<HashMap<Uuid, ReportCounts>>;
}

/// The user directory
#[async_trait]
pub trait UserStore: Send + Sync {
    async fn find_identity(&self, user_id: &str) -> Result<Option<Identity>>;

    async fn find_user(&self, user_id: &str) -> Result<Option<User>>;

    /// Users among `user_ids` that exist, in no particular order
    async fn users_by_ids(&self, user_ids: &[String]) -> Result<Vec<User>>;

    /// Insert a user, assigning id and creation time. Fails with a
    /// validation error when the username or e-mail is taken.
    async fn insert_user(&self, user: NewUser) -> Result<User>;

    /// One page of users, newest first, optionally filtered by a
    /// case-insensitive substring of username or e-mail
    async fn list_users(
        &self,
        search: Option<&str>,
        page: u64,
        per_page: u64,
    ) -> Result<(Vec<User>, u64)>;

    /// Users whose username or e-mail contains `query`, by username
    async fn suggest_users(&self, query: &str, limit: u64) -> Result<Vec<UserSuggestion>>;

    /// Apply a validated patch; `None` if the user doesn't exist. Refuses
    /// to demote the last admin and to reuse another user's name or e-mail.
    async fn update_user(&self, user_id: &str, patch: UserPatch) -> Result<Option<User>>;

    /// Delete a user; `false` if it didn't exist. Refuses to delete the
    /// last admin.
    async fn delete_user(&self, user_id: &str) -> Result<bool>;
}

/// Everything the services need from persistence
#[async_trait]
pub trait Store: NewsStore + ReportStore + UserStore {
    /// Check the backing storage is reachable
    async fn ping(&self) -> Result<()>;
}
