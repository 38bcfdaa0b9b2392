//! In-process store
//!
//! Rows live in insertion order, so "newest first" is a reverse scan and
//! records created in the same instant keep a stable order.

use super::{NewsStore, ReportStore, Store, UserStore};
use crate::auth::{Identity, Role};
use crate::errors::{AppError, Result};
use crate::ids::new_id;
use crate::moderation::{NewReport, Report, ReportCounts, ReportStatus, Verdict};
use crate::news::{NewNews, News, NewsPatch, NewsSuggestion};
use crate::paging::page_offset;
use crate::users::{
    self, duplicate_user, last_admin, NewUser, User, UserPatch, UserSuggestion,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

#[derive(Default)]
struct Tables {
    news: Vec<News>,
    reports: Vec<Report>,
    users: Vec<User>,
}

/// Store backed by process memory
#[derive(Clone, Default)]
pub struct MemoryStore {
    tables: Arc<RwLock<Tables>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a user under a fixed id, named after it
    pub async fn seed_user(&self, user_id: &str, role: Role) {
        self.tables.write().await.users.push(User {
            id: user_id.to_string(),
            username: user_id.to_string(),
            email: format!("{}@example.com", user_id),
            role,
            created_at: Utc::now(),
        });
    }
}

fn matches_search(news: &News, needle: &str) -> bool {
    news.title.to_lowercase().contains(needle) || news.content.to_lowercase().contains(needle)
}

#[async_trait]
impl NewsStore for MemoryStore {
    async fn insert_news(&self, news: NewNews) -> Result<News> {
        let now = Utc::now();
        let record = News {
            id: new_id(),
            title: news.title,
            content: news.content,
            category: news.category,
            fake_probability: news.fake_probability,
            real_probability: news.real_probability,
            predicted_label: news.predicted_label,
            top_fake_words: news.top_fake_words,
            detected_language: news.detected_language,
            user_id: news.user_id,
            created_at: now,
            updated_at: now,
        };
        self.tables.write().await.news.push(record.clone());
        Ok(record)
    }

    async fn find_news(&self, id: Uuid) -> Result<Option<News>> {
        let tables = self.tables.read().await;
        Ok(tables.news.iter().find(|n| n.id == id).cloned())
    }

    async fn list_news(
        &self,
        search: Option<&str>,
        page: u64,
        per_page: u64,
    ) -> Result<(Vec<News>, u64)> {
        let tables = self.tables.read().await;
        let needle = search.map(str::to_lowercase);
        let matching: Vec<&News> = tables
            .news
            .iter()
            .rev()
            .filter(|n| needle.as_deref().map_or(true, |s| matches_search(n, s)))
            .collect();

        let total = matching.len() as u64;
        Ok((paginate(matching, page, per_page)?, total))
    }

    async fn suggest_titles(&self, query: &str, limit: u64) -> Result<Vec<NewsSuggestion>> {
        let tables = self.tables.read().await;
        let needle = query.to_lowercase();
        Ok(tables
            .news
            .iter()
            .rev()
            .filter(|n| n.title.to_lowercase().contains(&needle))
            .take(limit as usize)
            .map(|n| NewsSuggestion {
                id: n.id,
                title: n.title.clone(),
            })
            .collect())
    }

    async fn news_by_owner(&self, user_id: &str) -> Result<Vec<News>> {
        let tables = self.tables.read().await;
        Ok(tables
            .news
            .iter()
            .rev()
            .filter(|n| n.user_id == user_id)
            .cloned()
            .collect())
    }

    async fn update_news(&self, id: Uuid, patch: NewsPatch) -> Result<Option<News>> {
        let mut tables = self.tables.write().await;
        Ok(tables.news.iter_mut().find(|n| n.id == id).map(|news| {
            patch.apply(news);
            news.updated_at = Utc::now();
            news.clone()
        }))
    }

    async fn delete_news(&self, id: Uuid) -> Result<bool> {
        let mut tables = self.tables.write().await;
        let before = tables.news.len();
        tables.news.retain(|n| n.id != id);
        Ok(tables.news.len() != before)
    }
}

#[async_trait]
impl ReportStore for MemoryStore {
    async fn insert_report(&self, report: NewReport) -> Result<Report> {
        // Existence check and insert under one write lock
        let mut tables = self.tables.write().await;
        if !tables.news.iter().any(|n| n.id == report.news_id) {
            return Err(AppError::NewsNotFound {
                id: report.news_id.to_string(),
            });
        }

        let record = Report {
            id: new_id(),
            news_id: report.news_id,
            reporter_user_id: report.reporter_user_id,
            system_prediction: report.system_prediction,
            user_correction: report.user_correction,
            source_url: report.source_url,
            comments: report.comments,
            status: ReportStatus::Pending,
            verified_at: None,
            verifier_user_id: None,
            created_at: Utc::now(),
        };
        tables.reports.push(record.clone());
        Ok(record)
    }

    async fn find_report(&self, id: Uuid) -> Result<Option<Report>> {
        let tables = self.tables.read().await;
        Ok(tables.reports.iter().find(|r| r.id == id).cloned())
    }

    async fn apply_verdict(
        &self,
        id: Uuid,
        verdict: Verdict,
        verifier_user_id: &str,
        at: DateTime<Utc>,
    ) -> Result<Option<Report>> {
        let mut tables = self.tables.write().await;
        Ok(tables.reports.iter_mut().find(|r| r.id == id).map(|report| {
            report.apply_verdict(verdict, verifier_user_id, at);
            report.clone()
        }))
    }

    async fn reports_for_news(
        &self,
        news_id: Uuid,
        status: Option<ReportStatus>,
    ) -> Result<Vec<Report>> {
        let tables = self.tables.read().await;
        Ok(tables
            .reports
            .iter()
            .rev()
            .filter(|r| r.news_id == news_id && status.map_or(true, |s| r.status == s))
            .cloned()
            .collect())
    }

    async fn latest_report_for_news(&self, news_id: Uuid) -> Result<Option<Report>> {
        let tables = self.tables.read().await;
        Ok(tables
            .reports
            .iter()
            .rev()
            .find(|r| r.news_id == news_id)
            .cloned())
    }

    async fn report_counts(&self, news_ids: &[Uuid]) -> Result<HashMap<Uuid, ReportCounts>> {
        let tables = self.tables.read().await;
        let rows = tables
            .reports
            .iter()
            .filter(|r| news_ids.contains(&r.news_id))
            .map(|r| (r.news_id, r.status, 1));
        Ok(ReportCounts::tally(rows))
    }
}

/// Rows from `rows` for the 1-based `page`
fn paginate<T: Clone>(rows: Vec<&T>, page: u64, per_page: u64) -> Result<Vec<T>> {
    let skip = usize::try_from(page_offset(page, per_page)?).unwrap_or(usize::MAX);
    Ok(rows
        .into_iter()
        .skip(skip)
        .take(per_page as usize)
        .cloned()
        .collect())
}

impl Tables {
    fn admin_count(&self) -> usize {
        self.users.iter().filter(|u| u.role == Role::Admin).count()
    }

    /// Whether another user than `except` holds `username` or `email`
    fn is_taken(&self, username: Option<&str>, email: Option<&str>, except: Option<&str>) -> bool {
        self.users.iter().any(|u| {
            Some(u.id.as_str()) != except
                && (username == Some(u.username.as_str()) || email == Some(u.email.as_str()))
        })
    }
}

#[async_trait]
impl UserStore for MemoryStore {
    async fn find_identity(&self, user_id: &str) -> Result<Option<Identity>> {
        let tables = self.tables.read().await;
        Ok(tables.users.iter().find(|u| u.id == user_id).map(|u| Identity {
            user_id: u.id.clone(),
            role: u.role,
        }))
    }

    async fn find_user(&self, user_id: &str) -> Result<Option<User>> {
        let tables = self.tables.read().await;
        Ok(tables.users.iter().find(|u| u.id == user_id).cloned())
    }

    async fn users_by_ids(&self, user_ids: &[String]) -> Result<Vec<User>> {
        let tables = self.tables.read().await;
        Ok(tables
            .users
            .iter()
            .filter(|u| user_ids.contains(&u.id))
            .cloned()
            .collect())
    }

    async fn insert_user(&self, user: NewUser) -> Result<User> {
        let mut tables = self.tables.write().await;
        if tables.is_taken(Some(&user.username), Some(&user.email), None) {
            return Err(duplicate_user());
        }

        let record = User {
            id: new_id().to_string(),
            username: user.username,
            email: user.email,
            role: user.role,
            created_at: Utc::now(),
        };
        tables.users.push(record.clone());
        Ok(record)
    }

    async fn list_users(
        &self,
        search: Option<&str>,
        page: u64,
        per_page: u64,
    ) -> Result<(Vec<User>, u64)> {
        let tables = self.tables.read().await;
        let needle = search.map(str::to_lowercase);
        let matching: Vec<&User> = tables
            .users
            .iter()
            .rev()
            .filter(|u| needle.as_deref().map_or(true, |s| users::matches_search(u, s)))
            .collect();

        let total = matching.len() as u64;
        Ok((paginate(matching, page, per_page)?, total))
    }

    async fn suggest_users(&self, query: &str, limit: u64) -> Result<Vec<UserSuggestion>> {
        let tables = self.tables.read().await;
        let needle = query.to_lowercase();
        let mut hits: Vec<&User> = tables
            .users
            .iter()
            .filter(|u| users::matches_search(u, &needle))
            .collect();
        hits.sort_by(|a, b| a.username.cmp(&b.username));
        Ok(hits.into_iter().take(limit as usize).map(Into::into).collect())
    }

    async fn update_user(&self, user_id: &str, patch: UserPatch) -> Result<Option<User>> {
        let mut tables = self.tables.write().await;
        let Some(index) = tables.users.iter().position(|u| u.id == user_id) else {
            return Ok(None);
        };

        if tables.is_taken(patch.username.as_deref(), patch.email.as_deref(), Some(user_id)) {
            return Err(duplicate_user());
        }
        if patch.demotes(&tables.users[index]) && tables.admin_count() <= 1 {
            return Err(last_admin());
        }

        let user = &mut tables.users[index];
        patch.apply(user);
        Ok(Some(user.clone()))
    }

    async fn delete_user(&self, user_id: &str) -> Result<bool> {
        let mut tables = self.tables.write().await;
        let Some(index) = tables.users.iter().position(|u| u.id == user_id) else {
            return Ok(false);
        };
        if tables.users[index].role == Role::Admin && tables.admin_count() <= 1 {
            return Err(last_admin());
        }
        tables.users.remove(index);
        Ok(true)
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn ping(&self) -> Result<()> {
        Ok(())
    }
}
