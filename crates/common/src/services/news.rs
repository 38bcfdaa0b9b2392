//! News lifecycle: save, read, admin listing, patch, delete, history

use crate::auth::AuthContext;
use crate::errors::{AppError, Result};
use crate::ids::parse_id;
use crate::moderation::status_for;
use crate::news::{
    NewNews, News, NewsPage, NewsPatch, NewsSuggestion, NewsWithStatus, SaveNewsRequest,
    SuggestionQuery,
};
use crate::paging::{page_count, ListQuery};
use crate::store::Store;
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;
use validator::Validate;

pub struct NewsService {
    store: Arc<dyn Store>,
}

impl NewsService {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    /// Persist a classified article owned by the caller
    pub async fn save(&self, caller: &AuthContext, request: SaveNewsRequest) -> Result<News> {
        let new_news = NewNews::from_request(request, &caller.user_id)?;
        let news = self.store.insert_news(new_news).await?;

        crate::metrics::record_news_saved(news.predicted_label.as_str());
        info!(
            news_id = %news.id,
            user_id = %caller.user_id,
            label = news.predicted_label.as_str(),
            "News saved"
        );
        Ok(news)
    }

    pub async fn get(&self, id: &str) -> Result<News> {
        let id = parse_id(id, "News")?;
        self.find_existing(id).await
    }

    /// Admin listing with the derived report status of each row
    pub async fn list(&self, caller: &AuthContext, query: ListQuery) -> Result<NewsPage> {
        caller.require_admin()?;
        query.validate()?;

        let (items, total) = self
            .store
            .list_news(query.search_term(), query.page, query.limit)
            .await?;

        let ids: Vec<Uuid> = items.iter().map(|n| n.id).collect();
        let counts = self.store.report_counts(&ids).await?;

        let news = items
            .into_iter()
            .map(|news| NewsWithStatus {
                report_status: status_for(&news.id, &counts),
                news,
            })
            .collect();

        Ok(NewsPage {
            news,
            total_pages: page_count(total, query.limit),
            current_page: query.page,
            total_news: total,
        })
    }

    pub async fn suggestions(
        &self,
        caller: &AuthContext,
        query: SuggestionQuery,
    ) -> Result<Vec<NewsSuggestion>> {
        caller.require_admin()?;
        query.validate()?;

        let term = query.query.trim();
        if term.is_empty() {
            return Ok(Vec::new());
        }
        self.store.suggest_titles(term, query.limit).await
    }

    /// Admin patch; the predicted label is only changed when patched explicitly
    pub async fn update(
        &self,
        caller: &AuthContext,
        id: &str,
        patch: serde_json::Value,
    ) -> Result<News> {
        caller.require_admin()?;
        let id = parse_id(id, "News")?;
        let patch = NewsPatch::from_json(patch)?;
        if patch.is_empty() {
            return self.find_existing(id).await;
        }

        let news = self
            .store
            .update_news(id, patch)
            .await?
            .ok_or_else(|| AppError::NewsNotFound { id: id.to_string() })?;

        info!(news_id = %id, admin_id = %caller.user_id, "News updated");
        Ok(news)
    }

    /// Delete by the owner or an admin. Reports on the article are kept.
    pub async fn delete(&self, caller: &AuthContext, id: &str) -> Result<()> {
        let id = parse_id(id, "News")?;
        let news = self.find_existing(id).await?;

        if !caller.can_act_for(&news.user_id) {
            return Err(AppError::forbidden(
                "You do not have permission to delete this article.",
            ));
        }

        if !self.store.delete_news(id).await? {
            return Err(AppError::NewsNotFound { id: id.to_string() });
        }

        info!(news_id = %id, user_id = %caller.user_id, "News deleted");
        Ok(())
    }

    /// Articles saved by `user_id`, newest first
    pub async fn history(&self, caller: &AuthContext, user_id: &str) -> Result<Vec<News>> {
        if !caller.can_act_for(user_id) {
            return Err(AppError::forbidden("You can only view your own history."));
        }
        self.store.news_by_owner(user_id).await
    }

    async fn find_existing(&self, id: Uuid) -> Result<News> {
        self.store
            .find_news(id)
            .await?
            .ok_or_else(|| AppError::NewsNotFound { id: id.to_string() })
    }
}
