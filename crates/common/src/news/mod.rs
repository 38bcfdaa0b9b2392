//! News articles and their validation rules
//!
//! A News record is created once from a classification result and is never
//! re-classified in place. Validation happens when the typed request is
//! turned into a [`NewNews`] or a [`NewsPatch`].

use crate::errors::{AppError, Result};
use crate::moderation::ReportStatusView;
use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use validator::Validate;

/// Category used when the caller doesn't provide one
pub const DEFAULT_CATEGORY: &str = "Uncategorized";

/// Language recorded when the classifier didn't detect one
pub const UNKNOWN_LANGUAGE: &str = "unknown";

/// Probability above which an article is labelled fake
pub const FAKE_THRESHOLD: f64 = 50.0;

/// Real/fake label, used both for predictions and user corrections
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(8))")]
pub enum Label {
    #[sea_orm(string_value = "Fake")]
    Fake,
    #[sea_orm(string_value = "Real")]
    Real,
}

impl Label {
    /// `Fake` iff the fake probability is strictly above 50
    pub fn from_fake_probability(fake_probability: f64) -> Self {
        if fake_probability > FAKE_THRESHOLD {
            Label::Fake
        } else {
            Label::Real
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Label::Fake => "Fake",
            Label::Real => "Real",
        }
    }
}

impl FromStr for Label {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "Fake" => Ok(Label::Fake),
            "Real" => Ok(Label::Real),
            other => Err(AppError::validation(format!(
                "Invalid label '{}'. Must be one of: Real, Fake",
                other
            ))),
        }
    }
}

/// A classified, persisted article
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct News {
    pub id: Uuid,
    pub title: String,
    pub content: String,
    pub category: String,
    pub fake_probability: f64,
    pub real_probability: f64,
    pub predicted_label: Label,
    pub top_fake_words: Vec<String>,
    pub detected_language: String,
    #[serde(rename = "userId")]
    pub user_id: String,
    #[serde(rename = "createdAt")]
    pub created_at: DateTime<Utc>,
    #[serde(rename = "updatedAt")]
    pub updated_at: DateTime<Utc>,
}

/// Classification output as relayed from the ML service
///
/// Only the fields persisted with the article are read; anything else the
/// service returns is ignored here.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ClassificationResult {
    pub fake_probability: Option<f64>,
    pub real_probability: Option<f64>,
    #[serde(default)]
    pub top_fake_words: Option<serde_json::Value>,
    pub detected_language: Option<String>,
}

/// Body of a save request
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SaveNewsRequest {
    pub title: Option<String>,
    pub content: Option<String>,
    pub category: Option<String>,
    pub result: Option<ClassificationResult>,
}

/// A validated article ready to be stored
#[derive(Debug, Clone, PartialEq)]
pub struct NewNews {
    pub title: String,
    pub content: String,
    pub category: String,
    pub fake_probability: f64,
    pub real_probability: f64,
    pub predicted_label: Label,
    pub top_fake_words: Vec<String>,
    pub detected_language: String,
    pub user_id: String,
}

impl NewNews {
    /// Validate a save request and derive the predicted label
    pub fn from_request(request: SaveNewsRequest, owner_id: &str) -> Result<Self> {
        let title = non_empty(request.title.as_deref());
        let content = non_empty(request.content.as_deref());

        let mut messages = Vec::new();
        if title.is_none() {
            messages.push("Title cannot be empty".to_string());
        }
        if content.is_none() {
            messages.push("Content cannot be empty".to_string());
        }
        if !messages.is_empty() {
            return Err(AppError::Validation { messages });
        }

        let result = request.result.unwrap_or_default();
        let (fake_probability, real_probability) =
            match (result.fake_probability, result.real_probability) {
                (Some(fake), Some(real)) => (fake, real),
                _ => {
                    return Err(AppError::validation(
                        "Missing valid classification results object",
                    ))
                }
            };

        check_probabilities(Some(fake_probability), Some(real_probability))?;

        Ok(Self {
            title: title.unwrap_or_default(),
            content: content.unwrap_or_default(),
            category: non_empty(request.category.as_deref())
                .unwrap_or_else(|| DEFAULT_CATEGORY.to_string()),
            fake_probability,
            real_probability,
            predicted_label: Label::from_fake_probability(fake_probability),
            top_fake_words: string_list(result.top_fake_words),
            detected_language: non_empty(result.detected_language.as_deref())
                .unwrap_or_else(|| UNKNOWN_LANGUAGE.to_string()),
            user_id: owner_id.to_string(),
        })
    }
}

/// Admin patch of a stored article
///
/// The id, owner and timestamps aren't patchable; unknown fields in the
/// incoming document are ignored.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct NewsPatch {
    pub title: Option<String>,
    pub content: Option<String>,
    pub category: Option<String>,
    pub fake_probability: Option<f64>,
    pub real_probability: Option<f64>,
    pub predicted_label: Option<Label>,
    pub top_fake_words: Option<Vec<String>>,
    pub detected_language: Option<String>,
}

impl NewsPatch {
    /// Parse and validate a JSON patch document
    pub fn from_json(value: serde_json::Value) -> Result<Self> {
        if !value.is_object() {
            return Err(AppError::validation("Update body must be a JSON object"));
        }
        let patch: NewsPatch = serde_json::from_value(value)
            .map_err(|e| AppError::validation(format!("Invalid update: {}", e)))?;
        patch.validate()
    }

    /// Apply the same field rules as creation, trimming text fields
    pub fn validate(mut self) -> Result<Self> {
        let mut messages = Vec::new();

        if let Some(title) = self.title.take() {
            match non_empty(Some(&title)) {
                Some(t) => self.title = Some(t),
                None => messages.push("Title cannot be empty".to_string()),
            }
        }
        if let Some(content) = self.content.take() {
            match non_empty(Some(&content)) {
                Some(c) => self.content = Some(c),
                None => messages.push("Content cannot be empty".to_string()),
            }
        }
        if let Some(category) = self.category.take() {
            self.category =
                Some(non_empty(Some(&category)).unwrap_or_else(|| DEFAULT_CATEGORY.to_string()));
        }
        if let Some(language) = self.detected_language.take() {
            self.detected_language =
                Some(non_empty(Some(&language)).unwrap_or_else(|| UNKNOWN_LANGUAGE.to_string()));
        }
        if let Err(AppError::Validation { messages: range }) =
            check_probabilities(self.fake_probability, self.real_probability)
        {
            messages.extend(range);
        }

        if messages.is_empty() {
            Ok(self)
        } else {
            Err(AppError::Validation { messages })
        }
    }

    pub fn is_empty(&self) -> bool {
        *self == NewsPatch::default()
    }

    /// Apply the patch to an in-memory record
    pub fn apply(&self, news: &mut News) {
        if let Some(ref title) = self.title {
            news.title = title.clone();
        }
        if let Some(ref content) = self.content {
            news.content = content.clone();
        }
        if let Some(ref category) = self.category {
            news.category = category.clone();
        }
        if let Some(p) = self.fake_probability {
            news.fake_probability = p;
        }
        if let Some(p) = self.real_probability {
            news.real_probability = p;
        }
        if let Some(label) = self.predicted_label {
            news.predicted_label = label;
        }
        if let Some(ref words) = self.top_fake_words {
            news.top_fake_words = words.clone();
        }
        if let Some(ref language) = self.detected_language {
            news.detected_language = language.clone();
        }
    }
}

/// Query parameters of the admin title suggestions
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct SuggestionQuery {
    #[serde(default)]
    pub query: String,

    #[serde(default = "default_suggestion_limit")]
    #[validate(range(min = 1, max = 50, message = "limit must be between 1 and 50"))]
    pub limit: u64,
}

fn default_suggestion_limit() -> u64 {
    5
}

/// A title suggestion for the admin search box
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewsSuggestion {
    pub id: Uuid,
    pub title: String,
}

/// A listing row annotated with its derived report status
#[derive(Debug, Clone, Serialize)]
pub struct NewsWithStatus {
    #[serde(flatten)]
    pub news: News,
    #[serde(rename = "reportStatus")]
    pub report_status: ReportStatusView,
}

/// One page of the admin listing
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NewsPage {
    pub news: Vec<NewsWithStatus>,
    pub total_pages: u64,
    pub current_page: u64,
    pub total_news: u64,
}

fn non_empty(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
}

fn check_probabilities(fake: Option<f64>, real: Option<f64>) -> Result<()> {
    let mut messages = Vec::new();
    for (name, value) in [("fake_probability", fake), ("real_probability", real)] {
        if let Some(v) = value {
            if !(0.0..=100.0).contains(&v) {
                messages.push(format!("{} must be between 0 and 100", name));
            }
        }
    }
    if messages.is_empty() {
        Ok(())
    } else {
        Err(AppError::Validation { messages })
    }
}

/// Keep the string entries of a JSON array; anything else becomes empty
fn string_list(value: Option<serde_json::Value>) -> Vec<String> {
    match value {
        Some(serde_json::Value::Array(items)) => items
            .into_iter()
            .filter_map(|item| match item {
                serde_json::Value::String(s) => Some(s),
                _ => None,
            })
            .collect(),
        _ => Vec::new(),
    }
}
