//! User reports against classifications and their moderation lifecycle
//!
//! A report starts `pending` and an admin moves it to exactly one of the
//! three terminal outcomes. Re-verifying an already terminal report is
//! allowed and overwrites the verdict.

use crate::errors::{AppError, Result};
use crate::ids::parse_id;
use crate::news::Label;
use crate::users::UserSummary;
use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::str::FromStr;

/// Moderation state of a report
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(24))")]
#[serde(rename_all = "snake_case")]
pub enum ReportStatus {
    #[sea_orm(string_value = "pending")]
    Pending,
    #[sea_orm(string_value = "verified_correct")]
    VerifiedCorrect,
    #[sea_orm(string_value = "verified_incorrect")]
    VerifiedIncorrect,
    #[sea_orm(string_value = "rejected")]
    Rejected,
}

impl ReportStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, ReportStatus::Pending)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ReportStatus::Pending => "pending",
            ReportStatus::VerifiedCorrect => "verified_correct",
            ReportStatus::VerifiedIncorrect => "verified_incorrect",
            ReportStatus::Rejected => "rejected",
        }
    }
}

/// An admin's decision on a report; the terminal subset of [`ReportStatus`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    VerifiedCorrect,
    VerifiedIncorrect,
    Rejected,
}

impl Verdict {
    pub const ALL: [Verdict; 3] = [
        Verdict::VerifiedCorrect,
        Verdict::VerifiedIncorrect,
        Verdict::Rejected,
    ];

    pub fn status(&self) -> ReportStatus {
        match self {
            Verdict::VerifiedCorrect => ReportStatus::VerifiedCorrect,
            Verdict::VerifiedIncorrect => ReportStatus::VerifiedIncorrect,
            Verdict::Rejected => ReportStatus::Rejected,
        }
    }
}

impl FromStr for Verdict {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self> {
        Verdict::ALL
            .into_iter()
            .find(|v| v.status().as_str() == s)
            .ok_or_else(|| {
                let allowed: Vec<&str> = Verdict::ALL.iter().map(|v| v.status().as_str()).collect();
                AppError::validation(format!(
                    "Invalid status value provided. Status must be one of: {}",
                    allowed.join(", ")
                ))
            })
    }
}

/// A stored report
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Report {
    pub id: Uuid,
    pub news_id: Uuid,
    pub reporter_user_id: String,
    pub system_prediction: Label,
    pub user_correction: Label,
    pub source_url: String,
    pub comments: Option<String>,
    pub status: ReportStatus,
    pub verified_at: Option<DateTime<Utc>>,
    pub verifier_user_id: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Report {
    /// Record an admin verdict
    pub fn apply_verdict(&mut self, verdict: Verdict, verifier_user_id: &str, at: DateTime<Utc>) {
        self.status = verdict.status();
        self.verified_at = Some(at);
        self.verifier_user_id = Some(verifier_user_id.to_string());
    }
}

/// A report with its reporter and article title resolved for the admin view.
/// Either side is `None` once the user or article has been deleted.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReportDetails {
    #[serde(flatten)]
    pub report: Report,
    pub reporter: Option<UserSummary>,
    #[serde(rename = "newsTitle")]
    pub news_title: Option<String>,
}

/// Body of a report submission
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportSubmission {
    pub news_id: Option<String>,
    pub reporter_user_id: Option<String>,
    pub system_prediction: Option<String>,
    pub user_correction: Option<String>,
    pub source_url: Option<String>,
    pub comments: Option<String>,
}

/// A validated report ready to be stored; always created `pending`
#[derive(Debug, Clone, PartialEq)]
pub struct NewReport {
    pub news_id: Uuid,
    pub reporter_user_id: String,
    pub system_prediction: Label,
    pub user_correction: Label,
    pub source_url: String,
    pub comments: Option<String>,
}

impl ReportSubmission {
    /// Validate a submission made by `caller_id`
    ///
    /// Checks run in a fixed order: required fields, reporter identity,
    /// source URL, labels, then the news id format. Whether the news
    /// article exists is left to the store.
    pub fn validate(self, caller_id: &str) -> Result<NewReport> {
        let (news_id, reporter, system_prediction, user_correction, source_url) = match (
            present(self.news_id),
            present(self.reporter_user_id),
            present(self.system_prediction),
            present(self.user_correction),
            present(self.source_url),
        ) {
            (Some(n), Some(r), Some(p), Some(c), Some(u)) => (n, r, p, c, u),
            _ => return Err(AppError::validation("Missing required fields")),
        };

        if reporter != caller_id {
            tracing::warn!(
                caller = %caller_id,
                claimed = %reporter,
                "Report submitted on behalf of another user"
            );
            return Err(AppError::forbidden("User ID mismatch"));
        }

        let source_url = validate_source_url(&source_url)?;
        let system_prediction: Label = system_prediction.parse()?;
        let user_correction: Label = user_correction.parse()?;
        let news_id = parse_id(&news_id, "News")?;

        Ok(NewReport {
            news_id,
            reporter_user_id: reporter,
            system_prediction,
            user_correction,
            source_url,
            comments: self.comments.map(|c| c.trim().to_string()).filter(|c| !c.is_empty()),
        })
    }
}

/// Body of an admin status update
#[derive(Debug, Clone, Default, Deserialize)]
pub struct StatusUpdate {
    pub status: Option<String>,
}

impl StatusUpdate {
    pub fn verdict(&self) -> Result<Verdict> {
        match self.status.as_deref() {
            Some(s) => s.parse(),
            None => Err(AppError::validation("Missing required field: status")),
        }
    }
}

/// Accept only absolute http(s) URLs with a host
pub fn validate_source_url(raw: &str) -> Result<String> {
    let invalid = || AppError::validation("Invalid source URL format");
    let parsed = url::Url::parse(raw.trim()).map_err(|_| invalid())?;
    match parsed.scheme() {
        "http" | "https" if parsed.host_str().is_some_and(|h| !h.is_empty()) => {
            Ok(raw.trim().to_string())
        }
        _ => Err(invalid()),
    }
}

fn present(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

/// Derived report state of a news article, as shown in the admin listing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReportStatusView {
    /// At least one report awaits review
    Pending,
    /// Reports exist and all have a verdict
    Processed,
    /// Nobody reported the article
    NoReport,
}

/// Report tallies for a single news article
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReportCounts {
    pub pending: u64,
    pub total: u64,
}

impl ReportCounts {
    pub fn view(&self) -> ReportStatusView {
        if self.pending > 0 {
            ReportStatusView::Pending
        } else if self.total > 0 {
            ReportStatusView::Processed
        } else {
            ReportStatusView::NoReport
        }
    }

    /// Fold `(news_id, status, count)` rows into per-article tallies
    pub fn tally<I>(rows: I) -> HashMap<Uuid, ReportCounts>
    where
        I: IntoIterator<Item = (Uuid, ReportStatus, u64)>,
    {
        let mut counts: HashMap<Uuid, ReportCounts> = HashMap::new();
        for (news_id, status, count) in rows {
            let entry = counts.entry(news_id).or_default();
            entry.total += count;
            if !status.is_terminal() {
                entry.pending += count;
            }
        }
        counts
    }
}

/// Report status of `news_id`; articles missing from `counts` have no report
pub fn status_for(news_id: &Uuid, counts: &HashMap<Uuid, ReportCounts>) -> ReportStatusView {
    counts
        .get(news_id)
        .map(ReportCounts::view)
        .unwrap_or(ReportStatusView::NoReport)
}
