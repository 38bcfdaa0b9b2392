//! Report submission and admin moderation

use crate::auth::AuthContext;
use crate::errors::{AppError, Result};
use crate::ids::parse_id;
use crate::moderation::{Report, ReportDetails, ReportStatus, ReportSubmission, StatusUpdate};
use crate::store::Store;
use crate::users::UserSummary;
use chrono::Utc;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

pub struct ReportService {
    store: Arc<dyn Store>,
}

impl ReportService {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    /// File a dispute against a saved classification. The report is always
    /// created `pending` and the article itself is left untouched.
    pub async fn submit(&self, caller: &AuthContext, submission: ReportSubmission) -> Result<Report> {
        let new_report = submission.validate(&caller.user_id)?;
        let report = self.store.insert_report(new_report).await?;

        crate::metrics::record_report_submitted();
        info!(
            report_id = %report.id,
            news_id = %report.news_id,
            reporter = %report.reporter_user_id,
            "Report submitted"
        );
        Ok(report)
    }

    /// Record an admin verdict. Terminal reports may be re-reviewed; the
    /// latest verdict wins.
    pub async fn transition(
        &self,
        caller: &AuthContext,
        report_id: &str,
        update: StatusUpdate,
    ) -> Result<Report> {
        caller.require_admin()?;
        let id = parse_id(report_id, "Report")?;
        let verdict = update.verdict()?;

        let report = self
            .store
            .apply_verdict(id, verdict, &caller.user_id, Utc::now())
            .await?
            .ok_or_else(|| AppError::ReportNotFound { id: id.to_string() })?;

        crate::metrics::record_moderation(report.status.as_str());
        info!(
            report_id = %report.id,
            news_id = %report.news_id,
            status = report.status.as_str(),
            admin_id = %caller.user_id,
            "Report status updated"
        );
        Ok(report)
    }

    /// Pending reports for an article, newest first
    pub async fn pending_for_news(
        &self,
        caller: &AuthContext,
        news_id: &str,
    ) -> Result<Vec<ReportDetails>> {
        caller.require_admin()?;
        let news_id = parse_id(news_id, "News")?;
        let reports = self
            .store
            .reports_for_news(news_id, Some(ReportStatus::Pending))
            .await?;

        let lookup = self.lookup(news_id, &reports).await?;
        Ok(reports.into_iter().map(|r| lookup.details(r)).collect())
    }

    /// Most recent report of any status for an article
    pub async fn latest_for_news(
        &self,
        caller: &AuthContext,
        news_id: &str,
    ) -> Result<ReportDetails> {
        caller.require_admin()?;
        let news_id = parse_id(news_id, "News")?;
        let report = self
            .store
            .latest_report_for_news(news_id)
            .await?
            .ok_or_else(|| AppError::NotFound {
                message: "No report found for this news article.".to_string(),
            })?;

        let lookup = self.lookup(news_id, std::slice::from_ref(&report)).await?;
        Ok(lookup.details(report))
    }

    /// Title of the article and directory entries of the reporters
    async fn lookup(&self, news_id: Uuid, reports: &[Report]) -> Result<DetailLookup> {
        if reports.is_empty() {
            return Ok(DetailLookup::default());
        }

        let news_title = self.store.find_news(news_id).await?.map(|n| n.title);

        let mut reporter_ids: Vec<String> =
            reports.iter().map(|r| r.reporter_user_id.clone()).collect();
        reporter_ids.sort();
        reporter_ids.dedup();
        let reporters = self
            .store
            .users_by_ids(&reporter_ids)
            .await?
            .into_iter()
            .map(|u| (u.id.clone(), UserSummary::from(u)))
            .collect();

        Ok(DetailLookup {
            news_title,
            reporters,
        })
    }
}

#[derive(Default)]
struct DetailLookup {
    news_title: Option<String>,
    reporters: HashMap<String, UserSummary>,
}

impl DetailLookup {
    fn details(&self, report: Report) -> ReportDetails {
        ReportDetails {
            reporter: self.reporters.get(&report.reporter_user_id).cloned(),
            news_title: self.news_title.clone(),
            report,
        }
    }
}
