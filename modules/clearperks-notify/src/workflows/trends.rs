use std::sync::Arc;

use anyhow::Result;
use tracing::{info, warn};
use uuid::Uuid;

use clearperks_common::{ContentItem, ContentKind, NotificationCategory};

use super::NotifyDeps;
use crate::dispatch::NotificationDraft;

const BODY_MAX_CHARS: usize = 300;

/// Alerts users who opted into trend alerts about high-scoring trends.
pub struct TrendNotifier {
    deps: Arc<NotifyDeps>,
}

impl TrendNotifier {
    pub fn new(deps: Arc<NotifyDeps>) -> Self {
        Self { deps }
    }

    /// Notify about the given trends, or, when `trend_ids` is empty, about
    /// every trend scoring at least the configured threshold. Returns the
    /// number of notifications created.
    pub async fn notify(&self, trend_ids: &[Uuid]) -> Result<usize> {
        let trends = self.select(trend_ids).await?;
        if trends.is_empty() {
            info!("No trends to notify about");
            return Ok(0);
        }

        let recipients = self.recipients().await?;
        if recipients.is_empty() {
            info!(trends = trends.len(), "No users with trend alerts enabled");
            return Ok(0);
        }

        let mut created = 0;
        for trend in &trends {
            let draft = trend_draft(trend);
            created += self
                .deps
                .dispatcher
                .dispatch_to_users(&recipients, &draft)
                .await?;
        }

        info!(
            trends = trends.len(),
            recipients = recipients.len(),
            created,
            "Trend notifications sent"
        );
        Ok(created)
    }

    async fn select(&self, trend_ids: &[Uuid]) -> Result<Vec<ContentItem>> {
        let trends = self.deps.content.list(Some(ContentKind::Trend)).await?;
        let selected = if trend_ids.is_empty() {
            trends
                .into_iter()
                .filter(|t| t.relevance_score >= self.deps.trend_notify_threshold)
                .collect()
        } else {
            trends
                .into_iter()
                .filter(|t| trend_ids.contains(&t.id))
                .collect()
        };
        Ok(selected)
    }

    /// Users with `trend_alerts` on. No preferences row counts as on.
    async fn recipients(&self) -> Result<Vec<Uuid>> {
        let users = self.deps.dispatcher.users();
        let mut recipients = Vec::new();
        for user_id in users.all_user_ids().await? {
            match users.preferences(user_id).await {
                Ok(prefs) if prefs.as_ref().map_or(true, |p| p.trend_alerts) => recipients.push(user_id),
                Ok(_) => {}
                Err(e) => warn!(user_id = %user_id, error = %e, "Failed to load preferences"),
            }
        }
        Ok(recipients)
    }
}

fn trend_draft(trend: &ContentItem) -> NotificationDraft {
    let body: String = trend.body.chars().take(BODY_MAX_CHARS).collect();
    let mut draft = NotificationDraft::builder()
        .title(format!("Benefits Trend: {}", trend.title))
        .body(body)
        .category(NotificationCategory::Trend)
        .priority(trend.classification.priority)
        .build();
    draft
        .data
        .insert("content_id".to_string(), trend.id.to_string());
    draft
}
