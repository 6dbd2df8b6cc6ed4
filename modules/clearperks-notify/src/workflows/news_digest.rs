use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use tracing::{info, warn};

use clearperks_common::{ContentItem, ContentKind, NotificationCategory, Priority};
use clearperks_signals::feed;

use super::NotifyDeps;
use crate::dispatch::NotificationDraft;

const FALLBACK_BODY: &str = "New updates are available in this category.";

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Digest {
    pub title: String,
    pub body: String,
}

/// Writes the title and body of a category digest, typically with a
/// generative model. `Ok(None)` means "nothing usable"; the workflow then
/// uses default copy.
#[async_trait]
pub trait DigestWriter: Send + Sync {
    async fn write(&self, category: &str, context: &str) -> Result<Option<Digest>>;
}

/// Writer for deployments without a model: always falls back.
pub struct NoopDigestWriter;

#[async_trait]
impl DigestWriter for NoopDigestWriter {
    async fn write(&self, _category: &str, _context: &str) -> Result<Option<Digest>> {
        Ok(None)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DigestResult {
    pub category: String,
    pub title: String,
    pub dispatched_count: usize,
}

/// One digest notification per news source category with recent items,
/// broadcast to every user.
pub struct NewsDigestWorkflow {
    deps: Arc<NotifyDeps>,
    writer: Arc<dyn DigestWriter>,
}

impl NewsDigestWorkflow {
    pub fn new(deps: Arc<NotifyDeps>, writer: Arc<dyn DigestWriter>) -> Self {
        Self { deps, writer }
    }

    pub async fn run(&self, now: DateTime<Utc>) -> Result<Vec<DigestResult>> {
        let since = now - Duration::hours(self.deps.news_lookback_hours);
        let news = self.deps.content.list(Some(ContentKind::News)).await?;
        let grouped = feed::newest_per_source_category(news, since, self.deps.news_per_category_limit);

        if grouped.is_empty() {
            info!(lookback_hours = self.deps.news_lookback_hours, "No recent news, skipping digest");
            return Ok(Vec::new());
        }

        let mut results = Vec::with_capacity(grouped.len());
        for (category, items) in grouped {
            let context = digest_context(&category, &items);
            let digest = match self.writer.write(&category, &context).await {
                Ok(Some(digest)) if !digest.title.trim().is_empty() => digest,
                Ok(_) => fallback_digest(&category),
                Err(e) => {
                    warn!(category = %category, error = %e, "Digest writer failed, using default copy");
                    fallback_digest(&category)
                }
            };

            let draft = NotificationDraft::builder()
                .title(digest.title.clone())
                .body(digest.body)
                .category(NotificationCategory::News)
                .priority(Priority::Medium)
                .build();
            let dispatched_count = self.deps.dispatcher.dispatch_to_all(&draft).await?;

            info!(category = %category, items = items.len(), dispatched_count, "News digest sent");
            results.push(DigestResult {
                category,
                title: digest.title,
                dispatched_count,
            });
        }

        Ok(results)
    }
}

fn digest_context(category: &str, items: &[ContentItem]) -> String {
    let mut context = format!("Top {} news items for category '{}':", items.len(), category);
    for item in items {
        context.push_str(&format!("\n- {}: {}", item.title, item.body));
    }
    context
}

fn fallback_digest(category: &str) -> Digest {
    Digest {
        title: format!("Update: {category}"),
        body: FALLBACK_BODY.to_string(),
    }
}
