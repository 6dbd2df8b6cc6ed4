use std::cmp::Ordering;
use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use clearperks_common::{ContentItem, ContentKind, DomainTag, Signal};

use crate::category::{derive_view, is_deadline_eligible, ContentView};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortBy {
    #[default]
    RelevanceScore,
    PublishedAt,
    CreatedAt,
}

#[derive(Debug, Clone, Default)]
pub struct FeedQuery {
    pub kind: Option<ContentKind>,
    pub domain_tag: Option<DomainTag>,
    /// Only items carrying the deadline signal.
    pub has_deadline: bool,
    /// Only items carrying the saves-money signal.
    pub saves_money: bool,
    pub sort_by: SortBy,
    pub limit: Option<usize>,
}

/// A stored item with its read-time derived fields.
#[derive(Debug, Clone, Serialize)]
pub struct FeedEntry {
    #[serde(flatten)]
    pub item: ContentItem,
    #[serde(flatten)]
    pub view: ContentView,
}

pub fn query(items: Vec<ContentItem>, query: &FeedQuery, now: DateTime<Utc>) -> Vec<FeedEntry> {
    let mut matched: Vec<ContentItem> = items
        .into_iter()
        .filter(|item| query.kind.map_or(true, |k| item.kind == k))
        .filter(|item| {
            query
                .domain_tag
                .map_or(true, |tag| item.classification.domain_tags.contains(&tag))
        })
        .filter(|item| !query.has_deadline || item.classification.signals.is_set(Signal::HasDeadline))
        .filter(|item| !query.saves_money || item.classification.signals.is_set(Signal::SavesMoney))
        .collect();

    matched.sort_by(|a, b| compare(a, b, query.sort_by));
    if let Some(limit) = query.limit {
        matched.truncate(limit);
    }

    matched
        .into_iter()
        .map(|item| FeedEntry {
            view: derive_view(&item, now),
            item,
        })
        .collect()
}

/// Everything that belongs in the Deadlines view, most relevant first.
pub fn deadlines_view(items: Vec<ContentItem>, now: DateTime<Utc>) -> Vec<FeedEntry> {
    let eligible: Vec<ContentItem> = items
        .into_iter()
        .filter(|item| is_deadline_eligible(&item.classification.signals, item.deadline, now))
        .collect();
    query(eligible, &FeedQuery::default(), now)
}

/// Newest `limit` items per source category created at or after `since`.
/// Items without a source category are skipped.
pub fn newest_per_source_category(
    items: Vec<ContentItem>,
    since: DateTime<Utc>,
    limit: usize,
) -> BTreeMap<String, Vec<ContentItem>> {
    let mut grouped: BTreeMap<String, Vec<ContentItem>> = BTreeMap::new();
    for item in items.into_iter().filter(|item| item.created_at >= since) {
        if let Some(category) = item.source_category.clone() {
            grouped.entry(category).or_default().push(item);
        }
    }

    for articles in grouped.values_mut() {
        articles.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        articles.truncate(limit);
    }
    grouped.retain(|_, articles| !articles.is_empty());
    grouped
}

fn compare(a: &ContentItem, b: &ContentItem, sort_by: SortBy) -> Ordering {
    match sort_by {
        SortBy::RelevanceScore => b.relevance_score.total_cmp(&a.relevance_score),
        // Undated items sort last.
        SortBy::PublishedAt => match (a.published_at, b.published_at) {
            (Some(a), Some(b)) => b.cmp(&a),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => Ordering::Equal,
        },
        SortBy::CreatedAt => b.created_at.cmp(&a.created_at),
    }
}
