use std::collections::BTreeMap;

use anyhow::Result;
use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use uuid::Uuid;

use clearperks_common::{
    classification_text, Classification, ContentItem, ContentKind, DomainTag, Priority, Signal,
    Signals,
};

use crate::extractor::{priority_for, TagSignalExtractor};
use crate::scoring::RelevanceScorer;
use crate::store::ContentStore;

/// Content handed to the core by an upstream producer (recommendation
/// generator, news fetcher, trend aggregator, admin alert form).
///
/// `domain_tags`, `signals` and `priority` are optional overrides: when the
/// producer already knows them, non-empty values win over the classifier.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct IngestRequest {
    pub kind: ContentKind,
    pub title: String,
    #[serde(default)]
    pub body: String,
    #[serde(default)]
    pub source_category: Option<String>,
    #[serde(default)]
    pub estimated_savings: Option<f64>,
    #[serde(default)]
    #[schemars(with = "Option<String>")]
    pub deadline: Option<DateTime<Utc>>,
    #[serde(default)]
    #[schemars(with = "Option<String>")]
    pub published_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub domain_tags: Vec<String>,
    #[serde(default)]
    pub signals: BTreeMap<String, bool>,
    #[serde(default)]
    pub priority: Option<Priority>,
}

impl IngestRequest {
    pub fn new(kind: ContentKind, title: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            kind,
            title: title.into(),
            body: body.into(),
            source_category: None,
            estimated_savings: None,
            deadline: None,
            published_at: None,
            domain_tags: Vec::new(),
            signals: BTreeMap::new(),
            priority: None,
        }
    }
}

/// JSON schema of [`IngestRequest`], for producers validating payloads.
pub fn ingest_request_schema() -> serde_json::Result<serde_json::Value> {
    serde_json::to_value(schemars::schema_for!(IngestRequest))
}

/// Classifies and scores content on its way into the store.
#[derive(Clone, Default)]
pub struct Ingestor {
    extractor: TagSignalExtractor,
    scorer: RelevanceScorer,
}

impl Ingestor {
    pub fn new(extractor: TagSignalExtractor, scorer: RelevanceScorer) -> Self {
        Self { extractor, scorer }
    }

    pub fn extractor(&self) -> &TagSignalExtractor {
        &self.extractor
    }

    pub fn scorer(&self) -> &RelevanceScorer {
        &self.scorer
    }

    /// Build a content record. Brand-new content is scored fully fresh.
    pub fn ingest(&self, request: IngestRequest, now: DateTime<Utc>) -> ContentItem {
        let text = classification_text(&request.title, &request.body);
        let computed = self.extractor.classify(&text);
        let classification = merge_supplied(
            computed,
            &request.domain_tags,
            &request.signals,
            request.priority,
        );

        let relevance = self.scorer.score(
            &classification,
            now,
            request.deadline,
            request.estimated_savings,
            now,
        );

        let item = ContentItem {
            id: Uuid::new_v4(),
            kind: request.kind,
            title: request.title,
            body: request.body,
            source_category: request.source_category,
            estimated_savings: request.estimated_savings,
            deadline: request.deadline,
            published_at: request.published_at,
            created_at: now,
            relevance_score: relevance.total(),
            relevance,
            classification,
        };

        debug!(
            id = %item.id,
            kind = %item.kind,
            tags = ?item.classification.domain_tags,
            score = item.relevance_score,
            "Content ingested"
        );
        item
    }

    /// Recompute classification and score from the stored text. Supplied
    /// overrides from the first ingest are not retained.
    pub fn reclassify(&self, item: &ContentItem, now: DateTime<Utc>) -> ContentItem {
        let classification = self.extractor.classify(&item.text());
        let relevance = self.scorer.score(
            &classification,
            item.created_at,
            item.deadline,
            item.estimated_savings,
            now,
        );

        ContentItem {
            classification,
            relevance_score: relevance.total(),
            relevance,
            ..item.clone()
        }
    }

    /// Reclassification pass over every stored item. Returns how many items
    /// were rewritten; a failed write is logged and skipped.
    pub async fn reclassify_all(&self, store: &dyn ContentStore, now: DateTime<Utc>) -> Result<usize> {
        let items = store.list(None).await?;
        let mut rewritten = 0;

        for item in &items {
            let updated = self.reclassify(item, now);
            match store.put(&updated).await {
                Ok(()) => rewritten += 1,
                Err(e) => warn!(id = %item.id, error = %e, "Failed to store reclassified content"),
            }
        }

        info!(total = items.len(), rewritten, "Reclassification pass complete");
        Ok(rewritten)
    }
}

/// Apply producer-supplied overrides to a computed classification.
///
/// Non-empty supplied tags replace computed tags (unknown names dropped);
/// a non-empty supplied signal map replaces computed signals; a supplied
/// priority wins, otherwise priority follows the effective signals.
pub fn merge_supplied(
    computed: Classification,
    supplied_tags: &[String],
    supplied_signals: &BTreeMap<String, bool>,
    supplied_priority: Option<Priority>,
) -> Classification {
    let mut tags: Vec<DomainTag> = Vec::new();
    for raw in supplied_tags {
        match raw.parse::<DomainTag>() {
            Ok(tag) if !tags.contains(&tag) => tags.push(tag),
            Ok(_) => {}
            Err(_) => debug!(tag = raw.as_str(), "Dropping unknown supplied domain tag"),
        }
    }

    let mut signals = Signals::new();
    for (raw, value) in supplied_signals {
        match raw.parse::<Signal>() {
            Ok(signal) => signals.insert(signal, *value),
            Err(_) => debug!(signal = raw.as_str(), "Dropping unknown supplied signal"),
        }
    }
    let signals_supplied = !supplied_signals.is_empty() && signals != Signals::new();

    let domain_tags = if tags.is_empty() { computed.domain_tags } else { tags };
    let signals = if signals_supplied { signals } else { computed.signals };
    let priority = supplied_priority.unwrap_or_else(|| priority_for(&signals));

    Classification {
        domain_tags,
        signals,
        priority,
        confidence: computed.confidence,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn ingestor() -> Ingestor {
        Ingestor::new(TagSignalExtractor::deterministic(), RelevanceScorer::default())
    }

    #[test]
    fn ingest_classifies_title_and_body() {
        let now = Utc::now();
        let mut request = IngestRequest::new(
            ContentKind::Recommendation,
            "FSA Deadline Approaching",
            "URGENT: Your FSA balance of $500 expires in 30 days. Use it or lose it!",
        );
        request.estimated_savings = Some(500.0);

        let item = ingestor().ingest(request, now);

        assert_eq!(item.classification.domain_tags, vec![DomainTag::Fsa]);
        assert!(item.classification.signals.is_set(Signal::Urgent));
        assert_eq!(item.classification.priority, Priority::High);
        assert_eq!(item.relevance.freshness, 10.0);
        assert_eq!(item.relevance.money, 5.0);
        assert_eq!(item.relevance_score, item.relevance.total());
    }

    #[test]
    fn supplied_tags_and_signals_win() {
        let computed = TagSignalExtractor::deterministic().classify("Use your HSA before the deadline");
        let supplied_signals = BTreeMap::from([("urgent".to_string(), true)]);

        let merged = merge_supplied(
            computed,
            &["TAX".to_string(), "not-a-tag".to_string(), "tax".to_string()],
            &supplied_signals,
            None,
        );

        assert_eq!(merged.domain_tags, vec![DomainTag::Tax]);
        assert!(merged.signals.is_set(Signal::Urgent));
        assert!(!merged.signals.is_set(Signal::HasDeadline));
        assert_eq!(merged.priority, Priority::High);
    }

    #[test]
    fn empty_supplied_values_fall_back_to_computed() {
        let computed = TagSignalExtractor::deterministic().classify("Use your HSA before the deadline");
        let expected = computed.clone();

        let merged = merge_supplied(computed, &[], &BTreeMap::new(), None);

        assert_eq!(merged, expected);
    }

    #[test]
    fn unknown_only_supplied_tags_fall_back() {
        let computed = TagSignalExtractor::deterministic().classify("pension update");
        let merged = merge_supplied(computed, &["CRYPTO".to_string()], &BTreeMap::new(), None);
        assert_eq!(merged.domain_tags, vec![DomainTag::K401]);
    }

    #[test]
    fn supplied_priority_overrides() {
        let computed = TagSignalExtractor::deterministic().classify("urgent: payroll");
        let merged = merge_supplied(computed, &[], &BTreeMap::new(), Some(Priority::Low));
        assert_eq!(merged.priority, Priority::Low);
    }

    #[test]
    fn reclassify_ages_freshness() {
        let ingestor = ingestor();
        let created = Utc::now() - Duration::days(15);
        let item = ingestor.ingest(
            IngestRequest::new(ContentKind::News, "Dental plan changes", ""),
            created,
        );

        let later = ingestor.reclassify(&item, created + Duration::days(15));

        assert_eq!(later.id, item.id);
        assert_eq!(later.classification.domain_tags, vec![DomainTag::Insurance]);
        assert!((later.relevance.freshness - 5.0).abs() < 1e-9);
        assert!(later.relevance_score < item.relevance_score);
    }

    #[test]
    fn schema_describes_request() {
        let schema = ingest_request_schema().unwrap();
        let properties = &schema["properties"];
        assert!(properties.get("title").is_some());
        assert!(properties.get("domain_tags").is_some());
    }
}
