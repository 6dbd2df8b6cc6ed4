//! Keyword-based tag and signal extraction.
//!
//! A pure function over text: no model to load, nothing shared between
//! calls. The only nondeterminism is the confidence jitter, which comes
//! from an injectable [`Jitter`] source and never feeds category or gating
//! decisions.

use std::sync::Arc;

use rand::Rng;

use clearperks_common::tables::{
    lookup, KEYWORD_TO_DOMAIN_TAG, SIGNAL_KEYWORDS, TAG_TO_NOTIFICATION_CATEGORY,
};
use clearperks_common::{Classification, DomainTag, NotificationCategory, Priority, Signal, Signals};

const BASE_CONFIDENCE: f64 = 0.70;
const TAG_BOOST_PER_TAG: f64 = 0.05;
const TAG_BOOST_CAP: f64 = 0.15;
const SIGNAL_BOOST_PER_SIGNAL: f64 = 0.03;
const SIGNAL_BOOST_CAP: f64 = 0.10;
const JITTER_SPAN: f64 = 0.05;
const MAX_CONFIDENCE: f64 = 0.99;

/// Source of the confidence jitter term.
pub trait Jitter: Send + Sync {
    /// A sample in `[0, 1)`.
    fn sample(&self) -> f64;
}

/// Thread-local RNG jitter. The default.
pub struct RandomJitter;

impl Jitter for RandomJitter {
    fn sample(&self) -> f64 {
        rand::rng().random::<f64>()
    }
}

/// Constant jitter for reproducible runs.
pub struct FixedJitter(pub f64);

impl Jitter for FixedJitter {
    fn sample(&self) -> f64 {
        self.0.clamp(0.0, 1.0)
    }
}

#[derive(Clone)]
pub struct TagSignalExtractor {
    jitter: Arc<dyn Jitter>,
}

impl Default for TagSignalExtractor {
    fn default() -> Self {
        Self {
            jitter: Arc::new(RandomJitter),
        }
    }
}

impl TagSignalExtractor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_jitter(jitter: Arc<dyn Jitter>) -> Self {
        Self { jitter }
    }

    /// Extractor with zero jitter: identical text always yields an identical
    /// classification.
    pub fn deterministic() -> Self {
        Self::with_jitter(Arc::new(FixedJitter(0.0)))
    }

    /// Classify free text. Total over all input: empty or nonsense text
    /// yields `[BENEFITS_GENERAL]` with no signals.
    pub fn classify(&self, text: &str) -> Classification {
        let lowered = text.to_lowercase();

        let domain_tags = extract_tags(&lowered);
        let signals = extract_signals(&lowered);
        let priority = priority_for(&signals);
        let confidence = confidence_for(domain_tags.len(), signals.count(), self.jitter.sample());

        Classification {
            domain_tags,
            signals,
            priority,
            confidence,
        }
    }
}

/// Tags in keyword-table order, duplicates suppressed. Never empty.
/// `text` must already be lower-cased.
pub fn extract_tags(text: &str) -> Vec<DomainTag> {
    let mut tags: Vec<DomainTag> = Vec::new();
    for (keyword, tag) in KEYWORD_TO_DOMAIN_TAG {
        if text.contains(keyword) && !tags.contains(tag) {
            tags.push(*tag);
        }
    }

    if tags.is_empty() {
        tags.push(DomainTag::BenefitsGeneral);
    }
    tags
}

/// Signals whose keyword lists hit `text` (lower-cased).
pub fn extract_signals(text: &str) -> Signals {
    SIGNAL_KEYWORDS
        .iter()
        .filter(|(_, keywords)| keywords.iter().any(|kw| text.contains(kw)))
        .map(|(signal, _)| *signal)
        .collect()
}

/// High when the content is urgent or demands action; medium otherwise.
/// A deadline alone keeps the default.
pub fn priority_for(signals: &Signals) -> Priority {
    if signals.is_set(Signal::Urgent) || signals.is_set(Signal::ActionRequired) {
        Priority::High
    } else {
        Priority::Medium
    }
}

/// `jitter_sample` in `[0, 1]` is scaled onto the jitter span.
pub fn confidence_for(tag_count: usize, signal_count: usize, jitter_sample: f64) -> f64 {
    let tag_boost = (tag_count as f64 * TAG_BOOST_PER_TAG).min(TAG_BOOST_CAP);
    let signal_boost = (signal_count as f64 * SIGNAL_BOOST_PER_SIGNAL).min(SIGNAL_BOOST_CAP);
    let jitter = jitter_sample.clamp(0.0, 1.0) * JITTER_SPAN;

    let confidence = (BASE_CONFIDENCE + tag_boost + signal_boost + jitter).min(MAX_CONFIDENCE);
    (confidence * 10_000.0).round() / 10_000.0
}

/// Notification category for classified content: first tag with an entry,
/// news when none has one.
pub fn notification_category(tags: &[DomainTag]) -> NotificationCategory {
    tags.iter()
        .find_map(|tag| lookup(TAG_TO_NOTIFICATION_CATEGORY, *tag))
        .unwrap_or(NotificationCategory::News)
}
