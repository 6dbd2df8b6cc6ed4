use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::ClearPerksError;

// --- Domain Tags ---

/// Benefit-level tag stored alongside content. Order of tags on a record is
/// the order the classifier first matched them.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, JsonSchema,
)]
pub enum DomainTag {
    #[serde(rename = "HSA")]
    Hsa,
    #[serde(rename = "FSA")]
    Fsa,
    #[serde(rename = "401K")]
    K401,
    #[serde(rename = "PTO")]
    Pto,
    #[serde(rename = "INSURANCE")]
    Insurance,
    #[serde(rename = "PAYROLL")]
    Payroll,
    #[serde(rename = "TAX")]
    Tax,
    #[serde(rename = "DEDUCTIBLE")]
    Deductible,
    /// Sentinel for content that matched no keyword.
    #[serde(rename = "BENEFITS_GENERAL")]
    BenefitsGeneral,
}

impl DomainTag {
    pub const ALL: [DomainTag; 9] = [
        DomainTag::Hsa,
        DomainTag::Fsa,
        DomainTag::K401,
        DomainTag::Pto,
        DomainTag::Insurance,
        DomainTag::Payroll,
        DomainTag::Tax,
        DomainTag::Deductible,
        DomainTag::BenefitsGeneral,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            DomainTag::Hsa => "HSA",
            DomainTag::Fsa => "FSA",
            DomainTag::K401 => "401K",
            DomainTag::Pto => "PTO",
            DomainTag::Insurance => "INSURANCE",
            DomainTag::Payroll => "PAYROLL",
            DomainTag::Tax => "TAX",
            DomainTag::Deductible => "DEDUCTIBLE",
            DomainTag::BenefitsGeneral => "BENEFITS_GENERAL",
        }
    }
}

impl fmt::Display for DomainTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DomainTag {
    type Err = ClearPerksError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim();
        DomainTag::ALL
            .into_iter()
            .find(|tag| tag.as_str().eq_ignore_ascii_case(wanted))
            .ok_or_else(|| ClearPerksError::Validation(format!("unknown domain tag: {s}")))
    }
}

// --- Signals ---

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, JsonSchema,
)]
#[serde(rename_all = "snake_case")]
pub enum Signal {
    HasDeadline,
    SavesMoney,
    PolicyChange,
    Urgent,
    ActionRequired,
}

impl Signal {
    pub const ALL: [Signal; 5] = [
        Signal::HasDeadline,
        Signal::SavesMoney,
        Signal::PolicyChange,
        Signal::Urgent,
        Signal::ActionRequired,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Signal::HasDeadline => "has_deadline",
            Signal::SavesMoney => "saves_money",
            Signal::PolicyChange => "policy_change",
            Signal::Urgent => "urgent",
            Signal::ActionRequired => "action_required",
        }
    }
}

impl fmt::Display for Signal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Signal {
    type Err = ClearPerksError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim();
        Signal::ALL
            .into_iter()
            .find(|signal| signal.as_str().eq_ignore_ascii_case(wanted))
            .ok_or_else(|| ClearPerksError::Validation(format!("unknown signal: {s}")))
    }
}

/// Boolean signal flags attached to content. A missing entry reads as false.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(transparent)]
pub struct Signals(BTreeMap<Signal, bool>);

impl Signals {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, signal: Signal) {
        self.0.insert(signal, true);
    }

    pub fn insert(&mut self, signal: Signal, value: bool) {
        self.0.insert(signal, value);
    }

    pub fn is_set(&self, signal: Signal) -> bool {
        self.0.get(&signal).copied().unwrap_or(false)
    }

    /// Number of signals that are set.
    pub fn count(&self) -> usize {
        self.0.values().filter(|v| **v).count()
    }

    /// True when no signal is set (explicit `false` entries don't count).
    pub fn is_empty(&self) -> bool {
        self.count() == 0
    }

    pub fn active(&self) -> impl Iterator<Item = Signal> + '_ {
        self.0.iter().filter(|(_, v)| **v).map(|(s, _)| *s)
    }
}

impl FromIterator<Signal> for Signals {
    fn from_iter<I: IntoIterator<Item = Signal>>(iter: I) -> Self {
        let mut signals = Signals::new();
        for signal in iter {
            signals.set(signal);
        }
        signals
    }
}

// --- Priority / Category / Urgency ---

#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema,
)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    High,
    #[default]
    Medium,
    Low,
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Priority::High => write!(f, "high"),
            Priority::Medium => write!(f, "medium"),
            Priority::Low => write!(f, "low"),
        }
    }
}

impl FromStr for Priority {
    type Err = ClearPerksError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "high" => Ok(Priority::High),
            "medium" => Ok(Priority::Medium),
            "low" => Ok(Priority::Low),
            _ => Err(ClearPerksError::Validation(format!("unknown priority: {s}"))),
        }
    }
}

/// Display grouping derived at read time. Never persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
pub enum UiCategory {
    All,
    Pay,
    Health,
    Retirement,
    #[serde(rename = "Time Off")]
    TimeOff,
    Deadlines,
}

impl fmt::Display for UiCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UiCategory::All => write!(f, "All"),
            UiCategory::Pay => write!(f, "Pay"),
            UiCategory::Health => write!(f, "Health"),
            UiCategory::Retirement => write!(f, "Retirement"),
            UiCategory::TimeOff => write!(f, "Time Off"),
            UiCategory::Deadlines => write!(f, "Deadlines"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum UrgencyLevel {
    High,
    Medium,
    Normal,
}

impl fmt::Display for UrgencyLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UrgencyLevel::High => write!(f, "high"),
            UrgencyLevel::Medium => write!(f, "medium"),
            UrgencyLevel::Normal => write!(f, "normal"),
        }
    }
}

/// Category a notification row is filed under; drives preference gating.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema,
)]
#[serde(rename_all = "snake_case")]
pub enum NotificationCategory {
    News,
    Social,
    Gov,
    #[default]
    Manual,
    Trend,
}

impl fmt::Display for NotificationCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NotificationCategory::News => write!(f, "news"),
            NotificationCategory::Social => write!(f, "social"),
            NotificationCategory::Gov => write!(f, "gov"),
            NotificationCategory::Manual => write!(f, "manual"),
            NotificationCategory::Trend => write!(f, "trend"),
        }
    }
}

impl FromStr for NotificationCategory {
    type Err = ClearPerksError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "news" => Ok(NotificationCategory::News),
            "social" => Ok(NotificationCategory::Social),
            "gov" => Ok(NotificationCategory::Gov),
            "manual" => Ok(NotificationCategory::Manual),
            "trend" => Ok(NotificationCategory::Trend),
            _ => Err(ClearPerksError::Validation(format!(
                "unknown notification category: {s}"
            ))),
        }
    }
}

// --- Classification & Relevance ---

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Classification {
    /// Never empty. First-seen keyword order.
    pub domain_tags: Vec<DomainTag>,
    pub signals: Signals,
    pub priority: Priority,
    /// 0.0 - 1.0
    pub confidence: f64,
}

/// Upper bound of every relevance component.
pub const COMPONENT_MAX: f64 = 10.0;

/// Clamp a relevance component into `[0, COMPONENT_MAX]`. NaN scores as zero.
pub fn clamp_component(value: f64) -> f64 {
    if value.is_nan() {
        return 0.0;
    }
    value.clamp(0.0, COMPONENT_MAX)
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct RelevanceComponents {
    pub freshness: f64,
    pub urgency: f64,
    pub money: f64,
    pub confidence: f64,
    #[serde(default)]
    pub user_fit: f64,
}

impl RelevanceComponents {
    /// Composite relevance: unweighted sum of the clamped components (0-50).
    pub fn total(&self) -> f64 {
        clamp_component(self.freshness)
            + clamp_component(self.urgency)
            + clamp_component(self.money)
            + clamp_component(self.confidence)
            + clamp_component(self.user_fit)
    }
}

// --- Content ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum ContentKind {
    Recommendation,
    News,
    Trend,
    Alert,
}

impl fmt::Display for ContentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ContentKind::Recommendation => write!(f, "recommendation"),
            ContentKind::News => write!(f, "news"),
            ContentKind::Trend => write!(f, "trend"),
            ContentKind::Alert => write!(f, "alert"),
        }
    }
}

/// A classified, scored piece of content. Classification and score are
/// computed once at ingestion; UI category and urgency are derived on read.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContentItem {
    pub id: Uuid,
    pub kind: ContentKind,
    pub title: String,
    pub body: String,
    /// Feed section for news items ("benefits", "tax law", ...).
    pub source_category: Option<String>,
    pub estimated_savings: Option<f64>,
    pub deadline: Option<DateTime<Utc>>,
    pub published_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub classification: Classification,
    pub relevance: RelevanceComponents,
    pub relevance_score: f64,
}

impl ContentItem {
    /// Text the classifier sees for this item.
    pub fn text(&self) -> String {
        classification_text(&self.title, &self.body)
    }
}

pub fn classification_text(title: &str, body: &str) -> String {
    match (title.trim().is_empty(), body.trim().is_empty()) {
        (true, _) => body.to_string(),
        (false, true) => title.to_string(),
        (false, false) => format!("{title}. {body}"),
    }
}
