//! Read-time derivation of UI category, urgency and deadline eligibility.
//!
//! None of this is persisted. Every read recomputes it from the stored tags
//! and signals, so a table change takes effect without a migration.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use clearperks_common::tables::{lookup, TAG_TO_UI_CATEGORY};
use clearperks_common::{ContentItem, DomainTag, Priority, Signal, Signals, UiCategory, UrgencyLevel};

/// Category of the first tag with a table entry; `All` when none has one.
pub fn derive_category(tags: &[DomainTag], _signals: &Signals) -> UiCategory {
    tags.iter()
        .find_map(|tag| lookup(TAG_TO_UI_CATEGORY, *tag))
        .unwrap_or(UiCategory::All)
}

pub fn derive_urgency(
    signals: &Signals,
    priority: Priority,
    deadline: Option<DateTime<Utc>>,
    now: DateTime<Utc>,
) -> UrgencyLevel {
    if signals.is_set(Signal::Urgent) || signals.is_set(Signal::ActionRequired) {
        return UrgencyLevel::High;
    }

    if priority == Priority::High {
        return UrgencyLevel::High;
    }

    if signals.is_set(Signal::HasDeadline) {
        return match deadline.map(|d| days_until(d, now)) {
            Some(days) if days <= 7 => UrgencyLevel::High,
            _ => UrgencyLevel::Medium,
        };
    }

    UrgencyLevel::Normal
}

/// Whether content shows up in the Deadlines view. This is an overlay:
/// the item keeps its primary category as well.
pub fn is_deadline_eligible(
    signals: &Signals,
    deadline: Option<DateTime<Utc>>,
    now: DateTime<Utc>,
) -> bool {
    signals.is_set(Signal::HasDeadline) || deadline.is_some_and(|d| d > now)
}

/// Whole days from `now` until `deadline`, floored (a deadline 12 hours in
/// the past is -1 days away).
pub fn days_until(deadline: DateTime<Utc>, now: DateTime<Utc>) -> i64 {
    (deadline - now).num_seconds().div_euclid(86_400)
}

/// Derived fields attached to content on read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContentView {
    pub ui_category: UiCategory,
    pub urgency_level: UrgencyLevel,
    pub is_deadline: bool,
}

pub fn derive_view(item: &ContentItem, now: DateTime<Utc>) -> ContentView {
    let c = &item.classification;
    ContentView {
        ui_category: derive_category(&c.domain_tags, &c.signals),
        urgency_level: derive_urgency(&c.signals, c.priority, item.deadline, now),
        is_deadline: is_deadline_eligible(&c.signals, item.deadline, now),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn signals(list: &[Signal]) -> Signals {
        list.iter().copied().collect()
    }

    #[test]
    fn first_tag_wins() {
        let none = Signals::new();
        assert_eq!(derive_category(&[DomainTag::Payroll, DomainTag::Tax], &none), UiCategory::Pay);
        assert_eq!(
            derive_category(&[DomainTag::Pto, DomainTag::Hsa], &none),
            UiCategory::TimeOff
        );
        assert_eq!(
            derive_category(&[DomainTag::K401, DomainTag::Fsa], &none),
            UiCategory::Retirement
        );
    }

    #[test]
    fn general_and_empty_fall_back_to_all() {
        let none = Signals::new();
        assert_eq!(derive_category(&[DomainTag::BenefitsGeneral], &none), UiCategory::All);
        assert_eq!(derive_category(&[], &none), UiCategory::All);
    }

    #[test]
    fn derive_category_is_pure() {
        let tags = [DomainTag::Deductible, DomainTag::K401];
        let s = signals(&[Signal::HasDeadline]);
        let first = derive_category(&tags, &s);
        for _ in 0..10 {
            assert_eq!(derive_category(&tags, &s), first);
        }
        assert_eq!(first, UiCategory::Health);
    }

    #[test]
    fn urgent_signals_are_high() {
        let now = Utc::now();
        assert_eq!(
            derive_urgency(&signals(&[Signal::Urgent]), Priority::Low, None, now),
            UrgencyLevel::High
        );
        assert_eq!(
            derive_urgency(&signals(&[Signal::ActionRequired]), Priority::Medium, None, now),
            UrgencyLevel::High
        );
    }

    #[test]
    fn high_priority_is_high_urgency() {
        assert_eq!(
            derive_urgency(&Signals::new(), Priority::High, None, Utc::now()),
            UrgencyLevel::High
        );
    }

    #[test]
    fn deadline_proximity_sets_urgency() {
        let now = Utc::now();
        let s = signals(&[Signal::HasDeadline]);
        assert_eq!(
            derive_urgency(&s, Priority::Medium, Some(now + Duration::days(5)), now),
            UrgencyLevel::High
        );
        assert_eq!(
            derive_urgency(&s, Priority::Medium, Some(now + Duration::days(20)), now),
            UrgencyLevel::Medium
        );
        assert_eq!(
            derive_urgency(&s, Priority::Medium, Some(now + Duration::days(90)), now),
            UrgencyLevel::Medium
        );
        assert_eq!(derive_urgency(&s, Priority::Medium, None, now), UrgencyLevel::Medium);
    }

    #[test]
    fn deadline_date_without_signal_stays_normal() {
        let now = Utc::now();
        assert_eq!(
            derive_urgency(&Signals::new(), Priority::Medium, Some(now + Duration::days(1)), now),
            UrgencyLevel::Normal
        );
    }

    #[test]
    fn deadline_eligibility() {
        let now = Utc::now();
        assert!(is_deadline_eligible(&signals(&[Signal::HasDeadline]), None, now));
        assert!(is_deadline_eligible(&Signals::new(), Some(now + Duration::hours(2)), now));
        assert!(!is_deadline_eligible(&Signals::new(), Some(now - Duration::hours(2)), now));
        assert!(!is_deadline_eligible(&Signals::new(), None, now));
    }

    #[test]
    fn days_until_floors() {
        let now = Utc::now();
        assert_eq!(days_until(now - Duration::hours(12), now), -1);
        assert_eq!(days_until(now + Duration::hours(36), now), 1);
        assert_eq!(days_until(now, now), 0);
    }
}
