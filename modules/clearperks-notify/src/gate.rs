//! Preference gate: may this user be notified about this piece?
//!
//! Rules, in order:
//! 1. no preferences row ⇒ allow;
//! 2. `all_disabled` ⇒ suppress, whatever the priority;
//! 3. high priority ⇒ allow;
//! 4. category rules (news/social/gov); manual and trend have none;
//! 5. allow.

use std::fmt;

use clearperks_common::{
    NewsFrequency, NotificationCategory, NotificationPreference, Priority, SocialUpdates,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SuppressReason {
    AllDisabled,
    NewsOff,
    SocialOff,
    /// Social updates limited to high priority.
    SocialVimpOnly,
    GovOff,
}

impl fmt::Display for SuppressReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SuppressReason::AllDisabled => write!(f, "all notifications disabled"),
            SuppressReason::NewsOff => write!(f, "news frequency off"),
            SuppressReason::SocialOff => write!(f, "social updates off"),
            SuppressReason::SocialVimpOnly => write!(f, "social updates limited to high priority"),
            SuppressReason::GovOff => write!(f, "gov notifications off"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateDecision {
    Allow,
    Suppress(SuppressReason),
}

impl GateDecision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, GateDecision::Allow)
    }
}

pub fn evaluate(
    prefs: Option<&NotificationPreference>,
    category: NotificationCategory,
    priority: Priority,
) -> GateDecision {
    let Some(prefs) = prefs else {
        return GateDecision::Allow;
    };

    if prefs.all_disabled {
        return GateDecision::Suppress(SuppressReason::AllDisabled);
    }

    if priority == Priority::High {
        return GateDecision::Allow;
    }

    let reason = match category {
        NotificationCategory::News if prefs.news_frequency == NewsFrequency::Off => {
            Some(SuppressReason::NewsOff)
        }
        NotificationCategory::Social => match prefs.social_updates {
            SocialUpdates::No => Some(SuppressReason::SocialOff),
            // High priority already returned above.
            SocialUpdates::VimpOnly => Some(SuppressReason::SocialVimpOnly),
            SocialUpdates::Yes => None,
        },
        NotificationCategory::Gov if !prefs.gov_notifications => Some(SuppressReason::GovOff),
        _ => None,
    };

    match reason {
        Some(reason) => GateDecision::Suppress(reason),
        None => GateDecision::Allow,
    }
}

pub fn allow(
    prefs: Option<&NotificationPreference>,
    category: NotificationCategory,
    priority: Priority,
) -> bool {
    evaluate(prefs, category, priority).is_allowed()
}
