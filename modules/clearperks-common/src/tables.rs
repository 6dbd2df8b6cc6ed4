//! Keyword and category lookup tables.
//!
//! Every table is an ordered slice of pairs. Declaration order is
//! load-bearing: tag extraction appends tags in keyword order and category
//! derivation takes the first tag with an entry, so reordering a table
//! changes the displayed category of multi-tag content.

use crate::types::{DomainTag, NotificationCategory, Signal, UiCategory};

/// Keyword → domain tag, matched as lower-case substrings.
pub const KEYWORD_TO_DOMAIN_TAG: &[(&str, DomainTag)] = &[
    ("hsa", DomainTag::Hsa),
    ("health savings", DomainTag::Hsa),
    ("health savings account", DomainTag::Hsa),
    ("fsa", DomainTag::Fsa),
    ("flexible spending", DomainTag::Fsa),
    ("flexible spending account", DomainTag::Fsa),
    ("401k", DomainTag::K401),
    ("401(k)", DomainTag::K401),
    ("retirement", DomainTag::K401),
    ("pension", DomainTag::K401),
    ("pto", DomainTag::Pto),
    ("vacation", DomainTag::Pto),
    ("leave", DomainTag::Pto),
    ("time off", DomainTag::Pto),
    ("paid time off", DomainTag::Pto),
    ("sick leave", DomainTag::Pto),
    ("insurance", DomainTag::Insurance),
    ("medical", DomainTag::Insurance),
    ("dental", DomainTag::Insurance),
    ("vision", DomainTag::Insurance),
    ("health plan", DomainTag::Insurance),
    ("payroll", DomainTag::Payroll),
    ("salary", DomainTag::Payroll),
    ("wage", DomainTag::Payroll),
    ("pay period", DomainTag::Payroll),
    ("tax", DomainTag::Tax),
    ("irs", DomainTag::Tax),
    ("w-2", DomainTag::Tax),
    ("w2", DomainTag::Tax),
    ("deductible", DomainTag::Deductible),
    ("out of pocket", DomainTag::Deductible),
];

/// Signal → keywords; any keyword present sets the signal.
pub const SIGNAL_KEYWORDS: &[(Signal, &[&str])] = &[
    (
        Signal::HasDeadline,
        &["deadline", "expires", "expiring", "due date", "by date", "end of year"],
    ),
    (
        Signal::SavesMoney,
        &[
            "save",
            "savings",
            "optimize",
            "maximize",
            "tax-free",
            "tax advantage",
            "reduce cost",
        ],
    ),
    (
        Signal::PolicyChange,
        &["new policy", "policy change", "update", "amendment", "effective date"],
    ),
    (
        Signal::Urgent,
        &["urgent", "immediately", "asap", "critical", "time-sensitive"],
    ),
    (
        Signal::ActionRequired,
        &[
            "action required",
            "required action",
            "must",
            "need to",
            "please complete",
        ],
    ),
];

/// Domain tag → UI category. First tag with an entry wins.
pub const TAG_TO_UI_CATEGORY: &[(DomainTag, UiCategory)] = &[
    (DomainTag::Hsa, UiCategory::Health),
    (DomainTag::Fsa, UiCategory::Health),
    (DomainTag::Insurance, UiCategory::Health),
    (DomainTag::Deductible, UiCategory::Health),
    (DomainTag::K401, UiCategory::Retirement),
    (DomainTag::Pto, UiCategory::TimeOff),
    (DomainTag::Payroll, UiCategory::Pay),
    (DomainTag::Tax, UiCategory::Pay),
    (DomainTag::BenefitsGeneral, UiCategory::All),
];

/// Domain tag → notification category for classified content that becomes
/// a notification. Tags without an entry fall through to the next tag.
pub const TAG_TO_NOTIFICATION_CATEGORY: &[(DomainTag, NotificationCategory)] = &[
    (DomainTag::Tax, NotificationCategory::Gov),
    (DomainTag::Hsa, NotificationCategory::News),
    (DomainTag::Fsa, NotificationCategory::News),
    (DomainTag::K401, NotificationCategory::News),
    (DomainTag::Pto, NotificationCategory::News),
    (DomainTag::Insurance, NotificationCategory::News),
    (DomainTag::Payroll, NotificationCategory::News),
];

/// Look up `key` in an ordered pair table.
pub fn lookup<K: PartialEq + Copy, V: Copy>(table: &[(K, V)], key: K) -> Option<V> {
    table.iter().find(|(k, _)| *k == key).map(|(_, v)| *v)
}
