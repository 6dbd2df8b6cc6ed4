use chrono::{DateTime, Utc};

use clearperks_common::{clamp_component, Classification, RelevanceComponents, Signal, Signals};

use crate::category::days_until;

pub const DEFAULT_MAX_AGE_DAYS: i64 = 30;

/// Confidence component used when scoring without a classification call.
pub const BASELINE_CONFIDENCE: f64 = 7.0;

/// Turns tags, signals, amounts and timestamps into bounded relevance
/// components. Every component lands in `[0, 10]`; the composite is their
/// plain sum.
#[derive(Debug, Clone, Copy)]
pub struct RelevanceScorer {
    max_age_days: i64,
}

impl Default for RelevanceScorer {
    fn default() -> Self {
        Self {
            max_age_days: DEFAULT_MAX_AGE_DAYS,
        }
    }
}

impl RelevanceScorer {
    pub fn new(max_age_days: i64) -> Self {
        Self {
            max_age_days: max_age_days.max(1),
        }
    }

    pub fn max_age_days(&self) -> i64 {
        self.max_age_days
    }

    /// Linear decay from 10 (age 0 or a future timestamp) to 0 at
    /// `max_age_days`. Age is counted in whole days.
    pub fn freshness(&self, created_at: DateTime<Utc>, now: DateTime<Utc>) -> f64 {
        self.freshness_for_age(days_until(now, created_at))
    }

    pub fn freshness_for_age(&self, age_days: i64) -> f64 {
        if age_days <= 0 {
            return 10.0;
        }
        if age_days >= self.max_age_days {
            return 0.0;
        }
        clamp_component(10.0 * (1.0 - age_days as f64 / self.max_age_days as f64))
    }

    /// Urgent +4, action required +3, plus deadline proximity: with a date
    /// ≤3 days +3, ≤7 +2, ≤14 +1; a deadline signal without a date +1.
    pub fn urgency(signals: &Signals, deadline: Option<DateTime<Utc>>, now: DateTime<Utc>) -> f64 {
        let mut score = 0.0;
        if signals.is_set(Signal::Urgent) {
            score += 4.0;
        }
        if signals.is_set(Signal::ActionRequired) {
            score += 3.0;
        }

        match deadline {
            Some(deadline) => {
                let days = days_until(deadline, now);
                if days <= 3 {
                    score += 3.0;
                } else if days <= 7 {
                    score += 2.0;
                } else if days <= 14 {
                    score += 1.0;
                }
            }
            None if signals.is_set(Signal::HasDeadline) => score += 1.0,
            None => {}
        }

        clamp_component(score)
    }

    /// Saves-money +3, plus a tier bonus on the estimated savings.
    pub fn money(signals: &Signals, estimated_savings: Option<f64>) -> f64 {
        let mut score = 0.0;
        if signals.is_set(Signal::SavesMoney) {
            score += 3.0;
        }

        if let Some(amount) = estimated_savings {
            score += if amount >= 1000.0 {
                7.0
            } else if amount >= 500.0 {
                5.0
            } else if amount >= 100.0 {
                3.0
            } else if amount > 0.0 {
                1.0
            } else {
                0.0
            };
        }

        clamp_component(score)
    }

    /// Classification confidence on the 0-10 scale, or the fixed baseline.
    pub fn confidence(classification: Option<&Classification>) -> f64 {
        match classification {
            Some(c) => clamp_component(c.confidence * 10.0),
            None => BASELINE_CONFIDENCE,
        }
    }

    /// Score a classified item. Pass `created_at == now` for brand-new
    /// content to get full freshness.
    pub fn score(
        &self,
        classification: &Classification,
        created_at: DateTime<Utc>,
        deadline: Option<DateTime<Utc>>,
        estimated_savings: Option<f64>,
        now: DateTime<Utc>,
    ) -> RelevanceComponents {
        RelevanceComponents {
            freshness: self.freshness(created_at, now),
            urgency: Self::urgency(&classification.signals, deadline, now),
            money: Self::money(&classification.signals, estimated_savings),
            confidence: Self::confidence(Some(classification)),
            user_fit: 0.0,
        }
    }
}
