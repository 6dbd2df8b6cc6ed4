use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::ClearPerksError;

#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema,
)]
#[serde(rename_all = "snake_case")]
pub enum NewsFrequency {
    #[default]
    Daily,
    Weekly,
    Off,
}

impl fmt::Display for NewsFrequency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NewsFrequency::Daily => write!(f, "daily"),
            NewsFrequency::Weekly => write!(f, "weekly"),
            NewsFrequency::Off => write!(f, "off"),
        }
    }
}

impl FromStr for NewsFrequency {
    type Err = ClearPerksError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "daily" => Ok(NewsFrequency::Daily),
            "weekly" => Ok(NewsFrequency::Weekly),
            "off" => Ok(NewsFrequency::Off),
            _ => Err(ClearPerksError::Validation(format!(
                "news_frequency must be daily, weekly or off (got {s})"
            ))),
        }
    }
}

#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema,
)]
pub enum SocialUpdates {
    #[default]
    #[serde(rename = "yes")]
    Yes,
    #[serde(rename = "no")]
    No,
    /// Only very important (high priority) social updates.
    #[serde(rename = "vimp-only")]
    VimpOnly,
}

impl fmt::Display for SocialUpdates {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SocialUpdates::Yes => write!(f, "yes"),
            SocialUpdates::No => write!(f, "no"),
            SocialUpdates::VimpOnly => write!(f, "vimp-only"),
        }
    }
}

impl FromStr for SocialUpdates {
    type Err = ClearPerksError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "yes" => Ok(SocialUpdates::Yes),
            "no" => Ok(SocialUpdates::No),
            "vimp-only" => Ok(SocialUpdates::VimpOnly),
            _ => Err(ClearPerksError::Validation(format!(
                "social_updates must be yes, no or vimp-only (got {s})"
            ))),
        }
    }
}

/// Per-user notification preferences. Absence of a row means "allow all".
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NotificationPreference {
    pub user_id: Uuid,

    // Legacy per-domain toggles, superseded by the fields below except
    // `trend_alerts`, which still selects trend digest recipients.
    pub pto_alerts: bool,
    pub fsa_alerts: bool,
    pub hsa_alerts: bool,
    pub k401_alerts: bool,
    pub deductible_alerts: bool,
    pub trend_alerts: bool,

    pub news_frequency: NewsFrequency,
    pub social_updates: SocialUpdates,
    pub gov_notifications: bool,
    /// Global kill switch. Overrides priority.
    pub all_disabled: bool,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl NotificationPreference {
    /// The row created the first time a user is seen: everything allowed.
    pub fn permissive(user_id: Uuid, now: DateTime<Utc>) -> Self {
        Self {
            user_id,
            pto_alerts: true,
            fsa_alerts: true,
            hsa_alerts: true,
            k401_alerts: true,
            deductible_alerts: true,
            trend_alerts: true,
            news_frequency: NewsFrequency::Daily,
            social_updates: SocialUpdates::Yes,
            gov_notifications: true,
            all_disabled: false,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Partial preference update. Unset fields are left alone; the string
/// fields are validated before anything is written.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct PreferencePatch {
    pub pto_alerts: Option<bool>,
    pub fsa_alerts: Option<bool>,
    pub hsa_alerts: Option<bool>,
    pub k401_alerts: Option<bool>,
    pub deductible_alerts: Option<bool>,
    pub trend_alerts: Option<bool>,
    pub news_frequency: Option<String>,
    pub social_updates: Option<String>,
    pub gov_notifications: Option<bool>,
    pub all_disabled: Option<bool>,
}

impl PreferencePatch {
    pub fn apply(
        &self,
        prefs: &mut NotificationPreference,
        now: DateTime<Utc>,
    ) -> Result<(), ClearPerksError> {
        let news_frequency = self
            .news_frequency
            .as_deref()
            .map(str::parse::<NewsFrequency>)
            .transpose()?;
        let social_updates = self
            .social_updates
            .as_deref()
            .map(str::parse::<SocialUpdates>)
            .transpose()?;

        let toggles = [
            (self.pto_alerts, &mut prefs.pto_alerts),
            (self.fsa_alerts, &mut prefs.fsa_alerts),
            (self.hsa_alerts, &mut prefs.hsa_alerts),
            (self.k401_alerts, &mut prefs.k401_alerts),
            (self.deductible_alerts, &mut prefs.deductible_alerts),
            (self.trend_alerts, &mut prefs.trend_alerts),
            (self.gov_notifications, &mut prefs.gov_notifications),
            (self.all_disabled, &mut prefs.all_disabled),
        ];
        for (value, field) in toggles {
            if let Some(value) = value {
                *field = value;
            }
        }
        if let Some(freq) = news_frequency {
            prefs.news_frequency = freq;
        }
        if let Some(social) = social_updates {
            prefs.social_updates = social;
        }

        prefs.updated_at = now;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn permissive_defaults_allow_everything() {
        let prefs = NotificationPreference::permissive(Uuid::new_v4(), Utc::now());
        assert!(!prefs.all_disabled);
        assert!(prefs.gov_notifications);
        assert!(prefs.trend_alerts);
        assert_eq!(prefs.news_frequency, NewsFrequency::Daily);
        assert_eq!(prefs.social_updates, SocialUpdates::Yes);
    }

    #[test]
    fn patch_only_touches_set_fields() {
        let created = Utc::now() - chrono::Duration::days(3);
        let mut prefs = NotificationPreference::permissive(Uuid::new_v4(), created);
        let patch = PreferencePatch {
            news_frequency: Some("off".into()),
            all_disabled: Some(true),
            ..Default::default()
        };

        let now = Utc::now();
        patch.apply(&mut prefs, now).unwrap();

        assert_eq!(prefs.news_frequency, NewsFrequency::Off);
        assert!(prefs.all_disabled);
        assert!(prefs.gov_notifications);
        assert_eq!(prefs.updated_at, now);
        assert_eq!(prefs.created_at, created);
    }

    #[test]
    fn invalid_patch_leaves_row_untouched() {
        let mut prefs = NotificationPreference::permissive(Uuid::new_v4(), Utc::now());
        let before = prefs.clone();
        let patch = PreferencePatch {
            all_disabled: Some(true),
            social_updates: Some("sometimes".into()),
            ..Default::default()
        };

        assert!(patch.apply(&mut prefs, Utc::now()).is_err());
        assert_eq!(prefs, before);
    }

    #[test]
    fn social_updates_uses_hyphenated_wire_name() {
        let json = serde_json::to_string(&SocialUpdates::VimpOnly).unwrap();
        assert_eq!(json, r#""vimp-only""#);
        assert_eq!("VIMP-ONLY".parse::<SocialUpdates>().unwrap(), SocialUpdates::VimpOnly);
    }
}
