use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::types::{NotificationCategory, Priority};

/// A push delivery address: one installed app instance of one user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeviceToken {
    pub id: Uuid,
    pub user_id: Uuid,
    /// Opaque provider token.
    pub token: String,
    /// "ios", "android", "web", or unknown.
    pub platform: Option<String>,
    pub created_at: DateTime<Utc>,
    pub last_used_at: DateTime<Utc>,
}

impl DeviceToken {
    pub fn new(user_id: Uuid, token: String, platform: Option<String>, now: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_id,
            token,
            platform,
            created_at: now,
            last_used_at: now,
        }
    }

    /// Token with everything but the last four characters hidden.
    pub fn masked(&self) -> String {
        let chars: Vec<char> = self.token.chars().collect();
        if chars.len() > 4 {
            let tail: String = chars[chars.len() - 4..].iter().collect();
            format!("...{tail}")
        } else {
            "****".to_string()
        }
    }
}

/// Durable record of intent to notify one user. `push_sent`/`push_error`
/// record the delivery outcome separately.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notification {
    pub id: Uuid,
    pub user_id: Uuid,
    pub title: String,
    pub body: String,
    pub category: NotificationCategory,
    pub priority: Priority,
    pub is_cleared: bool,
    pub push_sent: bool,
    pub push_error: Option<String>,
    pub should_push: bool,
    pub scheduled_for: Option<DateTime<Utc>>,
    pub sent_at: Option<DateTime<Utc>>,
    pub read_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

/// Delivery outcome written back onto a notification row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PushOutcome {
    pub push_sent: bool,
    pub push_error: Option<String>,
}

impl PushOutcome {
    pub fn sent() -> Self {
        Self {
            push_sent: true,
            push_error: None,
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            push_sent: false,
            push_error: Some(error.into()),
        }
    }
}
