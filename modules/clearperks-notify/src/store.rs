use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use clearperks_common::{DeviceToken, Notification, NotificationPreference, PushOutcome};

/// Users and their stored notification preferences.
#[async_trait]
pub trait UserStore: Send + Sync {
    async fn user_exists(&self, user_id: Uuid) -> Result<bool>;

    async fn all_user_ids(&self) -> Result<Vec<Uuid>>;

    /// `None` when the user has never had a preferences row.
    async fn preferences(&self, user_id: Uuid) -> Result<Option<NotificationPreference>>;

    async fn upsert_preferences(&self, prefs: &NotificationPreference) -> Result<()>;
}

#[async_trait]
pub trait NotificationStore: Send + Sync {
    async fn insert_notification(&self, notification: &Notification) -> Result<()>;

    async fn record_push_outcome(&self, notification_id: Uuid, outcome: &PushOutcome) -> Result<()>;

    /// Mark uncleared rows cleared for one user, or for everyone when
    /// `user_id` is `None`. Returns the number of rows changed.
    async fn clear(&self, user_id: Option<Uuid>) -> Result<usize>;

    /// A user's inbox: uncleared rows, newest first.
    async fn list_for_user(&self, user_id: Uuid) -> Result<Vec<Notification>>;

    /// Set `read_at` on one of the user's own rows. Returns whether the row
    /// exists and belongs to the user.
    async fn mark_read(&self, user_id: Uuid, notification_id: Uuid, at: DateTime<Utc>) -> Result<bool>;

    /// Delete a row regardless of owner. Returns whether it existed.
    async fn delete_notification(&self, notification_id: Uuid) -> Result<bool>;
}

/// Registered push destinations.
#[async_trait]
pub trait DeviceTokenStore: Send + Sync {
    async fn tokens_for_user(&self, user_id: Uuid) -> Result<Vec<DeviceToken>>;

    /// Tokens of every listed user, grouped in the order the users are given.
    async fn tokens_for_users(&self, user_ids: &[Uuid]) -> Result<Vec<DeviceToken>>;

    async fn find_device(&self, user_id: Uuid, token: &str) -> Result<Option<DeviceToken>>;

    async fn insert_device(&self, device: &DeviceToken) -> Result<()>;

    /// Replace the stored row with the same id.
    async fn touch_device(&self, device: &DeviceToken) -> Result<()>;

    /// Delete one user's registration. Returns whether a row existed.
    async fn delete_device(&self, user_id: Uuid, token: &str) -> Result<bool>;

    /// Delete every registration of the given token values, whoever owns
    /// them. Deleting an absent token is not an error.
    async fn delete_tokens(&self, tokens: &[String]) -> Result<usize>;
}
