use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, info};
use uuid::Uuid;

use clearperks_common::{ClearPerksError, NotificationPreference, PreferencePatch};

use crate::store::UserStore;

/// Reads and edits a user's notification preferences.
pub struct PreferenceService {
    users: Arc<dyn UserStore>,
}

impl PreferenceService {
    pub fn new(users: Arc<dyn UserStore>) -> Self {
        Self { users }
    }

    /// The stored row, creating the permissive default the first time.
    pub async fn get_or_create(
        &self,
        user_id: Uuid,
    ) -> Result<NotificationPreference, ClearPerksError> {
        if !self.users.user_exists(user_id).await? {
            return Err(ClearPerksError::NotFound(format!("user {user_id}")));
        }

        if let Some(prefs) = self.users.preferences(user_id).await? {
            return Ok(prefs);
        }

        let prefs = NotificationPreference::permissive(user_id, Utc::now());
        self.users.upsert_preferences(&prefs).await?;
        debug!(user_id = %user_id, "Created default notification preferences");
        Ok(prefs)
    }

    pub async fn update(
        &self,
        user_id: Uuid,
        patch: &PreferencePatch,
    ) -> Result<NotificationPreference, ClearPerksError> {
        let mut prefs = self.get_or_create(user_id).await?;
        patch.apply(&mut prefs, Utc::now())?;
        self.users.upsert_preferences(&prefs).await?;
        info!(
            user_id = %user_id,
            news_frequency = %prefs.news_frequency,
            social_updates = %prefs.social_updates,
            all_disabled = prefs.all_disabled,
            "Notification preferences updated"
        );
        Ok(prefs)
    }
}
