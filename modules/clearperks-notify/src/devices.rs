use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::info;
use uuid::Uuid;

use clearperks_common::{ClearPerksError, DeviceToken};

use crate::store::DeviceTokenStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "status", content = "id", rename_all = "snake_case")]
pub enum Registration {
    Registered(Uuid),
    /// The user already had this token; it was refreshed in place.
    Updated(Uuid),
}

/// A device as shown back to its owner.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DeviceSummary {
    pub id: Uuid,
    /// Masked token.
    pub token: String,
    pub platform: Option<String>,
    pub created_at: DateTime<Utc>,
    pub last_used_at: DateTime<Utc>,
}

pub struct DeviceRegistry {
    tokens: Arc<dyn DeviceTokenStore>,
}

impl DeviceRegistry {
    pub fn new(tokens: Arc<dyn DeviceTokenStore>) -> Self {
        Self { tokens }
    }

    pub async fn register(
        &self,
        user_id: Uuid,
        token: &str,
        platform: Option<String>,
    ) -> Result<Registration, ClearPerksError> {
        let token = token.trim();
        if token.is_empty() {
            return Err(ClearPerksError::Validation("device token is empty".to_string()));
        }

        let now = Utc::now();
        if let Some(mut existing) = self.tokens.find_device(user_id, token).await? {
            // The latest registration describes the device, even without a platform.
            existing.platform = platform;
            existing.last_used_at = now;
            self.tokens.touch_device(&existing).await?;
            info!(user_id = %user_id, device_id = %existing.id, "Device token refreshed");
            return Ok(Registration::Updated(existing.id));
        }

        let device = DeviceToken::new(user_id, token.to_string(), platform, now);
        self.tokens.insert_device(&device).await?;
        info!(user_id = %user_id, device_id = %device.id, "Device token registered");
        Ok(Registration::Registered(device.id))
    }

    pub async fn unregister(&self, user_id: Uuid, token: &str) -> Result<(), ClearPerksError> {
        if !self.tokens.delete_device(user_id, token.trim()).await? {
            return Err(ClearPerksError::NotFound("device token".to_string()));
        }
        info!(user_id = %user_id, "Device token unregistered");
        Ok(())
    }

    /// Most recently used first.
    pub async fn list(&self, user_id: Uuid) -> Result<Vec<DeviceSummary>, ClearPerksError> {
        let mut devices = self.tokens.tokens_for_user(user_id).await?;
        devices.sort_by(|a, b| b.last_used_at.cmp(&a.last_used_at));

        Ok(devices
            .into_iter()
            .map(|d| DeviceSummary {
                token: d.masked(),
                id: d.id,
                platform: d.platform,
                created_at: d.created_at,
                last_used_at: d.last_used_at,
            })
            .collect())
    }
}
