use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use clearperks_common::{DeviceToken, Notification, NotificationPreference, PushOutcome};

use crate::store::{DeviceTokenStore, NotificationStore, UserStore};

#[derive(Default)]
struct State {
    users: Vec<Uuid>,
    preferences: HashMap<Uuid, NotificationPreference>,
    notifications: Vec<Notification>,
    devices: Vec<DeviceToken>,
}

/// One mutex-guarded store backing users, notifications and device tokens.
/// Used by the CLI and by tests; production wires a database instead.
#[derive(Default)]
pub struct InMemoryStore {
    state: Mutex<State>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_user(&self, user_id: Uuid) {
        if let Ok(mut state) = self.state.lock() {
            if !state.users.contains(&user_id) {
                state.users.push(user_id);
            }
        }
    }

    /// Every stored notification row, in insertion order.
    pub fn notifications(&self) -> Vec<Notification> {
        self.lock()
            .map(|state| state.notifications.clone())
            .unwrap_or_default()
    }

    /// Every stored device token, in insertion order.
    pub fn devices(&self) -> Vec<DeviceToken> {
        self.lock()
            .map(|state| state.devices.clone())
            .unwrap_or_default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, State>> {
        self.state
            .lock()
            .map_err(|_| anyhow::anyhow!("in-memory store lock poisoned"))
    }
}

#[async_trait]
impl UserStore for InMemoryStore {
    async fn user_exists(&self, user_id: Uuid) -> Result<bool> {
        Ok(self.lock()?.users.contains(&user_id))
    }

    async fn all_user_ids(&self) -> Result<Vec<Uuid>> {
        Ok(self.lock()?.users.clone())
    }

    async fn preferences(&self, user_id: Uuid) -> Result<Option<NotificationPreference>> {
        Ok(self.lock()?.preferences.get(&user_id).cloned())
    }

    async fn upsert_preferences(&self, prefs: &NotificationPreference) -> Result<()> {
        self.lock()?.preferences.insert(prefs.user_id, prefs.clone());
        Ok(())
    }
}

#[async_trait]
impl NotificationStore for InMemoryStore {
    async fn insert_notification(&self, notification: &Notification) -> Result<()> {
        self.lock()?.notifications.push(notification.clone());
        Ok(())
    }

    async fn record_push_outcome(&self, notification_id: Uuid, outcome: &PushOutcome) -> Result<()> {
        let mut state = self.lock()?;
        let row = state
            .notifications
            .iter_mut()
            .find(|n| n.id == notification_id)
            .ok_or_else(|| anyhow::anyhow!("notification {notification_id} not found"))?;
        row.push_sent = outcome.push_sent;
        row.push_error = outcome.push_error.clone();
        Ok(())
    }

    async fn clear(&self, user_id: Option<Uuid>) -> Result<usize> {
        let mut state = self.lock()?;
        let mut cleared = 0;
        for row in state
            .notifications
            .iter_mut()
            .filter(|n| !n.is_cleared && user_id.map_or(true, |id| n.user_id == id))
        {
            row.is_cleared = true;
            cleared += 1;
        }
        Ok(cleared)
    }

    async fn list_for_user(&self, user_id: Uuid) -> Result<Vec<Notification>> {
        let mut rows: Vec<Notification> = self
            .lock()?
            .notifications
            .iter()
            .filter(|n| n.user_id == user_id && !n.is_cleared)
            .cloned()
            .collect();
        rows.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(rows)
    }

    async fn mark_read(&self, user_id: Uuid, notification_id: Uuid, at: DateTime<Utc>) -> Result<bool> {
        let mut state = self.lock()?;
        match state
            .notifications
            .iter_mut()
            .find(|n| n.id == notification_id && n.user_id == user_id)
        {
            Some(row) => {
                row.read_at = Some(at);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn delete_notification(&self, notification_id: Uuid) -> Result<bool> {
        let mut state = self.lock()?;
        let before = state.notifications.len();
        state.notifications.retain(|n| n.id != notification_id);
        Ok(state.notifications.len() < before)
    }
}

#[async_trait]
impl DeviceTokenStore for InMemoryStore {
    async fn tokens_for_user(&self, user_id: Uuid) -> Result<Vec<DeviceToken>> {
        Ok(self
            .lock()?
            .devices
            .iter()
            .filter(|d| d.user_id == user_id)
            .cloned()
            .collect())
    }

    async fn tokens_for_users(&self, user_ids: &[Uuid]) -> Result<Vec<DeviceToken>> {
        let state = self.lock()?;
        let devices = &state.devices;
        Ok(user_ids
            .iter()
            .flat_map(|id| devices.iter().filter(move |d| d.user_id == *id))
            .cloned()
            .collect())
    }

    async fn find_device(&self, user_id: Uuid, token: &str) -> Result<Option<DeviceToken>> {
        Ok(self
            .lock()?
            .devices
            .iter()
            .find(|d| d.user_id == user_id && d.token == token)
            .cloned())
    }

    async fn insert_device(&self, device: &DeviceToken) -> Result<()> {
        self.lock()?.devices.push(device.clone());
        Ok(())
    }

    async fn touch_device(&self, device: &DeviceToken) -> Result<()> {
        let mut state = self.lock()?;
        match state.devices.iter_mut().find(|d| d.id == device.id) {
            Some(existing) => *existing = device.clone(),
            // Pruned between lookup and refresh; last write wins.
            None => state.devices.push(device.clone()),
        }
        Ok(())
    }

    async fn delete_device(&self, user_id: Uuid, token: &str) -> Result<bool> {
        let mut state = self.lock()?;
        let before = state.devices.len();
        state
            .devices
            .retain(|d| !(d.user_id == user_id && d.token == token));
        Ok(state.devices.len() < before)
    }

    async fn delete_tokens(&self, tokens: &[String]) -> Result<usize> {
        let mut state = self.lock()?;
        let before = state.devices.len();
        state.devices.retain(|d| !tokens.contains(&d.token));
        Ok(before - state.devices.len())
    }
}
