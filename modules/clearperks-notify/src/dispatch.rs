use std::collections::BTreeMap;
use std::sync::Arc;

use anyhow::Result;
use chrono::{DateTime, Utc};
use futures::stream::{self, StreamExt};
use tracing::{debug, info, warn};
use typed_builder::TypedBuilder;
use uuid::Uuid;

use clearperks_common::{ClearPerksError, ContentItem, Notification, NotificationCategory, Priority, PushOutcome};
use clearperks_signals::{derive_view, notification_category};

use crate::gate::{self, GateDecision};
use crate::push::{PushDeliverer, PushMessage, PushReport};
use crate::store::{NotificationStore, UserStore};

/// Row creations in flight during a broadcast.
const MAX_CONCURRENT_CREATES: usize = 32;

/// What to notify about, before it is addressed to a user.
#[derive(Debug, Clone, PartialEq, TypedBuilder)]
pub struct NotificationDraft {
    #[builder(setter(into))]
    pub title: String,
    #[builder(setter(into))]
    pub body: String,
    #[builder(default)]
    pub category: NotificationCategory,
    #[builder(default)]
    pub priority: Priority,
    /// Create the row now but leave it unsent until this time.
    #[builder(default, setter(strip_option))]
    pub scheduled_for: Option<DateTime<Utc>>,
    /// In-app only when false: the row is created but never pushed.
    #[builder(default = true)]
    pub should_push: bool,
    /// Extra push payload.
    #[builder(default)]
    pub data: BTreeMap<String, String>,
}

impl NotificationDraft {
    /// Draft for a classified content record. The notification category
    /// follows the record's first domain tag.
    pub fn from_content(item: &ContentItem, now: DateTime<Utc>) -> Self {
        let view = derive_view(item, now);
        let data = BTreeMap::from([
            ("content_id".to_string(), item.id.to_string()),
            ("content_kind".to_string(), item.kind.to_string()),
            ("ui_category".to_string(), view.ui_category.to_string()),
            ("urgency_level".to_string(), view.urgency_level.to_string()),
        ]);

        Self::builder()
            .title(item.title.clone())
            .body(item.body.clone())
            .category(notification_category(&item.classification.domain_tags))
            .priority(item.classification.priority)
            .data(data)
            .build()
    }

    fn push_message(&self) -> PushMessage {
        let mut message = PushMessage::new(&self.title, &self.body)
            .with_data("category", self.category)
            .with_data("priority", self.priority);
        for (key, value) in &self.data {
            message.data.insert(key.clone(), value.clone());
        }
        message
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PushMode {
    /// Push to the user's devices right after the row is created.
    Immediate,
    /// Create the row only; the caller pushes later.
    Deferred,
}

/// Creates notification rows for users who allow them and pushes them.
///
/// A row is the record of intent to notify and is kept whatever happens to
/// the push; the push outcome is written onto the row afterwards.
pub struct Dispatcher {
    users: Arc<dyn UserStore>,
    notifications: Arc<dyn NotificationStore>,
    push: PushDeliverer,
}

impl Dispatcher {
    pub fn new(
        users: Arc<dyn UserStore>,
        notifications: Arc<dyn NotificationStore>,
        push: PushDeliverer,
    ) -> Self {
        Self {
            users,
            notifications,
            push,
        }
    }

    pub fn users(&self) -> &Arc<dyn UserStore> {
        &self.users
    }

    /// Returns `None` for unknown users and suppressed notifications.
    pub async fn create_for_user(
        &self,
        user_id: Uuid,
        draft: &NotificationDraft,
        mode: PushMode,
    ) -> Result<Option<Notification>> {
        if !self.users.user_exists(user_id).await? {
            debug!(user_id = %user_id, "Unknown user, skipping notification");
            return Ok(None);
        }

        let prefs = self.users.preferences(user_id).await?;
        if let GateDecision::Suppress(reason) =
            gate::evaluate(prefs.as_ref(), draft.category, draft.priority)
        {
            debug!(
                user_id = %user_id,
                category = %draft.category,
                priority = %draft.priority,
                reason = %reason,
                "Notification suppressed"
            );
            return Ok(None);
        }

        let now = Utc::now();
        let mut notification = Notification {
            id: Uuid::new_v4(),
            user_id,
            title: draft.title.clone(),
            body: draft.body.clone(),
            category: draft.category,
            priority: draft.priority,
            is_cleared: false,
            push_sent: false,
            push_error: None,
            should_push: draft.should_push,
            scheduled_for: draft.scheduled_for,
            sent_at: draft.scheduled_for.is_none().then_some(now),
            read_at: None,
            created_at: now,
        };
        self.notifications.insert_notification(&notification).await?;
        debug!(
            notification_id = %notification.id,
            user_id = %user_id,
            category = %notification.category,
            "Notification created"
        );

        let push_now = mode == PushMode::Immediate
            && notification.should_push
            && notification.sent_at.is_some()
            && self.push.is_enabled();
        if push_now {
            let message = draft
                .push_message()
                .with_data("notification_id", notification.id);
            let report = self.push.send_to_user(user_id, &message).await;
            if let Some(outcome) = report.outcome_for(user_id) {
                self.record_outcome(notification.id, &outcome).await;
                notification.push_sent = outcome.push_sent;
                notification.push_error = outcome.push_error;
            }
        }

        Ok(Some(notification))
    }

    /// Notify every user. Returns the number of rows created, whatever
    /// happened to the push.
    pub async fn dispatch_to_all(&self, draft: &NotificationDraft) -> Result<usize> {
        let user_ids = self.users.all_user_ids().await?;
        self.dispatch_to_users(&user_ids, draft).await
    }

    /// Create rows for the listed users concurrently, then push to all of
    /// them in one batched send.
    pub async fn dispatch_to_users(
        &self,
        user_ids: &[Uuid],
        draft: &NotificationDraft,
    ) -> Result<usize> {
        let results: Vec<(Uuid, Result<Option<Notification>>)> = stream::iter(user_ids.iter().copied())
            .map(|user_id| async move {
                (
                    user_id,
                    self.create_for_user(user_id, draft, PushMode::Deferred).await,
                )
            })
            .buffered(MAX_CONCURRENT_CREATES)
            .collect()
            .await;

        let mut created: Vec<Notification> = Vec::new();
        for (user_id, result) in results {
            match result {
                Ok(Some(notification)) => created.push(notification),
                Ok(None) => {}
                Err(e) => warn!(user_id = %user_id, error = %e, "Failed to create notification"),
            }
        }

        let sent_now: Vec<&Notification> = created
            .iter()
            .filter(|n| n.should_push && n.sent_at.is_some())
            .collect();
        let mut report = PushReport::default();
        if !sent_now.is_empty() && self.push.is_enabled() {
            let recipients: Vec<Uuid> = sent_now.iter().map(|n| n.user_id).collect();
            report = self.push.send_batch(&recipients, &draft.push_message()).await;
            for notification in &sent_now {
                if let Some(outcome) = report.outcome_for(notification.user_id) {
                    self.record_outcome(notification.id, &outcome).await;
                }
            }
        }

        info!(
            users = user_ids.len(),
            created = created.len(),
            category = %draft.category,
            pushed = report.success_count,
            push_failed = report.failure_count,
            "Broadcast dispatched"
        );
        Ok(created.len())
    }

    /// Mark notifications cleared for one user, or everyone.
    pub async fn clear_notifications(&self, user_id: Option<Uuid>) -> Result<usize> {
        let cleared = self.notifications.clear(user_id).await?;
        match user_id {
            Some(user_id) => info!(user_id = %user_id, cleared, "Cleared notifications"),
            None => info!(cleared, "Cleared notifications for all users"),
        }
        Ok(cleared)
    }

    /// The user's uncleared notifications, newest first.
    pub async fn inbox(&self, user_id: Uuid) -> Result<Vec<Notification>> {
        self.notifications.list_for_user(user_id).await
    }

    /// Mark one of the user's own notifications read.
    pub async fn mark_read(&self, user_id: Uuid, notification_id: Uuid) -> Result<(), ClearPerksError> {
        if !self
            .notifications
            .mark_read(user_id, notification_id, Utc::now())
            .await?
        {
            return Err(ClearPerksError::NotFound(format!("notification {notification_id}")));
        }
        debug!(user_id = %user_id, notification_id = %notification_id, "Notification marked read");
        Ok(())
    }

    /// Admin removal of a single notification.
    pub async fn delete_notification(&self, notification_id: Uuid) -> Result<(), ClearPerksError> {
        if !self.notifications.delete_notification(notification_id).await? {
            return Err(ClearPerksError::NotFound(format!("notification {notification_id}")));
        }
        info!(notification_id = %notification_id, "Notification deleted");
        Ok(())
    }

    async fn record_outcome(&self, notification_id: Uuid, outcome: &PushOutcome) {
        if let Err(e) = self
            .notifications
            .record_push_outcome(notification_id, outcome)
            .await
        {
            warn!(notification_id = %notification_id, error = %e, "Failed to record push outcome");
        }
    }
}
