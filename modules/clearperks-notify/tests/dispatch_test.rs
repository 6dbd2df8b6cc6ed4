//! Dispatcher tests over the in-memory store and a mock push provider.
//!
//! Run with: cargo test -p clearperks-notify --test dispatch_test

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use uuid::Uuid;

use clearperks_common::{
    ClearPerksError, NewsFrequency, NotificationCategory, PreferencePatch, Priority, SocialUpdates,
};
use clearperks_notify::testing::{dispatcher, seed_user, set_preferences, MockPushProvider};
use clearperks_notify::{
    DeviceRegistry, InMemoryStore, NotificationDraft, PreferenceService,
    PushErrorCode, PushMode, PushSettings, Registration,
};

fn news_draft() -> NotificationDraft {
    NotificationDraft::builder()
        .title("Benefits news")
        .body("Dental carrier changes next month")
        .category(NotificationCategory::News)
        .build()
}

// ---------------------------------------------------------------------------
// create_for_user
// ---------------------------------------------------------------------------

#[tokio::test]
async fn unknown_user_gets_nothing() {
    let store = Arc::new(InMemoryStore::new());
    let provider = Arc::new(MockPushProvider::new());
    let dispatcher = dispatcher(store.clone(), provider.clone(), PushSettings::default());

    let created = dispatcher
        .create_for_user(Uuid::new_v4(), &news_draft(), PushMode::Immediate)
        .await
        .unwrap();

    assert!(created.is_none());
    assert!(store.notifications().is_empty());
    assert_eq!(provider.call_count(), 0);
}

#[tokio::test]
async fn immediate_push_outcome_is_recorded_on_the_row() {
    let store = Arc::new(InMemoryStore::new());
    let user = seed_user(&store, "dev", 1).await;
    let provider = Arc::new(MockPushProvider::new());
    let dispatcher = dispatcher(store.clone(), provider.clone(), PushSettings::default());

    let notification = dispatcher
        .create_for_user(user, &news_draft(), PushMode::Immediate)
        .await
        .unwrap()
        .unwrap();

    assert!(notification.push_sent);
    assert!(notification.sent_at.is_some());
    let stored = &store.notifications()[0];
    assert!(stored.push_sent);
    assert_eq!(stored.push_error, None);
    let sent = &provider.sent_messages()[0];
    assert_eq!(sent.data["notification_id"], notification.id.to_string());
}

#[tokio::test]
async fn failed_push_keeps_the_row() {
    let store = Arc::new(InMemoryStore::new());
    let user = seed_user(&store, "dev", 1).await;
    let provider = Arc::new(MockPushProvider::new().failing_requests());
    let dispatcher = dispatcher(store.clone(), provider, PushSettings::default());

    let notification = dispatcher
        .create_for_user(user, &news_draft(), PushMode::Immediate)
        .await
        .unwrap()
        .unwrap();

    assert!(!notification.push_sent);
    let stored = &store.notifications()[0];
    assert!(!stored.push_sent);
    assert_eq!(stored.push_error.as_deref(), Some("connection refused"));
}

#[tokio::test]
async fn scheduled_drafts_are_not_pushed() {
    let store = Arc::new(InMemoryStore::new());
    let user = seed_user(&store, "dev", 1).await;
    let provider = Arc::new(MockPushProvider::new());
    let dispatcher = dispatcher(store.clone(), provider.clone(), PushSettings::default());
    let draft = NotificationDraft::builder()
        .title("Open enrollment opens")
        .body("Pick your plan")
        .scheduled_for(Utc::now() + chrono::Duration::days(3))
        .build();

    let notification = dispatcher
        .create_for_user(user, &draft, PushMode::Immediate)
        .await
        .unwrap()
        .unwrap();

    assert!(notification.sent_at.is_none());
    assert_eq!(provider.call_count(), 0);
}

#[tokio::test]
async fn kill_switch_suppresses_high_priority() {
    let store = Arc::new(InMemoryStore::new());
    let user = seed_user(&store, "dev", 1).await;
    set_preferences(&store, user, |p| p.all_disabled = true).await;
    let provider = Arc::new(MockPushProvider::new());
    let dispatcher = dispatcher(store.clone(), provider.clone(), PushSettings::default());
    let draft = NotificationDraft::builder()
        .title("URGENT")
        .body("Action required")
        .priority(Priority::High)
        .build();

    let created = dispatcher
        .create_for_user(user, &draft, PushMode::Immediate)
        .await
        .unwrap();

    assert!(created.is_none());
    assert_eq!(provider.call_count(), 0);
}

// ---------------------------------------------------------------------------
// dispatch_to_all
// ---------------------------------------------------------------------------

#[tokio::test]
async fn broadcast_counts_rows_regardless_of_push_outcome() {
    for provider in [
        MockPushProvider::new(),
        MockPushProvider::new().failing_requests(),
        MockPushProvider::new().hanging_for(Duration::from_secs(5)),
    ] {
        let store = Arc::new(InMemoryStore::new());
        for n in 0..5 {
            seed_user(&store, &format!("u{n}"), 2).await;
        }
        let provider = Arc::new(provider);
        let dispatcher = dispatcher(
            store.clone(),
            provider.clone(),
            PushSettings {
                timeout: Duration::from_millis(50),
                ..PushSettings::default()
            },
        );

        let created = dispatcher.dispatch_to_all(&news_draft()).await.unwrap();

        assert_eq!(created, 5);
        assert_eq!(store.notifications().len(), 5);
        // One batched request for all ten devices.
        assert_eq!(provider.call_sizes(), vec![10]);
    }
}

#[tokio::test]
async fn broadcast_skips_suppressed_users_and_marks_rows() {
    let store = Arc::new(InMemoryStore::new());
    let allowed = seed_user(&store, "allowed", 1).await;
    let muted = seed_user(&store, "muted", 1).await;
    let dead = seed_user(&store, "dead", 1).await;
    set_preferences(&store, muted, |p| p.news_frequency = NewsFrequency::Off).await;
    let provider = Arc::new(
        MockPushProvider::new().reject_token("dead-0", PushErrorCode::NotRegistered),
    );
    let dispatcher = dispatcher(store.clone(), provider.clone(), PushSettings::default());

    let created = dispatcher.dispatch_to_all(&news_draft()).await.unwrap();

    assert_eq!(created, 2);
    assert_eq!(provider.call_sizes(), vec![2]);

    let rows = store.notifications();
    let row_for = |user: Uuid| rows.iter().find(|n| n.user_id == user);
    assert!(row_for(muted).is_none());
    assert!(row_for(allowed).unwrap().push_sent);
    let dead_row = row_for(dead).unwrap();
    assert!(!dead_row.push_sent);
    assert!(dead_row.push_error.is_some());
}

#[tokio::test]
async fn vimp_only_users_get_high_priority_social_only() {
    let store = Arc::new(InMemoryStore::new());
    let user = seed_user(&store, "dev", 0).await;
    set_preferences(&store, user, |p| p.social_updates = SocialUpdates::VimpOnly).await;
    let dispatcher = dispatcher(store.clone(), Arc::new(MockPushProvider::new()), PushSettings::default());

    let social = |priority| {
        NotificationDraft::builder()
            .title("Coworker shared a tip")
            .body("Check it out")
            .category(NotificationCategory::Social)
            .priority(priority)
            .build()
    };

    assert_eq!(dispatcher.dispatch_to_all(&social(Priority::Medium)).await.unwrap(), 0);
    assert_eq!(dispatcher.dispatch_to_all(&social(Priority::High)).await.unwrap(), 1);
}

#[tokio::test]
async fn clear_notifications_for_one_user_or_all() {
    let store = Arc::new(InMemoryStore::new());
    let a = seed_user(&store, "a", 0).await;
    let b = seed_user(&store, "b", 0).await;
    let dispatcher = dispatcher(store.clone(), Arc::new(MockPushProvider::new()), PushSettings::default());
    dispatcher.dispatch_to_all(&news_draft()).await.unwrap();
    dispatcher.dispatch_to_all(&news_draft()).await.unwrap();

    assert_eq!(dispatcher.clear_notifications(Some(a)).await.unwrap(), 2);
    assert!(dispatcher.inbox(a).await.unwrap().is_empty());
    assert_eq!(dispatcher.inbox(b).await.unwrap().len(), 2);

    assert_eq!(dispatcher.clear_notifications(None).await.unwrap(), 2);
    assert_eq!(dispatcher.clear_notifications(None).await.unwrap(), 0);
    assert_eq!(store.notifications().len(), 4);
}

#[tokio::test]
async fn mark_read_only_touches_the_owners_row() {
    let store = Arc::new(InMemoryStore::new());
    let owner = seed_user(&store, "owner", 0).await;
    let other = seed_user(&store, "other", 0).await;
    let dispatcher = dispatcher(store.clone(), Arc::new(MockPushProvider::new()), PushSettings::default());
    let row = dispatcher
        .create_for_user(owner, &news_draft(), PushMode::Deferred)
        .await
        .unwrap()
        .unwrap();

    let err = dispatcher.mark_read(other, row.id).await.unwrap_err();
    assert!(matches!(err, ClearPerksError::NotFound(_)));
    assert!(store.notifications()[0].read_at.is_none());

    dispatcher.mark_read(owner, row.id).await.unwrap();
    let inbox = dispatcher.inbox(owner).await.unwrap();
    assert_eq!(inbox.len(), 1);
    assert!(inbox[0].read_at.is_some());

    let missing = dispatcher.mark_read(owner, Uuid::new_v4()).await;
    assert!(matches!(missing, Err(ClearPerksError::NotFound(_))));
}

#[tokio::test]
async fn inbox_is_newest_first() {
    let store = Arc::new(InMemoryStore::new());
    let user = seed_user(&store, "u", 0).await;
    let dispatcher = dispatcher(store.clone(), Arc::new(MockPushProvider::new()), PushSettings::default());
    for title in ["first", "second"] {
        let draft = NotificationDraft::builder().title(title).body("b").build();
        dispatcher
            .create_for_user(user, &draft, PushMode::Deferred)
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_millis(5)).await;
    }

    let titles: Vec<String> = dispatcher
        .inbox(user)
        .await
        .unwrap()
        .into_iter()
        .map(|n| n.title)
        .collect();
    assert_eq!(titles, vec!["second", "first"]);
}

#[tokio::test]
async fn admin_delete_removes_a_single_row() {
    let store = Arc::new(InMemoryStore::new());
    seed_user(&store, "a", 0).await;
    seed_user(&store, "b", 0).await;
    let dispatcher = dispatcher(store.clone(), Arc::new(MockPushProvider::new()), PushSettings::default());
    dispatcher.dispatch_to_all(&news_draft()).await.unwrap();
    let target = store.notifications()[0].id;

    dispatcher.delete_notification(target).await.unwrap();

    assert_eq!(store.notifications().len(), 1);
    let again = dispatcher.delete_notification(target).await;
    assert!(matches!(again, Err(ClearPerksError::NotFound(_))));
}

#[tokio::test]
async fn in_app_only_drafts_are_never_pushed() {
    let store = Arc::new(InMemoryStore::new());
    let user = seed_user(&store, "dev", 1).await;
    let provider = Arc::new(MockPushProvider::new());
    let dispatcher = dispatcher(store.clone(), provider.clone(), PushSettings::default());
    let draft = NotificationDraft::builder()
        .title("Your statement is ready")
        .body("View it in the app")
        .should_push(false)
        .build();

    let row = dispatcher
        .create_for_user(user, &draft, PushMode::Immediate)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(dispatcher.dispatch_to_all(&draft).await.unwrap(), 1);

    assert!(!row.should_push);
    assert!(row.sent_at.is_some());
    assert_eq!(provider.call_count(), 0);
    assert!(store.notifications().iter().all(|n| !n.push_sent));
}

// ---------------------------------------------------------------------------
// Devices and preferences
// ---------------------------------------------------------------------------

#[tokio::test]
async fn registering_twice_refreshes_instead_of_duplicating() {
    let store = Arc::new(InMemoryStore::new());
    let user = seed_user(&store, "unused", 0).await;
    let registry = DeviceRegistry::new(store.clone());

    let first = registry
        .register(user, "fcm-token-abcd1234", Some("ios".into()))
        .await
        .unwrap();
    let Registration::Registered(id) = first else {
        panic!("expected a new registration, got {first:?}");
    };
    let before = store.devices()[0].last_used_at;

    let second = registry
        .register(user, "fcm-token-abcd1234", Some("android".into()))
        .await
        .unwrap();

    assert_eq!(second, Registration::Updated(id));
    let devices = store.devices();
    assert_eq!(devices.len(), 1);
    assert_eq!(devices[0].platform.as_deref(), Some("android"));
    assert!(devices[0].last_used_at >= before);

    let listed = registry.list(user).await.unwrap();
    assert_eq!(listed[0].token, "...1234");
}

#[tokio::test]
async fn re_registering_without_platform_clears_it() {
    let store = Arc::new(InMemoryStore::new());
    let user = seed_user(&store, "unused", 0).await;
    let registry = DeviceRegistry::new(store.clone());

    registry.register(user, "fcm-token-5678", Some("web".into())).await.unwrap();
    registry.register(user, "fcm-token-5678", None).await.unwrap();

    let devices = store.devices();
    assert_eq!(devices.len(), 1);
    assert_eq!(devices[0].platform, None);
}

#[tokio::test]
async fn unregistering_an_unknown_token_is_not_found() {
    let store = Arc::new(InMemoryStore::new());
    let user = seed_user(&store, "phone", 1).await;
    let registry = DeviceRegistry::new(store.clone());

    registry.unregister(user, "phone-0").await.unwrap();
    let err = registry.unregister(user, "phone-0").await.unwrap_err();

    assert!(matches!(err, ClearPerksError::NotFound(_)));
}

#[tokio::test]
async fn preferences_are_created_lazily_and_patched() {
    let store = Arc::new(InMemoryStore::new());
    let user = seed_user(&store, "unused", 0).await;
    let service = PreferenceService::new(store.clone());

    let prefs = service.get_or_create(user).await.unwrap();
    assert!(prefs.trend_alerts);

    let updated = service
        .update(
            user,
            &PreferencePatch {
                social_updates: Some("vimp-only".into()),
                gov_notifications: Some(false),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(updated.social_updates, SocialUpdates::VimpOnly);
    assert!(!updated.gov_notifications);
    assert_eq!(updated.created_at, prefs.created_at);

    let bad = service
        .update(
            user,
            &PreferencePatch {
                news_frequency: Some("hourly".into()),
                ..Default::default()
            },
        )
        .await;
    assert!(matches!(bad, Err(ClearPerksError::Validation(_))));
    assert_eq!(service.get_or_create(user).await.unwrap(), updated);
}
