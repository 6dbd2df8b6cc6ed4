// Test mocks for the notification pipeline.
//
// - MockPushProvider (PushProvider): scripted per-token outcomes, recorded calls
// - FailingPruneStore (DeviceTokenStore): InMemoryStore whose bulk delete fails
// - MockDigestWriter (DigestWriter): fixed digest or failure
//
// Plus helpers for seeding users and devices.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::{bail, Result};
use async_trait::async_trait;
use chrono::Utc;
use uuid::Uuid;

use clearperks_common::{DeviceToken, NotificationPreference};

use crate::dispatch::Dispatcher;
use crate::memory::InMemoryStore;
use crate::push::{PushDeliverer, PushErrorCode, PushMessage, PushProvider, PushSettings, TokenOutcome};
use crate::store::{DeviceTokenStore, UserStore};
use crate::workflows::{Digest, DigestWriter};

// ---------------------------------------------------------------------------
// MockPushProvider
// ---------------------------------------------------------------------------

/// Delivers to every token unless told otherwise.
/// Builder pattern: `.reject_token()`, `.failing_requests()`, `.hanging_for()`.
pub struct MockPushProvider {
    rejected: HashMap<String, PushErrorCode>,
    fail_requests: bool,
    delay: Option<Duration>,
    calls: Mutex<Vec<(PushMessage, Vec<String>)>>,
}

impl MockPushProvider {
    pub fn new() -> Self {
        Self {
            rejected: HashMap::new(),
            fail_requests: false,
            delay: None,
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn reject_token(mut self, token: &str, code: PushErrorCode) -> Self {
        self.rejected.insert(token.to_string(), code);
        self
    }

    /// Every request errors out as a transport failure would.
    pub fn failing_requests(mut self) -> Self {
        self.fail_requests = true;
        self
    }

    /// Sleep before answering, to trip the deliverer's timeout.
    pub fn hanging_for(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    /// Token count of each request, in call order.
    pub fn call_sizes(&self) -> Vec<usize> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .map(|(_, tokens)| tokens.len())
            .collect()
    }

    pub fn sent_messages(&self) -> Vec<PushMessage> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .map(|(message, _)| message.clone())
            .collect()
    }
}

impl Default for MockPushProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PushProvider for MockPushProvider {
    fn name(&self) -> &str {
        "mock"
    }

    async fn send_multicast(
        &self,
        message: &PushMessage,
        tokens: &[String],
    ) -> Result<Vec<TokenOutcome>> {
        self.calls
            .lock()
            .unwrap()
            .push((message.clone(), tokens.to_vec()));

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if self.fail_requests {
            bail!("connection refused");
        }

        Ok(tokens
            .iter()
            .map(|token| match self.rejected.get(token) {
                Some(code) => TokenOutcome::failed(code.clone(), format!("{code} ({token})")),
                None => TokenOutcome::Delivered,
            })
            .collect())
    }
}

// ---------------------------------------------------------------------------
// FailingPruneStore
// ---------------------------------------------------------------------------

/// Wraps an [`InMemoryStore`]; bulk token deletion always fails.
pub struct FailingPruneStore {
    inner: Arc<InMemoryStore>,
}

impl FailingPruneStore {
    pub fn new(inner: Arc<InMemoryStore>) -> Self {
        Self { inner }
    }
}

#[async_trait]
impl DeviceTokenStore for FailingPruneStore {
    async fn tokens_for_user(&self, user_id: Uuid) -> Result<Vec<DeviceToken>> {
        self.inner.tokens_for_user(user_id).await
    }

    async fn tokens_for_users(&self, user_ids: &[Uuid]) -> Result<Vec<DeviceToken>> {
        self.inner.tokens_for_users(user_ids).await
    }

    async fn find_device(&self, user_id: Uuid, token: &str) -> Result<Option<DeviceToken>> {
        self.inner.find_device(user_id, token).await
    }

    async fn insert_device(&self, device: &DeviceToken) -> Result<()> {
        self.inner.insert_device(device).await
    }

    async fn touch_device(&self, device: &DeviceToken) -> Result<()> {
        self.inner.touch_device(device).await
    }

    async fn delete_device(&self, user_id: Uuid, token: &str) -> Result<bool> {
        self.inner.delete_device(user_id, token).await
    }

    async fn delete_tokens(&self, _tokens: &[String]) -> Result<usize> {
        bail!("token store unavailable")
    }
}

// ---------------------------------------------------------------------------
// MockDigestWriter
// ---------------------------------------------------------------------------

pub enum MockDigestWriter {
    Fixed(Digest),
    Empty,
    Failing,
}

#[async_trait]
impl DigestWriter for MockDigestWriter {
    async fn write(&self, _category: &str, _context: &str) -> Result<Option<Digest>> {
        match self {
            MockDigestWriter::Fixed(digest) => Ok(Some(digest.clone())),
            MockDigestWriter::Empty => Ok(None),
            MockDigestWriter::Failing => bail!("model unavailable"),
        }
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Add a user with `devices` registered tokens named `"{prefix}-{n}"`.
pub async fn seed_user(store: &InMemoryStore, prefix: &str, devices: usize) -> Uuid {
    let user_id = Uuid::new_v4();
    store.add_user(user_id);
    for n in 0..devices {
        store
            .insert_device(&DeviceToken::new(user_id, format!("{prefix}-{n}"), None, Utc::now()))
            .await
            .unwrap();
    }
    user_id
}

/// Store a preferences row for an existing user.
pub async fn set_preferences(
    store: &InMemoryStore,
    user_id: Uuid,
    edit: impl FnOnce(&mut NotificationPreference),
) {
    let mut prefs = NotificationPreference::permissive(user_id, Utc::now());
    edit(&mut prefs);
    store.upsert_preferences(&prefs).await.unwrap();
}

/// Dispatcher over one in-memory store and the given provider.
pub fn dispatcher(
    store: Arc<InMemoryStore>,
    provider: Arc<dyn PushProvider>,
    settings: PushSettings,
) -> Dispatcher {
    let push = PushDeliverer::new(provider, store.clone(), settings);
    Dispatcher::new(store.clone(), store, push)
}
