use std::sync::Mutex;

use anyhow::Result;
use async_trait::async_trait;
use uuid::Uuid;

use clearperks_common::{ContentItem, ContentKind};

/// Where classified content lives. The persistence layer implements this;
/// the core only reads records and writes computed classifications back.
#[async_trait]
pub trait ContentStore: Send + Sync {
    async fn get(&self, id: Uuid) -> Result<Option<ContentItem>>;

    /// All items, optionally of one kind, in insertion order.
    async fn list(&self, kind: Option<ContentKind>) -> Result<Vec<ContentItem>>;

    /// Insert or replace by id.
    async fn put(&self, item: &ContentItem) -> Result<()>;
}

/// Vec-backed content store.
#[derive(Default)]
pub struct InMemoryContentStore {
    items: Mutex<Vec<ContentItem>>,
}

impl InMemoryContentStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Vec<ContentItem>>> {
        self.items
            .lock()
            .map_err(|_| anyhow::anyhow!("content store lock poisoned"))
    }
}

#[async_trait]
impl ContentStore for InMemoryContentStore {
    async fn get(&self, id: Uuid) -> Result<Option<ContentItem>> {
        Ok(self.lock()?.iter().find(|item| item.id == id).cloned())
    }

    async fn list(&self, kind: Option<ContentKind>) -> Result<Vec<ContentItem>> {
        Ok(self
            .lock()?
            .iter()
            .filter(|item| kind.map_or(true, |k| item.kind == k))
            .cloned()
            .collect())
    }

    async fn put(&self, item: &ContentItem) -> Result<()> {
        let mut items = self.lock()?;
        match items.iter_mut().find(|existing| existing.id == item.id) {
            Some(existing) => *existing = item.clone(),
            None => items.push(item.clone()),
        }
        Ok(())
    }
}
