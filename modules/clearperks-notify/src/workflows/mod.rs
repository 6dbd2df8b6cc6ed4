//! Scheduled notification workflows: the news digest and trend alerts.
//!
//! Both hold `Arc<NotifyDeps>` and go through the [`Dispatcher`], so the
//! preference gate and push delivery apply as they do everywhere else.

pub mod news_digest;
pub mod trends;

use std::sync::Arc;

use typed_builder::TypedBuilder;

use clearperks_common::Config;
use clearperks_signals::ContentStore;

use crate::dispatch::Dispatcher;

pub use news_digest::{Digest, DigestResult, DigestWriter, NewsDigestWorkflow, NoopDigestWriter};
pub use trends::TrendNotifier;

/// Shared dependency container for the workflows.
#[derive(Clone, TypedBuilder)]
pub struct NotifyDeps {
    pub content: Arc<dyn ContentStore>,
    pub dispatcher: Arc<Dispatcher>,
    #[builder(default = 50)]
    pub news_lookback_hours: i64,
    #[builder(default = 10)]
    pub news_per_category_limit: usize,
    #[builder(default = 8.0)]
    pub trend_notify_threshold: f64,
}

impl NotifyDeps {
    pub fn from_config(
        config: &Config,
        content: Arc<dyn ContentStore>,
        dispatcher: Arc<Dispatcher>,
    ) -> Self {
        Self::builder()
            .content(content)
            .dispatcher(dispatcher)
            .news_lookback_hours(config.news_lookback_hours)
            .news_per_category_limit(config.news_per_category_limit)
            .trend_notify_threshold(config.trend_notify_threshold)
            .build()
    }
}
