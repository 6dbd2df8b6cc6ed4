use async_trait::async_trait;

use super::{PushMessage, PushProvider, TokenOutcome};

/// Provider used when push is not configured. Reports every token as
/// delivered without contacting anything.
pub struct NoopPushProvider;

#[async_trait]
impl PushProvider for NoopPushProvider {
    fn name(&self) -> &str {
        "noop"
    }

    async fn send_multicast(
        &self,
        _message: &PushMessage,
        tokens: &[String],
    ) -> anyhow::Result<Vec<TokenOutcome>> {
        Ok(vec![TokenOutcome::Delivered; tokens.len()])
    }
}
