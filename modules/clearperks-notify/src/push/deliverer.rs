use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use clearperks_common::config::MAX_PUSH_BATCH_SIZE;
use clearperks_common::{Config, DeviceToken, PushOutcome};

use super::noop::NoopPushProvider;
use super::{PushMessage, PushProvider, TokenOutcome};
use crate::store::DeviceTokenStore;

#[derive(Debug, Clone)]
pub struct PushSettings {
    pub enabled: bool,
    /// Tokens per provider request, at most 500.
    pub batch_size: usize,
    /// Deadline for one provider request.
    pub timeout: Duration,
}

impl Default for PushSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            batch_size: MAX_PUSH_BATCH_SIZE,
            timeout: Duration::from_secs(10),
        }
    }
}

impl PushSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            enabled: config.push_enabled,
            batch_size: config.push_batch_size,
            timeout: config.push_timeout,
        }
    }

    pub fn disabled() -> Self {
        Self {
            enabled: false,
            ..Self::default()
        }
    }
}

/// One failed token, or a whole failed request when `token_index` is unset.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TokenError {
    /// Position in the combined token list of the send.
    pub token_index: Option<usize>,
    pub user_id: Option<Uuid>,
    pub code: Option<String>,
    pub message: String,
}

/// How one user's devices fared in a send.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct UserDelivery {
    pub delivered: usize,
    pub failed: usize,
    pub last_error: Option<String>,
}

impl UserDelivery {
    /// Sent when at least one device accepted the push.
    pub fn outcome(&self) -> PushOutcome {
        if self.delivered > 0 {
            PushOutcome::sent()
        } else {
            PushOutcome::failed(
                self.last_error
                    .clone()
                    .unwrap_or_else(|| "push failed".to_string()),
            )
        }
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct PushReport {
    pub success_count: usize,
    pub failure_count: usize,
    pub errors: Vec<TokenError>,
    /// Dead registrations removed after the send.
    pub pruned: usize,
    pub users: BTreeMap<Uuid, UserDelivery>,
}

impl PushReport {
    /// `None` when the user had no devices in this send.
    pub fn outcome_for(&self, user_id: Uuid) -> Option<PushOutcome> {
        self.users.get(&user_id).map(UserDelivery::outcome)
    }

    pub fn attempted(&self) -> usize {
        self.success_count + self.failure_count
    }

    fn record_delivered(&mut self, device: &DeviceToken) {
        self.success_count += 1;
        self.users.entry(device.user_id).or_default().delivered += 1;
    }

    fn record_failed(
        &mut self,
        device: &DeviceToken,
        token_index: usize,
        code: Option<String>,
        message: String,
    ) {
        self.failure_count += 1;
        let user = self.users.entry(device.user_id).or_default();
        user.failed += 1;
        user.last_error = Some(match &code {
            Some(code) => format!("{code}: {message}"),
            None => message.clone(),
        });
        self.errors.push(TokenError {
            token_index: Some(token_index),
            user_id: Some(device.user_id),
            code,
            message,
        });
    }

    /// The whole request failed: every token in the chunk counts as failed.
    fn fail_chunk(&mut self, chunk: &[DeviceToken], message: String) {
        self.failure_count += chunk.len();
        for device in chunk {
            let user = self.users.entry(device.user_id).or_default();
            user.failed += 1;
            user.last_error = Some(message.clone());
        }
        self.errors.push(TokenError {
            token_index: None,
            user_id: None,
            code: None,
            message,
        });
    }
}

/// Sends pushes to users' registered devices in provider-sized chunks and
/// prunes registrations the provider reports as dead. Delivery problems end
/// up in the [`PushReport`]; nothing here returns an error.
#[derive(Clone)]
pub struct PushDeliverer {
    provider: Arc<dyn PushProvider>,
    tokens: Arc<dyn DeviceTokenStore>,
    settings: PushSettings,
}

impl PushDeliverer {
    pub fn new(
        provider: Arc<dyn PushProvider>,
        tokens: Arc<dyn DeviceTokenStore>,
        settings: PushSettings,
    ) -> Self {
        Self {
            provider,
            tokens,
            settings,
        }
    }

    /// A deliverer that never sends.
    pub fn disabled(tokens: Arc<dyn DeviceTokenStore>) -> Self {
        Self::new(Arc::new(NoopPushProvider), tokens, PushSettings::disabled())
    }

    pub fn is_enabled(&self) -> bool {
        self.settings.enabled
    }

    pub async fn send_to_user(&self, user_id: Uuid, message: &PushMessage) -> PushReport {
        if !self.settings.enabled {
            debug!(user_id = %user_id, "Push disabled, skipping send");
            return PushReport::default();
        }

        match self.tokens.tokens_for_user(user_id).await {
            Ok(devices) if devices.is_empty() => {
                debug!(user_id = %user_id, "No device tokens, skipping push");
                PushReport::default()
            }
            Ok(devices) => self.deliver(devices, message).await,
            Err(e) => {
                error!(user_id = %user_id, error = %e, "Failed to load device tokens");
                PushReport::default()
            }
        }
    }

    pub async fn send_batch(&self, user_ids: &[Uuid], message: &PushMessage) -> PushReport {
        if !self.settings.enabled || user_ids.is_empty() {
            return PushReport::default();
        }

        match self.tokens.tokens_for_users(user_ids).await {
            Ok(devices) if devices.is_empty() => {
                debug!(users = user_ids.len(), "No device tokens, skipping batch push");
                PushReport::default()
            }
            Ok(devices) => self.deliver(devices, message).await,
            Err(e) => {
                error!(users = user_ids.len(), error = %e, "Failed to load device tokens");
                PushReport::default()
            }
        }
    }

    async fn deliver(&self, devices: Vec<DeviceToken>, message: &PushMessage) -> PushReport {
        let batch_size = self.settings.batch_size.clamp(1, MAX_PUSH_BATCH_SIZE);
        let mut report = PushReport::default();
        let mut invalid: Vec<String> = Vec::new();

        for (chunk_index, chunk) in devices.chunks(batch_size).enumerate() {
            let offset = chunk_index * batch_size;
            let tokens: Vec<String> = chunk.iter().map(|d| d.token.clone()).collect();

            let sent = tokio::time::timeout(
                self.settings.timeout,
                self.provider.send_multicast(message, &tokens),
            )
            .await;

            let outcomes = match sent {
                Ok(Ok(outcomes)) => outcomes,
                Ok(Err(e)) => {
                    error!(
                        provider = self.provider.name(),
                        chunk = chunk_index,
                        tokens = chunk.len(),
                        error = %e,
                        "Push request failed"
                    );
                    report.fail_chunk(chunk, e.to_string());
                    continue;
                }
                Err(_) => {
                    warn!(
                        provider = self.provider.name(),
                        chunk = chunk_index,
                        tokens = chunk.len(),
                        timeout_secs = self.settings.timeout.as_secs_f64(),
                        "Push request timed out"
                    );
                    report.fail_chunk(
                        chunk,
                        format!(
                            "push provider timed out after {:.1}s",
                            self.settings.timeout.as_secs_f64()
                        ),
                    );
                    continue;
                }
            };

            if outcomes.len() != chunk.len() {
                warn!(
                    expected = chunk.len(),
                    got = outcomes.len(),
                    "Provider returned a mismatched outcome count"
                );
            }

            for (i, device) in chunk.iter().enumerate() {
                match outcomes.get(i) {
                    Some(TokenOutcome::Delivered) => report.record_delivered(device),
                    Some(TokenOutcome::Failed { code, message }) => {
                        if code.is_invalid_token() {
                            invalid.push(device.token.clone());
                        }
                        report.record_failed(device, offset + i, Some(code.to_string()), message.clone());
                    }
                    None => report.record_failed(
                        device,
                        offset + i,
                        None,
                        "no outcome reported by provider".to_string(),
                    ),
                }
            }
        }

        if !invalid.is_empty() {
            report.pruned = self.prune(invalid).await;
        }

        info!(
            provider = self.provider.name(),
            tokens = devices.len(),
            success = report.success_count,
            failed = report.failure_count,
            pruned = report.pruned,
            "Push send complete"
        );
        report
    }

    /// Best effort: a failed delete is logged and the tokens are retried on
    /// the next send that reports them dead.
    async fn prune(&self, mut tokens: Vec<String>) -> usize {
        tokens.sort();
        tokens.dedup();

        match self.tokens.delete_tokens(&tokens).await {
            Ok(deleted) => {
                info!(reported = tokens.len(), deleted, "Pruned invalid device tokens");
                deleted
            }
            Err(e) => {
                error!(tokens = tokens.len(), error = %e, "Failed to prune invalid device tokens");
                0
            }
        }
    }
}
