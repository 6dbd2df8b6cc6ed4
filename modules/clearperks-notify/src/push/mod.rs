pub mod deliverer;
pub mod fcm;
pub mod noop;

use std::collections::BTreeMap;
use std::fmt;

use async_trait::async_trait;
use serde::Serialize;

pub use deliverer::{PushDeliverer, PushReport, PushSettings, TokenError, UserDelivery};
pub use fcm::FcmClient;
pub use noop::NoopPushProvider;

/// Title, body and string-keyed data of one push.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PushMessage {
    pub title: String,
    pub body: String,
    pub data: BTreeMap<String, String>,
}

impl PushMessage {
    pub fn new(title: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            body: body.into(),
            data: BTreeMap::new(),
        }
    }

    pub fn with_data(mut self, key: impl Into<String>, value: impl ToString) -> Self {
        self.data.insert(key.into(), value.to_string());
        self
    }
}

/// Provider error classes. Only the two invalid-token classes trigger
/// pruning of the registration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum PushErrorCode {
    InvalidArgument,
    NotRegistered,
    SenderIdMismatch,
    QuotaExceeded,
    Unavailable,
    Internal,
    Other(String),
}

impl PushErrorCode {
    pub fn is_invalid_token(&self) -> bool {
        matches!(self, PushErrorCode::InvalidArgument | PushErrorCode::NotRegistered)
    }
}

impl fmt::Display for PushErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PushErrorCode::InvalidArgument => write!(f, "invalid-argument"),
            PushErrorCode::NotRegistered => write!(f, "registration-token-not-registered"),
            PushErrorCode::SenderIdMismatch => write!(f, "mismatched-credential"),
            PushErrorCode::QuotaExceeded => write!(f, "message-rate-exceeded"),
            PushErrorCode::Unavailable => write!(f, "server-unavailable"),
            PushErrorCode::Internal => write!(f, "internal-error"),
            PushErrorCode::Other(code) => write!(f, "{code}"),
        }
    }
}

/// Result of delivering to one token.
#[derive(Debug, Clone, PartialEq)]
pub enum TokenOutcome {
    Delivered,
    Failed { code: PushErrorCode, message: String },
}

impl TokenOutcome {
    pub fn failed(code: PushErrorCode, message: impl Into<String>) -> Self {
        TokenOutcome::Failed {
            code,
            message: message.into(),
        }
    }
}

/// Multicast push provider.
#[async_trait]
pub trait PushProvider: Send + Sync {
    fn name(&self) -> &str;

    /// Send one message to every token. Returns one outcome per token, in
    /// token order. An `Err` means the whole request failed.
    async fn send_multicast(
        &self,
        message: &PushMessage,
        tokens: &[String],
    ) -> anyhow::Result<Vec<TokenOutcome>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_dead_token_codes_are_invalid() {
        assert!(PushErrorCode::InvalidArgument.is_invalid_token());
        assert!(PushErrorCode::NotRegistered.is_invalid_token());
        assert!(!PushErrorCode::Unavailable.is_invalid_token());
        assert!(!PushErrorCode::Other("THIRD_PARTY_AUTH_ERROR".into()).is_invalid_token());
    }

    #[test]
    fn data_values_are_stringified() {
        let message = PushMessage::new("t", "b").with_data("count", 3);
        assert_eq!(message.data["count"], "3");
    }
}
