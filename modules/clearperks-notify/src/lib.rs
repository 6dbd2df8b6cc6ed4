pub mod devices;
pub mod dispatch;
pub mod gate;
pub mod memory;
pub mod preferences;
pub mod push;
pub mod store;
pub mod workflows;

#[cfg(any(test, feature = "test-support"))]
pub mod testing;

pub use devices::{DeviceRegistry, DeviceSummary, Registration};
pub use dispatch::{Dispatcher, NotificationDraft, PushMode};
pub use gate::{GateDecision, SuppressReason};
pub use memory::InMemoryStore;
pub use preferences::PreferenceService;
pub use push::{
    FcmClient, NoopPushProvider, PushDeliverer, PushErrorCode, PushMessage, PushProvider,
    PushReport, PushSettings, TokenOutcome,
};
pub use store::{DeviceTokenStore, NotificationStore, UserStore};
