mod fcm;

pub use fcm::FcmDeliveryChannel;

use async_trait::async_trait;

use crate::models::{DeviceToken, PushMessage};

/// Per-send result from the push provider. `EndpointInvalid` specifically
/// means the device token is no longer registered with the provider; it
/// drives a different persisted status than a transient failure and
/// suppresses further sends to that token within the same run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeliveryOutcome {
    Delivered { message_id: String },
    EndpointInvalid,
    Transient(String),
    Permanent(String),
}

#[async_trait]
pub trait PushDeliveryChannel: Send + Sync + 'static {
    async fn send_push(&self, token: &DeviceToken, message: &PushMessage) -> DeliveryOutcome;
}
