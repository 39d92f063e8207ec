use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};

use crate::delivery::{DeliveryOutcome, PushDeliveryChannel};
use crate::models::{DeviceToken, PushMessage};
use crate::settings::PushSettings;

#[derive(Serialize)]
struct FcmNotification<'a> {
    title: &'a str,
    body: &'a str,
}

#[derive(Serialize)]
struct FcmRequest<'a> {
    to: &'a str,
    notification: FcmNotification<'a>,
}

#[derive(Deserialize, Default)]
struct FcmResponse {
    #[serde(default)]
    message_id: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

/// Push delivery over the provider's legacy HTTP endpoint.
pub struct FcmDeliveryChannel {
    client: reqwest::Client,
    endpoint: String,
    server_key: String,
}

impl FcmDeliveryChannel {
    pub fn new(settings: &PushSettings) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(settings.timeout_secs))
            .build()?;

        Ok(Self {
            client,
            endpoint: settings.endpoint.clone(),
            server_key: settings.server_key.clone(),
        })
    }
}

#[async_trait]
impl PushDeliveryChannel for FcmDeliveryChannel {
    async fn send_push(&self, token: &DeviceToken, message: &PushMessage) -> DeliveryOutcome {
        let request = FcmRequest {
            to: token.as_str(),
            notification: FcmNotification {
                title: &message.title,
                body: &message.body,
            },
        };

        let response = self
            .client
            .post(&self.endpoint)
            .header(reqwest::header::AUTHORIZATION, auth_header(&self.server_key))
            .json(&request)
            .send()
            .await;

        let response = match response {
            Ok(r) => r,
            // Connect errors and timeouts are retryable by a later tick.
            Err(e) => return DeliveryOutcome::Transient(e.to_string()),
        };

        let status = response.status();
        let body = response.json::<FcmResponse>().await.unwrap_or_default();
        classify_response(status, &body)
    }
}

// The legacy send endpoint authenticates with `key=<server_key>`, not a
// Bearer token (that scheme belongs to the OAuth-based v1 API).
fn auth_header(server_key: &str) -> String {
    format!("key={server_key}")
}

fn classify_response(status: StatusCode, body: &FcmResponse) -> DeliveryOutcome {
    if status.is_success() {
        return match body.error.as_deref() {
            // The provider reports unregistered tokens inside a 200 envelope.
            Some("NotRegistered") | Some("InvalidRegistration") | Some("UNREGISTERED") => {
                DeliveryOutcome::EndpointInvalid
            }
            Some(other) => DeliveryOutcome::Permanent(other.to_owned()),
            None => DeliveryOutcome::Delivered {
                message_id: body.message_id.clone().unwrap_or_default(),
            },
        };
    }

    if status == StatusCode::NOT_FOUND || status == StatusCode::GONE {
        return DeliveryOutcome::EndpointInvalid;
    }

    if status.is_server_error() || status == StatusCode::TOO_MANY_REQUESTS {
        return DeliveryOutcome::Transient(format!("provider returned {status}"));
    }

    DeliveryOutcome::Permanent(format!("provider returned {status}"))
}
