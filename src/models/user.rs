pub type UserId = i64;

/// Provider-specific token routing a push notification to one installed
/// client. Registered and refreshed by the client app, never by the job.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DeviceToken(String);

impl DeviceToken {
    pub fn new(inner: impl Into<String>) -> Self {
        Self(inner.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

#[derive(Debug, Clone)]
pub struct User {
    pub id: UserId,
    pub device_token: Option<DeviceToken>,
}
