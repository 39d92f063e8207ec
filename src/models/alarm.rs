use chrono::{DateTime, Utc};

use crate::models::UserId;

pub type AlarmId = i64;

/// One-shot alarm lifecycle. `InFlight` is the short-lived claim taken by a
/// run before sending; every other non-`Scheduled` value is terminal and
/// gates reprocessing.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum AlarmStatus {
    Scheduled,
    InFlight,
    Sent,
    InvalidToken,
    Error,
}

#[derive(Debug, Clone)]
pub struct Alarm {
    pub id: AlarmId,
    pub user_id: UserId,
    pub title: Option<String>,
    pub body: Option<String>,
    pub fire_at: DateTime<Utc>,
    pub status: AlarmStatus,
    pub created_at: DateTime<Utc>,
}

pub struct NewAlarm {
    pub user_id: UserId,
    pub title: Option<String>,
    pub body: Option<String>,
    pub fire_at: DateTime<Utc>,
}
