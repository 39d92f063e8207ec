use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use anyhow::Context;
use chrono::{DateTime, Utc};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

use crate::delivery::{DeliveryOutcome, PushDeliveryChannel};
use crate::models::{Alarm, AlarmStatus, DeviceToken, PushMessage};
use crate::pipeline::due::alarm_is_due;
use crate::pipeline::{ItemOutcome, RunSummary};
use crate::storage::{AlarmStore, UserStore};

/// One-shot alarm pipeline. Each due alarm is claimed with a conditional
/// `Scheduled -> InFlight` update before sending, then finalized to a
/// terminal status. One attempt per alarm; a failed send is never retried.
pub struct AlarmPipeline {
    alarms: Arc<dyn AlarmStore>,
    users: Arc<dyn UserStore>,
    delivery: Arc<dyn PushDeliveryChannel>,
    dispatch_limit: usize,
}

/// Tokens the provider reported as unregistered during this run. Checked
/// before each send so a second alarm for the same device is finalized
/// without another provider call.
type DeadTokens = Arc<Mutex<HashSet<DeviceToken>>>;

impl AlarmPipeline {
    pub fn new(
        alarms: Arc<dyn AlarmStore>,
        users: Arc<dyn UserStore>,
        delivery: Arc<dyn PushDeliveryChannel>,
        dispatch_limit: usize,
    ) -> Self {
        Self {
            alarms,
            users,
            delivery,
            dispatch_limit,
        }
    }

    pub async fn run_once(&self, now: DateTime<Utc>) -> anyhow::Result<RunSummary> {
        let mut due = self
            .alarms
            .due_scheduled(now)
            .await
            .context("querying scheduled alarms")?;
        // The store query is trusted for candidate selection only; due-ness
        // is confirmed here so a loose backend cannot cause early fires.
        due.retain(|alarm| alarm_is_due(alarm, now));

        if due.is_empty() {
            log::debug!("[ALARMS] no due alarms");
            return Ok(RunSummary::default());
        }

        log::info!("[ALARMS] processing {} due alarms", due.len());

        let semaphore = Arc::new(Semaphore::new(self.dispatch_limit));
        let dead_tokens: DeadTokens = Arc::new(Mutex::new(HashSet::new()));
        let mut tasks = JoinSet::new();

        for alarm in due {
            let semaphore = Arc::clone(&semaphore);
            let alarms = Arc::clone(&self.alarms);
            let users = Arc::clone(&self.users);
            let delivery = Arc::clone(&self.delivery);
            let dead_tokens = Arc::clone(&dead_tokens);

            tasks.spawn(async move {
                let _permit = semaphore
                    .acquire_owned()
                    .await
                    .expect("semaphore is never closed");
                process_alarm(alarm, &*alarms, &*users, &*delivery, &dead_tokens).await
            });
        }

        let mut summary = RunSummary::default();
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(outcome) => summary.record(outcome),
                Err(e) => {
                    log::error!("[ALARMS] dispatch task failed to complete: {e}");
                    summary.record(ItemOutcome::Errored);
                }
            }
        }

        Ok(summary)
    }
}

async fn process_alarm(
    alarm: Alarm,
    alarms: &dyn AlarmStore,
    users: &dyn UserStore,
    delivery: &dyn PushDeliveryChannel,
    dead_tokens: &DeadTokens,
) -> ItemOutcome {
    let id = alarm.id;

    match alarms.claim(id).await {
        Ok(true) => {}
        Ok(false) => {
            log::debug!("[ALARMS] alarm {id} already claimed, skipping");
            return ItemOutcome::Skipped;
        }
        Err(e) => {
            log::error!("[ALARMS] failed to claim alarm {id}: {e}");
            return ItemOutcome::Errored;
        }
    }

    let token = match users.device_token(alarm.user_id).await {
        Ok(Some(token)) => token,
        Ok(None) => {
            log::warn!(
                "[ALARMS] user {} has no device endpoint, alarm {id} cannot be delivered",
                alarm.user_id
            );
            finalize(alarms, id, AlarmStatus::InvalidToken).await;
            return ItemOutcome::Invalid;
        }
        Err(e) => {
            log::error!("[ALARMS] failed to load device endpoint for alarm {id}: {e}");
            finalize(alarms, id, AlarmStatus::Error).await;
            return ItemOutcome::Errored;
        }
    };

    if dead_tokens.lock().expect("lock is never poisoned").contains(&token) {
        log::info!("[ALARMS] endpoint for alarm {id} already reported invalid this run");
        finalize(alarms, id, AlarmStatus::InvalidToken).await;
        return ItemOutcome::Invalid;
    }

    let message = PushMessage::new(alarm.title.as_deref(), alarm.body.as_deref());
    match delivery.send_push(&token, &message).await {
        DeliveryOutcome::Delivered { message_id } => {
            log::info!("[ALARMS] alarm {id} delivered, provider message {message_id}");
            finalize(alarms, id, AlarmStatus::Sent).await;
            ItemOutcome::Sent
        }
        DeliveryOutcome::EndpointInvalid => {
            log::warn!("[ALARMS] endpoint no longer registered for alarm {id}");
            dead_tokens
                .lock()
                .expect("lock is never poisoned")
                .insert(token);
            finalize(alarms, id, AlarmStatus::InvalidToken).await;
            ItemOutcome::Invalid
        }
        DeliveryOutcome::Transient(detail) | DeliveryOutcome::Permanent(detail) => {
            // Terminal by policy: re-queueing failed alarms risks
            // notification storms, so an operator has to intervene.
            log::error!("[ALARMS] send failed for alarm {id}: {detail}");
            finalize(alarms, id, AlarmStatus::Error).await;
            ItemOutcome::Errored
        }
    }
}

async fn finalize(alarms: &dyn AlarmStore, id: crate::models::AlarmId, status: AlarmStatus) {
    if let Err(e) = alarms.finalize(id, status).await {
        // The notification may already be out; a crash here can produce a
        // duplicate send on a later tick.
        log::warn!("[ALARMS] write-back failed for alarm {id} (status {status:?}): {e}");
    }
}
