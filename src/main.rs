use std::sync::Arc;
use std::time::Duration;

use medremind::delivery::{FcmDeliveryChannel, PushDeliveryChannel};
use medremind::pipeline::{AlarmPipeline, AppointmentPipeline, MedicationPipeline};
use medremind::settings::AppSettings;
use medremind::storage::InMemoryStore;
use medremind::trigger::PipelineTrigger;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    pretty_env_logger::init();

    let settings = AppSettings::load()?;
    let scheduler = settings.scheduler.clone();
    log::info!(
        "medication dose matching uses time zone {}",
        scheduler.timezone
    );

    let store = Arc::new(InMemoryStore::new());
    let delivery: Arc<dyn PushDeliveryChannel> =
        Arc::new(FcmDeliveryChannel::new(&settings.push)?);

    let alarms = Arc::new(AlarmPipeline::new(
        store.clone(),
        store.clone(),
        delivery.clone(),
        scheduler.dispatch_concurrency,
    ));
    let appointments = Arc::new(AppointmentPipeline::new(
        store.clone(),
        store.clone(),
        delivery.clone(),
        chrono::Duration::minutes(scheduler.appointment_lookahead_mins),
        scheduler.dispatch_concurrency,
    ));
    let medications = Arc::new(MedicationPipeline::new(
        store.clone(),
        store.clone(),
        delivery.clone(),
        scheduler.timezone,
        scheduler.medication_tick_width_mins,
        scheduler.dispatch_concurrency,
    ));

    let triggers = vec![
        PipelineTrigger::spawn(
            "ALARMS",
            Duration::from_secs(scheduler.alarm_period_secs),
            move |now| {
                let pipeline = Arc::clone(&alarms);
                async move { pipeline.run_once(now).await }
            },
        ),
        PipelineTrigger::spawn(
            "APPOINTMENTS",
            Duration::from_secs(scheduler.appointment_period_secs),
            move |now| {
                let pipeline = Arc::clone(&appointments);
                async move { pipeline.run_once(now).await }
            },
        ),
        PipelineTrigger::spawn(
            "MEDICATIONS",
            Duration::from_secs(scheduler.medication_period_secs),
            move |now| {
                let pipeline = Arc::clone(&medications);
                async move { pipeline.run_once(now).await }
            },
        ),
    ];

    tokio::signal::ctrl_c().await?;
    log::info!("shutdown requested");
    for trigger in triggers {
        trigger.shutdown().await;
    }

    Ok(())
}
