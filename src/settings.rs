use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;

#[derive(Deserialize, Debug, Clone)]
pub struct PushSettings {
    pub endpoint: String,
    pub server_key: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

#[derive(Deserialize, Debug, Clone)]
pub struct SchedulerSettings {
    #[serde(default = "default_alarm_period_secs")]
    pub alarm_period_secs: u64,
    #[serde(default = "default_appointment_period_secs")]
    pub appointment_period_secs: u64,
    #[serde(default = "default_medication_period_secs")]
    pub medication_period_secs: u64,

    /// How long past its reminder instant an appointment stays due. Must be
    /// at least `appointment_period_secs` or a due instant can fall between
    /// ticks.
    #[serde(default = "default_appointment_lookahead_mins")]
    pub appointment_lookahead_mins: i64,

    #[serde(default = "default_medication_tick_width_mins")]
    pub medication_tick_width_mins: u32,

    /// Upper bound on concurrent sends within one run.
    #[serde(default = "default_dispatch_concurrency")]
    pub dispatch_concurrency: usize,

    /// Zone for medication time-of-day matching. Deployments should set this
    /// to their local zone; dose windows around DST transitions may skip or
    /// double, which is accepted rather than guessed around.
    #[serde(default = "default_timezone")]
    pub timezone: chrono_tz::Tz,
}

#[derive(Deserialize, Debug, Clone)]
pub struct AppSettings {
    pub push: PushSettings,
    #[serde(default)]
    pub scheduler: SchedulerSettings,
}

impl AppSettings {
    pub fn load() -> Result<Self, ConfigError> {
        let settings = Config::builder()
            .add_source(File::with_name("appsettings").required(true))
            .add_source(File::with_name("appsettings.local").required(false))
            .add_source(Environment::with_prefix("APP").separator("__"))
            .build()?;

        settings.try_deserialize()
    }
}

impl Default for SchedulerSettings {
    fn default() -> Self {
        Self {
            alarm_period_secs: default_alarm_period_secs(),
            appointment_period_secs: default_appointment_period_secs(),
            medication_period_secs: default_medication_period_secs(),
            appointment_lookahead_mins: default_appointment_lookahead_mins(),
            medication_tick_width_mins: default_medication_tick_width_mins(),
            dispatch_concurrency: default_dispatch_concurrency(),
            timezone: default_timezone(),
        }
    }
}

fn default_timeout_secs() -> u64 {
    10
}

fn default_alarm_period_secs() -> u64 {
    60
}

fn default_appointment_period_secs() -> u64 {
    3600
}

fn default_medication_period_secs() -> u64 {
    300
}

fn default_appointment_lookahead_mins() -> i64 {
    60
}

fn default_medication_tick_width_mins() -> u32 {
    5
}

fn default_dispatch_concurrency() -> usize {
    8
}

fn default_timezone() -> chrono_tz::Tz {
    chrono_tz::UTC
}
