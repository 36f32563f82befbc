//! Read-only projections of [`LoopState`] for the status surface.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::provider::InstanceInfo;
use crate::state::{ConfigSummary, LoopState, LoopStatus};

/// Coarse human uptime: `45s`, `2m 5s`, `1h 2m`.
pub fn format_uptime(total_seconds: u64) -> String {
    let hours = total_seconds / 3600;
    let minutes = (total_seconds % 3600) / 60;
    let seconds = total_seconds % 60;

    if hours > 0 {
        format!("{hours}h {minutes}m")
    } else if minutes > 0 {
        format!("{minutes}m {seconds}s")
    } else {
        format!("{seconds}s")
    }
}

/// Liveness probe body.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthReport {
    /// Always "healthy" while the process answers.
    pub status: String,
    pub app_status: LoopStatus,
    pub attempt: u64,
    pub uptime_seconds: u64,
}

impl HealthReport {
    pub fn capture(state: &LoopState, now: DateTime<Utc>) -> Self {
        Self {
            status: "healthy".to_string(),
            app_status: state.status,
            attempt: state.attempt,
            uptime_seconds: state.uptime_seconds(now),
        }
    }
}

/// Full state dump with derived fields.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusReport {
    pub status: LoopStatus,
    pub attempt: u64,
    pub uptime: String,
    pub uptime_seconds: u64,
    pub last_attempt_time: Option<DateTime<Utc>>,
    pub last_result: Option<String>,
    pub start_time: Option<DateTime<Utc>>,
    pub instance_created: bool,
    pub instance_info: Option<InstanceInfo>,
    pub error_message: Option<String>,
    pub config_summary: Option<ConfigSummary>,
}

impl StatusReport {
    pub fn capture(state: &LoopState, now: DateTime<Utc>) -> Self {
        let uptime_seconds = state.uptime_seconds(now);
        Self {
            status: state.status,
            attempt: state.attempt,
            uptime: format_uptime(uptime_seconds),
            uptime_seconds,
            last_attempt_time: state.last_attempt_time,
            last_result: state.last_result.clone(),
            start_time: state.start_time,
            instance_created: state.instance_info.is_some(),
            instance_info: state.instance_info.clone(),
            error_message: state.error_message.clone(),
            config_summary: state.config_summary.clone(),
        }
    }

    /// Headline shown on the status page.
    pub fn headline(&self) -> &'static str {
        match self.status {
            LoopStatus::Initializing => "Initializing...",
            LoopStatus::Running => "Searching for capacity...",
            LoopStatus::Success => "Instance Created!",
            LoopStatus::Error => "Error occurred",
        }
    }
}
