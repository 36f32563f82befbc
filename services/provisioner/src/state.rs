//! Loop state shared between the retry loop and the status endpoints.
//!
//! The retry loop is the only writer. Readers grab an immutable snapshot
//! through [`StatusBoard::snapshot`]; every write builds a new [`LoopState`]
//! and swaps it in, so readers never see a half-applied update and never wait
//! on the (slow, network-bound) attempt in progress.

use std::sync::Arc;

use arc_swap::ArcSwap;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::config::Config;
use crate::provider::InstanceInfo;

/// Loop lifecycle. Moves forward only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LoopStatus {
    Initializing,
    Running,
    Success,
    Error,
}

impl LoopStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Initializing => "initializing",
            Self::Running => "running",
            Self::Success => "success",
            Self::Error => "error",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Success | Self::Error)
    }
}

impl std::fmt::Display for LoopStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What the loop is aiming for, for display.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfigSummary {
    pub region: String,
    pub availability_domain: String,
    pub instance_name: String,
    pub shape: String,
    pub ocpus: u32,
    pub memory_gb: u32,
    pub retry_interval_secs: u64,
}

impl From<&Config> for ConfigSummary {
    fn from(config: &Config) -> Self {
        Self {
            region: config.oci.region.clone(),
            availability_domain: config.instance.availability_domain.clone(),
            instance_name: config.instance.display_name.clone(),
            shape: config.instance.shape.clone(),
            ocpus: config.instance.ocpus,
            memory_gb: config.instance.memory_gb,
            retry_interval_secs: config.retry_interval.as_secs(),
        }
    }
}

/// Snapshot of the retry loop.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoopState {
    pub status: LoopStatus,
    pub attempt: u64,
    pub last_attempt_time: Option<DateTime<Utc>>,
    pub last_result: Option<String>,
    pub start_time: Option<DateTime<Utc>>,
    pub instance_info: Option<InstanceInfo>,
    pub error_message: Option<String>,
    pub config_summary: Option<ConfigSummary>,
}

impl Default for LoopState {
    fn default() -> Self {
        Self {
            status: LoopStatus::Initializing,
            attempt: 0,
            last_attempt_time: None,
            last_result: None,
            start_time: None,
            instance_info: None,
            error_message: None,
            config_summary: None,
        }
    }
}

impl LoopState {
    /// Whole seconds since the loop started; zero before that.
    pub fn uptime_seconds(&self, now: DateTime<Utc>) -> u64 {
        self.start_time
            .map(|start| (now - start).num_seconds().max(0) as u64)
            .unwrap_or(0)
    }
}

/// Owner of the current [`LoopState`].
///
/// Share it by `Arc` between the loop (writer) and the HTTP layer (readers).
/// Write methods enforce the forward-only status order and silently ignore
/// calls that would break it.
#[derive(Debug, Default)]
pub struct StatusBoard {
    state: ArcSwap<LoopState>,
}

impl StatusBoard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current snapshot.
    pub fn snapshot(&self) -> Arc<LoopState> {
        self.state.load_full()
    }

    /// Record the target configuration for display. Allowed in any state.
    pub fn set_config_summary(&self, summary: ConfigSummary) {
        self.update(|state| {
            state.config_summary = Some(summary);
            true
        });
    }

    /// `Initializing → Running`. Sets the start time.
    pub fn start_running(&self, now: DateTime<Utc>) -> bool {
        self.update(|state| {
            if state.status != LoopStatus::Initializing {
                return false;
            }
            state.status = LoopStatus::Running;
            state.start_time = Some(now);
            true
        })
    }

    /// Count a new attempt. Returns the attempt number, or `None` if the loop
    /// is not running.
    pub fn begin_attempt(&self, now: DateTime<Utc>) -> Option<u64> {
        let mut number = None;
        self.update(|state| {
            if state.status != LoopStatus::Running {
                return false;
            }
            state.attempt += 1;
            state.last_attempt_time = Some(now);
            number = Some(state.attempt);
            true
        });
        number
    }

    /// Outcome text of the latest non-final attempt.
    pub fn record_result(&self, result: impl Into<String>) -> bool {
        let result = result.into();
        self.update(|state| {
            if state.status != LoopStatus::Running {
                return false;
            }
            state.last_result = Some(result);
            true
        })
    }

    /// `Running → Success`, publishing the instance in the same swap.
    pub fn record_success(&self, instance: InstanceInfo) -> bool {
        self.update(|state| {
            if state.status != LoopStatus::Running {
                return false;
            }
            state.status = LoopStatus::Success;
            state.instance_info = Some(instance);
            state.last_result = Some("Instance created successfully!".to_string());
            true
        })
    }

    /// `Initializing | Running → Error`.
    pub fn fail(&self, message: impl Into<String>) -> bool {
        let message = message.into();
        self.update(|state| {
            if state.status.is_terminal() {
                return false;
            }
            state.status = LoopStatus::Error;
            state.last_result = Some(format!("FATAL: {message}"));
            state.error_message = Some(message);
            true
        })
    }

    /// Clone, mutate, swap. `apply` returns whether anything changed.
    fn update<F>(&self, apply: F) -> bool
    where
        F: FnOnce(&mut LoopState) -> bool,
    {
        let mut next = LoopState::clone(&self.state.load());
        if apply(&mut next) {
            self.state.store(Arc::new(next));
            true
        } else {
            false
        }
    }
}
