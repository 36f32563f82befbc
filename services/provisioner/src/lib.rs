//! vmclaim provisioner
//!
//! Keeps asking the OCI compute API for a capacity-constrained instance
//! (by default a `VM.Standard.A1.Flex`) until one is created, then tells the
//! operator over Telegram.
//!
//! ## Architecture
//!
//! ```text
//! main ── RetryLoop (spawned task, sole writer) ──► StatusBoard ◄── axum handlers
//!              │                                                    (readers)
//!              ├── Provisioner       (OCI launch + public IP lookup)
//!              └── NotificationSink  (Telegram)
//! ```
//!
//! ## Modules
//!
//! - `classify`: capacity error heuristics
//! - `provider`: provisioner trait and the OCI client
//! - `notify`: operator notifications
//! - `state`: shared loop state
//! - `worker`: the retry loop
//! - `status` / `api`: read-only status surface

pub mod api;
pub mod classify;
pub mod cli;
pub mod config;
pub mod notify;
pub mod provider;
pub mod state;
pub mod status;
pub mod worker;

// Re-export commonly used types
pub use classify::{CapacityClassifier, ErrorClass, ErrorMatcher, SubstringMatcher};
pub use notify::{NotificationSink, TelegramNotifier};
pub use provider::{AttemptResult, InstanceInfo, OciProvisioner, Provisioner};
pub use state::{LoopState, LoopStatus, StatusBoard};
pub use worker::{LoopOutcome, RetryLoop};
