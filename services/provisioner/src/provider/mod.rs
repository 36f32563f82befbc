//! Compute provider abstraction.
//!
//! The retry loop only ever sees the [`Provisioner`] trait. The OCI
//! implementation lives in [`oci`] and signs its requests through [`signer`].

pub mod oci;
pub mod signer;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use oci::{OciProvisioner, ADDRESS_NOT_ASSIGNED, ADDRESS_UNAVAILABLE};
pub use signer::RequestSigner;

/// Details of a created instance, as shown to the operator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstanceInfo {
    pub id: String,
    pub name: String,
    pub shape: String,
    pub region: String,
    pub availability_domain: String,
    pub public_ip: String,
    pub lifecycle_state: String,
}

/// Outcome of one provisioning attempt.
///
/// Exactly one variant applies, so "succeeded" and "capacity error" can never
/// both hold.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttemptResult {
    /// The instance was created.
    Created(InstanceInfo),
    /// The provider is out of capacity for the requested shape.
    CapacityExhausted(String),
    /// Any other failure.
    Failed(String),
}

impl AttemptResult {
    pub fn succeeded(&self) -> bool {
        matches!(self, Self::Created(_))
    }

    pub fn is_capacity_error(&self) -> bool {
        matches!(self, Self::CapacityExhausted(_))
    }

    pub fn message(&self) -> &str {
        match self {
            Self::Created(_) => "Instance created successfully!",
            Self::CapacityExhausted(message) | Self::Failed(message) => message,
        }
    }

    pub fn instance(&self) -> Option<&InstanceInfo> {
        match self {
            Self::Created(info) => Some(info),
            _ => None,
        }
    }
}

/// Provider-level failures.
#[derive(Debug, Error)]
pub enum ProviderError {
    /// The provider answered with a non-success status.
    #[error("{status} {code}: {message}")]
    Service {
        status: u16,
        code: String,
        message: String,
    },

    #[error("Network error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Unexpected response: {0}")]
    Decode(String),

    #[error("Request signing failed: {0}")]
    Signing(String),
}

/// Something that can try to create the target instance.
#[async_trait]
pub trait Provisioner: Send + Sync {
    /// Make one creation attempt.
    ///
    /// Expected failures come back as [`AttemptResult`] variants. An `Err` is
    /// reserved for failures the implementation could not classify at all;
    /// the loop treats it like [`AttemptResult::Failed`].
    async fn attempt(&self) -> anyhow::Result<AttemptResult>;

    /// One cheap read-only call proving the credentials are accepted.
    async fn validate_credentials(&self) -> bool;
}
