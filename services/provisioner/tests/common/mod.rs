//! Shared fixtures for the provisioner integration tests.

#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use tower::ServiceExt;

use vmclaim_provisioner::{AttemptResult, InstanceInfo, NotificationSink, Provisioner};

pub const TEST_KEY: &str = include_str!("../fixtures/test_key.pem");

/// Minimal valid environment for `Config::from_map`.
pub fn base_vars() -> HashMap<String, String> {
    [
        ("OCI_USER_OCID", "ocid1.user.oc1..aaaa"),
        ("OCI_TENANCY_OCID", "ocid1.tenancy.oc1..bbbb"),
        ("OCI_FINGERPRINT", "aa:bb:cc"),
        ("OCI_PRIVATE_KEY", TEST_KEY),
        ("OCI_COMPARTMENT_OCID", "ocid1.compartment.oc1..cccc"),
        ("OCI_SUBNET_OCID", "ocid1.subnet.oc1..dddd"),
        ("OCI_IMAGE_OCID", "ocid1.image.oc1..eeee"),
        ("OCI_AVAILABILITY_DOMAIN", "Uocm:AP-SINGAPORE-1-AD-1"),
        ("OCI_SSH_PUBLIC_KEY", "ssh-ed25519 AAAA test"),
        ("TELEGRAM_BOT_TOKEN", "test-token"),
        ("TELEGRAM_CHAT_ID", "42"),
    ]
    .into_iter()
    .map(|(k, v)| (k.to_string(), v.to_string()))
    .collect()
}

pub fn sample_instance() -> InstanceInfo {
    InstanceInfo {
        id: "ocid1.instance.oc1..new".to_string(),
        name: "free-arm-instance".to_string(),
        shape: "VM.Standard.A1.Flex".to_string(),
        region: "ap-singapore-1".to_string(),
        availability_domain: "Uocm:AP-SINGAPORE-1-AD-1".to_string(),
        public_ip: "203.0.113.7".to_string(),
        lifecycle_state: "PROVISIONING".to_string(),
    }
}

/// What a scripted attempt does.
#[derive(Debug, Clone)]
pub enum Step {
    Return(AttemptResult),
    Error(String),
    Panic(String),
}

impl Step {
    pub fn capacity() -> Self {
        Self::Return(AttemptResult::CapacityExhausted(
            "500 InternalError: Out of host capacity.".to_string(),
        ))
    }

    pub fn created() -> Self {
        Self::Return(AttemptResult::Created(sample_instance()))
    }
}

/// A GET issued against the status router while a given attempt is in
/// flight.
pub struct Probe {
    pub on_call: u64,
    pub router: Router,
    pub path: &'static str,
    pub seen: Mutex<Option<serde_json::Value>>,
}

/// Provisioner that replays a script, then repeats a fallback step forever.
pub struct ScriptedProvisioner {
    script: Mutex<VecDeque<Step>>,
    fallback: Step,
    credentials_ok: bool,
    calls: AtomicU64,
    probe: Option<Probe>,
}

impl ScriptedProvisioner {
    pub fn new(script: Vec<Step>, fallback: Step) -> Self {
        Self {
            script: Mutex::new(script.into()),
            fallback,
            credentials_ok: true,
            calls: AtomicU64::new(0),
            probe: None,
        }
    }

    pub fn with_bad_credentials(mut self) -> Self {
        self.credentials_ok = false;
        self
    }

    pub fn with_probe(mut self, on_call: u64, router: Router, path: &'static str) -> Self {
        self.probe = Some(Probe {
            on_call,
            router,
            path,
            seen: Mutex::new(None),
        });
        self
    }

    pub fn calls(&self) -> u64 {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn probe_result(&self) -> Option<serde_json::Value> {
        self.probe
            .as_ref()
            .and_then(|probe| probe.seen.lock().unwrap().clone())
    }
}

#[async_trait]
impl Provisioner for ScriptedProvisioner {
    async fn attempt(&self) -> anyhow::Result<AttemptResult> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;

        if let Some(probe) = &self.probe {
            if probe.on_call == call {
                let json = get_json(&probe.router, probe.path).await;
                *probe.seen.lock().unwrap() = Some(json);
            }
        }

        let step = self
            .script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| self.fallback.clone());

        match step {
            Step::Return(result) => Ok(result),
            Step::Error(message) => Err(anyhow::anyhow!(message)),
            Step::Panic(message) => panic!("{message}"),
        }
    }

    async fn validate_credentials(&self) -> bool {
        self.credentials_ok
    }
}

/// Sink that remembers every message.
pub struct RecordingSink {
    delivered: bool,
    messages: Mutex<Vec<String>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self {
            delivered: true,
            messages: Mutex::new(Vec::new()),
        }
    }

    /// Every delivery reports failure.
    pub fn failing() -> Self {
        Self {
            delivered: false,
            messages: Mutex::new(Vec::new()),
        }
    }

    pub fn messages(&self) -> Vec<String> {
        self.messages.lock().unwrap().clone()
    }

    pub fn count_containing(&self, needle: &str) -> usize {
        self.messages()
            .iter()
            .filter(|message| message.contains(needle))
            .count()
    }
}

#[async_trait]
impl NotificationSink for RecordingSink {
    async fn notify(&self, text: &str) -> bool {
        self.messages.lock().unwrap().push(text.to_string());
        self.delivered
    }
}

/// GET `path` from the router and parse the JSON body.
pub async fn get_json(router: &Router, path: &str) -> serde_json::Value {
    let (status, body) = get(router, path).await;
    assert_eq!(status, StatusCode::OK, "GET {path}");
    serde_json::from_slice(&body).unwrap()
}

pub async fn get(router: &Router, path: &str) -> (StatusCode, Vec<u8>) {
    let response = router
        .clone()
        .oneshot(Request::get(path).body(Body::empty()).unwrap())
        .await
        .unwrap();
    let status = response.status();
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    (status, body.to_vec())
}
