//! OCI compute client.
//!
//! Talks to three REST endpoints (API version 20160918):
//! - `POST /instances` to launch the instance
//! - `GET /vnicAttachments` + `GET /vnics/{id}` to find its public IP
//! - `GET /availabilityDomains` on the identity service to check credentials

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Method, Url};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::{AttemptResult, InstanceInfo, Provisioner, ProviderError, RequestSigner};
use crate::classify::{CapacityClassifier, ErrorClass};
use crate::config::{Config, InstanceSpec, OciEndpoints};

const API_VERSION: &str = "20160918";

/// Placeholder when the VNIC has no public address yet.
pub const ADDRESS_NOT_ASSIGNED: &str = "Not yet assigned";

/// Placeholder when the address lookup itself failed.
pub const ADDRESS_UNAVAILABLE: &str = "Unable to retrieve";

/// OCI-backed [`Provisioner`].
pub struct OciProvisioner {
    client: reqwest::Client,
    signer: RequestSigner,
    endpoints: OciEndpoints,
    region: String,
    tenancy_ocid: String,
    instance: InstanceSpec,
    classifier: CapacityClassifier,
    address_lookup_delay: Duration,
}

impl OciProvisioner {
    /// Create a client from configuration. Fails if the signing key can't be
    /// loaded.
    pub fn new(config: &Config) -> anyhow::Result<Self> {
        let pem = config.oci.private_key.load_pem()?;
        let signer = RequestSigner::from_pem(config.oci.key_id(), &pem)?;

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .expect("Failed to build HTTP client");

        Ok(Self {
            client,
            signer,
            endpoints: config.endpoints.clone(),
            region: config.oci.region.clone(),
            tenancy_ocid: config.oci.tenancy_ocid.clone(),
            instance: config.instance.clone(),
            classifier: CapacityClassifier::default(),
            address_lookup_delay: Duration::from_secs(5),
        })
    }

    /// Replace the capacity classifier.
    pub fn with_classifier(mut self, classifier: CapacityClassifier) -> Self {
        self.classifier = classifier;
        self
    }

    /// Delay between a successful launch and the public IP lookup; the VNIC
    /// is usually not attached immediately.
    pub fn with_address_lookup_delay(mut self, delay: Duration) -> Self {
        self.address_lookup_delay = delay;
        self
    }

    fn launch_details(&self) -> LaunchInstanceDetails<'_> {
        let spec = &self.instance;
        LaunchInstanceDetails {
            availability_domain: &spec.availability_domain,
            compartment_id: &spec.compartment_ocid,
            display_name: &spec.display_name,
            shape: &spec.shape,
            shape_config: ShapeConfig {
                ocpus: f64::from(spec.ocpus),
                memory_in_gbs: f64::from(spec.memory_gb),
            },
            source_details: SourceDetails {
                source_type: "image",
                image_id: &spec.image_ocid,
                boot_volume_size_in_gbs: spec.boot_volume_gb,
            },
            create_vnic_details: CreateVnicDetails {
                subnet_id: &spec.subnet_ocid,
                assign_public_ip: true,
            },
            metadata: HashMap::from([("ssh_authorized_keys", spec.ssh_public_key.as_str())]),
        }
    }

    async fn launch_instance(&self) -> Result<Instance, ProviderError> {
        let url = self.url(&self.endpoints.compute, "instances", &[])?;
        let body = serde_json::to_vec(&self.launch_details())
            .map_err(|e| ProviderError::Decode(e.to_string()))?;
        self.send(Method::POST, url, Some(body)).await
    }

    /// Resolve the public IP of a freshly launched instance.
    ///
    /// Never fails: lookup problems turn into a placeholder string.
    async fn public_ip(&self, instance_id: &str) -> String {
        if !self.address_lookup_delay.is_zero() {
            tokio::time::sleep(self.address_lookup_delay).await;
        }

        match self.lookup_public_ip(instance_id).await {
            Ok(Some(ip)) => ip,
            Ok(None) => ADDRESS_NOT_ASSIGNED.to_string(),
            Err(e) => {
                warn!(instance_id, error = %e, "Failed to resolve public IP");
                ADDRESS_UNAVAILABLE.to_string()
            }
        }
    }

    async fn lookup_public_ip(&self, instance_id: &str) -> Result<Option<String>, ProviderError> {
        let url = self.url(
            &self.endpoints.compute,
            "vnicAttachments",
            &[
                ("compartmentId", self.instance.compartment_ocid.as_str()),
                ("instanceId", instance_id),
            ],
        )?;
        let attachments: Vec<VnicAttachment> = self.send(Method::GET, url, None).await?;

        let Some(attachment) = attachments.into_iter().find_map(|a| a.vnic_id) else {
            return Ok(None);
        };

        let url = self.url(
            &self.endpoints.compute,
            &format!("vnics/{attachment}"),
            &[],
        )?;
        let vnic: Vnic = self.send(Method::GET, url, None).await?;
        Ok(vnic.public_ip.filter(|ip| !ip.is_empty()))
    }

    fn url(&self, base: &str, path: &str, query: &[(&str, &str)]) -> Result<Url, ProviderError> {
        let raw = format!("{}/{API_VERSION}/{path}", base.trim_end_matches('/'));
        let mut url =
            Url::parse(&raw).map_err(|e| ProviderError::Decode(format!("bad url {raw}: {e}")))?;
        if !query.is_empty() {
            url.query_pairs_mut().extend_pairs(query);
        }
        Ok(url)
    }

    /// Sign, send and decode one request.
    async fn send<T: DeserializeOwned>(
        &self,
        method: Method,
        url: Url,
        body: Option<Vec<u8>>,
    ) -> Result<T, ProviderError> {
        let headers = self.signer.sign(&method, &url, body.as_deref())?;
        debug!(method = %method, url = %url, "Sending OCI request");

        let mut request = self.client.request(method, url).headers(headers);
        if let Some(body) = body {
            request = request.body(body);
        }

        let response = request.send().await?;
        let status = response.status();

        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            let (code, message) = match serde_json::from_str::<ServiceErrorBody>(&text) {
                Ok(body) => (body.code, body.message),
                Err(_) => ("Unknown".to_string(), text),
            };
            return Err(ProviderError::Service {
                status: status.as_u16(),
                code,
                message,
            });
        }

        response
            .json::<T>()
            .await
            .map_err(|e| ProviderError::Decode(e.to_string()))
    }
}

#[async_trait]
impl Provisioner for OciProvisioner {
    async fn attempt(&self) -> anyhow::Result<AttemptResult> {
        let instance = match self.launch_instance().await {
            Ok(instance) => instance,
            Err(err @ ProviderError::Service { .. }) => {
                let text = err.to_string();
                return Ok(match self.classifier.classify(&text) {
                    ErrorClass::Capacity => AttemptResult::CapacityExhausted(text),
                    ErrorClass::Other => AttemptResult::Failed(text),
                });
            }
            // Transport and decode problems are never capacity.
            Err(err) => return Ok(AttemptResult::Failed(err.to_string())),
        };

        info!(
            instance_id = %instance.id,
            lifecycle_state = %instance.lifecycle_state,
            "Instance launched"
        );

        let public_ip = self.public_ip(&instance.id).await;

        Ok(AttemptResult::Created(InstanceInfo {
            id: instance.id,
            name: instance.display_name,
            shape: instance.shape,
            region: self.region.clone(),
            availability_domain: instance.availability_domain,
            public_ip,
            lifecycle_state: instance.lifecycle_state,
        }))
    }

    async fn validate_credentials(&self) -> bool {
        let url = match self.url(
            &self.endpoints.identity,
            "availabilityDomains",
            &[("compartmentId", self.tenancy_ocid.as_str())],
        ) {
            Ok(url) => url,
            Err(e) => {
                warn!(error = %e, "OCI credential validation failed");
                return false;
            }
        };

        match self.send::<Vec<AvailabilityDomain>>(Method::GET, url, None).await {
            Ok(domains) => {
                info!(
                    availability_domains = domains.len(),
                    "OCI credentials validated"
                );
                true
            }
            Err(e) => {
                warn!(error = %e, "OCI credential validation failed");
                false
            }
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct LaunchInstanceDetails<'a> {
    availability_domain: &'a str,
    compartment_id: &'a str,
    display_name: &'a str,
    shape: &'a str,
    shape_config: ShapeConfig,
    source_details: SourceDetails<'a>,
    create_vnic_details: CreateVnicDetails<'a>,
    metadata: HashMap<&'static str, &'a str>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ShapeConfig {
    ocpus: f64,
    #[serde(rename = "memoryInGBs")]
    memory_in_gbs: f64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SourceDetails<'a> {
    source_type: &'static str,
    image_id: &'a str,
    #[serde(rename = "bootVolumeSizeInGBs")]
    boot_volume_size_in_gbs: u32,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct CreateVnicDetails<'a> {
    subnet_id: &'a str,
    assign_public_ip: bool,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Instance {
    id: String,
    #[serde(default)]
    display_name: String,
    #[serde(default)]
    shape: String,
    #[serde(default)]
    availability_domain: String,
    #[serde(default)]
    lifecycle_state: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct VnicAttachment {
    #[serde(default)]
    vnic_id: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Vnic {
    #[serde(default)]
    public_ip: Option<String>,
}

#[derive(Debug, Deserialize)]
struct AvailabilityDomain {
    #[allow(dead_code)]
    name: String,
}

#[derive(Debug, Deserialize)]
struct ServiceErrorBody {
    code: String,
    message: String,
}
