//! Rancher API client
//!
//! Thin wrapper over reqwest for the handful of Rancher REST calls the
//! deployer makes. Every request carries basic auth built from the
//! access/secret key pair.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;
use thiserror::Error;

/// Client errors
#[derive(Error, Debug)]
pub enum ClientError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("API error: {status} - {message}")]
    Api { status: u16, message: String },
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, ClientError>;

/// A Rancher collection response. Every list endpoint wraps its items
/// in a `data` array.
#[derive(Debug, Deserialize)]
pub struct Collection<T> {
    pub data: Vec<T>,
}

/// A project as returned by `GET {base}/projects`.
#[derive(Debug, Clone, Deserialize)]
pub struct Project {
    pub id: String,
    pub name: String,
}

/// A namespace as returned by `GET {base}/projects/{id}/namespaces`.
#[derive(Debug, Clone, Deserialize)]
pub struct Namespace {
    pub id: String,
    #[serde(default)]
    pub name: String,
}

/// The search-phase view of a workload. The full detail is fetched
/// separately and kept as raw JSON so updates round-trip every field.
#[derive(Debug, Clone, Deserialize)]
pub struct WorkloadSummary {
    pub name: String,
    #[serde(rename = "namespaceId")]
    pub namespace_id: String,
    pub links: WorkloadLinks,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WorkloadLinks {
    #[serde(rename = "self")]
    pub self_link: String,
}

/// Body for creating a workload.
#[derive(Debug, Clone, Serialize)]
pub struct WorkloadSpec {
    pub containers: Vec<ContainerSpec>,
    #[serde(rename = "namespaceId")]
    pub namespace_id: String,
    pub name: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct ContainerSpec {
    #[serde(rename = "imagePullPolicy")]
    pub image_pull_policy: String,
    pub image: String,
    pub name: String,
}

impl WorkloadSpec {
    /// The config shape Rancher expects for a fresh workload: a single
    /// container named after the service, always pulling the image.
    pub fn single_container(service: &str, image: &str, namespace_id: &str) -> Self {
        Self {
            containers: vec![ContainerSpec {
                image_pull_policy: "Always".to_string(),
                image: image.to_string(),
                name: service.to_string(),
            }],
            namespace_id: namespace_id.to_string(),
            name: service.to_string(),
        }
    }
}

/// Status and raw body of a create/update call. The deployer logs these
/// rather than failing on them.
#[derive(Debug)]
pub struct ApiReply {
    pub status: u16,
    pub body: String,
}

/// Rancher API client
#[derive(Debug, Clone)]
pub struct RancherClient {
    client: reqwest::Client,
    base_url: String,
    access_key: String,
    secret_key: String,
}

impl RancherClient {
    /// Create a new client for the given API endpoint and key pair.
    pub fn new(base_url: &str, access_key: &str, secret_key: &str) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            access_key: access_key.to_string(),
            secret_key: secret_key.to_string(),
        })
    }

    /// Full URL of a project's workloads collection.
    pub fn workloads_url(&self, project_id: &str) -> String {
        format!("{}/projects/{}/workloads", self.base_url, project_id)
    }

    fn get(&self, url: &str) -> reqwest::RequestBuilder {
        self.client
            .get(url)
            .basic_auth(&self.access_key, Some(&self.secret_key))
    }

    /// GET a collection endpoint, requiring HTTP 200 and a well-formed
    /// `data` array.
    async fn get_collection<T: serde::de::DeserializeOwned>(
        &self,
        url: &str,
    ) -> Result<Collection<T>> {
        let response = self.get(url).send().await?;
        let status = response.status();
        if status != reqwest::StatusCode::OK {
            let message = response.text().await.unwrap_or_default();
            return Err(ClientError::Api {
                status: status.as_u16(),
                message,
            });
        }
        let body = response.text().await?;
        Ok(serde_json::from_str(&body)?)
    }

    /// List all projects visible to the credentials.
    pub async fn list_projects(&self) -> Result<Collection<Project>> {
        self.get_collection(&format!("{}/projects", self.base_url))
            .await
    }

    /// List the workloads of one project.
    pub async fn list_workloads(&self, project_id: &str) -> Result<Collection<WorkloadSummary>> {
        self.get_collection(&self.workloads_url(project_id)).await
    }

    /// List the namespaces of one project.
    pub async fn list_namespaces(&self, project_id: &str) -> Result<Collection<Namespace>> {
        self.get_collection(&format!(
            "{}/projects/{}/namespaces",
            self.base_url, project_id
        ))
        .await
    }

    /// Fetch a workload's full detail via its self link.
    ///
    /// Rancher wraps some errors as HTTP 200 with a `status` field in the
    /// body, so the raw JSON is returned for the caller to inspect.
    pub async fn workload_detail(&self, self_link: &str) -> Result<Value> {
        let response = self.get(self_link).send().await?;
        let body = response.text().await?;
        Ok(serde_json::from_str(&body)?)
    }

    /// POST a new workload to a project's workloads collection.
    pub async fn create_workload(&self, workloads_url: &str, spec: &WorkloadSpec) -> Result<ApiReply> {
        let response = self
            .client
            .post(workloads_url)
            .basic_auth(&self.access_key, Some(&self.secret_key))
            .json(spec)
            .send()
            .await?;

        let status = response.status().as_u16();
        let body = response.text().await.unwrap_or_default();
        Ok(ApiReply { status, body })
    }

    /// PUT a mutated workload body back, triggering Rancher's redeploy
    /// action.
    pub async fn redeploy_workload(&self, self_link: &str, body: &Value) -> Result<ApiReply> {
        let response = self
            .client
            .put(format!("{}?action=redeploy", self_link))
            .basic_auth(&self.access_key, Some(&self.secret_key))
            .json(body)
            .send()
            .await?;

        let status = response.status().as_u16();
        let body = response.text().await.unwrap_or_default();
        Ok(ApiReply { status, body })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_strips_trailing_slash() {
        let client = RancherClient::new("https://rancher.local/v3/", "key", "secret").unwrap();
        assert_eq!(
            client.workloads_url("p-abc"),
            "https://rancher.local/v3/projects/p-abc/workloads"
        );
    }

    #[test]
    fn test_workload_spec_shape() {
        let spec = WorkloadSpec::single_container("api", "registry/app:v2", "ns-1");
        let json = serde_json::to_value(&spec).unwrap();
        assert_eq!(json["name"], "api");
        assert_eq!(json["namespaceId"], "ns-1");
        assert_eq!(json["containers"][0]["image"], "registry/app:v2");
        assert_eq!(json["containers"][0]["imagePullPolicy"], "Always");
        assert_eq!(json["containers"][0]["name"], "api");
    }

    #[test]
    fn test_collection_requires_data_field() {
        let parsed = serde_json::from_str::<Collection<Project>>(r#"{"type":"error"}"#);
        assert!(parsed.is_err());
    }

    #[test]
    fn test_workload_summary_wire_shape() {
        let summary: WorkloadSummary = serde_json::from_str(
            r#"{"name":"api","namespaceId":"ns-1","links":{"self":"https://r/w/api"}}"#,
        )
        .unwrap();
        assert_eq!(summary.namespace_id, "ns-1");
        assert_eq!(summary.links.self_link, "https://r/w/api");
    }
}
