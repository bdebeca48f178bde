//! Deployment configuration
//!
//! Everything the tool needs comes from the CI job's environment, with a
//! command-line flag override for each variable.

use clap::Parser;

use crate::deploy::DeployTarget;

/// Deploy a container image to a Rancher-managed workload.
#[derive(Parser, Debug, Clone)]
#[command(name = "rancher-deploy")]
#[command(about = "Deploy a container image to a Rancher-managed workload")]
pub struct DeployConfig {
    /// Rancher API access key
    #[arg(long, env = "RANCHER_ACCESS_KEY", hide_env_values = true)]
    pub access_key: String,

    /// Rancher API secret key
    #[arg(long, env = "RANCHER_SECRET_KEY", hide_env_values = true)]
    pub secret_key: String,

    /// Base URL of the Rancher API, e.g. https://rancher.example.com/v3
    #[arg(long, env = "RANCHER_URL_API")]
    pub api_url: String,

    /// Name of the workload to deploy to
    #[arg(long, env = "SERVICE_NAME")]
    pub service_name: String,

    /// Image reference to deploy
    #[arg(long, env = "DOCKER_IMAGE")]
    pub image: String,

    /// Second image reference (the floating tag), deployed after the first
    #[arg(long, env = "DOCKER_IMAGE_LATEST")]
    pub image_latest: Option<String>,

    /// Project to create the workload in when it does not exist yet
    #[arg(long, env = "DEFAULT_PROJECT")]
    pub project: Option<String>,

    /// Namespace to create the workload in when it does not exist yet
    #[arg(long, env = "DEFAULT_NAMESPACE")]
    pub namespace: Option<String>,
}

impl DeployConfig {
    /// The image references to deploy, in order. An empty
    /// `DOCKER_IMAGE_LATEST` disables the second deploy.
    pub fn images(&self) -> Vec<&str> {
        let mut images = vec![self.image.as_str()];
        if let Some(latest) = self.image_latest.as_deref() {
            if !latest.is_empty() {
                images.push(latest);
            }
        }
        images
    }

    /// Targeting shared by both deploys of an invocation.
    pub fn target(&self) -> DeployTarget {
        DeployTarget {
            service_name: self.service_name.clone(),
            project_name: self.project.clone(),
            namespace_name: self.namespace.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(latest: Option<&str>) -> DeployConfig {
        DeployConfig {
            access_key: "token-abc".into(),
            secret_key: "secret".into(),
            api_url: "https://rancher.local/v3".into(),
            service_name: "api".into(),
            image: "registry/app:v2".into(),
            image_latest: latest.map(String::from),
            project: None,
            namespace: None,
        }
    }

    #[test]
    fn test_both_tags_deployed_in_order() {
        let config = config(Some("registry/app:latest"));
        assert_eq!(config.images(), vec!["registry/app:v2", "registry/app:latest"]);
    }

    #[test]
    fn test_empty_latest_tag_disables_second_deploy() {
        assert_eq!(config(Some("")).images(), vec!["registry/app:v2"]);
        assert_eq!(config(None).images(), vec!["registry/app:v2"]);
    }
}
