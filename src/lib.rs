//! One-shot deployment of a container image to a Rancher-managed workload.
//!
//! Invoked from a build pipeline: given credentials, an API endpoint, a
//! service name, and an image reference, locate the workload across the
//! cluster's projects and update it to run the new image, or create it
//! when no project has it.

pub mod client;
pub mod config;
pub mod deploy;

use client::RancherClient;
use config::DeployConfig;
use deploy::Result;

/// Run the configured deploys sequentially: the versioned image first,
/// then the floating tag when one was supplied. Each deploy re-resolves
/// the workload from scratch; there is no rollback if the second fails.
pub async fn run(config: &DeployConfig) -> Result<()> {
    let client = RancherClient::new(&config.api_url, &config.access_key, &config.secret_key)?;
    let target = config.target();

    for image in config.images() {
        deploy::deploy(&client, &target, image).await?;
    }
    Ok(())
}
