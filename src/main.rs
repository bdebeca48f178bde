//! CI entry point: read the deployment parameters from the environment,
//! run the deploy(s), and turn any fatal error into exit code 1.

use clap::Parser;
use rancher_deploy::config::DeployConfig;
use std::io;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(io::stderr))
        .init();

    // A missing required variable is a usage error, reported the same way
    // as any other fatal condition; --help and --version still exit 0.
    let config = match DeployConfig::try_parse() {
        Ok(config) => config,
        Err(e) => {
            let _ = e.print();
            std::process::exit(if e.use_stderr() { 1 } else { 0 });
        }
    };

    info!(
        api_url = %config.api_url,
        service = %config.service_name,
        image = %config.image,
        image_latest = config.image_latest.as_deref().unwrap_or(""),
        "starting Rancher deployment"
    );

    if let Err(e) = rancher_deploy::run(&config).await {
        error!(error = %e, "deployment failed");
        std::process::exit(1);
    }
}
