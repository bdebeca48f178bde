//! Workload resolution and reconciliation
//!
//! Given a service name and an image, search every project the credentials
//! can see for a workload of that name. Update the first match in listing
//! order, or create the workload in a target project/namespace when no
//! project has it.

use serde_json::Value;
use thiserror::Error;
use tracing::{info, warn};

use crate::client::{ClientError, Project, RancherClient, WorkloadSpec};

/// Fatal deployment errors. Per-project listing failures during the
/// search are not here: they are logged and the search moves on.
#[derive(Error, Debug)]
pub enum DeployError {
    #[error(transparent)]
    Client(#[from] ClientError),
    #[error("no projects visible to these credentials")]
    NoProjects,
    #[error("project {0} has no namespaces to create the workload in")]
    NoNamespaces(String),
    #[error("workload {0} has no containers; refusing to update")]
    NoContainers(String),
}

pub type Result<T> = std::result::Result<T, DeployError>;

/// Targeting for one deploy: the service to act on and where to create it
/// if it does not exist yet.
#[derive(Debug, Clone)]
pub struct DeployTarget {
    pub service_name: String,
    pub project_name: Option<String>,
    pub namespace_name: Option<String>,
}

/// Where the search landed: the workload's self link plus everything
/// needed to recreate it through the same collection if the detail fetch
/// reveals it is gone.
#[derive(Debug, Clone)]
pub struct Resolution {
    pub self_link: String,
    pub workloads_url: String,
    pub namespace_id: String,
}

/// Scan projects in listing order for a workload named `service`. The
/// first name match wins and ends the whole search; a project whose
/// workload listing fails or comes back malformed is skipped.
pub async fn find_workload(
    client: &RancherClient,
    projects: &[Project],
    service: &str,
) -> Option<Resolution> {
    for project in projects {
        info!(project = %project.name, id = %project.id, "searching project");
        let workloads = match client.list_workloads(&project.id).await {
            Ok(collection) => collection.data,
            Err(e) => {
                warn!(project = %project.name, error = %e, "skipping project, workload listing failed");
                continue;
            }
        };
        info!(project = %project.name, count = workloads.len(), "workloads listed");

        for workload in workloads {
            if workload.name == service {
                info!(project = %project.name, service, "found service");
                return Some(Resolution {
                    self_link: workload.links.self_link,
                    workloads_url: client.workloads_url(&project.id),
                    namespace_id: workload.namespace_id,
                });
            }
        }
    }
    None
}

/// Rancher wraps some lookup failures as HTTP 200 with a `status` field
/// in the JSON body.
fn body_says_not_found(detail: &Value) -> bool {
    detail.get("status").and_then(Value::as_i64) == Some(404)
}

async fn create_workload(
    client: &RancherClient,
    workloads_url: &str,
    target: &DeployTarget,
    image: &str,
    namespace_id: &str,
) -> Result<()> {
    let spec = WorkloadSpec::single_container(&target.service_name, image, namespace_id);
    let reply = client.create_workload(workloads_url, &spec).await?;
    // Create responses are accepted as-is; the status is surfaced in the
    // log for the pipeline to inspect.
    info!(status = reply.status, body = %reply.body, "create response");
    Ok(())
}

/// Update the found workload in place: fetch the full detail, swap the
/// first container's image, and PUT the whole body back with the
/// redeploy action.
async fn update_workload(
    client: &RancherClient,
    target: &DeployTarget,
    image: &str,
    resolution: &Resolution,
) -> Result<()> {
    info!(self_link = %resolution.self_link, "fetching workload detail");
    let mut detail = client.workload_detail(&resolution.self_link).await?;

    if body_says_not_found(&detail) {
        info!(service = %target.service_name, "workload reported as gone, creating instead");
        return create_workload(
            client,
            &resolution.workloads_url,
            target,
            image,
            &resolution.namespace_id,
        )
        .await;
    }

    let containers = detail
        .get_mut("containers")
        .and_then(Value::as_array_mut)
        .filter(|c| !c.is_empty())
        .ok_or_else(|| DeployError::NoContainers(target.service_name.clone()))?;
    containers[0]["image"] = Value::String(image.to_string());

    let reply = client
        .redeploy_workload(&resolution.self_link, &detail)
        .await?;
    info!(status = reply.status, body = %reply.body, "update response");
    Ok(())
}

/// Pick where a fresh workload should live: the preferred project when
/// its name matches one in the listing, else the first project listed.
fn choose_project<'a>(projects: &'a [Project], preferred: Option<&str>) -> Result<&'a Project> {
    if let Some(name) = preferred {
        if let Some(project) = projects.iter().find(|p| p.name == name) {
            return Ok(project);
        }
        warn!(project = name, "preferred project not found, falling back to first listed");
    }
    projects.first().ok_or(DeployError::NoProjects)
}

async fn create_in_project(
    client: &RancherClient,
    projects: &[Project],
    target: &DeployTarget,
    image: &str,
) -> Result<()> {
    let project = choose_project(projects, target.project_name.as_deref())?;
    info!(project = %project.name, service = %target.service_name, "creating workload");

    let namespaces = client
        .list_namespaces(&project.id)
        .await
        .map_err(|e| {
            warn!(project = %project.name, error = %e, "namespace listing failed");
            DeployError::NoNamespaces(project.name.clone())
        })?
        .data;
    if namespaces.is_empty() {
        return Err(DeployError::NoNamespaces(project.name.clone()));
    }

    let namespace = target
        .namespace_name
        .as_deref()
        .and_then(|name| namespaces.iter().find(|n| n.name == name))
        .unwrap_or(&namespaces[0]);

    create_workload(
        client,
        &client.workloads_url(&project.id),
        target,
        image,
        &namespace.id,
    )
    .await
}

/// Deploy `image` to the workload named by `target`, creating it when no
/// project has it. One best-effort attempt, no retries.
pub async fn deploy(client: &RancherClient, target: &DeployTarget, image: &str) -> Result<()> {
    info!(service = %target.service_name, image, "deploying");

    let projects = client.list_projects().await?.data;
    info!(count = projects.len(), "projects listed");

    match find_workload(client, &projects, &target.service_name).await {
        Some(resolution) => update_workload(client, target, image, &resolution).await?,
        None => {
            info!(service = %target.service_name, "service not found in any project");
            create_in_project(client, &projects, target, image).await?;
        }
    }

    info!(service = %target.service_name, image, "deployment completed");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn projects(names: &[(&str, &str)]) -> Vec<Project> {
        names
            .iter()
            .map(|(id, name)| {
                serde_json::from_value(json!({"id": id, "name": name})).unwrap()
            })
            .collect()
    }

    #[test]
    fn test_body_status_404_detected() {
        assert!(body_says_not_found(&json!({"status": 404, "message": "gone"})));
        assert!(!body_says_not_found(&json!({"status": 200})));
        assert!(!body_says_not_found(&json!({"name": "api"})));
        // Rancher uses numeric statuses; a string "404" is not one.
        assert!(!body_says_not_found(&json!({"status": "404"})));
    }

    #[test]
    fn test_choose_project_prefers_named_match() {
        let list = projects(&[("p-1", "Default"), ("p-2", "staging")]);
        let chosen = choose_project(&list, Some("staging")).unwrap();
        assert_eq!(chosen.id, "p-2");
    }

    #[test]
    fn test_choose_project_falls_back_to_first() {
        let list = projects(&[("p-1", "Default"), ("p-2", "staging")]);
        assert_eq!(choose_project(&list, None).unwrap().id, "p-1");
        assert_eq!(choose_project(&list, Some("missing")).unwrap().id, "p-1");
    }

    #[test]
    fn test_choose_project_fails_on_empty_listing() {
        assert!(matches!(
            choose_project(&[], None),
            Err(DeployError::NoProjects)
        ));
    }
}
