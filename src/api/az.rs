//! `ResourceApi` over the Azure CLI
//!
//! Every call is one `az rest` invocation; the CLI owns authentication,
//! retries and timeouts. Non-zero exits are classified from stderr into the
//! `ApiError` taxonomy.

use std::process::Command;

use serde_json::Value;
use tracing::debug;
use url::Url;

use super::{ProjectInfo, ResourceApi};
use crate::error::{ApiError, ApiResult};
use crate::models::{ObjectId, ObjectSummary, ResourceDocument, ResourceKind, Scope};

/// Well-known AAD resource id of Azure DevOps
pub const DEFAULT_RESOURCE_GUID: &str = "499b84ac-1321-427f-aa17-267ca6975798";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Host {
    Core,
    Release,
    Feeds,
    Identity,
}

/// Where a kind's collection lives
#[derive(Debug, Clone, Copy)]
struct Route {
    host: Host,
    project_scoped: bool,
    path: &'static [&'static str],
    version: &'static str,
}

fn core(path: &'static [&'static str], version: &'static str) -> Route {
    Route {
        host: Host::Core,
        project_scoped: true,
        path,
        version,
    }
}

fn route(kind: ResourceKind) -> Route {
    match kind {
        ResourceKind::Repository => core(&["_apis", "git", "repositories"], "7.1"),
        ResourceKind::BuildDefinition => core(&["_apis", "build", "definitions"], "7.1"),
        ResourceKind::AgentQueue => core(&["_apis", "distributedtask", "queues"], "7.1-preview.1"),
        ResourceKind::ServiceConnection => {
            core(&["_apis", "serviceendpoint", "endpoints"], "7.1-preview.4")
        }
        ResourceKind::TaskGroup => core(&["_apis", "distributedtask", "taskgroups"], "7.1-preview.1"),
        ResourceKind::VariableGroup => {
            core(&["_apis", "distributedtask", "variablegroups"], "7.1-preview.2")
        }
        ResourceKind::BranchPolicy => core(&["_apis", "policy", "configurations"], "7.1"),
        ResourceKind::YamlPipeline => core(&["_apis", "pipelines"], "7.1"),
        ResourceKind::Wiki => core(&["_apis", "wiki", "wikis"], "7.1"),
        ResourceKind::ReleaseDefinition => Route {
            host: Host::Release,
            project_scoped: true,
            path: &["_apis", "release", "definitions"],
            version: "7.1",
        },
        ResourceKind::Feed => Route {
            host: Host::Feeds,
            project_scoped: true,
            path: &["_apis", "packaging", "feeds"],
            version: "7.1",
        },
        ResourceKind::Identity => Route {
            host: Host::Identity,
            project_scoped: false,
            path: &["_apis", "identities"],
            version: "7.1",
        },
    }
}

/// Azure DevOps client driving `az rest`
#[derive(Debug, Clone)]
pub struct AzCliApi {
    program: String,
    resource_guid: String,
}

impl AzCliApi {
    pub fn new(resource_guid: impl Into<String>) -> Self {
        Self {
            program: "az".to_string(),
            resource_guid: resource_guid.into(),
        }
    }

    /// Use a different executable (a wrapper script, or a fixed path)
    pub fn with_program(mut self, program: impl Into<String>) -> Self {
        self.program = program.into();
        self
    }

    fn base(host: Host, scope: &Scope) -> String {
        match host {
            Host::Core => scope.core_base(),
            Host::Release => scope.vsrm_base(),
            Host::Feeds => scope.feeds_base(),
            Host::Identity => scope.vssps_base(),
        }
    }

    /// Build a URL with percent-encoded path segments and `api-version`
    fn url(
        scope: &Scope,
        route: Route,
        project_scoped: bool,
        extra: &[&str],
        query: &[(&str, &str)],
    ) -> ApiResult<String> {
        let base = Self::base(route.host, scope);
        let mut url = Url::parse(&base)
            .map_err(|e| ApiError::Transport(format!("invalid organization URL {}: {}", base, e)))?;
        {
            let mut segments = url
                .path_segments_mut()
                .map_err(|_| ApiError::Transport(format!("cannot-be-a-base URL: {}", base)))?;
            if project_scoped {
                segments.push(&scope.project);
            }
            segments.extend(route.path).extend(extra);
        }
        {
            let mut pairs = url.query_pairs_mut();
            for (key, value) in query {
                pairs.append_pair(key, value);
            }
            pairs.append_pair("api-version", route.version);
        }
        Ok(url.to_string())
    }

    fn collection_url(scope: &Scope, kind: ResourceKind) -> ApiResult<String> {
        let route = route(kind);
        Self::url(scope, route, route.project_scoped, &[], &[])
    }

    fn item_url(scope: &Scope, kind: ResourceKind, id: &ObjectId) -> ApiResult<String> {
        let route = route(kind);
        let id = id.to_string();
        match kind {
            ResourceKind::Identity => {
                Self::url(scope, route, false, &[], &[("identityIds", id.as_str())])
            }
            _ => Self::url(scope, route, route.project_scoped, &[id.as_str()], &[]),
        }
    }

    /// Service connections and variable groups are created at organization
    /// level with explicit project references in the payload
    fn create_url(scope: &Scope, kind: ResourceKind) -> ApiResult<String> {
        let route = route(kind);
        match kind {
            ResourceKind::ServiceConnection | ResourceKind::VariableGroup => {
                Self::url(scope, route, false, &[], &[])
            }
            _ => Self::url(scope, route, route.project_scoped, &[], &[]),
        }
    }

    fn packages_url(scope: &Scope, feed: &ObjectId, protocol: Option<&str>) -> ApiResult<String> {
        let feed = feed.to_string();
        let query: Vec<(&str, &str)> = protocol
            .map(str::trim)
            .filter(|p| !p.is_empty())
            .map(|p| ("protocolType", p))
            .into_iter()
            .collect();
        Self::url(scope, route(ResourceKind::Feed), true, &[feed.as_str(), "packages"], &query)
    }

    fn versions_url(scope: &Scope, feed: &ObjectId, package: &ObjectId) -> ApiResult<String> {
        let feed = feed.to_string();
        let package = package.to_string();
        Self::url(
            scope,
            route(ResourceKind::Feed),
            true,
            &[feed.as_str(), "packages", package.as_str(), "versions"],
            &[],
        )
    }

    fn rest(
        &self,
        method: &str,
        uri: &str,
        body: Option<&str>,
        kind: ResourceKind,
        identifier: &str,
    ) -> ApiResult<Value> {
        debug!(method, uri, "az rest");

        let mut cmd = Command::new(&self.program);
        cmd.args(["rest", "--method", method, "--uri", uri])
            .args(["--resource", &self.resource_guid])
            .args(["--output", "json"]);
        if let Some(body) = body {
            cmd.args(["--headers", "Content-Type=application/json", "--body", body]);
        }

        let output = cmd
            .output()
            .map_err(|e| ApiError::Transport(format!("failed to run {}: {}", self.program, e)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(classify_failure(&stderr, kind, identifier));
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        if stdout.trim().is_empty() {
            return Ok(Value::Null);
        }
        serde_json::from_str(&stdout)
            .map_err(|e| ApiError::Malformed(format!("{} {}: {}", method, uri, e)))
    }
}

impl ResourceApi for AzCliApi {
    fn list(&self, scope: &Scope, kind: ResourceKind) -> ApiResult<Vec<ObjectSummary>> {
        let uri = Self::collection_url(scope, kind)?;
        let response = self.rest("get", &uri, None, kind, &scope.project)?;

        let summaries = unwrap_list(response)
            .into_iter()
            .filter_map(|value| ResourceDocument::from_value(value).ok())
            .filter(|record| {
                kind != ResourceKind::Repository
                    || !record.get("isDisabled").and_then(Value::as_bool).unwrap_or(false)
            })
            .filter_map(|record| ObjectSummary::from_record(kind, record))
            .collect();
        Ok(summaries)
    }

    fn get(&self, scope: &Scope, kind: ResourceKind, id: &ObjectId) -> ApiResult<ResourceDocument> {
        let uri = Self::item_url(scope, kind, id)?;
        let identifier = id.to_string();
        let response = self.rest("get", &uri, None, kind, &identifier)?;

        // Identity and task group lookups answer with a one-element list
        let value = match kind {
            ResourceKind::Identity | ResourceKind::TaskGroup => unwrap_list(response)
                .into_iter()
                .find(|v| !v.is_null())
                .ok_or_else(|| ApiError::not_found(kind, identifier.clone()))?,
            _ => response,
        };
        if value.is_null() {
            return Err(ApiError::not_found(kind, identifier));
        }
        ResourceDocument::from_value(value).map_err(|e| ApiError::Malformed(e.to_string()))
    }

    fn create(
        &self,
        scope: &Scope,
        kind: ResourceKind,
        payload: &ResourceDocument,
    ) -> ApiResult<ResourceDocument> {
        let uri = Self::create_url(scope, kind)?;
        let body = serde_json::to_string(payload)
            .map_err(|e| ApiError::Malformed(format!("cannot encode payload: {}", e)))?;
        let identifier = payload.name().unwrap_or("payload").to_string();
        let response = self.rest("post", &uri, Some(&body), kind, &identifier)?;
        ResourceDocument::from_value(response).map_err(|e| ApiError::Malformed(e.to_string()))
    }

    fn search_identities(&self, scope: &Scope, query: &str) -> ApiResult<Vec<ResourceDocument>> {
        let route = route(ResourceKind::Identity);
        let uri = Self::url(
            scope,
            route,
            false,
            &[],
            &[
                ("searchFilter", "General"),
                ("filterValue", query),
                ("queryMembership", "None"),
            ],
        )?;
        let response = self.rest("get", &uri, None, ResourceKind::Identity, query)?;
        Ok(documents(response))
    }

    fn project(&self, scope: &Scope) -> ApiResult<ProjectInfo> {
        let mut url = Url::parse(&scope.core_base())
            .map_err(|e| ApiError::Transport(format!("invalid organization URL: {}", e)))?;
        url.path_segments_mut()
            .map_err(|_| ApiError::Transport("cannot-be-a-base URL".to_string()))?
            .extend(["_apis", "projects", scope.project.as_str()]);
        url.query_pairs_mut().append_pair("api-version", "7.1");

        // Reported under the repository kind: there is no project kind
        let response = self.rest(
            "get",
            url.as_str(),
            None,
            ResourceKind::Repository,
            &scope.project,
        )?;
        serde_json::from_value(response)
            .map_err(|e| ApiError::Malformed(format!("project {}: {}", scope.project, e)))
    }

    fn list_packages(
        &self,
        scope: &Scope,
        feed: &ObjectId,
        protocol: Option<&str>,
    ) -> ApiResult<Vec<ResourceDocument>> {
        let uri = Self::packages_url(scope, feed, protocol)?;
        let response = self.rest("get", &uri, None, ResourceKind::Feed, &feed.to_string())?;
        Ok(documents(response))
    }

    fn list_package_versions(
        &self,
        scope: &Scope,
        feed: &ObjectId,
        package: &ObjectId,
    ) -> ApiResult<Vec<ResourceDocument>> {
        let uri = Self::versions_url(scope, feed, package)?;
        let response = self.rest("get", &uri, None, ResourceKind::Feed, &package.to_string())?;
        Ok(documents(response))
    }
}

fn documents(response: Value) -> Vec<ResourceDocument> {
    unwrap_list(response)
        .into_iter()
        .filter_map(|value| ResourceDocument::from_value(value).ok())
        .collect()
}

/// `{ "count": n, "value": [...] }`, a bare array, or nothing
fn unwrap_list(value: Value) -> Vec<Value> {
    match value {
        Value::Array(items) => items,
        Value::Object(mut map) => match map.shift_remove("value") {
            Some(Value::Array(items)) => items,
            _ => Vec::new(),
        },
        _ => Vec::new(),
    }
}

fn classify_failure(stderr: &str, kind: ResourceKind, identifier: &str) -> ApiError {
    let message = stderr.trim().to_string();
    let lower = message.to_lowercase();

    if lower.contains("404") || lower.contains("not found") || lower.contains("does not exist") {
        return ApiError::not_found(kind, identifier);
    }
    let rejected = ["400", "401", "403", "409", "bad request", "forbidden", "conflict", "unauthorized"];
    if rejected.iter().any(|marker| lower.contains(marker)) {
        return ApiError::Rejected(message);
    }
    ApiError::Transport(message)
}
