//! Organization + project scope
//!
//! Every collaborator call takes an explicit `Scope`; nothing in the engine
//! reads ambient organization state.

use serde::{Deserialize, Serialize};
use std::fmt;

/// An (organization, project) pair identifying where objects live
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Scope {
    /// Organization URL, e.g. `https://dev.azure.com/contoso`
    pub org_url: String,
    /// Project name
    pub project: String,
}

impl Scope {
    pub fn new(org_url: impl Into<String>, project: impl Into<String>) -> Self {
        Self {
            org_url: org_url.into().trim().trim_end_matches('/').to_string(),
            project: project.into().trim().to_string(),
        }
    }

    /// Organization name, handling both the `dev.azure.com/{org}` and the
    /// legacy `{org}.visualstudio.com` URL forms
    pub fn org_name(&self) -> &str {
        let rest = self
            .org_url
            .split_once("://")
            .map(|(_, rest)| rest)
            .unwrap_or(self.org_url.as_str());
        let rest = rest.trim_end_matches('/');

        for host in ["dev.azure.com/", "vssps.dev.azure.com/", "vsrm.dev.azure.com/"] {
            if let Some(org) = rest.strip_prefix(host) {
                return org.split('/').next().unwrap_or(org);
            }
        }

        let host = rest.split('/').next().unwrap_or(rest);
        host.strip_suffix(".visualstudio.com").unwrap_or(host)
    }

    /// Base URL for core (git, build, policy, ...) endpoints
    pub fn core_base(&self) -> String {
        format!("https://dev.azure.com/{}", self.org_name())
    }

    /// Base URL for release management endpoints
    pub fn vsrm_base(&self) -> String {
        format!("https://vsrm.dev.azure.com/{}", self.org_name())
    }

    /// Base URL for artifacts feed endpoints
    pub fn feeds_base(&self) -> String {
        format!("https://feeds.dev.azure.com/{}", self.org_name())
    }

    /// Base URL for identity endpoints
    pub fn vssps_base(&self) -> String {
        format!("https://vssps.dev.azure.com/{}", self.org_name())
    }

    /// Whether both scopes point at the same organization
    pub fn same_org(&self, other: &Scope) -> bool {
        self.org_name().eq_ignore_ascii_case(other.org_name())
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.org_name(), self.project)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_org_name_from_dev_azure_url() {
        let scope = Scope::new("https://dev.azure.com/contoso/", "Web");
        assert_eq!(scope.org_url, "https://dev.azure.com/contoso");
        assert_eq!(scope.org_name(), "contoso");
    }

    #[test]
    fn test_org_name_from_visualstudio_url() {
        let scope = Scope::new("https://fabrikam.visualstudio.com", "Web");
        assert_eq!(scope.org_name(), "fabrikam");
    }

    #[test]
    fn test_org_name_from_vssps_url() {
        let scope = Scope::new("https://vssps.dev.azure.com/contoso", "Web");
        assert_eq!(scope.org_name(), "contoso");
    }

    #[test]
    fn test_service_bases() {
        let scope = Scope::new("https://dev.azure.com/contoso", "Web");
        assert_eq!(scope.vsrm_base(), "https://vsrm.dev.azure.com/contoso");
        assert_eq!(scope.feeds_base(), "https://feeds.dev.azure.com/contoso");
        assert_eq!(scope.vssps_base(), "https://vssps.dev.azure.com/contoso");
        assert_eq!(scope.to_string(), "contoso/Web");
    }

    #[test]
    fn test_same_org() {
        let a = Scope::new("https://dev.azure.com/Contoso", "A");
        let b = Scope::new("https://contoso.visualstudio.com", "B");
        assert!(a.same_org(&b));
    }
}
