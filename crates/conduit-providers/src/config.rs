//! Provider configuration
//!
//! Supplied by the host application's configuration loader; immutable once a
//! client is built from it.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::time::Duration;

/// Default request timeout in seconds
pub const DEFAULT_TIMEOUT_SECS: u64 = 600;

/// Organization identifier sent with every request when set
pub const ORG_ID_ENV: &str = "OPENAI_ORG_ID";

/// Project identifier sent with every request when set
pub const PROJECT_ID_ENV: &str = "OPENAI_PROJECT_ID";

pub const ORGANIZATION_HEADER: &str = "OpenAI-Organization";
pub const PROJECT_HEADER: &str = "OpenAI-Project";

/// Provider-specific configuration
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderConfig {
    /// Provider identifier (e.g. "openai", "azure", "ollama")
    pub provider: String,

    /// Base URL, possibly with `user:pass@` userinfo
    pub base_url: String,

    /// API key for this provider
    #[serde(default)]
    pub api_key: String,

    /// Timeout in seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Additional headers
    #[serde(default)]
    pub headers: HashMap<String, String>,

    /// API version (cloud variant only)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_version: Option<String>,
}

fn default_timeout_secs() -> u64 {
    DEFAULT_TIMEOUT_SECS
}

impl ProviderConfig {
    pub fn new(provider: impl Into<String>, base_url: impl Into<String>) -> Self {
        Self {
            provider: provider.into(),
            base_url: base_url.into(),
            api_key: String::new(),
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            headers: HashMap::new(),
            api_version: None,
        }
    }

    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = api_key.into();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout_secs = timeout.as_secs();
        self
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    pub fn with_api_version(mut self, api_version: impl Into<String>) -> Self {
        self.api_version = Some(api_version.into());
        self
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn kind(&self) -> ProviderKind {
        ProviderKind::from_name(&self.provider)
    }
}

impl fmt::Debug for ProviderConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProviderConfig")
            .field("provider", &self.provider)
            .field("base_url", &conduit_core::logging::redact_url(&self.base_url))
            .field("api_key", &if self.api_key.is_empty() { "" } else { "***" })
            .field("timeout_secs", &self.timeout_secs)
            .field("headers", &self.headers.keys().collect::<Vec<_>>())
            .field("api_version", &self.api_version)
            .finish()
    }
}

/// Provider identity as far as transport selection is concerned
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProviderKind {
    /// Azure OpenAI: its own client with an `api-version` parameter
    Azure,
    /// Self-hosted Ollama server
    Ollama,
    /// Any other OpenAI-compatible endpoint
    Other(String),
}

impl ProviderKind {
    /// Parse a provider identifier, ignoring case
    pub fn from_name(name: &str) -> Self {
        match name.trim().to_lowercase().as_str() {
            "azure" | "azure-openai" | "azure_openai" => ProviderKind::Azure,
            "ollama" => ProviderKind::Ollama,
            other => ProviderKind::Other(other.to_string()),
        }
    }

    pub fn is_cloud(&self) -> bool {
        matches!(self, ProviderKind::Azure)
    }

    pub fn is_self_hosted(&self) -> bool {
        matches!(self, ProviderKind::Ollama)
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProviderKind::Azure => write!(f, "azure"),
            ProviderKind::Ollama => write!(f, "ollama"),
            ProviderKind::Other(name) => write!(f, "{name}"),
        }
    }
}

/// Organization/project identifiers from process-wide configuration
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProcessHeaders {
    pub organization: Option<String>,
    pub project: Option<String>,
}

impl ProcessHeaders {
    /// Read identifiers from the process environment
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Read identifiers through an arbitrary lookup function
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let read = |key| lookup(key).filter(|value: &String| !value.trim().is_empty());
        Self {
            organization: read(ORG_ID_ENV),
            project: read(PROJECT_ID_ENV),
        }
    }

    pub fn with_organization(mut self, organization: impl Into<String>) -> Self {
        self.organization = Some(organization.into());
        self
    }

    pub fn with_project(mut self, project: impl Into<String>) -> Self {
        self.project = Some(project.into());
        self
    }

    /// Add the identifier headers on top of `headers`
    ///
    /// Provider headers that already set the same name are kept.
    pub fn apply(&self, headers: &mut HashMap<String, String>) {
        let pairs = [
            (ORGANIZATION_HEADER, &self.organization),
            (PROJECT_HEADER, &self.project),
        ];
        for (name, value) in pairs {
            let Some(value) = value else { continue };
            let present = headers.keys().any(|key| key.eq_ignore_ascii_case(name));
            if !present {
                headers.insert(name.to_string(), value.clone());
            }
        }
    }
}
