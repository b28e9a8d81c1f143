//! Environment-sourced transport settings
//!
//! Settings are read once at the configuration boundary and handed to the
//! adapter explicitly. Nothing in `http` reads the process environment.

use std::path::PathBuf;

/// Path to a PEM or DER encoded CA certificate trusted for https targets
pub const CA_CERT_FILE_ENV: &str = "CONDUIT_CA_CERT_FILE";

/// Flag reporting that certificate validation is disabled process-wide
pub const TLS_INSECURE_ENV: &str = "CONDUIT_TLS_INSECURE";

/// Transport settings taken from the process environment
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TransportEnv {
    /// Custom CA certificate file
    pub ca_cert_file: Option<PathBuf>,
    /// Certificate validation has been disabled elsewhere in the process.
    /// Informational only: it triggers a warning, conduit never acts on it.
    pub tls_validation_disabled: bool,
}

impl TransportEnv {
    /// Empty settings: no custom CA, validation enabled
    pub fn new() -> Self {
        Self::default()
    }

    /// Read settings from the process environment
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load a `.env` file if one exists, then read the process environment
    pub fn load() -> Self {
        if let Ok(path) = dotenv::dotenv() {
            tracing::debug!(path = %path.display(), "Loaded .env file");
        }
        Self::from_env()
    }

    /// Read settings through an arbitrary lookup function
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let ca_cert_file = lookup(CA_CERT_FILE_ENV)
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty())
            .map(PathBuf::from);

        let tls_validation_disabled = lookup(TLS_INSECURE_ENV)
            .map(|value| parse_flag(&value))
            .unwrap_or(false);

        Self {
            ca_cert_file,
            tls_validation_disabled,
        }
    }

    /// Trust an additional CA certificate file
    pub fn with_ca_cert_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.ca_cert_file = Some(path.into());
        self
    }

    /// Record that certificate validation is disabled process-wide
    pub fn with_tls_validation_disabled(mut self, disabled: bool) -> Self {
        self.tls_validation_disabled = disabled;
        self
    }

    /// Check if a custom CA is configured
    pub fn has_custom_ca(&self) -> bool {
        self.ca_cert_file.is_some()
    }
}

fn parse_flag(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}
