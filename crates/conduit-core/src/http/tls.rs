//! Custom CA trust for https targets
//!
//! The resolver turns the configured CA file into a [`TrustContext`] for
//! secure targets only. Plain-http requests never touch the file.

use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};
use url::Url;

use crate::config::TransportEnv;
use crate::error::{Error, Result};

/// Encoding of the certificate file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CertificateFormat {
    /// One or more `-----BEGIN CERTIFICATE-----` blocks
    Pem,
    /// A single binary DER certificate
    Der,
}

/// Certificate authorities accepted during the TLS handshake
///
/// Built from the exact bytes of a CA file and never mutated afterwards, so
/// it can be shared freely between concurrent requests.
#[derive(Clone, PartialEq, Eq)]
pub struct TrustContext {
    path: PathBuf,
    certificate: Vec<u8>,
    format: CertificateFormat,
}

impl TrustContext {
    /// Read a CA certificate file
    ///
    /// Fails with [`Error::Configuration`] naming the path when the file
    /// cannot be read or holds no certificate the TLS client accepts.
    pub fn from_file(path: &Path) -> Result<Self> {
        let certificate = std::fs::read(path).map_err(|e| Error::Configuration {
            message: format!(
                "Failed to read CA certificate file {}: {}",
                path.display(),
                e
            ),
            path: Some(path.to_path_buf()),
            source: Some(e.into()),
        })?;
        let context = Self::from_bytes(path, certificate);
        context.verify()?;
        Ok(context)
    }

    /// Build from certificate bytes already in memory, unchecked
    pub(crate) fn from_bytes(path: impl Into<PathBuf>, certificate: Vec<u8>) -> Self {
        let format = if is_pem(&certificate) {
            CertificateFormat::Pem
        } else {
            CertificateFormat::Der
        };
        Self {
            path: path.into(),
            certificate,
            format,
        }
    }

    /// File the trust material was read from
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Raw certificate bytes
    pub fn certificate_bytes(&self) -> &[u8] {
        &self.certificate
    }

    pub fn format(&self) -> CertificateFormat {
        self.format
    }

    /// Check that the bytes yield root certificates a client can be built with
    fn verify(&self) -> Result<()> {
        let unusable = |cause: String, source: Option<anyhow::Error>| Error::Configuration {
            message: format!(
                "CA certificate file {} is not usable: {}",
                self.path.display(),
                cause
            ),
            path: Some(self.path.clone()),
            source,
        };

        let certificates = self
            .to_certificates()
            .map_err(|e| unusable(describe(&e), Some(e.into())))?;
        if certificates.is_empty() {
            return Err(unusable("no certificate found".to_string(), None));
        }

        let mut builder = reqwest::Client::builder();
        for certificate in certificates {
            builder = builder.add_root_certificate(certificate);
        }
        builder
            .build()
            .map_err(|e| unusable(describe(&e), Some(e.into())))?;
        Ok(())
    }

    /// Convert into root certificates for the HTTP client
    pub fn to_certificates(&self) -> std::result::Result<Vec<reqwest::Certificate>, reqwest::Error> {
        match self.format {
            CertificateFormat::Pem => reqwest::Certificate::from_pem_bundle(&self.certificate),
            CertificateFormat::Der => {
                reqwest::Certificate::from_der(&self.certificate).map(|cert| vec![cert])
            }
        }
    }
}

impl fmt::Debug for TrustContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TrustContext")
            .field("path", &self.path)
            .field("format", &self.format)
            .field("bytes", &self.certificate.len())
            .finish()
    }
}

/// Error text followed by its chain of causes
fn describe(error: &reqwest::Error) -> String {
    let mut text = error.to_string();
    let mut source = std::error::Error::source(error);
    while let Some(cause) = source {
        text.push_str(": ");
        text.push_str(&cause.to_string());
        source = std::error::Error::source(cause);
    }
    text
}

/// Check for PEM armour
pub fn is_pem(content: &[u8]) -> bool {
    let text = String::from_utf8_lossy(content);
    text.contains("-----BEGIN") && text.contains("-----END")
}

/// Resolves the trust context for an outbound request
///
/// Contexts are cached by CA path for the lifetime of the resolver. A failed
/// read is never cached, so the next call retries the file.
#[derive(Debug)]
pub struct TlsResolver {
    ca_cert_file: Option<PathBuf>,
    tls_validation_disabled: bool,
    cache: Mutex<HashMap<PathBuf, Arc<TrustContext>>>,
}

impl TlsResolver {
    pub fn new(env: &TransportEnv) -> Self {
        Self {
            ca_cert_file: env.ca_cert_file.clone(),
            tls_validation_disabled: env.tls_validation_disabled,
            cache: Mutex::new(HashMap::new()),
        }
    }

    /// Trust context for `url`, or `None` when no custom trust applies
    ///
    /// Fails with [`Error::Configuration`] naming the path when the CA file
    /// cannot be read or parsed.
    pub fn resolve(&self, url: &Url) -> Result<Option<Arc<TrustContext>>> {
        if url.scheme() != "https" {
            return Ok(None);
        }
        let Some(path) = self.ca_cert_file.as_deref() else {
            return Ok(None);
        };

        let context = {
            let mut cache = self.cache.lock().unwrap_or_else(PoisonError::into_inner);
            match cache.get(path) {
                Some(context) => Arc::clone(context),
                None => {
                    let context = Arc::new(TrustContext::from_file(path)?);
                    tracing::debug!(
                        ca_cert_file = %path.display(),
                        format = ?context.format(),
                        "Loaded custom CA certificate"
                    );
                    cache.insert(path.to_path_buf(), Arc::clone(&context));
                    context
                }
            }
        };

        if self.tls_validation_disabled {
            tracing::warn!(
                ca_cert_file = %path.display(),
                "TLS certificate validation is disabled for this process while a custom CA \
                 certificate is configured; using the custom CA"
            );
        }
        Ok(Some(context))
    }

    /// Drop cached contexts so the next resolution re-reads the file
    pub fn clear_cache(&self) {
        self.cache
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }
}
