//! Client construction
//!
//! The transport decision is made once per provider configuration and stored
//! on the resulting [`ClientHandle`] as a [`ClientVariant`]. Requests never
//! re-check it.

use std::sync::Arc;

use conduit_core::config::TransportEnv;
use conduit_core::http::{has_userinfo, DirectFetch, FetchAdapter, HttpFetch, ReqwestTransport, Transport};
use conduit_core::logging::redact_url;
use url::Url;

use crate::client::ClientHandle;
use crate::config::{ProcessHeaders, ProviderConfig};
use crate::error::{Error, Result};

/// API version used for the cloud variant when the config names none
pub const DEFAULT_AZURE_API_VERSION: &str = "2024-10-21";

/// Which client a provider configuration gets
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientVariant {
    /// Cloud client with a fixed `api-version` query parameter
    Cloud { api_version: String },
    /// Standard client on the default transport
    Standard,
    /// Standard client routed through [`FetchAdapter`]
    StandardWithAdapter,
}

impl ClientVariant {
    pub fn uses_adapter(&self) -> bool {
        matches!(self, ClientVariant::StandardWithAdapter)
    }

    pub fn name(&self) -> &'static str {
        match self {
            ClientVariant::Cloud { .. } => "cloud",
            ClientVariant::Standard => "standard",
            ClientVariant::StandardWithAdapter => "standard-with-adapter",
        }
    }
}

/// Builds model clients from provider configurations
///
/// All clients built by one factory share a single transport, so the
/// adapter's trust contexts are built at most once per CA path.
pub struct ClientFactory {
    process_headers: ProcessHeaders,
    adapter: Arc<FetchAdapter>,
    direct: Arc<DirectFetch>,
}

impl ClientFactory {
    /// Factory over a fresh reqwest transport
    pub fn new(env: TransportEnv, process_headers: ProcessHeaders) -> Result<Self> {
        let transport: Arc<dyn Transport> = Arc::new(ReqwestTransport::new()?);
        Ok(Self::with_transport(transport, env, process_headers))
    }

    /// Factory configured from the process environment (and `.env`)
    pub fn from_env() -> Result<Self> {
        Self::new(TransportEnv::load(), ProcessHeaders::from_env())
    }

    /// Factory over an existing transport
    pub fn with_transport(
        transport: Arc<dyn Transport>,
        env: TransportEnv,
        process_headers: ProcessHeaders,
    ) -> Self {
        Self {
            process_headers,
            adapter: Arc::new(FetchAdapter::with_transport(Arc::clone(&transport), &env)),
            direct: Arc::new(DirectFetch::with_transport(transport)),
        }
    }

    pub fn process_headers(&self) -> &ProcessHeaders {
        &self.process_headers
    }

    /// Decide the client variant for `config`
    ///
    /// The cloud variant takes the base URL as-is. Everything else must
    /// parse; a malformed base URL is an error, never a silent fallback to
    /// the default transport.
    pub fn select_variant(&self, config: &ProviderConfig) -> Result<ClientVariant> {
        let kind = config.kind();
        if kind.is_cloud() {
            let api_version = config
                .api_version
                .clone()
                .unwrap_or_else(|| DEFAULT_AZURE_API_VERSION.to_string());
            return Ok(ClientVariant::Cloud { api_version });
        }

        let url = Url::parse(&config.base_url).map_err(|source| Error::InvalidBaseUrl {
            provider: config.provider.clone(),
            url: redact_url(&config.base_url),
            source,
        })?;

        if has_userinfo(&url) && kind.is_self_hosted() {
            Ok(ClientVariant::StandardWithAdapter)
        } else {
            Ok(ClientVariant::Standard)
        }
    }

    /// Build the client for `config`
    pub fn build(&self, config: &ProviderConfig) -> Result<ClientHandle> {
        let variant = self.select_variant(config)?;

        let mut default_headers = config.headers.clone();
        self.process_headers.apply(&mut default_headers);

        let fetch: Arc<dyn HttpFetch> = if variant.uses_adapter() {
            self.adapter.clone()
        } else {
            self.direct.clone()
        };

        tracing::debug!(
            provider = %config.provider,
            base_url = %redact_url(&config.base_url),
            variant = variant.name(),
            timeout_secs = config.timeout_secs,
            "Built model client"
        );

        Ok(ClientHandle::new(
            config.clone(),
            variant,
            default_headers,
            fetch,
        ))
    }
}
