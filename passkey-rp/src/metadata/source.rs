use async_trait::async_trait;

use super::{MetadataBlobPayload, MetadataError};

/// Where metadata BLOBs come from.
#[cfg_attr(any(test, feature = "testable"), mockall::automock)]
#[async_trait]
pub trait MetadataSource: Send + Sync {
    /// Fetch and decode the current BLOB.
    async fn fetch(&self) -> Result<MetadataBlobPayload, MetadataError>;
}

/// Serves a fixed BLOB, for offline deployments that ship their own metadata.
#[derive(Debug, Clone, Default)]
pub struct StaticMetadataSource {
    payload: MetadataBlobPayload,
}

impl StaticMetadataSource {
    /// Serve `payload` on every fetch.
    pub fn new(payload: MetadataBlobPayload) -> Self {
        Self { payload }
    }
}

#[async_trait]
impl MetadataSource for StaticMetadataSource {
    async fn fetch(&self) -> Result<MetadataBlobPayload, MetadataError> {
        Ok(self.payload.clone())
    }
}

#[cfg(feature = "http-metadata")]
pub use http::HttpMetadataSource;

#[cfg(feature = "http-metadata")]
mod http {
    use std::time::Duration;

    use async_trait::async_trait;
    use chrono::Utc;
    use x509_cert::{der::Decode, Certificate};

    use super::MetadataSource;
    use crate::{
        config::MetadataConfig,
        metadata::{MetadataBlobPayload, MetadataError},
    };

    /// Downloads the BLOB from a metadata service such as `https://mds3.fidoalliance.org/`.
    #[derive(Debug, Clone)]
    pub struct HttpMetadataSource {
        client: reqwest::Client,
        url: String,
        trust_anchor: Option<Certificate>,
    }

    impl HttpMetadataSource {
        /// Create a source whose requests are aborted after `timeout`.
        pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self, MetadataError> {
            let client = reqwest::Client::builder()
                .timeout(timeout)
                .build()
                .map_err(|e| MetadataError::Fetch(e.to_string()))?;
            Ok(Self {
                client,
                url: url.into(),
                trust_anchor: None,
            })
        }

        /// A source for the configured BLOB location and fetch timeout, `None` when no location is
        /// configured.
        pub fn from_config(config: &MetadataConfig) -> Result<Option<Self>, MetadataError> {
            config
                .url
                .as_deref()
                .map(|url| Self::new(url, config.fetch_timeout))
                .transpose()
        }

        /// The BLOB location.
        pub fn url(&self) -> &str {
            &self.url
        }

        /// Verify BLOBs against this DER encoded root certificate.
        pub fn with_trust_anchor(mut self, der: &[u8]) -> Result<Self, MetadataError> {
            let root = Certificate::from_der(der)
                .map_err(|e| MetadataError::Untrusted(format!("invalid trust anchor: {e}")))?;
            self.trust_anchor = Some(root);
            Ok(self)
        }
    }

    #[async_trait]
    impl MetadataSource for HttpMetadataSource {
        async fn fetch(&self) -> Result<MetadataBlobPayload, MetadataError> {
            let token = self
                .client
                .get(&self.url)
                .send()
                .await
                .and_then(reqwest::Response::error_for_status)
                .map_err(|e| MetadataError::Fetch(e.to_string()))?
                .text()
                .await
                .map_err(|e| MetadataError::Fetch(e.to_string()))?;
            MetadataBlobPayload::from_jws(&token, self.trust_anchor.as_ref(), Utc::now())
        }
    }
}
