//! Relying party configuration.
//!
//! A [`RelyingPartyConfig`] can be built in code with [`RelyingPartyConfig::new`] and its builder
//! style setters, or deserialized from JSON with [`RelyingPartyConfig::from_json`]. Either way it
//! must pass [`RelyingPartyConfig::validate`] before a [`RelyingParty`](crate::RelyingParty) accepts it.

use std::time::Duration;

use coset::iana;
use serde::{Deserialize, Serialize};
use url::Url;


/// Minimum number of random bytes in a challenge.
pub const MIN_CHALLENGE_LEN: usize = 16;

/// Longest ceremony timeout accepted.
pub const MAX_TIMEOUT: Duration = Duration::from_secs(24 * 60 * 60);

/// Errors raised while loading or validating a [`RelyingPartyConfig`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    /// The RP ID is empty or is not a bare domain.
    #[error("invalid rp id {0:?}")]
    InvalidRpId(String),
    /// No origins were configured.
    #[error("at least one origin must be allowed")]
    NoOrigins,
    /// An origin is not a valid URL or is not served over https.
    #[error("invalid origin {origin:?}: {reason}")]
    InvalidOrigin {
        /// The rejected origin.
        origin: String,
        /// Why it was rejected.
        reason: &'static str,
    },
    /// The challenge length is below [`MIN_CHALLENGE_LEN`].
    #[error("challenge length must be at least {MIN_CHALLENGE_LEN} bytes, got {0}")]
    ChallengeTooShort(usize),
    /// The ceremony timeout is zero or above [`MAX_TIMEOUT`].
    #[error("timeout of {0:?} is out of range")]
    InvalidTimeout(Duration),
    /// No signature algorithm was configured, or one of them cannot be verified.
    #[error("unsupported algorithm list: {0}")]
    Algorithms(String),
    /// The configuration could not be deserialized.
    #[error("could not parse configuration: {0}")]
    Parse(String),
}

/// How the backup eligibility and backup state flags are treated during registration.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CredentialBackupPolicy {
    /// The flag must be set.
    Required,
    /// The flag may take any value.
    #[default]
    Allowed,
    /// The flag must not be set.
    Disallowed,
}

impl CredentialBackupPolicy {
    /// Whether a flag value satisfies this policy.
    pub fn permits(self, flag: bool) -> bool {
        match self {
            Self::Required => flag,
            Self::Allowed => true,
            Self::Disallowed => !flag,
        }
    }
}

/// Which attestation statements are accepted during registration.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AttestationPolicy {
    /// Register credentials whose attestation format is not supported, recording them as
    /// unattested instead of failing with
    /// [`UnsupportedAttestationFormat`](crate::ErrorKind::UnsupportedAttestationFormat).
    pub accept_unknown_formats: bool,

    /// Fail with [`MetadataUnavailable`](crate::ErrorKind::MetadataUnavailable) when an attested
    /// authenticator has no metadata entry.
    pub require_metadata: bool,
}

/// Where to obtain authenticator metadata and how long to keep it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MetadataConfig {
    /// Location of the metadata BLOB, used by `HttpMetadataSource::from_config`. No HTTP source
    /// is built when this is unset.
    pub url: Option<String>,

    /// How long a fetched BLOB is considered fresh.
    #[serde(with = "duration_secs")]
    pub ttl: Duration,

    /// Upper bound on a single fetch.
    #[serde(with = "duration_secs")]
    pub fetch_timeout: Duration,
}

impl Default for MetadataConfig {
    fn default() -> Self {
        Self {
            url: None,
            ttl: Duration::from_secs(24 * 60 * 60),
            fetch_timeout: Duration::from_secs(10),
        }
    }
}

/// Settings shared by every ceremony of a relying party.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RelyingPartyConfig {
    /// The RP ID, a registrable domain such as `example.com`.
    pub rp_id: String,

    /// Human readable name shown by authenticators.
    pub rp_name: String,

    /// Exact origins allowed in client data, e.g. `https://login.example.com`.
    pub origins: Vec<String>,

    /// How long ceremony options stay valid.
    #[serde(with = "duration_secs")]
    pub timeout: Duration,

    /// Number of random bytes per challenge.
    pub challenge_len: usize,

    /// Accept client data produced in a cross-origin iframe.
    pub allow_cross_origin: bool,

    /// Signature algorithms offered during registration, in order of preference.
    #[serde(with = "algorithm_list")]
    pub algorithms: Vec<iana::Algorithm>,

    /// Allowed clock difference for timestamps inside attestation statements.
    #[serde(with = "duration_secs")]
    pub timestamp_drift_tolerance: Duration,

    /// Policy for the backup eligibility flag.
    pub backup_eligible_policy: CredentialBackupPolicy,

    /// Policy for the backup state flag.
    pub backed_up_policy: CredentialBackupPolicy,

    /// Attestation acceptance rules.
    pub attestation: AttestationPolicy,

    /// Metadata source settings.
    pub metadata: MetadataConfig,
}

impl Default for RelyingPartyConfig {
    fn default() -> Self {
        Self {
            rp_id: String::new(),
            rp_name: String::new(),
            origins: Vec::new(),
            timeout: Duration::from_secs(60),
            challenge_len: 32,
            allow_cross_origin: false,
            algorithms: vec![
                iana::Algorithm::ES256,
                iana::Algorithm::EdDSA,
                iana::Algorithm::ES384,
                iana::Algorithm::RS256,
            ],
            timestamp_drift_tolerance: Duration::from_secs(5 * 60),
            backup_eligible_policy: CredentialBackupPolicy::Allowed,
            backed_up_policy: CredentialBackupPolicy::Allowed,
            attestation: AttestationPolicy::default(),
            metadata: MetadataConfig::default(),
        }
    }
}

impl RelyingPartyConfig {
    /// Create a configuration with default settings for the given RP.
    pub fn new(
        rp_id: impl Into<String>,
        rp_name: impl Into<String>,
        origins: impl IntoIterator<Item = impl Into<String>>,
    ) -> Self {
        Self {
            rp_id: rp_id.into(),
            rp_name: rp_name.into(),
            origins: origins.into_iter().map(Into::into).collect(),
            ..Default::default()
        }
    }

    /// Parse a JSON configuration and validate it.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: Self =
            serde_json::from_str(json).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Set the ceremony timeout.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set the number of random bytes per challenge.
    pub fn challenge_len(mut self, len: usize) -> Self {
        self.challenge_len = len;
        self
    }

    /// Accept or reject cross-origin client data.
    pub fn allow_cross_origin(mut self, allow: bool) -> Self {
        self.allow_cross_origin = allow;
        self
    }

    /// Set the offered signature algorithms.
    pub fn algorithms(mut self, algorithms: Vec<iana::Algorithm>) -> Self {
        self.algorithms = algorithms;
        self
    }

    /// Set the backup eligibility and backup state policies.
    pub fn backup_policy(
        mut self,
        eligible: CredentialBackupPolicy,
        backed_up: CredentialBackupPolicy,
    ) -> Self {
        self.backup_eligible_policy = eligible;
        self.backed_up_policy = backed_up;
        self
    }

    /// Set the attestation policy.
    pub fn attestation_policy(mut self, policy: AttestationPolicy) -> Self {
        self.attestation = policy;
        self
    }

    /// Set the metadata settings.
    pub fn metadata(mut self, metadata: MetadataConfig) -> Self {
        self.metadata = metadata;
        self
    }

    /// Check that the configuration is usable.
    ///
    /// Every origin must be served over https, except for `localhost` during development, and its
    /// host must be the RP ID or one of its subdomains.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let rp_id = self.rp_id.as_str();
        if rp_id.is_empty()
            || rp_id.contains(['/', ':', ' '])
            || rp_id.starts_with('.')
            || rp_id.ends_with('.')
            || rp_id != rp_id.to_ascii_lowercase()
        {
            return Err(ConfigError::InvalidRpId(self.rp_id.clone()));
        }

        if self.origins.is_empty() {
            return Err(ConfigError::NoOrigins);
        }
        for origin in &self.origins {
            validate_origin(rp_id, origin)?;
        }

        if self.challenge_len < MIN_CHALLENGE_LEN {
            return Err(ConfigError::ChallengeTooShort(self.challenge_len));
        }

        if self.timeout.is_zero() || self.timeout > MAX_TIMEOUT {
            return Err(ConfigError::InvalidTimeout(self.timeout));
        }

        if self.algorithms.is_empty() {
            return Err(ConfigError::Algorithms("no algorithms configured".into()));
        }
        if let Some(alg) = self
            .algorithms
            .iter()
            .find(|alg| !crate::crypto::is_supported(**alg))
        {
            return Err(ConfigError::Algorithms(format!("{alg:?} cannot be verified")));
        }

        Ok(())
    }

    /// Whether `origin` appears in the allow-list. Trailing slashes are ignored.
    pub fn is_allowed_origin(&self, origin: &str) -> bool {
        let origin = origin.trim_end_matches('/');
        self.origins
            .iter()
            .any(|allowed| allowed.trim_end_matches('/') == origin)
    }
}

fn validate_origin(rp_id: &str, origin: &str) -> Result<(), ConfigError> {
    let invalid = |reason| ConfigError::InvalidOrigin {
        origin: origin.to_owned(),
        reason,
    };
    let url = Url::parse(origin).map_err(|_| invalid("not a valid url"))?;
    let host = url.host_str().ok_or_else(|| invalid("missing host"))?;

    match url.scheme() {
        "https" => {}
        "http" if host == "localhost" => {}
        _ => return Err(invalid("origins must use https")),
    }
    if url.path() != "/" || url.query().is_some() || url.fragment().is_some() {
        return Err(invalid("an origin cannot have a path, query or fragment"));
    }

    let is_subdomain = host
        .strip_suffix(rp_id)
        .is_some_and(|prefix| prefix.ends_with('.'));
    if host != rp_id && !is_subdomain {
        return Err(invalid("host is not the rp id or one of its subdomains"));
    }
    Ok(())
}

mod duration_secs {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(duration.as_secs())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_secs)
    }
}

pub(crate) mod algorithm_list {
    use coset::iana::{self, EnumI64};
    use serde::{de::Error, Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(
        algorithms: &[iana::Algorithm],
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        serializer.collect_seq(algorithms.iter().map(|alg| alg.to_i64()))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Vec<iana::Algorithm>, D::Error> {
        Vec::<i64>::deserialize(deserializer)?
            .into_iter()
            .map(|value| {
                iana::Algorithm::from_i64(value)
                    .ok_or_else(|| D::Error::custom(format!("unknown COSE algorithm {value}")))
            })
            .collect()
    }
}
