//! Service identity — credential loading and the process identity context.
//!
//! DESIGN
//! ======
//! The identity context is built exactly once during startup and shared as
//! `Arc<IdentityContext>` through `AppState`. There is no global: handlers and
//! background tasks receive it explicitly.
//!
//! Two sources are supported. A structured service-account credential in
//! `SERVICE_ACCOUNT_JSON` always wins; when that variable is absent, the
//! ambient application-default chain is consulted through an
//! `AmbientResolver`.
//!
//! ERROR HANDLING
//! ==============
//! A present-but-broken credential never falls back to the ambient chain.
//! Startup aborts instead, so no request can observe a half-built identity.

use std::fmt;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use tracing::info;

pub const SERVICE_ACCOUNT_ENV: &str = "SERVICE_ACCOUNT_JSON";
pub const DEFAULT_TOKEN_URI: &str = "https://oauth2.googleapis.com/token";

const ADC_FILE_ENV: &str = "GOOGLE_APPLICATION_CREDENTIALS";
const WELL_KNOWN_ADC_FILE: &str = ".config/gcloud/application_default_credentials.json";
const PROJECT_ENV_VARS: [&str; 2] = ["GOOGLE_CLOUD_PROJECT", "GCLOUD_PROJECT"];

// =============================================================================
// ERROR
// =============================================================================

#[derive(Debug, thiserror::Error)]
pub enum IdentityError {
    #[error("SERVICE_ACCOUNT_JSON is not a valid credential object: {0}")]
    MalformedJson(String),

    #[error("credential type must be \"service_account\", got {0:?}")]
    WrongType(String),

    #[error("credential field `{0}` is missing or empty")]
    MissingField(&'static str),

    #[error("credential private_key is not a PEM-encoded key")]
    InvalidPrivateKey,

    #[error("failed to read credential file {}: {message}", .path.display())]
    KeyFileRead { path: PathBuf, message: String },

    #[error("credential file {} is malformed: {message}", .path.display())]
    KeyFileMalformed { path: PathBuf, message: String },
}

// =============================================================================
// SERVICE ACCOUNT
// =============================================================================

#[derive(Deserialize)]
struct RawServiceAccount {
    #[serde(rename = "type")]
    kind: Option<String>,
    project_id: Option<String>,
    private_key_id: Option<String>,
    private_key: Option<String>,
    client_email: Option<String>,
    client_id: Option<String>,
    token_uri: Option<String>,
}

/// A validated service-account key.
#[derive(Clone)]
pub struct ServiceAccountKey {
    pub project_id: String,
    pub client_email: String,
    pub client_id: Option<String>,
    pub private_key_id: Option<String>,
    pub token_uri: String,
    private_key: String,
}

impl ServiceAccountKey {
    /// Parse and validate a service-account key from its JSON form.
    ///
    /// # Errors
    ///
    /// Returns an error if the JSON is malformed, the `type` is not
    /// `service_account`, a required field is missing, or the private key is
    /// not PEM.
    pub fn from_json(raw: &str) -> Result<Self, IdentityError> {
        let parsed: RawServiceAccount =
            serde_json::from_str(raw).map_err(|e| IdentityError::MalformedJson(e.to_string()))?;

        let kind = parsed.kind.unwrap_or_default();
        if kind != "service_account" {
            return Err(IdentityError::WrongType(kind));
        }

        let project_id = required(parsed.project_id, "project_id")?;
        let client_email = required(parsed.client_email, "client_email")?;
        let private_key = required(parsed.private_key, "private_key")?;
        if !looks_like_pem_key(&private_key) {
            return Err(IdentityError::InvalidPrivateKey);
        }

        Ok(Self {
            project_id,
            client_email,
            client_id: parsed.client_id.filter(|v| !v.is_empty()),
            private_key_id: parsed.private_key_id.filter(|v| !v.is_empty()),
            token_uri: parsed
                .token_uri
                .filter(|v| !v.is_empty())
                .unwrap_or_else(|| DEFAULT_TOKEN_URI.to_string()),
            private_key,
        })
    }

    #[must_use]
    pub fn private_key(&self) -> &str {
        &self.private_key
    }
}

impl fmt::Debug for ServiceAccountKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceAccountKey")
            .field("project_id", &self.project_id)
            .field("client_email", &self.client_email)
            .field("client_id", &self.client_id)
            .field("private_key_id", &self.private_key_id)
            .field("token_uri", &self.token_uri)
            .field("private_key", &"<redacted>")
            .finish()
    }
}

fn required(value: Option<String>, field: &'static str) -> Result<String, IdentityError> {
    value
        .filter(|v| !v.trim().is_empty())
        .ok_or(IdentityError::MissingField(field))
}

fn looks_like_pem_key(key: &str) -> bool {
    let key = key.trim();
    key.starts_with("-----BEGIN") && key.contains("PRIVATE KEY-----") && key.ends_with("-----")
}

// =============================================================================
// AMBIENT RESOLUTION
// =============================================================================

/// Where an application-default credential was discovered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AmbientSource {
    /// File named by `GOOGLE_APPLICATION_CREDENTIALS`.
    EnvironmentFile(PathBuf),
    /// gcloud's well-known user credential file.
    WellKnownFile(PathBuf),
    /// Platform metadata server; tokens are fetched lazily by callers.
    ComputeMetadata,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AmbientCredential {
    pub source: AmbientSource,
    /// The `type` field of a credential file, e.g. `authorized_user`.
    pub kind: Option<String>,
    pub project_id: Option<String>,
    pub client_email: Option<String>,
}

/// Strategy for discovering a credential when none is supplied explicitly.
pub trait AmbientResolver: Send + Sync {
    /// # Errors
    ///
    /// Returns an error if a discovered credential file cannot be used.
    fn resolve(&self) -> Result<AmbientCredential, IdentityError>;
}

/// Application-default credential chain: env-named file, well-known file,
/// then the metadata server.
#[derive(Debug, Clone, Default)]
pub struct ApplicationDefaultResolver {
    explicit_file: Option<PathBuf>,
    well_known_file: Option<PathBuf>,
    project_hint: Option<String>,
}

impl ApplicationDefaultResolver {
    #[must_use]
    pub fn new(explicit_file: Option<PathBuf>, well_known_file: Option<PathBuf>, project_hint: Option<String>) -> Self {
        Self { explicit_file, well_known_file, project_hint }
    }

    #[must_use]
    pub fn from_env() -> Self {
        let explicit_file = std::env::var(ADC_FILE_ENV)
            .ok()
            .filter(|v| !v.trim().is_empty())
            .map(PathBuf::from);
        let well_known_file = std::env::var("HOME")
            .ok()
            .filter(|v| !v.is_empty())
            .map(|home| PathBuf::from(home).join(WELL_KNOWN_ADC_FILE));
        let project_hint = PROJECT_ENV_VARS
            .iter()
            .find_map(|var| std::env::var(var).ok().filter(|v| !v.trim().is_empty()));
        Self::new(explicit_file, well_known_file, project_hint)
    }

    fn read_key_file(&self, path: &Path, source: AmbientSource) -> Result<AmbientCredential, IdentityError> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| IdentityError::KeyFileRead { path: path.to_path_buf(), message: e.to_string() })?;
        let value: serde_json::Value = serde_json::from_str(&text)
            .map_err(|e| IdentityError::KeyFileMalformed { path: path.to_path_buf(), message: e.to_string() })?;
        let Some(obj) = value.as_object() else {
            return Err(IdentityError::KeyFileMalformed {
                path: path.to_path_buf(),
                message: "expected a JSON object".into(),
            });
        };

        let field = |name: &str| obj.get(name).and_then(|v| v.as_str()).filter(|v| !v.is_empty()).map(String::from);
        let Some(kind) = field("type") else {
            return Err(IdentityError::KeyFileMalformed { path: path.to_path_buf(), message: "missing `type`".into() });
        };

        Ok(AmbientCredential {
            source,
            kind: Some(kind),
            project_id: field("project_id")
                .or_else(|| field("quota_project_id"))
                .or_else(|| self.project_hint.clone()),
            client_email: field("client_email"),
        })
    }
}

impl AmbientResolver for ApplicationDefaultResolver {
    fn resolve(&self) -> Result<AmbientCredential, IdentityError> {
        // EDGE: an explicitly named file must exist; only the well-known file is optional.
        if let Some(path) = &self.explicit_file {
            return self.read_key_file(path, AmbientSource::EnvironmentFile(path.clone()));
        }
        if let Some(path) = self.well_known_file.as_ref().filter(|p| p.is_file()) {
            return self.read_key_file(path, AmbientSource::WellKnownFile(path.clone()));
        }
        Ok(AmbientCredential {
            source: AmbientSource::ComputeMetadata,
            kind: None,
            project_id: self.project_hint.clone(),
            client_email: None,
        })
    }
}

// =============================================================================
// IDENTITY CONTEXT
// =============================================================================

#[derive(Debug, Clone)]
pub enum Credential {
    ServiceAccount(ServiceAccountKey),
    ApplicationDefault(AmbientCredential),
}

/// The server's authenticated identity for calls to external services.
#[derive(Debug)]
pub struct IdentityContext {
    credential: Credential,
}

impl IdentityContext {
    /// Build the identity context from the raw `SERVICE_ACCOUNT_JSON` value,
    /// falling back to `ambient` only when that value is absent or blank.
    ///
    /// # Errors
    ///
    /// Returns an error if the structured credential is invalid or the
    /// ambient chain finds an unusable credential file.
    pub fn initialize(raw_service_account: Option<&str>, ambient: &dyn AmbientResolver) -> Result<Self, IdentityError> {
        let credential = match raw_service_account.filter(|raw| !raw.trim().is_empty()) {
            Some(raw) => Credential::ServiceAccount(ServiceAccountKey::from_json(raw)?),
            None => Credential::ApplicationDefault(ambient.resolve()?),
        };
        let ctx = Self { credential };
        info!(
            source = ctx.source_label(),
            principal = ctx.principal(),
            project_id = ctx.project_id().unwrap_or("-"),
            "identity context initialized"
        );
        Ok(ctx)
    }

    #[must_use]
    pub fn credential(&self) -> &Credential {
        &self.credential
    }

    #[must_use]
    pub fn project_id(&self) -> Option<&str> {
        match &self.credential {
            Credential::ServiceAccount(key) => Some(&key.project_id),
            Credential::ApplicationDefault(ambient) => ambient.project_id.as_deref(),
        }
    }

    /// Account the server acts as; `application-default` when the ambient
    /// source does not name one.
    #[must_use]
    pub fn principal(&self) -> &str {
        match &self.credential {
            Credential::ServiceAccount(key) => &key.client_email,
            Credential::ApplicationDefault(ambient) => ambient.client_email.as_deref().unwrap_or("application-default"),
        }
    }

    #[must_use]
    pub fn source_label(&self) -> &'static str {
        match &self.credential {
            Credential::ServiceAccount(_) => "service_account_env",
            Credential::ApplicationDefault(AmbientCredential { source, .. }) => match source {
                AmbientSource::EnvironmentFile(_) => "adc_env_file",
                AmbientSource::WellKnownFile(_) => "adc_well_known_file",
                AmbientSource::ComputeMetadata => "adc_metadata",
            },
        }
    }
}

#[cfg(test)]
#[path = "identity_test.rs"]
mod tests;
