//! Client configuration and handshake options.

use std::{borrow::Borrow, collections::BTreeMap, fmt};

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Identity key of a session handle.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ClientId(String);

impl ClientId {
    /// Wrap a client identifier.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// The identifier as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ClientId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl Borrow<str> for ClientId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl From<&str> for ClientId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<String> for ClientId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// Unvalidated client configuration, as supplied by the application.
///
/// `client_id`, `url` and `realm` are required. A missing or blank value is
/// reported by [`ClientConfig::validate`]. Unknown keys are kept in `extra`
/// and passed through to the identity provider.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientConfig {
    /// OIDC client identifier.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_id: Option<String>,
    /// Base URL of the identity provider.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    /// Realm the client lives in.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub realm: Option<String>,
    /// Provider-specific fields.
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_json::Value>,
}

impl ClientConfig {
    /// Configuration with all required fields set.
    pub fn new(
        client_id: impl Into<String>,
        url: impl Into<String>,
        realm: impl Into<String>,
    ) -> Self {
        Self {
            client_id: Some(client_id.into()),
            url: Some(url.into()),
            realm: Some(realm.into()),
            extra: BTreeMap::new(),
        }
    }

    /// Add a provider-specific field.
    #[must_use]
    pub fn with_extra(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.extra.insert(key.into(), value);
        self
    }

    /// Check the required fields.
    ///
    /// Fields are checked in the order `clientId`, `url`, `realm`; the first
    /// missing one is reported.
    pub fn validate(&self) -> Result<ProviderConfig, ConfigError> {
        let client_id = required(self.client_id.as_deref(), "clientId")?;
        let url = required(self.url.as_deref(), "url")?;
        let realm = required(self.realm.as_deref(), "realm")?;

        Ok(ProviderConfig {
            client_id: ClientId::new(client_id),
            url: url.to_string(),
            realm: realm.to_string(),
            extra: self.extra.clone(),
        })
    }
}

fn required<'a>(value: Option<&'a str>, field: &'static str) -> Result<&'a str, ConfigError> {
    match value.map(str::trim) {
        Some(v) if !v.is_empty() => Ok(v),
        _ => Err(ConfigError::MissingField { field }),
    }
}

/// Validated configuration handed to the identity provider.
#[derive(Debug, Clone, PartialEq)]
pub struct ProviderConfig {
    /// Client identifier.
    pub client_id: ClientId,
    /// Base URL of the identity provider.
    pub url: String,
    /// Realm name.
    pub realm: String,
    /// Provider-specific fields.
    pub extra: BTreeMap<String, serde_json::Value>,
}

/// PKCE challenge method.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum PkceMethod {
    /// SHA-256 challenge.
    #[default]
    S256,
    /// Plain challenge.
    #[serde(rename = "plain")]
    Plain,
}

/// What the provider does when the page loads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum OnLoad {
    /// Check for an existing session without forcing a login.
    #[default]
    CheckSso,
    /// Redirect to the login page when not authenticated.
    LoginRequired,
}

/// How the provider returns the authorization response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResponseMode {
    /// In the URL fragment.
    #[default]
    Fragment,
    /// In the query string.
    Query,
}

/// OpenID Connect flow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Flow {
    /// Authorization code flow.
    #[default]
    Standard,
    /// Implicit flow.
    Implicit,
    /// Hybrid flow.
    Hybrid,
}

/// Path of the silent SSO page, relative to the application URL.
const SILENT_CHECK_SSO_PAGE: &str = "silent-check-sso.html";

/// Options passed to the handshake.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InitOptions {
    /// Let the provider log to its own console.
    pub enable_logging: bool,
    /// PKCE method, `None` disables PKCE.
    pub pkce_method: Option<PkceMethod>,
    /// Redirect target for the silent SSO iframe.
    pub silent_check_sso_redirect_uri: Option<String>,
    /// Page-load behavior.
    pub on_load: OnLoad,
    /// Fall back to a regular check when the silent iframe is unavailable.
    pub silent_check_sso_fallback: bool,
    /// Response delivery mode.
    pub response_mode: ResponseMode,
    /// Flow type.
    pub flow: Flow,
}

impl InitOptions {
    /// The fixed baseline every handshake starts from.
    ///
    /// The silent SSO redirect is derived from `app_url` when one is known.
    pub fn baseline(app_url: Option<&str>) -> Self {
        Self {
            enable_logging: true,
            pkce_method: Some(PkceMethod::S256),
            silent_check_sso_redirect_uri: app_url
                .map(|url| format!("{}/{SILENT_CHECK_SSO_PAGE}", url.trim_end_matches('/'))),
            on_load: OnLoad::CheckSso,
            silent_check_sso_fallback: false,
            response_mode: ResponseMode::Fragment,
            flow: Flow::Standard,
        }
    }
}

impl Default for InitOptions {
    fn default() -> Self {
        Self::baseline(None)
    }
}

/// Caller-supplied replacements for individual [`InitOptions`] fields.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct InitOverrides {
    /// Replaces `enable_logging`.
    pub enable_logging: Option<bool>,
    /// Replaces `pkce_method`.
    pub pkce_method: Option<PkceMethod>,
    /// Replaces `silent_check_sso_redirect_uri`.
    pub silent_check_sso_redirect_uri: Option<String>,
    /// Replaces `on_load`.
    pub on_load: Option<OnLoad>,
    /// Replaces `silent_check_sso_fallback`.
    pub silent_check_sso_fallback: Option<bool>,
    /// Replaces `response_mode`.
    pub response_mode: Option<ResponseMode>,
    /// Replaces `flow`.
    pub flow: Option<Flow>,
}

impl InitOverrides {
    /// Apply the set fields on top of `base`.
    pub fn apply(&self, base: InitOptions) -> InitOptions {
        InitOptions {
            enable_logging: self.enable_logging.unwrap_or(base.enable_logging),
            pkce_method: self.pkce_method.or(base.pkce_method),
            silent_check_sso_redirect_uri: self
                .silent_check_sso_redirect_uri
                .clone()
                .or(base.silent_check_sso_redirect_uri),
            on_load: self.on_load.unwrap_or(base.on_load),
            silent_check_sso_fallback: self
                .silent_check_sso_fallback
                .unwrap_or(base.silent_check_sso_fallback),
            response_mode: self.response_mode.unwrap_or(base.response_mode),
            flow: self.flow.unwrap_or(base.flow),
        }
    }
}

/// Registry-wide settings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RegistryConfig {
    /// Application URL, used to derive the silent SSO redirect.
    pub app_url: Option<String>,
    /// Overrides applied to every handle's baseline.
    pub defaults: InitOverrides,
}

impl RegistryConfig {
    /// Options every handle of this registry starts from.
    pub fn base_options(&self) -> InitOptions {
        self.defaults.apply(InitOptions::baseline(self.app_url.as_deref()))
    }
}
