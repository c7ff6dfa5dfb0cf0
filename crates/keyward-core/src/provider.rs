//! Boundary to the external identity library.

use async_trait::async_trait;

use crate::{config::InitOptions, error::ProviderError};

/// One session object of the external OpenID Connect client library.
///
/// Implementations own the actual handshake, token storage and redirects.
/// The core never inspects tokens; it only forwards calls and reacts to the
/// outcome of [`IdentityProvider::init`].
#[async_trait(?Send)]
pub trait IdentityProvider {
    /// Check the login state and acquire tokens.
    ///
    /// Resolves to whether the session is authenticated.
    async fn init(&self, options: &InitOptions) -> Result<bool, ProviderError>;

    /// Start the login redirect.
    async fn login(&self) -> Result<(), ProviderError>;

    /// Start the logout redirect.
    async fn logout(&self) -> Result<(), ProviderError>;

    /// Whether the session is currently authenticated.
    fn authenticated(&self) -> bool;

    /// Raw access token, if any.
    fn token(&self) -> Option<String>;

    /// Decoded access token claims, if any.
    fn token_parsed(&self) -> Option<serde_json::Value>;

    /// URL of the login page.
    fn create_login_url(&self) -> String;

    /// URL of the logout endpoint.
    fn create_logout_url(&self) -> String;
}
