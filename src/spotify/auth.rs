use reqwest::Client;

use crate::{
    config,
    types::{RefreshResponse, TokensResponse},
};

/// Client for the token-issuing auth server.
///
/// The auth server owns the OAuth handshake with Spotify; this core only
/// exchanges refresh credentials, bootstraps a session's tokens and
/// invalidates the server-side session on logout.
#[derive(Clone)]
pub struct AuthClient {
    client: Client,
    base_url: String,
}

impl AuthClient {
    pub fn new() -> Self {
        Self::with_base_url(config::auth_server_url())
    }

    pub fn with_base_url(base_url: impl Into<String>) -> Self {
        AuthClient {
            client: Client::new(),
            base_url: base_url.into(),
        }
    }

    /// Exchanges a refresh credential for a new access credential.
    ///
    /// The response carries the new access token and its lifetime in seconds;
    /// a rotated refresh token is optional and the caller keeps the previous
    /// one when it is omitted.
    ///
    /// # Errors
    ///
    /// Any non-success status or transport failure is returned unchanged; the
    /// credential manager treats every refresh failure as the end of the
    /// session.
    pub async fn refresh(&self, refresh_token: &str) -> Result<RefreshResponse, reqwest::Error> {
        let res = self
            .client
            .post(format!("{}/refresh", self.base_url))
            .form(&[
                ("grant_type", "refresh_token"),
                ("refresh_token", refresh_token),
            ])
            .send()
            .await?
            .error_for_status()?;

        res.json::<RefreshResponse>().await
    }

    /// Retrieves the session's current token set from the auth server.
    ///
    /// Used to bootstrap a session when no credential is persisted locally.
    /// The server authenticates the call through its session cookie.
    pub async fn tokens(&self) -> Result<TokensResponse, reqwest::Error> {
        let res = self
            .client
            .get(format!("{}/tokens", self.base_url))
            .send()
            .await?
            .error_for_status()?;

        res.json::<TokensResponse>().await
    }

    /// Invalidates the server-side session state.
    pub async fn logout(&self) -> Result<(), reqwest::Error> {
        self.client
            .post(format!("{}/logout", self.base_url))
            .send()
            .await?
            .error_for_status()?;
        Ok(())
    }
}

impl Default for AuthClient {
    fn default() -> Self {
        Self::new()
    }
}
