use std::{fmt, future::Future, sync::Arc};

use chrono::Utc;
use tokio::sync::Mutex;

use crate::{
    config, error,
    management::storage::Storage,
    spotify::{ApiError, AuthClient},
    types::Token,
    warning,
};

const TOKEN_KEY: &str = "token";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthError {
    /// The refresh exchange failed; the credential has been cleared and the
    /// session must be re-established through the auth server.
    SessionExpired,
}

impl fmt::Display for AuthError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AuthError::SessionExpired => {
                write!(f, "session expired, re-authentication required")
            }
        }
    }
}

impl std::error::Error for AuthError {}

/// Owns the access credential and its lifecycle.
///
/// The manager decides validity and refresh-need, performs the coalesced
/// refresh exchange, and persists the credential across sessions. Clones
/// share the same credential state.
#[derive(Clone)]
pub struct TokenManager {
    store: Arc<dyn Storage>,
    auth: AuthClient,
    token: Arc<Mutex<Option<Token>>>,
    refresh_gate: Arc<Mutex<()>>,
}

impl TokenManager {
    pub fn new(store: Arc<dyn Storage>) -> Self {
        Self::with_auth_client(store, AuthClient::new())
    }

    pub fn with_auth_client(store: Arc<dyn Storage>, auth: AuthClient) -> Self {
        TokenManager {
            store,
            auth,
            token: Arc::new(Mutex::new(None)),
            refresh_gate: Arc::new(Mutex::new(())),
        }
    }

    /// Restores the persisted credential, returning whether one was found.
    /// A corrupt record is discarded.
    pub async fn load(&self) -> bool {
        let content = match self.store.read(TOKEN_KEY).await {
            Ok(content) => content,
            Err(_) => return false,
        };
        match serde_json::from_str::<Token>(&content) {
            Ok(token) => {
                *self.token.lock().await = Some(token);
                true
            }
            Err(err) => {
                warning!("Discarding unreadable stored credential: {}", err);
                let _ = self.store.remove(TOKEN_KEY).await;
                false
            }
        }
    }

    /// Installs a credential and persists it.
    pub async fn install(&self, token: Token) {
        *self.token.lock().await = Some(token.clone());
        if let Err(err) = self.persist(&token).await {
            warning!("Failed to persist credential: {}", err);
        }
    }

    /// Installs a credential from a raw exchange result, computing the
    /// absolute expiry instant. A missing refresh token preserves the
    /// current one.
    pub async fn store_tokens(
        &self,
        access_token: String,
        refresh_token: Option<String>,
        expires_in: u64,
    ) {
        let previous_refresh = {
            let guard = self.token.lock().await;
            guard.as_ref().map(|t| t.refresh_token.clone())
        };
        let token = Token {
            access_token,
            refresh_token: refresh_token
                .or(previous_refresh)
                .unwrap_or_default(),
            expires_at: Utc::now().timestamp_millis() + expires_in as i64 * 1000,
        };
        self.install(token).await;
    }

    pub async fn current(&self) -> Option<Token> {
        self.token.lock().await.clone()
    }

    /// True iff an access credential exists and its expiry lies more than the
    /// refresh margin in the future.
    pub async fn is_valid(&self) -> bool {
        match self.token.lock().await.as_ref() {
            Some(token) => Self::outside_margin(token),
            None => false,
        }
    }

    /// True iff the credential is absent or its expiry lies within the
    /// refresh margin. During the margin window both this and `is_valid`
    /// report the credential as due: the proactive-refresh zone.
    pub async fn needs_refresh(&self) -> bool {
        match self.token.lock().await.as_ref() {
            Some(token) => !Self::outside_margin(token),
            None => true,
        }
    }

    fn outside_margin(token: &Token) -> bool {
        token.expires_at - Utc::now().timestamp_millis() > config::TOKEN_REFRESH_MARGIN_MS
    }

    /// Exchanges the refresh credential for a fresh access credential.
    ///
    /// Concurrent callers are coalesced: while one exchange is in flight the
    /// rest wait on it and adopt its result instead of issuing a second
    /// exchange. A caller whose credential was already replaced while it
    /// queued adopts the replacement; the comparison is on the access token
    /// itself, not on expiry, so a refresh demanded by a remote rejection
    /// still forces an exchange. On failure the credential is cleared
    /// entirely and the session is over.
    pub async fn refresh(&self) -> Result<Token, AuthError> {
        let observed = {
            let guard = self.token.lock().await;
            guard.as_ref().map(|t| t.access_token.clone())
        };

        let _gate = self.refresh_gate.lock().await;

        let current = self.token.lock().await.clone();
        if let Some(token) = &current {
            let superseded = match &observed {
                Some(access_token) => token.access_token != *access_token,
                None => true,
            };
            if superseded {
                // another caller finished the exchange while we queued
                return Ok(token.clone());
            }
        }

        let refresh_token = match current {
            Some(token) if !token.refresh_token.is_empty() => token.refresh_token,
            _ => {
                self.clear().await;
                return Err(AuthError::SessionExpired);
            }
        };

        match self.auth.refresh(&refresh_token).await {
            Ok(response) => {
                let token = Token {
                    access_token: response.access_token,
                    refresh_token: response.refresh_token.unwrap_or(refresh_token),
                    expires_at: Utc::now().timestamp_millis()
                        + response.expires_in as i64 * 1000,
                };
                *self.token.lock().await = Some(token.clone());
                if let Err(err) = self.persist(&token).await {
                    warning!("Failed to persist refreshed credential: {}", err);
                }
                Ok(token)
            }
            Err(err) => {
                error!("Credential refresh failed, ending session: {}", err);
                self.clear().await;
                Err(AuthError::SessionExpired)
            }
        }
    }

    /// Returns an access token fit for a request, refreshing first when the
    /// credential is inside the margin.
    pub async fn get_valid_token(&self) -> Result<String, AuthError> {
        if self.needs_refresh().await {
            return Ok(self.refresh().await?.access_token);
        }
        match self.token.lock().await.as_ref() {
            Some(token) => Ok(token.access_token.clone()),
            None => Err(AuthError::SessionExpired),
        }
    }

    /// Executes `call` with a valid access token; an authorization rejection
    /// triggers one refresh and one retry. A second rejection propagates
    /// unmodified.
    pub async fn wrap_call<T, F, Fut>(&self, call: F) -> Result<T, ApiError>
    where
        F: Fn(String) -> Fut,
        Fut: Future<Output = Result<T, ApiError>>,
    {
        let token = self.get_valid_token().await.map_err(ApiError::Auth)?;
        match call(token).await {
            Err(ApiError::Unauthorized) => {
                let fresh = self.refresh().await.map_err(ApiError::Auth)?;
                call(fresh.access_token).await
            }
            other => other,
        }
    }

    /// Drops the credential from memory and persistence.
    pub async fn clear(&self) {
        *self.token.lock().await = None;
        let _ = self.store.remove(TOKEN_KEY).await;
    }

    async fn persist(&self, token: &Token) -> Result<(), String> {
        let json = serde_json::to_string_pretty(token).map_err(|e| e.to_string())?;
        self.store
            .write(TOKEN_KEY, &json)
            .await
            .map_err(|e| e.to_string())
    }
}
