use std::{
    sync::Mutex,
    time::Duration,
};

use tokio::task::JoinHandle;

use crate::{
    config, info,
    management::auth::{AuthError, TokenManager},
    spotify::AuthClient,
    success,
    types::Token,
    warning,
};

/// Ties the credential lifecycle to a user session.
///
/// Owns the background refresh task: a periodic check that proactively
/// refreshes the credential inside the margin window, independent of any
/// in-flight request. The task is torn down deterministically on logout and
/// on drop; it never outlives the session.
pub struct SessionManager {
    tokens: TokenManager,
    auth: AuthClient,
    interval: Duration,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl SessionManager {
    pub fn new(tokens: TokenManager) -> Self {
        Self::with_auth_client(tokens, AuthClient::new())
    }

    pub fn with_auth_client(tokens: TokenManager, auth: AuthClient) -> Self {
        SessionManager {
            tokens,
            auth,
            interval: config::REFRESH_CHECK_INTERVAL,
            task: Mutex::new(None),
        }
    }

    /// Overrides the background check interval.
    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    pub fn tokens(&self) -> &TokenManager {
        &self.tokens
    }

    /// Establishes the session credential: the persisted one when present,
    /// otherwise a bootstrap from the auth server's session cookie.
    pub async fn connect(&self) -> Result<(), AuthError> {
        if self.tokens.load().await {
            return Ok(());
        }

        match self.auth.tokens().await {
            Ok(response) => {
                self.tokens
                    .install(Token {
                        access_token: response.access_token,
                        refresh_token: response.refresh_token,
                        expires_at: response.expires_at,
                    })
                    .await;
                success!("Session credential established");
                Ok(())
            }
            Err(err) => {
                warning!("Token bootstrap failed: {}", err);
                Err(AuthError::SessionExpired)
            }
        }
    }

    /// Starts the periodic refresh check, replacing a previous task.
    ///
    /// The loop ends on its own when a refresh fails: the credential is gone
    /// at that point and the caller must re-authenticate.
    pub fn start_auto_refresh(&self) {
        let tokens = self.tokens.clone();
        let interval = self.interval;
        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            loop {
                ticker.tick().await;
                if tokens.needs_refresh().await {
                    if let Err(err) = tokens.refresh().await {
                        warning!("Background refresh stopped: {}", err);
                        break;
                    }
                }
            }
        });

        let mut task = self.task.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(old) = task.replace(handle) {
            old.abort();
        }
    }

    /// Aborts the background refresh task if one is running.
    pub fn stop_auto_refresh(&self) {
        let mut task = self.task.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(handle) = task.take() {
            handle.abort();
        }
    }

    pub fn auto_refresh_active(&self) -> bool {
        let task = self.task.lock().unwrap_or_else(|e| e.into_inner());
        task.as_ref().is_some_and(|handle| !handle.is_finished())
    }

    /// Ends the session: invalidates the server-side session best-effort,
    /// drops the credential and stops the background task.
    pub async fn logout(&self) {
        if let Err(err) = self.auth.logout().await {
            warning!("Logout request failed: {}", err);
        }
        self.tokens.clear().await;
        self.stop_auto_refresh();
        info!("Session ended");
    }
}

impl Drop for SessionManager {
    fn drop(&mut self) {
        self.stop_auto_refresh();
    }
}
