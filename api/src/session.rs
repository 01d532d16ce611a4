//! Server-side sessions.
//!
//! The browser only holds an opaque id in the `festy_session` cookie. The
//! provider tokens, profile and local user id stay here, one entry per
//! login, each with a background task that keeps the access token fresh
//! until the session is removed.

use std::{collections::HashMap, sync::Arc, time::Duration};

use axum::{extract::FromRequestParts, http::request::Parts};
use axum_extra::extract::cookie::CookieJar;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;

use crate::{
    error::AppError,
    spotify::{Profile, StreamingProvider, TokenGrant},
    AppState,
};

pub const SESSION_COOKIE: &str = "festy_session";

#[derive(Debug, Clone)]
pub struct Session {
    pub id: String,
    /// Local `users.id`.
    pub user_id: i32,
    pub profile: Profile,
    pub access_token: String,
    pub refresh_token: Option<String>,
    pub expires_in: u64,
    pub token_updated_at: DateTime<Utc>,
}

struct Entry {
    session: Session,
    refresh: Option<CancellationToken>,
}

#[derive(Clone, Default)]
pub struct SessionStore {
    inner: Arc<RwLock<HashMap<String, Entry>>>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores a session together with the handle that stops its refresh task.
    pub async fn insert(&self, session: Session, refresh: Option<CancellationToken>) {
        let mut sessions = self.inner.write().await;
        sessions.insert(session.id.clone(), Entry { session, refresh });
    }

    pub async fn get(&self, id: &str) -> Option<Session> {
        let sessions = self.inner.read().await;
        sessions.get(id).map(|e| e.session.clone())
    }

    /// Applies a refreshed grant. Returns false if the session is gone.
    pub async fn update_tokens(&self, id: &str, grant: &TokenGrant) -> bool {
        let mut sessions = self.inner.write().await;
        let Some(entry) = sessions.get_mut(id) else {
            return false;
        };

        entry.session.access_token = grant.access_token.clone();
        entry.session.expires_in = grant.expires_in;
        entry.session.token_updated_at = Utc::now();
        if let Some(rotated) = &grant.refresh_token {
            entry.session.refresh_token = Some(rotated.clone());
        }
        true
    }

    /// Removes a session and stops its refresh task.
    pub async fn remove(&self, id: &str) -> Option<Session> {
        let entry = self.inner.write().await.remove(id)?;
        if let Some(refresh) = entry.refresh {
            refresh.cancel();
        }
        Some(entry.session)
    }

    pub async fn len(&self) -> usize {
        self.inner.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

/// Consecutive failed refreshes after which the session is dropped.
pub const MAX_REFRESH_FAILURES: u32 = 3;

/// Half the token lifetime, never less than a second.
pub fn refresh_interval(expires_in: u64) -> Duration {
    Duration::from_secs((expires_in / 2).max(1))
}

/// Spawns the task that refreshes a session's access token every
/// `expires_in / 2` seconds. Cancel the returned token to stop it.
///
/// A failed refresh is logged and tried again on the next tick. After
/// [`MAX_REFRESH_FAILURES`] failures in a row the session is removed. The
/// task also ends on its own once the session has been removed.
pub fn spawn_token_refresh(
    sessions: SessionStore,
    provider: Arc<dyn StreamingProvider>,
    session_id: String,
    refresh_token: String,
    expires_in: u64,
) -> CancellationToken {
    let cancel = CancellationToken::new();
    let stop = cancel.clone();

    tokio::spawn(async move {
        let mut refresh_token = refresh_token;
        let mut period = refresh_interval(expires_in);
        let mut failures = 0;

        loop {
            tokio::select! {
                _ = stop.cancelled() => {
                    tracing::debug!("token refresh for session {} cancelled", session_id);
                    break;
                }
                _ = tokio::time::sleep(period) => {}
            }

            match provider.refresh_access_token(&refresh_token).await {
                Ok(grant) => {
                    failures = 0;
                    if let Some(rotated) = &grant.refresh_token {
                        refresh_token = rotated.clone();
                    }
                    period = refresh_interval(grant.expires_in);

                    if !sessions.update_tokens(&session_id, &grant).await {
                        break;
                    }
                    tracing::debug!("refreshed access token for session {}", session_id);
                }
                Err(e) => {
                    failures += 1;
                    tracing::warn!(
                        "failed to refresh token for session {} ({}/{}): {:#}",
                        session_id,
                        failures,
                        MAX_REFRESH_FAILURES,
                        e
                    );

                    if failures >= MAX_REFRESH_FAILURES {
                        tracing::info!("dropping session {} after repeated refresh failures", session_id);
                        sessions.remove(&session_id).await;
                        break;
                    }
                }
            }
        }
    });

    cancel
}

/// Extractor for handlers that require a logged-in user.
///
/// Use `Option<CurrentSession>` where a session is optional.
pub struct CurrentSession(pub Session);

#[axum::async_trait]
impl FromRequestParts<AppState> for CurrentSession {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, AppError> {
        let jar = CookieJar::from_headers(&parts.headers);
        let Some(id) = jar.get(SESSION_COOKIE).map(|c| c.value().to_string()) else {
            return Err(AppError::Unauthorized);
        };

        state
            .sessions
            .get(&id)
            .await
            .map(CurrentSession)
            .ok_or(AppError::Unauthorized)
    }
}
