//! Login, OAuth callback and logout.

use anyhow::{anyhow, Context};
use axum::{
    extract::{Query, State},
    response::Redirect,
};
use axum_extra::extract::{
    cookie::{Cookie, CookieJar, SameSite},
    WithRejection,
};
use chrono::Utc;
use serde::Deserialize;

use crate::{
    error::{AppError, AppResult},
    session::{spawn_token_refresh, Session, SESSION_COOKIE},
    spotify::Profile,
    store::UserStore,
    AppState,
};

pub async fn login(State(state): State<AppState>) -> Redirect {
    Redirect::to(&state.provider.authorize_url())
}

#[derive(Debug, Deserialize)]
pub struct CallbackQuery {
    code: Option<String>,
    error: Option<String>,
}

pub async fn callback(
    State(state): State<AppState>,
    jar: CookieJar,
    WithRejection(Query(params), _): WithRejection<Query<CallbackQuery>, AppError>,
) -> AppResult<(CookieJar, Redirect)> {
    if let Some(error) = params.error {
        return Err(AppError::BadRequest(format!("authorization denied: {}", error)));
    }
    let code = params
        .code
        .ok_or_else(|| AppError::BadRequest("missing authorization code".to_string()))?;

    let grant = state
        .provider
        .exchange_code(&code)
        .await
        .context("failed to exchange authorization code")?;

    let profile = state
        .provider
        .current_profile(&grant.access_token)
        .await
        .context("failed to fetch profile")?;

    let user_id = ensure_user(&*state.store, &profile).await?;

    // A second login from the same browser replaces the old session.
    let previous = jar.get(SESSION_COOKIE).map(|c| c.value().to_string());
    if let Some(previous) = previous {
        state.sessions.remove(&previous).await;
    }

    let session_id = uuid::Uuid::new_v4().to_string();
    let refresh = grant.refresh_token.clone().map(|refresh_token| {
        spawn_token_refresh(
            state.sessions.clone(),
            state.provider.clone(),
            session_id.clone(),
            refresh_token,
            grant.expires_in,
        )
    });

    tracing::info!("user {} logged in", profile.id);

    state
        .sessions
        .insert(
            Session {
                id: session_id.clone(),
                user_id,
                profile,
                access_token: grant.access_token,
                refresh_token: grant.refresh_token,
                expires_in: grant.expires_in,
                token_updated_at: Utc::now(),
            },
            refresh,
        )
        .await;

    let cookie = Cookie::build((SESSION_COOKIE, session_id))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .build();

    Ok((jar.add(cookie), Redirect::to("/")))
}

/// Returns the local id for a provider profile, creating the user on first
/// login.
pub async fn ensure_user<S>(store: &S, profile: &Profile) -> anyhow::Result<i32>
where
    S: UserStore + ?Sized,
{
    if !store.user_exists(&profile.id).await? {
        let user = store
            .create_user(&profile.id, profile.display_name.as_deref())
            .await?;
        tracing::info!("created user {} for {}", user.id, profile.id);
        return Ok(user.id);
    }

    store
        .user_id(&profile.id)
        .await?
        .ok_or_else(|| anyhow!("user {} exists but has no id", profile.id))
}

pub async fn logout(State(state): State<AppState>, jar: CookieJar) -> (CookieJar, Redirect) {
    let id = jar.get(SESSION_COOKIE).map(|c| c.value().to_string());

    if let Some(id) = id {
        if let Some(session) = state.sessions.remove(&id).await {
            tracing::info!("user {} logged out", session.profile.id);
        }
    }

    (
        jar.remove(Cookie::build(SESSION_COOKIE).path("/")),
        Redirect::to("/"),
    )
}
