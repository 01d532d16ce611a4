use axum::{
    extract::{Path, Query, State},
    response::Json,
};
use axum_extra::extract::WithRejection;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::{
    error::{AppError, AppResult},
    models::{Artist, Festival, FestivalWithActs, Playlist},
    playlist::{self, PlaylistOwner, ProviderContext, TrackCount},
    session::CurrentSession,
    spotify::{PlaylistSummary, Profile},
    store::{FestivalStore, UserStore},
    AppState,
};

pub async fn health_check() -> &'static str {
    "ok"
}

pub async fn index(session: Option<CurrentSession>) -> Json<Value> {
    let user = session.map(|CurrentSession(s)| s.profile);
    Json(json!({ "user": user }))
}

pub async fn profile(CurrentSession(session): CurrentSession) -> Json<Profile> {
    Json(session.profile)
}

#[derive(Debug, Serialize)]
pub struct PlaylistsResponse {
    /// The user's playlists as the provider reports them.
    pub spotify: Vec<PlaylistSummary>,
    /// Playlists generated here.
    pub saved: Vec<Playlist>,
}

pub async fn playlists(
    State(state): State<AppState>,
    CurrentSession(session): CurrentSession,
) -> AppResult<Json<PlaylistsResponse>> {
    let spotify = state.provider.user_playlists(&session.access_token).await?;
    let saved = state.store.playlists(session.user_id).await?;

    Ok(Json(PlaylistsResponse { spotify, saved }))
}

pub async fn delete_playlist(
    State(state): State<AppState>,
    CurrentSession(session): CurrentSession,
    WithRejection(Path(playlist_id), _): WithRejection<Path<i32>, AppError>,
) -> AppResult<Json<Value>> {
    let deleted = state
        .store
        .delete_playlist(playlist_id, Some(session.user_id))
        .await?
        .ok_or_else(|| AppError::NotFound("Playlist not found".to_string()))?;

    Ok(Json(json!({ "deleted": deleted })))
}

#[derive(Debug, Deserialize)]
pub struct FestivalSearch {
    name: Option<String>,
    artist: Option<String>,
}

pub async fn festivals(
    State(state): State<AppState>,
    WithRejection(Query(search), _): WithRejection<Query<FestivalSearch>, AppError>,
) -> AppResult<Json<Vec<Festival>>> {
    let name = search.name.filter(|s| !s.trim().is_empty());
    let artist = search.artist.filter(|s| !s.trim().is_empty());

    let festivals = match (name, artist) {
        (Some(name), _) => state.store.search_festivals_by_name(name.trim()).await?,
        (None, Some(artist)) => state.store.search_festivals_by_artist(artist.trim()).await?,
        (None, None) => state.store.upcoming_festivals().await?,
    };

    Ok(Json(festivals))
}

pub async fn festival(
    State(state): State<AppState>,
    WithRejection(Path(festival_id), _): WithRejection<Path<i32>, AppError>,
) -> AppResult<Json<FestivalWithActs>> {
    state
        .store
        .festival_with_acts(festival_id)
        .await?
        .map(Json)
        .ok_or_else(|| AppError::NotFound("Festival not found".to_string()))
}

pub async fn artists(State(state): State<AppState>) -> AppResult<Json<Vec<Artist>>> {
    Ok(Json(state.store.artists().await?))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatePlaylistBody {
    #[serde(default)]
    pub artist_ids: Vec<String>,
    #[serde(default)]
    pub track_counts: Vec<TrackCount>,
    pub festival_name: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatePlaylistResponse {
    pub message: String,
    pub playlist_id: String,
}

pub async fn create_festival_playlist(
    State(state): State<AppState>,
    CurrentSession(session): CurrentSession,
    WithRejection(Path(festival_id), _): WithRejection<Path<i32>, AppError>,
    WithRejection(Json(body), _): WithRejection<Json<CreatePlaylistBody>, AppError>,
) -> AppResult<Json<CreatePlaylistResponse>> {
    let festival = state
        .store
        .festival_with_acts(festival_id)
        .await?
        .ok_or_else(|| AppError::NotFound("Festival not found".to_string()))?;

    let selections = playlist::parse_selections(body.artist_ids, &body.track_counts)?;
    let festival_name = body
        .festival_name
        .filter(|n| !n.trim().is_empty())
        .unwrap_or(festival.festival.name);

    tracing::info!(
        "generating playlist for festival {} with {} artists for user {}",
        festival_id,
        selections.len(),
        session.profile.id
    );

    let ctx = ProviderContext {
        provider: state.provider.as_ref(),
        access_token: &session.access_token,
    };
    let owner = PlaylistOwner {
        user_id: session.user_id,
        spotify_user_id: &session.profile.id,
    };

    let generated =
        playlist::generate_playlist(&*state.store, &ctx, &owner, &selections, &festival_name)
            .await?;

    Ok(Json(CreatePlaylistResponse {
        message: format!("Created {} with {} tracks", generated.name, generated.uris.len()),
        playlist_id: generated.playlist_id,
    }))
}

pub async fn not_found() -> AppError {
    AppError::NotFound("Not Found".to_string())
}
