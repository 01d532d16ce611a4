//! Repository traits the handlers and the playlist routine depend on.
//!
//! [`crate::db::PgStore`] is the Postgres implementation; integration tests
//! plug in an in-memory one.

use anyhow::Result;
use async_trait::async_trait;

use crate::models::{Artist, CachedTrack, Festival, FestivalWithActs, Playlist, User};

/// Per-artist cached top tracks. Freshness is decided by the caller.
#[async_trait]
pub trait TrackCache: Send + Sync {
    /// Cached tracks for an artist, oldest first, at most 10.
    async fn cached_tracks(&self, artist_id: &str) -> Result<Vec<CachedTrack>>;

    /// Drops every cached track of the artist.
    async fn invalidate(&self, artist_id: &str) -> Result<()>;

    async fn add_track(&self, artist_id: &str, track_id: &str) -> Result<CachedTrack>;
}

#[async_trait]
pub trait UserStore: Send + Sync {
    async fn user_exists(&self, spotify_user_id: &str) -> Result<bool>;

    async fn create_user(&self, spotify_user_id: &str, display_name: Option<&str>) -> Result<User>;

    async fn user_id(&self, spotify_user_id: &str) -> Result<Option<i32>>;

    async fn playlists(&self, user_id: i32) -> Result<Vec<Playlist>>;

    async fn add_playlist(
        &self,
        user_id: i32,
        playlist_spotify_id: &str,
        name: &str,
    ) -> Result<Playlist>;

    /// Deletes a playlist record, restricted to `owner` when given.
    /// Returns the deleted id, or `None` when nothing matched.
    async fn delete_playlist(&self, playlist_id: i32, owner: Option<i32>) -> Result<Option<i32>>;
}

#[async_trait]
pub trait FestivalStore: Send + Sync {
    /// The six festivals happening soonest.
    async fn upcoming_festivals(&self) -> Result<Vec<Festival>>;

    async fn search_festivals_by_name(&self, term: &str) -> Result<Vec<Festival>>;

    async fn search_festivals_by_artist(&self, artist_name: &str) -> Result<Vec<Festival>>;

    /// A festival with its lineup ordered by popularity, highest first.
    async fn festival_with_acts(&self, festival_id: i32) -> Result<Option<FestivalWithActs>>;

    async fn artists(&self) -> Result<Vec<Artist>>;
}

/// Everything the web layer needs from persistence.
pub trait Store: TrackCache + UserStore + FestivalStore {}

impl<T> Store for T where T: TrackCache + UserStore + FestivalStore {}
