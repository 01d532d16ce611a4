//! The parts of the Spotify Web API this service consumes.
//!
//! [`StreamingProvider`] is the seam the rest of the crate talks to. It never
//! holds a user's tokens: the caller passes its own access token into every
//! user-scoped call, so one client instance is safely shared by all sessions.

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

mod client;

pub use client::SpotifyClient;

/// Tokens returned by the authorization-code and refresh grants.
#[derive(Debug, Clone, Deserialize)]
pub struct TokenGrant {
    pub access_token: String,
    /// Absent on refresh unless the provider rotates it.
    #[serde(default)]
    pub refresh_token: Option<String>,
    /// Seconds until `access_token` expires.
    pub expires_in: u64,
    #[serde(default)]
    pub scope: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Profile {
    pub id: String,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub country: Option<String>,
    #[serde(default)]
    pub images: Vec<Image>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Image {
    pub url: String,
    #[serde(default)]
    pub height: Option<u32>,
    #[serde(default)]
    pub width: Option<u32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Track {
    pub id: String,
    pub uri: String,
    #[serde(default)]
    pub name: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct CreatePlaylistRequest {
    pub name: String,
    pub description: String,
    pub public: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreatedPlaylist {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlaylistSummary {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub public: Option<bool>,
    #[serde(default)]
    pub tracks: Option<PlaylistTracksRef>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlaylistTracksRef {
    pub total: u32,
}

/// Builds the `spotify:track:` URI for a bare track id.
pub fn track_uri(track_id: &str) -> String {
    format!("spotify:track:{}", track_id)
}

#[async_trait]
pub trait StreamingProvider: Send + Sync {
    /// Where to send the browser to start the authorization-code flow.
    fn authorize_url(&self) -> String;

    async fn exchange_code(&self, code: &str) -> Result<TokenGrant>;

    async fn refresh_access_token(&self, refresh_token: &str) -> Result<TokenGrant>;

    async fn current_profile(&self, access_token: &str) -> Result<Profile>;

    async fn artist_top_tracks(
        &self,
        access_token: &str,
        artist_id: &str,
        market: &str,
    ) -> Result<Vec<Track>>;

    async fn create_playlist(
        &self,
        access_token: &str,
        user_id: &str,
        request: &CreatePlaylistRequest,
    ) -> Result<CreatedPlaylist>;

    /// Appends tracks to a playlist. Callers keep `uris` within the
    /// provider's per-call limit of 100.
    async fn add_tracks_to_playlist(
        &self,
        access_token: &str,
        playlist_id: &str,
        uris: &[String],
    ) -> Result<()>;

    async fn user_playlists(&self, access_token: &str) -> Result<Vec<PlaylistSummary>>;
}
