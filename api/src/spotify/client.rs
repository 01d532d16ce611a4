use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use reqwest::{Client, Response, Url};
use serde::Deserialize;

use super::{
    CreatePlaylistRequest, CreatedPlaylist, PlaylistSummary, Profile, StreamingProvider,
    TokenGrant, Track,
};
use crate::config::SpotifyConfig;

#[derive(Debug, Deserialize)]
struct TopTracksResponse {
    tracks: Vec<Track>,
}

#[derive(Debug, Deserialize)]
struct PlaylistPage {
    items: Vec<PlaylistSummary>,
    next: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ClientCredentialsResponse {
    access_token: String,
}

/// reqwest-backed [`StreamingProvider`].
#[derive(Debug, Clone)]
pub struct SpotifyClient {
    http: Client,
    client_id: String,
    client_secret: String,
    redirect_uri: String,
    authorize_url: Url,
    token_url: String,
    api_url: String,
}

impl SpotifyClient {
    pub fn new(config: &SpotifyConfig) -> Result<Self> {
        let accounts = config.accounts_url.trim_end_matches('/');
        let scope = config.scopes.join(" ");

        let authorize_url = Url::parse_with_params(
            &format!("{}/authorize", accounts),
            &[
                ("client_id", config.client_id.as_str()),
                ("response_type", "code"),
                ("redirect_uri", config.redirect_uri.as_str()),
                ("scope", scope.as_str()),
                ("show_dialog", "true"),
            ],
        )
        .context("invalid spotify accounts url")?;

        Ok(Self {
            http: Client::new(),
            client_id: config.client_id.clone(),
            client_secret: config.client_secret.clone(),
            redirect_uri: config.redirect_uri.clone(),
            authorize_url,
            token_url: format!("{}/api/token", accounts),
            api_url: config.api_url.trim_end_matches('/').to_string(),
        })
    }

    fn basic_auth(&self) -> String {
        let auth = format!("{}:{}", self.client_id, self.client_secret);
        let encoded =
            base64::Engine::encode(&base64::engine::general_purpose::STANDARD, auth.as_bytes());
        format!("Basic {}", encoded)
    }

    async fn token_request(&self, form: &[(&str, &str)]) -> Result<TokenGrant> {
        let response = self
            .http
            .post(&self.token_url)
            .header("Authorization", self.basic_auth())
            .form(form)
            .send()
            .await
            .context("token request failed")?;

        let grant = ensure_success(response).await?.json().await?;
        Ok(grant)
    }

    /// API url with each segment percent-encoded, so ids taken from requests
    /// can never leave their path segment.
    fn endpoint(&self, segments: &[&str]) -> Result<Url> {
        let mut url = Url::parse(&self.api_url).context("invalid spotify api url")?;
        url.path_segments_mut()
            .map_err(|_| anyhow!("spotify api url cannot be a base"))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    /// App-only token for endpoints that need no user, such as top tracks.
    pub async fn client_credentials_token(&self) -> Result<String> {
        let response = self
            .http
            .post(&self.token_url)
            .header("Authorization", self.basic_auth())
            .form(&[("grant_type", "client_credentials")])
            .send()
            .await
            .context("client credentials request failed")?;

        let token: ClientCredentialsResponse = ensure_success(response).await?.json().await?;
        Ok(token.access_token)
    }
}

/// Turns a non-2xx response into an error carrying the status and body.
async fn ensure_success(response: Response) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let url = response.url().clone();
    let body = response.text().await.unwrap_or_default();
    anyhow::bail!("spotify request to {} failed: {} - {}", url.path(), status, body);
}

#[async_trait]
impl StreamingProvider for SpotifyClient {
    fn authorize_url(&self) -> String {
        self.authorize_url.to_string()
    }

    async fn exchange_code(&self, code: &str) -> Result<TokenGrant> {
        self.token_request(&[
            ("grant_type", "authorization_code"),
            ("code", code),
            ("redirect_uri", self.redirect_uri.as_str()),
        ])
        .await
    }

    async fn refresh_access_token(&self, refresh_token: &str) -> Result<TokenGrant> {
        self.token_request(&[
            ("grant_type", "refresh_token"),
            ("refresh_token", refresh_token),
        ])
        .await
    }

    async fn current_profile(&self, access_token: &str) -> Result<Profile> {
        let response = self
            .http
            .get(self.endpoint(&["me"])?)
            .bearer_auth(access_token)
            .send()
            .await?;

        let profile = ensure_success(response).await?.json().await?;
        Ok(profile)
    }

    async fn artist_top_tracks(
        &self,
        access_token: &str,
        artist_id: &str,
        market: &str,
    ) -> Result<Vec<Track>> {
        let response = self
            .http
            .get(self.endpoint(&["artists", artist_id, "top-tracks"])?)
            .bearer_auth(access_token)
            .query(&[("market", market)])
            .send()
            .await?;

        let top: TopTracksResponse = ensure_success(response).await?.json().await?;
        tracing::debug!("spotify returned {} top tracks for {}", top.tracks.len(), artist_id);
        Ok(top.tracks)
    }

    async fn create_playlist(
        &self,
        access_token: &str,
        user_id: &str,
        request: &CreatePlaylistRequest,
    ) -> Result<CreatedPlaylist> {
        let response = self
            .http
            .post(self.endpoint(&["users", user_id, "playlists"])?)
            .bearer_auth(access_token)
            .json(request)
            .send()
            .await?;

        let playlist = ensure_success(response).await?.json().await?;
        Ok(playlist)
    }

    async fn add_tracks_to_playlist(
        &self,
        access_token: &str,
        playlist_id: &str,
        uris: &[String],
    ) -> Result<()> {
        let response = self
            .http
            .post(self.endpoint(&["playlists", playlist_id, "tracks"])?)
            .bearer_auth(access_token)
            .json(&serde_json::json!({ "uris": uris }))
            .send()
            .await?;

        ensure_success(response).await?;
        Ok(())
    }

    async fn user_playlists(&self, access_token: &str) -> Result<Vec<PlaylistSummary>> {
        let mut playlists = Vec::new();
        let mut next = Some(format!("{}/me/playlists?limit=50", self.api_url));

        while let Some(url) = next {
            let response = self.http.get(&url).bearer_auth(access_token).send().await?;
            let page: PlaylistPage = ensure_success(response).await?.json().await?;
            playlists.extend(page.items);
            next = page.next;
        }

        Ok(playlists)
    }
}
