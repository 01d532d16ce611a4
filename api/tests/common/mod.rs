//! In-memory store and scripted provider shared by the integration tests.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use axum::body::Body;
use axum::http::{header, Method, Request, Response, StatusCode};
use axum::Router;
use chrono::{DateTime, NaiveDate, Utc};
use http_body_util::BodyExt;
use tower::ServiceExt;

use festy_api::models::*;
use festy_api::spotify::{
    CreatePlaylistRequest, CreatedPlaylist, PlaylistSummary, Profile, StreamingProvider,
    TokenGrant, Track,
};
use festy_api::store::{FestivalStore, TrackCache, UserStore};
use festy_api::AppState;

// ---------------------------------------------------------------------------
// Store
// ---------------------------------------------------------------------------

#[derive(Default)]
struct Tables {
    users: Vec<User>,
    playlists: Vec<Playlist>,
    festivals: Vec<Festival>,
    acts: Vec<(i32, String)>,
    artists: Vec<Artist>,
    tracks: Vec<CachedTrack>,
    next_id: i32,
}

impl Tables {
    fn next_id(&mut self) -> i32 {
        self.next_id += 1;
        self.next_id
    }
}

#[derive(Default)]
pub struct MemoryStore {
    tables: Mutex<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_festival(&self, name: &str, date: &str, location: &str) -> i32 {
        let mut t = self.tables.lock().unwrap();
        let id = t.next_id();
        t.festivals.push(Festival {
            id,
            name: name.to_string(),
            date: NaiveDate::parse_from_str(date, "%Y-%m-%d").unwrap(),
            location: Some(location.to_string()),
        });
        id
    }

    pub fn add_artist(&self, id: &str, name: &str, popularity: i32) {
        let mut t = self.tables.lock().unwrap();
        t.artists.push(Artist {
            id: id.to_string(),
            name: name.to_string(),
            popularity: Some(popularity),
        });
    }

    pub fn add_act(&self, festival_id: i32, artist_id: &str) {
        let mut t = self.tables.lock().unwrap();
        t.acts.push((festival_id, artist_id.to_string()));
    }

    /// Inserts a cached track with an explicit insertion time.
    pub fn seed_track(&self, artist_id: &str, track_id: &str, date_added: DateTime<Utc>) {
        let mut t = self.tables.lock().unwrap();
        let id = t.next_id();
        t.tracks.push(CachedTrack {
            id,
            artist_id: artist_id.to_string(),
            track_spotify_id: track_id.to_string(),
            date_added,
        });
    }

    pub fn track_ids(&self, artist_id: &str) -> Vec<String> {
        let t = self.tables.lock().unwrap();
        t.tracks
            .iter()
            .filter(|tr| tr.artist_id == artist_id)
            .map(|tr| tr.track_spotify_id.clone())
            .collect()
    }

    pub fn user_count(&self) -> usize {
        self.tables.lock().unwrap().users.len()
    }

    pub fn all_playlists(&self) -> Vec<Playlist> {
        self.tables.lock().unwrap().playlists.clone()
    }
}

#[async_trait]
impl TrackCache for MemoryStore {
    async fn cached_tracks(&self, artist_id: &str) -> Result<Vec<CachedTrack>> {
        let t = self.tables.lock().unwrap();
        let mut tracks: Vec<CachedTrack> = t
            .tracks
            .iter()
            .filter(|tr| tr.artist_id == artist_id)
            .cloned()
            .collect();
        tracks.sort_by_key(|tr| tr.date_added);
        tracks.truncate(10);
        Ok(tracks)
    }

    async fn invalidate(&self, artist_id: &str) -> Result<()> {
        let mut t = self.tables.lock().unwrap();
        t.tracks.retain(|tr| tr.artist_id != artist_id);
        Ok(())
    }

    async fn add_track(&self, artist_id: &str, track_id: &str) -> Result<CachedTrack> {
        let mut t = self.tables.lock().unwrap();
        let track = CachedTrack {
            id: t.next_id(),
            artist_id: artist_id.to_string(),
            track_spotify_id: track_id.to_string(),
            date_added: Utc::now(),
        };
        t.tracks.push(track.clone());
        Ok(track)
    }
}

#[async_trait]
impl UserStore for MemoryStore {
    async fn user_exists(&self, spotify_user_id: &str) -> Result<bool> {
        let t = self.tables.lock().unwrap();
        Ok(t.users.iter().any(|u| u.spotify_user_id == spotify_user_id))
    }

    async fn create_user(&self, spotify_user_id: &str, display_name: Option<&str>) -> Result<User> {
        let mut t = self.tables.lock().unwrap();
        if t.users.iter().any(|u| u.spotify_user_id == spotify_user_id) {
            return Err(anyhow!("duplicate key value violates unique constraint"));
        }
        let user = User {
            id: t.next_id(),
            spotify_user_id: spotify_user_id.to_string(),
            username: display_name.map(String::from),
        };
        t.users.push(user.clone());
        Ok(user)
    }

    async fn user_id(&self, spotify_user_id: &str) -> Result<Option<i32>> {
        let t = self.tables.lock().unwrap();
        Ok(t.users
            .iter()
            .find(|u| u.spotify_user_id == spotify_user_id)
            .map(|u| u.id))
    }

    async fn playlists(&self, user_id: i32) -> Result<Vec<Playlist>> {
        let t = self.tables.lock().unwrap();
        Ok(t.playlists
            .iter()
            .filter(|p| p.user_id == user_id)
            .cloned()
            .collect())
    }

    async fn add_playlist(
        &self,
        user_id: i32,
        playlist_spotify_id: &str,
        name: &str,
    ) -> Result<Playlist> {
        let mut t = self.tables.lock().unwrap();
        let playlist = Playlist {
            id: t.next_id(),
            user_id,
            playlist_spotify_id: playlist_spotify_id.to_string(),
            name: name.to_string(),
            created_at: Utc::now(),
        };
        t.playlists.push(playlist.clone());
        Ok(playlist)
    }

    async fn delete_playlist(&self, playlist_id: i32, owner: Option<i32>) -> Result<Option<i32>> {
        let mut t = self.tables.lock().unwrap();
        let pos = t
            .playlists
            .iter()
            .position(|p| p.id == playlist_id && owner.map_or(true, |o| p.user_id == o));
        Ok(pos.map(|i| t.playlists.remove(i).id))
    }
}

#[async_trait]
impl FestivalStore for MemoryStore {
    async fn upcoming_festivals(&self) -> Result<Vec<Festival>> {
        let t = self.tables.lock().unwrap();
        let mut festivals = t.festivals.clone();
        festivals.sort_by_key(|f| f.date);
        festivals.truncate(6);
        Ok(festivals)
    }

    async fn search_festivals_by_name(&self, term: &str) -> Result<Vec<Festival>> {
        let t = self.tables.lock().unwrap();
        let term = term.to_lowercase();
        Ok(t.festivals
            .iter()
            .filter(|f| f.name.to_lowercase().contains(&term))
            .take(6)
            .cloned()
            .collect())
    }

    async fn search_festivals_by_artist(&self, artist_name: &str) -> Result<Vec<Festival>> {
        let t = self.tables.lock().unwrap();
        let term = artist_name.to_lowercase();
        let artist_ids: Vec<&str> = t
            .artists
            .iter()
            .filter(|a| a.name.to_lowercase().contains(&term))
            .map(|a| a.id.as_str())
            .collect();
        Ok(t.festivals
            .iter()
            .filter(|f| {
                t.acts
                    .iter()
                    .any(|(fid, aid)| *fid == f.id && artist_ids.contains(&aid.as_str()))
            })
            .take(6)
            .cloned()
            .collect())
    }

    async fn festival_with_acts(&self, festival_id: i32) -> Result<Option<FestivalWithActs>> {
        let t = self.tables.lock().unwrap();
        let Some(festival) = t.festivals.iter().find(|f| f.id == festival_id).cloned() else {
            return Ok(None);
        };
        let mut acts: Vec<Act> = t
            .acts
            .iter()
            .filter(|(fid, _)| *fid == festival_id)
            .filter_map(|(_, aid)| t.artists.iter().find(|a| &a.id == aid))
            .map(|a| Act {
                artist_id: a.id.clone(),
                artist_name: a.name.clone(),
                popularity: a.popularity,
            })
            .collect();
        acts.sort_by(|a, b| b.popularity.cmp(&a.popularity));
        Ok(Some(FestivalWithActs { festival, acts }))
    }

    async fn artists(&self) -> Result<Vec<Artist>> {
        let t = self.tables.lock().unwrap();
        let mut artists = t.artists.clone();
        artists.sort_by(|a, b| b.popularity.cmp(&a.popularity));
        Ok(artists)
    }
}

// ---------------------------------------------------------------------------
// Provider
// ---------------------------------------------------------------------------

pub const GOOD_CODE: &str = "good-code";
pub const USER_ID: &str = "spotify-user-1";

#[derive(Default)]
pub struct FakeProvider {
    top_tracks: Mutex<HashMap<String, Vec<Track>>>,
    pub top_track_calls: Mutex<Vec<String>>,
    pub created: Mutex<Vec<(String, CreatePlaylistRequest)>>,
    pub added: Mutex<Vec<(String, Vec<String>)>>,
    pub fail_add_tracks: Mutex<bool>,
}

impl FakeProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `count` top tracks for an artist, ids `{artist}-t{n}`.
    pub fn with_top_tracks(self, artist_id: &str, count: usize) -> Self {
        let tracks = (1..=count)
            .map(|n| {
                let id = format!("{}-t{}", artist_id, n);
                Track {
                    uri: format!("spotify:track:{}", id),
                    name: format!("Track {}", n),
                    id,
                }
            })
            .collect();
        self.top_tracks
            .lock()
            .unwrap()
            .insert(artist_id.to_string(), tracks);
        self
    }

    pub fn top_track_calls(&self) -> Vec<String> {
        self.top_track_calls.lock().unwrap().clone()
    }

    pub fn created(&self) -> Vec<(String, CreatePlaylistRequest)> {
        self.created.lock().unwrap().clone()
    }

    pub fn batches(&self) -> Vec<Vec<String>> {
        self.added
            .lock()
            .unwrap()
            .iter()
            .map(|(_, uris)| uris.clone())
            .collect()
    }
}

#[async_trait]
impl StreamingProvider for FakeProvider {
    fn authorize_url(&self) -> String {
        "https://accounts.example.com/authorize?client_id=test&response_type=code".to_string()
    }

    async fn exchange_code(&self, code: &str) -> Result<TokenGrant> {
        if code != GOOD_CODE {
            return Err(anyhow!("invalid_grant"));
        }
        Ok(TokenGrant {
            access_token: "access-token".to_string(),
            refresh_token: Some("refresh-token".to_string()),
            expires_in: 3600,
            scope: None,
        })
    }

    async fn refresh_access_token(&self, _refresh_token: &str) -> Result<TokenGrant> {
        Ok(TokenGrant {
            access_token: "refreshed-token".to_string(),
            refresh_token: None,
            expires_in: 3600,
            scope: None,
        })
    }

    async fn current_profile(&self, access_token: &str) -> Result<Profile> {
        if access_token != "access-token" {
            return Err(anyhow!("bad token"));
        }
        Ok(Profile {
            id: USER_ID.to_string(),
            display_name: Some("Festival Fan".to_string()),
            email: None,
            country: Some("US".to_string()),
            images: Vec::new(),
        })
    }

    async fn artist_top_tracks(
        &self,
        _access_token: &str,
        artist_id: &str,
        market: &str,
    ) -> Result<Vec<Track>> {
        assert_eq!(market, "US");
        self.top_track_calls
            .lock()
            .unwrap()
            .push(artist_id.to_string());
        Ok(self
            .top_tracks
            .lock()
            .unwrap()
            .get(artist_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn create_playlist(
        &self,
        _access_token: &str,
        user_id: &str,
        request: &CreatePlaylistRequest,
    ) -> Result<CreatedPlaylist> {
        let mut created = self.created.lock().unwrap();
        created.push((user_id.to_string(), request.clone()));
        Ok(CreatedPlaylist {
            id: format!("playlist-{}", created.len()),
            name: request.name.clone(),
        })
    }

    async fn add_tracks_to_playlist(
        &self,
        _access_token: &str,
        playlist_id: &str,
        uris: &[String],
    ) -> Result<()> {
        if *self.fail_add_tracks.lock().unwrap() {
            return Err(anyhow!("503 Service Unavailable"));
        }
        assert!(uris.len() <= 100, "batch of {} uris", uris.len());
        self.added
            .lock()
            .unwrap()
            .push((playlist_id.to_string(), uris.to_vec()));
        Ok(())
    }

    async fn user_playlists(&self, _access_token: &str) -> Result<Vec<PlaylistSummary>> {
        Ok(vec![PlaylistSummary {
            id: "existing".to_string(),
            name: "Road Trip".to_string(),
            public: Some(false),
            tracks: None,
        }])
    }
}

// ---------------------------------------------------------------------------
// HTTP helpers
// ---------------------------------------------------------------------------

pub struct TestApp {
    pub router: Router,
    pub state: AppState,
    pub store: Arc<MemoryStore>,
    pub provider: Arc<FakeProvider>,
}

pub fn build_test_app(store: MemoryStore, provider: FakeProvider) -> TestApp {
    let store = Arc::new(store);
    let provider = Arc::new(provider);
    let state = AppState::new(store.clone(), provider.clone());
    TestApp {
        router: festy_api::router(state.clone()),
        state,
        store,
        provider,
    }
}

impl TestApp {
    pub async fn request(
        &self,
        method: Method,
        uri: &str,
        cookie: Option<&str>,
        body: Option<serde_json::Value>,
    ) -> Response<Body> {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(cookie) = cookie {
            builder = builder.header(header::COOKIE, cookie);
        }
        let body = match body {
            Some(json) => {
                builder = builder.header(header::CONTENT_TYPE, "application/json");
                Body::from(json.to_string())
            }
            None => Body::empty(),
        };
        self.router
            .clone()
            .oneshot(builder.body(body).unwrap())
            .await
            .unwrap()
    }

    pub async fn get(&self, uri: &str, cookie: Option<&str>) -> Response<Body> {
        self.request(Method::GET, uri, cookie, None).await
    }

    /// Runs the OAuth callback and returns the `name=value` session cookie.
    pub async fn login(&self) -> String {
        let response = self
            .get(&format!("/auth/spotify/callback?code={}", GOOD_CODE), None)
            .await;
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        session_cookie(&response).expect("callback must set a session cookie")
    }
}

pub fn session_cookie(response: &Response<Body>) -> Option<String> {
    response
        .headers()
        .get_all(header::SET_COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .find(|v| v.starts_with("festy_session="))
        .and_then(|v| v.split(';').next())
        .map(String::from)
}

pub async fn body_json(response: Response<Body>) -> serde_json::Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}
