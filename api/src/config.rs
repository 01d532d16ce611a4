//! Runtime configuration, read from the environment (and `.env` if present).

use std::env;

pub const DEFAULT_SCOPES: &[&str] = &[
    "playlist-read-collaborative",
    "playlist-modify-public",
    "playlist-read-private",
    "playlist-modify-private",
    "user-follow-read",
    "user-follow-modify",
];

pub const AUTH_CALLBACK_PATH: &str = "/auth/spotify/callback";

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub port: u16,
    pub spotify: SpotifyConfig,
}

#[derive(Debug, Clone)]
pub struct SpotifyConfig {
    pub client_id: String,
    pub client_secret: String,
    pub redirect_uri: String,
    pub scopes: Vec<String>,
    /// Base of the accounts service (`/authorize`, `/api/token`).
    pub accounts_url: String,
    /// Base of the Web API, including the version segment.
    pub api_url: String,
}

impl Config {
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();

        let port = env::var("PORT")
            .ok()
            .and_then(|p| p.parse().ok())
            .unwrap_or(3000);

        let database_url = env::var("DATABASE_URL")
            .unwrap_or_else(|_| "postgresql://localhost/festy".to_string());

        let client_id = env::var("SPOTIFY_CLIENT_ID").unwrap_or_default();
        let client_secret = env::var("SPOTIFY_CLIENT_SECRET").unwrap_or_default();

        if client_id.is_empty() || client_secret.is_empty() {
            tracing::warn!(
                "SPOTIFY_CLIENT_ID or SPOTIFY_CLIENT_SECRET not set, login will not work"
            );
        }

        let redirect_uri = env::var("SPOTIFY_REDIRECT_URI")
            .unwrap_or_else(|_| format!("http://localhost:{}{}", port, AUTH_CALLBACK_PATH));

        let scopes = env::var("SPOTIFY_SCOPES")
            .map(|s| parse_scopes(&s))
            .unwrap_or_else(|_| DEFAULT_SCOPES.iter().map(|s| s.to_string()).collect());

        Self {
            database_url,
            port,
            spotify: SpotifyConfig {
                client_id,
                client_secret,
                redirect_uri,
                scopes,
                accounts_url: env::var("SPOTIFY_ACCOUNTS_URL")
                    .unwrap_or_else(|_| "https://accounts.spotify.com".to_string()),
                api_url: env::var("SPOTIFY_API_URL")
                    .unwrap_or_else(|_| "https://api.spotify.com/v1".to_string()),
            },
        }
    }
}

/// Accepts space or comma separated scope lists.
fn parse_scopes(raw: &str) -> Vec<String> {
    raw.split(|c: char| c == ',' || c.is_whitespace())
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect()
}
