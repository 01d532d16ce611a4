use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct User {
    pub id: i32,
    pub spotify_user_id: String,
    pub username: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Playlist {
    pub id: i32,
    pub user_id: i32,
    pub playlist_spotify_id: String,
    pub name: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Festival {
    pub id: i32,
    pub name: String,
    pub date: NaiveDate,
    pub location: Option<String>,
}

/// One lineup entry of a festival, joined with its artist.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Act {
    pub artist_id: String,
    pub artist_name: String,
    pub popularity: Option<i32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FestivalWithActs {
    #[serde(flatten)]
    pub festival: Festival,
    pub acts: Vec<Act>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Artist {
    pub id: String,
    pub name: String,
    pub popularity: Option<i32>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct CachedTrack {
    pub id: i32,
    pub artist_id: String,
    pub track_spotify_id: String,
    pub date_added: DateTime<Utc>,
}
