use anyhow::Result;
use async_trait::async_trait;
use sqlx::postgres::PgPool;

use crate::{
    models::*,
    store::{FestivalStore, TrackCache, UserStore},
};

pub async fn init_db(database_url: &str) -> Result<PgPool> {
    let pool = sqlx::postgres::PgPoolOptions::new()
        .max_connections(20)
        .acquire_timeout(std::time::Duration::from_secs(30))
        .connect(database_url)
        .await?;

    // Run migrations
    sqlx::migrate!("./migrations").run(&pool).await?;

    Ok(pool)
}

#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl TrackCache for PgStore {
    async fn cached_tracks(&self, artist_id: &str) -> Result<Vec<CachedTrack>> {
        let tracks = sqlx::query_as::<_, CachedTrack>(
            r#"
            SELECT id, artist_id, track_spotify_id, date_added
            FROM tracks
            WHERE artist_id = $1
            ORDER BY date_added ASC
            LIMIT 10
            "#,
        )
        .bind(artist_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(tracks)
    }

    async fn invalidate(&self, artist_id: &str) -> Result<()> {
        let deleted = sqlx::query("DELETE FROM tracks WHERE artist_id = $1")
            .bind(artist_id)
            .execute(&self.pool)
            .await?
            .rows_affected();

        tracing::debug!("dropped {} cached tracks for artist {}", deleted, artist_id);
        Ok(())
    }

    async fn add_track(&self, artist_id: &str, track_id: &str) -> Result<CachedTrack> {
        let track = sqlx::query_as::<_, CachedTrack>(
            r#"
            INSERT INTO tracks (artist_id, track_spotify_id)
            VALUES ($1, $2)
            RETURNING id, artist_id, track_spotify_id, date_added
            "#,
        )
        .bind(artist_id)
        .bind(track_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(track)
    }
}

#[async_trait]
impl UserStore for PgStore {
    async fn user_exists(&self, spotify_user_id: &str) -> Result<bool> {
        let row: Option<(String,)> =
            sqlx::query_as("SELECT spotify_user_id FROM users WHERE spotify_user_id = $1")
                .bind(spotify_user_id)
                .fetch_optional(&self.pool)
                .await?;

        Ok(row.is_some())
    }

    async fn create_user(&self, spotify_user_id: &str, display_name: Option<&str>) -> Result<User> {
        let user = sqlx::query_as::<_, User>(
            r#"
            INSERT INTO users (spotify_user_id, username)
            VALUES ($1, $2)
            RETURNING id, spotify_user_id, username
            "#,
        )
        .bind(spotify_user_id)
        .bind(display_name)
        .fetch_one(&self.pool)
        .await?;

        Ok(user)
    }

    async fn user_id(&self, spotify_user_id: &str) -> Result<Option<i32>> {
        let row: Option<(i32,)> = sqlx::query_as("SELECT id FROM users WHERE spotify_user_id = $1")
            .bind(spotify_user_id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.map(|(id,)| id))
    }

    async fn playlists(&self, user_id: i32) -> Result<Vec<Playlist>> {
        let playlists = sqlx::query_as::<_, Playlist>(
            r#"
            SELECT id, user_id, playlist_spotify_id, name, created_at
            FROM playlists
            WHERE user_id = $1
            ORDER BY created_at DESC
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(playlists)
    }

    async fn add_playlist(
        &self,
        user_id: i32,
        playlist_spotify_id: &str,
        name: &str,
    ) -> Result<Playlist> {
        let playlist = sqlx::query_as::<_, Playlist>(
            r#"
            INSERT INTO playlists (user_id, playlist_spotify_id, name)
            VALUES ($1, $2, $3)
            RETURNING id, user_id, playlist_spotify_id, name, created_at
            "#,
        )
        .bind(user_id)
        .bind(playlist_spotify_id)
        .bind(name)
        .fetch_one(&self.pool)
        .await?;

        Ok(playlist)
    }

    async fn delete_playlist(&self, playlist_id: i32, owner: Option<i32>) -> Result<Option<i32>> {
        // A NULL owner matches any row.
        let row: Option<(i32,)> = sqlx::query_as(
            r#"
            DELETE FROM playlists
            WHERE id = $1 AND ($2::INT IS NULL OR user_id = $2)
            RETURNING id
            "#,
        )
        .bind(playlist_id)
        .bind(owner)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|(id,)| id))
    }
}

#[async_trait]
impl FestivalStore for PgStore {
    async fn upcoming_festivals(&self) -> Result<Vec<Festival>> {
        let festivals = sqlx::query_as::<_, Festival>(
            r#"
            SELECT id, name, date, location
            FROM festivals
            ORDER BY date
            LIMIT 6
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(festivals)
    }

    async fn search_festivals_by_name(&self, term: &str) -> Result<Vec<Festival>> {
        let festivals = sqlx::query_as::<_, Festival>(
            r#"
            SELECT id, name, date, location
            FROM festivals
            WHERE name ILIKE $1
            LIMIT 6
            "#,
        )
        .bind(format!("%{}%", term))
        .fetch_all(&self.pool)
        .await?;

        Ok(festivals)
    }

    async fn search_festivals_by_artist(&self, artist_name: &str) -> Result<Vec<Festival>> {
        let festivals = sqlx::query_as::<_, Festival>(
            r#"
            SELECT DISTINCT f.id, f.name, f.date, f.location
            FROM festivals f
            JOIN acts a ON f.id = a.event_id
            JOIN artists ar ON a.artist_id = ar.id
            WHERE ar.name ILIKE $1
            ORDER BY f.date
            LIMIT 6
            "#,
        )
        .bind(format!("%{}%", artist_name))
        .fetch_all(&self.pool)
        .await?;

        Ok(festivals)
    }

    async fn festival_with_acts(&self, festival_id: i32) -> Result<Option<FestivalWithActs>> {
        let festival = sqlx::query_as::<_, Festival>(
            "SELECT id, name, date, location FROM festivals WHERE id = $1",
        )
        .bind(festival_id)
        .fetch_optional(&self.pool)
        .await?;

        let Some(festival) = festival else {
            return Ok(None);
        };

        let acts = sqlx::query_as::<_, Act>(
            r#"
            SELECT ar.id AS artist_id, ar.name AS artist_name, ar.popularity
            FROM acts a
            JOIN artists ar ON a.artist_id = ar.id
            WHERE a.event_id = $1
            ORDER BY ar.popularity DESC NULLS LAST
            "#,
        )
        .bind(festival_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(Some(FestivalWithActs { festival, acts }))
    }

    async fn artists(&self) -> Result<Vec<Artist>> {
        let artists = sqlx::query_as::<_, Artist>(
            r#"
            SELECT id, name, popularity
            FROM artists
            ORDER BY popularity DESC NULLS LAST
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(artists)
    }
}
