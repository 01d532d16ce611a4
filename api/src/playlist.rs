//! Playlist generation: per-artist top tracks from the cache (or the
//! provider when the cache is empty or stale), shuffled, trimmed, and pushed
//! into a freshly created playlist.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use rand::{seq::SliceRandom, Rng};
use serde::Deserialize;

use crate::{
    error::AppError,
    models::Playlist,
    spotify::{track_uri, CreatePlaylistRequest, StreamingProvider},
    store::{TrackCache, UserStore},
};

/// Market used for top-tracks lookups.
pub const MARKET: &str = "US";

/// Cached tracks older than this (7 days) invalidate the artist's whole set.
pub const STALE_AFTER_MS: i64 = 604_800_000;

/// The provider returns at most 10 top tracks and the cache keeps 10.
pub const MAX_TRACKS_PER_ARTIST: usize = 10;

/// Provider limit on URIs per add-tracks call.
pub const PLAYLIST_BATCH_SIZE: usize = 100;

pub const PLAYLIST_DESCRIPTION: &str = "Top tracks from the lineup, generated by Festy";

/// A track count as sent by clients: `"3"`, `3` or `3.0`.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum TrackCount {
    Number(i64),
    Float(f64),
    Text(String),
}

impl TrackCount {
    fn value(&self) -> Option<i64> {
        match self {
            TrackCount::Number(n) => Some(*n),
            TrackCount::Float(f) if f.is_finite() && f.fract() == 0.0 => Some(*f as i64),
            TrackCount::Float(_) => None,
            TrackCount::Text(s) => s.trim().parse().ok(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtistSelection {
    pub artist_id: String,
    pub count: usize,
}

/// Pairs artist ids with their requested counts.
///
/// Counts must be non-negative integers; anything above
/// [`MAX_TRACKS_PER_ARTIST`] is clamped.
pub fn parse_selections(
    artist_ids: Vec<String>,
    track_counts: &[TrackCount],
) -> Result<Vec<ArtistSelection>, AppError> {
    if artist_ids.len() != track_counts.len() {
        return Err(AppError::BadRequest(format!(
            "got {} artist ids but {} track counts",
            artist_ids.len(),
            track_counts.len()
        )));
    }

    artist_ids
        .into_iter()
        .zip(track_counts)
        .map(|(artist_id, raw)| {
            let count = raw
                .value()
                .filter(|n| *n >= 0)
                .ok_or_else(|| {
                    AppError::BadRequest(format!("invalid track count for artist {}", artist_id))
                })?;

            Ok(ArtistSelection {
                artist_id,
                count: (count as usize).min(MAX_TRACKS_PER_ARTIST),
            })
        })
        .collect()
}

pub fn is_stale(date_added: DateTime<Utc>, now: DateTime<Utc>) -> bool {
    (now - date_added).num_milliseconds() > STALE_AFTER_MS
}

/// Shuffles the candidates and keeps the first `count`.
pub fn pick_tracks<R: Rng + ?Sized>(mut uris: Vec<String>, count: usize, rng: &mut R) -> Vec<String> {
    uris.shuffle(rng);
    uris.truncate(count);
    uris
}

/// Where an artist's candidate tracks came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackSource {
    Cache,
    Fetched,
    /// The cached set was stale; it was dropped and refetched.
    Refreshed,
}

/// The caller's provider handle and access token for one request.
pub struct ProviderContext<'a> {
    pub provider: &'a dyn StreamingProvider,
    pub access_token: &'a str,
}

/// Returns every candidate track URI for an artist, in cache order.
///
/// Fresh caches are reused as-is. Empty or stale ones are (re)filled from the
/// provider's top tracks, each of which is persisted.
pub async fn resolve_artist_tracks<C>(
    cache: &C,
    ctx: &ProviderContext<'_>,
    artist_id: &str,
    now: DateTime<Utc>,
) -> Result<(Vec<String>, TrackSource)>
where
    C: TrackCache + ?Sized,
{
    let cached = cache.cached_tracks(artist_id).await?;

    let source = match cached.first() {
        None => TrackSource::Fetched,
        Some(oldest) if is_stale(oldest.date_added, now) => {
            tracing::info!("cached tracks for {} are stale, refetching", artist_id);
            cache.invalidate(artist_id).await?;
            TrackSource::Refreshed
        }
        Some(_) => {
            let uris = cached
                .iter()
                .map(|t| track_uri(&t.track_spotify_id))
                .collect();
            return Ok((uris, TrackSource::Cache));
        }
    };

    let tracks = ctx
        .provider
        .artist_top_tracks(ctx.access_token, artist_id, MARKET)
        .await
        .with_context(|| format!("failed to fetch top tracks for {}", artist_id))?;

    for track in &tracks {
        cache.add_track(artist_id, &track.id).await?;
    }

    Ok((tracks.into_iter().map(|t| t.uri).collect(), source))
}

/// Who the playlist is created for.
pub struct PlaylistOwner<'a> {
    pub user_id: i32,
    pub spotify_user_id: &'a str,
}

#[derive(Debug, Clone)]
pub struct GeneratedPlaylist {
    pub playlist_id: String,
    pub name: String,
    pub record: Playlist,
    pub uris: Vec<String>,
}

/// Builds the track list for `selections`, creates the playlist, fills it
/// in batches of [`PLAYLIST_BATCH_SIZE`] and records it for the owner.
///
/// Any failure aborts. A playlist that was already created is left as is.
pub async fn generate_playlist<S>(
    store: &S,
    ctx: &ProviderContext<'_>,
    owner: &PlaylistOwner<'_>,
    selections: &[ArtistSelection],
    festival_name: &str,
) -> Result<GeneratedPlaylist>
where
    S: TrackCache + UserStore + ?Sized,
{
    let now = Utc::now();
    let mut uris = Vec::new();

    for selection in selections {
        let (candidates, source) =
            resolve_artist_tracks(store, ctx, &selection.artist_id, now).await?;
        let picked = pick_tracks(candidates, selection.count, &mut rand::rng());

        tracing::debug!(
            "artist {}: {} of {} requested tracks ({:?})",
            selection.artist_id,
            picked.len(),
            selection.count,
            source
        );
        uris.extend(picked);
    }

    let name = format!("{} Playlist", festival_name);
    let request = CreatePlaylistRequest {
        name: name.clone(),
        description: PLAYLIST_DESCRIPTION.to_string(),
        public: true,
    };

    let created = ctx
        .provider
        .create_playlist(ctx.access_token, owner.spotify_user_id, &request)
        .await
        .context("failed to create playlist")?;
    tracing::info!("created playlist {} ({}) with {} tracks", created.id, name, uris.len());

    for batch in uris.chunks(PLAYLIST_BATCH_SIZE) {
        ctx.provider
            .add_tracks_to_playlist(ctx.access_token, &created.id, batch)
            .await
            .with_context(|| format!("failed to add tracks to playlist {}", created.id))?;
    }

    let record = store.add_playlist(owner.user_id, &created.id, &name).await?;

    Ok(GeneratedPlaylist {
        playlist_id: created.id,
        name,
        record,
        uris,
    })
}
