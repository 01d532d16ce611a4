use anyhow::{anyhow, Context};
use chrono::Utc;
use festy_api::{
    config::Config,
    db::{self, PgStore},
    playlist::{self, ProviderContext, TrackSource},
    spotify::SpotifyClient,
    store::FestivalStore,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter("warm_tracks=info,festy_api=info")
        .init();

    let args: Vec<String> = std::env::args().collect();
    if args.len() < 2 {
        eprintln!("Usage: {} <festival_id>", args[0]);
        eprintln!("  Fills the top-tracks cache for every act of the festival.");
        return Err(anyhow!("Missing required argument: festival_id"));
    }

    let festival_id: i32 = args[1]
        .parse()
        .context("Failed to parse festival_id. It must be a number.")?;

    let config = Config::from_env();
    let pool = db::init_db(&config.database_url)
        .await
        .context("Failed to initialize database")?;
    let store = PgStore::new(pool);

    let festival = store
        .festival_with_acts(festival_id)
        .await?
        .ok_or_else(|| anyhow!("Festival {} not found", festival_id))?;

    tracing::info!(
        "Warming track cache for {} ({} acts)",
        festival.festival.name,
        festival.acts.len()
    );

    let client = SpotifyClient::new(&config.spotify)?;
    let token = client
        .client_credentials_token()
        .await
        .context("Failed to get an app token")?;
    let ctx = ProviderContext {
        provider: &client,
        access_token: &token,
    };

    let now = Utc::now();
    let (mut reused, mut fetched, mut failed) = (0, 0, 0);

    for act in &festival.acts {
        match playlist::resolve_artist_tracks(&store, &ctx, &act.artist_id, now).await {
            Ok((tracks, TrackSource::Cache)) => {
                tracing::debug!("{}: {} cached tracks still fresh", act.artist_name, tracks.len());
                reused += 1;
            }
            Ok((tracks, source)) => {
                tracing::info!("{}: cached {} tracks ({:?})", act.artist_name, tracks.len(), source);
                fetched += 1;
            }
            Err(e) => {
                tracing::warn!("{}: {:#}", act.artist_name, e);
                failed += 1;
            }
        }
    }

    tracing::info!(
        "Done: {} fetched, {} already fresh, {} failed",
        fetched,
        reused,
        failed
    );

    Ok(())
}
