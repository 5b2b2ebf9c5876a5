//! LiftLog command-line entry point.
//!
//! Opens the local stores from the configured data directory and runs a
//! single inspection or import command.

use std::path::Path;

use anyhow::{bail, Context};
use chrono::Utc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use liftlog::storage::load_config;
use liftlog::StorageEngine;

const USAGE: &str =
    "usage: liftlog [summary | workouts | templates | photos | add-photo <path> <category>]";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting LiftLog v{}", env!("CARGO_PKG_VERSION"));

    let args: Vec<String> = std::env::args().skip(1).collect();
    let config = load_config().context("loading configuration")?;
    let engine = StorageEngine::open(&config)
        .await
        .context("opening local storage")?;

    match args.first().map(String::as_str).unwrap_or("summary") {
        "summary" => {
            let workouts = engine.workouts().workouts();
            println!("Workouts:  {}", workouts.len());
            println!("Templates: {}", engine.data().get_templates().len());
            println!("Photos:    {}", engine.photos().count_photos().await?);
            if let Some(latest) = workouts.first() {
                println!("Latest:    {}", latest.date.format("%Y-%m-%d %H:%M"));
            }
        }
        "workouts" => {
            for w in engine.workouts().workouts() {
                println!(
                    "{}  {}  {} exercises, {} sets, {:.0} kg volume",
                    w.date.format("%Y-%m-%d"),
                    w.name.as_deref().unwrap_or("Workout"),
                    w.exercises.len(),
                    w.set_count(),
                    w.total_volume()
                );
            }
        }
        "templates" => {
            for t in engine.data().get_templates_by_recent_use() {
                let last = t
                    .last_used
                    .map(|d| d.format("%Y-%m-%d").to_string())
                    .unwrap_or_else(|| "never".to_string());
                println!("{}  {}  last used {}", t.id, t.name, last);
            }
        }
        "photos" => {
            let mut photos = engine.photos().get_all_photos().await;
            photos.sort_by(|a, b| b.date.cmp(&a.date));
            for p in photos {
                println!("{}  {}  {}", p.date.format("%Y-%m-%d"), p.category, p.id);
            }
        }
        "add-photo" => {
            let (Some(path), Some(category)) = (args.get(1), args.get(2)) else {
                bail!(USAGE);
            };
            let photo = engine
                .photos()
                .capture_photo(Path::new(path), category, Utc::now(), None)
                .await
                .with_context(|| format!("adding {}", path))?;
            println!("Stored photo {}", photo.id);
        }
        _ => bail!(USAGE),
    }

    Ok(())
}
