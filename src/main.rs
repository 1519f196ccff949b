use std::{path::Path, sync::Arc};

use anyhow::{Context, bail};
use reading_state::{
    ChapterResolver, ContentApiClient, FileCache, ProgressKey, ReadingSession,
    ViewportMeasurement, config::Config, pagination, reading::chapter_number_from_key,
};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_error::ErrorLayer;
use tracing_subscriber::{EnvFilter, fmt::SubscriberBuilder, prelude::*};

type ReadingStateResult<T> = anyhow::Result<T>;

const USAGE: &str = "usage:
  reading-state session <work-key> <chapter-key>   (viewport measurements as JSON lines on stdin)
  reading-state pages <current> <total> [siblings]";

#[tokio::main(flavor = "current_thread")]
async fn main() -> ReadingStateResult<()> {
    // Respect RUST_LOG if set, default to info for our crate and warn for deps.
    let default_filter = format!("{}=info,reqwest=warn,h2=warn", env!("CARGO_PKG_NAME"));
    let env_filter = std::env::var("RUST_LOG").unwrap_or(default_filter);
    SubscriberBuilder::default()
        .with_env_filter(EnvFilter::new(env_filter))
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_level(true)
        .pretty()
        .finish()
        .with(ErrorLayer::default())
        .init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    match args.first().map(String::as_str) {
        Some("pages") => run_pages(&args[1..]),
        Some("session") => run_session(&args[1..]).await,
        _ => bail!(USAGE),
    }
}

fn run_pages(args: &[String]) -> ReadingStateResult<()> {
    let number = |i: usize, name: &str| -> ReadingStateResult<Option<u32>> {
        args.get(i)
            .map(|raw| raw.parse::<u32>().with_context(|| format!("Invalid {name}: {raw}")))
            .transpose()
    };
    let (Some(current), Some(total)) = (number(0, "current page")?, number(1, "total pages")?)
    else {
        bail!(USAGE);
    };
    let siblings = number(2, "sibling count")?.unwrap_or(pagination::DEFAULT_SIBLING_COUNT);

    let labels: Vec<String> = pagination::generate(current, total, siblings)
        .iter()
        .map(|t| t.to_string())
        .collect();
    println!("{}", labels.join(" "));
    let controls = pagination::page_controls(current, total);
    println!(
        "first={:?} previous={:?} next={:?} last={:?}",
        controls.first, controls.previous, controls.next, controls.last
    );
    Ok(())
}

async fn run_session(args: &[String]) -> ReadingStateResult<()> {
    let [work_key, chapter_key] = args else {
        bail!(USAGE);
    };

    // Load environment variables from .env files
    if Path::new(".env.local").exists() {
        dotenvy::from_filename(".env.local")?;
    } else if Path::new(".env").exists() {
        dotenvy::from_filename(".env")?;
    };
    let config = Config::load()?;
    config.validate().map_err(|e| anyhow::anyhow!(e))?;

    let key = ProgressKey::new(work_key.as_str(), chapter_key.as_str())?;
    let client = Arc::new(ContentApiClient::new(&config.api_base_url)?.with_api_key(&config.api_key));
    let cache = Arc::new(
        FileCache::open(&config.cache_path)
            .with_context(|| format!("Failed to open cache {}", config.cache_path.display()))?,
    );
    tracing::info!(api_base = %config.api_base_url, has_api_key = !config.api_key.is_empty(), cache = %config.cache_path.display(), "configured reading session");

    if let Some(position) = chapter_number_from_key(key.chapter_key()) {
        let resolver = ChapterResolver::new(client.clone());
        match resolver.neighbors(key.work_key(), position).await {
            Ok(n) => println!(
                "previous={} next={}",
                n.previous.map(|c| c.chapter_key).unwrap_or_else(|| "-".into()),
                n.next.map(|c| c.chapter_key).unwrap_or_else(|| "-".into()),
            ),
            Err(e) => tracing::warn!(error = %e, "could not resolve chapter neighbors"),
        }
    }

    let session = ReadingSession::open(key, cache, client, config.sync_policy()).await;
    println!("progress={}", session.percent());

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        if line.trim().is_empty() {
            continue;
        }
        let measurement: ViewportMeasurement = match serde_json::from_str(&line) {
            Ok(m) => m,
            Err(e) => {
                tracing::warn!(error = %e, "skipping malformed measurement");
                continue;
            }
        };
        let outcome = session.observe(&measurement).await;
        match outcome {
            Some(outcome) => println!(
                "progress={} completed={} saved={}",
                session.percent(),
                session.is_completed(),
                outcome.as_str()
            ),
            None => println!("progress={}", session.percent()),
        }
    }

    let outcome = session.save_now().await;
    println!(
        "final progress={} completed={} saved={}",
        session.percent(),
        session.is_completed(),
        outcome.as_str()
    );
    Ok(())
}
