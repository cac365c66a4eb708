//! # Rusty-Feed Binary
//!
//! Headless feed simulator: assembles a coordinator from the compiled-in
//! plugins, replays a JSON scenario (or a built-in demo) and prints the
//! resulting feed state as JSON.

#[cfg(not(all(feature = "source-memory", feature = "player-headless")))]
compile_error!("rusty-feed needs the `source-memory` and `player-headless` features");

mod script;
mod seed;

use std::sync::Arc;

use anyhow::Context;
use configs::LogConfig;
use rf_engine::{FeedCoordinator, FeedDriver};
use serde_json::json;
use tracing::info;
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

use rf_player_headless::HeadlessPlayerFactory;
use rf_source_memory::MemoryFeedSource;

use crate::script::{Runner, ScriptStep};

const SEED_POSTS: usize = 45;

fn init_tracing(log: &LogConfig) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&log.filter));
    let builder = tracing_subscriber::fmt().with_env_filter(filter).with_writer(std::io::stderr);
    if log.json {
        builder.json().init();
    } else {
        builder.init();
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = configs::load().context("loading configuration")?;
    init_tracing(&config.log);

    let steps: Vec<ScriptStep> = match std::env::args().nth(1) {
        Some(path) => {
            let raw = tokio::fs::read_to_string(&path).await.with_context(|| format!("reading scenario {path}"))?;
            serde_json::from_str(&raw).with_context(|| format!("parsing scenario {path}"))?
        }
        None => script::demo(),
    };

    let viewer = Uuid::now_v7();
    let source = Arc::new(MemoryFeedSource::new());
    for post in seed::posts(viewer, SEED_POSTS) {
        source.insert(post).await;
    }

    let players = HeadlessPlayerFactory::new();
    let journal = players.journal();
    let coordinator = FeedCoordinator::new(config.engine(), viewer, Box::new(players));
    let driver = FeedDriver::new(coordinator, source.clone());

    info!(viewer = %viewer, steps = steps.len(), mode = ?config.playback.mode, "🚀 Rusty-Feed simulation starting");
    let mut runner = Runner { driver, source, viewer };
    runner.run(steps).await;

    let feed = runner.driver.coordinator_mut();
    let failures: Vec<String> = feed.take_failures().iter().map(ToString::to_string).collect();
    let posts: Vec<_> = feed.post_ids().iter().filter_map(|id| feed.view(*id)).collect();
    let snapshot = json!({
        "now_playing": feed.now_playing().map(|key| key.to_string()),
        "posts": posts,
        "failures": failures,
        "player_calls": journal.calls().len(),
    });
    println!("{}", serde_json::to_string_pretty(&snapshot)?);

    runner.driver.unsubscribe();
    Ok(())
}
