//! services/reader/src/bin/reader.rs

use reader_lib::{
    adapters::SupabaseClient,
    chapter::{ChapterLoader, ChapterView},
    config::Config,
    error::ReaderError,
    session::SessionStore,
};
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use uuid::Uuid;

fn parse_id(arg: Option<String>, name: &str) -> Result<Uuid, ReaderError> {
    let raw = arg.ok_or_else(|| {
        ReaderError::Internal(format!("usage: reader <novel_id> <chapter_id> (missing {})", name))
    })?;
    Uuid::parse_str(&raw).map_err(|e| ReaderError::Internal(format!("Invalid {}: {}", name, e)))
}

#[tokio::main]
async fn main() -> Result<(), ReaderError> {
    // --- 1. Load Configuration & Set Up Logging ---
    let config = Config::from_env()?;
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(config.log_level.to_string()))
        .with(tracing_subscriber::fmt::layer())
        .init();
    info!("Configuration loaded. Connecting to {}", config.supabase_url);

    let mut args = std::env::args().skip(1);
    let novel_id = parse_id(args.next(), "novel_id")?;
    let chapter_id = parse_id(args.next(), "chapter_id")?;

    // --- 2. Build the Backend Client & Session Store ---
    let backend = Arc::new(SupabaseClient::new(&config)?);
    let store = SessionStore::from_backend(backend.clone(), config.provisioning);
    store.init().await;

    // --- 3. Sign In When Credentials Are Provided ---
    if let (Ok(email), Ok(password)) = (
        std::env::var("READER_EMAIL"),
        std::env::var("READER_PASSWORD"),
    ) {
        if let Err(e) = store.login(&email, &password).await {
            warn!("Login failed: {}", e);
        }
    }
    if store.needs_profile_completion() {
        info!("Profile is incomplete; onboarding is still pending");
    }

    // --- 4. Load and Print the Chapter ---
    let loader = ChapterLoader::new(backend.clone(), backend);
    let viewer = store.profile();
    match loader.load(novel_id, chapter_id, viewer.as_ref()).await {
        ChapterView::RedirectToAuth { location } => {
            println!("Sign in required (redirect to {})", location);
        }
        ChapterView::NotFound => println!("Chapter not found"),
        ChapterView::Loaded(page) => {
            println!("Chapter {}: {}", page.chapter.chapter_number, page.chapter.title);
            println!("{} by {}\n", page.novel.title, page.novel.author);
            for paragraph in page.paragraphs() {
                println!("{}\n", paragraph);
            }
            if let Some(prev) = page.prev_path() {
                println!("Previous: {}", prev);
            }
            if let Some(next) = page.next_path() {
                println!("Next: {}", next);
            }
        }
    }

    // --- 5. Flush Background Work & Shut Down ---
    loader.wait().await;
    store.teardown().await;
    Ok(())
}
