//! fitfeed-tail - follow a FitFeed feed from the terminal
//!
//! Opens a posts or messages feed, prints the loaded history oldest first,
//! then prints new items as the poller discovers them.

use anyhow::{bail, Context};
use clap::{Parser, ValueEnum};
use fitfeed_sync::{
    BackingStore, CallerIdentity, Credential, DropReason, EnginePhase, FeedItem, FeedKind, FeedSyncEngine,
    HttpBackingStore, HttpStoreConfig, ItemId, Messages, Outcome, Posts, TargetIdentity,
};
use std::fmt::Debug;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum FeedChoice {
    Posts,
    Messages,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum TokenScheme {
    /// Authorization: Bearer <token>
    Bearer,
    /// Authorization: Token <token>
    Session,
}

/// Follow a FitFeed posts or messages feed
#[derive(Parser, Debug, Clone)]
#[command(name = "fitfeed-tail")]
#[command(about = "Follow a FitFeed posts or messages feed from the terminal")]
struct Args {
    /// Base URL of the feed API
    #[arg(long, env = "FITFEED_API_URL", default_value = "http://localhost:8000/api")]
    base_url: String,

    /// Which feed to follow
    #[arg(long, value_enum, default_value_t = FeedChoice::Posts)]
    feed: FeedChoice,

    /// Only follow this user's items (default: everyone)
    #[arg(long)]
    user: Option<String>,

    /// Signed-in user id
    #[arg(long, env = "FITFEED_USER_ID")]
    caller_id: Option<String>,

    /// Session credential
    #[arg(long, env = "FITFEED_TOKEN", hide_env_values = true)]
    token: Option<String>,

    /// How the credential is presented
    #[arg(long, value_enum, env = "FITFEED_TOKEN_SCHEME", default_value_t = TokenScheme::Bearer)]
    token_scheme: TokenScheme,

    /// Override the feed's default poll interval
    #[arg(long, env = "FITFEED_POLL_INTERVAL_MS")]
    poll_interval_ms: Option<u64>,

    /// Items per page
    #[arg(long, env = "FITFEED_PAGE_SIZE", default_value = "20")]
    page_size: u32,

    /// Pages of history to load on startup
    #[arg(long, default_value = "1")]
    pages: u32,

    /// Request timeout in seconds
    #[arg(long, env = "FITFEED_TIMEOUT_SECS", default_value = "30")]
    timeout_secs: u64,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    log_level: String,
}

impl Args {
    fn caller(&self) -> CallerIdentity {
        match (&self.caller_id, &self.token) {
            (Some(user_id), Some(token)) => {
                let credential = match self.token_scheme {
                    TokenScheme::Bearer => Credential::Bearer(token.clone()),
                    TokenScheme::Session => Credential::Session(token.clone()),
                };
                CallerIdentity::authenticated(user_id.as_str(), credential)
            }
            _ => CallerIdentity::anonymous(),
        }
    }

    fn target(&self) -> TargetIdentity {
        self.user
            .as_deref()
            .map(TargetIdentity::user)
            .unwrap_or_default()
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(format!("fitfeed_sync={}", args.log_level).parse()?)
                .add_directive(format!("fitfeed_tail={}", args.log_level).parse()?),
        )
        .init();

    match args.feed {
        FeedChoice::Posts => follow::<Posts>(&args).await,
        FeedChoice::Messages => follow::<Messages>(&args).await,
    }
}

async fn follow<K: FeedKind>(args: &Args) -> anyhow::Result<()> {
    let store = HttpBackingStore::<K>::new(HttpStoreConfig {
        base_url: args.base_url.clone(),
        timeout_secs: args.timeout_secs,
        page_size: args.page_size,
    })
    .context("Failed to build HTTP backing store")?;

    let mut config = K::default_config();
    if let Some(ms) = args.poll_interval_ms {
        config = config.with_poll_interval(Duration::from_millis(ms));
    }
    let feed = FeedSyncEngine::<K, _>::new(Arc::new(store), config);

    match feed.load_initial(args.target(), args.caller()).await? {
        Outcome::Applied => {}
        Outcome::Dropped(DropReason::NotAuthenticated) => {
            bail!("Not signed in: pass --caller-id and --token (or FITFEED_USER_ID / FITFEED_TOKEN)")
        }
        Outcome::Dropped(reason) => bail!("Feed not loaded: {:?}", reason),
    }

    for _ in 1..args.pages {
        if !feed.load_older().await?.is_applied() {
            break;
        }
    }

    let snapshot = feed.snapshot().await;
    for item in snapshot.items.iter().rev() {
        print_item(item);
    }
    info!(
        feed = K::resource(),
        items = snapshot.items.len(),
        interval_ms = feed.config().poll_interval.as_millis() as u64,
        "Following feed, Ctrl-C to stop"
    );

    follow_until(&feed, tokio::signal::ctrl_c()).await;
    Ok(())
}

/// Print new items as they arrive until `shutdown` resolves or the
/// credential is rejected, then tear the feed down
async fn follow_until<K, S, F>(feed: &FeedSyncEngine<K, S>, shutdown: F)
where
    K: FeedKind,
    S: BackingStore<K>,
    F: Future,
{
    // Polled across iterations so a signal during load_newer is kept
    tokio::pin!(shutdown);
    let mut updates = feed.subscribe();
    loop {
        tokio::select! {
            biased;

            _ = &mut shutdown => {
                info!("Interrupted");
                break;
            }
            changed = updates.changed() => {
                if changed.is_err() {
                    break;
                }
                let snapshot = updates.borrow_and_update().clone();
                if snapshot.phase == EnginePhase::Unauthorized {
                    warn!("Credential rejected, no longer following");
                    break;
                }
                if snapshot.has_new_items() && !snapshot.flags.loading_newer {
                    let previous_top = snapshot.items.first().map(|item| item.id.clone());
                    match feed.load_newer().await {
                        Ok(_) => print_newer(&feed.snapshot().await.items, previous_top.as_ref()),
                        Err(err) => warn!(error = %err, "Could not load new items"),
                    }
                }
            }
        }
    }

    feed.teardown().await;
}

/// Print items above `previous_top`, oldest first
fn print_newer<A: Debug>(items: &[FeedItem<A>], previous_top: Option<&ItemId>) {
    let fresh: Vec<&FeedItem<A>> = items
        .iter()
        .take_while(|item| Some(&item.id) != previous_top)
        .collect();
    for item in fresh.into_iter().rev() {
        print_item(item);
    }
}

fn print_item<A: Debug>(item: &FeedItem<A>) {
    let attachment = item
        .attachment
        .as_ref()
        .map(|a| format!(" [{:?}]", a))
        .unwrap_or_default();
    println!(
        "{} #{} {}: {} (+{} / -{}){}",
        item.created_at.format("%Y-%m-%d %H:%M"),
        item.id,
        item.author_id,
        item.content,
        item.reactions.like_count,
        item.reactions.dislike_count,
        attachment
    );
}
