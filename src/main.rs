use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use colored::Colorize;
use console::Emoji;
use indicatif::{ProgressBar, ProgressStyle};
use serde::Serialize;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use podkeep::{
    NoopReporter, ProgressEvent, ProgressReporter, ReqwestClient, SharedProgressReporter,
    SqliteStore, Storage, Subscription, SyncEngine, SyncOptions, UpdateSummary, html_to_text,
    search_podcasts,
};

// Emoji with fallback for terminals without Unicode support
static MICROPHONE: Emoji<'_, '_> = Emoji("🎙️  ", "");
static SEARCH: Emoji<'_, '_> = Emoji("🔍 ", "[~] ");
static HEADPHONES: Emoji<'_, '_> = Emoji("🎧 ", "[i] ");
static SUCCESS: Emoji<'_, '_> = Emoji("✅ ", "[+] ");
static FAILURE: Emoji<'_, '_> = Emoji("❌ ", "[!] ");
static PARTY: Emoji<'_, '_> = Emoji("🎉 ", "[*] ");

type Engine = SyncEngine<ReqwestClient, SqliteStore>;

/// Follow podcasts and keep their episode lists up to date
#[derive(Parser, Debug)]
#[command(name = "podkeep")]
#[command(about = "Follow podcasts and keep their episode lists up to date")]
#[command(version)]
struct Args {
    /// SQLite database holding subscriptions and episodes
    #[arg(long, env = "PODKEEP_DB", default_value = "podkeep.db", global = true)]
    database: PathBuf,

    /// Maximum number of feeds fetched at the same time
    #[arg(short = 'c', long, default_value = "4", global = true)]
    concurrent: usize,

    /// Quiet mode - suppress progress output
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Print machine-readable JSON instead of text
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Search the podcast directory
    Search { term: String },

    /// Show a podcast without subscribing
    Show {
        feed_url: String,

        /// Number of episodes to list
        #[arg(short, long, default_value = "10")]
        limit: usize,
    },

    /// Subscribe to a podcast feed
    Subscribe {
        feed_url: String,

        /// Artwork URL to store with the subscription (see `search --json`)
        #[arg(long)]
        image: Option<String>,
    },

    /// Remove a subscription and its episodes
    Unsubscribe { feed_url: String },

    /// List subscriptions
    List,

    /// List stored episodes of a subscription
    Episodes {
        feed_url: String,

        /// Number of episodes to list
        #[arg(short, long)]
        limit: Option<usize>,
    },

    /// Fetch all subscriptions once and store new episodes
    Update,

    /// Refresh subscriptions periodically until interrupted
    Watch {
        /// Seconds between refreshes
        #[arg(short, long, default_value = "3600")]
        interval: u64,
    },
}

/// Progress reporter using an indicatif spinner
struct IndicatifReporter {
    bar: ProgressBar,
}

impl IndicatifReporter {
    fn new() -> Self {
        let style = ProgressStyle::default_spinner()
            .template("{spinner:.green} {wide_msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner());

        let bar = ProgressBar::new_spinner();
        bar.set_style(style);
        bar.enable_steady_tick(Duration::from_millis(100));

        Self { bar }
    }
}

impl ProgressReporter for IndicatifReporter {
    fn report(&self, event: ProgressEvent) {
        match event {
            ProgressEvent::FetchingFeed { url } => {
                self.bar
                    .set_message(format!("{SEARCH}Fetching feed: {}", url.cyan()));
            }

            ProgressEvent::FeedParsed {
                podcast_title,
                total_episodes,
                new_episodes,
            } => {
                self.bar.set_message(format!(
                    "{HEADPHONES}{} • {} episodes total, {} new",
                    podcast_title.bold().green(),
                    total_episodes.to_string().cyan(),
                    new_episodes.to_string().yellow()
                ));
            }

            ProgressEvent::FeedSkipped { url, error } => {
                self.bar.println(format!(
                    "{FAILURE}{} - {}",
                    url.red(),
                    error.dimmed()
                ));
            }

            ProgressEvent::EpisodesAdded(summary) => {
                self.bar.println(format!(
                    "{SUCCESS}{} new episode(s) for {}",
                    summary.new_count.to_string().green().bold(),
                    summary.title.bold()
                ));
            }

            ProgressEvent::SyncCompleted {
                checked_count,
                updated_count,
                skipped_count,
            } => {
                self.bar.finish_and_clear();
                println!(
                    "\n{PARTY}{} {} checked, {} updated, {} skipped",
                    "Update complete:".bold().green(),
                    checked_count.to_string().cyan(),
                    updated_count.to_string().green().bold(),
                    if skipped_count > 0 {
                        skipped_count.to_string().red().bold()
                    } else {
                        skipped_count.to_string().green()
                    }
                );
            }
        }
    }
}

fn truncate_title(title: &str, max_len: usize) -> String {
    if title.chars().count() <= max_len {
        title.to_string()
    } else {
        let kept: String = title.chars().take(max_len.saturating_sub(3)).collect();
        format!("{kept}...")
    }
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn print_summary_line(summary: &UpdateSummary) {
    println!(
        "{SUCCESS}{} new episode(s) for {}",
        summary.new_count.to_string().green().bold(),
        summary.title.bold()
    );
}

fn print_podcast(subscription: &Subscription, limit: Option<usize>) {
    println!(
        "{MICROPHONE}{}\n{}\n",
        subscription.title.bold().magenta(),
        subscription.feed_url.dimmed()
    );
    let description = html_to_text(&subscription.description);
    if !description.is_empty() {
        println!("{description}\n");
    }

    let shown = limit.unwrap_or(subscription.episodes.len());
    for episode in subscription.episodes.iter().take(shown) {
        println!(
            "  {} {}{}",
            episode.pub_date.format("%Y-%m-%d").to_string().cyan(),
            truncate_title(&episode.title, 60),
            if episode.duration.is_empty() {
                String::new()
            } else {
                format!(" ({})", episode.duration).dimmed().to_string()
            }
        );
    }
    if subscription.episodes.len() > shown {
        println!(
            "  {}",
            format!("... {} more", subscription.episodes.len() - shown).dimmed()
        );
    }
}

async fn lookup(engine: &Engine, feed_url: &str) -> Result<Subscription> {
    match engine.get_podcast(feed_url).await? {
        Some(subscription) => Ok(subscription),
        None => bail!("Could not load a podcast from {feed_url}"),
    }
}

async fn watch(engine: &Engine, interval: u64, quiet: bool) -> Result<()> {
    let mut ticker = tokio::time::interval(Duration::from_secs(interval.max(1)));
    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    if !quiet {
        println!(
            "{HEADPHONES}Refreshing every {}s, press Ctrl-C to stop",
            interval.to_string().cyan()
        );
    }

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                match engine.update_all_subscriptions().await {
                    Ok(summaries) => summaries.iter().for_each(print_summary_line),
                    Err(e) => eprintln!("{FAILURE}{}", e.to_string().red()),
                }
            }
            result = &mut shutdown => {
                result.context("Failed to listen for Ctrl-C")?;
                break;
            }
        }
    }

    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .init();

    let args = Args::parse();

    let client = ReqwestClient::new().context("Failed to build HTTP client")?;

    if let Command::Search { term } = &args.command {
        let results = search_podcasts(&client, term)
            .await
            .context("Directory search failed")?;
        if args.json {
            return print_json(&results);
        }
        if results.is_empty() {
            println!("{FAILURE}No podcasts found for {}", term.yellow());
        }
        for result in &results {
            println!(
                "{} {}\n    {}",
                result.last_updated.cyan(),
                result.name.bold(),
                result.feed_url.dimmed()
            );
        }
        return Ok(());
    }

    let store = SqliteStore::open(&args.database)
        .with_context(|| format!("Failed to open database {}", args.database.display()))?;

    let interactive = !args.quiet && !args.json;
    let reporter: SharedProgressReporter = match &args.command {
        Command::Update if interactive => Arc::new(IndicatifReporter::new()),
        _ => NoopReporter::shared(),
    };

    let engine = SyncEngine::new(client, store, reporter).with_options(SyncOptions {
        max_concurrent_fetches: args.concurrent,
    });

    match args.command {
        Command::Search { .. } => {}

        Command::Show { feed_url, limit } => {
            let subscription = lookup(&engine, &feed_url).await?;
            if args.json {
                return print_json(&subscription);
            }
            print_podcast(&subscription, Some(limit));
        }

        Command::Subscribe { feed_url, image } => {
            let mut subscription = lookup(&engine, &feed_url).await?;
            if subscription.is_saved() {
                if !args.quiet {
                    println!("{HEADPHONES}Already subscribed to {}", subscription.title.bold());
                }
                return Ok(());
            }
            if let Some(image_url) = image {
                subscription.image_url = image_url;
            }
            engine
                .save(&mut subscription)
                .context("Failed to save subscription")?;
            if args.json {
                return print_json(&subscription);
            }
            if !args.quiet {
                println!(
                    "{SUCCESS}Subscribed to {} ({} episodes)",
                    subscription.title.bold().green(),
                    subscription.episodes.len().to_string().cyan()
                );
            }
        }

        Command::Unsubscribe { feed_url } => {
            let Some(subscription) = engine.store().find_subscription_by_url(&feed_url)? else {
                bail!("Not subscribed to {feed_url}");
            };
            engine.delete(&subscription)?;
            if !args.quiet {
                println!("{SUCCESS}Unsubscribed from {}", subscription.title.bold());
            }
        }

        Command::List => {
            let subscriptions = engine.list_subscriptions()?;
            if args.json {
                return print_json(&subscriptions);
            }
            for subscription in &subscriptions {
                println!(
                    "{} {}\n    {}",
                    subscription.last_updated.format("%Y-%m-%d").to_string().cyan(),
                    subscription.title.bold(),
                    subscription.feed_url.dimmed()
                );
            }
        }

        Command::Episodes { feed_url, limit } => {
            let Some(mut subscription) = engine.store().find_subscription_by_url(&feed_url)? else {
                bail!("Not subscribed to {feed_url}");
            };
            subscription.episodes = engine.episodes_for(&subscription)?;
            if let Some(limit) = limit {
                subscription.episodes.truncate(limit);
            }
            if args.json {
                return print_json(&subscription.episodes);
            }
            print_podcast(&subscription, None);
        }

        Command::Update => {
            let summaries = engine
                .update_all_subscriptions()
                .await
                .context("Failed to update subscriptions")?;
            if args.json {
                return print_json(&summaries);
            }
        }

        Command::Watch { interval } => {
            watch(&engine, interval, args.quiet || args.json).await?;
        }
    }

    Ok(())
}
