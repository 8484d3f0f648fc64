use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use newsdesk_core::{
    config::API_KEY_ENV, AccumulatedResult, Config, DiffOp, ListDiffPresenter, ListUpdate,
    LocalStore, NewsFeed, NewsOutcome, Outcome, SearchDebouncer, SqliteLocalStore,
};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::task::JoinHandle;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "newsdesk")]
#[command(version, about = "Breaking news and search from the terminal, with saved articles", long_about = None)]
struct Cli {
    /// API key for this run (beats the config file and NEWSDESK_API_KEY)
    #[arg(long, global = true)]
    api_key: Option<String>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(clap::Subcommand)]
enum Commands {
    /// Show top headlines for a country
    Breaking {
        /// Two-letter country code (defaults to api.country)
        #[arg(long)]
        country: Option<String>,
        /// How many pages to load
        #[arg(long, default_value_t = 1)]
        pages: u32,
    },
    /// Search all articles
    Search {
        query: String,
        #[arg(long, default_value_t = 1)]
        pages: u32,
    },
    /// Save an article from a search or breaking news listing
    Save {
        /// Search query the article came from
        #[arg(required_unless_present = "breaking")]
        query: Option<String>,
        /// Take the article from breaking news instead
        #[arg(long, conflicts_with = "query")]
        breaking: bool,
        /// Position in the listing, as printed (starting at 1)
        #[arg(long)]
        index: usize,
        #[arg(long, default_value_t = 1)]
        pages: u32,
    },
    /// Manage saved articles
    Saved {
        #[command(subcommand)]
        action: SavedAction,
    },
    /// Search as you type: one query per stdin line, prints list changes
    Watch,
    /// Manage the config file
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(clap::Subcommand)]
enum SavedAction {
    /// List saved articles, oldest first
    List,
    /// Remove a saved article by url
    Delete { url: String },
}

#[derive(clap::Subcommand)]
enum ConfigAction {
    /// Write a config file with default values
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
    /// Print the effective configuration
    Show,
}

enum Listing {
    Breaking,
    Search(String),
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Logs go to stderr so listings can be piped
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "newsdesk=info,newsdesk_core=info,newsdesk_api=info,newsdesk_store=info".into()
            }),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    let mut config = Config::load().context("Failed to load config")?;
    if let Some(key) = cli.api_key {
        config.api.key = key;
    }

    match cli.command {
        Some(Commands::Breaking { country, pages }) => {
            if let Some(country) = country {
                config.api.country = country;
            }
            tracing::info!("Breaking news for {} ({} pages)", config.api.country, pages);
            let feed = open_feed(&config)?;
            let result = collect_pages(&feed, &Listing::Breaking, pages, config.api.page_size).await?;
            print_listing(&result);
        }
        Some(Commands::Search { query, pages }) => {
            tracing::info!("Searching for: {}", query);
            let feed = open_feed(&config)?;
            let result = collect_pages(&feed, &Listing::Search(query), pages, config.api.page_size).await?;
            print_listing(&result);
        }
        Some(Commands::Save {
            query,
            breaking,
            index,
            pages,
        }) => {
            let listing = match (breaking, query) {
                (true, _) => Listing::Breaking,
                (false, Some(query)) => Listing::Search(query),
                (false, None) => anyhow::bail!("Give a search query or --breaking"),
            };
            tracing::info!("Saving article #{}", index);
            save_from_listing(&config, &listing, index, pages).await?;
        }
        Some(Commands::Saved { action }) => {
            let store = SqliteLocalStore::open(config.store_path()?)?;
            match action {
                SavedAction::List => list_saved(&store).await?,
                SavedAction::Delete { url } => {
                    tracing::info!("Deleting saved article: {}", url);
                    delete_saved(&store, &url).await?
                }
            }
        }
        Some(Commands::Watch) => {
            tracing::info!("Watching stdin for queries");
            watch(&config).await?
        }
        Some(Commands::Config { action }) => match action {
            ConfigAction::Init { force } => init_config(force)?,
            ConfigAction::Show => show_config(&config)?,
        },
        None => {
            println!("No command specified. Try --help");
        }
    }

    Ok(())
}

fn open_feed(config: &Config) -> anyhow::Result<NewsFeed> {
    if config.api.key.trim().is_empty() {
        anyhow::bail!(
            "No API key configured. Set {} or add api.key to {}",
            API_KEY_ENV,
            Config::config_path()?.display()
        );
    }
    Ok(NewsFeed::from_config(config)?)
}

/// Load up to `pages` pages, stopping early once everything is in
async fn collect_pages(
    feed: &NewsFeed,
    listing: &Listing,
    pages: u32,
    page_size: u32,
) -> anyhow::Result<Arc<AccumulatedResult>> {
    let mut latest = None;

    for _ in 0..pages.max(1) {
        let outcome = match listing {
            Listing::Breaking => feed.next_breaking_page().await,
            Listing::Search(query) => feed.search_news(query).await,
        };

        match outcome {
            Outcome::Success(result) => {
                let done = result.is_last_page(page_size);
                latest = Some(result);
                if done {
                    break;
                }
            }
            Outcome::Error(message) if latest.is_some() => {
                eprintln!("Stopped early: {}", message);
                break;
            }
            Outcome::Error(message) => anyhow::bail!("Fetch failed: {}", message),
            Outcome::Loading => {}
        }
    }

    latest.context("Nothing was fetched")
}

fn print_listing(result: &AccumulatedResult) {
    println!(
        "{}: {} of {} articles",
        result.context,
        result.articles.len(),
        result.total_results
    );

    for (i, article) in result.articles.iter().enumerate() {
        println!("{:>3}. {}", i + 1, article.title);
        println!(
            "     {} | {} | {}",
            article.source.name, article.published_at, article.url
        );
    }
}

async fn save_from_listing(
    config: &Config,
    listing: &Listing,
    index: usize,
    pages: u32,
) -> anyhow::Result<()> {
    let feed = open_feed(config)?;
    let result = collect_pages(&feed, listing, pages, config.api.page_size).await?;

    let article = index
        .checked_sub(1)
        .and_then(|i| result.articles.get(i))
        .with_context(|| {
            format!(
                "No article #{} ({} loaded, try --pages)",
                index,
                result.articles.len()
            )
        })?;

    feed.save_article(article).await?;
    println!("Saved: {}", article.title);
    Ok(())
}

async fn list_saved(store: &SqliteLocalStore) -> anyhow::Result<()> {
    let saved = store.snapshot().await?;
    if saved.is_empty() {
        println!("No saved articles");
        return Ok(());
    }

    for (i, entry) in saved.iter().enumerate() {
        println!("{:>3}. {}", i + 1, entry.article.title);
        println!(
            "     saved {} | {}",
            entry.saved_at.format("%Y-%m-%d %H:%M"),
            entry.article.url
        );
    }
    Ok(())
}

async fn delete_saved(store: &SqliteLocalStore, url: &str) -> anyhow::Result<()> {
    match store.get(url).await? {
        Some(entry) => {
            store.delete(&entry.article).await?;
            println!("Deleted: {}", entry.article.title);
        }
        None => println!("Not saved: {}", url),
    }
    Ok(())
}

/// Debounced search over stdin lines. Each settled query replaces the
/// listing and the change is printed as diff ops.
async fn watch(config: &Config) -> anyhow::Result<()> {
    let feed = Arc::new(open_feed(config)?);
    let delay = Duration::from_millis(config.search.debounce_ms);
    let debouncer = SearchDebouncer::for_feed(Arc::clone(&feed), delay);
    let presenter = ListDiffPresenter::new();

    let mut results = feed.subscribe_search_news();
    let mut diffs = presenter.subscribe();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    let mut stdin_open = true;
    let mut last_diff = None;
    let mut printed = 0;

    loop {
        tokio::select! {
            line = lines.next_line(), if stdin_open => match line? {
                Some(text) => debouncer.on_query_changed(text.trim()),
                None => stdin_open = false,
            },
            Some(outcome) = results.next() => {
                if let Some(handle) = handle_outcome(&presenter, outcome) {
                    last_diff = Some(handle);
                }
            }
            Some(update) = diffs.next() => {
                printed = update.generation;
                print_update(&update);
            }
            _ = tokio::time::sleep(delay), if !stdin_open => {
                // Idle means the last search ran to completion, so its
                // outcome is already queued
                if debouncer.is_idle() {
                    break;
                }
            }
        }
    }

    for outcome in results.drain() {
        if let Some(handle) = handle_outcome(&presenter, outcome) {
            last_diff = Some(handle);
        }
    }
    if let Some(handle) = last_diff {
        // Applied diffs are published before the handle resolves
        let _ = handle.await;
    }
    for update in diffs.drain() {
        if update.generation > printed {
            print_update(&update);
        }
    }
    Ok(())
}

fn handle_outcome(
    presenter: &ListDiffPresenter,
    outcome: NewsOutcome,
) -> Option<JoinHandle<Option<ListUpdate>>> {
    match outcome {
        Outcome::Loading => None,
        Outcome::Success(result) => Some(presenter.submit(result.articles.clone())),
        Outcome::Error(message) => {
            eprintln!("Search failed: {}", message);
            None
        }
    }
}

fn print_update(update: &ListUpdate) {
    println!("-- {} articles", update.list.len());
    for op in &update.ops {
        match op {
            DiffOp::Remove { index, url } => println!("- [{}] {}", index, url),
            DiffOp::Insert { index, article } => println!("+ [{}] {}", index, article.title),
            DiffOp::Move { from, to, url } => println!("~ [{} -> {}] {}", from, to, url),
            DiffOp::Change { index, article } => println!("* [{}] {}", index, article.title),
        }
    }
}

fn init_config(force: bool) -> anyhow::Result<()> {
    let path = Config::config_path()?;
    if path.exists() && !force {
        anyhow::bail!("{} already exists (use --force to overwrite)", path.display());
    }

    let path = Config::default().save()?;
    println!("Wrote {}", path.display());
    Ok(())
}

fn show_config(config: &Config) -> anyhow::Result<()> {
    let mut shown = config.clone();
    if !shown.api.key.is_empty() {
        shown.api.key = "********".to_string();
    }

    println!("# {}", Config::config_path()?.display());
    print!("{}", toml::to_string_pretty(&shown)?);
    println!("# saved articles: {}", config.store_path()?.display());
    Ok(())
}
