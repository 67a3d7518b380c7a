use anyhow::{Context, Result};
use clap::{Args as ClapArgs, Parser, Subcommand};
use std::collections::HashSet;
use std::path::{Path, PathBuf};

use headline::config::Config;
use headline::feed::FeedClient;
use headline::filter::{FilterCriteria, SortKey};
use headline::identity::CalendarDay;
use headline::overlay::FavoriteOverlay;
use headline::session::{FeedRow, FeedSession, SessionError};
use headline::storage::{Database, FavoriteRecord, PersistenceError};
use headline::util::{fit_to_width, single_line};

/// Width of the title column in listings
const TITLE_WIDTH: usize = 64;

/// Get the config directory path (~/.config/headline/)
fn get_config_dir() -> Result<PathBuf> {
    let home = std::env::var("HOME").context("HOME environment variable not set")?;
    Ok(PathBuf::from(home).join(".config").join("headline"))
}

#[derive(Parser, Debug)]
#[command(name = "headline", about = "News feed reader with a local favorites list")]
struct Args {
    /// Config file (default: ~/.config/headline/config.toml)
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Favorites database (overrides the config file)
    #[arg(long, value_name = "FILE")]
    db: Option<PathBuf>,

    /// Reset database (delete and recreate)
    #[arg(long)]
    reset_db: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Fetch the feed and list it with favorite markers
    Feed(Selection),
    /// List stored favorites
    Favorites(Selection),
    /// Toggle the favorite state of an article in the current feed
    Toggle {
        /// Article URL
        url: String,
        #[command(flatten)]
        selection: Selection,
    },
    /// Remove a stored favorite
    Unfavorite {
        /// Article URL
        url: String,
    },
}

#[derive(ClapArgs, Debug, Clone, Default)]
struct Selection {
    /// Only show titles containing this text (case-insensitive)
    #[arg(long, value_name = "TEXT", default_value = "")]
    search: String,

    /// Only show articles published on this UTC day
    #[arg(long, value_name = "YYYY-MM-DD")]
    date: Option<CalendarDay>,

    /// Sort order: none, popularity or published-at
    #[arg(long, value_name = "KEY")]
    sort: Option<SortKey>,
}

impl Selection {
    fn criteria(&self, default_sort: SortKey) -> FilterCriteria {
        FilterCriteria::new(
            self.search.clone(),
            self.date,
            self.sort.unwrap_or(default_sort),
        )
    }
}

fn ensure_private_dir(dir: &Path) -> Result<()> {
    if !dir.exists() {
        std::fs::create_dir_all(dir).context("Failed to create config directory")?;
        tracing::info!(path = %dir.display(), "Created config directory");
    }

    // User-only access on Unix
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        match std::fs::metadata(dir) {
            Ok(metadata) => {
                let mut perms = metadata.permissions();
                perms.set_mode(0o700);
                if let Err(e) = std::fs::set_permissions(dir, perms) {
                    tracing::warn!(
                        path = %dir.display(),
                        error = %e,
                        "Failed to set config directory permissions to 0700"
                    );
                }
            }
            Err(e) => {
                tracing::warn!(
                    path = %dir.display(),
                    error = %e,
                    "Failed to read config directory metadata"
                );
            }
        }
    }
    Ok(())
}

async fn open_database(path: &Path, reset: bool) -> Result<Database> {
    if reset && path.exists() {
        std::fs::remove_file(path).context("Failed to delete database")?;
        println!("Database reset.");
    }

    let path_str = path
        .to_str()
        .ok_or_else(|| anyhow::anyhow!("Invalid UTF-8 in database path"))?;
    match Database::open(path_str).await {
        Ok(db) => Ok(db),
        Err(PersistenceError::InstanceLocked) => {
            eprintln!(
                "Error: Another instance of headline appears to be running. Please close it and try again."
            );
            std::process::exit(1);
        }
        Err(e) => Err(anyhow::anyhow!("Failed to open database: {}", e)),
    }
}

fn build_client(config: &Config) -> Result<FeedClient> {
    let http = reqwest::Client::builder()
        .user_agent(concat!("headline/", env!("CARGO_PKG_VERSION")))
        .build()
        .context("Failed to build HTTP client")?;
    let api_key = config.resolve_api_key();
    if api_key.is_none() {
        tracing::warn!("No API key configured; set NEWS_API_KEY or api_key in config.toml");
    }
    Ok(FeedClient::new(http, &config.api_base_url)
        .context("Invalid api_base_url in config")?
        .with_api_key(api_key)
        .with_timeout(config.request_timeout()))
}

fn print_feed_rows(rows: &[FeedRow<'_>]) {
    if rows.is_empty() {
        println!("No articles match.");
        return;
    }
    for row in rows {
        let mark = if row.favorited { '★' } else { ' ' };
        println!(
            "{} {}  {}  {}",
            mark,
            row.article.published_at.format("%Y-%m-%d"),
            fit_to_width(&single_line(&row.article.title), TITLE_WIDTH),
            row.article.url
        );
    }
}

fn print_favorites(records: &[FavoriteRecord]) {
    if records.is_empty() {
        println!("No favorites match.");
        return;
    }
    for record in records {
        let date = record
            .published_date
            .map(|d| d.format("%Y-%m-%d").to_string())
            .unwrap_or_else(|| "----------".to_string());
        let article = record.to_article();
        println!(
            "★ {}  {}  {}  {}",
            date,
            fit_to_width(&single_line(&article.title), TITLE_WIDTH),
            single_line(article.author_text()),
            article.url
        );
    }
}

/// Unfavorite a stored article through the same toggle the feed view uses.
///
/// Returns `false` when `url` is not a favorite.
async fn unfavorite_stored(db: &Database, url: &str) -> Result<bool> {
    let Some(record) = db.get(url).await.context("Failed to load favorite")? else {
        return Ok(false);
    };
    let article = record.to_article();
    let mut overlay = FavoriteOverlay::build([&article], &HashSet::from([record.id.clone()]));
    overlay
        .toggle(db, &article, true)
        .await
        .context("Failed to remove favorite")?;
    Ok(true)
}

async fn load_session(
    config: &Config,
    client: &FeedClient,
    db: &Database,
    selection: &Selection,
) -> Result<FeedSession> {
    let mut session =
        FeedSession::new(config.topic.clone()).with_criteria(selection.criteria(config.default_sort));
    session
        .fetch_now(client, db)
        .await
        .context("Failed to fetch feed")?;
    Ok(session)
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    let config_dir = get_config_dir()?;
    let config_path = match &args.config {
        Some(path) => path.clone(),
        None => {
            ensure_private_dir(&config_dir)?;
            config_dir.join("config.toml")
        }
    };
    let config = Config::load(&config_path)
        .with_context(|| format!("Failed to load config from {}", config_path.display()))?;
    tracing::debug!(?config, "Effective configuration");

    let db_path = args
        .db
        .clone()
        .or_else(|| config.database_path.clone())
        .unwrap_or_else(|| config_dir.join("favorites.db"));
    if let Some(parent) = db_path.parent().filter(|p| !p.as_os_str().is_empty()) {
        if !parent.exists() {
            std::fs::create_dir_all(parent).context("Failed to create database directory")?;
        }
    }
    let db = open_database(&db_path, args.reset_db).await?;

    match args.command {
        Command::Feed(selection) => {
            let client = build_client(&config)?;
            let session = load_session(&config, &client, &db, &selection).await?;
            if let Some(total) = session.total_results {
                println!("{} results for \"{}\"", total, config.topic);
            }
            print_feed_rows(&session.visible());
        }
        Command::Favorites(selection) => {
            let records = db.fetch_all().await.context("Failed to load favorites")?;
            let records = selection.criteria(config.default_sort).apply(records);
            print_favorites(&records);
        }
        Command::Toggle { url, selection } => {
            let client = build_client(&config)?;
            let mut session = load_session(&config, &client, &db, &selection).await?;
            match session.toggle_favorite(&db, &url).await {
                Ok(true) => println!("★ Added to favorites: {}", url),
                Ok(false) => println!("Removed from favorites: {}", url),
                // No longer in the feed, but possibly still stored
                Err(SessionError::UnknownArticle(_)) => {
                    if unfavorite_stored(&db, &url).await? {
                        println!("Removed from favorites: {}", url);
                    } else {
                        anyhow::bail!("Not in the current feed or favorites: {}", url);
                    }
                }
                Err(e) => return Err(e).context("Failed to toggle favorite"),
            }
        }
        Command::Unfavorite { url } => {
            if unfavorite_stored(&db, &url).await? {
                println!("Removed from favorites: {}", url);
            } else {
                println!("Not a favorite: {}", url);
            }
        }
    }

    db.close().await;
    Ok(())
}
