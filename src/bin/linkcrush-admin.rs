use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use linkcrush::auth::issue_token;
use linkcrush::auth::jwt::AccessClaims;
use linkcrush::config::Config;
use linkcrush::models::LinkSummary;
use linkcrush::storage::{self, Storage};
use std::sync::Arc;

#[derive(Parser)]
#[command(name = "linkcrush-admin")]
#[command(about = "LinkCrush administration CLI", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List all short links
    List,
    /// Show totals across all short links
    Summary,
    /// Delete a short link
    Delete {
        /// Short code to delete
        short_code: String,
    },
    /// Reset click counts (all links when no code is given)
    ResetClicks {
        /// Short codes to reset
        short_codes: Vec<String>,
    },
    /// Sign an access token with JWT_SECRET
    IssueToken {
        /// Account id (sub claim)
        sub: String,
        #[arg(long)]
        username: Option<String>,
        /// Grant staff rights (may delete any link)
        #[arg(long)]
        staff: bool,
        #[arg(long)]
        superuser: bool,
        /// Token lifetime in seconds
        #[arg(long, default_value_t = 1800)]
        ttl_secs: i64,
    },
}

async fn open_storage(config: &Config) -> Result<Arc<dyn Storage>> {
    let storage = storage::connect(&config.database).await?;

    // Ensure storage is initialized
    storage.init().await?;

    Ok(storage)
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();
    let config = Config::from_env()?;

    match cli.command {
        Commands::List => {
            let links = open_storage(&config).await?.list().await?;
            if links.is_empty() {
                println!("No short links found.");
            } else {
                println!("{:<12} {:>8} {}", "Code", "Clicks", "Original URL");
                println!("{}", "-".repeat(80));
                for link in links {
                    println!(
                        "{:<12} {:>8} {}",
                        link.short_code, link.click_count, link.original_url
                    );
                }
            }
        }
        Commands::Summary => {
            let links = open_storage(&config).await?.list().await?;
            let summary = LinkSummary::from_records(&links, chrono::Utc::now().timestamp());
            println!("Total links:      {}", summary.total_links);
            println!("Total clicks:     {}", summary.total_clicks);
            println!("Average clicks:   {:.1}", summary.average_clicks);
            println!("Created (7 days): {}", summary.recent_links);
            match summary.top_link {
                Some(top) => println!(
                    "Top link:         {} ({} clicks) -> {}",
                    top.short_code, top.click_count, top.original_url
                ),
                None => println!("Top link:         -"),
            }
        }
        Commands::Delete { short_code } => {
            let storage = open_storage(&config).await?;
            if storage.delete(&short_code).await? {
                println!("✓ Deleted '{}'", short_code);
            } else {
                println!("⚠ No short link '{}' found", short_code);
            }
        }
        Commands::ResetClicks { short_codes } => {
            let storage = open_storage(&config).await?;
            let touched = storage.reset_clicks(&short_codes).await?;
            println!("✓ Reset click counts for {} link(s)", touched);
        }
        Commands::IssueToken {
            sub,
            username,
            staff,
            superuser,
            ttl_secs,
        } => {
            let secret = config
                .auth
                .jwt
                .as_ref()
                .map(|jwt| jwt.secret.clone())
                .or_else(|| std::env::var("JWT_SECRET").ok())
                .context("JWT_SECRET must be set to issue tokens")?;

            let claims = AccessClaims {
                sub,
                username,
                is_staff: staff,
                is_superuser: superuser,
                exp: chrono::Utc::now().timestamp() + ttl_secs,
            };
            println!("{}", issue_token(&secret, &claims)?);
        }
    }

    Ok(())
}
