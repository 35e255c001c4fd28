use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use hopcount::analytics::{
    AggregationQuery, EventRecorder, GeoIpService, GeoResolver, RedirectInput, ViewGate,
};
use hopcount::config::Config;
use hopcount::storage;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "hopcount-admin")]
#[command(about = "Hopcount redirect analytics CLI", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create the event table and indexes
    Init,
    /// Show redirect counts per short URL for a user
    Counts {
        /// Owning user ID
        user_id: u64,
        /// Print JSON instead of a table
        #[arg(long)]
        json: bool,
    },
    /// Show the most recent raw events for a user
    Events {
        /// Owning user ID
        creator_id: u64,
        /// Maximum number of events to print
        #[arg(long, default_value_t = 20)]
        limit: u32,
    },
    /// Resolve an IP address with the configured GeoIP database
    Lookup {
        ip: String,
    },
    /// Record one redirect event and wait for it to be written
    Record {
        #[arg(long)]
        creator: u64,
        #[arg(long)]
        short_url: String,
        #[arg(long, default_value_t = 0)]
        short_url_id: u64,
        #[arg(long, default_value_t = 0)]
        url_group_id: u64,
        #[arg(long, default_value = "")]
        ip: String,
        #[arg(long, default_value = "")]
        user_agent: String,
        #[arg(long, default_value = "")]
        referer: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let config = Config::from_env()?;

    match cli.command {
        Commands::Init => {
            storage::connect(&config.events_database).await?;
            println!("✓ Event store initialized");
        }
        Commands::Lookup { ip } => {
            let geoip = GeoIpService::new(config.geoip.city_db_path.as_deref())?;
            if !geoip.is_enabled() {
                println!("⚠ GEOIP_CITY_DB_PATH is not set");
                return Ok(());
            }
            match geoip.resolve(&ip) {
                Some(location) => println!("{}", serde_json::to_string_pretty(&location)?),
                None => println!("No location found for '{}'", ip),
            }
        }
        Commands::Counts { user_id, json } => {
            let store = storage::connect(&config.events_database).await?;
            let gate = Arc::new(ViewGate::new(Arc::clone(&store), config.views.refresh));
            let counts = AggregationQuery::new(gate)
                .counts_for_user(user_id)
                .await
                .with_context(|| format!("failed to count redirects for user {user_id}"))?;

            if json {
                println!("{}", serde_json::to_string_pretty(&counts)?);
            } else if counts.is_empty() {
                println!("No redirects recorded for user {}.", user_id);
            } else {
                println!("{:<40} {}", "Short URL", "Redirects");
                println!("{}", "-".repeat(52));
                for count in counts {
                    println!("{:<40} {}", count.short_url, count.redirects);
                }
            }
        }
        Commands::Events { creator_id, limit } => {
            let store = storage::connect(&config.events_database).await?;
            let events = store.recent_redirects(creator_id, limit).await?;
            if events.is_empty() {
                println!("No events found for user {}.", creator_id);
            } else {
                for event in events {
                    println!("{}", serde_json::to_string(&event)?);
                }
            }
        }
        Commands::Record {
            creator,
            short_url,
            short_url_id,
            url_group_id,
            ip,
            user_agent,
            referer,
        } => {
            let store = storage::connect(&config.events_database).await?;
            let geoip = GeoIpService::open_or_disabled(config.geoip.city_db_path.as_deref());
            let recorder = EventRecorder::new(Arc::clone(&store), Arc::new(geoip));
            recorder.log_redirect(RedirectInput {
                short_url_id,
                url_group_id,
                short_url,
                creator_id: creator,
                ip_address: ip,
                user_agent,
                referer,
            });
            recorder.drain().await;
            println!("✓ Redirect event submitted (see log for write errors)");
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_events_limit_defaults_to_twenty() {
        let cli = Cli::try_parse_from(["hopcount-admin", "events", "7"]).unwrap();
        match cli.command {
            Commands::Events { creator_id, limit } => {
                assert_eq!(creator_id, 7);
                assert_eq!(limit, 20);
            }
            _ => panic!("expected events command"),
        }
    }

    #[test]
    fn test_events_rejects_negative_limit() {
        let result = Cli::try_parse_from(["hopcount-admin", "events", "7", "--limit", "-1"]);
        assert!(result.is_err());
    }
}
